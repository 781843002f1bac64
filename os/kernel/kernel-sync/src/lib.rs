//! # Kernel synchronization primitives
//!
//! Two lock disciplines with different capability contracts:
//!
//! * [`SpinLock`]: busy-wait mutual exclusion for short critical sections.
//!   The holder must not block, sleep or perform I/O while holding it, and the
//!   lock is not reentrant.
//! * [`SleepLock`]: blocking mutual exclusion. The holder may be suspended
//!   (e.g. across a synchronous disk transfer); contenders yield to the
//!   [`Scheduler`] instead of burning their core. It records the holding
//!   thread so callers can assert ownership with [`SleepLock::holding`].
//!
//! The CPU- and thread-identity facilities are external to this crate and are
//! supplied through the [`Cpu`] and [`Scheduler`] traits. With the `hosted`
//! feature, [`hosted`] provides std-backed implementations.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

#[cfg(feature = "hosted")]
pub mod hosted;
pub mod irq;
mod scheduler;
mod sleep_lock;
mod spin_lock;

pub use irq::{Cpu, IrqGuard};
pub use scheduler::{Scheduler, ThreadId};
pub use sleep_lock::{SleepLock, SleepLockGuard};
pub use spin_lock::{SpinLock, SpinLockGuard};
