//! # Kernel Parameters and Physical Memory Layout
//!
//! This crate is the single source of truth for the sizing constants shared by
//! the kernel's memory-management core: how many CPUs the per-core allocator
//! lists are sized for, how large the block cache is, how big a disk block and
//! a physical page are, and which physical range the page allocator manages.
//!
//! ## Modules
//!
//! ### Parameters ([`param`])
//! * **CPU count**: [`NCPU`](param::NCPU) bounds the per-core free lists
//! * **Block cache sizing**: [`NBUF`](param::NBUF) slots hashed into
//!   [`NBUCKET`](param::NBUCKET) buckets
//! * **Disk geometry**: [`BLOCK_SIZE`](param::BLOCK_SIZE) bytes per block
//!
//! ### Memory Layout ([`memory`])
//! * **Page geometry**: [`PAGE_SIZE`](memory::PAGE_SIZE) and rounding helpers
//! * **Managed RAM**: [`KERNBASE`](memory::KERNBASE) up to
//!   [`PHYSTOP`](memory::PHYSTOP)
//!
//! ```text
//! Physical Memory Layout:
//! 0x0000_0000 ┌─────────────────────────────────┐
//!             │     MMIO (UART, VirtIO, PLIC)   │
//! KERNBASE    ├─────────────────────────────────┤ 0x8000_0000
//!             │       Kernel Image              │
//!             │   (Text, Data, BSS)             │
//! end         ├─────────────────────────────────┤
//!             │    Free RAM                     │
//!             │  (Managed by the page allocator)│
//! PHYSTOP     └─────────────────────────────────┘ KERNBASE + 128 MiB
//! ```
//!
//! ## Configuration Management
//!
//! All values are `const` and validated with compile-time assertions, so an
//! inconsistent configuration fails the build instead of corrupting memory at
//! runtime. Components that need runtime sizing (tests, hosted builds) take
//! these values as defaults and accept overrides at construction time.
//!
//! ```rust
//! use kernel_info::memory::{PAGE_SIZE, page_round_up};
//! use kernel_info::param::{NBUCKET, NBUF};
//!
//! assert_eq!(page_round_up(1), PAGE_SIZE);
//! assert!(NBUF >= NBUCKET);
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]
#![deny(unsafe_code)]

pub mod memory;
pub mod param;
