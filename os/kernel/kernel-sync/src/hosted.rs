//! # Hosted collaborators
//!
//! std-backed [`Cpu`] and [`Scheduler`] implementations, so the kernel's
//! memory-management core can run as ordinary threads on a development host.
//!
//! * Every OS thread gets a fresh [`ThreadId`].
//! * Every OS thread runs on "core 0" until it calls
//!   [`HostCpu::set_current`]; there is no real migration.
//! * Preemption nesting is tracked per thread and checked like the kernel's.

extern crate std;

use crate::{Cpu, Scheduler, ThreadId};
use core::cell::Cell;
use core::sync::atomic::{AtomicUsize, Ordering};

static NEXT_THREAD: AtomicUsize = AtomicUsize::new(1);

std::thread_local! {
    static THREAD: ThreadId = ThreadId::new(NEXT_THREAD.fetch_add(1, Ordering::Relaxed));
    static CPU: Cell<usize> = const { Cell::new(0) };
    static NOFF: Cell<usize> = const { Cell::new(0) };
}

/// Host-thread scheduler: yields to the OS scheduler.
#[derive(Debug, Copy, Clone, Default)]
pub struct HostScheduler;

impl Scheduler for HostScheduler {
    fn current_thread() -> ThreadId {
        THREAD.with(|t| *t)
    }

    fn yield_now() {
        std::thread::yield_now();
    }
}

/// Host "core": a per-thread core index and preemption depth.
#[derive(Debug, Copy, Clone, Default)]
pub struct HostCpu;

impl HostCpu {
    /// Makes the calling thread report `cpu` as its core from now on.
    pub fn set_current(cpu: usize) {
        assert_eq!(
            NOFF.with(Cell::get),
            0,
            "set_current: cannot migrate with preemption disabled"
        );
        CPU.with(|c| c.set(cpu));
    }

    /// Current `push_off` nesting depth of the calling thread.
    #[must_use]
    pub fn depth() -> usize {
        NOFF.with(Cell::get)
    }
}

impl Cpu for HostCpu {
    fn id() -> usize {
        CPU.with(Cell::get)
    }

    fn push_off() {
        NOFF.with(|n| n.set(n.get() + 1));
    }

    fn pop_off() {
        NOFF.with(|n| {
            let depth = n.get();
            assert!(depth > 0, "pop_off: preemption was not disabled");
            n.set(depth - 1);
        });
    }
}
