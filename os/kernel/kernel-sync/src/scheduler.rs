use core::fmt;

/// Identity of a kernel thread as reported by the [`Scheduler`].
#[repr(transparent)]
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct ThreadId(usize);

impl ThreadId {
    #[inline]
    #[must_use]
    pub const fn new(id: usize) -> Self {
        Self(id)
    }

    #[inline]
    #[must_use]
    pub const fn as_usize(self) -> usize {
        self.0
    }
}

impl fmt::Debug for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ThreadId({})", self.0)
    }
}

/// Thread identity and CPU hand-off, provided by the kernel scheduler.
pub trait Scheduler {
    /// The thread currently executing on this core.
    fn current_thread() -> ThreadId;

    /// Gives up the core so other runnable threads make progress.
    ///
    /// Called by blocking primitives while the resource they wait for is
    /// held elsewhere. Must not be called with a [`SpinLock`](crate::SpinLock)
    /// held.
    fn yield_now();
}
