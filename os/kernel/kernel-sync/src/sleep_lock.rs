use crate::{Scheduler, SpinLock, ThreadId};
use core::cell::UnsafeCell;
use core::marker::PhantomData;
use core::ops::{Deref, DerefMut};

/// Blocking lock whose holder may be suspended while it is held.
///
/// The lock word and the holder identity live behind a short [`SpinLock`];
/// the protected value does not. A contender that finds the lock taken drops
/// the spin lock and yields to the scheduler `S` before trying again, so
/// holding a `SleepLock` across slow operations (disk transfers) only delays
/// threads that want the same resource.
///
/// ```rust,ignore
/// static BUF: SleepLock<[u8; 512], KernelScheduler> = SleepLock::new("buffer", [0; 512]);
///
/// let mut data = BUF.lock();
/// disk_read(&mut data); // may sleep
/// assert!(data.holding());
/// ```
pub struct SleepLock<T, S> {
    /// `Some(thread)` while held.
    holder: SpinLock<Option<ThreadId>>,
    name: &'static str,
    inner: UnsafeCell<T>,
    _scheduler: PhantomData<fn() -> S>,
}

// Safety: access to `inner` is serialized by `holder`; only T: Send may cross threads.
unsafe impl<T: Send, S> Sync for SleepLock<T, S> {}

impl<T, S> SleepLock<T, S> {
    pub const fn new(name: &'static str, value: T) -> Self {
        Self {
            holder: SpinLock::new(None),
            name,
            inner: UnsafeCell::new(value),
            _scheduler: PhantomData,
        }
    }

    #[inline]
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Whether any thread holds the lock.
    #[inline]
    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.holder.with_lock(|h| h.is_some())
    }

    /// Mutable access when you have `&mut self` (no contention possible).
    #[inline]
    pub const fn get_mut(&mut self) -> &mut T {
        self.inner.get_mut()
    }
}

impl<T, S: Scheduler> SleepLock<T, S> {
    /// Blocks until the lock is acquired by the calling thread.
    pub fn lock(&self) -> SleepLockGuard<'_, T, S> {
        let me = S::current_thread();
        loop {
            if self.claim(me) {
                return SleepLockGuard { lock: self };
            }
            S::yield_now();
        }
    }

    /// Acquires the lock only if it is free right now.
    pub fn try_lock(&self) -> Option<SleepLockGuard<'_, T, S>> {
        self.claim(S::current_thread())
            .then(|| SleepLockGuard { lock: self })
    }

    /// Whether the calling thread is the one holding the lock.
    #[must_use]
    pub fn holding(&self) -> bool {
        let me = S::current_thread();
        self.holder.with_lock(|h| *h == Some(me))
    }

    fn claim(&self, me: ThreadId) -> bool {
        self.holder.with_lock(|h| {
            if h.is_some() {
                return false;
            }
            *h = Some(me);
            true
        })
    }
}

pub struct SleepLockGuard<'a, T, S> {
    lock: &'a SleepLock<T, S>,
}

impl<T, S: Scheduler> SleepLockGuard<'_, T, S> {
    /// Whether the calling thread holds the lock behind this guard.
    ///
    /// A guard that was moved to another thread still owns the lock but the
    /// receiving thread is not recorded as its holder.
    #[inline]
    #[must_use]
    pub fn holding(&self) -> bool {
        self.lock.holding()
    }
}

impl<T, S> SleepLockGuard<'_, T, S> {
    #[inline]
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.lock.name
    }
}

impl<T, S> Deref for SleepLockGuard<'_, T, S> {
    type Target = T;
    fn deref(&self) -> &T {
        unsafe { &*self.lock.inner.get() }
    }
}

impl<T, S> DerefMut for SleepLockGuard<'_, T, S> {
    fn deref_mut(&mut self) -> &mut T {
        unsafe { &mut *self.lock.inner.get() }
    }
}

impl<T, S> Drop for SleepLockGuard<'_, T, S> {
    fn drop(&mut self) {
        self.lock.holder.with_lock(|h| *h = None);
    }
}
