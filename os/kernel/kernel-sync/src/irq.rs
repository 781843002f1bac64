use core::marker::PhantomData;

/// Per-core execution facilities provided by the architecture layer.
///
/// `push_off`/`pop_off` disable and restore preemption (interrupts) on the
/// executing core. They nest: preemption is enabled again only once every
/// `push_off` has been matched by a `pop_off`, and only if it was enabled
/// before the outermost `push_off`. An unmatched `pop_off` is a kernel bug
/// and implementations are expected to panic.
pub trait Cpu {
    /// Index of the executing core, in `0..NCPU`.
    ///
    /// Only stable while preemption is disabled; otherwise the thread may
    /// migrate to another core right after reading it.
    fn id() -> usize;

    /// Disables preemption on this core (nestable).
    fn push_off();

    /// Undoes one [`push_off`](Self::push_off).
    fn pop_off();
}

/// RAII guard that disables preemption on creation and restores it on drop.
///
/// The guard snapshots the executing core's id *after* preemption has been
/// disabled, so [`IrqGuard::cpu`] stays valid for the guard's lifetime.
///
/// # Examples
///
/// ```rust,ignore
/// let cpu = {
///     let irq = IrqGuard::<RiscvCpu>::new(); // push_off
///     let list = &free_lists[irq.cpu()];
///     list.with_lock(|l| l.pop())
/// }; // pop_off
/// ```
pub struct IrqGuard<C: Cpu> {
    cpu: usize,
    // Tied to the core it was created on.
    _not_send: PhantomData<*const C>,
}

impl<C: Cpu> IrqGuard<C> {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        C::push_off();
        Self {
            cpu: C::id(),
            _not_send: PhantomData,
        }
    }

    /// The core this guard pinned the caller to.
    #[inline]
    #[must_use]
    pub const fn cpu(&self) -> usize {
        self.cpu
    }
}

impl<C: Cpu> Default for IrqGuard<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Cpu> Drop for IrqGuard<C> {
    fn drop(&mut self) {
        C::pop_off();
    }
}
