//! # Per-CPU Page Allocator

use crate::address::{PhysicalAddress, PhysicalRange};
use crate::free_list::FreeList;
use core::marker::PhantomData;
use core::ptr::{self, NonNull};
use kernel_info::memory::PAGE_SIZE;
use kernel_info::param::NCPU;
use kernel_sync::{Cpu, IrqGuard, SpinLock};
use log::{debug, trace, warn};

/// Byte pattern written over a page when it is freed, to catch dangling refs.
pub const FREE_JUNK: u8 = 0x01;

/// Byte pattern written over a page when it is allocated, to catch reads of
/// uninitialized memory.
pub const ALLOC_JUNK: u8 = 0x05;

#[allow(clippy::cast_possible_truncation)]
const PAGE_BYTES: usize = PAGE_SIZE as usize;

/// Page allocator with one free list per core.
///
/// `free` pushes onto the list of the core that executes it; `alloc` pops from
/// the executing core's list and, when that is empty, steals from the other
/// cores in ascending order. At most one free-list lock is held at any time.
///
/// The executing core is read through `C` with preemption disabled (see
/// [`IrqGuard`]), so a thread cannot migrate between reading its core id and
/// touching that core's list.
pub struct PageAllocator<C> {
    lists: [SpinLock<FreeList>; NCPU],
    cpus: usize,
    range: PhysicalRange,
    _cpu: PhantomData<fn() -> C>,
}

/// Allocation failed because every free list is empty.
#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AllocError {
    #[error("out of physical pages")]
    OutOfMemory,
}

/// The allocator could not be set up with the given parameters.
#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AllocInitError {
    #[error("at least one cpu is required")]
    NoCpus,
    #[error("{cpus} cpus requested, at most {max} are supported")]
    TooManyCpus { cpus: usize, max: usize },
    #[error("range {0:?} holds no whole page")]
    EmptyRange(PhysicalRange),
}

impl<C: Cpu> PageAllocator<C> {
    /// Creates `cpus` empty free lists and frees every whole page of `range`
    /// onto the list of the executing core.
    ///
    /// # Safety
    /// - `range` must be RAM that is direct-mapped, writable, and exclusively
    ///   owned by the allocator from now on.
    /// - `C` must report core ids in `0..cpus`.
    pub unsafe fn new(cpus: usize, range: PhysicalRange) -> Result<Self, AllocInitError> {
        if cpus == 0 {
            return Err(AllocInitError::NoCpus);
        }
        if cpus > NCPU {
            return Err(AllocInitError::TooManyCpus { cpus, max: NCPU });
        }
        if range.page_count() == 0 {
            return Err(AllocInitError::EmptyRange(range));
        }

        let allocator = Self {
            lists: core::array::from_fn(|_| SpinLock::new(FreeList::new())),
            cpus,
            range,
            _cpu: PhantomData,
        };

        for page in range.pages() {
            // Safety: the caller hands us the whole range.
            unsafe { allocator.free(page) };
        }

        debug!(
            "kalloc: {} pages in {range:?} across {cpus} cpu(s)",
            range.page_count()
        );
        Ok(allocator)
    }

    /// Returns `page` to the executing core's free list.
    ///
    /// # Panics
    /// If `page` is not page-aligned or not a page of the managed range.
    ///
    /// # Safety
    /// `page` must have been returned by [`alloc`](Self::alloc) (or be part of
    /// the initial range) and must not be used after this call.
    pub unsafe fn free(&self, page: PhysicalAddress) {
        assert!(
            self.range.contains_page(page),
            "kfree: {page:?} is not a page of {:?}",
            self.range
        );

        let Some(ptr) = NonNull::new(page.as_mut_ptr::<u8>()) else {
            panic!("kfree: null page");
        };

        // Fill with junk to catch dangling refs.
        unsafe { ptr::write_bytes(ptr.as_ptr(), FREE_JUNK, PAGE_BYTES) };

        let irq = IrqGuard::<C>::new();
        let cpu = self.checked_cpu(irq.cpu());
        // Safety: the page is in range, aligned and no longer referenced.
        self.lists[cpu].with_lock(|list| unsafe { list.push(ptr) });
    }

    /// Allocates one page, stealing from other cores if this core has none.
    ///
    /// The returned page is filled with [`ALLOC_JUNK`].
    ///
    /// # Errors
    /// [`AllocError::OutOfMemory`] when every free list is empty.
    pub fn alloc(&self) -> Result<PhysicalAddress, AllocError> {
        let page = {
            let irq = IrqGuard::<C>::new();
            let this = self.checked_cpu(irq.cpu());
            self.pop_from(this).or_else(|| self.steal(this))
        };

        let Some(page) = page else {
            warn!("kalloc: out of memory");
            return Err(AllocError::OutOfMemory);
        };

        // Safety: the page was on a free list, so it is ours and writable.
        unsafe { ptr::write_bytes(page.as_ptr(), ALLOC_JUNK, PAGE_BYTES) };
        Ok(PhysicalAddress::from_ptr(page.as_ptr()))
    }

    fn steal(&self, this: usize) -> Option<NonNull<u8>> {
        (0..self.cpus).filter(|&other| other != this).find_map(|other| {
            let page = self.pop_from(other)?;
            trace!("kalloc: cpu {this} stole a page from cpu {other}");
            Some(page)
        })
    }

    fn pop_from(&self, cpu: usize) -> Option<NonNull<u8>> {
        self.lists[cpu].with_lock(FreeList::pop)
    }

    fn checked_cpu(&self, cpu: usize) -> usize {
        assert!(
            cpu < self.cpus,
            "kalloc: cpu {cpu} outside of the {} configured",
            self.cpus
        );
        cpu
    }
}

impl<C> PageAllocator<C> {
    /// Number of per-core free lists.
    #[inline]
    #[must_use]
    pub const fn cpus(&self) -> usize {
        self.cpus
    }

    /// The physical range this allocator manages.
    #[inline]
    #[must_use]
    pub const fn range(&self) -> PhysicalRange {
        self.range
    }

    /// Pages currently on `cpu`'s free list.
    ///
    /// # Panics
    /// If `cpu` is not one of the configured cores.
    #[must_use]
    pub fn free_pages_on(&self, cpu: usize) -> usize {
        assert!(cpu < self.cpus, "kalloc: no free list for cpu {cpu}");
        self.lists[cpu].with_lock(|list| list.len())
    }

    /// Pages on all free lists.
    ///
    /// Lists are visited one at a time, so under concurrent use the total is
    /// only approximate.
    #[must_use]
    pub fn free_pages(&self) -> usize {
        (0..self.cpus).map(|cpu| self.free_pages_on(cpu)).sum()
    }
}
