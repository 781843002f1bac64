//! # Physical Page Allocator
//!
//! Hands out and reclaims whole [`PAGE_SIZE`](kernel_info::memory::PAGE_SIZE)
//! pages of physical memory for user processes, kernel stacks, page-table
//! pages and I/O buffers.
//!
//! ## Architecture
//!
//! ```text
//!           alloc() on cpu 1
//!                 │
//!     ┌───────────▼───────────┐    empty?    ┌───────────────────────┐
//!     │ cpu 1: SpinLock<list> │ ───────────▶ │ cpu 0, 2, 3 … (steal) │
//!     └───────────────────────┘              └───────────────────────┘
//!
//!     free(page) on cpu N  ──▶  cpu N: SpinLock<list>
//! ```
//!
//! * **Per-core lists**: each core has its own lock, so cores rarely contend.
//! * **Stealing**: a core whose list is empty pops from the other cores, one
//!   lock at a time, in ascending core order.
//! * **No affinity**: a page is freed onto the list of whichever core frees it.
//! * **Junk fill**: freed pages are filled with [`FREE_JUNK`], allocated pages
//!   with [`ALLOC_JUNK`].
//!
//! ## Failure Model
//!
//! * Running out of pages is an ordinary condition: [`PageAllocator::alloc`]
//!   returns [`AllocError::OutOfMemory`] and the caller decides what to do.
//! * Freeing an address that is misaligned or outside the managed range is a
//!   kernel bug and panics.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use kernel_alloc::{PageAllocator, PhysicalAddress, PhysicalRange};
//!
//! let kmem: PageAllocator<RiscvCpu> =
//!     unsafe { PageAllocator::new(NCPU, PhysicalRange::after_kernel(kernel_end)) }?;
//!
//! let page = kmem.alloc()?;
//! // ...
//! unsafe { kmem.free(page) };
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

mod address;
mod free_list;
mod page_alloc;

pub use address::{PhysicalAddress, PhysicalRange};
pub use page_alloc::{ALLOC_JUNK, AllocError, AllocInitError, FREE_JUNK, PageAllocator};
