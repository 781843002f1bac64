use core::fmt;
use core::ops::{Add, AddAssign};
use kernel_info::memory::{PAGE_SIZE, PHYSTOP, is_page_aligned, page_round_up};

/// Physical memory address.
///
/// Physical RAM is direct-mapped, so a `PhysicalAddress` handed out by the
/// allocator is also a usable kernel pointer (see [`PhysicalAddress::as_mut_ptr`]).
#[repr(transparent)]
#[derive(Copy, Clone, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct PhysicalAddress(u64);

impl PhysicalAddress {
    #[inline]
    #[must_use]
    pub const fn new(v: u64) -> Self {
        Self(v)
    }

    #[inline]
    #[must_use]
    pub fn from_ptr<T>(ptr: *const T) -> Self {
        Self(ptr as usize as u64)
    }

    #[inline]
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// The direct-mapped pointer for this address.
    #[inline]
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn as_mut_ptr<T>(self) -> *mut T {
        self.0 as usize as *mut T
    }

    #[inline]
    #[must_use]
    pub const fn is_page_aligned(self) -> bool {
        is_page_aligned(self.0)
    }
}

impl fmt::Debug for PhysicalAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PA(0x{:016X})", self.0)
    }
}

impl fmt::Display for PhysicalAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:016X}", self.0)
    }
}

impl From<u64> for PhysicalAddress {
    #[inline]
    fn from(v: u64) -> Self {
        Self::new(v)
    }
}

impl Add<u64> for PhysicalAddress {
    type Output = Self;
    #[inline]
    fn add(self, rhs: u64) -> Self::Output {
        Self(self.0 + rhs)
    }
}

impl AddAssign<u64> for PhysicalAddress {
    #[inline]
    fn add_assign(&mut self, rhs: u64) {
        self.0 += rhs;
    }
}

/// Half-open range `[start, end)` of physical memory handed to the allocator.
///
/// Only whole pages count: the first managed page is `start` rounded up, and a
/// trailing partial page before `end` is ignored.
#[derive(Copy, Clone, Eq, PartialEq, Hash)]
pub struct PhysicalRange {
    start: PhysicalAddress,
    end: PhysicalAddress,
}

impl PhysicalRange {
    #[must_use]
    pub const fn new(start: PhysicalAddress, end: PhysicalAddress) -> Self {
        Self { start, end }
    }

    /// Free RAM between the end of the kernel image and [`PHYSTOP`].
    #[must_use]
    pub const fn after_kernel(kernel_end: PhysicalAddress) -> Self {
        Self::new(kernel_end, PhysicalAddress::new(PHYSTOP))
    }

    #[inline]
    #[must_use]
    pub const fn start(&self) -> PhysicalAddress {
        self.start
    }

    #[inline]
    #[must_use]
    pub const fn end(&self) -> PhysicalAddress {
        self.end
    }

    /// The lowest page-aligned address in the range.
    #[inline]
    #[must_use]
    pub const fn first_page(&self) -> PhysicalAddress {
        PhysicalAddress::new(page_round_up(self.start.as_u64()))
    }

    /// Number of whole pages in the range.
    #[must_use]
    pub const fn page_count(&self) -> u64 {
        let first = self.first_page().as_u64();
        let end = self.end.as_u64();
        if first >= end {
            0
        } else {
            (end - first) / PAGE_SIZE
        }
    }

    /// Whether `page` is a page-aligned address of a whole page in the range.
    #[must_use]
    pub const fn contains_page(&self, page: PhysicalAddress) -> bool {
        let (page, end) = (page.as_u64(), self.end.as_u64());
        // `end - page` instead of `page + PAGE_SIZE`: no wrap at the top page.
        PhysicalAddress::new(page).is_page_aligned()
            && page >= self.first_page().as_u64()
            && page < end
            && end - page >= PAGE_SIZE
    }

    /// Iterates the page-aligned addresses of all whole pages, lowest first.
    pub fn pages(&self) -> impl Iterator<Item = PhysicalAddress> + use<> {
        let first = self.first_page().as_u64();
        (0..self.page_count()).map(move |i| PhysicalAddress::new(first + i * PAGE_SIZE))
    }
}

impl fmt::Debug for PhysicalRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}
