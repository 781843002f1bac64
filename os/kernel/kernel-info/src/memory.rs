//! # Memory Layout

/// Bytes per physical page.
pub const PAGE_SIZE: u64 = 4096;

/// log2 of [`PAGE_SIZE`].
pub const PAGE_SHIFT: u32 = 12;

/// Start of RAM; the kernel image is loaded here.
pub const KERNBASE: u64 = 0x8000_0000;

/// End of the RAM the page allocator manages.
pub const PHYSTOP: u64 = KERNBASE + 128 * 1024 * 1024;

/// Rounds `addr` up to the next page boundary.
#[inline]
#[must_use]
pub const fn page_round_up(addr: u64) -> u64 {
    (addr + PAGE_SIZE - 1) & !(PAGE_SIZE - 1)
}

/// Rounds `addr` down to the page boundary containing it.
#[inline]
#[must_use]
pub const fn page_round_down(addr: u64) -> u64 {
    addr & !(PAGE_SIZE - 1)
}

/// Whether `addr` lies on a page boundary.
#[inline]
#[must_use]
pub const fn is_page_aligned(addr: u64) -> bool {
    addr & (PAGE_SIZE - 1) == 0
}

const _: () = {
    assert!(PAGE_SIZE == 1 << PAGE_SHIFT);
    assert!(is_page_aligned(KERNBASE));
    assert!(is_page_aligned(PHYSTOP));
    assert!(PHYSTOP > KERNBASE);
};
