//! # Kernel Parameters

/// Maximum number of CPUs; one page free list exists per CPU.
pub const NCPU: usize = 8;

/// Maximum number of blocks any file-system operation writes.
pub const MAXOPBLOCKS: usize = 10;

/// Number of buffer slots in the block cache.
pub const NBUF: usize = MAXOPBLOCKS * 3;

/// Number of hash buckets in the block cache.
///
/// A prime keeps `(dev << 32 | blockno) % NBUCKET` spread across buckets.
pub const NBUCKET: usize = 13;

/// Size of a disk block in bytes.
pub const BLOCK_SIZE: usize = 1024;

const _: () = {
    assert!(NCPU > 0);
    assert!(NBUF >= NBUCKET);
    assert!(BLOCK_SIZE.is_power_of_two());
};
