//! # Block Device Contract

use alloc::vec;
use alloc::vec::Vec;
use core::fmt;
use core::sync::atomic::{AtomicUsize, Ordering};
use kernel_info::param::BLOCK_SIZE;
use kernel_sync::SpinLock;

/// One disk block's worth of bytes.
pub type Block = [u8; BLOCK_SIZE];

/// A `(device, block number)` pair naming one disk block.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct BlockId {
    pub device: u32,
    pub block: u32,
}

impl BlockId {
    #[inline]
    #[must_use]
    pub const fn new(device: u32, block: u32) -> Self {
        Self { device, block }
    }

    /// Device in the high half, block number in the low half.
    #[inline]
    #[must_use]
    pub const fn key(self) -> u64 {
        ((self.device as u64) << 32) | self.block as u64
    }

    #[inline]
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn from_key(key: u64) -> Self {
        Self::new((key >> 32) as u32, key as u32)
    }
}

impl fmt::Debug for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.device, self.block)
    }
}

/// Direction and payload of a single-block transfer.
pub enum Request<'a> {
    /// Disk to memory.
    Read(&'a mut Block),
    /// Memory to disk.
    Write(&'a Block),
}

/// Synchronous block device driver.
///
/// `transfer` returns only once the block has been moved; the calling thread
/// may be suspended meanwhile, so callers must not hold a spin lock. I/O errors
/// are the driver's business and are not reported here.
pub trait BlockDevice {
    fn transfer(&self, id: BlockId, request: Request<'_>);
}

impl<D: BlockDevice + ?Sized> BlockDevice for &D {
    fn transfer(&self, id: BlockId, request: Request<'_>) {
        (**self).transfer(id, request);
    }
}

/// Memory-backed block device serving `devices` devices of `blocks` blocks each.
///
/// Accessing a device or block outside that geometry panics, just as a real
/// driver would refuse to address past the end of the disk.
pub struct RamDisk {
    devices: u32,
    blocks: u32,
    data: SpinLock<Vec<Block>>,
    reads: AtomicUsize,
    writes: AtomicUsize,
}

impl RamDisk {
    #[must_use]
    pub fn new(devices: u32, blocks: u32) -> Self {
        Self {
            devices,
            blocks,
            data: SpinLock::new(vec![[0; BLOCK_SIZE]; devices as usize * blocks as usize]),
            reads: AtomicUsize::new(0),
            writes: AtomicUsize::new(0),
        }
    }

    /// Overwrites a block directly, bypassing any cache.
    pub fn store(&self, id: BlockId, block: &Block) {
        let index = self.index(id);
        self.data.with_lock(|data| data[index] = *block);
    }

    /// Copies a block out directly, bypassing any cache.
    #[must_use]
    pub fn load(&self, id: BlockId) -> Block {
        let index = self.index(id);
        self.data.with_lock(|data| data[index])
    }

    /// Number of read transfers served.
    #[must_use]
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::Relaxed)
    }

    /// Number of write transfers served.
    #[must_use]
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::Relaxed)
    }

    fn index(&self, id: BlockId) -> usize {
        assert!(
            id.device < self.devices && id.block < self.blocks,
            "ramdisk: block {id:?} out of range ({} devices x {} blocks)",
            self.devices,
            self.blocks
        );
        id.device as usize * self.blocks as usize + id.block as usize
    }
}

impl BlockDevice for RamDisk {
    fn transfer(&self, id: BlockId, request: Request<'_>) {
        let index = self.index(id);
        match request {
            Request::Read(buf) => {
                self.data.with_lock(|data| *buf = data[index]);
                self.reads.fetch_add(1, Ordering::Relaxed);
            }
            Request::Write(buf) => {
                self.data.with_lock(|data| data[index] = *buf);
                self.writes.fetch_add(1, Ordering::Relaxed);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_round_trips_device_and_block() {
        let id = BlockId::new(0xDEAD, 0xBEEF);
        assert_eq!(id.key(), 0x0000_DEAD_0000_BEEF);
        assert_eq!(BlockId::from_key(id.key()), id);
    }

    #[test]
    fn devices_do_not_alias() {
        let disk = RamDisk::new(2, 4);
        disk.store(BlockId::new(0, 3), &[7; BLOCK_SIZE]);
        assert_eq!(disk.load(BlockId::new(1, 3)), [0; BLOCK_SIZE]);

        let mut buf = [0; BLOCK_SIZE];
        disk.transfer(BlockId::new(0, 3), Request::Read(&mut buf));
        assert_eq!(buf, [7; BLOCK_SIZE]);
        assert_eq!((disk.reads(), disk.writes()), (1, 0));
    }

    #[test]
    #[should_panic(expected = "ramdisk")]
    fn out_of_range_block_is_fatal() {
        let disk = RamDisk::new(1, 4);
        let _ = disk.load(BlockId::new(0, 4));
    }
}
