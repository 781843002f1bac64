//! # Buffer Cache
//!
//! A fixed pool of buffers holding cached copies of disk blocks, hashed by
//! `(device, block)` into independently locked buckets. Each bucket keeps its
//! buffers on a circular list ordered by release time, most recent first.
//!
//! Interface:
//! * To get a buffer for a particular disk block, call [`BufferCache::read`].
//! * After changing buffer data, call [`BufferCache::write`] to write it to disk.
//! * When done with the buffer, call [`BufferCache::release`] (or drop it).
//! * Only one thread at a time can use a buffer, so do not keep them longer
//!   than necessary.
//!
//! Locking: bucket locks are spin locks and at most one is held at a time;
//! the per-buffer sleep lock is only ever acquired with no bucket lock held.

use crate::config::{CacheConfig, ConfigError};
use crate::device::{Block, BlockDevice, BlockId, Request};
use crate::lru::{Bucket, Links};
use alloc::boxed::Box;
use alloc::vec::Vec;
use core::cell::Cell;
use core::mem::ManuallyDrop;
use core::ops::{Deref, DerefMut};
use core::ptr;
use core::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicUsize, Ordering};
use kernel_info::param::BLOCK_SIZE;
use kernel_sync::{Scheduler, SleepLock, SleepLockGuard, SpinLock};
use log::{debug, trace};

/// One cache slot.
///
/// `key`, `bound` and `refcnt` change only under the lock of the bucket the
/// slot is linked into. `valid` is set by the sleep-lock holder and cleared
/// only while `refcnt == 0`, when there is no holder.
struct Slot<S> {
    key: AtomicU64,
    /// Whether `key` names a block. Fresh and given-back slots are unbound.
    bound: AtomicBool,
    refcnt: AtomicU32,
    valid: AtomicBool,
    data: SleepLock<Block, S>,
}

impl<S> Slot<S> {
    fn new() -> Self {
        Self {
            key: AtomicU64::new(0),
            bound: AtomicBool::new(false),
            refcnt: AtomicU32::new(0),
            valid: AtomicBool::new(false),
            data: SleepLock::new("buffer", [0; BLOCK_SIZE]),
        }
    }

    fn holds(&self, id: BlockId) -> bool {
        self.bound.load(Ordering::Relaxed) && self.key.load(Ordering::Relaxed) == id.key()
    }

    fn identity(&self) -> Option<BlockId> {
        self.bound
            .load(Ordering::Relaxed)
            .then(|| BlockId::from_key(self.key.load(Ordering::Relaxed)))
    }

    fn refcnt(&self) -> u32 {
        self.refcnt.load(Ordering::Relaxed)
    }
}

#[derive(Default)]
struct Counters {
    hits: AtomicUsize,
    misses: AtomicUsize,
    recycles: AtomicUsize,
    joins: AtomicUsize,
}

impl Counters {
    fn bump(counter: &AtomicUsize) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Lookup statistics since construction.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct CacheStats {
    /// `get` calls that found the block cached.
    pub hits: usize,
    /// `get` calls that did not.
    pub misses: usize,
    /// Slots re-bound to a new block.
    pub recycles: usize,
    /// Misses that found the block installed by a concurrent miss and joined it.
    pub joins: usize,
}

/// One slot as seen by [`BufferCache::resident`].
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct ResidentBlock {
    pub bucket: usize,
    pub slot: usize,
    /// `None` for a slot that has never held a block, or was given back.
    pub id: Option<BlockId>,
    pub refcnt: u32,
    pub valid: bool,
}

/// The block cache.
pub struct BufferCache<D, S> {
    device: D,
    buckets: Box<[SpinLock<Bucket>]>,
    links: Links,
    slots: Box<[Slot<S>]>,
    stats: Counters,
}

/// A cached block, locked for the exclusive use of the thread that obtained it.
///
/// Dereferences to the block's bytes. Dropping the guard is the same as
/// passing it to [`BufferCache::release`]: a guard moved to another thread
/// must not be dropped there.
pub struct BufferGuard<'a, D: BlockDevice, S: Scheduler> {
    cache: &'a BufferCache<D, S>,
    slot: usize,
    id: BlockId,
    data: ManuallyDrop<SleepLockGuard<'a, Block, S>>,
    /// Set once an ownership check has failed, so unwinding releases quietly.
    disowned: Cell<bool>,
}

/// Proof of one [`BufferCache::pin`]; hand it back to [`BufferCache::unpin`].
#[must_use = "a pinned block stays resident until it is unpinned"]
#[derive(Debug, Eq, PartialEq)]
pub struct PinnedBlock {
    slot: usize,
    id: BlockId,
}

impl PinnedBlock {
    #[inline]
    #[must_use]
    pub const fn id(&self) -> BlockId {
        self.id
    }
}

impl<D: BlockDevice, S: Scheduler> BufferCache<D, S> {
    /// Builds the pool. Every slot starts unbound and linked into bucket 0.
    ///
    /// # Errors
    /// If `config` describes an empty pool or hash table.
    pub fn new(device: D, config: CacheConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let links = Links::new(config.buffers(), config.buckets());
        let buckets: Box<[_]> = (0..config.buckets())
            .map(|b| SpinLock::new(Bucket::new(links.sentinel(b))))
            .collect();
        let slots: Box<[_]> = (0..config.buffers()).map(|_| Slot::new()).collect();

        buckets[0].with_lock(|first| {
            for slot in 0..slots.len() {
                first.push_front(&links, slot);
            }
        });

        debug!(
            "bcache: {} buffers of {BLOCK_SIZE} bytes in {} buckets",
            config.buffers(),
            config.buckets()
        );

        Ok(Self {
            device,
            buckets,
            links,
            slots,
            stats: Counters::default(),
        })
    }

    /// Returns the buffer for `(device, block)`, locked, with `valid` as found.
    ///
    /// On a miss a slot with no holders is re-bound to the block; its contents
    /// are stale until [`read`](Self::read) loads them.
    ///
    /// # Panics
    /// If the block is not cached and every slot is in use.
    pub fn get(&self, device: u32, block: u32) -> BufferGuard<'_, D, S> {
        let id = BlockId::new(device, block);
        let home = self.bucket_of(id);

        {
            let bucket = self.buckets[home].lock();
            if let Some(slot) = self.lookup(&bucket, id) {
                self.slots[slot].refcnt.fetch_add(1, Ordering::Relaxed);
                drop(bucket);
                Counters::bump(&self.stats.hits);
                trace!("bcache: hit {id:?} in slot {slot}");
                return self.lock_slot(slot, id);
            }
        }
        Counters::bump(&self.stats.misses);

        // Not cached; recycle an unused buffer from some other bucket.
        match self.take_unused(home, id) {
            Some(slot) => self.install(home, slot, id),
            None => self.recycle_at_home(home, id),
        }
    }

    /// Returns a locked buffer holding the current contents of the block.
    ///
    /// # Panics
    /// As [`get`](Self::get).
    pub fn read(&self, device: u32, block: u32) -> BufferGuard<'_, D, S> {
        let mut buf = self.get(device, block);
        if !buf.is_valid() {
            let id = buf.id;
            self.device.transfer(id, Request::Read(buf.data_mut()));
            self.slots[buf.slot].valid.store(true, Ordering::Relaxed);
        }
        buf
    }

    /// Writes the buffer's contents to disk, synchronously.
    ///
    /// # Panics
    /// If the calling thread does not hold the buffer, or the buffer belongs
    /// to a different cache.
    pub fn write(&self, buf: &BufferGuard<'_, D, S>) {
        self.assert_owned(buf, "bwrite");
        self.device.transfer(buf.id, Request::Write(buf.data()));
    }

    /// Unlocks the buffer and drops this holder's reference. A buffer with no
    /// references left becomes the most recently used entry of its bucket.
    ///
    /// # Panics
    /// If the calling thread does not hold the buffer, or the buffer belongs
    /// to a different cache.
    pub fn release(&self, buf: BufferGuard<'_, D, S>) {
        self.assert_owned(&buf, "brelse");
        drop(buf);
    }

    /// Adds a reference that keeps the block resident after `buf` is released.
    pub fn pin(&self, buf: &BufferGuard<'_, D, S>) -> PinnedBlock {
        self.buckets[self.bucket_of(buf.id)].with_lock(|_bucket| {
            self.slots[buf.slot].refcnt.fetch_add(1, Ordering::Relaxed);
        });
        PinnedBlock {
            slot: buf.slot,
            id: buf.id,
        }
    }

    /// Drops the reference taken by [`pin`](Self::pin). The list position is
    /// left alone.
    ///
    /// # Panics
    /// If the block is not pinned here, i.e. `pin` came from another cache.
    pub fn unpin(&self, pin: PinnedBlock) {
        self.buckets[self.bucket_of(pin.id)].with_lock(|_bucket| {
            let pinned = self
                .slots
                .get(pin.slot)
                .filter(|slot| slot.holds(pin.id) && slot.refcnt() > 0);
            let Some(slot) = pinned else {
                panic!("bunpin: {:?} is not pinned", pin.id);
            };
            slot.refcnt.fetch_sub(1, Ordering::Relaxed);
        });
    }

    #[inline]
    #[must_use]
    pub const fn device(&self) -> &D {
        &self.device
    }

    #[must_use]
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.stats.hits.load(Ordering::Relaxed),
            misses: self.stats.misses.load(Ordering::Relaxed),
            recycles: self.stats.recycles.load(Ordering::Relaxed),
            joins: self.stats.joins.load(Ordering::Relaxed),
        }
    }

    /// Snapshot of every slot, bucket by bucket, most recently used first.
    ///
    /// Buckets are locked one at a time, so the snapshot is only consistent
    /// when no other thread is using the cache.
    #[must_use]
    pub fn resident(&self) -> Vec<ResidentBlock> {
        let mut out = Vec::with_capacity(self.slots.len());
        for (index, bucket) in self.buckets.iter().enumerate() {
            let bucket = bucket.lock();
            out.extend(bucket.mru(&self.links).map(|slot| {
                let s = &self.slots[slot];
                ResidentBlock {
                    bucket: index,
                    slot,
                    id: s.identity(),
                    refcnt: s.refcnt(),
                    valid: s.valid.load(Ordering::Relaxed),
                }
            }));
        }
        out
    }

    #[allow(clippy::cast_possible_truncation)]
    fn bucket_of(&self, id: BlockId) -> usize {
        (id.key() % self.buckets.len() as u64) as usize
    }

    fn lookup(&self, bucket: &Bucket, id: BlockId) -> Option<usize> {
        bucket
            .mru(&self.links)
            .find(|&slot| self.slots[slot].holds(id))
    }

    fn find_unused(&self, bucket: &Bucket) -> Option<usize> {
        bucket
            .lru(&self.links)
            .find(|&slot| self.slots[slot].refcnt() == 0)
    }

    fn bind(&self, slot: usize, id: BlockId) {
        let s = &self.slots[slot];
        s.key.store(id.key(), Ordering::Relaxed);
        s.bound.store(true, Ordering::Relaxed);
        s.valid.store(false, Ordering::Relaxed);
        s.refcnt.store(1, Ordering::Relaxed);
        Counters::bump(&self.stats.recycles);
    }

    fn unbind(&self, slot: usize) {
        let s = &self.slots[slot];
        s.bound.store(false, Ordering::Relaxed);
        s.valid.store(false, Ordering::Relaxed);
        s.refcnt.store(0, Ordering::Relaxed);
    }

    /// Binds the least recently used unused slot of the first other bucket
    /// that has one to `id` and detaches it. Buckets are visited in ascending
    /// order, skipping `home`, one lock at a time.
    fn take_unused(&self, home: usize, id: BlockId) -> Option<usize> {
        (0..self.buckets.len())
            .filter(|&victim| victim != home)
            .find_map(|victim| {
                let mut bucket = self.buckets[victim].lock();
                let slot = self.find_unused(&bucket)?;
                self.bind(slot, id);
                bucket.unlink(&self.links, slot);
                trace!("bcache: miss {id:?}, took slot {slot} from bucket {victim}");
                Some(slot)
            })
    }

    /// Links a freshly bound, detached `slot` into the block's home bucket.
    ///
    /// Another miss for the same block may have installed a slot since the
    /// hit check. In that case this caller joins the installed slot and the
    /// fresh one is unbound and parked at the least recently used end.
    fn install(&self, home: usize, slot: usize, id: BlockId) -> BufferGuard<'_, D, S> {
        let target = {
            let mut bucket = self.buckets[home].lock();
            if let Some(existing) = self.lookup(&bucket, id) {
                self.slots[existing]
                    .refcnt
                    .fetch_add(1, Ordering::Relaxed);
                self.unbind(slot);
                bucket.push_back(&self.links, slot);
                Counters::bump(&self.stats.joins);
                trace!("bcache: {id:?} raced in as slot {existing}, parked slot {slot}");
                existing
            } else {
                bucket.push_front(&self.links, slot);
                slot
            }
        };
        self.lock_slot(target, id)
    }

    /// Last resort of the miss path: re-bind an unused slot of the home bucket
    /// in place.
    fn recycle_at_home(&self, home: usize, id: BlockId) -> BufferGuard<'_, D, S> {
        let slot = {
            let mut bucket = self.buckets[home].lock();
            if let Some(existing) = self.lookup(&bucket, id) {
                self.slots[existing]
                    .refcnt
                    .fetch_add(1, Ordering::Relaxed);
                Counters::bump(&self.stats.joins);
                existing
            } else {
                let Some(slot) = self.find_unused(&bucket) else {
                    panic!("bget: no buffers for {id:?}");
                };
                self.bind(slot, id);
                bucket.move_to_front(&self.links, slot);
                trace!("bcache: miss {id:?}, reused slot {slot} in place");
                slot
            }
        };
        self.lock_slot(slot, id)
    }

    fn lock_slot(&self, slot: usize, id: BlockId) -> BufferGuard<'_, D, S> {
        BufferGuard {
            cache: self,
            slot,
            id,
            data: ManuallyDrop::new(self.slots[slot].data.lock()),
            disowned: Cell::new(false),
        }
    }

    /// Drops one reference after the sleep lock has been released.
    fn unref(&self, slot: usize, id: BlockId) {
        let mut bucket = self.buckets[self.bucket_of(id)].lock();
        let s = &self.slots[slot];
        let before = s.refcnt.fetch_sub(1, Ordering::Relaxed);
        assert!(before > 0, "brelse: {id:?} has no references");
        if before == 1 {
            // No one is waiting for it.
            bucket.move_to_front(&self.links, slot);
        }
    }

    fn assert_owned(&self, buf: &BufferGuard<'_, D, S>, op: &str) {
        assert!(
            ptr::eq(buf.cache, self),
            "{op}: {:?} belongs to another cache",
            buf.id
        );
        if !buf.holding() {
            buf.disowned.set(true);
            panic!("{op}: {:?} is not held by this thread", buf.id);
        }
    }
}

impl<D: BlockDevice, S: Scheduler> BufferGuard<'_, D, S> {
    #[inline]
    #[must_use]
    pub const fn id(&self) -> BlockId {
        self.id
    }

    #[inline]
    #[must_use]
    pub const fn device(&self) -> u32 {
        self.id.device
    }

    #[inline]
    #[must_use]
    pub const fn block_no(&self) -> u32 {
        self.id.block
    }

    /// Whether the payload reflects the on-disk contents.
    #[inline]
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.cache.slots[self.slot].valid.load(Ordering::Relaxed)
    }

    /// Whether the calling thread holds this buffer's lock.
    #[inline]
    #[must_use]
    pub fn holding(&self) -> bool {
        self.data.holding()
    }

    /// Current number of references, including this holder's.
    #[must_use]
    pub fn ref_count(&self) -> u32 {
        let cache = self.cache;
        cache.buckets[cache.bucket_of(self.id)].with_lock(|_bucket| cache.slots[self.slot].refcnt())
    }

    #[inline]
    #[must_use]
    pub fn data(&self) -> &Block {
        &self.data
    }

    #[inline]
    pub fn data_mut(&mut self) -> &mut Block {
        &mut self.data
    }
}

impl<D: BlockDevice, S: Scheduler> Deref for BufferGuard<'_, D, S> {
    type Target = Block;

    fn deref(&self) -> &Block {
        &self.data
    }
}

impl<D: BlockDevice, S: Scheduler> DerefMut for BufferGuard<'_, D, S> {
    fn deref_mut(&mut self) -> &mut Block {
        &mut self.data
    }
}

impl<D: BlockDevice, S: Scheduler> Drop for BufferGuard<'_, D, S> {
    fn drop(&mut self) {
        assert!(
            self.disowned.get() || self.holding(),
            "brelse: {:?} is not held by this thread",
            self.id
        );
        // Safety: `data` is not touched again after this.
        unsafe { ManuallyDrop::drop(&mut self.data) };
        self.cache.unref(self.slot, self.id);
    }
}
