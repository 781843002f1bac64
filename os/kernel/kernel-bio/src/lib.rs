//! # Block Buffer Cache
//!
//! Caches disk blocks in memory so that repeated reads skip the disk, and
//! serializes access so that at most one thread at a time works on the cached
//! copy of a given block.
//!
//! ## Architecture
//!
//! ```text
//!   read(dev, block)
//!         │  hash(dev, block) % buckets
//!   ┌─────▼──────────────────┐   miss, nothing unused at home
//!   │ bucket k: SpinLock<..> │ ─────────────────────────────▶ buckets 0, 1, … (skip k)
//!   └─────┬──────────────────┘                               take LRU slot with refcnt 0
//!         │ hit / installed
//!   ┌─────▼──────────────────┐
//!   │ slot: SleepLock<Block> │ ──▶ BlockDevice::transfer (only if not valid)
//!   └────────────────────────┘
//! ```
//!
//! * **Buckets**: each bucket has its own spin lock and a circular list of its
//!   slots, most recently released first. Lookups for different buckets do not
//!   contend.
//! * **Uniqueness**: a block is cached in at most one slot at any time.
//! * **Recycling**: only slots with no references are re-bound; they are
//!   taken from the least recently used end of the first bucket that has one.
//! * **Exclusivity**: the slot's data is behind a [`SleepLock`](kernel_sync::SleepLock),
//!   so holders may be suspended across disk transfers.
//!
//! ## Failure Model
//!
//! All failures are kernel bugs and panic: every slot in use on a miss,
//! writing or releasing a buffer the calling thread does not hold, unpinning
//! a block that is not pinned.
//!
//! ## Usage
//!
//! ```rust
//! use kernel_bio::{BlockId, BufferCache, CacheConfig, RamDisk};
//! use kernel_sync::hosted::HostScheduler;
//!
//! let cache: BufferCache<_, HostScheduler> =
//!     BufferCache::new(RamDisk::new(1, 64), CacheConfig::default()).unwrap();
//!
//! let mut buf = cache.read(0, 7);
//! buf[0] = 0xAB;
//! cache.write(&buf);
//! cache.release(buf);
//!
//! assert_eq!(cache.device().load(BlockId::new(0, 7))[0], 0xAB);
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

extern crate alloc;

mod cache;
mod config;
mod device;
mod lru;

pub use cache::{BufferCache, BufferGuard, CacheStats, PinnedBlock, ResidentBlock};
pub use config::{CacheConfig, ConfigError};
pub use device::{Block, BlockDevice, BlockId, RamDisk, Request};
