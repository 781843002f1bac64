use kernel_info::param::{NBUCKET, NBUF};

/// Size of the buffer pool and of its hash table.
///
/// ```rust
/// use kernel_bio::CacheConfig;
///
/// let config = CacheConfig::default().with_buffers(64).with_buckets(7);
/// assert_eq!(config.buffers(), 64);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct CacheConfig {
    buffers: usize,
    buckets: usize,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("the buffer pool needs at least one buffer")]
    NoBuffers,
    #[error("the hash table needs at least one bucket")]
    NoBuckets,
}

impl CacheConfig {
    #[must_use]
    pub const fn new(buffers: usize, buckets: usize) -> Self {
        Self { buffers, buckets }
    }

    #[inline]
    #[must_use]
    pub const fn with_buffers(mut self, buffers: usize) -> Self {
        self.buffers = buffers;
        self
    }

    #[inline]
    #[must_use]
    pub const fn with_buckets(mut self, buckets: usize) -> Self {
        self.buckets = buckets;
        self
    }

    #[inline]
    #[must_use]
    pub const fn buffers(&self) -> usize {
        self.buffers
    }

    #[inline]
    #[must_use]
    pub const fn buckets(&self) -> usize {
        self.buckets
    }

    /// # Errors
    /// If either the pool or the hash table would be empty.
    pub const fn validate(&self) -> Result<(), ConfigError> {
        if self.buffers == 0 {
            return Err(ConfigError::NoBuffers);
        }
        if self.buckets == 0 {
            return Err(ConfigError::NoBuckets);
        }
        Ok(())
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self::new(NBUF, NBUCKET)
    }
}
