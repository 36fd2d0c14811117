//! Bounded cache of decoded blocks.
//!
//! Decoding is forward-only, so a cache only saves work when every block of
//! a read window is present. Entries are evicted in insertion order.
//!
//! Block indices depend on the block size, so the size is part of the key and
//! readers with different block sizes can share one cache.

use log::trace;
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// `(source path, block size, block index)`
type BlockKey = (PathBuf, usize, u64);

/// Decoded blocks keyed by `(source path, block size, block index)`.
#[derive(Debug)]
pub struct BlockCache {
    capacity: usize,
    inner: Mutex<CacheInner>,
    hits: AtomicU64,
    misses: AtomicU64,
}

#[derive(Debug, Default)]
struct CacheInner {
    blocks: HashMap<BlockKey, Arc<[u8]>>,
    order: VecDeque<BlockKey>,
}

impl BlockCache {
    /// Create a cache holding at most `capacity` blocks. `0` disables it.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            inner: Mutex::new(CacheInner::default()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Maximum number of cached blocks.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of blocks currently cached.
    pub fn len(&self) -> usize {
        self.lock().blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Lookups that found a block.
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    /// Lookups that missed.
    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    /// Fetch a cached block.
    pub fn get(&self, source: &Path, block_size: usize, index: u64) -> Option<Arc<[u8]>> {
        let block = self
            .lock()
            .blocks
            .get(&(source.to_path_buf(), block_size, index))
            .cloned();
        match block {
            Some(_) => self.hits.fetch_add(1, Ordering::Relaxed),
            None => self.misses.fetch_add(1, Ordering::Relaxed),
        };
        block
    }

    /// Store a decoded block, evicting the oldest entries when full.
    pub fn insert(&self, source: &Path, block_size: usize, index: u64, data: &[u8]) {
        if self.capacity == 0 {
            return;
        }

        let key = (source.to_path_buf(), block_size, index);
        let mut inner = self.lock();
        if inner.blocks.contains_key(&key) {
            return;
        }

        while inner.blocks.len() >= self.capacity {
            match inner.order.pop_front() {
                Some(oldest) => {
                    trace!(
                        "evicting block {} ({} bytes) of {}",
                        oldest.2,
                        oldest.1,
                        oldest.0.display()
                    );
                    inner.blocks.remove(&oldest);
                }
                None => break,
            }
        }

        inner.order.push_back(key.clone());
        inner.blocks.insert(key, Arc::from(data));
    }

    /// Drop every cached block.
    pub fn clear(&self) {
        let mut inner = self.lock();
        inner.blocks.clear();
        inner.order.clear();
    }

    // The map is never left half-updated, so a poisoned lock is still usable.
    fn lock(&self) -> MutexGuard<'_, CacheInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
