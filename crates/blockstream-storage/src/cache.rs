//! Block Cache with LRU Eviction
//!
//! This module implements the bounded, in-memory block cache that sits
//! beneath the stream facade.
//!
//! ## Why Caching?
//!
//! Object stores have high latency (~50-200ms per ranged GET). Without
//! caching every read would pay that latency; with it, re-reads of a resident
//! block complete in microseconds and sequential scans hit the cache for
//! every byte after the first of a block.
//!
//! ## Capacity Bound
//!
//! The cache holds at most `max_blocks` `Ready` blocks, no matter the access
//! pattern. When an insert would exceed the bound, the **Least Recently
//! Used** resident block is evicted first, ties broken by insertion order:
//!
//! ```text
//! Cache (max 3 blocks):
//! 1. Insert block 0 -> [0]
//! 2. Insert block 1 -> [0, 1]
//! 3. Insert block 2 -> [0, 1, 2]  (full!)
//! 4. Insert block 3 -> evict 0 (LRU) -> [1, 2, 3]
//! 5. Get block 1    -> touch        -> [2, 3, 1]
//! 6. Insert block 4 -> evict 2 (LRU) -> [3, 1, 4]
//! ```
//!
//! Eviction happens synchronously under the cache lock, so the resident-block
//! gauge never exceeds `max_blocks`, not even transiently. Re-inserting or
//! touching an already-resident block never evicts.
//!
//! ## Eviction-Safe Reads
//!
//! Payloads are `bytes::Bytes`: immutable once committed, refcount-cloned on
//! read. Evicting a block only drops the cache's reference - data already
//! handed to a reader stays valid, so no reader ever observes torn or freed
//! memory.
//!
//! Blocks being fetched are not in this cache at all (they live in the
//! fetcher's pending registry), which is what makes them structurally
//! impossible to evict.

use crate::error::{Error, Result};
use blockstream_core::BlockState;
use blockstream_observability::metrics::{CACHE_HITS_TOTAL, CACHE_MISSES_TOTAL, EVICTIONS_TOTAL};
use blockstream_observability::ResidentBlocksGauge;
use bytes::Bytes;
use lru::LruCache;
use std::collections::HashSet;
use std::num::NonZeroUsize;
use tokio::sync::Mutex;

/// Bounded in-memory cache of `Ready` blocks for a single object.
pub struct BlockCache {
    capacity: NonZeroUsize,
    inner: Mutex<Inner>,
    gauge: ResidentBlocksGauge,
}

struct Inner {
    /// Resident blocks in recency order. Payloads are immutable.
    blocks: LruCache<u64, Bytes>,

    /// Indices that were `Ready` at some point and have since been removed.
    /// Bounded by the object's block count.
    evicted: HashSet<u64>,

    closed: bool,
}

impl BlockCache {
    /// Create a cache bounded to `max_blocks` resident blocks.
    pub fn new(max_blocks: usize) -> Result<Self> {
        let capacity = NonZeroUsize::new(max_blocks).ok_or_else(|| {
            Error::InvalidArgument("max_blocks must be at least 1".to_string())
        })?;

        Ok(Self {
            capacity,
            inner: Mutex::new(Inner {
                blocks: LruCache::new(capacity),
                evicted: HashSet::new(),
                closed: false,
            }),
            gauge: ResidentBlocksGauge::new(),
        })
    }

    /// Look up block `index`, marking it most-recently-used on a hit.
    ///
    /// Returns `Ok(None)` on a miss and fails once the cache is closed.
    pub async fn get(&self, index: u64) -> Result<Option<Bytes>> {
        let mut inner = self.inner.lock().await;
        if inner.closed {
            return Err(Error::CacheClosed);
        }

        match inner.blocks.get(&index) {
            Some(data) => {
                CACHE_HITS_TOTAL.inc();
                Ok(Some(data.clone()))
            }
            None => {
                CACHE_MISSES_TOTAL.inc();
                Ok(None)
            }
        }
    }

    /// Commit a fetched block. Called by the fetcher on completion.
    ///
    /// Evicts the least-recently-used resident block first when inserting a
    /// new index at capacity. Re-inserting a resident index only refreshes it
    /// (touch, no eviction, no gauge change). Inserts arriving after `close`
    /// are discarded - late fetch completions must not resurrect a torn-down
    /// cache.
    pub async fn insert(&self, index: u64, data: Bytes) {
        let mut inner = self.inner.lock().await;
        if inner.closed {
            tracing::debug!(index, "Discarding block committed after cache close");
            return;
        }

        if inner.blocks.contains(&index) {
            inner.blocks.put(index, data);
            return;
        }

        if inner.blocks.len() == self.capacity.get() {
            if let Some((evicted, _)) = inner.blocks.pop_lru() {
                inner.evicted.insert(evicted);
                self.gauge.dec();
                EVICTIONS_TOTAL.inc();
                tracing::debug!(index = evicted, "Evicted least recently used block");
            }
        }

        inner.evicted.remove(&index);
        inner.blocks.put(index, data);
        self.gauge.inc();
        tracing::debug!(index, resident = self.gauge.get(), "Cached block");
    }

    /// Lifecycle state of `index` as far as the cache knows. The fetcher
    /// layers `Fetching` on top of this via its pending registry.
    pub async fn state_of(&self, index: u64) -> BlockState {
        let inner = self.inner.lock().await;
        if inner.blocks.peek(&index).is_some() {
            BlockState::Ready
        } else if inner.evicted.contains(&index) {
            BlockState::Evicted
        } else {
            BlockState::Empty
        }
    }

    /// Evict every resident block and reject further use. Idempotent.
    pub async fn close(&self) {
        let mut inner = self.inner.lock().await;
        if inner.closed {
            return;
        }
        inner.closed = true;

        while let Some((index, _)) = inner.blocks.pop_lru() {
            inner.evicted.insert(index);
            self.gauge.dec();
            tracing::debug!(index, "Evicted block on cache close");
        }
    }

    /// Number of `Ready` blocks currently resident. Lock-free.
    pub fn resident_blocks(&self) -> i64 {
        self.gauge.get()
    }

    /// Handle to this cache's resident-block gauge. A clone taken before
    /// close still observes the final count afterwards.
    pub fn gauge(&self) -> ResidentBlocksGauge {
        self.gauge.clone()
    }

    /// Configured resident-block bound.
    pub fn capacity(&self) -> usize {
        self.capacity.get()
    }

    /// Cache statistics snapshot.
    pub async fn stats(&self) -> CacheStats {
        let inner = self.inner.lock().await;
        CacheStats {
            resident_blocks: inner.blocks.len(),
            capacity: self.capacity.get(),
            closed: inner.closed,
        }
    }
}

/// Point-in-time view of a cache.
#[derive(Debug, Clone)]
pub struct CacheStats {
    /// Number of `Ready` blocks currently resident
    pub resident_blocks: usize,

    /// Configured maximum resident blocks
    pub capacity: usize,

    /// Whether the cache has been closed
    pub closed: bool,
}
