//! Resident-Block Gauge
//!
//! Each block cache owns a [`ResidentBlocksGauge`]. It keeps a local atomic
//! count (so tests and diagnostics can observe a single cache in isolation)
//! and mirrors every change into the process-wide
//! [`BLOCKS_IN_CACHE`](crate::metrics::BLOCKS_IN_CACHE) Prometheus gauge.
//!
//! ## Accounting Contract
//!
//! - `inc()` exactly once when a block transitions into `Ready` and is
//!   retained by the cache
//! - `dec()` exactly once when a `Ready` block is evicted or its cache closes
//! - after a cache is fully closed its local count is exactly 0
//!
//! The gauge itself never exceeds the cache capacity because eviction happens
//! under the same lock as insertion; there is no settling window.
//!
//! Cloning a gauge clones a handle to the same counter, so a clone taken
//! before a cache closes still observes the final count afterwards.

use crate::metrics::BLOCKS_IN_CACHE;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

/// Thread-safe count of blocks resident in one cache.
#[derive(Debug, Clone, Default)]
pub struct ResidentBlocksGauge {
    local: Arc<AtomicI64>,
}

impl ResidentBlocksGauge {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a block transitioning into `Ready`.
    pub fn inc(&self) {
        self.local.fetch_add(1, Ordering::SeqCst);
        BLOCKS_IN_CACHE.inc();
    }

    /// Record a `Ready` block leaving the cache.
    pub fn dec(&self) {
        self.local.fetch_sub(1, Ordering::SeqCst);
        BLOCKS_IN_CACHE.dec();
    }

    /// Current resident-block count for this cache.
    pub fn get(&self) -> i64 {
        self.local.load(Ordering::SeqCst)
    }
}
