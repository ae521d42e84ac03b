//! Prometheus Metrics for the Read Path
//!
//! All metrics are process-global and registered once into [`REGISTRY`].
//! Components update them directly; nothing here stores state of its own.
//!
//! ## Metric Inventory
//!
//! - `blockstream_blocks_in_cache` - resident `Ready` blocks, across caches
//! - `blockstream_cache_hits_total` / `blockstream_cache_misses_total`
//! - `blockstream_fetches_total` / `blockstream_fetch_errors_total`
//! - `blockstream_fetch_latency_seconds` - backend range-GET latency
//! - `blockstream_prefetches_total` - background block fetches
//! - `blockstream_evictions_total` - LRU evictions under capacity pressure

use lazy_static::lazy_static;
use prometheus::{Histogram, HistogramOpts, IntCounter, IntGauge, Registry};
use std::sync::Once;

static INIT: Once = Once::new();

lazy_static! {
    /// Global Prometheus metrics registry
    pub static ref REGISTRY: Registry = Registry::new();

    /// Number of blocks currently resident in block caches.
    ///
    /// Incremented exactly once when a block becomes `Ready`, decremented
    /// exactly once when a `Ready` block is evicted or its cache is closed.
    pub static ref BLOCKS_IN_CACHE: IntGauge = IntGauge::new(
        "blockstream_blocks_in_cache",
        "Blocks currently resident in block caches"
    ).expect("metric can be created");

    /// Cache hits (block already resident)
    pub static ref CACHE_HITS_TOTAL: IntCounter = IntCounter::new(
        "blockstream_cache_hits_total",
        "Total block cache hits"
    ).expect("metric can be created");

    /// Cache misses (block required a fetch)
    pub static ref CACHE_MISSES_TOTAL: IntCounter = IntCounter::new(
        "blockstream_cache_misses_total",
        "Total block cache misses"
    ).expect("metric can be created");

    /// Backend range fetches dispatched (after de-duplication)
    pub static ref FETCHES_TOTAL: IntCounter = IntCounter::new(
        "blockstream_fetches_total",
        "Total backend block fetches dispatched"
    ).expect("metric can be created");

    /// Backend fetches that failed
    pub static ref FETCH_ERRORS_TOTAL: IntCounter = IntCounter::new(
        "blockstream_fetch_errors_total",
        "Total failed backend block fetches"
    ).expect("metric can be created");

    /// Backend fetch latency
    pub static ref FETCH_LATENCY_SECONDS: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            "blockstream_fetch_latency_seconds",
            "Backend block fetch latency in seconds"
        )
        .buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0])
    ).expect("metric can be created");

    /// Blocks fetched ahead of the read cursor
    pub static ref PREFETCHES_TOTAL: IntCounter = IntCounter::new(
        "blockstream_prefetches_total",
        "Total blocks prefetched ahead of the read cursor"
    ).expect("metric can be created");

    /// Blocks evicted under capacity pressure
    pub static ref EVICTIONS_TOTAL: IntCounter = IntCounter::new(
        "blockstream_evictions_total",
        "Total blocks evicted from block caches"
    ).expect("metric can be created");
}

/// Initialize metrics registry
/// Can be called multiple times safely (idempotent)
pub fn init() {
    INIT.call_once(|| {
        REGISTRY
            .register(Box::new(BLOCKS_IN_CACHE.clone()))
            .expect("blocks_in_cache can be registered");
        REGISTRY
            .register(Box::new(CACHE_HITS_TOTAL.clone()))
            .expect("cache_hits_total can be registered");
        REGISTRY
            .register(Box::new(CACHE_MISSES_TOTAL.clone()))
            .expect("cache_misses_total can be registered");
        REGISTRY
            .register(Box::new(FETCHES_TOTAL.clone()))
            .expect("fetches_total can be registered");
        REGISTRY
            .register(Box::new(FETCH_ERRORS_TOTAL.clone()))
            .expect("fetch_errors_total can be registered");
        REGISTRY
            .register(Box::new(FETCH_LATENCY_SECONDS.clone()))
            .expect("fetch_latency_seconds can be registered");
        REGISTRY
            .register(Box::new(PREFETCHES_TOTAL.clone()))
            .expect("prefetches_total can be registered");
        REGISTRY
            .register(Box::new(EVICTIONS_TOTAL.clone()))
            .expect("evictions_total can be registered");
    });
}
