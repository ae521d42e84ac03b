//! Block Fetcher with Request De-Duplication
//!
//! ## The Problem
//!
//! Under concurrent positioned reads, several tasks routinely want the same
//! not-yet-resident block at the same time. Issuing one backend GET per
//! caller would multiply latency, cost and bandwidth by the number of
//! callers.
//!
//! ## The Solution
//!
//! A pending-fetch registry maps block index to one shareable in-flight
//! future:
//!
//! ```text
//! get_or_insert(index)
//!     |
//! cache hit? --YES--> return payload (touches MRU)
//!     |
//!     NO
//!     |
//! pending fetch for index? --YES--> await the SAME future
//!     |
//!     NO
//!     |
//! register pending entry, spawn backend fetch
//!     |
//! fetch completes -> commit to cache -> remove pending entry
//!     |
//! all waiters wake with the payload (or all see the failure)
//! ```
//!
//! A fetch is "pending" from dispatch until its result is committed to the
//! cache (or its failure surfaced); any request for the same index in that
//! window attaches to the existing future instead of re-fetching. The fetch
//! itself runs on a spawned task, so it completes - and its payload is
//! cached - even if every waiter is cancelled mid-flight.
//!
//! On failure the pending entry is removed before waiters wake, so a
//! subsequent read of the same block retries the fetch. No partial block is
//! ever committed: a response of the wrong length is treated as a failure.

use crate::cache::BlockCache;
use crate::client::ObjectClient;
use crate::error::{Error, Result};
use blockstream_core::{BlockLayout, BlockState, ObjectAttributes};
use blockstream_observability::metrics::{
    FETCHES_TOTAL, FETCH_ERRORS_TOTAL, FETCH_LATENCY_SECONDS,
};
use bytes::Bytes;
use futures::future::{BoxFuture, FutureExt, Shared};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;

/// Result type flowing through the shared future. `Shared` requires `Clone`,
/// so the error side carries a reason string; waiters rewrap it in
/// [`Error::FetchFailed`].
type FetchOutput = std::result::Result<Bytes, String>;
type SharedFetch = Shared<BoxFuture<'static, FetchOutput>>;

/// Fetches blocks of one object from the backend, de-duplicating concurrent
/// requests per index and committing results to the shared [`BlockCache`].
pub struct BlockFetcher {
    client: Arc<dyn ObjectClient>,
    attrs: ObjectAttributes,
    layout: BlockLayout,
    cache: Arc<BlockCache>,
    pending: Arc<Mutex<HashMap<u64, SharedFetch>>>,
}

impl BlockFetcher {
    pub fn new(
        client: Arc<dyn ObjectClient>,
        attrs: ObjectAttributes,
        layout: BlockLayout,
        cache: Arc<BlockCache>,
    ) -> Self {
        Self {
            client,
            attrs,
            layout,
            cache,
            pending: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Resolve block `index` to its payload, fetching it if absent.
    ///
    /// Cache hits return immediately and mark the block most-recently-used.
    /// Misses block the caller until the (possibly shared) fetch completes.
    pub async fn get_or_insert(&self, index: u64) -> Result<Bytes> {
        if let Some(data) = self.cache.get(index).await? {
            return Ok(data);
        }

        let fetch = {
            let mut pending = self.pending.lock().await;
            match pending.get(&index) {
                Some(fetch) => fetch.clone(),
                None => {
                    // The fetch we missed on may have committed between the
                    // cache check and taking the pending lock.
                    if let Some(data) = self.cache.get(index).await? {
                        return Ok(data);
                    }
                    let fetch = self.dispatch_fetch(index)?;
                    pending.insert(index, fetch.clone());
                    fetch
                }
            }
        };

        match fetch.await {
            Ok(data) => Ok(data),
            Err(reason) => Err(Error::FetchFailed { index, reason }),
        }
    }

    /// Lifecycle state of block `index`.
    pub async fn block_state(&self, index: u64) -> BlockState {
        if self.pending.lock().await.contains_key(&index) {
            return BlockState::Fetching;
        }
        self.cache.state_of(index).await
    }

    /// Number of fetches currently in flight.
    pub async fn pending_fetches(&self) -> usize {
        self.pending.lock().await.len()
    }

    /// The shared cache this fetcher commits into.
    pub fn cache(&self) -> &Arc<BlockCache> {
        &self.cache
    }

    /// Block layout of the object being fetched.
    pub fn layout(&self) -> BlockLayout {
        self.layout
    }

    /// Build and spawn the backend fetch for `index`, returning a shareable
    /// handle to it. The spawned task drives the future to completion so the
    /// block is cached even if every waiter goes away.
    fn dispatch_fetch(&self, index: u64) -> Result<SharedFetch> {
        let start = self.layout.start_of(index)?;
        let len = self.layout.size_of(index)?;
        let key = self.attrs.key.clone();
        let client = self.client.clone();
        let cache = self.cache.clone();
        let pending = self.pending.clone();

        FETCHES_TOTAL.inc();
        tracing::debug!(key = %key, index, start, len, "Dispatching block fetch");

        let fetch = async move {
            let began = Instant::now();
            let result = match client.fetch_range(&key, start, len).await {
                Ok(data) if data.len() as u64 != len => Err(format!(
                    "short read: expected {} bytes, got {}",
                    len,
                    data.len()
                )),
                Ok(data) => {
                    cache.insert(index, data.clone()).await;
                    Ok(data)
                }
                Err(e) => Err(e.to_string()),
            };
            FETCH_LATENCY_SECONDS.observe(began.elapsed().as_secs_f64());

            if let Err(reason) = &result {
                FETCH_ERRORS_TOTAL.inc();
                tracing::warn!(key = %key, index, reason = %reason, "Block fetch failed");
            }

            // Clear the pending entry before waiters wake so a retry can
            // dispatch a fresh fetch.
            pending.lock().await.remove(&index);
            result
        }
        .boxed()
        .shared();

        tokio::spawn(fetch.clone());
        Ok(fetch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Deterministic in-memory backend: byte at offset i is i % 256.
    /// Counts fetches and optionally injects latency or failures.
    struct TestClient {
        fetches: AtomicUsize,
        fail_next: AtomicUsize,
        delay: Option<Duration>,
    }

    impl TestClient {
        fn new() -> Self {
            Self {
                fetches: AtomicUsize::new(0),
                fail_next: AtomicUsize::new(0),
                delay: None,
            }
        }

        fn with_delay(delay: Duration) -> Self {
            Self {
                delay: Some(delay),
                ..Self::new()
            }
        }

        fn fetch_count(&self) -> usize {
            self.fetches.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ObjectClient for TestClient {
        async fn fetch_range(&self, _key: &str, offset: u64, len: u64) -> Result<Bytes> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if self.fail_next.load(Ordering::SeqCst) > 0 {
                self.fail_next.fetch_sub(1, Ordering::SeqCst);
                return Err(Error::FetchFailed {
                    index: 0,
                    reason: "injected backend failure".to_string(),
                });
            }
            let data: Vec<u8> = (offset..offset + len).map(|i| (i % 256) as u8).collect();
            Ok(Bytes::from(data))
        }
    }

    fn fetcher_with(client: Arc<TestClient>, object_len: u64, block_size: u64) -> BlockFetcher {
        let attrs = ObjectAttributes::new("bucket/key", object_len).unwrap();
        let layout = BlockLayout::new(object_len, block_size).unwrap();
        let cache = Arc::new(BlockCache::new(4).unwrap());
        BlockFetcher::new(client, attrs, layout, cache)
    }

    #[tokio::test]
    async fn test_fetch_and_cache() {
        let client = Arc::new(TestClient::new());
        let fetcher = fetcher_with(client.clone(), 64, 16);

        let data = fetcher.get_or_insert(1).await.unwrap();
        assert_eq!(data.len(), 16);
        assert_eq!(data[0], 16);
        assert_eq!(client.fetch_count(), 1);

        // Second resolution is a cache hit
        fetcher.get_or_insert(1).await.unwrap();
        assert_eq!(client.fetch_count(), 1);
    }

    #[tokio::test]
    async fn test_short_last_block() {
        let client = Arc::new(TestClient::new());
        let fetcher = fetcher_with(client, 20, 16);

        let data = fetcher.get_or_insert(1).await.unwrap();
        assert_eq!(data.len(), 4);
        assert_eq!(data[0], 16);
    }

    #[tokio::test]
    async fn test_concurrent_requests_deduplicated() {
        let client = Arc::new(TestClient::with_delay(Duration::from_millis(50)));
        let fetcher = Arc::new(fetcher_with(client.clone(), 64, 16));

        let mut tasks = Vec::new();
        for _ in 0..16 {
            let fetcher = fetcher.clone();
            tasks.push(tokio::spawn(async move { fetcher.get_or_insert(2).await }));
        }
        for task in tasks {
            let data = task.await.unwrap().unwrap();
            assert_eq!(data[0], 32);
        }

        // All sixteen callers rode one backend fetch
        assert_eq!(client.fetch_count(), 1);
    }

    #[tokio::test]
    async fn test_failure_reaches_all_waiters_then_retry_succeeds() {
        let client = Arc::new(TestClient::with_delay(Duration::from_millis(50)));
        client.fail_next.store(1, Ordering::SeqCst);
        let fetcher = Arc::new(fetcher_with(client.clone(), 64, 16));

        let mut tasks = Vec::new();
        for _ in 0..4 {
            let fetcher = fetcher.clone();
            tasks.push(tokio::spawn(async move { fetcher.get_or_insert(0).await }));
        }
        for task in tasks {
            let err = task.await.unwrap().unwrap_err();
            assert!(matches!(err, Error::FetchFailed { index: 0, .. }));
        }
        assert_eq!(client.fetch_count(), 1);

        // The pending entry was cleared; a later read retries and succeeds
        let data = fetcher.get_or_insert(0).await.unwrap();
        assert_eq!(data[0], 0);
        assert_eq!(client.fetch_count(), 2);
    }

    #[tokio::test]
    async fn test_failure_does_not_poison_other_blocks() {
        let client = Arc::new(TestClient::new());
        client.fail_next.store(1, Ordering::SeqCst);
        let fetcher = fetcher_with(client, 64, 16);

        assert!(fetcher.get_or_insert(0).await.is_err());
        assert!(fetcher.get_or_insert(1).await.is_ok());
    }

    #[tokio::test]
    async fn test_block_state_lifecycle() {
        let client = Arc::new(TestClient::with_delay(Duration::from_millis(50)));
        let fetcher = Arc::new(fetcher_with(client, 64, 16));

        assert_eq!(fetcher.block_state(0).await, BlockState::Empty);

        let inflight = {
            let fetcher = fetcher.clone();
            tokio::spawn(async move { fetcher.get_or_insert(0).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(fetcher.block_state(0).await, BlockState::Fetching);

        inflight.await.unwrap().unwrap();
        assert_eq!(fetcher.block_state(0).await, BlockState::Ready);
    }

    #[tokio::test]
    async fn test_fetch_completes_after_waiter_cancelled() {
        let client = Arc::new(TestClient::with_delay(Duration::from_millis(50)));
        let fetcher = Arc::new(fetcher_with(client.clone(), 64, 16));

        let waiter = {
            let fetcher = fetcher.clone();
            tokio::spawn(async move { fetcher.get_or_insert(0).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        waiter.abort();

        // The spawned driver finishes the fetch and commits it
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(fetcher.block_state(0).await, BlockState::Ready);
        assert_eq!(client.fetch_count(), 1);
    }
}
