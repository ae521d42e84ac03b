//! Per-Object Cache Registry
//!
//! Caching is per object, not per stream: every stream opened over the same
//! key must hit the same [`BlockCache`], or concurrent readers would each
//! fetch their own copies of every block. The registry owns that sharing
//! without ambient global state:
//!
//! ```text
//! open_stream("data/big.csv")  -> cache created,  streams = 1
//! open_stream("data/big.csv")  -> cache shared,   streams = 2
//! stream.close()               ->                 streams = 1
//! stream.close()               -> cache closed,   entry removed, gauge -> 0
//! ```
//!
//! The registry also picks the stream variant: objects that fit in a single
//! block get the buffered [`InMemoryStream`] (no cache entry at all), larger
//! objects get the cache-backed [`CachingStream`].
//!
//! Closing a stream only decrements its own object's refcount; it never
//! waits on fetches belonging to other still-open streams.

use crate::cache::BlockCache;
use crate::client::ObjectClient;
use crate::config::ReadConfig;
use crate::error::Result;
use crate::fetcher::BlockFetcher;
use crate::stream::{CachingStream, InMemoryStream, ObjectStream};
use blockstream_core::{BlockLayout, ObjectAttributes};
use blockstream_observability::ResidentBlocksGauge;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Shares one block cache per object key, refcounted by open streams.
pub struct CacheRegistry {
    config: ReadConfig,
    inner: Mutex<HashMap<String, RegistryEntry>>,
}

struct RegistryEntry {
    fetcher: Arc<BlockFetcher>,
    streams: usize,
}

impl CacheRegistry {
    /// Create a registry. Fails synchronously on an invalid configuration.
    pub fn new(config: ReadConfig) -> Result<Arc<Self>> {
        config.validate()?;
        Ok(Arc::new(Self {
            config,
            inner: Mutex::new(HashMap::new()),
        }))
    }

    /// Open a stream over the object described by `attrs`.
    ///
    /// Argument validation happens here, before any asynchronous work: the
    /// attributes were already validated at construction, and the config at
    /// registry creation. Objects no larger than one block are served from a
    /// buffered in-memory stream and never enter the registry.
    pub async fn open_stream(
        self: &Arc<Self>,
        client: Arc<dyn ObjectClient>,
        attrs: ObjectAttributes,
    ) -> Result<Arc<dyn ObjectStream>> {
        if attrs.len <= self.config.block_size {
            tracing::debug!(key = %attrs.key, len = attrs.len, "Opening in-memory stream");
            return Ok(Arc::new(InMemoryStream::new(client, attrs)));
        }

        let fetcher = self.acquire(client, &attrs).await?;
        tracing::debug!(
            key = %attrs.key,
            len = attrs.len,
            block_size = self.config.block_size,
            "Opening caching stream"
        );
        Ok(Arc::new(CachingStream::new(
            attrs,
            fetcher,
            self.clone(),
            self.config.prefetch_count,
        )))
    }

    /// Get or create the shared fetcher for `attrs.key`, bumping the
    /// open-stream count.
    async fn acquire(
        &self,
        client: Arc<dyn ObjectClient>,
        attrs: &ObjectAttributes,
    ) -> Result<Arc<BlockFetcher>> {
        let mut inner = self.inner.lock().await;
        if let Some(entry) = inner.get_mut(&attrs.key) {
            entry.streams += 1;
            return Ok(entry.fetcher.clone());
        }

        let layout = BlockLayout::new(attrs.len, self.config.block_size)?;
        let cache = Arc::new(BlockCache::new(self.config.max_blocks)?);
        let fetcher = Arc::new(BlockFetcher::new(client, attrs.clone(), layout, cache));
        inner.insert(
            attrs.key.clone(),
            RegistryEntry {
                fetcher: fetcher.clone(),
                streams: 1,
            },
        );
        Ok(fetcher)
    }

    /// Drop one stream's reference to `key`; the last release closes and
    /// removes the cache.
    pub(crate) async fn release(&self, key: &str) {
        let entry = {
            let mut inner = self.inner.lock().await;
            match inner.get_mut(key) {
                Some(entry) => {
                    entry.streams -= 1;
                    if entry.streams > 0 {
                        return;
                    }
                    inner.remove(key)
                }
                None => None,
            }
        };

        if let Some(entry) = entry {
            tracing::debug!(key = %key, "Last stream closed; tearing down block cache");
            entry.fetcher.cache().close().await;
        }
    }

    /// Resident-block gauge for the cache behind `key`, if one is live. A
    /// clone taken while streams are open keeps observing the count through
    /// teardown - used by diagnostics and tests.
    pub async fn gauge(&self, key: &str) -> Option<ResidentBlocksGauge> {
        let inner = self.inner.lock().await;
        inner.get(key).map(|entry| entry.fetcher.cache().gauge())
    }

    /// Blocks currently resident for `key`, or `None` when no cache is live.
    pub async fn resident_blocks(&self, key: &str) -> Option<i64> {
        let inner = self.inner.lock().await;
        inner
            .get(key)
            .map(|entry| entry.fetcher.cache().resident_blocks())
    }

    /// Number of objects with a live cache.
    pub async fn live_caches(&self) -> usize {
        self.inner.lock().await.len()
    }

    /// Tear down every cache regardless of open streams. Streams still open
    /// observe `CacheClosed` on their next miss.
    pub async fn close(&self) {
        let entries = {
            let mut inner = self.inner.lock().await;
            inner.drain().collect::<Vec<_>>()
        };
        for (key, entry) in entries {
            tracing::debug!(key = %key, "Closing block cache on registry shutdown");
            entry.fetcher.cache().close().await;
        }
    }
}
