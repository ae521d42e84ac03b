//! Seekable Object Streams
//!
//! The stream facade turns the block cache into an ordinary seekable byte
//! stream. Two variants implement one trait:
//!
//! ```text
//!                  ObjectStream (seek / read / read_fully / available / close)
//!                      /                                  \
//!         InMemoryStream                              CachingStream
//!   whole object buffered on                 block-granular reads through the
//!   first read; used when the                shared BlockCache + BlockFetcher;
//!   object fits in one block                 prefetches ahead of the cursor
//! ```
//!
//! ## Read Flow (CachingStream)
//!
//! ```text
//! read(buf) at position P
//!     |
//! resolve P -> (block index, offset in block)
//!     |
//! fetcher.get_or_insert(index)   <- hit: immediate; miss: await fetch
//!     |
//! copy the sub-range into buf, advance, repeat across block boundaries
//!     |
//! spawn prefetch of the next blocks (sequential reads only)
//! ```
//!
//! ## Concurrency Contract
//!
//! Every operation takes `&self`; the cursor is interior-mutable. Positioned
//! reads (`read_fully`) carry their own offset and are safe to issue from
//! many tasks at once. `seek` + sequential `read` share the cursor - callers
//! mixing them across tasks must serialize externally if position consistency
//! matters. All cross-stream coordination happens in the shared cache.
//!
//! End-of-stream is not an error: `read_byte` yields `Ok(None)`, slice reads
//! return `Ok(0)` or a short count, and nothing past EOF ever reaches the
//! backend.

use crate::error::{Error, Result};
use crate::fetcher::BlockFetcher;
use crate::registry::CacheRegistry;
use crate::ObjectClient;
use async_trait::async_trait;
use blockstream_core::{BlockLayout, BlockState, ObjectAttributes};
use blockstream_observability::metrics::PREFETCHES_TOTAL;
use bytes::Bytes;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::OnceCell;

/// A seekable, randomly-accessible read-only view of a remote object.
#[async_trait]
pub trait ObjectStream: Send + Sync {
    /// Object length in bytes. Immutable for the stream's lifetime.
    fn len(&self) -> u64;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Current cursor position.
    fn position(&self) -> u64;

    /// Bytes remaining between the cursor and end-of-stream. Never fetches.
    fn available(&self) -> Result<u64>;

    /// Move the cursor. Negative positions and positions past the end fail
    /// with a validation error before any asynchronous work; seeking exactly
    /// to the end is valid and yields EOF on the next read.
    fn seek(&self, position: i64) -> Result<()>;

    /// Read one byte at the cursor, advancing it. `Ok(None)` at EOF, for
    /// this and every subsequent call, without touching the cache.
    async fn read_byte(&self) -> Result<Option<u8>>;

    /// Read up to `buf.len()` bytes at the cursor, advancing it by the count
    /// returned. Returns `Ok(0)` only at EOF (or for an empty buffer).
    async fn read(&self, buf: &mut [u8]) -> Result<usize>;

    /// Positioned read: fill `buf` from `position` without moving the
    /// cursor. Returns the count copied - short only at end-of-file. Safe to
    /// call concurrently from multiple tasks.
    async fn read_fully(&self, position: u64, buf: &mut [u8]) -> Result<usize>;

    /// Close the stream. Idempotent; any other operation afterwards fails
    /// with [`Error::StreamClosed`]. Closing one stream never waits on
    /// fetches belonging to other streams over the same object.
    async fn close(&self) -> Result<()>;
}

/// Shared cursor state for both stream variants.
#[derive(Debug)]
struct Cursor {
    position: AtomicU64,
    closed: AtomicBool,
}

impl Cursor {
    fn new() -> Self {
        Self {
            position: AtomicU64::new(0),
            closed: AtomicBool::new(false),
        }
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(Error::StreamClosed);
        }
        Ok(())
    }

    fn seek(&self, position: i64, len: u64) -> Result<()> {
        self.ensure_open()?;
        if position < 0 {
            return Err(Error::InvalidArgument(format!(
                "Cannot seek to negative offset: {}",
                position
            )));
        }
        let position = position as u64;
        if position > len {
            return Err(Error::InvalidArgument(format!(
                "Cannot seek past end of object: {} > {}",
                position, len
            )));
        }
        self.position.store(position, Ordering::SeqCst);
        Ok(())
    }

    fn position(&self) -> u64 {
        self.position.load(Ordering::SeqCst)
    }

    /// Returns true on the first close, false on repeats.
    fn close(&self) -> bool {
        !self.closed.swap(true, Ordering::SeqCst)
    }
}

/// Block-cache-backed stream for objects larger than one block.
///
/// All streams over the same object share one [`BlockFetcher`] (and through
/// it one cache) obtained from the [`CacheRegistry`]; closing the last of
/// them tears the cache down.
pub struct CachingStream {
    attrs: ObjectAttributes,
    layout: BlockLayout,
    fetcher: Arc<BlockFetcher>,
    registry: Arc<CacheRegistry>,
    prefetch_count: usize,
    /// Highest block index prefetch was last triggered for; avoids spawning
    /// a task per byte on sequential single-byte reads.
    last_prefetch: AtomicU64,
    cursor: Cursor,
}

impl CachingStream {
    pub(crate) fn new(
        attrs: ObjectAttributes,
        fetcher: Arc<BlockFetcher>,
        registry: Arc<CacheRegistry>,
        prefetch_count: usize,
    ) -> Self {
        let layout = fetcher.layout();
        Self {
            attrs,
            layout,
            fetcher,
            registry,
            prefetch_count,
            last_prefetch: AtomicU64::new(u64::MAX),
            cursor: Cursor::new(),
        }
    }

    /// Copy bytes for `[position, position + buf.len())` out of the cache,
    /// resolving (and thereby touching) every block the range spans.
    async fn read_span(&self, position: u64, buf: &mut [u8]) -> Result<usize> {
        if buf.is_empty() || position >= self.layout.object_len() {
            return Ok(0);
        }

        let end = (position + buf.len() as u64).min(self.layout.object_len());
        let mut pos = position;
        let mut copied = 0;
        while pos < end {
            let index = self.layout.index_of(pos);
            let block = self.fetcher.get_or_insert(index).await?;
            let offset_in_block = (pos - self.layout.start_of(index)?) as usize;
            let n = ((end - pos) as usize).min(block.len() - offset_in_block);
            buf[copied..copied + n].copy_from_slice(&block[offset_in_block..offset_in_block + n]);
            copied += n;
            pos += n as u64;
        }
        Ok(copied)
    }

    /// Queue background fetches for the blocks after `index`. Only blocks
    /// never seen before are prefetched; evicted blocks reload on demand
    /// rather than thrash a small cache.
    fn prefetch_after(&self, index: u64) {
        if self.prefetch_count == 0 {
            return;
        }
        if self.last_prefetch.swap(index, Ordering::SeqCst) == index {
            return;
        }

        let fetcher = self.fetcher.clone();
        let last = (index + self.prefetch_count as u64).min(self.layout.block_count() - 1);
        let key = self.attrs.key.clone();
        tokio::spawn(async move {
            for next in index + 1..=last {
                if fetcher.block_state(next).await != BlockState::Empty {
                    continue;
                }
                PREFETCHES_TOTAL.inc();
                tracing::debug!(key = %key, index = next, "Prefetching block");
                if let Err(e) = fetcher.get_or_insert(next).await {
                    tracing::debug!(key = %key, index = next, error = %e, "Prefetch failed");
                }
            }
        });
    }
}

#[async_trait]
impl ObjectStream for CachingStream {
    fn len(&self) -> u64 {
        self.attrs.len
    }

    fn position(&self) -> u64 {
        self.cursor.position()
    }

    fn available(&self) -> Result<u64> {
        self.cursor.ensure_open()?;
        Ok(self.attrs.len - self.cursor.position())
    }

    fn seek(&self, position: i64) -> Result<()> {
        self.cursor.seek(position, self.attrs.len)
    }

    async fn read_byte(&self) -> Result<Option<u8>> {
        self.cursor.ensure_open()?;
        let pos = self.cursor.position();
        if pos >= self.attrs.len {
            return Ok(None);
        }

        let mut byte = [0u8; 1];
        self.read_span(pos, &mut byte).await?;
        self.cursor.position.store(pos + 1, Ordering::SeqCst);
        self.prefetch_after(self.layout.index_of(pos));
        Ok(Some(byte[0]))
    }

    async fn read(&self, buf: &mut [u8]) -> Result<usize> {
        self.cursor.ensure_open()?;
        let pos = self.cursor.position();
        let n = self.read_span(pos, buf).await?;
        if n > 0 {
            self.cursor.position.store(pos + n as u64, Ordering::SeqCst);
            self.prefetch_after(self.layout.index_of(pos + n as u64 - 1));
        }
        Ok(n)
    }

    async fn read_fully(&self, position: u64, buf: &mut [u8]) -> Result<usize> {
        self.cursor.ensure_open()?;
        self.read_span(position, buf).await
    }

    async fn close(&self) -> Result<()> {
        if self.cursor.close() {
            self.registry.release(&self.attrs.key).await;
        }
        Ok(())
    }
}

/// Whole-object buffered stream, used when the object fits in a single
/// block. The buffer is loaded with one range fetch on first read; an empty
/// object never fetches at all.
pub struct InMemoryStream {
    client: Arc<dyn ObjectClient>,
    attrs: ObjectAttributes,
    buffer: OnceCell<Bytes>,
    cursor: Cursor,
}

impl InMemoryStream {
    pub fn new(client: Arc<dyn ObjectClient>, attrs: ObjectAttributes) -> Self {
        Self {
            client,
            attrs,
            buffer: OnceCell::new(),
            cursor: Cursor::new(),
        }
    }

    async fn buffer(&self) -> Result<&Bytes> {
        self.buffer
            .get_or_try_init(|| async {
                if self.attrs.len == 0 {
                    return Ok(Bytes::new());
                }
                self.client
                    .fetch_range(&self.attrs.key, 0, self.attrs.len)
                    .await
            })
            .await
    }

    async fn read_span(&self, position: u64, buf: &mut [u8]) -> Result<usize> {
        if buf.is_empty() || position >= self.attrs.len {
            return Ok(0);
        }
        let data = self.buffer().await?;
        let start = position as usize;
        let n = buf.len().min(data.len() - start);
        buf[..n].copy_from_slice(&data[start..start + n]);
        Ok(n)
    }
}

#[async_trait]
impl ObjectStream for InMemoryStream {
    fn len(&self) -> u64 {
        self.attrs.len
    }

    fn position(&self) -> u64 {
        self.cursor.position()
    }

    fn available(&self) -> Result<u64> {
        self.cursor.ensure_open()?;
        Ok(self.attrs.len - self.cursor.position())
    }

    fn seek(&self, position: i64) -> Result<()> {
        self.cursor.seek(position, self.attrs.len)
    }

    async fn read_byte(&self) -> Result<Option<u8>> {
        self.cursor.ensure_open()?;
        let pos = self.cursor.position();
        if pos >= self.attrs.len {
            return Ok(None);
        }
        let mut byte = [0u8; 1];
        self.read_span(pos, &mut byte).await?;
        self.cursor.position.store(pos + 1, Ordering::SeqCst);
        Ok(Some(byte[0]))
    }

    async fn read(&self, buf: &mut [u8]) -> Result<usize> {
        self.cursor.ensure_open()?;
        let pos = self.cursor.position();
        let n = self.read_span(pos, buf).await?;
        if n > 0 {
            self.cursor.position.store(pos + n as u64, Ordering::SeqCst);
        }
        Ok(n)
    }

    async fn read_fully(&self, position: u64, buf: &mut [u8]) -> Result<usize> {
        self.cursor.ensure_open()?;
        self.read_span(position, buf).await
    }

    async fn close(&self) -> Result<()> {
        self.cursor.close();
        Ok(())
    }
}
