//! Shared helpers for the integration tests: a deterministic mock transport
//! and a bounded polling helper for asynchronous convergence.

#![allow(dead_code)]

use async_trait::async_trait;
use blockstream_core::ObjectAttributes;
use blockstream_storage::{CacheRegistry, ObjectClient, ObjectStream, ReadConfig, Result};
use bytes::Bytes;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;

/// Route tracing output through the test harness. Safe to call from every
/// test; only the first call installs the subscriber.
pub fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    });
}

/// Deterministic in-memory backend: the byte at offset `i` of every object
/// is `i % 256`. Records each range fetch and can inject latency and
/// failures.
pub struct MockObjectClient {
    delay: Option<Duration>,
    fetched: Mutex<Vec<(u64, u64)>>,
    fail_next: AtomicUsize,
}

impl MockObjectClient {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            delay: None,
            fetched: Mutex::new(Vec::new()),
            fail_next: AtomicUsize::new(0),
        })
    }

    pub fn with_delay(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay: Some(delay),
            fetched: Mutex::new(Vec::new()),
            fail_next: AtomicUsize::new(0),
        })
    }

    /// Total backend fetches issued.
    pub fn fetch_count(&self) -> usize {
        self.fetched.lock().unwrap().len()
    }

    /// Backend fetches issued for the range starting at `offset`.
    pub fn fetches_at(&self, offset: u64) -> usize {
        self.fetched
            .lock()
            .unwrap()
            .iter()
            .filter(|(o, _)| *o == offset)
            .count()
    }

    /// Fail the next `n` fetches with a backend error.
    pub fn fail_next(&self, n: usize) {
        self.fail_next.store(n, Ordering::SeqCst);
    }
}

#[async_trait]
impl ObjectClient for MockObjectClient {
    async fn fetch_range(&self, _key: &str, offset: u64, len: u64) -> Result<Bytes> {
        self.fetched.lock().unwrap().push((offset, len));
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_next.load(Ordering::SeqCst) > 0 {
            self.fail_next.fetch_sub(1, Ordering::SeqCst);
            return Err(blockstream_storage::Error::FetchFailed {
                index: 0,
                reason: "injected backend failure".to_string(),
            });
        }
        let data: Vec<u8> = (offset..offset + len).map(expected_byte).collect();
        Ok(Bytes::from(data))
    }
}

/// Expected content of every mock object.
pub fn expected_byte(offset: u64) -> u8 {
    (offset % 256) as u8
}

pub fn registry(block_size: u64, max_blocks: usize, prefetch_count: usize) -> Arc<CacheRegistry> {
    init_tracing();
    CacheRegistry::new(ReadConfig {
        block_size,
        max_blocks,
        prefetch_count,
    })
    .unwrap()
}

pub async fn open(
    registry: &Arc<CacheRegistry>,
    client: Arc<MockObjectClient>,
    key: &str,
    len: u64,
) -> Arc<dyn ObjectStream> {
    let attrs = ObjectAttributes::new(key, len).unwrap();
    registry.open_stream(client, attrs).await.unwrap()
}

/// Poll `condition` until it holds, panicking after `timeout`. Used for
/// properties that converge asynchronously (gauge settling, prefetch).
pub async fn eventually(timeout: Duration, mut condition: impl FnMut() -> bool) {
    let interval = Duration::from_millis(20);
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if condition() {
            return;
        }
        if tokio::time::Instant::now() >= deadline {
            panic!("condition not met within {:?}", timeout);
        }
        tokio::time::sleep(interval).await;
    }
}
