//! Backend Transport Boundary
//!
//! The read path never talks to a concrete object store directly; it goes
//! through [`ObjectClient`], a single-method trait for ranged reads. That
//! keeps retries, authentication and wire details on the transport side of
//! the boundary and makes the whole read path testable against a mock.
//!
//! The transport contract: a fetch either returns exactly the requested bytes
//! or fails with a distinguishable error. Silent truncation is out of
//! contract (the fetcher still guards against it).
//!
//! [`ObjectStoreClient`] adapts any [`object_store::ObjectStore`]
//! implementation (S3, GCS, local, in-memory) to this trait.

use crate::error::Result;
use async_trait::async_trait;
use bytes::Bytes;
use object_store::{path::Path, ObjectStore};
use std::sync::Arc;

/// Ranged-read access to a remote object store.
#[async_trait]
pub trait ObjectClient: Send + Sync + 'static {
    /// Fetch `len` bytes of the object at `key`, starting at byte `offset`.
    async fn fetch_range(&self, key: &str, offset: u64, len: u64) -> Result<Bytes>;
}

/// [`ObjectClient`] over any `object_store` backend.
pub struct ObjectStoreClient {
    store: Arc<dyn ObjectStore>,
}

impl ObjectStoreClient {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl ObjectClient for ObjectStoreClient {
    async fn fetch_range(&self, key: &str, offset: u64, len: u64) -> Result<Bytes> {
        let path = Path::from(key);
        let range = offset as usize..(offset + len) as usize;
        let data = self.store.get_range(&path, range).await?;
        Ok(data)
    }
}
