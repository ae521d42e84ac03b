//! Remote Object Attributes
//!
//! `ObjectAttributes` carries the identity and length of a remote object as
//! reported by the metadata provider when a stream is opened. Both fields are
//! immutable for the lifetime of that stream - a changed object under a live
//! stream is out of contract for the transport.

use crate::error::{Error, Result};

/// Identity and length of a remote object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectAttributes {
    /// Object key within the store (e.g. an S3 key).
    pub key: String,

    /// Object length in bytes.
    pub len: u64,
}

impl ObjectAttributes {
    /// Create attributes for the object at `key` with length `len`.
    ///
    /// Fails with a validation error for an empty key.
    pub fn new(key: impl Into<String>, len: u64) -> Result<Self> {
        let key = key.into();
        if key.is_empty() {
            return Err(Error::EmptyObjectKey);
        }
        Ok(Self { key, len })
    }
}
