//! Read-Path Error Types
//!
//! This module defines all error types that can occur on the cached read
//! path.
//!
//! ## Error Categories
//!
//! ### Validation Errors
//! - `InvalidArgument`: bad constructor or operation arguments (negative
//!   seek, zero block size, empty object key). Raised synchronously, before
//!   any asynchronous work is scheduled, never retried.
//!
//! ### Fetch Errors
//! - `FetchFailed`: the backend transport failed a range fetch. Every caller
//!   waiting on that block receives this error; the pending entry is cleared,
//!   so a later read of the same block retries the fetch. The cache stays
//!   usable for other blocks.
//! - `ObjectStore`: low-level transport error from the `object_store`
//!   adapter.
//!
//! ### Lifecycle Errors
//! - `StreamClosed`: an operation was invoked after `close()`. `close()`
//!   itself is idempotent and never fails for being called twice.
//! - `CacheClosed`: the shared block cache was torn down (last stream over
//!   the object closed) while a handle still tried to use it.
//!
//! End-of-stream is not an error: reads signal it with `Ok(None)`, `Ok(0)`
//! or a short count.
//!
//! All operations return `Result<T>` which is aliased to `Result<T, Error>`,
//! allowing clean propagation with `?`.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Block fetch failed for block {index}: {reason}")]
    FetchFailed { index: u64, reason: String },

    #[error("Stream is closed")]
    StreamClosed,

    #[error("Block cache is closed")]
    CacheClosed,

    #[error("Object store error: {0}")]
    ObjectStore(#[from] object_store::Error),
}

impl From<blockstream_core::Error> for Error {
    fn from(e: blockstream_core::Error) -> Self {
        Error::InvalidArgument(e.to_string())
    }
}
