//! Core Error Types
//!
//! Errors raised by the layout and attribute primitives. These are all
//! argument-validation failures: they happen synchronously, before any
//! asynchronous work is scheduled, and are never retried.
//!
//! All functions in this crate return `Result<T>` which is aliased to
//! `Result<T, Error>`, allowing `?` propagation.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid block size: {0} (must be at least 1 byte)")]
    InvalidBlockSize(u64),

    #[error("Invalid object key: key must not be empty")]
    EmptyObjectKey,

    #[error("Block index out of range: {index} (object has {count} blocks)")]
    BlockIndexOutOfRange { index: u64, count: u64 },
}

pub type Result<T> = std::result::Result<T, Error>;
