//! BlockStream Core
//!
//! Shared primitives for BlockStream - the block-cached read path for remote
//! objects. This crate holds the types that every other BlockStream crate
//! builds on:
//!
//! - **BlockLayout**: pure math mapping byte offsets to fixed-size block
//!   indices (and back), including the short final block
//! - **BlockState**: the lifecycle of a block as it moves through the cache
//! - **ObjectAttributes**: the immutable identity and length of a remote
//!   object, supplied by the metadata provider at stream-open time
//!
//! Nothing in this crate performs I/O. Keeping the layout math here means the
//! cache, the fetcher, and the stream facade all agree on exactly which bytes
//! belong to which block.

pub mod attrs;
pub mod block;
pub mod error;

pub use attrs::ObjectAttributes;
pub use block::{BlockLayout, BlockState};
pub use error::{Error, Result};
