//! Block Layout and Lifecycle
//!
//! A remote object is read in fixed-size blocks. Block `i` covers bytes
//! `[i * block_size, (i + 1) * block_size)`, except the last block which may
//! be shorter:
//!
//! ```text
//! object (len = 26, block_size = 8):
//!
//! offset:  0        8        16       24  26
//!          ├────────┼────────┼────────┼───┤
//! block:   │   0    │   1    │   2    │ 3 │   <- block 3 is 2 bytes
//!          └────────┴────────┴────────┴───┘
//! ```
//!
//! `BlockLayout` is the single source of truth for this mapping. The cache
//! keys blocks by index, the fetcher turns an index into a byte range for the
//! transport, and the stream facade turns a cursor position into
//! `(index, offset_in_block)` - all through this type.
//!
//! ## Block Lifecycle
//!
//! ```text
//! Empty ──fetch dispatched──> Fetching ──commit──> Ready ──eviction──> Evicted
//! ```
//!
//! Only `Ready` blocks live in the cache and count toward the resident-block
//! gauge. A `Fetching` block exists solely as a pending entry in the fetcher;
//! it cannot be evicted. `Evicted` is terminal for that residency - a later
//! read of the same index starts a fresh fetch.

use crate::error::{Error, Result};

/// Lifecycle state of a single block, as observed through the cache and the
/// pending-fetch registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockState {
    /// Not yet requested.
    Empty,
    /// A fetch has been dispatched; the payload is not yet available.
    Fetching,
    /// The payload is resident in the cache and readable.
    Ready,
    /// Previously resident, since removed. A new read re-fetches.
    Evicted,
}

/// Maps byte offsets of a fixed-length object to fixed-size block indices.
///
/// Immutable for the lifetime of a stream; cheap to copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockLayout {
    object_len: u64,
    block_size: u64,
}

impl BlockLayout {
    /// Create a layout for an object of `object_len` bytes split into blocks
    /// of `block_size` bytes.
    pub fn new(object_len: u64, block_size: u64) -> Result<Self> {
        if block_size == 0 {
            return Err(Error::InvalidBlockSize(block_size));
        }
        Ok(Self {
            object_len,
            block_size,
        })
    }

    /// Total object length in bytes.
    pub fn object_len(&self) -> u64 {
        self.object_len
    }

    /// Configured block size in bytes.
    pub fn block_size(&self) -> u64 {
        self.block_size
    }

    /// Number of blocks covering the object. Zero for an empty object.
    pub fn block_count(&self) -> u64 {
        self.object_len.div_ceil(self.block_size)
    }

    /// Index of the block containing byte `offset`.
    pub fn index_of(&self, offset: u64) -> u64 {
        offset / self.block_size
    }

    /// Byte offset at which block `index` starts.
    pub fn start_of(&self, index: u64) -> Result<u64> {
        self.check_index(index)?;
        Ok(index * self.block_size)
    }

    /// Actual size of block `index` in bytes. Equal to the block size for
    /// every block except possibly the last one.
    pub fn size_of(&self, index: u64) -> Result<u64> {
        let start = self.start_of(index)?;
        Ok((self.object_len - start).min(self.block_size))
    }

    /// Whether `index` names the final block of the object.
    pub fn is_last(&self, index: u64) -> bool {
        self.block_count() > 0 && index == self.block_count() - 1
    }

    /// The half-open range of block indices touched by reading `len` bytes
    /// starting at `offset`. Empty when `len == 0` or `offset` is at or past
    /// the end of the object.
    pub fn blocks_spanned(&self, offset: u64, len: u64) -> std::ops::Range<u64> {
        if len == 0 || offset >= self.object_len {
            return 0..0;
        }
        let end = (offset + len).min(self.object_len);
        self.index_of(offset)..self.index_of(end - 1) + 1
    }

    fn check_index(&self, index: u64) -> Result<()> {
        if index >= self.block_count() {
            return Err(Error::BlockIndexOutOfRange {
                index,
                count: self.block_count(),
            });
        }
        Ok(())
    }
}
