//! Read-Path Configuration
//!
//! ## ReadConfig
//!
//! Controls how a remote object is split into blocks and how many of them may
//! be resident at once:
//!
//! - **block_size**: bytes fetched per backend range request (default: 8MB)
//! - **max_blocks**: resident-block bound per object cache (default: 4)
//! - **prefetch_count**: blocks fetched ahead of a sequential read cursor
//!   (default: 2; 0 disables prefetching)
//!
//! ## Usage
//!
//! ```ignore
//! use blockstream_storage::ReadConfig;
//!
//! // Production config
//! let config = ReadConfig::default();
//!
//! // Test config: tiny blocks, tight cache, no background noise
//! let config = ReadConfig {
//!     block_size: 8,
//!     max_blocks: 2,
//!     prefetch_count: 0,
//! };
//! ```

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadConfig {
    /// Block size in bytes; one backend range request per block (default: 8MB)
    #[serde(default = "default_block_size")]
    pub block_size: u64,

    /// Maximum number of blocks resident in the cache per object (default: 4)
    #[serde(default = "default_max_blocks")]
    pub max_blocks: usize,

    /// Number of blocks to prefetch ahead of a sequential reader;
    /// 0 disables prefetching (default: 2)
    #[serde(default = "default_prefetch_count")]
    pub prefetch_count: usize,
}

impl Default for ReadConfig {
    fn default() -> Self {
        Self {
            block_size: default_block_size(),
            max_blocks: default_max_blocks(),
            prefetch_count: default_prefetch_count(),
        }
    }
}

impl ReadConfig {
    /// Validate the configuration. Called at stream-open time, before any
    /// asynchronous work is scheduled.
    pub fn validate(&self) -> Result<()> {
        if self.block_size == 0 {
            return Err(Error::InvalidArgument(
                "block_size must be at least 1 byte".to_string(),
            ));
        }
        if self.max_blocks == 0 {
            return Err(Error::InvalidArgument(
                "max_blocks must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

fn default_block_size() -> u64 {
    8 * 1024 * 1024 // 8MB per range request
}

fn default_max_blocks() -> usize {
    4
}

fn default_prefetch_count() -> usize {
    2
}
