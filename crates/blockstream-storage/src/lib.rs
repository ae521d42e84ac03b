//! BlockStream Storage Layer
//!
//! This crate implements the cached read path for BlockStream - a bounded,
//! concurrency-safe block cache beneath a seekable byte-stream abstraction
//! over a remote object store.
//!
//! ## The Problem
//!
//! Object stores have high per-request latency (~50-200ms per ranged GET).
//! Clients want ordinary stream semantics - sequential reads, random `seek`,
//! positioned reads from many tasks - over objects that live remotely. Doing
//! a GET per read call is hopeless; buffering whole objects blows memory.
//!
//! ## The Solution
//!
//! Fetch lazily in fixed-size blocks and keep a bounded LRU cache of them:
//!
//! ```text
//! ┌──────────────┐  seek/read/read_fully   ┌────────────────┐
//! │   Readers    │ ──────────────────────> │  ObjectStream  │
//! │ (many tasks) │                         │ (facade/cursor)│
//! └──────────────┘                         └───────┬────────┘
//!                                                  │ block index
//!                                                  ▼
//!                                          ┌────────────────┐
//!                                          │  BlockFetcher  │  de-duplicates
//!                                          │ (pending map)  │  in-flight fetches
//!                                          └───────┬────────┘
//!                                       miss │           │ commit
//!                                            ▼           ▼
//!                                  ┌────────────┐   ┌────────────┐
//!                                  │  Backend   │   │ BlockCache │  bounded,
//!                                  │ (ranged    │   │ (LRU, ≤ N  │  gauge-
//!                                  │  GETs)     │   │  blocks)   │  accurate
//!                                  └────────────┘   └────────────┘
//! ```
//!
//! ## Main Components
//!
//! ### BlockCache
//! Bounded map of block index to immutable payload with strict LRU eviction.
//! Eviction is synchronous with insertion, so the resident-block gauge never
//! exceeds the configured bound - not even transiently.
//!
//! ### BlockFetcher
//! Dispatches backend range reads off the calling task and de-duplicates
//! concurrent requests for the same block: K waiters, one GET.
//!
//! ### ObjectStream
//! The facade: `seek`, `read`, `read_fully`, `available`, `close` with two
//! variants - block-cached (`CachingStream`) and whole-object buffered
//! (`InMemoryStream`) for objects that fit in one block.
//!
//! ### CacheRegistry
//! One cache per object, shared by every stream over that object, refcounted
//! and torn down when the last stream closes.
//!
//! ## Usage Example
//!
//! ```ignore
//! use blockstream_core::ObjectAttributes;
//! use blockstream_storage::{CacheRegistry, ObjectStoreClient, ReadConfig};
//! use std::sync::Arc;
//!
//! let client = Arc::new(ObjectStoreClient::new(object_store));
//! let registry = CacheRegistry::new(ReadConfig::default())?;
//!
//! let attrs = ObjectAttributes::new("data/large.csv", object_len)?;
//! let stream = registry.open_stream(client, attrs).await?;
//!
//! let mut buf = vec![0u8; 4096];
//! stream.seek(1_000_000)?;
//! let n = stream.read(&mut buf).await?;
//!
//! stream.close().await?;
//! ```
//!
//! ## Design Decisions
//!
//! ### Why immutable payloads?
//! Payloads are `bytes::Bytes`, committed once and never mutated. Readers get
//! refcounted views, so eviction can never tear data out from under a read in
//! progress - no per-read locking needed.
//!
//! ### Why synchronous eviction?
//! Capacity is enforced under the cache lock before a new block is inserted.
//! The externally observable gauge is exact at all times, which makes the
//! capacity bound a hard invariant rather than an eventual one.
//!
//! ### Why a shared future per in-flight fetch?
//! Concurrent positioned reads over overlapping ranges hit the same blocks.
//! Mapping index -> `Shared` future lets late arrivals attach to the fetch
//! already in flight, and a spawned driver task finishes the fetch even if
//! every waiter is cancelled.

pub mod cache;
pub mod client;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod registry;
pub mod stream;

pub use cache::{BlockCache, CacheStats};
pub use client::{ObjectClient, ObjectStoreClient};
pub use config::ReadConfig;
pub use error::{Error, Result};
pub use fetcher::BlockFetcher;
pub use registry::CacheRegistry;
pub use stream::{CachingStream, InMemoryStream, ObjectStream};
