//! # Chunkquery
//!
//! Chunk-to-series query layer for time-series chunk stores.
//!
//! Raw chunks fetched from a pluggable store are grouped into series,
//! sorted by label set and handed to a query engine as lazily built sample
//! iterators.
//!
//! ## Modules
//!
//! - [`chunk`]: Chunk identity, fingerprints, checksums and external keys
//! - [`series`]: Series partitioning and sample iterators
//! - [`querier`]: Tenant-scoped query façade over a chunk store
//! - [`testutils`]: Compliance harness for storage backends
//! - [`config`] / [`logging`]: Configuration and tracing setup
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use chunkquery::chunk::{now, HOUR};
//! use chunkquery::querier::*;
//! use chunkquery::series::MergeIteratorStrategy;
//! use chunkquery::testutils::{create_chunks, USER_ID};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = Arc::new(MemoryChunkStore::new());
//!     let (_keys, chunks) = create_chunks(0, 10, now());
//!     store.put(chunks).await;
//!
//!     let queryable = ChunkStoreQueryable::new(store, Arc::new(MergeIteratorStrategy));
//!     let end = now();
//!     let querier = queryable.querier(RequestContext::with_tenant(USER_ID), end - HOUR, end)?;
//!     let (series, _) = querier.select(&SelectParams::new(end - HOUR, end), &[]).await?;
//!
//!     println!("Found {} series", series.len());
//!     Ok(())
//! }
//! ```

pub mod chunk;
pub mod config;
pub mod logging;
pub mod querier;
pub mod series;
pub mod testutils;

// Re-export top-level types for convenience
pub use chunk::{Chunk, ChunkError, ChunkKey, Fingerprint, Labels, Sample, SampleBlock, Time};

pub use series::{
    partition_chunks, ChunkIteratorStrategy, MergeIteratorStrategy, Series, SeriesIterator,
    SeriesSet,
};

pub use querier::{
    ChunkStore, ChunkStoreQuerier, ChunkStoreQueryable, MemoryChunkStore, Matcher, QueryError,
    Querier, Queryable, RequestContext, SelectParams, StoreError,
};

pub use config::{Config, ConfigError, LoggingConfig, QuerierConfig, TableManagerConfig};

pub use testutils::{Fixture, HarnessError, MemoryFixture};
