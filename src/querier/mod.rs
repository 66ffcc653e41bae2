//! Storage querier
//!
//! Presents chunks from a pluggable [`ChunkStore`] to a query engine as a
//! sorted [`SeriesSet`](crate::series::SeriesSet).
//!
//! - **context**: Request-scoped tenant and deadline
//! - **matcher**: Label matchers
//! - **store**: Chunk-store capability and an in-memory implementation
//! - **queryable**: `Queryable` / `Querier` façade
//! - **error**: Error types
//!
//! # Example
//!
//! ```rust,no_run
//! use chunkquery::querier::*;
//! use chunkquery::series::MergeIteratorStrategy;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = Arc::new(MemoryChunkStore::new());
//!     let queryable = ChunkStoreQueryable::new(store, Arc::new(MergeIteratorStrategy));
//!
//!     let querier = queryable.querier(RequestContext::with_tenant("team-a"), 0, 3_600_000)?;
//!     let (series, _warnings) = querier
//!         .select(&SelectParams::new(0, 3_600_000), &[Matcher::equal("__name__", "up")])
//!         .await?;
//!
//!     for s in &series {
//!         println!("{} → {} samples", s.labels(), s.iterator().count());
//!     }
//!     querier.close()?;
//!     Ok(())
//! }
//! ```

mod context;
mod error;
mod matcher;
mod queryable;
mod store;

pub use context::{RequestContext, ORG_ID_HEADER};
pub use error::{QueryError, QueryResult, StoreError, StoreResult};
pub use matcher::{matches_all, MatchType, Matcher};
pub use queryable::{ChunkStoreQuerier, ChunkStoreQueryable, Querier, Queryable, SelectParams, Warnings};
pub use store::{ChunkStore, MemoryChunkStore};
