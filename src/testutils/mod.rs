//! Backend compliance harness
//!
//! Lets the same conformance tests run against every storage backend:
//!
//! - **Fixture**: binds a backend to its clients and tears it down
//! - **setup**: bootstraps schema tables plus one named table
//! - **create_chunks**: deterministic synthetic chunks for load generation
//! - **clients**: the client capabilities a backend must provide
//! - **memory**: in-memory backend used to exercise the harness itself
//!
//! # Example
//!
//! ```rust,no_run
//! use chunkquery::chunk::now;
//! use chunkquery::testutils::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), HarnessError> {
//!     let fixture = MemoryFixture::new("inmemory");
//!     run_with_fixture(&fixture, || async {
//!         let (_index, chunks) = setup(&fixture, "test_table").await?;
//!         let (keys, batch) = create_chunks(0, 10, now());
//!         chunks.put_chunks(&batch).await?;
//!         assert_eq!(chunks.get_chunks(&keys).await?.len(), 10);
//!         Ok(())
//!     })
//!     .await
//! }
//! ```

pub mod clients;
pub mod memory;

pub use clients::{
    ChunkClient, IndexClient, IndexEntry, PeriodConfig, SchemaConfig, TableClient, TableDesc,
    TableManager,
};
pub use memory::{MemoryFixture, MemoryStorageClient};

use crate::chunk::{now, Chunk, Labels, SampleBlock, Time, HOUR, METRIC_NAME_LABEL};
use crate::config::TableManagerConfig;
use crate::querier::StoreError;
use async_trait::async_trait;
use futures_util::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Tenant all synthetic chunks belong to
pub const USER_ID: &str = "userID";

/// Active-table window handed to the table manager during setup
pub const ACTIVE_TABLE_WINDOW: Duration = Duration::from_secs(12 * 60 * 60);

/// Harness failures; all of them are fatal to a test run
#[derive(Error, Debug)]
pub enum HarnessError {
    #[error("Fixture setup failed: {0}")]
    Setup(String),

    #[error("Fixture teardown failed: {0}")]
    Teardown(String),

    #[error("Backend error: {0}")]
    Backend(#[from] StoreError),
}

pub type HarnessResult<T> = Result<T, HarnessError>;

/// Clients bound to one backend instance
#[derive(Clone)]
pub struct Clients {
    pub index: Arc<dyn IndexClient>,
    pub chunk: Arc<dyn ChunkClient>,
    pub table: Arc<dyn TableClient>,
    pub schema: SchemaConfig,
}

/// A storage backend under test.
///
/// `teardown` must run exactly once, after every test using the fixture.
/// [`run_with_fixture`] takes care of that.
#[async_trait]
pub trait Fixture: Send + Sync {
    fn name(&self) -> &str;

    async fn clients(&self) -> HarnessResult<Clients>;

    async fn teardown(&self) -> HarnessResult<()>;
}

/// Default single-period schema for a backend kind
pub fn default_schema_config(kind: &str) -> SchemaConfig {
    SchemaConfig::single(kind, "v1", now() - 2 * HOUR)
}

/// Bootstrap a fixture: sync the schema's tables, then create `table_name`.
///
/// Any failing step aborts setup.
pub async fn setup(
    fixture: &dyn Fixture,
    table_name: &str,
) -> HarnessResult<(Arc<dyn IndexClient>, Arc<dyn ChunkClient>)> {
    let clients = fixture.clients().await?;

    let manager = TableManager::new(
        TableManagerConfig::default(),
        clients.schema,
        ACTIVE_TABLE_WINDOW,
        Arc::clone(&clients.table),
    )?;
    manager.sync_tables().await?;

    clients
        .table
        .create_table(TableDesc::named(table_name))
        .await?;

    tracing::info!(fixture = fixture.name(), table = table_name, "Fixture ready");
    Ok((clients.index, clients.chunk))
}

/// `batch_size` synthetic chunks for metric `foo` of [`USER_ID`].
///
/// Chunk `j` carries label `index = start_index * batch_size + j`, one sample
/// `(start, 0)` and spans `(start - 1h, start]`. Returns the external keys
/// alongside the chunks.
///
/// # Panics
/// Panics if a chunk cannot be encoded; synthetic input must always encode.
pub fn create_chunks(start_index: usize, batch_size: usize, start: Time) -> (Vec<String>, Vec<Chunk>) {
    let mut keys = Vec::with_capacity(batch_size);
    let mut chunks = Vec::with_capacity(batch_size);

    for j in 0..batch_size {
        let metric = Labels::from_pairs([
            (METRIC_NAME_LABEL.to_string(), "foo".to_string()),
            ("index".to_string(), (start_index * batch_size + j).to_string()),
        ]);
        let chunk = dummy_chunk_for(start, metric);
        keys.push(chunk.external_key());
        chunks.push(chunk);
    }

    (keys, chunks)
}

fn dummy_chunk_for(at: Time, metric: Labels) -> Chunk {
    let mut data = SampleBlock::new();
    if let Err(e) = data.add(at, 0.0) {
        panic!("synthetic sample rejected: {}", e);
    }

    let mut chunk = match Chunk::new(USER_ID, metric.fingerprint(), metric, data, at - HOUR, at) {
        Ok(chunk) => chunk,
        Err(e) => panic!("synthetic chunk invalid: {}", e),
    };

    // Force checksum calculation.
    if let Err(e) = chunk.encode() {
        panic!("synthetic chunk failed to encode: {}", e);
    }
    chunk
}

/// Run `body`, then tear the fixture down exactly once, whether the body
/// succeeded, failed or panicked. A body panic is resumed after teardown.
pub async fn run_with_fixture<F, Fut, T>(fixture: &dyn Fixture, body: F) -> HarnessResult<T>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = HarnessResult<T>>,
{
    let outcome = AssertUnwindSafe(body()).catch_unwind().await;
    let teardown = fixture.teardown().await;

    match outcome {
        Ok(Ok(value)) => teardown.map(|_| value),
        Ok(Err(e)) => {
            if let Err(te) = teardown {
                tracing::error!(fixture = fixture.name(), error = %te, "Teardown failed after test error");
            }
            Err(e)
        }
        Err(panic) => {
            if let Err(te) = teardown {
                tracing::error!(fixture = fixture.name(), error = %te, "Teardown failed after test panic");
            }
            std::panic::resume_unwind(panic)
        }
    }
}

/// Tear a fixture down, failing the test on error
pub async fn teardown_fixture(fixture: &dyn Fixture) {
    if let Err(e) = fixture.teardown().await {
        panic!("teardown of fixture {} failed: {}", fixture.name(), e);
    }
}
