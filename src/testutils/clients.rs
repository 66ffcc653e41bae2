//! Storage client capabilities and table bootstrap
//!
//! A backend under test exposes three clients: index entries, chunk blobs
//! and table lifecycle. `TableManager` only makes sure the tables named by
//! the schema exist; period and retention handling live elsewhere.

use crate::chunk::{Chunk, Time};
use crate::config::TableManagerConfig;
use crate::querier::StoreResult;
use crate::testutils::{HarnessError, HarnessResult};
use async_trait::async_trait;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

/// One row of the label index
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct IndexEntry {
    pub table_name: String,
    pub hash_value: String,
    pub range_value: Vec<u8>,
    pub value: Vec<u8>,
}

/// Table to create or describe
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDesc {
    pub name: String,
    pub provisioned_read: i64,
    pub provisioned_write: i64,
}

impl TableDesc {
    /// Table with zero provisioned throughput
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            provisioned_read: 0,
            provisioned_write: 0,
        }
    }
}

#[async_trait]
pub trait IndexClient: Send + Sync {
    async fn write_entries(&self, entries: Vec<IndexEntry>) -> StoreResult<()>;

    /// Entries in `table_name` under `hash_value`, ordered by range value
    async fn query_entries(&self, table_name: &str, hash_value: &str) -> StoreResult<Vec<IndexEntry>>;
}

#[async_trait]
pub trait ChunkClient: Send + Sync {
    /// Store encoded chunks under their external keys
    async fn put_chunks(&self, chunks: &[Chunk]) -> StoreResult<()>;

    /// Fetch and decode chunks by external key
    async fn get_chunks(&self, keys: &[String]) -> StoreResult<Vec<Chunk>>;
}

#[async_trait]
pub trait TableClient: Send + Sync {
    async fn list_tables(&self) -> StoreResult<Vec<String>>;

    async fn create_table(&self, desc: TableDesc) -> StoreResult<()>;

    async fn describe_table(&self, name: &str) -> StoreResult<TableDesc>;

    async fn delete_table(&self, name: &str) -> StoreResult<()>;
}

/// One schema period
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeriodConfig {
    /// First timestamp this period applies to
    pub from: Time,
    /// Backend kind, e.g. "inmemory"
    pub store: String,
    /// Schema version
    pub schema: String,
    pub index_table: String,
    pub chunk_table: String,
}

/// Ordered list of schema periods
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaConfig {
    pub configs: Vec<PeriodConfig>,
}

impl SchemaConfig {
    /// Single-period schema for `store` starting at `from`
    pub fn single(store: &str, schema: &str, from: Time) -> Self {
        Self {
            configs: vec![PeriodConfig {
                from,
                store: store.to_string(),
                schema: schema.to_string(),
                index_table: "index".to_string(),
                chunk_table: "chunks".to_string(),
            }],
        }
    }

    /// Every table the schema refers to, deduplicated and sorted
    pub fn table_names(&self) -> Vec<String> {
        self.configs
            .iter()
            .flat_map(|p| [p.index_table.clone(), p.chunk_table.clone()])
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

/// Creates the tables a schema needs
pub struct TableManager {
    cfg: TableManagerConfig,
    schema: SchemaConfig,
    max_chunk_age: Duration,
    client: Arc<dyn TableClient>,
}

impl TableManager {
    pub fn new(
        cfg: TableManagerConfig,
        schema: SchemaConfig,
        max_chunk_age: Duration,
        client: Arc<dyn TableClient>,
    ) -> HarnessResult<Self> {
        if schema.configs.is_empty() {
            return Err(HarnessError::Setup("schema has no periods".to_string()));
        }
        if max_chunk_age.is_zero() {
            return Err(HarnessError::Setup("max chunk age must be positive".to_string()));
        }
        Ok(Self {
            cfg,
            schema,
            max_chunk_age,
            client,
        })
    }

    pub fn max_chunk_age(&self) -> Duration {
        self.max_chunk_age
    }

    /// Tables the schema expects, with configured throughput
    pub fn expected_tables(&self) -> Vec<TableDesc> {
        self.schema
            .table_names()
            .into_iter()
            .map(|name| TableDesc {
                name,
                provisioned_read: self.cfg.provisioned_read_throughput,
                provisioned_write: self.cfg.provisioned_write_throughput,
            })
            .collect()
    }

    /// Create every expected table that does not exist yet.
    ///
    /// Safe to run repeatedly. Returns the names of the tables created.
    pub async fn sync_tables(&self) -> HarnessResult<Vec<String>> {
        let existing: BTreeSet<String> = self.client.list_tables().await?.into_iter().collect();

        let mut created = Vec::new();
        for desc in self.expected_tables() {
            if existing.contains(&desc.name) {
                continue;
            }
            tracing::info!(table = %desc.name, "Creating table");
            let name = desc.name.clone();
            self.client.create_table(desc).await?;
            created.push(name);
        }

        tracing::debug!(
            expected = self.schema.table_names().len(),
            created = created.len(),
            "Table sync complete"
        );
        Ok(created)
    }
}
