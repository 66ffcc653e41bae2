//! In-memory storage backend and its fixture

use crate::chunk::{parse_external_key, Chunk};
use crate::querier::{StoreError, StoreResult};
use crate::testutils::clients::{
    ChunkClient, IndexClient, IndexEntry, SchemaConfig, TableClient, TableDesc,
};
use crate::testutils::{default_schema_config, Clients, Fixture, HarnessError, HarnessResult};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Index, chunk and table client backed by maps
#[derive(Debug, Default)]
pub struct MemoryStorageClient {
    tables: RwLock<BTreeMap<String, TableDesc>>,
    index: RwLock<HashMap<(String, String), Vec<IndexEntry>>>,
    chunks: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryStorageClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored chunk blobs
    pub async fn chunk_count(&self) -> usize {
        self.chunks.read().await.len()
    }
}

#[async_trait]
impl IndexClient for MemoryStorageClient {
    async fn write_entries(&self, entries: Vec<IndexEntry>) -> StoreResult<()> {
        let tables = self.tables.read().await;
        let mut index = self.index.write().await;

        for entry in entries {
            if !tables.contains_key(&entry.table_name) {
                return Err(StoreError::TableNotFound(entry.table_name));
            }
            let rows = index
                .entry((entry.table_name.clone(), entry.hash_value.clone()))
                .or_default();
            // Rows are unique per range value; a rewrite replaces the value.
            match rows.binary_search_by(|r| r.range_value.cmp(&entry.range_value)) {
                Ok(pos) => rows[pos] = entry,
                Err(pos) => rows.insert(pos, entry),
            }
        }
        Ok(())
    }

    async fn query_entries(&self, table_name: &str, hash_value: &str) -> StoreResult<Vec<IndexEntry>> {
        if !self.tables.read().await.contains_key(table_name) {
            return Err(StoreError::TableNotFound(table_name.to_string()));
        }
        Ok(self
            .index
            .read()
            .await
            .get(&(table_name.to_string(), hash_value.to_string()))
            .cloned()
            .unwrap_or_default())
    }
}

#[async_trait]
impl ChunkClient for MemoryStorageClient {
    async fn put_chunks(&self, chunks: &[Chunk]) -> StoreResult<()> {
        let mut encoded = Vec::with_capacity(chunks.len());
        for chunk in chunks {
            encoded.push((chunk.external_key(), chunk.encoded()?.to_vec()));
        }
        self.chunks.write().await.extend(encoded);
        Ok(())
    }

    async fn get_chunks(&self, keys: &[String]) -> StoreResult<Vec<Chunk>> {
        let stored = self.chunks.read().await;
        keys.iter()
            .map(|key| -> StoreResult<Chunk> {
                let bytes = stored
                    .get(key)
                    .ok_or_else(|| StoreError::NotFound(key.clone()))?;
                let parsed = parse_external_key(key)?;
                Ok(Chunk::decode(&parsed, bytes)?)
            })
            .collect()
    }
}

#[async_trait]
impl TableClient for MemoryStorageClient {
    async fn list_tables(&self) -> StoreResult<Vec<String>> {
        Ok(self.tables.read().await.keys().cloned().collect())
    }

    async fn create_table(&self, desc: TableDesc) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        if tables.contains_key(&desc.name) {
            return Err(StoreError::Backend(format!("table {} already exists", desc.name)));
        }
        tables.insert(desc.name.clone(), desc);
        Ok(())
    }

    async fn describe_table(&self, name: &str) -> StoreResult<TableDesc> {
        self.tables
            .read()
            .await
            .get(name)
            .cloned()
            .ok_or_else(|| StoreError::TableNotFound(name.to_string()))
    }

    async fn delete_table(&self, name: &str) -> StoreResult<()> {
        if self.tables.write().await.remove(name).is_none() {
            return Err(StoreError::TableNotFound(name.to_string()));
        }
        self.index.write().await.retain(|(table, _), _| table != name);
        Ok(())
    }
}

/// Fixture over a fresh [`MemoryStorageClient`]
pub struct MemoryFixture {
    name: String,
    client: Arc<MemoryStorageClient>,
    schema: SchemaConfig,
    torn_down: AtomicBool,
}

impl MemoryFixture {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            client: Arc::new(MemoryStorageClient::new()),
            schema: default_schema_config("inmemory"),
            torn_down: AtomicBool::new(false),
        }
    }

    /// Backing client, for assertions
    pub fn client(&self) -> &Arc<MemoryStorageClient> {
        &self.client
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Fixture for MemoryFixture {
    fn name(&self) -> &str {
        &self.name
    }

    async fn clients(&self) -> HarnessResult<Clients> {
        if self.is_torn_down() {
            return Err(HarnessError::Setup(format!(
                "fixture {} already torn down",
                self.name
            )));
        }
        Ok(Clients {
            index: self.client.clone(),
            chunk: self.client.clone(),
            table: self.client.clone(),
            schema: self.schema.clone(),
        })
    }

    async fn teardown(&self) -> HarnessResult<()> {
        if self.torn_down.swap(true, Ordering::SeqCst) {
            return Err(HarnessError::Teardown(format!(
                "fixture {} torn down twice",
                self.name
            )));
        }
        tracing::debug!(fixture = %self.name, "Fixture torn down");
        Ok(())
    }
}
