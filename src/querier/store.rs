//! Chunk-store capability
//!
//! The querier only needs one thing from storage: all chunks of a tenant
//! that overlap a time range and satisfy a set of label matchers.

use crate::chunk::{Chunk, Time};
use crate::querier::context::RequestContext;
use crate::querier::error::{StoreError, StoreResult};
use crate::querier::matcher::{matches_all, Matcher};
use async_trait::async_trait;
use tokio::sync::RwLock;

/// Source of chunks for the querier.
///
/// Implementations must tolerate concurrent `get` calls when the querier is
/// shared between query workers. The request context is handed over as-is;
/// honouring its deadline is up to the store.
#[async_trait]
pub trait ChunkStore: Send + Sync {
    async fn get(
        &self,
        ctx: &RequestContext,
        tenant_id: &str,
        from: Time,
        through: Time,
        matchers: &[Matcher],
    ) -> StoreResult<Vec<Chunk>>;
}

/// In-memory chunk store
#[derive(Debug, Default)]
pub struct MemoryChunkStore {
    chunks: RwLock<Vec<Chunk>>,
}

impl MemoryChunkStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add chunks to the store
    pub async fn put(&self, chunks: impl IntoIterator<Item = Chunk>) {
        self.chunks.write().await.extend(chunks);
    }

    pub async fn len(&self) -> usize {
        self.chunks.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.chunks.read().await.is_empty()
    }
}

#[async_trait]
impl ChunkStore for MemoryChunkStore {
    async fn get(
        &self,
        ctx: &RequestContext,
        tenant_id: &str,
        from: Time,
        through: Time,
        matchers: &[Matcher],
    ) -> StoreResult<Vec<Chunk>> {
        if ctx.is_expired() {
            return Err(StoreError::Timeout);
        }

        let chunks = self.chunks.read().await;
        let found: Vec<Chunk> = chunks
            .iter()
            .filter(|c| c.tenant_id() == tenant_id)
            .filter(|c| c.from() <= through && c.through() >= from)
            .filter(|c| matches_all(matchers, c.metric()))
            .cloned()
            .collect();

        tracing::trace!(
            tenant = tenant_id,
            from,
            through,
            found = found.len(),
            "Memory store lookup"
        );
        Ok(found)
    }
}
