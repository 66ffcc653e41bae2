//! Query-engine facing façade over a chunk store
//!
//! ```text
//! select(params, matchers)
//!   → ctx.tenant_id()          (Auth error if missing)
//!   → ChunkStore::get          (Storage error on failure)
//!   → partition_chunks         (sorted SeriesSet)
//! ```

use crate::chunk::Time;
use crate::querier::context::RequestContext;
use crate::querier::error::{QueryError, QueryResult};
use crate::querier::matcher::Matcher;
use crate::querier::store::ChunkStore;
use crate::series::{partition_chunks, ChunkIteratorStrategy, SeriesSet};
use async_trait::async_trait;
use std::sync::Arc;

/// Non-fatal notes attached to a result
pub type Warnings = Vec<String>;

/// Time range for one select call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SelectParams {
    /// Start of the range to fetch, in milliseconds
    pub start: Time,
    /// End of the range to fetch, in milliseconds
    pub end: Time,
}

impl SelectParams {
    pub fn new(start: Time, end: Time) -> Self {
        Self { start, end }
    }
}

/// Read access bound to one request and one query window
#[async_trait]
pub trait Querier: Send + Sync {
    /// Series matching `matchers`, sorted by label set
    async fn select(
        &self,
        params: &SelectParams,
        matchers: &[Matcher],
    ) -> QueryResult<(SeriesSet, Warnings)>;

    /// Same as [`Querier::select`]; output is always sorted
    async fn select_sorted(
        &self,
        params: &SelectParams,
        matchers: &[Matcher],
    ) -> QueryResult<(SeriesSet, Warnings)> {
        self.select(params, matchers).await
    }

    fn label_values(&self, name: &str) -> QueryResult<(Vec<String>, Warnings)>;

    fn label_names(&self) -> QueryResult<(Vec<String>, Warnings)>;

    fn close(&self) -> QueryResult<()>;
}

/// Factory for queriers
pub trait Queryable: Send + Sync {
    fn querier(&self, ctx: RequestContext, mint: Time, maxt: Time) -> QueryResult<Box<dyn Querier>>;
}

/// Queryable backed by a [`ChunkStore`]
#[derive(Clone)]
pub struct ChunkStoreQueryable {
    store: Arc<dyn ChunkStore>,
    strategy: Arc<dyn ChunkIteratorStrategy>,
}

impl ChunkStoreQueryable {
    pub fn new(store: Arc<dyn ChunkStore>, strategy: Arc<dyn ChunkIteratorStrategy>) -> Self {
        Self { store, strategy }
    }
}

impl Queryable for ChunkStoreQueryable {
    fn querier(&self, ctx: RequestContext, mint: Time, maxt: Time) -> QueryResult<Box<dyn Querier>> {
        Ok(Box::new(ChunkStoreQuerier::new(
            Arc::clone(&self.store),
            Arc::clone(&self.strategy),
            ctx,
            mint,
            maxt,
        )))
    }
}

/// Querier over a chunk store for one request.
///
/// Holds nothing but shared handles, so one instance can serve concurrent
/// selects.
#[derive(Clone)]
pub struct ChunkStoreQuerier {
    store: Arc<dyn ChunkStore>,
    strategy: Arc<dyn ChunkIteratorStrategy>,
    ctx: RequestContext,
    mint: Time,
    maxt: Time,
}

impl ChunkStoreQuerier {
    pub fn new(
        store: Arc<dyn ChunkStore>,
        strategy: Arc<dyn ChunkIteratorStrategy>,
        ctx: RequestContext,
        mint: Time,
        maxt: Time,
    ) -> Self {
        Self {
            store,
            strategy,
            ctx,
            mint,
            maxt,
        }
    }
}

#[async_trait]
impl Querier for ChunkStoreQuerier {
    async fn select(
        &self,
        params: &SelectParams,
        matchers: &[Matcher],
    ) -> QueryResult<(SeriesSet, Warnings)> {
        let tenant = self.ctx.tenant_id()?;

        tracing::debug!(
            request_id = %self.ctx.request_id(),
            tenant,
            start = params.start,
            end = params.end,
            matchers = matchers.len(),
            "Selecting chunks"
        );

        let chunks = self
            .store
            .get(&self.ctx, tenant, params.start, params.end, matchers)
            .await
            .map_err(|e| {
                tracing::warn!(request_id = %self.ctx.request_id(), tenant, error = %e, "Chunk store get failed");
                QueryError::Storage(e)
            })?;

        let chunk_count = chunks.len();
        let set = partition_chunks(chunks, self.mint, self.maxt, &self.strategy);

        tracing::debug!(
            request_id = %self.ctx.request_id(),
            tenant,
            chunks = chunk_count,
            series = set.len(),
            "Partitioned chunks into series"
        );

        Ok((set, Warnings::new()))
    }

    fn label_values(&self, _name: &str) -> QueryResult<(Vec<String>, Warnings)> {
        Ok((Vec::new(), Warnings::new()))
    }

    fn label_names(&self) -> QueryResult<(Vec<String>, Warnings)> {
        Ok((Vec::new(), Warnings::new()))
    }

    fn close(&self) -> QueryResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::{Chunk, Labels, SampleBlock};
    use crate::querier::error::{StoreError, StoreResult};
    use crate::querier::store::MemoryChunkStore;
    use crate::series::MergeIteratorStrategy;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Store that counts calls and can be told to fail
    #[derive(Default)]
    struct CountingStore {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl ChunkStore for CountingStore {
        async fn get(
            &self,
            _ctx: &RequestContext,
            _tenant_id: &str,
            _from: Time,
            _through: Time,
            _matchers: &[Matcher],
        ) -> StoreResult<Vec<Chunk>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(StoreError::Unavailable("connection refused".to_string()))
            } else {
                Ok(Vec::new())
            }
        }
    }

    fn chunk(tenant: &str, index: &str, samples: &[(Time, f64)]) -> Chunk {
        let metric = Labels::from_pairs([("__name__", "foo"), ("index", index)]);
        let mut data = SampleBlock::new();
        for &(t, v) in samples {
            data.add(t, v).unwrap();
        }
        let from = samples[0].0;
        let through = samples[samples.len() - 1].0;
        let mut chunk = Chunk::new(tenant, metric.fingerprint(), metric, data, from, through).unwrap();
        chunk.encode().unwrap();
        chunk
    }

    fn querier_for(store: Arc<dyn ChunkStore>, ctx: RequestContext) -> Box<dyn Querier> {
        ChunkStoreQueryable::new(store, Arc::new(MergeIteratorStrategy))
            .querier(ctx, 0, 1_000)
            .unwrap()
    }

    #[tokio::test]
    async fn test_select_without_tenant_is_auth_error() {
        let store = Arc::new(CountingStore::default());
        let querier = querier_for(store.clone(), RequestContext::new());

        let err = querier
            .select(&SelectParams::new(0, 1_000), &[])
            .await
            .unwrap_err();

        assert!(matches!(err, QueryError::Auth(_)));
        assert!(!err.is_retryable());
        assert_eq!(store.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_store_failure_is_storage_error() {
        let store = Arc::new(CountingStore {
            fail: true,
            ..Default::default()
        });
        let querier = querier_for(store.clone(), RequestContext::with_tenant("user"));

        let err = querier
            .select(&SelectParams::new(0, 1_000), &[])
            .await
            .unwrap_err();

        assert!(matches!(err, QueryError::Storage(StoreError::Unavailable(_))));
        assert!(err.is_retryable());
        assert_eq!(store.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_empty_store_gives_empty_set() {
        let store = Arc::new(CountingStore::default());
        let querier = querier_for(store, RequestContext::with_tenant("user"));

        let (set, warnings) = querier
            .select(&SelectParams::new(0, 1_000), &[])
            .await
            .unwrap();

        assert!(set.is_empty());
        assert!(warnings.is_empty());
    }

    #[tokio::test]
    async fn test_select_returns_sorted_series() {
        let store = Arc::new(MemoryChunkStore::new());
        store
            .put(vec![
                chunk("user", "2", &[(100, 2.0)]),
                chunk("user", "1", &[(100, 1.0), (200, 1.5)]),
                chunk("user", "2", &[(300, 2.5)]),
                chunk("other", "1", &[(100, 9.0)]),
            ])
            .await;

        let querier = querier_for(store, RequestContext::with_tenant("user"));
        let (set, _) = querier
            .select_sorted(
                &SelectParams::new(0, 1_000),
                &[Matcher::equal("__name__", "foo")],
            )
            .await
            .unwrap();

        let indexes: Vec<&str> = set
            .iter()
            .map(|s| s.labels().get("index").unwrap())
            .collect();
        assert_eq!(indexes, vec!["1", "2"]);

        let second: Vec<(Time, f64)> = set
            .iter()
            .nth(1)
            .unwrap()
            .iterator()
            .map(|s| (s.timestamp, s.value))
            .collect();
        assert_eq!(second, vec![(100, 2.0), (300, 2.5)]);
    }

    #[tokio::test]
    async fn test_querier_window_clips_samples() {
        let store = Arc::new(MemoryChunkStore::new());
        store
            .put(vec![chunk("user", "1", &[(100, 1.0), (600, 2.0), (2_000, 3.0)])])
            .await;

        let querier = ChunkStoreQueryable::new(store, Arc::new(MergeIteratorStrategy))
            .querier(RequestContext::with_tenant("user"), 500, 1_000)
            .unwrap();
        let (set, _) = querier
            .select(&SelectParams::new(0, 5_000), &[])
            .await
            .unwrap();

        let series = set.iter().next().unwrap();
        assert_eq!(series.chunks().len(), 1);
        let timestamps: Vec<Time> = series.iterator().map(|s| s.timestamp).collect();
        assert_eq!(timestamps, vec![600]);
    }

    #[tokio::test]
    async fn test_label_queries_unsupported_but_empty() {
        let querier = querier_for(
            Arc::new(CountingStore::default()),
            RequestContext::with_tenant("user"),
        );

        let (values, warnings) = querier.label_values("__name__").unwrap();
        assert!(values.is_empty());
        assert!(warnings.is_empty());

        let (names, _) = querier.label_names().unwrap();
        assert!(names.is_empty());
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let querier = querier_for(
            Arc::new(CountingStore::default()),
            RequestContext::with_tenant("user"),
        );
        assert!(querier.close().is_ok());
        assert!(querier.close().is_ok());
    }

    #[tokio::test]
    async fn test_concurrent_selects_share_querier() {
        let store = Arc::new(MemoryChunkStore::new());
        store.put(vec![chunk("user", "1", &[(100, 1.0)])]).await;

        let querier = Arc::new(ChunkStoreQuerier::new(
            store,
            Arc::new(MergeIteratorStrategy),
            RequestContext::with_tenant("user"),
            0,
            1_000,
        ));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let querier = Arc::clone(&querier);
            handles.push(tokio::spawn(async move {
                let (set, _) = querier
                    .select(&SelectParams::new(0, 1_000), &[])
                    .await
                    .unwrap();
                set.len()
            }));
        }

        for handle in handles {
            assert_eq!(handle.await.unwrap(), 1);
        }
    }
}
