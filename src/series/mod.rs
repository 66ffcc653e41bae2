//! Series partitioning
//!
//! Turns the flat chunk list returned by a chunk store into a sorted
//! `SeriesSet`:
//!
//! ```text
//! [Chunk, Chunk, ...] ─group by fingerprint─→ HashMap<Fingerprint, buckets>
//!                     ─one Series per label set─→ Vec<Series>
//!                     ─sort by labels─→ SeriesSet
//! ```
//!
//! Samples are not touched here; each `Series` builds its iterator on
//! demand through the injected [`ChunkIteratorStrategy`].

pub mod iterator;

pub use iterator::{ChunkIteratorStrategy, MergeIterator, MergeIteratorStrategy, SeriesIterator};

use crate::chunk::{Chunk, Fingerprint, Labels, Time};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// One label set plus the chunks that cover it within a query window
#[derive(Clone)]
pub struct Series {
    labels: Labels,
    chunks: Vec<Chunk>,
    strategy: Arc<dyn ChunkIteratorStrategy>,
    mint: Time,
    maxt: Time,
}

impl Series {
    pub fn labels(&self) -> &Labels {
        &self.labels
    }

    /// Build a fresh iterator over the samples in `[mint, maxt]`.
    ///
    /// Decoding happens here, not at partition time.
    pub fn iterator(&self) -> Box<dyn SeriesIterator> {
        self.strategy.iterator(&self.chunks, self.mint, self.maxt)
    }

    /// Unmerged backing chunks
    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    pub fn into_chunks(self) -> Vec<Chunk> {
        self.chunks
    }
}

impl fmt::Debug for Series {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Series")
            .field("labels", &self.labels)
            .field("chunks", &self.chunks.len())
            .field("mint", &self.mint)
            .field("maxt", &self.maxt)
            .finish()
    }
}

/// Query result: series sorted by label set
#[derive(Debug, Clone, Default)]
pub struct SeriesSet {
    series: Vec<Series>,
}

impl SeriesSet {
    /// Build a set, sorting the series by labels
    pub fn new(mut series: Vec<Series>) -> Self {
        series.sort_by(|a, b| a.labels.cmp(&b.labels));
        Self { series }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Series> {
        self.series.iter()
    }

    /// Total number of chunks across all series
    pub fn chunk_count(&self) -> usize {
        self.series.iter().map(|s| s.chunks.len()).sum()
    }
}

impl IntoIterator for SeriesSet {
    type Item = Series;
    type IntoIter = std::vec::IntoIter<Series>;

    fn into_iter(self) -> Self::IntoIter {
        self.series.into_iter()
    }
}

impl<'a> IntoIterator for &'a SeriesSet {
    type Item = &'a Series;
    type IntoIter = std::slice::Iter<'a, Series>;

    fn into_iter(self) -> Self::IntoIter {
        self.series.iter()
    }
}

/// Group chunks into series, sorted by label set.
///
/// Chunks are bucketed by the fingerprint they carry. Inside a bucket,
/// chunks whose label sets differ (a fingerprint collision) are kept in
/// separate series.
pub fn partition_chunks(
    chunks: Vec<Chunk>,
    mint: Time,
    maxt: Time,
    strategy: &Arc<dyn ChunkIteratorStrategy>,
) -> SeriesSet {
    let mut by_series: HashMap<Fingerprint, Vec<Vec<Chunk>>> = HashMap::new();

    for chunk in chunks {
        let fp = chunk.fingerprint();
        let buckets = by_series.entry(fp).or_default();

        match buckets
            .iter_mut()
            .find(|bucket| bucket[0].metric() == chunk.metric())
        {
            Some(bucket) => bucket.push(chunk),
            None => {
                if let Some(existing) = buckets.first() {
                    tracing::warn!(
                        fingerprint = %fp,
                        existing = %existing[0].metric(),
                        colliding = %chunk.metric(),
                        "Fingerprint collision between distinct label sets"
                    );
                }
                buckets.push(vec![chunk]);
            }
        }
    }

    let series: Vec<Series> = by_series
        .into_values()
        .flatten()
        .map(|chunks| Series {
            labels: chunks[0].metric().clone(),
            chunks,
            strategy: Arc::clone(strategy),
            mint,
            maxt,
        })
        .collect();

    SeriesSet::new(series)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::SampleBlock;

    fn strategy() -> Arc<dyn ChunkIteratorStrategy> {
        Arc::new(MergeIteratorStrategy)
    }

    fn chunk(labels: &[(&str, &str)], from: Time, samples: &[(Time, f64)]) -> Chunk {
        let metric = Labels::from_pairs(labels.iter().copied());
        let mut data = SampleBlock::new();
        for &(t, v) in samples {
            data.add(t, v).unwrap();
        }
        let through = samples.last().map(|s| s.0).unwrap_or(from);
        let mut chunk = Chunk::new("user", metric.fingerprint(), metric, data, from, through).unwrap();
        chunk.encode().unwrap();
        chunk
    }

    fn label_sets(set: &SeriesSet) -> Vec<Labels> {
        set.iter().map(|s| s.labels().clone()).collect()
    }

    fn mixed_chunks() -> Vec<Chunk> {
        vec![
            chunk(&[("__name__", "foo"), ("index", "2")], 0, &[(10, 1.0)]),
            chunk(&[("__name__", "bar")], 0, &[(10, 1.0)]),
            chunk(&[("__name__", "foo"), ("index", "1")], 0, &[(10, 1.0)]),
            chunk(&[("__name__", "foo"), ("index", "2")], 20, &[(20, 2.0)]),
            chunk(&[("index", "1"), ("__name__", "foo")], 30, &[(30, 3.0)]),
        ]
    }

    #[test]
    fn test_empty_input() {
        let set = partition_chunks(Vec::new(), 0, 100, &strategy());
        assert!(set.is_empty());
        assert_eq!(set.len(), 0);
    }

    #[test]
    fn test_groups_and_preserves_chunk_count() {
        let chunks = mixed_chunks();
        let total = chunks.len();
        let set = partition_chunks(chunks, 0, 100, &strategy());

        assert_eq!(set.len(), 3);
        assert_eq!(set.chunk_count(), total);

        for series in &set {
            assert!(series
                .chunks()
                .iter()
                .all(|c| c.metric() == series.labels()));
        }
    }

    #[test]
    fn test_output_sorted_by_labels() {
        let set = partition_chunks(mixed_chunks(), 0, 100, &strategy());
        assert_eq!(
            label_sets(&set),
            vec![
                Labels::from_pairs([("__name__", "bar")]),
                Labels::from_pairs([("__name__", "foo"), ("index", "1")]),
                Labels::from_pairs([("__name__", "foo"), ("index", "2")]),
            ]
        );
    }

    #[test]
    fn test_order_independent_of_input_order() {
        let forward = partition_chunks(mixed_chunks(), 0, 100, &strategy());
        let mut reversed_input = mixed_chunks();
        reversed_input.reverse();
        let reversed = partition_chunks(reversed_input, 0, 100, &strategy());

        assert_eq!(label_sets(&forward), label_sets(&reversed));
    }

    #[test]
    fn test_fingerprint_collision_keeps_series_apart() {
        let colliding = |index: &str, t: Time| {
            let metric = Labels::from_pairs([("__name__", "foo"), ("index", index)]);
            let mut data = SampleBlock::new();
            data.add(t, 1.0).unwrap();
            Chunk::new("user", Fingerprint(1), metric, data, t, t).unwrap()
        };
        let chunks = vec![colliding("b", 10), colliding("a", 20), colliding("b", 30)];

        let set = partition_chunks(chunks, 0, 100, &strategy());
        assert_eq!(set.len(), 2);
        assert_eq!(set.chunk_count(), 3);
        assert_eq!(
            label_sets(&set),
            vec![
                Labels::from_pairs([("__name__", "foo"), ("index", "a")]),
                Labels::from_pairs([("__name__", "foo"), ("index", "b")]),
            ]
        );

        let b: Vec<Time> = set
            .iter()
            .find(|s| s.labels().get("index") == Some("b"))
            .unwrap()
            .iterator()
            .map(|s| s.timestamp)
            .collect();
        assert_eq!(b, vec![10, 30]);
    }

    #[test]
    fn test_iterator_is_built_lazily_and_repeatable() {
        let set = partition_chunks(mixed_chunks(), 15, 100, &strategy());
        let series = set
            .iter()
            .find(|s| s.labels().get("index") == Some("1"))
            .unwrap();

        let first: Vec<Time> = series.iterator().map(|s| s.timestamp).collect();
        let second: Vec<Time> = series.iterator().map(|s| s.timestamp).collect();
        assert_eq!(first, vec![30]);
        assert_eq!(first, second);
    }

    #[test]
    fn test_strategy_receives_window() {
        let seen: Arc<dyn ChunkIteratorStrategy> =
            Arc::new(|chunks: &[Chunk], from: Time, through: Time| -> Box<dyn SeriesIterator> {
                assert_eq!((from, through), (5, 50));
                assert_eq!(chunks.len(), 2);
                Box::new(MergeIterator::new(chunks, from, through))
            });

        let set = partition_chunks(mixed_chunks(), 5, 50, &seen);
        let series = set
            .iter()
            .find(|s| s.labels().get("index") == Some("2"))
            .unwrap();
        assert_eq!(series.iterator().count(), 2);
    }
}
