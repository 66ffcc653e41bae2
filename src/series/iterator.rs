//! Sample iteration over a series' chunks
//!
//! The default strategy merges all chunks of a series into one
//! timestamp-ordered stream clipped to the query window.
//!
//! Overlap rule: chunks are ranked by `(from, through, checksum)`, then by
//! their sample contents. When several chunks hold a sample at the same
//! timestamp, the sample from the lowest-ranked chunk is kept and the rest
//! are dropped. The output is independent of the order the store returned
//! the chunks in.

use crate::chunk::{Chunk, Sample, Time};
use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

/// Forward-only, single-pass cursor over one series.
///
/// Timestamps are non-decreasing. The iterator owns only its decode buffer,
/// so dropping it early needs no cleanup.
pub trait SeriesIterator: Iterator<Item = Sample> + Send {
    /// Advance to the first sample at or after `t` and return it
    fn seek(&mut self, t: Time) -> Option<Sample>;
}

/// Builds a [`SeriesIterator`] from a series' chunks.
///
/// Injected into the querier so merge/decode policy can change without
/// touching it. Plain closures with the same shape implement it too.
pub trait ChunkIteratorStrategy: Send + Sync {
    fn iterator(&self, chunks: &[Chunk], from: Time, through: Time) -> Box<dyn SeriesIterator>;
}

impl<F> ChunkIteratorStrategy for F
where
    F: Fn(&[Chunk], Time, Time) -> Box<dyn SeriesIterator> + Send + Sync,
{
    fn iterator(&self, chunks: &[Chunk], from: Time, through: Time) -> Box<dyn SeriesIterator> {
        self(chunks, from, through)
    }
}

/// Default strategy: k-way merge with the overlap rule above
#[derive(Debug, Clone, Copy, Default)]
pub struct MergeIteratorStrategy;

impl ChunkIteratorStrategy for MergeIteratorStrategy {
    fn iterator(&self, chunks: &[Chunk], from: Time, through: Time) -> Box<dyn SeriesIterator> {
        Box::new(MergeIterator::new(chunks, from, through))
    }
}

/// Merged, clipped samples of a set of chunks
#[derive(Debug)]
pub struct MergeIterator {
    samples: std::iter::Peekable<std::vec::IntoIter<Sample>>,
}

impl MergeIterator {
    /// Merge `chunks`, keeping samples with `from <= timestamp <= through`
    pub fn new(chunks: &[Chunk], from: Time, through: Time) -> Self {
        let mut ranked: Vec<&Chunk> = chunks.iter().collect();
        ranked.sort_by(|a, b| rank(a, b));

        let blocks: Vec<&[Sample]> = ranked
            .iter()
            .map(|c| clip(c.samples(), from, through))
            .collect();

        Self {
            samples: merge(&blocks).into_iter().peekable(),
        }
    }
}

impl Iterator for MergeIterator {
    type Item = Sample;

    fn next(&mut self) -> Option<Sample> {
        self.samples.next()
    }
}

impl SeriesIterator for MergeIterator {
    fn seek(&mut self, t: Time) -> Option<Sample> {
        while self.samples.next_if(|s| s.timestamp < t).is_some() {}
        self.samples.next()
    }
}

/// Total order over chunks. Unencoded chunks share checksum 0, so the
/// samples themselves break the remaining ties.
fn rank(a: &Chunk, b: &Chunk) -> Ordering {
    (a.from(), a.through(), a.checksum())
        .cmp(&(b.from(), b.through(), b.checksum()))
        .then_with(|| {
            let content = |c: &Chunk| {
                c.samples()
                    .iter()
                    .map(|s| (s.timestamp, s.value.to_bits()))
                    .collect::<Vec<_>>()
            };
            content(a).cmp(&content(b))
        })
}

/// Sub-slice of time-ordered samples inside `[from, through]`
fn clip(samples: &[Sample], from: Time, through: Time) -> &[Sample] {
    let start = samples.partition_point(|s| s.timestamp < from);
    let end = samples.partition_point(|s| s.timestamp <= through);
    if start >= end {
        return &[];
    }
    &samples[start..end]
}

/// Merge ranked blocks; on equal timestamps the lowest rank wins
fn merge(blocks: &[&[Sample]]) -> Vec<Sample> {
    let total = blocks.iter().map(|b| b.len()).sum();
    let mut out: Vec<Sample> = Vec::with_capacity(total);

    // (timestamp, rank, position)
    let mut heap = BinaryHeap::with_capacity(blocks.len());
    for (rank, block) in blocks.iter().enumerate() {
        if let Some(first) = block.first() {
            heap.push(Reverse((first.timestamp, rank, 0usize)));
        }
    }

    while let Some(Reverse((timestamp, rank, pos))) = heap.pop() {
        if out.last().map_or(true, |last| last.timestamp < timestamp) {
            out.push(blocks[rank][pos]);
        }
        if let Some(next) = blocks[rank].get(pos + 1) {
            heap.push(Reverse((next.timestamp, rank, pos + 1)));
        }
    }

    out
}
