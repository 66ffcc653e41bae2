//! Sample block codec
//!
//! A `SampleBlock` holds the time-ordered samples of one chunk and knows how
//! to turn them into bytes:
//!
//! 1. Delta-encode timestamps against the first sample
//! 2. Serialize to compact binary with bincode
//! 3. LZ4 compress the result
//!
//! Encoding is deterministic: the same samples always produce the same bytes.

use crate::chunk::error::{ChunkError, ChunkResult};
use crate::chunk::types::Time;
use serde::{Deserialize, Serialize};

/// Maximum number of samples a single block accepts
pub const MAX_SAMPLES_PER_CHUNK: usize = 1200;

/// One timestamp/value pair
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Unix timestamp in milliseconds
    pub timestamp: Time,
    pub value: f64,
}

impl Sample {
    pub fn new(timestamp: Time, value: f64) -> Self {
        Self { timestamp, value }
    }
}

/// Wire form of a block
#[derive(Debug, Serialize, Deserialize)]
struct EncodedBlock {
    base_timestamp: i64,
    timestamp_deltas: Vec<i64>,
    values: Vec<f64>,
}

/// Append-only, time-ordered sample buffer
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SampleBlock {
    samples: Vec<Sample>,
}

impl SampleBlock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one sample.
    ///
    /// Timestamps must be non-decreasing and the block must have room.
    pub fn add(&mut self, timestamp: Time, value: f64) -> ChunkResult<()> {
        if self.samples.len() >= MAX_SAMPLES_PER_CHUNK {
            return Err(ChunkError::CapacityExceeded(MAX_SAMPLES_PER_CHUNK));
        }
        if let Some(last) = self.samples.last() {
            if timestamp < last.timestamp {
                return Err(ChunkError::OutOfOrder {
                    timestamp,
                    last: last.timestamp,
                });
            }
        }
        self.samples.push(Sample::new(timestamp, value));
        Ok(())
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn first_timestamp(&self) -> Option<Time> {
        self.samples.first().map(|s| s.timestamp)
    }

    pub fn last_timestamp(&self) -> Option<Time> {
        self.samples.last().map(|s| s.timestamp)
    }

    /// Serialize the block to compressed bytes
    pub fn encode(&self) -> ChunkResult<Vec<u8>> {
        let base_timestamp = self.first_timestamp().unwrap_or(0);
        let mut timestamp_deltas = Vec::with_capacity(self.samples.len());
        let mut prev_ts = base_timestamp;

        for sample in &self.samples {
            timestamp_deltas.push(sample.timestamp - prev_ts);
            prev_ts = sample.timestamp;
        }

        let block = EncodedBlock {
            base_timestamp,
            timestamp_deltas,
            values: self.samples.iter().map(|s| s.value).collect(),
        };

        let serialized = bincode::serialize(&block)?;
        Ok(lz4_flex::compress_prepend_size(&serialized))
    }

    /// Rebuild a block from bytes produced by [`SampleBlock::encode`]
    pub fn decode(data: &[u8]) -> ChunkResult<Self> {
        let decompressed = lz4_flex::decompress_size_prepended(data)
            .map_err(|e| ChunkError::Compression(format!("LZ4 decompression failed: {}", e)))?;

        let block: EncodedBlock = bincode::deserialize(&decompressed)?;

        if block.timestamp_deltas.len() != block.values.len() {
            return Err(ChunkError::Corruption(format!(
                "{} timestamps but {} values",
                block.timestamp_deltas.len(),
                block.values.len()
            )));
        }
        if block.values.len() > MAX_SAMPLES_PER_CHUNK {
            return Err(ChunkError::CapacityExceeded(MAX_SAMPLES_PER_CHUNK));
        }

        let mut samples = Vec::with_capacity(block.values.len());
        let mut current = block.base_timestamp;

        for (delta, value) in block.timestamp_deltas.iter().zip(block.values) {
            if *delta < 0 {
                return Err(ChunkError::Corruption(format!(
                    "negative timestamp delta {}",
                    delta
                )));
            }
            current += delta;
            samples.push(Sample::new(current, value));
        }

        Ok(Self { samples })
    }
}
