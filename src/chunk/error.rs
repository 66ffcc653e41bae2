//! Chunk error types
//!
//! Errors raised while building, encoding or decoding chunks.

use thiserror::Error;

use crate::chunk::types::Time;

/// Errors that can occur in the chunk layer
#[derive(Error, Debug)]
pub enum ChunkError {
    /// Sample timestamp lower than the last appended one
    #[error("Out of order sample: timestamp {timestamp} is before {last}")]
    OutOfOrder { timestamp: Time, last: Time },

    /// The sample block is full
    #[error("Chunk capacity exceeded: {0} samples")]
    CapacityExceeded(usize),

    /// `from` is after `through`
    #[error("Invalid chunk time range: from {from} is after through {through}")]
    InvalidTimeRange { from: Time, through: Time },

    /// Encoded bytes were requested before `encode()` ran
    #[error("Chunk has not been encoded")]
    NotEncoded,

    /// Stored checksum does not match the encoded bytes
    #[error("Checksum mismatch: expected {expected:08x}, computed {computed:08x}")]
    ChecksumMismatch { expected: u32, computed: u32 },

    /// External key could not be parsed
    #[error("Invalid external key: {0}")]
    InvalidKey(String),

    /// Serialization/deserialization failed
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Compression or decompression failed
    #[error("Compression error: {0}")]
    Compression(String),

    /// Decoded content is inconsistent
    #[error("Corrupt chunk: {0}")]
    Corruption(String),
}

impl From<bincode::Error> for ChunkError {
    fn from(err: bincode::Error) -> Self {
        ChunkError::Serialization(err.to_string())
    }
}

impl From<serde_json::Error> for ChunkError {
    fn from(err: serde_json::Error) -> Self {
        ChunkError::Serialization(err.to_string())
    }
}

/// Result type alias for chunk operations
pub type ChunkResult<T> = Result<T, ChunkError>;
