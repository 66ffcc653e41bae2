//! Querier error types
//!
//! Auth failures and storage failures are separate variants so callers can
//! apply different retry policy to each.

use crate::chunk::ChunkError;
use thiserror::Error;

/// Errors raised by a chunk store or storage client
#[derive(Error, Debug)]
pub enum StoreError {
    /// Backend could not be reached
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// Request deadline passed before the store answered
    #[error("Store request timed out")]
    Timeout,

    /// Stored chunk could not be encoded or decoded
    #[error("Chunk error: {0}")]
    Chunk(#[from] ChunkError),

    /// Named table does not exist
    #[error("Table not found: {0}")]
    TableNotFound(String),

    /// Requested key does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Any other backend failure
    #[error("Backend error: {0}")]
    Backend(String),
}

/// Result type alias for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors returned to the query engine
#[derive(Error, Debug)]
pub enum QueryError {
    /// Request carries no tenant scope
    #[error("Auth error: {0}")]
    Auth(String),

    /// Chunk store failed while serving the query
    #[error("Storage error: {0}")]
    Storage(#[source] StoreError),

    /// Label matcher could not be built
    #[error("Invalid matcher: {0}")]
    InvalidMatcher(String),
}

impl QueryError {
    /// Whether retrying the same request may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, QueryError::Storage(_))
    }
}

/// Result type for query operations
pub type QueryResult<T> = Result<T, QueryError>;
