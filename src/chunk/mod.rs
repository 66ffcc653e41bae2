//! Chunk identity and encoding
//!
//! - **labels**: Canonical label sets and their fingerprints
//! - **encoding**: Sample block codec (delta + bincode + LZ4)
//! - **types**: `Chunk`, checksums and external keys
//! - **error**: Error types
//!
//! # Lifecycle
//!
//! ```text
//! Labels ──fingerprint()──┐
//! SampleBlock::add ───────┼─→ Chunk::new → Chunk::encode → external_key()
//!                         │                     │
//!                         │               crc32 checksum
//! ```

pub mod encoding;
pub mod error;
pub mod labels;
pub mod types;

pub use encoding::{Sample, SampleBlock, MAX_SAMPLES_PER_CHUNK};
pub use error::{ChunkError, ChunkResult};
pub use labels::{Fingerprint, Label, Labels, METRIC_NAME_LABEL};
pub use types::{now, parse_external_key, Chunk, ChunkKey, Time, HOUR};
