//! Chunk identity and encoding
//!
//! A `Chunk` is one series' sample block plus the metadata that identifies
//! it in a store. Encoded layout:
//!
//! ```text
//! ┌──────────────────────────────────────┐
//! │ metadata_len: u32 (LE)               │
//! │ metadata: JSON {tenant, fp, labels,  │
//! │                 from, through}       │
//! │ data_len: u32 (LE)                   │
//! │ data: compressed SampleBlock         │
//! └──────────────────────────────────────┘
//! checksum = crc32(entire encoding)
//! ```
//!
//! The checksum is not part of the encoding; it travels in the external key.

use crate::chunk::encoding::{Sample, SampleBlock};
use crate::chunk::error::{ChunkError, ChunkResult};
use crate::chunk::labels::{Fingerprint, Labels};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Milliseconds since the Unix epoch
pub type Time = i64;

/// One hour in milliseconds
pub const HOUR: Time = 3_600_000;

/// Current wall-clock time
pub fn now() -> Time {
    Utc::now().timestamp_millis()
}

#[derive(Serialize)]
struct MetadataRef<'a> {
    tenant_id: &'a str,
    fingerprint: Fingerprint,
    metric: &'a Labels,
    from: Time,
    through: Time,
}

#[derive(Deserialize)]
struct Metadata {
    tenant_id: String,
    fingerprint: Fingerprint,
    metric: Labels,
    from: Time,
    through: Time,
}

/// Encoded sample block plus identity metadata for one series
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    tenant_id: String,
    fingerprint: Fingerprint,
    metric: Labels,
    from: Time,
    through: Time,
    checksum: u32,
    data: SampleBlock,
    encoded: Option<Vec<u8>>,
}

impl Chunk {
    /// Create an unencoded chunk. Fails when `from > through`.
    pub fn new(
        tenant_id: impl Into<String>,
        fingerprint: Fingerprint,
        metric: Labels,
        data: SampleBlock,
        from: Time,
        through: Time,
    ) -> ChunkResult<Self> {
        if from > through {
            return Err(ChunkError::InvalidTimeRange { from, through });
        }
        Ok(Self {
            tenant_id: tenant_id.into(),
            fingerprint,
            metric,
            from,
            through,
            checksum: 0,
            data,
            encoded: None,
        })
    }

    pub fn tenant_id(&self) -> &str {
        &self.tenant_id
    }

    pub fn fingerprint(&self) -> Fingerprint {
        self.fingerprint
    }

    pub fn metric(&self) -> &Labels {
        &self.metric
    }

    pub fn from(&self) -> Time {
        self.from
    }

    pub fn through(&self) -> Time {
        self.through
    }

    /// Checksum of the encoding. Zero until [`Chunk::encode`] has run.
    pub fn checksum(&self) -> u32 {
        self.checksum
    }

    pub fn data(&self) -> &SampleBlock {
        &self.data
    }

    pub fn samples(&self) -> &[Sample] {
        self.data.samples()
    }

    pub fn is_encoded(&self) -> bool {
        self.encoded.is_some()
    }

    /// Append a sample, widening the time bounds if needed.
    ///
    /// Any previous encoding is discarded.
    pub fn add(&mut self, timestamp: Time, value: f64) -> ChunkResult<()> {
        self.data.add(timestamp, value)?;
        self.from = self.from.min(timestamp);
        self.through = self.through.max(timestamp);
        self.encoded = None;
        self.checksum = 0;
        Ok(())
    }

    /// Finalize the byte block and compute the checksum.
    ///
    /// Runs once; later calls reuse the cached encoding.
    pub fn encode(&mut self) -> ChunkResult<()> {
        if self.encoded.is_some() {
            return Ok(());
        }

        let metadata = serde_json::to_vec(&MetadataRef {
            tenant_id: &self.tenant_id,
            fingerprint: self.fingerprint,
            metric: &self.metric,
            from: self.from,
            through: self.through,
        })?;
        let data = self.data.encode()?;

        let mut buf = Vec::with_capacity(8 + metadata.len() + data.len());
        write_section(&mut buf, &metadata)?;
        write_section(&mut buf, &data)?;

        self.checksum = crc32fast::hash(&buf);
        self.encoded = Some(buf);
        Ok(())
    }

    /// Encoded bytes, available after [`Chunk::encode`]
    pub fn encoded(&self) -> ChunkResult<&[u8]> {
        self.encoded.as_deref().ok_or(ChunkError::NotEncoded)
    }

    /// Stable storage key derived from the identity fields
    pub fn external_key(&self) -> String {
        self.key().to_string()
    }

    /// Identity fields as a structured key
    pub fn key(&self) -> ChunkKey {
        ChunkKey {
            tenant_id: self.tenant_id.clone(),
            fingerprint: self.fingerprint,
            from: self.from,
            through: self.through,
            checksum: self.checksum,
        }
    }

    /// Rebuild a chunk from its key and encoded bytes, verifying the
    /// checksum and that the embedded metadata agrees with the key.
    pub fn decode(key: &ChunkKey, input: &[u8]) -> ChunkResult<Self> {
        let computed = crc32fast::hash(input);
        if computed != key.checksum {
            return Err(ChunkError::ChecksumMismatch {
                expected: key.checksum,
                computed,
            });
        }

        let (metadata, rest) = read_section(input)?;
        let (data, rest) = read_section(rest)?;
        if !rest.is_empty() {
            return Err(ChunkError::Corruption(format!(
                "{} trailing bytes",
                rest.len()
            )));
        }

        let metadata: Metadata = serde_json::from_slice(metadata)?;
        if metadata.tenant_id != key.tenant_id
            || metadata.fingerprint != key.fingerprint
            || metadata.from != key.from
            || metadata.through != key.through
        {
            return Err(ChunkError::Corruption(format!(
                "metadata does not match key {}",
                key
            )));
        }

        Ok(Self {
            tenant_id: metadata.tenant_id,
            fingerprint: metadata.fingerprint,
            metric: metadata.metric,
            from: metadata.from,
            through: metadata.through,
            checksum: key.checksum,
            data: SampleBlock::decode(data)?,
            encoded: Some(input.to_vec()),
        })
    }
}

fn write_section(buf: &mut Vec<u8>, section: &[u8]) -> ChunkResult<()> {
    let len = u32::try_from(section.len())
        .map_err(|_| ChunkError::Serialization(format!("section too large: {}", section.len())))?;
    buf.extend_from_slice(&len.to_le_bytes());
    buf.extend_from_slice(section);
    Ok(())
}

fn read_section(input: &[u8]) -> ChunkResult<(&[u8], &[u8])> {
    if input.len() < 4 {
        return Err(ChunkError::Corruption("truncated section header".to_string()));
    }
    let len = u32::from_le_bytes([input[0], input[1], input[2], input[3]]) as usize;
    let body = &input[4..];
    if body.len() < len {
        return Err(ChunkError::Corruption(format!(
            "section needs {} bytes, {} available",
            len,
            body.len()
        )));
    }
    Ok(body.split_at(len))
}

/// Parsed form of an external key
///
/// Rendered as `tenant/fingerprint:from:through:checksum`, numbers in hex.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChunkKey {
    pub tenant_id: String,
    pub fingerprint: Fingerprint,
    pub from: Time,
    pub through: Time,
    pub checksum: u32,
}

impl fmt::Display for ChunkKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{:x}:{:x}:{:x}:{:x}",
            self.tenant_id, self.fingerprint, self.from, self.through, self.checksum
        )
    }
}

/// Inverse of [`Chunk::external_key`].
///
/// The tenant is everything before the last `/`, so tenants may contain
/// slashes.
pub fn parse_external_key(key: &str) -> ChunkResult<ChunkKey> {
    let invalid = || ChunkError::InvalidKey(key.to_string());

    let (tenant_id, rest) = key.rsplit_once('/').ok_or_else(invalid)?;
    if tenant_id.is_empty() {
        return Err(invalid());
    }

    let parts: Vec<&str> = rest.split(':').collect();
    let [fingerprint, from, through, checksum] = parts.as_slice() else {
        return Err(invalid());
    };

    let hex = |s: &str| u64::from_str_radix(s, 16).map_err(|_| invalid());

    Ok(ChunkKey {
        tenant_id: tenant_id.to_string(),
        fingerprint: Fingerprint(hex(*fingerprint)?),
        from: hex(*from)? as i64,
        through: hex(*through)? as i64,
        checksum: u32::from_str_radix(*checksum, 16).map_err(|_| invalid())?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_chunk(index: &str) -> Chunk {
        let metric = Labels::from_pairs([("__name__", "foo"), ("index", index)]);
        let mut data = SampleBlock::new();
        data.add(1000, 1.0).unwrap();
        data.add(2000, 2.0).unwrap();
        Chunk::new("user", metric.fingerprint(), metric, data, 500, 2000).unwrap()
    }

    #[test]
    fn test_invalid_time_range() {
        let metric = Labels::from_pairs([("__name__", "foo")]);
        let err = Chunk::new("u", metric.fingerprint(), metric, SampleBlock::new(), 10, 5)
            .unwrap_err();
        assert!(matches!(
            err,
            ChunkError::InvalidTimeRange {
                from: 10,
                through: 5
            }
        ));
    }

    #[test]
    fn test_encode_sets_checksum_once() {
        let mut chunk = test_chunk("0");
        assert!(!chunk.is_encoded());
        assert!(matches!(chunk.encoded(), Err(ChunkError::NotEncoded)));

        chunk.encode().unwrap();
        let checksum = chunk.checksum();
        let bytes = chunk.encoded().unwrap().to_vec();
        assert_eq!(checksum, crc32fast::hash(&bytes));

        chunk.encode().unwrap();
        assert_eq!(chunk.checksum(), checksum);
        assert_eq!(chunk.encoded().unwrap(), bytes.as_slice());
    }

    #[test]
    fn test_identical_content_identical_checksum() {
        let mut a = test_chunk("0");
        let mut b = test_chunk("0");
        a.encode().unwrap();
        b.encode().unwrap();
        assert_eq!(a.checksum(), b.checksum());
        assert_eq!(a.external_key(), b.external_key());

        let mut c = test_chunk("1");
        c.encode().unwrap();
        assert_ne!(a.external_key(), c.external_key());
    }

    #[test]
    fn test_add_invalidates_encoding() {
        let mut chunk = test_chunk("0");
        chunk.encode().unwrap();
        let before = chunk.checksum();

        chunk.add(3000, 3.0).unwrap();
        assert!(!chunk.is_encoded());
        assert_eq!(chunk.through(), 3000);

        chunk.encode().unwrap();
        assert_ne!(chunk.checksum(), before);
    }

    #[test]
    fn test_external_key_format() {
        let metric = Labels::from_pairs([("__name__", "foo")]);
        let chunk = Chunk::new("tenant", Fingerprint(0xabc), metric, SampleBlock::new(), 16, 255)
            .unwrap();
        assert_eq!(chunk.external_key(), "tenant/abc:10:ff:0");
    }

    #[test]
    fn test_external_key_changes_with_each_field() {
        let base = ChunkKey {
            tenant_id: "t".to_string(),
            fingerprint: Fingerprint(1),
            from: 10,
            through: 20,
            checksum: 99,
        };

        let variants = [
            ChunkKey {
                tenant_id: "other".to_string(),
                ..base.clone()
            },
            ChunkKey {
                fingerprint: Fingerprint(2),
                ..base.clone()
            },
            ChunkKey {
                from: 11,
                ..base.clone()
            },
            ChunkKey {
                through: 21,
                ..base.clone()
            },
            ChunkKey {
                checksum: 100,
                ..base.clone()
            },
        ];

        for variant in &variants {
            assert_ne!(variant.to_string(), base.to_string());
        }
        assert_eq!(base.clone().to_string(), base.to_string());
    }

    #[test]
    fn test_parse_external_key() {
        let mut chunk = test_chunk("7");
        chunk.encode().unwrap();
        let parsed = parse_external_key(&chunk.external_key()).unwrap();
        assert_eq!(parsed, chunk.key());

        let negative = ChunkKey {
            tenant_id: "t".to_string(),
            fingerprint: Fingerprint(u64::MAX),
            from: -5,
            through: 0,
            checksum: u32::MAX,
        };
        assert_eq!(parse_external_key(&negative.to_string()).unwrap(), negative);

        assert!(parse_external_key("no-slash").is_err());
        assert!(parse_external_key("/1:2:3:4").is_err());
        assert!(parse_external_key("t/1:2:3").is_err());
        assert!(parse_external_key("t/1:2:3:zz").is_err());
    }

    #[test]
    fn test_tenant_with_slash_round_trips() {
        let metric = Labels::from_pairs([("__name__", "foo")]);
        let mut data = SampleBlock::new();
        data.add(1, 1.0).unwrap();
        let mut chunk = Chunk::new("org/team", metric.fingerprint(), metric, data, 0, 1).unwrap();
        chunk.encode().unwrap();

        let key = chunk.external_key();
        assert!(key.starts_with("org/team/"));
        let parsed = parse_external_key(&key).unwrap();
        assert_eq!(parsed.tenant_id, "org/team");
        assert_eq!(parsed, chunk.key());

        let decoded = Chunk::decode(&parsed, chunk.encoded().unwrap()).unwrap();
        assert_eq!(decoded, chunk);
    }

    #[test]
    fn test_decode_round_trip() {
        let mut chunk = test_chunk("3");
        chunk.encode().unwrap();

        let decoded = Chunk::decode(&chunk.key(), chunk.encoded().unwrap()).unwrap();
        assert_eq!(decoded, chunk);
        assert_eq!(
            decoded.samples(),
            &[Sample::new(1000, 1.0), Sample::new(2000, 2.0)]
        );
    }

    #[test]
    fn test_decode_detects_corruption() {
        let mut chunk = test_chunk("3");
        chunk.encode().unwrap();

        let mut bytes = chunk.encoded().unwrap().to_vec();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xff;

        let err = Chunk::decode(&chunk.key(), &bytes).unwrap_err();
        assert!(matches!(err, ChunkError::ChecksumMismatch { .. }));
    }

    #[test]
    fn test_decode_rejects_foreign_key() {
        let mut chunk = test_chunk("3");
        chunk.encode().unwrap();

        let mut key = chunk.key();
        key.tenant_id = "someone-else".to_string();
        let err = Chunk::decode(&key, chunk.encoded().unwrap()).unwrap_err();
        assert!(matches!(err, ChunkError::Corruption(_)));
    }
}
