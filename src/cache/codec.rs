//! Value Codec
//!
//! Encodes cached values with `serde_json`, falling back to `bincode` for
//! values JSON cannot represent, and LZ4-compresses large payloads.
//!
//! # Envelope
//!
//! ```text
//! ┌────────────┬─────────────────┬──────────────────────┐
//! │ format (1) │ compression (1) │ payload              │
//! └────────────┴─────────────────┴──────────────────────┘
//! ```
//!
//! # Example
//!
//! ```
//! use tiercache::cache::ValueCodec;
//!
//! let codec = ValueCodec::new();
//! let encoded = codec.encode(&vec![1u32, 2, 3]).unwrap();
//! let decoded: Vec<u32> = codec.decode(&encoded).unwrap();
//! assert_eq!(decoded, vec![1, 2, 3]);
//! ```

use std::borrow::Cow;

use bytes::{BufMut, Bytes, BytesMut};
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::finite::has_non_finite_float;
use crate::error::{Error, Result};

const HEADER_LEN: usize = 2;

// =============================================================================
// Formats
// =============================================================================

/// Serialization format tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CodecFormat {
    /// serde_json (primary)
    Json,
    /// bincode (fallback)
    Bincode,
}

impl CodecFormat {
    fn tag(self) -> u8 {
        match self {
            CodecFormat::Json => b'J',
            CodecFormat::Bincode => b'B',
        }
    }

    fn from_tag(tag: u8) -> Result<Self> {
        match tag {
            b'J' => Ok(CodecFormat::Json),
            b'B' => Ok(CodecFormat::Bincode),
            other => Err(Error::Deserialization(format!(
                "Unknown codec format tag 0x{:02x}",
                other
            ))),
        }
    }
}

/// Supported compression algorithms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CompressionAlgorithm {
    /// No compression
    None,
    /// LZ4 - fast compression
    #[default]
    Lz4,
}

impl CompressionAlgorithm {
    /// Get human-readable name
    pub fn name(&self) -> &'static str {
        match self {
            CompressionAlgorithm::None => "none",
            CompressionAlgorithm::Lz4 => "lz4",
        }
    }

    fn tag(self) -> u8 {
        match self {
            CompressionAlgorithm::None => 0,
            CompressionAlgorithm::Lz4 => 1,
        }
    }

    fn from_tag(tag: u8) -> Result<Self> {
        match tag {
            0 => Ok(CompressionAlgorithm::None),
            1 => Ok(CompressionAlgorithm::Lz4),
            other => Err(Error::Deserialization(format!(
                "Unknown compression tag {}",
                other
            ))),
        }
    }
}

impl std::fmt::Display for CompressionAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

// =============================================================================
// Configuration
// =============================================================================

/// Codec configuration
#[derive(Debug, Clone)]
pub struct CodecConfig {
    /// Compression applied to large payloads
    pub compression: CompressionAlgorithm,
    /// Minimum payload size to compress
    pub compress_min_bytes: usize,
    /// LZ4 compression level
    pub level: i32,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            compression: CompressionAlgorithm::Lz4,
            compress_min_bytes: 1024,
            level: 4,
        }
    }
}

// =============================================================================
// Codec
// =============================================================================

/// Encoder/decoder for cached values
#[derive(Debug, Clone, Default)]
pub struct ValueCodec {
    config: CodecConfig,
}

impl ValueCodec {
    /// Create a codec with default config
    pub fn new() -> Self {
        Self::default()
    }

    /// Create with custom config
    pub fn with_config(config: CodecConfig) -> Self {
        Self { config }
    }

    /// Get configuration
    pub fn config(&self) -> &CodecConfig {
        &self.config
    }

    /// Encode a value, trying JSON first and bincode second
    ///
    /// Values holding NaN or infinite floats skip JSON, which would write
    /// them as `null`.
    pub fn encode<T: Serialize + ?Sized>(&self, value: &T) -> Result<Bytes> {
        let json = if has_non_finite_float(value) {
            tracing::debug!("Value holds a non-finite float, encoding with bincode");
            None
        } else {
            Some(serde_json::to_vec(value))
        };

        let (format, payload) = match json {
            Some(Ok(json)) => (CodecFormat::Json, json),
            Some(Err(json_err)) => {
                tracing::debug!("JSON encoding failed, trying bincode: {}", json_err);
                let encoded = bincode::serialize(value).map_err(|bin_err| {
                    Error::Serialization(format!(
                        "json: {}; bincode: {}",
                        json_err, bin_err
                    ))
                })?;
                (CodecFormat::Bincode, encoded)
            }
            None => {
                let encoded = bincode::serialize(value)
                    .map_err(|e| Error::Serialization(format!("bincode: {}", e)))?;
                (CodecFormat::Bincode, encoded)
            }
        };

        let (payload, algorithm) = self.compress(payload);

        let mut buf = BytesMut::with_capacity(HEADER_LEN + payload.len());
        buf.put_u8(format.tag());
        buf.put_u8(algorithm.tag());
        buf.put_slice(&payload);
        Ok(buf.freeze())
    }

    /// Decode an envelope produced by [`ValueCodec::encode`]
    pub fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T> {
        let (format, payload) = self.open(data)?;

        match format {
            CodecFormat::Json => serde_json::from_slice(&payload)
                .map_err(|e| Error::Deserialization(format!("json: {}", e))),
            CodecFormat::Bincode => bincode::deserialize(&payload)
                .map_err(|e| Error::Deserialization(format!("bincode: {}", e))),
        }
    }

    /// Format an envelope was written with
    pub fn format_of(&self, data: &[u8]) -> Result<CodecFormat> {
        match data.first() {
            Some(tag) => CodecFormat::from_tag(*tag),
            None => Err(Error::Deserialization("empty envelope".into())),
        }
    }

    fn open<'a>(&self, data: &'a [u8]) -> Result<(CodecFormat, Cow<'a, [u8]>)> {
        if data.len() < HEADER_LEN {
            return Err(Error::Deserialization(format!(
                "envelope too short ({} bytes)",
                data.len()
            )));
        }

        let format = CodecFormat::from_tag(data[0])?;
        let algorithm = CompressionAlgorithm::from_tag(data[1])?;
        let body = &data[HEADER_LEN..];

        let payload = match algorithm {
            CompressionAlgorithm::None => Cow::Borrowed(body),
            CompressionAlgorithm::Lz4 => Cow::Owned(lz4_decompress(body)?),
        };

        Ok((format, payload))
    }

    /// Compress if large enough and actually smaller; fall back to raw otherwise.
    fn compress(&self, payload: Vec<u8>) -> (Vec<u8>, CompressionAlgorithm) {
        if self.config.compression == CompressionAlgorithm::None
            || payload.len() < self.config.compress_min_bytes
        {
            return (payload, CompressionAlgorithm::None);
        }

        match lz4_compress(&payload, self.config.level) {
            Ok(compressed) if compressed.len() < payload.len() => {
                (compressed, CompressionAlgorithm::Lz4)
            }
            Ok(_) => (payload, CompressionAlgorithm::None),
            Err(e) => {
                tracing::warn!("Compression failed, using uncompressed: {}", e);
                (payload, CompressionAlgorithm::None)
            }
        }
    }
}

fn lz4_compress(data: &[u8], level: i32) -> Result<Vec<u8>> {
    lz4::block::compress(
        data,
        Some(lz4::block::CompressionMode::HIGHCOMPRESSION(level)),
        true,
    )
    .map_err(|e| Error::CompressionFailed {
        algorithm: "LZ4".into(),
        reason: e.to_string(),
    })
}

fn lz4_decompress(data: &[u8]) -> Result<Vec<u8>> {
    lz4::block::decompress(data, None).map_err(|e| Error::DecompressionFailed {
        algorithm: "LZ4".into(),
        reason: e.to_string(),
    })
}

// =============================================================================
// Tests
// =============================================================================
