//! Cache Entry Types
//!
//! Key construction following the `{dataType}:{entity}[:{qualifier}]`
//! convention, and the tier-local stored representation of a value.

use std::time::Duration;

use bytes::Bytes;
use tokio::time::Instant;

use super::policy::DataType;

/// Cache key - namespaced by data-type prefix
///
/// Built keys are lowercase, colon-delimited and contain no whitespace.
/// The orchestrator accepts any `AsRef<str>`, so raw strings still work for
/// keys produced elsewhere.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    /// Create a key for an entity of the given data type
    pub fn new(data_type: DataType, entity: impl AsRef<str>) -> Self {
        Self::from_parts(data_type.name(), entity.as_ref(), None)
    }

    /// Create a key with an extra qualifier segment
    pub fn with_qualifier(
        data_type: DataType,
        entity: impl AsRef<str>,
        qualifier: impl AsRef<str>,
    ) -> Self {
        Self::from_parts(data_type.name(), entity.as_ref(), Some(qualifier.as_ref()))
    }

    fn from_parts(prefix: &str, entity: &str, qualifier: Option<&str>) -> Self {
        let mut key = String::with_capacity(prefix.len() + entity.len() + 16);
        key.push_str(prefix);
        key.push(':');
        key.push_str(&normalize_segment(entity));
        if let Some(qualifier) = qualifier {
            key.push(':');
            key.push_str(&normalize_segment(qualifier));
        }
        Self(key)
    }

    /// Get the key as a string slice
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Data-type prefix (segment before the first colon)
    pub fn prefix(&self) -> &str {
        key_prefix(&self.0)
    }

    /// Consume the key and return the inner string
    pub fn into_string(self) -> String {
        self.0
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<CacheKey> for String {
    fn from(key: CacheKey) -> Self {
        key.0
    }
}

/// Lowercase a segment and strip whitespace; colons become underscores so a
/// segment can never introduce a new key level.
fn normalize_segment(segment: &str) -> String {
    segment
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| if c == ':' { '_' } else { c })
        .flat_map(char::to_lowercase)
        .collect()
}

/// Segment before the first colon (the whole key if there is none)
pub fn key_prefix(key: &str) -> &str {
    key.split(':').next().unwrap_or(key)
}

/// Compiled glob pattern for `clear_pattern` and tier scans
///
/// A pattern without wildcards is treated as a prefix, so `"dashboard:"`
/// behaves like `"dashboard:*"`.
#[derive(Debug, Clone)]
pub struct KeyPattern {
    raw: String,
    glob: glob::Pattern,
}

impl KeyPattern {
    /// Compile a pattern
    pub fn new(pattern: &str) -> crate::error::Result<Self> {
        let normalized = if pattern.contains(['*', '?', '[']) {
            pattern.to_string()
        } else {
            format!("{}*", pattern)
        };

        let glob = glob::Pattern::new(&normalized).map_err(|e| {
            crate::error::Error::Config(format!("Invalid key pattern '{}': {}", pattern, e))
        })?;

        Ok(Self {
            raw: normalized,
            glob,
        })
    }

    /// Check whether a key matches
    #[inline]
    pub fn matches(&self, key: &str) -> bool {
        self.glob.matches(key)
    }

    /// The effective glob string (what gets sent to remote `SCAN MATCH`)
    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

/// A serialized value with tier-local expiry
#[derive(Clone, Debug)]
pub struct StoredEntry {
    /// Encoded value
    data: Bytes,
    /// Tier TTL this entry was written with
    ttl: Duration,
    /// Insertion time
    inserted_at: Instant,
}

impl StoredEntry {
    /// Create a new entry expiring `ttl` from now
    pub fn new(data: Bytes, ttl: Duration) -> Self {
        Self {
            data,
            ttl,
            inserted_at: Instant::now(),
        }
    }

    /// Get data (zero-copy)
    #[inline]
    pub fn data(&self) -> &Bytes {
        &self.data
    }

    /// TTL the entry was written with
    #[inline]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Insertion time
    #[inline]
    pub fn inserted_at(&self) -> Instant {
        self.inserted_at
    }

    /// Expiry deadline
    #[inline]
    pub fn expires_at(&self) -> Instant {
        self.inserted_at + self.ttl
    }

    /// Check if entry has expired
    #[inline]
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Instant::now())
    }

    /// Check expiry against a given instant
    #[inline]
    pub fn is_expired_at(&self, now: Instant) -> bool {
        now >= self.expires_at()
    }

    /// Data size in bytes
    #[inline]
    pub fn size(&self) -> usize {
        self.data.len()
    }
}

// =============================================================================
// Tests
// =============================================================================
