//! Remote Tier Client
//!
//! The seam between the orchestrator and a backing key/value store. The Fast
//! and Bulk tiers are both driven through [`TierClient`]; only their TTLs and
//! capacity differ.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use super::entry::KeyPattern;
use crate::error::Result;

/// Cache tier identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TierKind {
    /// Small, low-latency remote tier
    Fast,
    /// Larger, longer-TTL remote tier
    Bulk,
    /// In-process fallback
    Local,
}

impl TierKind {
    /// Short name used in logs and error values
    pub fn name(&self) -> &'static str {
        match self {
            TierKind::Fast => "fast",
            TierKind::Bulk => "bulk",
            TierKind::Local => "local",
        }
    }
}

impl std::fmt::Display for TierKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TierKind::Fast => write!(f, "Fast (remote)"),
            TierKind::Bulk => write!(f, "Bulk (remote)"),
            TierKind::Local => write!(f, "Local (in-process)"),
        }
    }
}

/// Async client for one remote key/value tier
///
/// Implementations report reachability faults as
/// [`Error::TierUnavailable`](crate::Error::TierUnavailable); a missing key is
/// `Ok(None)`, never an error.
#[async_trait]
pub trait TierClient: Send + Sync {
    /// Fetch the raw bytes stored under `key`
    async fn get(&self, key: &str) -> Result<Option<Bytes>>;

    /// Store `value` under `key`, expiring after `ttl`
    async fn set(&self, key: &str, value: Bytes, ttl: Duration) -> Result<()>;

    /// Remove `key`; returns whether it existed
    async fn delete(&self, key: &str) -> Result<bool>;

    /// All live keys matching `pattern`
    async fn keys_matching(&self, pattern: &KeyPattern) -> Result<Vec<String>>;

    /// Number of live keys
    async fn key_count(&self) -> Result<usize>;

    /// Time left before `key` expires
    ///
    /// `Some(Duration::ZERO)` when the key is gone; `None` when it never
    /// expires or the backend cannot tell.
    async fn ttl_remaining(&self, _key: &str) -> Result<Option<Duration>> {
        Ok(None)
    }

    /// Round-trip check
    async fn ping(&self) -> Result<()>;

    /// Backend name for logs
    fn name(&self) -> &str;
}
