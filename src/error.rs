//! Error types for the multi-tier cache

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur inside the cache subsystem.
///
/// Only [`Error::Compute`], [`Error::ComputeTimeout`] and [`Error::Cancelled`]
/// ever cross the orchestrator boundary; every other variant is absorbed by
/// falling through to the next tier.
#[derive(Error, Debug, Clone)]
pub enum Error {
    /// Remote tier refused or dropped the connection
    #[error("{tier} tier unavailable: {reason}")]
    TierUnavailable { tier: String, reason: String },

    /// Remote tier did not answer within the per-call timeout
    #[error("{tier} tier {operation} timed out after {after:?}")]
    TierTimeout {
        tier: String,
        operation: String,
        after: Duration,
    },

    // =========================================================================
    // Codec Errors
    // =========================================================================
    /// Value could not be encoded by any codec
    #[error("Serialization failed: {0}")]
    Serialization(String),

    /// Stored bytes could not be decoded
    #[error("Deserialization failed: {0}")]
    Deserialization(String),

    /// Compression failed
    #[error("Compression with {algorithm} failed: {reason}")]
    CompressionFailed { algorithm: String, reason: String },

    /// Decompression failed
    #[error("Decompression with {algorithm} failed: {reason}")]
    DecompressionFailed { algorithm: String, reason: String },

    // =========================================================================
    // Producer Errors
    // =========================================================================
    /// The producer passed to `get_or_compute` failed
    #[error("Producer failed for key {key}: {cause:#}")]
    Compute {
        key: String,
        cause: Arc<anyhow::Error>,
    },

    /// The producer did not finish within the compute timeout
    #[error("Producer for key {key} timed out after {after:?}")]
    ComputeTimeout { key: String, after: Duration },

    /// The caller cancelled the operation
    #[error("Operation on key {key} was cancelled")]
    Cancelled { key: String },

    // =========================================================================
    // Setup Errors
    // =========================================================================
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Wrap a producer failure so it can be shared between single-flight waiters
    pub fn compute(key: impl Into<String>, cause: anyhow::Error) -> Self {
        Error::Compute {
            key: key.into(),
            cause: Arc::new(cause),
        }
    }

    /// Tier reachability faults (counted as connection errors)
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Error::TierUnavailable { .. } | Error::TierTimeout { .. }
        )
    }

    /// Errors that are allowed to reach the caller of the orchestrator
    pub fn is_caller_visible(&self) -> bool {
        matches!(
            self,
            Error::Compute { .. } | Error::ComputeTimeout { .. } | Error::Cancelled { .. }
        )
    }
}
