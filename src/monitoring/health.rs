//! Health Checks
//!
//! Reachability report for the two remote tiers and the local fallback.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Health status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Everything reachable
    Healthy,
    /// Serving, but at least one remote tier is down
    Degraded,
    /// Not reachable
    Unhealthy,
}

impl HealthStatus {
    /// Check if status is healthy or degraded (operational)
    pub fn is_operational(&self) -> bool {
        matches!(self, HealthStatus::Healthy | HealthStatus::Degraded)
    }

    /// Check if status is healthy
    pub fn is_healthy(&self) -> bool {
        *self == HealthStatus::Healthy
    }
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthStatus::Healthy => write!(f, "healthy"),
            HealthStatus::Degraded => write!(f, "degraded"),
            HealthStatus::Unhealthy => write!(f, "unhealthy"),
        }
    }
}

/// Health of one remote tier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TierHealth {
    /// Status
    pub status: HealthStatus,
    /// Ping round-trip time, when reachable
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_time_ms: Option<f64>,
    /// Failure reason, when unreachable
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TierHealth {
    /// Reachable tier with its round-trip time
    pub fn up(rtt: Duration) -> Self {
        Self {
            status: HealthStatus::Healthy,
            response_time_ms: Some(rtt.as_secs_f64() * 1000.0),
            error: None,
        }
    }

    /// Unreachable tier
    pub fn down(reason: impl Into<String>) -> Self {
        Self {
            status: HealthStatus::Unhealthy,
            response_time_ms: None,
            error: Some(reason.into()),
        }
    }
}

/// Health of the in-process fallback
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalHealth {
    /// Always healthy while the process runs
    pub status: HealthStatus,
    /// Stored entries
    pub entries: usize,
}

/// Health-check response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    /// Overall status: healthy only if both remote tiers answer
    pub status: HealthStatus,
    pub fast_tier: TierHealth,
    pub bulk_tier: TierHealth,
    pub local_fallback: LocalHealth,
    pub timestamp: DateTime<Utc>,
}

impl HealthReport {
    /// Whether the cache can serve requests at all
    pub fn is_operational(&self) -> bool {
        self.status.is_operational()
    }
}

// =============================================================================
// Tests
// =============================================================================
