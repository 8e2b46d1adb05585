//! tiercache - Multi-Tier Cache with Performance Monitoring
//!
//! A read-through cache over two remote key-value tiers and an in-process
//! fallback. Hot data lives in a small, short-TTL Fast tier; everything lives
//! in a larger, long-TTL Bulk tier; the Local fallback only sees traffic while
//! both remote tiers are unreachable.
//!
//! # Architecture
//!
//! ```text
//! Caller → CacheOrchestrator → Fast → Bulk → Local
//!                 │
//!                 └──▶ CacheMetrics → PerformanceMonitor → Alerts / Reports
//! ```
//!
//! # Modules
//!
//! - [`cache`] - Tiers, policies, codec and the orchestrator
//! - [`monitoring`] - Time series, alerts, hot keys, health scoring and export
//! - [`error`] - Error types

pub mod cache;
pub mod error;
pub mod monitoring;

// Re-export commonly used types
pub use cache::{CacheConfig, CacheOrchestrator, Cached, DataType, TierClient, TierKind};
pub use error::{Error, Result};
pub use monitoring::{MonitorConfig, PerformanceMonitor, PrometheusExporter};
