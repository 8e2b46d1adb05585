//! Cache Monitoring
//!
//! Turns the cache's metrics recorder into operational signals.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │                       Performance Monitor                            │
//! ├──────────────────────────────────────────────────────────────────────┤
//! │  CacheMetrics ──▶ Time Series ──▶ Alert Manager ──▶ broadcast        │
//! │       │           (5 min window)  (cooldown, expiry)                 │
//! │       │                                                              │
//! │       └──────────▶ Health Score ◀── Hot-Key Analytics                │
//! │                        │                                             │
//! │                        ▼                                             │
//! │       Recommendations · Comprehensive Report · Prometheus Exporter   │
//! └──────────────────────────────────────────────────────────────────────┘
//! ```

mod alerts;
mod analytics;
mod exporter;
mod health;
mod monitor;
mod series;

pub use alerts::{
    AlertConfig, AlertManager, AlertRule, AlertSeverity, AlertThresholds, Breach, MetricType,
    PerformanceAlert,
};
pub use analytics::{HotKey, HotKeyTracker, KeyAnalytics};
pub use exporter::PrometheusExporter;
pub use health::{HealthReport, HealthStatus, LocalHealth, TierHealth};
pub use monitor::{
    ComprehensiveReport, HealthGrade, HealthScore, MonitorConfig, PerformanceMonitor, Priority,
    Recommendation, ScoreComponents, WindowSummary,
};
pub use series::{TimeSeriesMetric, WindowStats};
