//! Performance Monitor
//!
//! Samples the cache metrics on every operation into rolling series, ranks
//! hot keys, evaluates alert rules at most once per check interval over a
//! trailing window, and assembles reports with a blended health score.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::alerts::{AlertConfig, AlertManager, AlertThresholds, MetricType, PerformanceAlert};
use super::analytics::{HotKey, HotKeyTracker, KeyAnalytics};
use super::series::{TimeSeriesMetric, WindowStats};
use crate::cache::{CacheMetrics, PerformanceSnapshot};
use crate::error::{Error, Result};

/// Monitor configuration
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Samples kept per series
    pub series_capacity: usize,
    /// Trailing window for statistics and alert rules
    pub sample_window: Duration,
    /// Minimum spacing between alert evaluations
    pub check_interval: Duration,
    /// Samples required in the window before rules are evaluated
    pub min_samples: usize,
    /// Maximum keys tracked for hot-key ranking
    pub max_tracked_keys: usize,
    /// Alert timing
    pub alerts: AlertConfig,
    /// Alert thresholds
    pub thresholds: AlertThresholds,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            series_capacity: 1000,
            sample_window: Duration::from_secs(5 * 60),
            check_interval: Duration::from_secs(30),
            min_samples: 10,
            max_tracked_keys: 10_000,
            alerts: AlertConfig::default(),
            thresholds: AlertThresholds::default(),
        }
    }
}

impl MonitorConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.series_capacity == 0 {
            return Err(Error::Config("Series capacity must be positive".into()));
        }
        if self.sample_window.is_zero() || self.check_interval.is_zero() {
            return Err(Error::Config(
                "Sample window and check interval must be non-zero".into(),
            ));
        }
        if self.alerts.cooldown > self.alerts.expiry {
            return Err(Error::Config(
                "Alert cooldown must not exceed alert expiry".into(),
            ));
        }
        Ok(())
    }
}

/// Rolling series for every tracked signal
#[derive(Debug)]
struct Series {
    hit_rate: TimeSeriesMetric,
    fast_hit_rate: TimeSeriesMetric,
    bulk_hit_rate: TimeSeriesMetric,
    response_time: TimeSeriesMetric,
    error_rate: TimeSeriesMetric,
    fast_utilization: TimeSeriesMetric,
    promotion_rate: TimeSeriesMetric,
    eviction_rate: TimeSeriesMetric,
}

impl Series {
    fn new(capacity: usize) -> Self {
        Self {
            hit_rate: TimeSeriesMetric::new("hit_rate", capacity),
            fast_hit_rate: TimeSeriesMetric::new("fast_hit_rate", capacity),
            bulk_hit_rate: TimeSeriesMetric::new("bulk_hit_rate", capacity),
            response_time: TimeSeriesMetric::new("response_time_ms", capacity),
            error_rate: TimeSeriesMetric::new("error_rate", capacity),
            fast_utilization: TimeSeriesMetric::new("fast_utilization", capacity),
            promotion_rate: TimeSeriesMetric::new("promotion_rate", capacity),
            eviction_rate: TimeSeriesMetric::new("eviction_rate", capacity),
        }
    }

    fn for_metric(&self, metric: MetricType) -> &TimeSeriesMetric {
        match metric {
            MetricType::HitRate => &self.hit_rate,
            MetricType::ResponseTime => &self.response_time,
            MetricType::ErrorRate => &self.error_rate,
            MetricType::FastTierUtilization => &self.fast_utilization,
        }
    }

    fn all(&self) -> [&TimeSeriesMetric; 8] {
        [
            &self.hit_rate,
            &self.fast_hit_rate,
            &self.bulk_hit_rate,
            &self.response_time,
            &self.error_rate,
            &self.fast_utilization,
            &self.promotion_rate,
            &self.eviction_rate,
        ]
    }

    fn all_mut(&mut self) -> [&mut TimeSeriesMetric; 8] {
        [
            &mut self.hit_rate,
            &mut self.fast_hit_rate,
            &mut self.bulk_hit_rate,
            &mut self.response_time,
            &mut self.error_rate,
            &mut self.fast_utilization,
            &mut self.promotion_rate,
            &mut self.eviction_rate,
        ]
    }
}

/// Qualitative band of the health score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthGrade {
    Excellent,
    Good,
    Fair,
    Poor,
    Critical,
}

impl HealthGrade {
    /// Band for a 0-100 score
    pub fn from_score(score: f64) -> Self {
        if score >= 90.0 {
            HealthGrade::Excellent
        } else if score >= 75.0 {
            HealthGrade::Good
        } else if score >= 60.0 {
            HealthGrade::Fair
        } else if score >= 40.0 {
            HealthGrade::Poor
        } else {
            HealthGrade::Critical
        }
    }
}

/// Component scores, each 0-100 with higher being better
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreComponents {
    pub hit_rate: f64,
    pub response_time: f64,
    pub error_rate: f64,
    pub utilization: f64,
}

/// Weighted health score
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthScore {
    pub score: f64,
    pub grade: HealthGrade,
    pub components: ScoreComponents,
}

impl HealthScore {
    /// Blend hit rate (40%), response time (30%), error rate (20%) and
    /// Fast tier utilization (10%)
    pub fn compute(
        hit_rate_percent: f64,
        avg_response_ms: f64,
        error_rate_percent: f64,
        utilization_percent: f64,
    ) -> Self {
        let components = ScoreComponents {
            hit_rate: hit_rate_percent.clamp(0.0, 100.0),
            response_time: 100.0 * (1.0 - (avg_response_ms / 200.0).clamp(0.0, 1.0)),
            error_rate: 100.0 * (1.0 - (error_rate_percent / 10.0).clamp(0.0, 1.0)),
            utilization: (100.0 - utilization_percent).clamp(0.0, 100.0),
        };

        let score = components.hit_rate * 0.4
            + components.response_time * 0.3
            + components.error_rate * 0.2
            + components.utilization * 0.1;

        Self {
            score,
            grade: HealthGrade::from_score(score),
            components,
        }
    }
}

/// Recommendation priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Medium,
    Low,
}

/// One optimization suggestion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recommendation {
    pub priority: Priority,
    pub category: String,
    pub message: String,
}

impl Recommendation {
    fn new(priority: Priority, category: &str, message: impl Into<String>) -> Self {
        Self {
            priority,
            category: category.to_string(),
            message: message.into(),
        }
    }
}

/// Window statistics per signal
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WindowSummary {
    pub hit_rate: Option<WindowStats>,
    pub fast_hit_rate: Option<WindowStats>,
    pub bulk_hit_rate: Option<WindowStats>,
    pub response_time_ms: Option<WindowStats>,
    pub error_rate: Option<WindowStats>,
    pub fast_utilization: Option<WindowStats>,
    pub promotion_rate: Option<WindowStats>,
    pub eviction_rate: Option<WindowStats>,
}

/// Everything the monitor knows, in one document
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComprehensiveReport {
    pub generated_at: DateTime<Utc>,
    pub performance: PerformanceSnapshot,
    pub windows: WindowSummary,
    pub fast_utilization_percent: f64,
    pub hot_keys: Vec<HotKey>,
    pub active_alerts: Vec<PerformanceAlert>,
    pub recommendations: Vec<Recommendation>,
    pub health: HealthScore,
}

/// Performance monitor
pub struct PerformanceMonitor {
    config: MonitorConfig,
    metrics: Arc<CacheMetrics>,
    series: Mutex<Series>,
    hot_keys: HotKeyTracker,
    alerts: AlertManager,
    /// f64 bits of the latest Fast tier utilization percentage
    fast_utilization: AtomicU64,
    last_check: Mutex<Option<Instant>>,
    shutdown: CancellationToken,
}

impl PerformanceMonitor {
    /// Create a monitor over a metrics recorder
    pub fn new(config: MonitorConfig, metrics: Arc<CacheMetrics>) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            series: Mutex::new(Series::new(config.series_capacity)),
            hot_keys: HotKeyTracker::new(config.max_tracked_keys),
            alerts: AlertManager::new(config.alerts.clone(), config.thresholds.clone()),
            fast_utilization: AtomicU64::new(0f64.to_bits()),
            last_check: Mutex::new(None),
            shutdown: CancellationToken::new(),
            config,
            metrics,
        })
    }

    /// Get configuration
    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    /// Alert manager
    pub fn alerts(&self) -> &AlertManager {
        &self.alerts
    }

    /// Receive every alert raised from now on
    pub fn subscribe(&self) -> broadcast::Receiver<PerformanceAlert> {
        self.alerts.subscribe()
    }

    /// Latest Fast tier utilization percentage
    pub fn fast_utilization(&self) -> f64 {
        f64::from_bits(self.fast_utilization.load(Ordering::Relaxed))
    }

    /// Update the Fast tier utilization percentage
    pub fn set_fast_utilization(&self, percent: f64) {
        self.fast_utilization
            .store(percent.max(0.0).to_bits(), Ordering::Relaxed);
    }

    /// Record one cache read and sample the aggregate metrics
    pub fn record_operation(&self, key: &str, hit: bool, latency: Duration) {
        self.hot_keys.record(key, hit, latency);

        let now = Instant::now();
        self.sample_at(now);
        self.maybe_evaluate(now);
    }

    /// Append one sample per signal from the current metrics
    pub fn sample_at(&self, now: Instant) {
        let snapshot = self.metrics.snapshot();
        let requests = snapshot.total_requests.max(1) as f64;
        let utilization = self.fast_utilization();

        let mut series = self.series.lock();
        series.hit_rate.push_at(snapshot.total_hit_rate_percent, now);
        series.fast_hit_rate.push_at(snapshot.fast_hit_rate_percent, now);
        series
            .bulk_hit_rate
            .push_at(snapshot.bulk_hits as f64 / requests * 100.0, now);
        series.response_time.push_at(snapshot.avg_response_ms, now);
        series.error_rate.push_at(snapshot.error_rate_percent, now);
        series.fast_utilization.push_at(utilization, now);
        series
            .promotion_rate
            .push_at(snapshot.promotions as f64 / requests * 100.0, now);
        series
            .eviction_rate
            .push_at(snapshot.evictions as f64 / requests * 100.0, now);
    }

    fn maybe_evaluate(&self, now: Instant) {
        let due = {
            let mut last = self.last_check.lock();
            let due = match *last {
                Some(at) => now.saturating_duration_since(at) >= self.config.check_interval,
                None => true,
            };
            if due {
                *last = Some(now);
            }
            due
        };

        if due {
            self.evaluate_alerts_at(now);
        }
    }

    /// Check every alert rule against the window mean of its signal
    pub fn evaluate_alerts_at(&self, now: Instant) -> Vec<PerformanceAlert> {
        let means: Vec<(MetricType, f64)> = {
            let series = self.series.lock();
            MetricType::ALL
                .iter()
                .filter_map(|metric| {
                    let stats = series
                        .for_metric(*metric)
                        .window_stats(self.config.sample_window, now)?;
                    (stats.count >= self.config.min_samples).then_some((*metric, stats.mean))
                })
                .collect()
        };

        means
            .into_iter()
            .filter_map(|(metric, mean)| self.alerts.evaluate(metric, mean, now))
            .collect()
    }

    /// Statistics over the trailing window for every signal
    pub fn window_summary(&self, now: Instant) -> WindowSummary {
        let window = self.config.sample_window;
        let series = self.series.lock();
        WindowSummary {
            hit_rate: series.hit_rate.window_stats(window, now),
            fast_hit_rate: series.fast_hit_rate.window_stats(window, now),
            bulk_hit_rate: series.bulk_hit_rate.window_stats(window, now),
            response_time_ms: series.response_time.window_stats(window, now),
            error_rate: series.error_rate.window_stats(window, now),
            fast_utilization: series.fast_utilization.window_stats(window, now),
            promotion_rate: series.promotion_rate.window_stats(window, now),
            eviction_rate: series.eviction_rate.window_stats(window, now),
        }
    }

    /// Top keys by access count
    pub fn hot_keys(&self, limit: usize) -> Vec<HotKey> {
        self.hot_keys.hot_keys(limit)
    }

    /// Analytics for one key
    pub fn key_analytics(&self, key: &str) -> Option<KeyAnalytics> {
        self.hot_keys.get(key)
    }

    /// Active alerts
    pub fn active_alerts(&self) -> Vec<PerformanceAlert> {
        self.alerts.active_alerts(Instant::now())
    }

    /// Weighted health score from window means, falling back to the
    /// cumulative snapshot for signals with no samples yet
    pub fn health_score(&self) -> HealthScore {
        let now = Instant::now();
        let snapshot = self.metrics.snapshot();
        let windows = self.window_summary(now);
        let mean_or = |stats: Option<WindowStats>, fallback: f64| stats.map_or(fallback, |s| s.mean);

        HealthScore::compute(
            mean_or(windows.hit_rate, snapshot.total_hit_rate_percent),
            mean_or(windows.response_time_ms, snapshot.avg_response_ms),
            mean_or(windows.error_rate, snapshot.error_rate_percent),
            mean_or(windows.fast_utilization, self.fast_utilization()),
        )
    }

    /// Qualitative optimization suggestions
    pub fn optimization_recommendations(&self) -> Vec<Recommendation> {
        let snapshot = self.metrics.snapshot();
        let health = self.health_score();
        let utilization = self.fast_utilization();
        let mut recommendations = Vec::new();

        if snapshot.total_requests == 0 {
            return vec![Recommendation::new(
                Priority::Low,
                "traffic",
                "No cache traffic recorded yet",
            )];
        }

        let hit_rate = health.components.hit_rate;
        if hit_rate < 80.0 {
            recommendations.push(Recommendation::new(
                Priority::High,
                "hit_rate",
                format!(
                    "Hit rate is {:.1}%: enable cache warming for frequently missed keys",
                    hit_rate
                ),
            ));
        } else if hit_rate < 90.0 {
            recommendations.push(Recommendation::new(
                Priority::Medium,
                "ttl",
                format!(
                    "Hit rate is {:.1}%: consider raising TTLs for stable data types",
                    hit_rate
                ),
            ));
        }

        if snapshot.total_hits > 0 && snapshot.fast_hits * 2 < snapshot.total_hits {
            recommendations.push(Recommendation::new(
                Priority::Medium,
                "promotion",
                "Most hits are served by the bulk tier: lower the promotion threshold or add hot prefixes",
            ));
        }

        if utilization > 80.0 {
            recommendations.push(Recommendation::new(
                Priority::High,
                "capacity",
                format!(
                    "Fast tier is {:.1}% full: increase its capacity or shorten fast TTLs",
                    utilization
                ),
            ));
        } else if snapshot.evictions > snapshot.promotions.max(1) * 2 {
            recommendations.push(Recommendation::new(
                Priority::Medium,
                "capacity",
                "Evictions outpace promotions: increase fast tier capacity",
            ));
        }

        if snapshot.avg_response_ms > 50.0 {
            recommendations.push(Recommendation::new(
                Priority::High,
                "latency",
                format!(
                    "Average response time is {:.1}ms: grow connection pools and check network",
                    snapshot.avg_response_ms
                ),
            ));
        }

        if snapshot.error_rate_percent > 1.0 {
            recommendations.push(Recommendation::new(
                Priority::High,
                "errors",
                format!(
                    "Error rate is {:.1}% ({} connection errors): check backing store health",
                    snapshot.error_rate_percent, snapshot.connection_errors
                ),
            ));
        }

        for hot in self.hot_keys(5) {
            if hot.access_count >= 10 && hot.hit_rate_percent < 50.0 {
                recommendations.push(Recommendation::new(
                    Priority::Medium,
                    "warming",
                    format!(
                        "Hot key {} hits only {:.0}% of the time: warm it ahead of demand",
                        hot.key, hot.hit_rate_percent
                    ),
                ));
            }
        }

        if recommendations.is_empty() {
            recommendations.push(Recommendation::new(
                Priority::Low,
                "general",
                "Cache is performing within targets",
            ));
        }

        recommendations.sort_by_key(|r| r.priority);
        recommendations
    }

    /// Full report
    pub fn comprehensive_report(&self) -> ComprehensiveReport {
        ComprehensiveReport {
            generated_at: Utc::now(),
            performance: self.metrics.snapshot(),
            windows: self.window_summary(Instant::now()),
            fast_utilization_percent: self.fast_utilization(),
            hot_keys: self.hot_keys(10),
            active_alerts: self.active_alerts(),
            recommendations: self.optimization_recommendations(),
            health: self.health_score(),
        }
    }

    /// Spawn the periodic sampling and alert-evaluation loop
    pub fn start(self: &Arc<Self>) -> JoinHandle<()> {
        let monitor = Arc::clone(self);
        let token = self.shutdown.clone();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(monitor.config.check_interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            tracing::info!(
                interval_secs = monitor.config.check_interval.as_secs(),
                "Performance monitor started"
            );

            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        let now = Instant::now();
                        monitor.sample_at(now);
                        *monitor.last_check.lock() = Some(now);
                        let raised = monitor.evaluate_alerts_at(now);
                        if !raised.is_empty() {
                            tracing::debug!(count = raised.len(), "Alerts raised");
                        }
                    }
                }
            }

            tracing::info!("Performance monitor stopped");
        })
    }

    /// Stop the periodic loop
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    /// Whether `shutdown` has been called
    pub fn is_shut_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Drop all samples, analytics and alerts and reset the recorder
    pub fn reset(&self) {
        for series in self.series.lock().all_mut() {
            series.clear();
        }
        self.hot_keys.clear();
        self.alerts.clear();
        self.metrics.reset();
        *self.last_check.lock() = None;
    }

    /// Number of samples currently buffered per signal
    pub fn sample_counts(&self) -> Vec<(String, usize)> {
        self.series
            .lock()
            .all()
            .iter()
            .map(|series| (series.name().to_string(), series.len()))
            .collect()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitoring::alerts::AlertSeverity;

    fn monitor() -> (PerformanceMonitor, Arc<CacheMetrics>) {
        let metrics = Arc::new(CacheMetrics::new());
        let monitor = PerformanceMonitor::new(MonitorConfig::default(), Arc::clone(&metrics)).unwrap();
        (monitor, metrics)
    }

    #[test]
    fn test_health_score_bands() {
        let perfect = HealthScore::compute(100.0, 0.0, 0.0, 0.0);
        assert!((perfect.score - 100.0).abs() < 1e-9);
        assert_eq!(perfect.grade, HealthGrade::Excellent);

        // 0.4*80 + 0.3*50 + 0.2*50 + 0.1*50 = 62
        let fair = HealthScore::compute(80.0, 100.0, 5.0, 50.0);
        assert!((fair.score - 62.0).abs() < 1e-9);
        assert_eq!(fair.grade, HealthGrade::Fair);

        let critical = HealthScore::compute(10.0, 500.0, 50.0, 100.0);
        assert_eq!(critical.grade, HealthGrade::Critical);

        assert_eq!(HealthGrade::from_score(75.0), HealthGrade::Good);
        assert_eq!(HealthGrade::from_score(40.0), HealthGrade::Poor);
    }

    #[tokio::test(start_paused = true)]
    async fn test_low_hit_rate_raises_alert() {
        let (monitor, metrics) = monitor();

        for i in 0..20 {
            if i % 2 == 0 {
                metrics.record_fast_hit(Duration::from_millis(1));
            } else {
                metrics.record_miss(Some(Duration::from_millis(5)));
            }
            monitor.sample_at(Instant::now());
        }

        let raised = monitor.evaluate_alerts_at(Instant::now());
        let hit_rate = raised
            .iter()
            .find(|a| a.metric_type == MetricType::HitRate)
            .unwrap();
        assert_eq!(hit_rate.severity, AlertSeverity::Critical);
        assert_eq!(monitor.active_alerts().len(), raised.len());
    }

    #[tokio::test(start_paused = true)]
    async fn test_too_few_samples_skip_rules() {
        let (monitor, metrics) = monitor();
        metrics.record_miss(None);
        monitor.sample_at(Instant::now());

        assert!(monitor.evaluate_alerts_at(Instant::now()).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_evaluation_rate_limited() {
        let (monitor, metrics) = monitor();

        for _ in 0..20 {
            metrics.record_miss(None);
            monitor.record_operation("signals:btc", false, Duration::from_millis(1));
        }
        // First operation evaluated with a single sample, the rest are inside the interval
        assert!(monitor.active_alerts().is_empty());

        tokio::time::advance(Duration::from_secs(30)).await;
        monitor.record_operation("signals:btc", false, Duration::from_millis(1));
        assert!(!monitor.active_alerts().is_empty());
    }

    #[tokio::test]
    async fn test_recommendations() {
        let (monitor, metrics) = monitor();
        assert_eq!(monitor.optimization_recommendations()[0].category, "traffic");

        for _ in 0..10 {
            metrics.record_miss(Some(Duration::from_millis(10)));
            monitor.record_operation("analysis:eth", false, Duration::from_millis(10));
        }
        monitor.set_fast_utilization(90.0);

        let recommendations = monitor.optimization_recommendations();
        let categories: Vec<&str> = recommendations.iter().map(|r| r.category.as_str()).collect();
        assert!(categories.contains(&"hit_rate"));
        assert!(categories.contains(&"capacity"));
        assert!(categories.contains(&"warming"));
        assert_eq!(recommendations[0].priority, Priority::High);
    }

    #[tokio::test]
    async fn test_report_serializes() {
        let (monitor, metrics) = monitor();
        metrics.record_fast_hit(Duration::from_millis(1));
        monitor.record_operation("ticker:btcusdt", true, Duration::from_millis(1));

        let report = monitor.comprehensive_report();
        assert_eq!(report.hot_keys[0].key, "ticker:btcusdt");

        let json = serde_json::to_value(&report).unwrap();
        assert!(json["health"]["score"].as_f64().unwrap() > 90.0);
        assert_eq!(json["health"]["grade"], "excellent");
        assert!(json["windows"]["hitRate"].is_object());
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_and_shutdown() {
        let metrics = Arc::new(CacheMetrics::new());
        let monitor = Arc::new(
            PerformanceMonitor::new(MonitorConfig::default(), metrics).unwrap(),
        );

        let handle = monitor.start();
        tokio::time::advance(Duration::from_secs(65)).await;
        tokio::task::yield_now().await;

        monitor.shutdown();
        handle.await.unwrap();
        assert!(monitor.is_shut_down());
        assert!(monitor.sample_counts().iter().all(|(_, n)| *n >= 1));
    }

    #[test]
    fn test_config_validation() {
        assert!(MonitorConfig::default().validate().is_ok());

        let mut config = MonitorConfig::default();
        config.alerts.cooldown = Duration::from_secs(7200);
        assert!(config.validate().is_err());
    }
}
