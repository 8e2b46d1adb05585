//! Performance Alerts
//!
//! Threshold rules, deduplication and fan-out of [`PerformanceAlert`]s.
//!
//! An alert of a given (metric, severity) is suppressed while another one of
//! the same pair was raised within the cooldown. A newly raised alert
//! supersedes older active alerts for the same metric, and active alerts
//! expire after a fixed age.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio::time::Instant;

/// Alert severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    Warning,
    Critical,
}

impl std::fmt::Display for AlertSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlertSeverity::Warning => write!(f, "warning"),
            AlertSeverity::Critical => write!(f, "critical"),
        }
    }
}

/// Monitored signal an alert refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricType {
    HitRate,
    ResponseTime,
    ErrorRate,
    FastTierUtilization,
}

impl MetricType {
    /// All alertable metrics
    pub const ALL: [MetricType; 4] = [
        MetricType::HitRate,
        MetricType::ResponseTime,
        MetricType::ErrorRate,
        MetricType::FastTierUtilization,
    ];

    /// Display label
    pub fn label(&self) -> &'static str {
        match self {
            MetricType::HitRate => "hit rate",
            MetricType::ResponseTime => "response time",
            MetricType::ErrorRate => "error rate",
            MetricType::FastTierUtilization => "fast tier utilization",
        }
    }

    fn unit(&self) -> &'static str {
        match self {
            MetricType::ResponseTime => "ms",
            _ => "%",
        }
    }
}

/// A single threshold violation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceAlert {
    pub timestamp: DateTime<Utc>,
    pub severity: AlertSeverity,
    pub metric_type: MetricType,
    pub message: String,
    pub current_value: f64,
    pub threshold_value: f64,
    pub suggested_action: String,
}

/// Direction in which a metric becomes bad
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Breach {
    /// Alert when the value drops below the threshold
    Below,
    /// Alert when the value rises above the threshold
    Above,
}

/// Warning and critical thresholds for one metric
#[derive(Debug, Clone)]
pub struct AlertRule {
    pub warning: f64,
    pub critical: f64,
    pub breach: Breach,
    pub suggested_action: &'static str,
}

impl AlertRule {
    /// Severity and threshold crossed by `value`, if any
    pub fn classify(&self, value: f64) -> Option<(AlertSeverity, f64)> {
        let crossed = |threshold: f64| match self.breach {
            Breach::Below => value < threshold,
            Breach::Above => value > threshold,
        };

        if crossed(self.critical) {
            Some((AlertSeverity::Critical, self.critical))
        } else if crossed(self.warning) {
            Some((AlertSeverity::Warning, self.warning))
        } else {
            None
        }
    }
}

/// Threshold table
#[derive(Debug, Clone)]
pub struct AlertThresholds {
    rules: HashMap<MetricType, AlertRule>,
}

impl Default for AlertThresholds {
    fn default() -> Self {
        let rules = HashMap::from([
            (
                MetricType::HitRate,
                AlertRule {
                    warning: 90.0,
                    critical: 80.0,
                    breach: Breach::Below,
                    suggested_action: "Check cache configuration, TTLs and key patterns",
                },
            ),
            (
                MetricType::ResponseTime,
                AlertRule {
                    warning: 50.0,
                    critical: 100.0,
                    breach: Breach::Above,
                    suggested_action: "Grow connection pools and check network latency",
                },
            ),
            (
                MetricType::ErrorRate,
                AlertRule {
                    warning: 1.0,
                    critical: 5.0,
                    breach: Breach::Above,
                    suggested_action: "Check backing store health and resources",
                },
            ),
            (
                MetricType::FastTierUtilization,
                AlertRule {
                    warning: 80.0,
                    critical: 95.0,
                    breach: Breach::Above,
                    suggested_action: "Raise the fast tier capacity limit or shorten TTLs",
                },
            ),
        ]);
        Self { rules }
    }
}

impl AlertThresholds {
    /// Replace the rule for one metric
    pub fn with_rule(mut self, metric: MetricType, rule: AlertRule) -> Self {
        self.rules.insert(metric, rule);
        self
    }

    /// Rule for a metric
    pub fn rule(&self, metric: MetricType) -> Option<&AlertRule> {
        self.rules.get(&metric)
    }
}

/// Alert timing configuration
#[derive(Debug, Clone)]
pub struct AlertConfig {
    /// Suppression window per (metric, severity)
    pub cooldown: Duration,
    /// Age after which an active alert is dropped
    pub expiry: Duration,
    /// Raised alerts kept for inspection
    pub history_limit: usize,
    /// Broadcast channel capacity
    pub channel_capacity: usize,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            cooldown: Duration::from_secs(5 * 60),
            expiry: Duration::from_secs(60 * 60),
            history_limit: 100,
            channel_capacity: 64,
        }
    }
}

#[derive(Debug)]
struct ActiveAlert {
    alert: PerformanceAlert,
    raised_at: Instant,
}

#[derive(Debug, Default)]
struct AlertState {
    active: Vec<ActiveAlert>,
    last_raised: HashMap<(MetricType, AlertSeverity), Instant>,
    history: VecDeque<PerformanceAlert>,
}

/// Alert manager
pub struct AlertManager {
    config: AlertConfig,
    thresholds: AlertThresholds,
    state: Mutex<AlertState>,
    sender: broadcast::Sender<PerformanceAlert>,
}

impl AlertManager {
    /// Create a manager
    pub fn new(config: AlertConfig, thresholds: AlertThresholds) -> Self {
        let (sender, _) = broadcast::channel(config.channel_capacity.max(1));
        Self {
            config,
            thresholds,
            state: Mutex::new(AlertState::default()),
            sender,
        }
    }

    /// Receive every alert raised from now on
    pub fn subscribe(&self) -> broadcast::Receiver<PerformanceAlert> {
        self.sender.subscribe()
    }

    /// Threshold table
    pub fn thresholds(&self) -> &AlertThresholds {
        &self.thresholds
    }

    /// Check `value` against the rule for `metric` and raise an alert if it
    /// breaches. Returns the alert if one was emitted.
    pub fn evaluate(&self, metric: MetricType, value: f64, now: Instant) -> Option<PerformanceAlert> {
        let rule = self.thresholds.rule(metric)?;
        let (severity, threshold) = rule.classify(value)?;

        let direction = match rule.breach {
            Breach::Below => "below",
            Breach::Above => "above",
        };
        let alert = PerformanceAlert {
            timestamp: Utc::now(),
            severity,
            metric_type: metric,
            message: format!(
                "Cache {} is {:.2}{}, {} the {} threshold of {:.2}{}",
                metric.label(),
                value,
                metric.unit(),
                direction,
                severity,
                threshold,
                metric.unit()
            ),
            current_value: value,
            threshold_value: threshold,
            suggested_action: rule.suggested_action.to_string(),
        };

        if self.raise(alert.clone(), now) {
            Some(alert)
        } else {
            None
        }
    }

    /// Raise an alert unless one of the same (metric, severity) was raised
    /// within the cooldown. Returns whether it was emitted.
    pub fn raise(&self, alert: PerformanceAlert, now: Instant) -> bool {
        let pair = (alert.metric_type, alert.severity);

        {
            let mut state = self.state.lock();
            self.prune(&mut state, now);

            if let Some(last) = state.last_raised.get(&pair) {
                if now.saturating_duration_since(*last) < self.config.cooldown {
                    tracing::debug!(
                        metric = ?alert.metric_type,
                        severity = %alert.severity,
                        "Alert suppressed by cooldown"
                    );
                    return false;
                }
            }

            state
                .active
                .retain(|active| active.alert.metric_type != alert.metric_type);
            state.active.push(ActiveAlert {
                alert: alert.clone(),
                raised_at: now,
            });
            state.last_raised.insert(pair, now);

            if state.history.len() == self.config.history_limit {
                state.history.pop_front();
            }
            state.history.push_back(alert.clone());
        }

        tracing::warn!(
            metric = ?alert.metric_type,
            severity = %alert.severity,
            current = alert.current_value,
            threshold = alert.threshold_value,
            "{}",
            alert.message
        );

        // No receivers is fine
        let _ = self.sender.send(alert);
        true
    }

    fn prune(&self, state: &mut AlertState, now: Instant) {
        let expiry = self.config.expiry;
        state
            .active
            .retain(|active| now.saturating_duration_since(active.raised_at) < expiry);
    }

    /// Active (unexpired, not superseded) alerts
    pub fn active_alerts(&self, now: Instant) -> Vec<PerformanceAlert> {
        let mut state = self.state.lock();
        self.prune(&mut state, now);
        state.active.iter().map(|active| active.alert.clone()).collect()
    }

    /// Recently raised alerts, oldest first
    pub fn history(&self) -> Vec<PerformanceAlert> {
        self.state.lock().history.iter().cloned().collect()
    }

    /// Forget all alert state
    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.active.clear();
        state.last_raised.clear();
        state.history.clear();
    }
}

impl Default for AlertManager {
    fn default() -> Self {
        Self::new(AlertConfig::default(), AlertThresholds::default())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rule_classification() {
        let thresholds = AlertThresholds::default();

        let hit_rate = thresholds.rule(MetricType::HitRate).unwrap();
        assert_eq!(hit_rate.classify(95.0), None);
        assert_eq!(hit_rate.classify(85.0), Some((AlertSeverity::Warning, 90.0)));
        assert_eq!(hit_rate.classify(70.0), Some((AlertSeverity::Critical, 80.0)));

        let response = thresholds.rule(MetricType::ResponseTime).unwrap();
        assert_eq!(response.classify(40.0), None);
        assert_eq!(response.classify(75.0), Some((AlertSeverity::Warning, 50.0)));
        assert_eq!(response.classify(150.0), Some((AlertSeverity::Critical, 100.0)));

        let errors = thresholds.rule(MetricType::ErrorRate).unwrap();
        assert_eq!(errors.classify(2.0), Some((AlertSeverity::Warning, 1.0)));
        assert_eq!(errors.classify(6.0), Some((AlertSeverity::Critical, 5.0)));

        let util = thresholds.rule(MetricType::FastTierUtilization).unwrap();
        assert_eq!(util.classify(85.0), Some((AlertSeverity::Warning, 80.0)));
        assert_eq!(util.classify(99.0), Some((AlertSeverity::Critical, 95.0)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cooldown_deduplicates() {
        let manager = AlertManager::default();

        assert!(manager.evaluate(MetricType::HitRate, 70.0, Instant::now()).is_some());
        assert!(manager.evaluate(MetricType::HitRate, 65.0, Instant::now()).is_none());
        assert_eq!(manager.active_alerts(Instant::now()).len(), 1);

        tokio::time::advance(Duration::from_secs(5 * 60)).await;

        assert!(manager.evaluate(MetricType::HitRate, 65.0, Instant::now()).is_some());
        assert_eq!(manager.active_alerts(Instant::now()).len(), 1);
        assert_eq!(manager.history().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_new_severity_supersedes() {
        let manager = AlertManager::default();

        manager.evaluate(MetricType::ErrorRate, 2.0, Instant::now());
        manager.evaluate(MetricType::ErrorRate, 9.0, Instant::now());

        let active = manager.active_alerts(Instant::now());
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].severity, AlertSeverity::Critical);
    }

    #[tokio::test(start_paused = true)]
    async fn test_alerts_expire_after_an_hour() {
        let manager = AlertManager::default();
        manager.evaluate(MetricType::ResponseTime, 120.0, Instant::now());

        tokio::time::advance(Duration::from_secs(59 * 60)).await;
        assert_eq!(manager.active_alerts(Instant::now()).len(), 1);

        tokio::time::advance(Duration::from_secs(60)).await;
        assert!(manager.active_alerts(Instant::now()).is_empty());
    }

    #[tokio::test]
    async fn test_subscribers_receive_alerts() {
        let manager = AlertManager::default();
        let mut rx = manager.subscribe();

        manager.evaluate(MetricType::FastTierUtilization, 97.0, Instant::now());

        let alert = rx.recv().await.unwrap();
        assert_eq!(alert.metric_type, MetricType::FastTierUtilization);
        assert_eq!(alert.severity, AlertSeverity::Critical);
        assert_eq!(alert.threshold_value, 95.0);
    }

    #[test]
    fn test_alert_payload_wire_names() {
        let manager = AlertManager::default();
        let alert = manager
            .evaluate(MetricType::HitRate, 50.0, Instant::now())
            .unwrap();

        let json = serde_json::to_value(&alert).unwrap();
        for field in [
            "timestamp",
            "severity",
            "metricType",
            "message",
            "currentValue",
            "thresholdValue",
            "suggestedAction",
        ] {
            assert!(json.get(field).is_some(), "missing {}", field);
        }
        assert_eq!(json["metricType"], "hit_rate");
        assert_eq!(json["severity"], "critical");
    }
}
