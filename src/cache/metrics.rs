//! Cache Metrics Collection
//!
//! Process-wide counters for hits, misses, errors, promotions and evictions,
//! plus response-time sums. Every counter is an atomic, so recording never
//! blocks and a snapshot never blocks writers.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

/// Qualitative rating derived from hit rate and average latency
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PerformanceRating {
    Excellent,
    Good,
    Acceptable,
    NeedsImprovement,
}

impl PerformanceRating {
    /// Rate a hit-rate percentage and average response time
    pub fn rate(hit_rate_percent: f64, avg_response_ms: f64) -> Self {
        if hit_rate_percent >= 80.0 && avg_response_ms <= 50.0 {
            PerformanceRating::Excellent
        } else if hit_rate_percent >= 70.0 && avg_response_ms <= 100.0 {
            PerformanceRating::Good
        } else if hit_rate_percent >= 60.0 && avg_response_ms <= 150.0 {
            PerformanceRating::Acceptable
        } else {
            PerformanceRating::NeedsImprovement
        }
    }

    /// Wire name
    pub fn as_str(&self) -> &'static str {
        match self {
            PerformanceRating::Excellent => "EXCELLENT",
            PerformanceRating::Good => "GOOD",
            PerformanceRating::Acceptable => "ACCEPTABLE",
            PerformanceRating::NeedsImprovement => "NEEDS_IMPROVEMENT",
        }
    }
}

impl std::fmt::Display for PerformanceRating {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Cache metrics recorder
#[derive(Debug)]
pub struct CacheMetrics {
    started_at: Mutex<Instant>,

    fast_hits: AtomicU64,
    bulk_hits: AtomicU64,
    local_hits: AtomicU64,
    misses: AtomicU64,

    promotions: AtomicU64,
    evictions: AtomicU64,
    errors: AtomicU64,
    connection_errors: AtomicU64,
    cancellations: AtomicU64,

    // Latency sums (microseconds)
    fast_response_us: AtomicU64,
    bulk_response_us: AtomicU64,
    local_response_us: AtomicU64,
    compute_us: AtomicU64,
    computes: AtomicU64,
}

impl Default for CacheMetrics {
    fn default() -> Self {
        Self {
            started_at: Mutex::new(Instant::now()),
            fast_hits: AtomicU64::new(0),
            bulk_hits: AtomicU64::new(0),
            local_hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            promotions: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
            errors: AtomicU64::new(0),
            connection_errors: AtomicU64::new(0),
            cancellations: AtomicU64::new(0),
            fast_response_us: AtomicU64::new(0),
            bulk_response_us: AtomicU64::new(0),
            local_response_us: AtomicU64::new(0),
            compute_us: AtomicU64::new(0),
            computes: AtomicU64::new(0),
        }
    }
}

#[inline]
fn micros(duration: Duration) -> u64 {
    duration.as_micros().min(u64::MAX as u128) as u64
}

#[inline]
fn avg_ms(sum_us: u64, count: u64) -> f64 {
    if count == 0 {
        0.0
    } else {
        sum_us as f64 / count as f64 / 1000.0
    }
}

#[inline]
fn percent(part: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        (part as f64 / total as f64 * 100.0).clamp(0.0, 100.0)
    }
}

impl CacheMetrics {
    /// Create a new metrics recorder
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_fast_hit(&self, latency: Duration) {
        self.fast_hits.fetch_add(1, Ordering::Relaxed);
        self.fast_response_us
            .fetch_add(micros(latency), Ordering::Relaxed);
    }

    pub fn record_bulk_hit(&self, latency: Duration, promoted: bool) {
        self.bulk_hits.fetch_add(1, Ordering::Relaxed);
        self.bulk_response_us
            .fetch_add(micros(latency), Ordering::Relaxed);
        if promoted {
            self.promotions.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_local_hit(&self, latency: Duration) {
        self.local_hits.fetch_add(1, Ordering::Relaxed);
        self.local_response_us
            .fetch_add(micros(latency), Ordering::Relaxed);
    }

    /// Record a miss; `compute` is the producer latency when one ran
    pub fn record_miss(&self, compute: Option<Duration>) {
        self.misses.fetch_add(1, Ordering::Relaxed);
        if let Some(compute) = compute {
            self.compute_us.fetch_add(micros(compute), Ordering::Relaxed);
            self.computes.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_error(&self, is_connection_error: bool) {
        self.errors.fetch_add(1, Ordering::Relaxed);
        if is_connection_error {
            self.connection_errors.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_eviction(&self) {
        self.evictions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cancellation(&self) {
        self.cancellations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn fast_hits(&self) -> u64 {
        self.fast_hits.load(Ordering::Relaxed)
    }

    pub fn bulk_hits(&self) -> u64 {
        self.bulk_hits.load(Ordering::Relaxed)
    }

    pub fn local_hits(&self) -> u64 {
        self.local_hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    pub fn promotions(&self) -> u64 {
        self.promotions.load(Ordering::Relaxed)
    }

    pub fn evictions(&self) -> u64 {
        self.evictions.load(Ordering::Relaxed)
    }

    pub fn errors(&self) -> u64 {
        self.errors.load(Ordering::Relaxed)
    }

    pub fn cancellations(&self) -> u64 {
        self.cancellations.load(Ordering::Relaxed)
    }

    /// Get snapshot of all metrics
    pub fn snapshot(&self) -> PerformanceSnapshot {
        let fast_hits = self.fast_hits();
        let bulk_hits = self.bulk_hits();
        let local_hits = self.local_hits();
        let misses = self.misses();
        let errors = self.errors();

        let fast_us = self.fast_response_us.load(Ordering::Relaxed);
        let bulk_us = self.bulk_response_us.load(Ordering::Relaxed);
        let local_us = self.local_response_us.load(Ordering::Relaxed);

        let total_hits = fast_hits + bulk_hits + local_hits;
        let total_requests = total_hits + misses;
        let total_hit_rate_percent = percent(total_hits, total_requests);
        let avg_response_ms = avg_ms(fast_us + bulk_us + local_us, total_hits);

        PerformanceSnapshot {
            uptime_seconds: self.started_at.lock().elapsed().as_secs_f64(),
            total_requests,
            total_hits,
            fast_hits,
            bulk_hits,
            local_hits,
            misses,
            total_hit_rate_percent,
            fast_hit_rate_percent: percent(fast_hits, total_requests),
            promotions: self.promotions(),
            evictions: self.evictions(),
            avg_fast_response_ms: avg_ms(fast_us, fast_hits),
            avg_bulk_response_ms: avg_ms(bulk_us, bulk_hits),
            avg_local_response_ms: avg_ms(local_us, local_hits),
            avg_response_ms,
            avg_compute_ms: avg_ms(
                self.compute_us.load(Ordering::Relaxed),
                self.computes.load(Ordering::Relaxed),
            ),
            errors,
            connection_errors: self.connection_errors.load(Ordering::Relaxed),
            error_rate_percent: percent(errors, total_requests.max(errors)),
            cancellations: self.cancellations(),
            performance_rating: PerformanceRating::rate(total_hit_rate_percent, avg_response_ms),
        }
    }

    /// Reset all metrics
    pub fn reset(&self) {
        *self.started_at.lock() = Instant::now();
        for counter in [
            &self.fast_hits,
            &self.bulk_hits,
            &self.local_hits,
            &self.misses,
            &self.promotions,
            &self.evictions,
            &self.errors,
            &self.connection_errors,
            &self.cancellations,
            &self.fast_response_us,
            &self.bulk_response_us,
            &self.local_response_us,
            &self.compute_us,
            &self.computes,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

/// Point-in-time performance summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceSnapshot {
    pub uptime_seconds: f64,
    pub total_requests: u64,
    pub total_hits: u64,
    pub fast_hits: u64,
    pub bulk_hits: u64,
    pub local_hits: u64,
    pub misses: u64,
    pub total_hit_rate_percent: f64,
    pub fast_hit_rate_percent: f64,
    pub promotions: u64,
    pub evictions: u64,
    pub avg_fast_response_ms: f64,
    pub avg_bulk_response_ms: f64,
    pub avg_local_response_ms: f64,
    /// Mean latency over all hits
    pub avg_response_ms: f64,
    pub avg_compute_ms: f64,
    pub errors: u64,
    pub connection_errors: u64,
    pub error_rate_percent: f64,
    pub cancellations: u64,
    pub performance_rating: PerformanceRating,
}

/// Latency tracker helper
pub struct LatencyTracker {
    start: Instant,
}

impl LatencyTracker {
    /// Start tracking latency
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Get elapsed duration
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::sync::Arc;

    #[test]
    fn test_metrics_creation() {
        let snapshot = CacheMetrics::new().snapshot();
        assert_eq!(snapshot.total_requests, 0);
        assert_eq!(snapshot.total_hit_rate_percent, 0.0);
        assert_eq!(snapshot.avg_fast_response_ms, 0.0);
    }

    #[test]
    fn test_hit_tracking() {
        let metrics = CacheMetrics::new();

        metrics.record_fast_hit(Duration::from_millis(2));
        metrics.record_fast_hit(Duration::from_millis(4));
        metrics.record_bulk_hit(Duration::from_millis(10), true);
        metrics.record_local_hit(Duration::from_millis(1));
        metrics.record_miss(Some(Duration::from_millis(100)));

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.total_requests, 5);
        assert_eq!(snapshot.total_hits, 4);
        assert_eq!(snapshot.promotions, 1);
        assert!((snapshot.total_hit_rate_percent - 80.0).abs() < 1e-9);
        assert!((snapshot.fast_hit_rate_percent - 40.0).abs() < 1e-9);
        assert!((snapshot.avg_fast_response_ms - 3.0).abs() < 1e-9);
        assert!((snapshot.avg_bulk_response_ms - 10.0).abs() < 1e-9);
        assert!((snapshot.avg_compute_ms - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_miss_without_compute_leaves_compute_average() {
        let metrics = CacheMetrics::new();
        metrics.record_miss(Some(Duration::from_millis(40)));
        metrics.record_miss(None);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.misses, 2);
        assert!((snapshot.avg_compute_ms - 40.0).abs() < 1e-9);
    }

    #[test]
    fn test_error_tracking() {
        let metrics = CacheMetrics::new();
        metrics.record_error(true);
        metrics.record_error(false);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.errors, 2);
        assert_eq!(snapshot.connection_errors, 1);
        assert!(snapshot.error_rate_percent <= 100.0);
    }

    #[test]
    fn test_performance_rating_bands() {
        assert_eq!(PerformanceRating::rate(85.0, 20.0), PerformanceRating::Excellent);
        assert_eq!(PerformanceRating::rate(85.0, 80.0), PerformanceRating::Good);
        assert_eq!(PerformanceRating::rate(65.0, 120.0), PerformanceRating::Acceptable);
        assert_eq!(PerformanceRating::rate(50.0, 10.0), PerformanceRating::NeedsImprovement);
        assert_eq!(PerformanceRating::rate(95.0, 200.0), PerformanceRating::NeedsImprovement);
    }

    #[test]
    fn test_snapshot_wire_names() {
        let metrics = CacheMetrics::new();
        metrics.record_fast_hit(Duration::from_millis(1));

        let json = serde_json::to_value(metrics.snapshot()).unwrap();
        assert!(json.get("uptimeSeconds").is_some());
        assert!(json.get("totalHitRatePercent").is_some());
        assert!(json.get("avgComputeMs").is_some());
        assert_eq!(json["performanceRating"], "EXCELLENT");
    }

    #[test]
    fn test_reset() {
        let metrics = CacheMetrics::new();
        metrics.record_fast_hit(Duration::from_millis(1));
        metrics.record_eviction();
        metrics.record_cancellation();
        metrics.reset();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.total_requests, 0);
        assert_eq!(snapshot.evictions, 0);
        assert_eq!(snapshot.cancellations, 0);
    }

    #[test]
    fn test_concurrent_recording() {
        let metrics = Arc::new(CacheMetrics::new());
        let mut handles = vec![];

        for _ in 0..4 {
            let metrics = Arc::clone(&metrics);
            handles.push(std::thread::spawn(move || {
                for i in 0..1000 {
                    if i % 2 == 0 {
                        metrics.record_fast_hit(Duration::from_micros(10));
                    } else {
                        metrics.record_miss(None);
                    }
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.total_requests, 4000);
        assert_eq!(snapshot.fast_hits, 2000);
    }

    #[derive(Debug, Clone)]
    enum Event {
        Fast,
        Bulk(bool),
        Local,
        Miss,
        Error(bool),
        Eviction,
    }

    fn event() -> impl Strategy<Value = Event> {
        prop_oneof![
            Just(Event::Fast),
            any::<bool>().prop_map(Event::Bulk),
            Just(Event::Local),
            Just(Event::Miss),
            any::<bool>().prop_map(Event::Error),
            Just(Event::Eviction),
        ]
    }

    proptest! {
        #[test]
        fn prop_counters_monotonic_and_rate_bounded(events in proptest::collection::vec(event(), 0..300)) {
            let metrics = CacheMetrics::new();
            let mut previous = metrics.snapshot();

            for event in events {
                match event {
                    Event::Fast => metrics.record_fast_hit(Duration::from_micros(50)),
                    Event::Bulk(promoted) => metrics.record_bulk_hit(Duration::from_micros(500), promoted),
                    Event::Local => metrics.record_local_hit(Duration::from_micros(5)),
                    Event::Miss => metrics.record_miss(Some(Duration::from_millis(3))),
                    Event::Error(conn) => metrics.record_error(conn),
                    Event::Eviction => metrics.record_eviction(),
                }

                let current = metrics.snapshot();
                prop_assert!(current.total_hits >= previous.total_hits);
                prop_assert!(current.misses >= previous.misses);
                prop_assert!(current.errors >= previous.errors);
                prop_assert!(current.evictions >= previous.evictions);
                prop_assert!((0.0..=100.0).contains(&current.total_hit_rate_percent));
                prop_assert!((0.0..=100.0).contains(&current.error_rate_percent));
                previous = current;
            }
        }
    }
}
