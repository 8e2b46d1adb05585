//! Prometheus exposition
//!
//! Mirrors the monitor's state into a private registry on every scrape.

use prometheus::{Encoder, Gauge, IntGauge, IntGaugeVec, Opts, Registry, TextEncoder};

use super::monitor::PerformanceMonitor;
use crate::error::{Error, Result};

/// Renders cache metrics in the Prometheus text format
pub struct PrometheusExporter {
    registry: Registry,
    hits: IntGaugeVec,
    misses: IntGauge,
    promotions: IntGauge,
    evictions: IntGauge,
    errors: IntGaugeVec,
    cancellations: IntGauge,
    hit_rate: Gauge,
    avg_response_ms: Gauge,
    error_rate: Gauge,
    fast_utilization: Gauge,
    health_score: Gauge,
    active_alerts: IntGauge,
}

fn internal(e: prometheus::Error) -> Error {
    Error::Internal(format!("Prometheus registry error: {}", e))
}

impl PrometheusExporter {
    /// Create an exporter with every metric registered under `namespace`
    pub fn new(namespace: &str) -> Result<Self> {
        let registry = Registry::new();
        let opts = |name: &str, help: &str| Opts::new(name, help).namespace(namespace);

        let hits = IntGaugeVec::new(opts("hits", "Cache hits by serving tier"), &["tier"])
            .map_err(internal)?;
        let misses = IntGauge::with_opts(opts("misses", "Reads that found no tier holding the key"))
            .map_err(internal)?;
        let promotions = IntGauge::with_opts(opts("promotions", "Bulk to Fast tier promotions"))
            .map_err(internal)?;
        let evictions = IntGauge::with_opts(opts("evictions", "Fast tier capacity evictions"))
            .map_err(internal)?;
        let errors = IntGaugeVec::new(opts("errors", "Tier faults by kind"), &["kind"])
            .map_err(internal)?;
        let cancellations = IntGauge::with_opts(opts("cancellations", "Cancelled operations"))
            .map_err(internal)?;
        let hit_rate = Gauge::with_opts(opts("hit_rate_percent", "Overall hit rate"))
            .map_err(internal)?;
        let avg_response_ms = Gauge::with_opts(opts("avg_response_ms", "Mean hit latency"))
            .map_err(internal)?;
        let error_rate = Gauge::with_opts(opts("error_rate_percent", "Errors per request"))
            .map_err(internal)?;
        let fast_utilization = Gauge::with_opts(opts(
            "fast_utilization_percent",
            "Fast tier keys as a share of the ceiling",
        ))
        .map_err(internal)?;
        let health_score = Gauge::with_opts(opts("health_score", "Weighted health score 0-100"))
            .map_err(internal)?;
        let active_alerts = IntGauge::with_opts(opts("active_alerts", "Unexpired alerts"))
            .map_err(internal)?;

        registry.register(Box::new(hits.clone())).map_err(internal)?;
        registry.register(Box::new(misses.clone())).map_err(internal)?;
        registry.register(Box::new(promotions.clone())).map_err(internal)?;
        registry.register(Box::new(evictions.clone())).map_err(internal)?;
        registry.register(Box::new(errors.clone())).map_err(internal)?;
        registry.register(Box::new(cancellations.clone())).map_err(internal)?;
        registry.register(Box::new(hit_rate.clone())).map_err(internal)?;
        registry.register(Box::new(avg_response_ms.clone())).map_err(internal)?;
        registry.register(Box::new(error_rate.clone())).map_err(internal)?;
        registry.register(Box::new(fast_utilization.clone())).map_err(internal)?;
        registry.register(Box::new(health_score.clone())).map_err(internal)?;
        registry.register(Box::new(active_alerts.clone())).map_err(internal)?;

        Ok(Self {
            registry,
            hits,
            misses,
            promotions,
            evictions,
            errors,
            cancellations,
            hit_rate,
            avg_response_ms,
            error_rate,
            fast_utilization,
            health_score,
            active_alerts,
        })
    }

    /// Refresh every gauge from the monitor and encode the registry
    pub fn render(&self, monitor: &PerformanceMonitor) -> Result<String> {
        let snapshot = monitor.comprehensive_report();
        let perf = &snapshot.performance;

        self.hits.with_label_values(&["fast"]).set(perf.fast_hits as i64);
        self.hits.with_label_values(&["bulk"]).set(perf.bulk_hits as i64);
        self.hits.with_label_values(&["local"]).set(perf.local_hits as i64);
        self.misses.set(perf.misses as i64);
        self.promotions.set(perf.promotions as i64);
        self.evictions.set(perf.evictions as i64);
        self.errors
            .with_label_values(&["connection"])
            .set(perf.connection_errors as i64);
        self.errors
            .with_label_values(&["other"])
            .set(perf.errors.saturating_sub(perf.connection_errors) as i64);
        self.cancellations.set(perf.cancellations as i64);
        self.hit_rate.set(perf.total_hit_rate_percent);
        self.avg_response_ms.set(perf.avg_response_ms);
        self.error_rate.set(perf.error_rate_percent);
        self.fast_utilization.set(snapshot.fast_utilization_percent);
        self.health_score.set(snapshot.health.score);
        self.active_alerts.set(snapshot.active_alerts.len() as i64);

        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder
            .encode(&self.registry.gather(), &mut buffer)
            .map_err(internal)?;

        String::from_utf8(buffer)
            .map_err(|e| Error::Internal(format!("Metrics output is not UTF-8: {}", e)))
    }

    /// Content type of `render` output
    pub fn content_type(&self) -> String {
        TextEncoder::new().format_type().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheMetrics;
    use crate::monitoring::MonitorConfig;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_render() {
        let metrics = Arc::new(CacheMetrics::new());
        metrics.record_fast_hit(Duration::from_millis(1));
        metrics.record_bulk_hit(Duration::from_millis(3), true);
        metrics.record_miss(None);
        metrics.record_error(true);

        let monitor = PerformanceMonitor::new(MonitorConfig::default(), metrics).unwrap();
        monitor.set_fast_utilization(12.5);

        let exporter = PrometheusExporter::new("tiercache").unwrap();
        let text = exporter.render(&monitor).unwrap();

        assert!(text.contains("tiercache_hits{tier=\"fast\"} 1"));
        assert!(text.contains("tiercache_hits{tier=\"bulk\"} 1"));
        assert!(text.contains("tiercache_misses 1"));
        assert!(text.contains("tiercache_promotions 1"));
        assert!(text.contains("tiercache_errors{kind=\"connection\"} 1"));
        assert!(text.contains("tiercache_fast_utilization_percent 12.5"));
        assert!(exporter.content_type().starts_with("text/plain"));
    }

    #[test]
    fn test_exporters_are_independent() {
        assert!(PrometheusExporter::new("tiercache").is_ok());
        assert!(PrometheusExporter::new("tiercache").is_ok());
    }
}
