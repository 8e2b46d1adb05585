//! Rolling time series
//!
//! A bounded buffer of timestamped samples. Statistics are always computed
//! over a trailing time window, never over the whole buffer.

use std::collections::VecDeque;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

/// Statistics over one trailing window
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WindowStats {
    pub count: usize,
    pub mean: f64,
    pub min: f64,
    pub max: f64,
    pub p95: f64,
    pub latest: f64,
    /// Mean of the newer half minus mean of the older half
    pub trend: f64,
}

/// Named metric with bounded history
#[derive(Debug, Clone)]
pub struct TimeSeriesMetric {
    name: String,
    max_size: usize,
    samples: VecDeque<(f64, Instant)>,
}

impl TimeSeriesMetric {
    /// Create a series keeping at most `max_size` samples
    pub fn new(name: impl Into<String>, max_size: usize) -> Self {
        let max_size = max_size.max(1);
        Self {
            name: name.into(),
            max_size,
            samples: VecDeque::with_capacity(max_size.min(1024)),
        }
    }

    /// Metric name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Append a sample taken now
    pub fn push(&mut self, value: f64) {
        self.push_at(value, Instant::now());
    }

    /// Append a sample with an explicit timestamp
    pub fn push_at(&mut self, value: f64, at: Instant) {
        if self.samples.len() == self.max_size {
            self.samples.pop_front();
        }
        self.samples.push_back((value, at));
    }

    /// Number of buffered samples
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Most recent value
    pub fn latest(&self) -> Option<f64> {
        self.samples.back().map(|(value, _)| *value)
    }

    /// Values no older than `window` before `now`, oldest first
    pub fn values_within(&self, window: Duration, now: Instant) -> Vec<f64> {
        let cutoff = now.checked_sub(window);
        self.samples
            .iter()
            .filter(|(_, at)| cutoff.map_or(true, |cutoff| *at >= cutoff) && *at <= now)
            .map(|(value, _)| *value)
            .collect()
    }

    /// Statistics over the trailing window; `None` when it holds no samples
    pub fn window_stats(&self, window: Duration, now: Instant) -> Option<WindowStats> {
        let values = self.values_within(window, now);
        if values.is_empty() {
            return None;
        }

        let count = values.len();
        let mean = mean(&values);
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let latest = values[count - 1];

        let mut sorted = values.clone();
        sorted.sort_by(|a, b| a.total_cmp(b));
        let rank = ((count as f64) * 0.95).ceil() as usize;
        let p95 = sorted[rank.saturating_sub(1).min(count - 1)];

        let trend = if count >= 2 {
            let (older, newer) = values.split_at(count / 2);
            mean_or_zero(newer) - mean_or_zero(older)
        } else {
            0.0
        };

        Some(WindowStats {
            count,
            mean,
            min,
            max,
            p95,
            latest,
            trend,
        })
    }

    /// Drop every sample
    pub fn clear(&mut self) {
        self.samples.clear();
    }
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

fn mean_or_zero(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        mean(values)
    }
}
