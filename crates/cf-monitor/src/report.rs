use crate::system::SystemSnapshot;
use std::collections::HashMap;

/// Aggregate statistics for a single metric name over the report window.
#[derive(Clone, Debug)]
pub struct MetricSummary {
    pub count: usize,
    pub p50: f64,
    pub p95: f64,
    pub p99: f64,
}

/// Output of `GenerateReport(windowMs)`.
#[derive(Clone, Debug)]
pub struct Report {
    pub window_ms: u64,
    pub metrics: HashMap<String, MetricSummary>,
    /// Fraction of operations ending in `OperationStatus::Success`, proxied
    /// from `operation.*.duration_ms` samples tagged `status`.
    pub success_rate: Option<f64>,
    /// Fraction of `cache.hit`/`cache.miss` samples that were hits.
    pub cache_hit_rate: Option<f64>,
    pub system: SystemSnapshot,
}

impl Report {
    pub fn total_samples(&self) -> usize {
        self.metrics.values().map(|m| m.count).sum()
    }
}
