use cf_core::DEFAULT_METRIC_RETENTION_MS;

/// Direction a threshold alert watches.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AlertDirection {
    Above,
    Below,
}

/// A single configured threshold: fires `handler` when a newly recorded
/// sample for `metric` crosses `value` in `direction` relative to the
/// previous sample (edge-triggered, so a metric parked above the threshold
/// doesn't re-fire on every subsequent sample).
#[derive(Clone, Debug)]
pub struct AlertRule {
    pub metric: String,
    pub value: f64,
    pub direction: AlertDirection,
}

/// Configuration for [`crate::Monitor`].
#[derive(Clone, Debug)]
pub struct MonitorConfig {
    /// How long a metric sample remains eligible for aggregation.
    pub retention_ms: u64,
    /// Bound on samples retained per metric name, independent of age.
    pub max_samples_per_metric: usize,
    pub alerts: Vec<AlertRule>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            retention_ms: DEFAULT_METRIC_RETENTION_MS,
            max_samples_per_metric: 10_000,
            alerts: Vec::new(),
        }
    }
}
