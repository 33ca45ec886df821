use std::collections::HashMap;

/// Per-operation override of [`BreakerConfig`]'s defaults.
#[derive(Clone, Debug, Default)]
pub struct OperationOverride {
    pub failure_threshold: Option<u32>,
    pub open_duration_ms: Option<u64>,
    pub half_open_permits: Option<u32>,
}

#[derive(Clone, Copy, Debug)]
pub(crate) struct ResolvedBreakerLimits {
    pub failure_threshold: u32,
    pub open_duration_ms: u64,
    pub half_open_permits: u32,
}

#[derive(Clone, Debug)]
pub struct BreakerConfig {
    /// Consecutive failures (while CLOSED) before the breaker trips OPEN.
    pub failure_threshold: u32,
    /// How long OPEN lasts before the next call is admitted as a HALF_OPEN probe.
    pub open_duration_ms: u64,
    /// K: both the number of concurrent HALF_OPEN probes admitted and the
    /// number of consecutive HALF_OPEN successes required to close.
    pub half_open_permits: u32,
    /// Bound on the rolling response-time sample retained per operation.
    pub response_time_window: usize,
    pub overrides: HashMap<String, OperationOverride>,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            open_duration_ms: 30_000,
            half_open_permits: 3,
            response_time_window: 100,
            overrides: HashMap::new(),
        }
    }
}

impl BreakerConfig {
    pub(crate) fn limits_for(&self, operation: &str) -> ResolvedBreakerLimits {
        let over = self.overrides.get(operation);
        ResolvedBreakerLimits {
            failure_threshold: over.and_then(|o| o.failure_threshold).unwrap_or(self.failure_threshold),
            open_duration_ms: over.and_then(|o| o.open_duration_ms).unwrap_or(self.open_duration_ms),
            half_open_permits: over.and_then(|o| o.half_open_permits).unwrap_or(self.half_open_permits),
        }
    }
}

/// Exponential backoff with optional jitter.
#[derive(Clone, Debug)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub factor: f64,
    pub max_delay_ms: u64,
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self { max_attempts: 3, base_delay_ms: 100, factor: 2.0, max_delay_ms: 5_000, jitter: true }
    }
}
