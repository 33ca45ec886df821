/// Top-level feature toggles and defaults for [`crate::Engine`].
#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Deadline applied to a request that doesn't supply its own.
    pub default_time_limit_ms: u64,
    pub enable_cache: bool,
    pub enable_breaker: bool,
    pub enable_batching: bool,
    pub enable_precompute: bool,
    pub enable_monitor: bool,
    /// Lookahead passed to `predictAndPrecompute` after serving a request.
    pub precompute_lookahead: u8,
    pub emergency: EmergencyConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_time_limit_ms: cf_core::DEFAULT_TIME_LIMIT_MS,
            enable_cache: true,
            enable_breaker: true,
            enable_batching: true,
            enable_precompute: true,
            enable_monitor: true,
            precompute_lookahead: 2,
            emergency: EmergencyConfig::default(),
        }
    }
}

/// Thresholds governing emergency mode.
#[derive(Clone, Copy, Debug)]
pub struct EmergencyConfig {
    pub cpu_user_ms_critical: u64,
    pub resident_memory_bytes_critical: u64,
    /// Requests with priority strictly below this are rejected while
    /// emergency mode is active.
    pub min_priority_during_emergency: u8,
}

impl Default for EmergencyConfig {
    fn default() -> Self {
        Self {
            cpu_user_ms_critical: 60_000,
            resident_memory_bytes_critical: 512 * 1024 * 1024,
            min_priority_during_emergency: 7,
        }
    }
}
