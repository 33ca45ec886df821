/// Configuration for the precomputation engine.
#[derive(Clone, Debug)]
pub struct PrecomputeConfig {
    /// Bounded job queue capacity; lowest-priority job dropped on overflow.
    pub queue_cap: usize,
    /// Maximum concurrently-executing jobs.
    pub max_concurrent: usize,
    /// Maximum jobs pulled off the queue in one dispatcher tick.
    pub batch_size: usize,
    /// Dispatcher tick rate (~10 Hz by default).
    pub dispatch_interval_ms: u64,
    /// TTL applied to cache entries written by executed jobs.
    pub cache_ttl_ms: u64,
    /// Deadline budget given to the `ComputeMove` call backing each job.
    pub compute_deadline_ms: i64,
    /// Lookahead depth `predictAndPrecompute` uses when the caller doesn't
    /// specify one.
    pub default_lookahead: u8,
}

impl Default for PrecomputeConfig {
    fn default() -> Self {
        Self {
            queue_cap: cf_core::PRECOMPUTE_QUEUE_CAP,
            max_concurrent: cf_core::PRECOMPUTE_MAX_CONCURRENT,
            batch_size: cf_core::PRECOMPUTE_BATCH_SIZE,
            dispatch_interval_ms: cf_core::PRECOMPUTE_DISPATCH_INTERVAL_MS,
            cache_ttl_ms: cf_core::PRECOMPUTE_CACHE_TTL_MS,
            compute_deadline_ms: cf_core::DEFAULT_TIME_LIMIT_MS as i64,
            default_lookahead: 2,
        }
    }
}

/// Namespace the engine writes predicted positions into.
pub const PRECOMPUTE_NAMESPACE: &str = "precompute";
