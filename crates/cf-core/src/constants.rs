/// Default bounded-retention window for performance monitor ring buffers.
pub const DEFAULT_METRIC_RETENTION_MS: u64 = 30 * 60 * 1_000;
/// Default starvation promotion threshold for the priority queue.
pub const DEFAULT_STARVATION_THRESHOLD_MS: u64 = 10_000;
/// Default per-item timeout for the priority queue.
pub const DEFAULT_QUEUE_ITEM_TIMEOUT_MS: u64 = 30_000;
/// Default dispatcher tick rate for the precomputation engine (~10 Hz).
pub const PRECOMPUTE_DISPATCH_INTERVAL_MS: u64 = 100;
/// Default precompute job queue capacity.
pub const PRECOMPUTE_QUEUE_CAP: usize = 1_000;
/// Default precompute concurrency cap.
pub const PRECOMPUTE_MAX_CONCURRENT: usize = 3;
/// Default precompute dispatch batch size.
pub const PRECOMPUTE_BATCH_SIZE: usize = 10;
/// TTL applied to cache entries written by the precomputation engine.
pub const PRECOMPUTE_CACHE_TTL_MS: u64 = 60 * 60 * 1_000;
/// Priority assigned to the canonical-opening warmup jobs.
pub const WARMUP_OPENING_PRIORITY: f32 = 8.0;
/// Priority assigned to the endgame-pattern warmup jobs.
pub const WARMUP_ENDGAME_PRIORITY: f32 = 6.0;
/// Half-open probes required to close a tripped circuit breaker.
pub const DEFAULT_HALF_OPEN_SUCCESSES: u32 = 3;
