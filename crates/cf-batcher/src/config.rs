#[derive(Clone, Debug)]
pub struct NamedBatcherConfig {
    pub max_batch_size: usize,
    pub max_latency_ms: u64,
    pub max_queue_size: usize,
}

impl Default for NamedBatcherConfig {
    fn default() -> Self {
        Self { max_batch_size: 16, max_latency_ms: 20, max_queue_size: 512 }
    }
}

#[derive(Clone, Debug)]
pub struct PriorityQueueConfig {
    pub concurrency: usize,
    pub max_queue_size: usize,
    pub per_item_timeout_ms: u64,
    pub starvation_threshold_ms: u64,
}

impl Default for PriorityQueueConfig {
    fn default() -> Self {
        Self {
            concurrency: 4,
            max_queue_size: 1_000,
            per_item_timeout_ms: cf_core::DEFAULT_QUEUE_ITEM_TIMEOUT_MS,
            starvation_threshold_ms: cf_core::DEFAULT_STARVATION_THRESHOLD_MS,
        }
    }
}
