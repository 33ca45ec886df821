//! Request batching and queueing: a named batcher that groups
//! same-operation requests into flushes bounded by size or age, and a
//! priority queue that dispatches individual items under a concurrency cap
//! with per-item timeouts and starvation promotion.

mod config;
mod item;
mod named;
mod priority;
mod stats;

pub use config::NamedBatcherConfig;
pub use config::PriorityQueueConfig;
pub use named::NamedBatcher;
pub use priority::PriorityQueue;
pub use stats::BatcherStats;
