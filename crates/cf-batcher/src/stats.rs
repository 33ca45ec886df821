#[derive(Clone, Copy, Debug, Default)]
pub struct BatcherStats {
    pub pending: usize,
    pub in_flight: usize,
    pub processed: u64,
    pub failed: u64,
    pub avg_batch_size: f64,
    pub avg_processing_ms: f64,
    pub queue_utilisation: f64,
}

#[derive(Default)]
pub(crate) struct Counters {
    pub(crate) processed: u64,
    pub(crate) failed: u64,
    pub(crate) batch_count: u64,
    pub(crate) batch_size_total: u64,
    pub(crate) processing_ms_total: u64,
}

impl Counters {
    pub(crate) fn record_batch(&mut self, size: usize, succeeded: usize, failed: usize, millis: u64) {
        self.batch_count += 1;
        self.batch_size_total += size as u64;
        self.processing_ms_total += millis;
        self.processed += succeeded as u64;
        self.failed += failed as u64;
    }

    pub(crate) fn snapshot(&self, pending: usize, in_flight: usize, max_queue_size: usize) -> BatcherStats {
        BatcherStats {
            pending,
            in_flight,
            processed: self.processed,
            failed: self.failed,
            avg_batch_size: if self.batch_count == 0 { 0.0 } else { self.batch_size_total as f64 / self.batch_count as f64 },
            avg_processing_ms: if self.batch_count == 0 { 0.0 } else { self.processing_ms_total as f64 / self.batch_count as f64 },
            queue_utilisation: if max_queue_size == 0 { 0.0 } else { pending as f64 / max_queue_size as f64 },
        }
    }
}
