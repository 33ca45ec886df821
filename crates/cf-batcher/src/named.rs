use crate::config::NamedBatcherConfig;
use crate::item::QueuedItem;
use crate::stats::BatcherStats;
use crate::stats::Counters;
use cf_core::Clock;
use cf_core::CoreError;
use cf_core::Event;
use cf_core::EventBus;
use cf_core::SystemClock;
use cf_monitor::Monitor;
use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::Mutex;
use uuid::Uuid;

type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;
type Processor<P, R> = Arc<dyn Fn(Vec<P>) -> BoxFuture<Vec<Result<R, CoreError>>> + Send + Sync>;

struct State<P, R> {
    queue: VecDeque<QueuedItem<P, R>>,
    counters: Counters,
}

/// Groups requests for one named operation into batches, flushed at
/// `max_batch_size` or `max_latency_ms`, whichever comes first. Ordering
/// within a flushed batch is stable by priority then arrival.
pub struct NamedBatcher<P, R> {
    name: String,
    config: NamedBatcherConfig,
    clock: Arc<dyn Clock>,
    state: Mutex<State<P, R>>,
    processor: Processor<P, R>,
    monitor: Option<Arc<Monitor>>,
    events: Option<Arc<EventBus>>,
    paused: std::sync::atomic::AtomicBool,
}

impl<P, R> NamedBatcher<P, R>
where
    P: Send + 'static,
    R: Send + 'static,
{
    pub fn new<F, Fut>(name: impl Into<String>, config: NamedBatcherConfig, processor: F) -> Arc<Self>
    where
        F: Fn(Vec<P>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Vec<Result<R, CoreError>>> + Send + 'static,
    {
        Self::build(name.into(), config, Arc::new(SystemClock), Arc::new(move |items| Box::pin(processor(items)) as BoxFuture<_>), None, None)
    }

    pub fn with_observability<F, Fut>(
        name: impl Into<String>,
        config: NamedBatcherConfig,
        processor: F,
        monitor: Arc<Monitor>,
        events: Arc<EventBus>,
    ) -> Arc<Self>
    where
        F: Fn(Vec<P>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Vec<Result<R, CoreError>>> + Send + 'static,
    {
        Self::build(
            name.into(),
            config,
            Arc::new(SystemClock),
            Arc::new(move |items| Box::pin(processor(items)) as BoxFuture<_>),
            Some(monitor),
            Some(events),
        )
    }

    fn build(
        name: String,
        config: NamedBatcherConfig,
        clock: Arc<dyn Clock>,
        processor: Processor<P, R>,
        monitor: Option<Arc<Monitor>>,
        events: Option<Arc<EventBus>>,
    ) -> Arc<Self> {
        let batcher = Arc::new(Self {
            name,
            config,
            clock,
            state: Mutex::new(State { queue: VecDeque::new(), counters: Counters::default() }),
            processor,
            monitor,
            events,
            paused: std::sync::atomic::AtomicBool::new(false),
        });
        batcher.clone().spawn_latency_flusher();
        batcher
    }

    fn spawn_latency_flusher(self: Arc<Self>) {
        let tick_ms = (self.config.max_latency_ms / 4).max(1);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(std::time::Duration::from_millis(tick_ms));
            loop {
                interval.tick().await;
                if Arc::strong_count(&self) == 1 {
                    return;
                }
                self.flush_if_aged().await;
            }
        });
    }

    pub fn pause(&self) {
        self.paused.store(true, std::sync::atomic::Ordering::SeqCst);
    }

    pub fn resume(&self) {
        self.paused.store(false, std::sync::atomic::Ordering::SeqCst);
    }

    fn publish(&self, event: Event) {
        if let Some(bus) = &self.events {
            bus.publish(event);
        }
    }

    /// Enqueues `payload`; always admitted. On overflow the current
    /// lowest-priority pending item is evicted (its waiter fails with
    /// `QueueFull`) to make room.
    pub async fn enqueue(&self, payload: P, priority: u8) -> Result<R, CoreError> {
        let (tx, rx) = tokio::sync::oneshot::channel();
        let id = Uuid::now_v7();
        let queued_at_ms = self.clock.now_millis();
        let item = QueuedItem { id, payload, priority, queued_at_ms, responder: tx };

        let should_flush_now = {
            let mut state = self.state.lock().expect("batcher state lock poisoned");
            if state.queue.len() >= self.config.max_queue_size {
                if let Some(idx) = lowest_priority_index(&state.queue) {
                    if let Some(evicted) = state.queue.remove(idx) {
                        evicted.fail(CoreError::QueueFull);
                    }
                }
            }
            state.queue.push_back(item);
            self.publish(Event::BatcherEnqueue { name: self.name.clone(), queue_len: state.queue.len() });
            state.queue.len() >= self.config.max_batch_size
        };

        if should_flush_now && !self.paused.load(std::sync::atomic::Ordering::SeqCst) {
            self.flush().await;
        }

        rx.await.unwrap_or(Err(CoreError::internal("batcher dropped the waiter without a response")))
    }

    async fn flush_if_aged(&self) {
        if self.paused.load(std::sync::atomic::Ordering::SeqCst) {
            return;
        }
        let now = self.clock.now_millis();
        let aged = {
            let state = self.state.lock().expect("batcher state lock poisoned");
            state.queue.front().map(|item| now - item.queued_at_ms >= self.config.max_latency_ms as i64).unwrap_or(false)
        };
        if aged {
            self.flush().await;
        }
    }

    async fn flush(&self) {
        let batch: Vec<QueuedItem<P, R>> = {
            let mut state = self.state.lock().expect("batcher state lock poisoned");
            if state.queue.is_empty() {
                return;
            }
            let mut items: Vec<QueuedItem<P, R>> = state.queue.drain(..).collect();
            items.sort_by(|a, b| b.priority.cmp(&a.priority).then(a.queued_at_ms.cmp(&b.queued_at_ms)));
            items
        };

        let started = self.clock.now_millis();
        let (ids, payloads, responders): (Vec<Uuid>, Vec<P>, Vec<_>) = {
            let mut ids = Vec::with_capacity(batch.len());
            let mut payloads = Vec::with_capacity(batch.len());
            let mut responders = Vec::with_capacity(batch.len());
            for item in batch {
                ids.push(item.id);
                payloads.push(item.payload);
                responders.push(item.responder);
            }
            (ids, payloads, responders)
        };
        let batch_size = payloads.len();
        let results = (self.processor)(payloads).await;
        let millis = (self.clock.now_millis() - started).max(0) as u64;

        let mut succeeded = 0usize;
        let mut failed = 0usize;
        for (responder, result) in responders.into_iter().zip(results.into_iter().chain(std::iter::repeat_with(|| {
            Err(CoreError::internal("batch processor returned fewer results than items"))
        }))) {
            match &result {
                Ok(_) => succeeded += 1,
                Err(_) => failed += 1,
            }
            let _ = responder.send(result);
        }
        let _ = ids;

        let mut state = self.state.lock().expect("batcher state lock poisoned");
        state.counters.record_batch(batch_size, succeeded, failed, millis);
        drop(state);

        self.publish(Event::BatcherProcessed { name: self.name.clone(), batch_size, millis });
        if let Some(monitor) = &self.monitor {
            monitor.record_metric(
                "batcher.batch_size",
                batch_size as f64,
                "count",
                vec![("name".to_string(), self.name.clone())],
            );
        }
    }

    pub fn stats(&self) -> BatcherStats {
        let state = self.state.lock().expect("batcher state lock poisoned");
        state.counters.snapshot(state.queue.len(), 0, self.config.max_queue_size)
    }
}

fn lowest_priority_index<P, R>(queue: &VecDeque<QueuedItem<P, R>>) -> Option<usize> {
    queue
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| a.priority.cmp(&b.priority).then(b.queued_at_ms.cmp(&a.queued_at_ms)))
        .map(|(idx, _)| idx)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn flushes_at_max_batch_size() {
        let config = NamedBatcherConfig { max_batch_size: 2, max_latency_ms: 10_000, max_queue_size: 10 };
        let batcher = NamedBatcher::new("ai-compute", config, |items: Vec<i32>| async move {
            items.into_iter().map(|i| Ok(i * 2)).collect()
        });
        let a = batcher.enqueue(1, 5);
        let b = batcher.enqueue(2, 5);
        let (ra, rb) = tokio::join!(a, b);
        assert_eq!(ra.unwrap(), 2);
        assert_eq!(rb.unwrap(), 4);
    }

    #[tokio::test]
    async fn flushes_after_max_latency_even_below_batch_size() {
        let config = NamedBatcherConfig { max_batch_size: 100, max_latency_ms: 20, max_queue_size: 10 };
        let batcher = NamedBatcher::new("ai-compute", config, |items: Vec<i32>| async move {
            items.into_iter().map(Ok).collect()
        });
        let result = tokio::time::timeout(std::time::Duration::from_millis(500), batcher.enqueue(7, 5)).await;
        assert_eq!(result.unwrap().unwrap(), 7);
    }

    #[tokio::test]
    async fn overflow_evicts_lowest_priority_pending_item() {
        let config = NamedBatcherConfig { max_batch_size: 100, max_latency_ms: 20, max_queue_size: 2 };
        let batcher = NamedBatcher::new("ai-compute", config, |items: Vec<i32>| async move {
            items.into_iter().map(Ok).collect()
        });
        let low = tokio::spawn({
            let batcher = batcher.clone();
            async move { batcher.enqueue(1, 1).await }
        });
        tokio::time::sleep(std::time::Duration::from_millis(1)).await;
        let high_a = tokio::spawn({
            let batcher = batcher.clone();
            async move { batcher.enqueue(2, 9).await }
        });
        tokio::time::sleep(std::time::Duration::from_millis(1)).await;
        let high_b = tokio::spawn({
            let batcher = batcher.clone();
            async move { batcher.enqueue(3, 9).await }
        });

        let low_result = low.await.unwrap();
        assert!(matches!(low_result, Err(CoreError::QueueFull)));
        assert_eq!(high_a.await.unwrap().unwrap(), 2);
        assert_eq!(high_b.await.unwrap().unwrap(), 3);
    }
}
