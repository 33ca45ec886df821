use crate::config::PriorityQueueConfig;
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
use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::sync::Mutex;
use uuid::Uuid;

type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;
type Processor<P, R> = Arc<dyn Fn(P) -> BoxFuture<Result<R, CoreError>> + Send + Sync>;

struct State<P, R> {
    queue: VecDeque<QueuedItem<P, R>>,
    counters: Counters,
}

/// Concurrency-bounded executor with per-item timeout and starvation
/// promotion. Selection rule: strictly highest priority,
/// except that any item waiting longer than `starvation_threshold_ms` is
/// promoted to be eligible ahead of strictly-lower-priority items regardless
/// of its own priority value.
pub struct PriorityQueue<P, R> {
    name: String,
    config: PriorityQueueConfig,
    clock: Arc<dyn Clock>,
    state: Mutex<State<P, R>>,
    processor: Processor<P, R>,
    in_flight: AtomicUsize,
    paused: AtomicBool,
    monitor: Option<Arc<Monitor>>,
    events: Option<Arc<EventBus>>,
    weak_self: std::sync::OnceLock<std::sync::Weak<Self>>,
}

impl<P, R> PriorityQueue<P, R>
where
    P: Send + 'static,
    R: Send + 'static,
{
    pub fn new<F, Fut>(name: impl Into<String>, config: PriorityQueueConfig, processor: F) -> Arc<Self>
    where
        F: Fn(P) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, CoreError>> + Send + 'static,
    {
        Self::build(name.into(), config, Arc::new(SystemClock), Arc::new(move |p| Box::pin(processor(p)) as BoxFuture<_>), None, None)
    }

    pub fn with_observability<F, Fut>(
        name: impl Into<String>,
        config: PriorityQueueConfig,
        processor: F,
        monitor: Arc<Monitor>,
        events: Arc<EventBus>,
    ) -> Arc<Self>
    where
        F: Fn(P) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, CoreError>> + Send + 'static,
    {
        Self::build(
            name.into(),
            config,
            Arc::new(SystemClock),
            Arc::new(move |p| Box::pin(processor(p)) as BoxFuture<_>),
            Some(monitor),
            Some(events),
        )
    }

    fn build(
        name: String,
        config: PriorityQueueConfig,
        clock: Arc<dyn Clock>,
        processor: Processor<P, R>,
        monitor: Option<Arc<Monitor>>,
        events: Option<Arc<EventBus>>,
    ) -> Arc<Self> {
        let queue = Arc::new(Self {
            name,
            config,
            clock,
            state: Mutex::new(State { queue: VecDeque::new(), counters: Counters::default() }),
            processor,
            in_flight: AtomicUsize::new(0),
            paused: AtomicBool::new(false),
            monitor,
            events,
            weak_self: std::sync::OnceLock::new(),
        });
        let _ = queue.weak_self.set(Arc::downgrade(&queue));
        queue.clone().spawn_dispatcher();
        queue
    }

    fn spawn_dispatcher(self: Arc<Self>) {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(std::time::Duration::from_millis(cf_core::PRECOMPUTE_DISPATCH_INTERVAL_MS));
            loop {
                interval.tick().await;
                if Arc::strong_count(&self) == 1 {
                    return;
                }
                self.dispatch_ready();
            }
        });
    }

    pub fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
    }

    pub fn resume(&self) {
        self.paused.store(false, Ordering::SeqCst);
        self.dispatch_ready();
    }

    /// Re-acquires an owning `Arc<Self>` for tasks that need to outlive the
    /// current call (the struct is always constructed behind an `Arc`).
    fn arc_self(&self) -> Option<Arc<Self>> {
        self.weak_self.get().and_then(std::sync::Weak::upgrade)
    }

    fn publish(&self, event: Event) {
        if let Some(bus) = &self.events {
            bus.publish(event);
        }
    }

    /// Enqueues `payload`. On overflow, evicts the current lowest-priority
    /// pending item only if `priority` exceeds it; otherwise the incoming
    /// item itself is rejected with `QueueFull`.
    pub async fn enqueue(&self, payload: P, priority: u8) -> Result<R, CoreError> {
        let (tx, rx) = tokio::sync::oneshot::channel();
        let id = Uuid::now_v7();
        let queued_at_ms = self.clock.now_millis();
        let item = QueuedItem { id, payload, priority, queued_at_ms, responder: tx };

        let rejected = {
            let mut state = self.state.lock().expect("priority queue state lock poisoned");
            if state.queue.len() >= self.config.max_queue_size {
                match lowest_priority_index(&state.queue) {
                    Some(idx) if state.queue[idx].priority < priority => {
                        if let Some(evicted) = state.queue.remove(idx) {
                            evicted.fail(CoreError::QueueFull);
                        }
                        state.queue.push_back(item);
                        None
                    }
                    _ => Some(item),
                }
            } else {
                state.queue.push_back(item);
                None
            }
        };

        if let Some(rejected) = rejected {
            rejected.fail(CoreError::QueueFull);
            return rx.await.unwrap_or(Err(CoreError::QueueFull));
        }

        self.publish(Event::QueueEnqueue { priority, queue_len: self.pending() });
        self.dispatch_ready();
        rx.await.unwrap_or(Err(CoreError::internal("priority queue dropped the waiter without a response")))
    }

    fn pending(&self) -> usize {
        self.state.lock().expect("priority queue state lock poisoned").queue.len()
    }

    /// Pulls and starts as many eligible items as available concurrency
    /// permits. Selection: strictly highest priority, except items waiting
    /// past `starvation_threshold_ms` are promoted ahead of strictly lower
    /// priority items.
    fn dispatch_ready(&self) {
        if self.paused.load(Ordering::SeqCst) {
            return;
        }
        let Some(this_arc) = self.arc_self() else { return };
        loop {
            if self.in_flight.load(Ordering::SeqCst) >= self.config.concurrency {
                return;
            }
            let now = self.clock.now_millis();
            let item = {
                let mut state = self.state.lock().expect("priority queue state lock poisoned");
                match next_eligible_index(&state.queue, now, self.config.starvation_threshold_ms) {
                    Some(idx) => state.queue.remove(idx),
                    None => None,
                }
            };
            let Some(item) = item else { return };

            self.in_flight.fetch_add(1, Ordering::SeqCst);
            let wait_ms = (now - item.queued_at_ms).max(0) as u64;
            self.publish(Event::QueueProcessed { priority: item.priority, wait_millis: wait_ms });

            let this = this_arc.clone();
            tokio::spawn(async move {
                let timeout = std::time::Duration::from_millis(this.config.per_item_timeout_ms);
                let outcome = tokio::time::timeout(timeout, (this.processor)(item.payload)).await;
                let result = match outcome {
                    Ok(result) => result,
                    Err(_) => Err(CoreError::DeadlineExceeded),
                };
                let succeeded = result.is_ok();
                let _ = item.responder.send(result);
                let millis = (this.clock.now_millis() - item.queued_at_ms).max(0) as u64;
                let mut state = this.state.lock().expect("priority queue state lock poisoned");
                state.counters.record_batch(1, succeeded as usize, (!succeeded) as usize, millis);
                drop(state);
                this.in_flight.fetch_sub(1, Ordering::SeqCst);
                this.dispatch_ready();
            });
        }
    }

    pub fn stats(&self) -> BatcherStats {
        let state = self.state.lock().expect("priority queue state lock poisoned");
        let pending = state.queue.len();
        let mut stats = state.counters.snapshot(pending, self.in_flight.load(Ordering::SeqCst), self.config.max_queue_size);
        stats.in_flight = self.in_flight.load(Ordering::SeqCst);
        stats
    }
}

fn lowest_priority_index<P, R>(queue: &VecDeque<QueuedItem<P, R>>) -> Option<usize> {
    queue.iter().enumerate().min_by_key(|(_, item)| item.priority).map(|(idx, _)| idx)
}

/// Highest priority first; an item waiting longer than the starvation
/// threshold is treated as eligible ahead of any strictly lower-priority
/// item that hasn't starved.
fn next_eligible_index<P, R>(queue: &VecDeque<QueuedItem<P, R>>, now_ms: i64, starvation_threshold_ms: u64) -> Option<usize> {
    if queue.is_empty() {
        return None;
    }
    let starved_idx = queue
        .iter()
        .enumerate()
        .filter(|(_, item)| now_ms - item.queued_at_ms >= starvation_threshold_ms as i64)
        .max_by_key(|(_, item)| item.priority)
        .map(|(idx, _)| idx);
    if let Some(idx) = starved_idx {
        return Some(idx);
    }
    queue.iter().enumerate().max_by_key(|(_, item)| item.priority).map(|(idx, _)| idx)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn higher_priority_runs_before_lower_priority_among_queued_items() {
        let config = PriorityQueueConfig { concurrency: 1, max_queue_size: 10, per_item_timeout_ms: 1_000, starvation_threshold_ms: 10_000 };
        let order = Arc::new(Mutex::new(Vec::new()));
        let order_clone = order.clone();
        let queue = PriorityQueue::new("probe", config, move |payload: i32| {
            let order = order_clone.clone();
            async move {
                tokio::time::sleep(std::time::Duration::from_millis(30)).await;
                if payload != 0 {
                    order.lock().unwrap().push(payload);
                }
                Ok::<i32, CoreError>(payload)
            }
        });

        // Occupies the single concurrency slot so items 1 and 2 queue up behind it.
        let blocker = tokio::spawn({
            let queue = queue.clone();
            async move { queue.enqueue(0, 5).await }
        });
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let low = tokio::spawn({
            let queue = queue.clone();
            async move { queue.enqueue(1, 1).await }
        });
        tokio::time::sleep(std::time::Duration::from_millis(1)).await;
        let high = tokio::spawn({
            let queue = queue.clone();
            async move { queue.enqueue(2, 9).await }
        });

        blocker.await.unwrap().unwrap();
        low.await.unwrap().unwrap();
        high.await.unwrap().unwrap();
        assert_eq!(*order.lock().unwrap(), vec![2, 1]);
    }

    #[tokio::test]
    async fn per_item_timeout_fails_with_deadline_exceeded() {
        let config = PriorityQueueConfig { concurrency: 1, max_queue_size: 10, per_item_timeout_ms: 5, starvation_threshold_ms: 10_000 };
        let queue = PriorityQueue::new("probe", config, |_: i32| async {
            tokio::time::sleep(std::time::Duration::from_millis(100)).await;
            Ok::<i32, CoreError>(1)
        });
        let result = queue.enqueue(1, 5).await;
        assert!(matches!(result, Err(CoreError::DeadlineExceeded)));
    }

    #[tokio::test]
    async fn overflow_rejects_incoming_when_not_higher_priority() {
        let config = PriorityQueueConfig { concurrency: 0, max_queue_size: 1, per_item_timeout_ms: 1_000, starvation_threshold_ms: 10_000 };
        let queue = PriorityQueue::new("probe", config, |p: i32| async move { Ok::<i32, CoreError>(p) });
        let first = queue.enqueue(1, 5);
        tokio::time::sleep(std::time::Duration::from_millis(1)).await;
        let second = queue.enqueue(2, 5);
        let result = second.await;
        assert!(matches!(result, Err(CoreError::QueueFull)));
        drop(first);
    }
}
