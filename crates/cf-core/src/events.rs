use crate::board::Fingerprint;
use crate::error::ErrorKind;
use crate::request::StrategyTag;
use std::fmt;

/// The core's fixed event taxonomy. Handlers are optional;
/// nothing in the core blocks on a subscriber being present or fast.
#[derive(Clone, Debug)]
pub enum Event {
    StrategySelected {
        strategy: StrategyTag,
        fallback: StrategyTag,
        confidence: f32,
    },
    CacheHit {
        namespace: String,
        key: String,
    },
    CacheMiss {
        namespace: String,
        key: String,
    },
    CacheEvicted {
        namespace: String,
        key: String,
        reason: &'static str,
    },
    CircuitStateChange {
        operation: String,
        from: &'static str,
        to: &'static str,
    },
    CircuitRejected {
        operation: String,
    },
    RetryAttempt {
        operation: String,
        attempt: u32,
        delay_ms: u64,
    },
    BatcherEnqueue {
        name: String,
        queue_len: usize,
    },
    BatcherProcessed {
        name: String,
        batch_size: usize,
        millis: u64,
    },
    BatcherError {
        name: String,
        message: String,
    },
    QueueEnqueue {
        priority: u8,
        queue_len: usize,
    },
    QueueProcessed {
        priority: u8,
        wait_millis: u64,
    },
    PrecomputeScheduled {
        fingerprint: Fingerprint,
        priority: f32,
    },
    PrecomputeCompleted {
        fingerprint: Fingerprint,
        millis: u64,
    },
    PerformanceAlert {
        metric: String,
        value: f64,
        threshold: f64,
    },
    RequestFailed {
        kind: ErrorKind,
        correlation_id: uuid::Uuid,
    },
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Event::StrategySelected { strategy, fallback, confidence } => {
                write!(f, "strategy.selected {strategy} (fallback {fallback}, confidence {confidence:.2})")
            }
            Event::CacheHit { namespace, key } => write!(f, "cache.hit {namespace}/{key}"),
            Event::CacheMiss { namespace, key } => write!(f, "cache.miss {namespace}/{key}"),
            Event::CacheEvicted { namespace, key, reason } => {
                write!(f, "cache.evicted {namespace}/{key} ({reason})")
            }
            Event::CircuitStateChange { operation, from, to } => {
                write!(f, "circuit.stateChange {operation} {from} -> {to}")
            }
            Event::CircuitRejected { operation } => write!(f, "circuit.rejected {operation}"),
            Event::RetryAttempt { operation, attempt, delay_ms } => {
                write!(f, "retry.attempt {operation} #{attempt} in {delay_ms}ms")
            }
            Event::BatcherEnqueue { name, queue_len } => {
                write!(f, "batcher.enqueue {name} (len {queue_len})")
            }
            Event::BatcherProcessed { name, batch_size, millis } => {
                write!(f, "batcher.processed {name} batch={batch_size} {millis}ms")
            }
            Event::BatcherError { name, message } => write!(f, "batcher.error {name}: {message}"),
            Event::QueueEnqueue { priority, queue_len } => {
                write!(f, "queue.enqueue priority={priority} (len {queue_len})")
            }
            Event::QueueProcessed { priority, wait_millis } => {
                write!(f, "queue.processed priority={priority} waited {wait_millis}ms")
            }
            Event::PrecomputeScheduled { fingerprint, priority } => {
                write!(f, "precompute.scheduled {fingerprint} priority={priority:.2}")
            }
            Event::PrecomputeCompleted { fingerprint, millis } => {
                write!(f, "precompute.completed {fingerprint} {millis}ms")
            }
            Event::PerformanceAlert { metric, value, threshold } => {
                write!(f, "performance.alert {metric}={value} crossed {threshold}")
            }
            Event::RequestFailed { kind, correlation_id } => {
                write!(f, "request.failed {kind:?} ({correlation_id})")
            }
        }
    }
}

/// Typed fan-out channel for [`Event`]. Subscribers that fall behind just
/// miss older events (`tokio::sync::broadcast`'s lag semantics); nothing in
/// the core depends on a subscriber seeing every event.
#[derive(Clone)]
pub struct EventBus {
    sender: tokio::sync::broadcast::Sender<Event>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = tokio::sync::broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<Event> {
        self.sender.subscribe()
    }

    /// Publish an event. Never blocks; if there are no subscribers the
    /// event is simply dropped.
    pub fn publish(&self, event: Event) {
        let _ = self.sender.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscriber_receives_published_event() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();
        bus.publish(Event::CacheHit {
            namespace: "ai-move".into(),
            key: "abc".into(),
        });
        let event = rx.recv().await.unwrap();
        assert!(matches!(event, Event::CacheHit { .. }));
    }

    #[test]
    fn publish_without_subscribers_does_not_panic() {
        let bus = EventBus::default();
        bus.publish(Event::QueueEnqueue { priority: 5, queue_len: 1 });
    }
}
