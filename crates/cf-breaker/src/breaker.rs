use crate::config::BreakerConfig;
use crate::record::CircuitRecord;
use crate::record::CircuitState;
use cf_core::Clock;
use cf_core::CoreError;
use cf_core::Event;
use cf_core::EventBus;
use cf_core::SystemClock;
use cf_monitor::Monitor;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::sync::Mutex;

#[derive(Clone, Copy, Debug)]
pub struct BreakerSnapshot {
    pub state: CircuitState,
    pub consecutive_failures: u32,
    pub next_attempt_at_ms: i64,
}

/// Failure containment per named operation. One
/// [`CircuitRecord`] per operation, guarded by its own mutex so unrelated
/// operations never contend on the same lock.
pub struct CircuitBreaker {
    config: BreakerConfig,
    clock: Arc<dyn Clock>,
    records: Mutex<HashMap<String, Arc<Mutex<CircuitRecord>>>>,
    monitor: Option<Arc<Monitor>>,
    events: Option<Arc<EventBus>>,
}

impl CircuitBreaker {
    pub fn new(config: BreakerConfig) -> Self {
        Self::build(config, Arc::new(SystemClock), None, None)
    }

    pub fn with_observability(config: BreakerConfig, monitor: Arc<Monitor>, events: Arc<EventBus>) -> Self {
        Self::build(config, Arc::new(SystemClock), Some(monitor), Some(events))
    }

    pub fn with_clock(config: BreakerConfig, clock: Arc<dyn Clock>) -> Self {
        Self::build(config, clock, None, None)
    }

    fn build(config: BreakerConfig, clock: Arc<dyn Clock>, monitor: Option<Arc<Monitor>>, events: Option<Arc<EventBus>>) -> Self {
        Self { config, clock, records: Mutex::new(HashMap::new()), monitor, events }
    }

    fn record_for(&self, operation: &str) -> Arc<Mutex<CircuitRecord>> {
        self.records
            .lock()
            .expect("breaker record table lock poisoned")
            .entry(operation.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(CircuitRecord::default())))
            .clone()
    }

    fn publish(&self, event: Event) {
        if let Some(bus) = &self.events {
            bus.publish(event);
        }
    }

    fn emit_metric(&self, name: &'static str, value: f64, tags: Vec<(String, String)>) {
        if let Some(monitor) = &self.monitor {
            monitor.record_metric(name, value, "count", tags);
        }
    }

    pub fn snapshot(&self, operation: &str) -> BreakerSnapshot {
        let record = self.record_for(operation);
        let record = record.lock().expect("circuit record lock poisoned");
        BreakerSnapshot {
            state: record.state,
            consecutive_failures: record.consecutive_failures,
            next_attempt_at_ms: record.next_attempt_at_ms,
        }
    }

    /// Resets `operation` back to CLOSED with no failure history. For
    /// operator intervention and tests; the core never calls this itself.
    pub fn reset(&self, operation: &str) {
        let record = self.record_for(operation);
        *record.lock().expect("circuit record lock poisoned") = CircuitRecord::default();
    }

    /// Runs `f` through the breaker for `operation`. When OPEN, runs
    /// `fallback` if provided (not counted in breaker stats) or returns
    /// `CircuitOpen`. `f`'s error only counts toward the breaker if
    /// [`CoreError::counts_toward_breaker`] says so; other errors pass
    /// through without affecting breaker state.
    pub async fn call<T, F, Fut, Fb>(&self, operation: &str, fallback: Option<Fb>, f: F) -> Result<T, CoreError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, CoreError>>,
        Fb: FnOnce() -> T,
    {
        let limits = self.config.limits_for(operation);
        let now = self.clock.now_millis();
        let record = self.record_for(operation);

        let admitted = {
            let mut guard = record.lock().expect("circuit record lock poisoned");
            let (admitted, transition) = guard.try_admit(now, limits.half_open_permits);
            if let Some(t) = transition {
                self.publish(Event::CircuitStateChange { operation: operation.to_string(), from: t.from, to: t.to });
            }
            admitted
        };

        if !admitted {
            self.publish(Event::CircuitRejected { operation: operation.to_string() });
            self.emit_metric("circuit.rejected", 1.0, vec![("operation".to_string(), operation.to_string())]);
            return match fallback {
                Some(fallback) => Ok(fallback()),
                None => Err(CoreError::CircuitOpen),
            };
        }

        let started = self.clock.now_millis();
        let outcome = f().await;
        let elapsed = (self.clock.now_millis() - started).max(0) as u64;

        let counts = matches!(&outcome, Err(e) if e.counts_toward_breaker());
        let now = self.clock.now_millis();
        let mut guard = record.lock().expect("circuit record lock poisoned");
        let transition = if counts {
            guard.record_failure(limits.failure_threshold, limits.open_duration_ms, now)
        } else {
            guard.record_success(limits.half_open_permits, elapsed, self.config.response_time_window)
        };
        drop(guard);

        if let Some(t) = transition {
            self.publish(Event::CircuitStateChange { operation: operation.to_string(), from: t.from, to: t.to });
        }
        self.emit_metric(
            if counts { "circuit.failure" } else { "circuit.success" },
            1.0,
            vec![("operation".to_string(), operation.to_string())],
        );

        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicI64;
    use std::sync::atomic::AtomicU32;
    use std::sync::atomic::Ordering;

    struct ManualClock(AtomicI64);
    impl Clock for ManualClock {
        fn now_millis(&self) -> i64 {
            self.0.load(Ordering::SeqCst)
        }
    }
    impl ManualClock {
        fn advance(&self, ms: i64) {
            self.0.fetch_add(ms, Ordering::SeqCst);
        }
    }

    fn config() -> BreakerConfig {
        BreakerConfig { failure_threshold: 2, open_duration_ms: 1_000, half_open_permits: 2, ..BreakerConfig::default() }
    }

    #[tokio::test]
    async fn trips_open_after_consecutive_failures() {
        let breaker = CircuitBreaker::new(config());
        for _ in 0..2 {
            let _: Result<(), CoreError> = breaker
                .call("ai-compute", None::<fn() -> ()>, || async { Err(CoreError::TransientCompute("x".into())) })
                .await;
        }
        assert_eq!(breaker.snapshot("ai-compute").state, CircuitState::Open);
    }

    #[tokio::test]
    async fn open_rejects_without_fallback() {
        let clock = Arc::new(ManualClock(AtomicI64::new(0)));
        let breaker = CircuitBreaker::with_clock(config(), clock.clone());
        for _ in 0..2 {
            let _: Result<(), CoreError> = breaker
                .call("ai-compute", None::<fn() -> ()>, || async { Err(CoreError::TransientCompute("x".into())) })
                .await;
        }
        let result: Result<(), CoreError> =
            breaker.call("ai-compute", None::<fn() -> ()>, || async { Ok(()) }).await;
        assert!(matches!(result, Err(CoreError::CircuitOpen)));
    }

    #[tokio::test]
    async fn open_returns_fallback_without_counting_it() {
        let breaker = CircuitBreaker::new(config());
        for _ in 0..2 {
            let _: Result<i32, CoreError> = breaker
                .call("ai-compute", None::<fn() -> i32>, || async { Err(CoreError::TransientCompute("x".into())) })
                .await;
        }
        let result = breaker.call("ai-compute", Some(|| 99), || async { Ok::<i32, CoreError>(1) }).await;
        assert_eq!(result.unwrap(), 99);
        assert_eq!(breaker.snapshot("ai-compute").state, CircuitState::Open);
    }

    #[tokio::test]
    async fn non_counting_error_does_not_trip_breaker() {
        let breaker = CircuitBreaker::new(config());
        for _ in 0..5 {
            let _: Result<(), CoreError> = breaker
                .call("ai-compute", None::<fn() -> ()>, || async { Err(CoreError::InvalidInput("bad".into())) })
                .await;
        }
        assert_eq!(breaker.snapshot("ai-compute").state, CircuitState::Closed);
    }

    #[tokio::test]
    async fn recovers_through_half_open_after_wait() {
        let clock = Arc::new(ManualClock(AtomicI64::new(0)));
        let breaker = CircuitBreaker::with_clock(config(), clock.clone());
        for _ in 0..2 {
            let _: Result<(), CoreError> = breaker
                .call("ai-compute", None::<fn() -> ()>, || async { Err(CoreError::TransientCompute("x".into())) })
                .await;
        }
        clock.advance(1_001);
        for _ in 0..2 {
            let _: Result<(), CoreError> =
                breaker.call("ai-compute", None::<fn() -> ()>, || async { Ok(()) }).await;
        }
        assert_eq!(breaker.snapshot("ai-compute").state, CircuitState::Closed);
    }

    #[tokio::test]
    async fn half_open_admits_bounded_concurrency() {
        let clock = Arc::new(ManualClock(AtomicI64::new(0)));
        let breaker = Arc::new(CircuitBreaker::with_clock(config(), clock.clone()));
        for _ in 0..2 {
            let _: Result<(), CoreError> = breaker
                .call("ai-compute", None::<fn() -> ()>, || async { Err(CoreError::TransientCompute("x".into())) })
                .await;
        }
        clock.advance(1_001);

        let admitted = Arc::new(AtomicU32::new(0));
        let mut handles = Vec::new();
        for _ in 0..5 {
            let breaker = breaker.clone();
            let admitted = admitted.clone();
            handles.push(tokio::spawn(async move {
                let result: Result<(), CoreError> = breaker
                    .call("ai-compute", None::<fn() -> ()>, || async {
                        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
                        Ok(())
                    })
                    .await;
                if result.is_ok() {
                    admitted.fetch_add(1, Ordering::SeqCst);
                }
            }));
        }
        let _ = futures::future::join_all(handles).await;
        assert!(admitted.load(Ordering::SeqCst) <= 2);
    }
}
