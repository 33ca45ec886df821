use crate::config::AlertDirection;
use crate::config::MonitorConfig;
use crate::metric::percentile;
use crate::metric::Metric;
use crate::metric::MetricStore;
use crate::report::MetricSummary;
use crate::report::Report;
use crate::system;
use crate::tracking::OperationId;
use crate::tracking::OperationState;
use crate::tracking::OperationStatus;
use crate::tracking::SpanId;
use crate::tracking::SpanState;
use cf_core::Clock;
use cf_core::CoreError;
use cf_core::Event;
use cf_core::EventBus;
use cf_core::SystemClock;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;

type AlertHandler = Box<dyn Fn(f64) + Send + Sync>;

struct AlertEntry {
    value: f64,
    direction: AlertDirection,
    handler: AlertHandler,
    /// Whether the previous sample for this metric had already crossed the
    /// threshold, so a handler fires once per crossing (edge-triggered).
    armed: bool,
}

/// Metrics, spans, and threshold alerts. Metric ingestion
/// never fails: on overflow the oldest sample is silently dropped, and
/// alert handler errors are logged and swallowed, never propagated.
pub struct Monitor {
    config: MonitorConfig,
    clock: Arc<dyn Clock>,
    metrics: Mutex<MetricStore>,
    operations: Mutex<HashMap<OperationId, OperationState>>,
    spans: Mutex<HashMap<SpanId, SpanState>>,
    alerts: Mutex<HashMap<String, Vec<AlertEntry>>>,
    events: Option<Arc<EventBus>>,
}

impl Monitor {
    pub fn new(config: MonitorConfig) -> Self {
        Self::build(config, Arc::new(SystemClock), None)
    }

    pub fn with_clock(config: MonitorConfig, clock: Arc<dyn Clock>) -> Self {
        Self::build(config, clock, None)
    }

    /// Like [`Monitor::with_clock`], but also wires every configured
    /// `MonitorConfig::alerts` rule to publish `Event::PerformanceAlert` on
    /// `events` when it fires.
    pub fn with_observability(config: MonitorConfig, clock: Arc<dyn Clock>, events: Arc<EventBus>) -> Self {
        Self::build(config, clock, Some(events))
    }

    fn build(config: MonitorConfig, clock: Arc<dyn Clock>, events: Option<Arc<EventBus>>) -> Self {
        let rules = config.alerts.clone();
        let monitor = Self {
            config,
            clock,
            metrics: Mutex::new(MetricStore::default()),
            operations: Mutex::new(HashMap::new()),
            spans: Mutex::new(HashMap::new()),
            alerts: Mutex::new(HashMap::new()),
            events,
        };
        for rule in &rules {
            monitor.register_alert_rule(rule);
        }
        monitor
    }

    /// Registers one configured `AlertRule` with a handler that publishes
    /// `Event::PerformanceAlert` when the rule fires, falling back to a log
    /// line if the monitor was built without an event bus.
    fn register_alert_rule(&self, rule: &crate::config::AlertRule) {
        let events = self.events.clone();
        let metric = rule.metric.clone();
        let threshold = rule.value;
        self.set_alert_threshold(rule.metric.clone(), rule.value, rule.direction, move |value| match &events {
            Some(bus) => bus.publish(Event::PerformanceAlert { metric: metric.clone(), value, threshold }),
            None => log::warn!("[monitor] alert fired for {metric}={value} (threshold {threshold}) but no event bus is configured"),
        });
    }

    fn now(&self) -> i64 {
        self.clock.now_millis()
    }

    /// Append a sample to `name`'s ring buffer and evaluate any alert rules
    /// registered against it. Never fails.
    pub fn record_metric(&self, name: &str, value: f64, unit: &'static str, tags: Vec<(String, String)>) {
        let ts = self.now();
        let sample = Metric { name: name.to_string(), value, unit, tags, timestamp_ms: ts };
        let cutoff = ts - self.config.retention_ms as i64;
        self.metrics
            .lock()
            .expect("metric store lock poisoned")
            .record(sample, self.config.max_samples_per_metric, cutoff);
        self.evaluate_alerts(name, value);
    }

    fn evaluate_alerts(&self, name: &str, value: f64) {
        let mut alerts = self.alerts.lock().expect("alert registry lock poisoned");
        if let Some(entries) = alerts.get_mut(name) {
            for entry in entries.iter_mut() {
                let crossed = match entry.direction {
                    AlertDirection::Above => value > entry.value,
                    AlertDirection::Below => value < entry.value,
                };
                if crossed && !entry.armed {
                    entry.armed = true;
                    (entry.handler)(value);
                } else if !crossed {
                    entry.armed = false;
                }
            }
        }
    }

    /// Register a handler invoked synchronously, on the caller's scheduling
    /// context, the first time a sample crosses `value` (edge-triggered: it
    /// re-arms only after a subsequent sample falls back below/above the
    /// threshold). Handler panics are not caught; callers should not panic.
    pub fn set_alert_threshold(
        &self,
        metric: impl Into<String>,
        value: f64,
        direction: AlertDirection,
        handler: impl Fn(f64) + Send + Sync + 'static,
    ) {
        self.alerts
            .lock()
            .expect("alert registry lock poisoned")
            .entry(metric.into())
            .or_default()
            .push(AlertEntry { value, direction, handler: Box::new(handler), armed: false });
    }

    pub fn start_operation(&self, name: impl Into<String>, tags: Vec<(String, String)>) -> OperationId {
        let id = OperationId::default();
        self.operations.lock().expect("operation table lock poisoned").insert(
            id,
            OperationState { name: name.into(), tags, start_ms: self.now() },
        );
        id
    }

    /// Emits `operation.<name>.duration_ms` tagged with `status` (and `err`
    /// if provided). Fails if `id` is unknown (already ended, or never
    /// started).
    pub fn end_operation(&self, id: OperationId, status: OperationStatus, err: Option<&str>) -> Result<(), CoreError> {
        let state = self
            .operations
            .lock()
            .expect("operation table lock poisoned")
            .remove(&id)
            .ok_or_else(|| CoreError::internal("end_operation: unknown operation id"))?;
        let duration = (self.now() - state.start_ms).max(0) as f64;
        let mut tags = state.tags;
        tags.push((
            "status".to_string(),
            match status {
                OperationStatus::Success => "success".to_string(),
                OperationStatus::Failure => "failure".to_string(),
            },
        ));
        if let Some(err) = err {
            tags.push(("error".to_string(), err.to_string()));
        }
        self.record_metric(&format!("operation.{}.duration_ms", state.name), duration, "ms", tags);
        Ok(())
    }

    pub fn start_span(&self, category: impl Into<String>, label: impl Into<String>, parent: Option<SpanId>) -> SpanId {
        let id = SpanId::default();
        self.spans.lock().expect("span table lock poisoned").insert(
            id,
            SpanState { category: category.into(), label: label.into(), parent, start_ms: self.now() },
        );
        id
    }

    /// Ends the span matching `id`. Fails if the category doesn't match the
    /// span that was started, or the id is unknown.
    pub fn end_span(&self, category: &str, id: SpanId, kv: Vec<(String, String)>) -> Result<(), CoreError> {
        let state = self
            .spans
            .lock()
            .expect("span table lock poisoned")
            .remove(&id)
            .ok_or_else(|| CoreError::internal("end_span: unknown span id"))?;
        if state.category != category {
            return Err(CoreError::internal(format!(
                "end_span: category mismatch (started {}, ended {category})",
                state.category
            )));
        }
        let duration = (self.now() - state.start_ms).max(0) as f64;
        let mut tags = vec![("label".to_string(), state.label)];
        if let Some(parent) = state.parent {
            tags.push(("parent".to_string(), parent.to_string()));
        }
        tags.extend(kv);
        self.record_metric(&format!("span.{category}"), duration, "ms", tags);
        Ok(())
    }

    /// Aggregates totals, percentiles, success rate, and a cache-hit-rate
    /// proxy over the last `window_ms`.
    pub fn generate_report(&self, window_ms: u64) -> Report {
        let since = self.now() - window_ms as i64;
        let store = self.metrics.lock().expect("metric store lock poisoned");
        let mut metrics = HashMap::new();
        let mut successes = 0usize;
        let mut failures = 0usize;
        let mut hits = 0usize;
        let mut misses = 0usize;

        for name in store.names() {
            let series = store.get(name).expect("name came from store.names()");
            let samples = series.within_window(since);
            if samples.is_empty() {
                continue;
            }
            let mut values: Vec<f64> = samples.iter().map(|s| s.value).collect();
            values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
            metrics.insert(
                name.clone(),
                MetricSummary {
                    count: values.len(),
                    p50: percentile(&values, 0.50),
                    p95: percentile(&values, 0.95),
                    p99: percentile(&values, 0.99),
                },
            );
            if name.starts_with("operation.") && name.ends_with(".duration_ms") {
                for s in &samples {
                    match s.tags.iter().find(|(k, _)| k == "status").map(|(_, v)| v.as_str()) {
                        Some("success") => successes += 1,
                        Some("failure") => failures += 1,
                        _ => {}
                    }
                }
            }
            if name == "cache.hit" {
                hits += samples.len();
            }
            if name == "cache.miss" {
                misses += samples.len();
            }
        }

        Report {
            window_ms,
            metrics,
            success_rate: (successes + failures > 0)
                .then(|| successes as f64 / (successes + failures) as f64),
            cache_hit_rate: (hits + misses > 0).then(|| hits as f64 / (hits + misses) as f64),
            system: system::snapshot(),
        }
    }
}
