use crate::config::CacheConfig;
use crate::entry::enforce_limits;
use crate::entry::Namespace;
use crate::entry::StoredEntry;
use crate::stats::NamespaceCounters;
use crate::stats::NamespaceStats;
use cf_core::Clock;
use cf_core::Event;
use cf_core::EventBus;
use cf_core::SystemClock;
use cf_monitor::Monitor;
use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;

/// Namespaced key-value store with TTL/size/memory caps and a single-flight
/// `memoise`. Values are type-erased (`Box<dyn Any>`) so one
/// manager instance can back namespaces holding unrelated value types; `Get`
/// fails closed (returns `None`) rather than panicking if a caller asks for
/// the wrong type under a key another caller populated.
pub struct CacheManager {
    config: CacheConfig,
    clock: Arc<dyn Clock>,
    namespaces: Mutex<HashMap<String, Namespace>>,
    counters: Mutex<HashMap<String, NamespaceCounters>>,
    pub(crate) inflight: Mutex<HashMap<(String, String), Box<dyn Any + Send + Sync>>>,
    monitor: Option<Arc<Monitor>>,
    events: Option<Arc<EventBus>>,
}

impl CacheManager {
    pub fn new(config: CacheConfig) -> Self {
        Self::build(config, Arc::new(SystemClock), None, None)
    }

    pub fn with_monitor(config: CacheConfig, monitor: Arc<Monitor>) -> Self {
        Self::build(config, Arc::new(SystemClock), Some(monitor), None)
    }

    pub fn with_observability(config: CacheConfig, monitor: Arc<Monitor>, events: Arc<EventBus>) -> Self {
        Self::build(config, Arc::new(SystemClock), Some(monitor), Some(events))
    }

    pub fn with_clock(config: CacheConfig, clock: Arc<dyn Clock>) -> Self {
        Self::build(config, clock, None, None)
    }

    fn build(
        config: CacheConfig,
        clock: Arc<dyn Clock>,
        monitor: Option<Arc<Monitor>>,
        events: Option<Arc<EventBus>>,
    ) -> Self {
        Self {
            config,
            clock,
            namespaces: Mutex::new(HashMap::new()),
            counters: Mutex::new(HashMap::new()),
            inflight: Mutex::new(HashMap::new()),
            monitor,
            events,
        }
    }

    pub(crate) fn now(&self) -> i64 {
        self.clock.now_millis()
    }

    fn record(&self, metric: &'static str) {
        if let Some(monitor) = &self.monitor {
            monitor.record_metric(metric, 1.0, "count", vec![]);
        }
    }

    fn publish(&self, event: Event) {
        if let Some(bus) = &self.events {
            bus.publish(event);
        }
    }

    /// O(1) average lookup; bumps the entry's access-order position and hit
    /// count on a hit. Returns `None` on miss, expiry, or type mismatch.
    pub fn get<V: Clone + Send + Sync + 'static>(&self, namespace: &str, key: &str) -> Option<V> {
        let now = self.now();
        let mut namespaces = self.namespaces.lock().expect("namespace table lock poisoned");
        let found = namespaces.get_mut(namespace).and_then(|ns| {
            let expired = ns.entries.get(key).map(|e| e.is_expired(now)).unwrap_or(false);
            if expired {
                ns.entries.remove(key);
                return None;
            }
            let entry = ns.entries.get_mut(key)?;
            entry.hits += 1;
            entry.last_access_ms = now;
            entry.value.downcast_ref::<V>().cloned()
        });
        drop(namespaces);

        let mut counters = self.counters.lock().expect("counter table lock poisoned");
        let counter = counters.entry(namespace.to_string()).or_default();
        if found.is_some() {
            counter.hits += 1;
            self.record("cache.hit");
            self.publish(Event::CacheHit { namespace: namespace.to_string(), key: key.to_string() });
        } else {
            counter.misses += 1;
            self.record("cache.miss");
            self.publish(Event::CacheMiss { namespace: namespace.to_string(), key: key.to_string() });
        }
        found
    }

    /// Inserts `value` under `namespace`/`key`, then runs eviction.
    pub fn set<V: Send + Sync + 'static>(&self, namespace: &str, key: &str, value: V, ttl_ms: Option<u64>, bytes: u64) {
        let limits = self.config.limits_for(namespace);
        let now = self.now();
        let ttl = ttl_ms.unwrap_or(limits.ttl_ms);
        let expires_at_ms = if ttl == 0 { i64::MAX } else { now.saturating_add(ttl as i64) };

        let mut namespaces = self.namespaces.lock().expect("namespace table lock poisoned");
        let ns = namespaces.entry(namespace.to_string()).or_default();
        ns.entries.insert(
            key.to_string(),
            StoredEntry {
                value: Box::new(value),
                created_at_ms: now,
                expires_at_ms,
                bytes,
                hits: 0,
                last_access_ms: now,
            },
        );
        let evicted = enforce_limits(ns, limits.max_entries, limits.memory_limit_bytes, now);
        drop(namespaces);

        if !evicted.is_empty() {
            let mut counters = self.counters.lock().expect("counter table lock poisoned");
            let counter = counters.entry(namespace.to_string()).or_default();
            counter.evictions += evicted.len() as u64;
            drop(counters);
            for (evicted_key, reason) in evicted {
                self.record("cache.evicted");
                self.publish(Event::CacheEvicted { namespace: namespace.to_string(), key: evicted_key, reason });
            }
        }
    }

    /// Atomic read snapshot of `keys` within one namespace: the whole batch
    /// is read under a single namespace-table lock acquisition, so no
    /// concurrent `Set`/eviction can be interleaved mid-batch.
    pub fn batch_get<V: Clone + Send + Sync + 'static>(&self, namespace: &str, keys: &[String]) -> HashMap<String, V> {
        let now = self.now();
        let mut result = HashMap::new();
        let mut namespaces = self.namespaces.lock().expect("namespace table lock poisoned");
        let mut hits = 0u64;
        let mut misses = 0u64;
        if let Some(ns) = namespaces.get_mut(namespace) {
            for key in keys {
                let expired = ns.entries.get(key).map(|e| e.is_expired(now)).unwrap_or(false);
                if expired {
                    ns.entries.remove(key);
                }
                match ns.entries.get_mut(key) {
                    Some(entry) => {
                        entry.hits += 1;
                        entry.last_access_ms = now;
                        if let Some(v) = entry.value.downcast_ref::<V>().cloned() {
                            result.insert(key.clone(), v);
                            hits += 1;
                        } else {
                            misses += 1;
                        }
                    }
                    None => misses += 1,
                }
            }
        } else {
            misses += keys.len() as u64;
        }
        drop(namespaces);

        let mut counters = self.counters.lock().expect("counter table lock poisoned");
        let counter = counters.entry(namespace.to_string()).or_default();
        counter.hits += hits;
        counter.misses += misses;
        result
    }

    /// Clears every entry in `namespace`.
    pub fn invalidate_namespace(&self, namespace: &str) {
        let mut namespaces = self.namespaces.lock().expect("namespace table lock poisoned");
        if let Some(ns) = namespaces.get_mut(namespace) {
            let removed = ns.entries.len() as u64;
            ns.entries.clear();
            drop(namespaces);
            if removed > 0 {
                let mut counters = self.counters.lock().expect("counter table lock poisoned");
                counters.entry(namespace.to_string()).or_default().evictions += removed;
            }
        }
    }

    /// Removes keys in `namespace` matching a simple glob: `*` at either
    /// end of `pattern` matches any suffix/prefix, no `*` means an exact
    /// match.
    pub fn invalidate_pattern(&self, namespace: &str, pattern: &str) {
        let mut namespaces = self.namespaces.lock().expect("namespace table lock poisoned");
        let Some(ns) = namespaces.get_mut(namespace) else { return };
        let matching: Vec<String> = ns
            .entries
            .keys()
            .filter(|k| glob_match(pattern, k))
            .cloned()
            .collect();
        for key in &matching {
            ns.entries.remove(key);
        }
        let removed = matching.len() as u64;
        drop(namespaces);
        if removed > 0 {
            let mut counters = self.counters.lock().expect("counter table lock poisoned");
            counters.entry(namespace.to_string()).or_default().evictions += removed;
        }
    }

    pub fn stats(&self, namespace: &str) -> NamespaceStats {
        let namespaces = self.namespaces.lock().expect("namespace table lock poisoned");
        let (entries, bytes) = namespaces
            .get(namespace)
            .map(|ns| (ns.entries.len(), ns.entries.values().map(|e| e.bytes).sum()))
            .unwrap_or((0, 0));
        drop(namespaces);
        let counters = self.counters.lock().expect("counter table lock poisoned");
        counters.get(namespace).copied().unwrap_or_default().snapshot(entries, bytes)
    }

    /// Removes every expired entry across all namespaces. Intended to be
    /// called on a periodic tick, independent of `Set`'s own eviction.
    pub fn sweep_expired(&self) {
        let now = self.now();
        let mut namespaces = self.namespaces.lock().expect("namespace table lock poisoned");
        for (name, ns) in namespaces.iter_mut() {
            let expired: Vec<String> =
                ns.entries.iter().filter(|(_, e)| e.is_expired(now)).map(|(k, _)| k.clone()).collect();
            if expired.is_empty() {
                continue;
            }
            for key in &expired {
                ns.entries.remove(key);
            }
            let removed = expired.len() as u64;
            let mut counters = self.counters.lock().expect("counter table lock poisoned");
            counters.entry(name.clone()).or_default().evictions += removed;
            drop(counters);
        }
    }
}

fn glob_match(pattern: &str, candidate: &str) -> bool {
    match (pattern.starts_with('*'), pattern.ends_with('*')) {
        (true, true) if pattern.len() >= 2 => candidate.contains(&pattern[1..pattern.len() - 1]),
        (true, false) => candidate.ends_with(&pattern[1..]),
        (false, true) => candidate.starts_with(&pattern[..pattern.len() - 1]),
        _ => candidate == pattern,
    }
}
