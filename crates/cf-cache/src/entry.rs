use std::any::Any;
use std::collections::HashMap;

pub(crate) struct StoredEntry {
    pub(crate) value: Box<dyn Any + Send + Sync>,
    pub(crate) created_at_ms: i64,
    pub(crate) expires_at_ms: i64,
    pub(crate) bytes: u64,
    pub(crate) hits: u64,
    pub(crate) last_access_ms: i64,
}

impl StoredEntry {
    pub(crate) fn is_expired(&self, now_ms: i64) -> bool {
        self.expires_at_ms <= now_ms
    }
}

#[derive(Default)]
pub(crate) struct Namespace {
    pub(crate) entries: HashMap<String, StoredEntry>,
}

/// Reason an entry left the cache.
pub(crate) type EvictionReason = &'static str;

/// Applies the eviction order (expired → LRU → lowest `hits/age`) until the
/// namespace is within `max_entries`/`memory_limit_bytes`. Returns the keys
/// removed along with why, for event/metric reporting.
pub(crate) fn enforce_limits(
    ns: &mut Namespace,
    max_entries: usize,
    memory_limit_bytes: u64,
    now_ms: i64,
) -> Vec<(String, EvictionReason)> {
    let mut evicted = Vec::new();

    let expired: Vec<String> = ns
        .entries
        .iter()
        .filter(|(_, e)| e.is_expired(now_ms))
        .map(|(k, _)| k.clone())
        .collect();
    for key in expired {
        ns.entries.remove(&key);
        evicted.push((key, "expired"));
    }

    while ns.entries.len() > max_entries {
        let Some(lru_key) = ns
            .entries
            .iter()
            .min_by_key(|(_, e)| e.last_access_ms)
            .map(|(k, _)| k.clone())
        else {
            break;
        };
        ns.entries.remove(&lru_key);
        evicted.push((lru_key, "lru"));
    }

    let mut total_bytes: u64 = ns.entries.values().map(|e| e.bytes).sum();
    while total_bytes > memory_limit_bytes {
        let worst = ns
            .entries
            .iter()
            .min_by(|(_, a), (_, b)| value_of(a, now_ms).total_cmp(&value_of(b, now_ms)))
            .map(|(k, _)| k.clone());
        let Some(key) = worst else { break };
        if let Some(entry) = ns.entries.remove(&key) {
            total_bytes = total_bytes.saturating_sub(entry.bytes);
            evicted.push((key, "memory"));
        } else {
            break;
        }
    }

    evicted
}

fn value_of(entry: &StoredEntry, now_ms: i64) -> f64 {
    let age = (now_ms - entry.created_at_ms).max(1) as f64;
    entry.hits as f64 / age
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(hits: u64, created_at_ms: i64, bytes: u64) -> StoredEntry {
        StoredEntry {
            value: Box::new(0u8),
            created_at_ms,
            expires_at_ms: i64::MAX,
            bytes,
            hits,
            last_access_ms: created_at_ms,
        }
    }

    #[test]
    fn expired_entries_are_removed_first() {
        let mut ns = Namespace::default();
        ns.entries.insert(
            "a".into(),
            StoredEntry { expires_at_ms: 10, ..entry(0, 0, 1) },
        );
        let evicted = enforce_limits(&mut ns, 100, u64::MAX, 20);
        assert_eq!(evicted, vec![("a".to_string(), "expired")]);
        assert!(ns.entries.is_empty());
    }

    #[test]
    fn lru_evicted_when_over_max_entries() {
        let mut ns = Namespace::default();
        ns.entries.insert("old".into(), StoredEntry { last_access_ms: 1, ..entry(1, 0, 1) });
        ns.entries.insert("new".into(), StoredEntry { last_access_ms: 5, ..entry(1, 0, 1) });
        let evicted = enforce_limits(&mut ns, 1, u64::MAX, 100);
        assert_eq!(evicted, vec![("old".to_string(), "lru")]);
        assert!(ns.entries.contains_key("new"));
    }

    #[test]
    fn lowest_value_evicted_when_over_memory_limit() {
        let mut ns = Namespace::default();
        ns.entries.insert("popular".into(), entry(100, 0, 10));
        ns.entries.insert("cold".into(), entry(1, 0, 10));
        let evicted = enforce_limits(&mut ns, 100, 10, 100);
        assert_eq!(evicted, vec![("cold".to_string(), "memory")]);
        assert!(ns.entries.contains_key("popular"));
    }
}
