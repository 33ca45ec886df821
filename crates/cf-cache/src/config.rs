/// Per-namespace limits. Any field left `None` falls back to
/// [`CacheConfig`]'s default for that field.
#[derive(Clone, Debug, Default)]
pub struct NamespaceOverride {
    pub ttl_ms: Option<u64>,
    pub max_entries: Option<usize>,
    pub memory_limit_bytes: Option<u64>,
}

/// Resolved limits for a single namespace, after applying overrides.
#[derive(Clone, Copy, Debug)]
pub(crate) struct NamespaceLimits {
    pub ttl_ms: u64,
    pub max_entries: usize,
    pub memory_limit_bytes: u64,
}

#[derive(Clone, Debug)]
pub struct CacheConfig {
    pub default_ttl_ms: u64,
    pub default_max_entries: usize,
    pub default_memory_limit_bytes: u64,
    pub sweep_interval_ms: u64,
    pub overrides: std::collections::HashMap<String, NamespaceOverride>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_ttl_ms: 5 * 60_000,
            default_max_entries: 10_000,
            default_memory_limit_bytes: 64 * 1024 * 1024,
            sweep_interval_ms: 30_000,
            overrides: std::collections::HashMap::new(),
        }
    }
}

impl CacheConfig {
    pub(crate) fn limits_for(&self, namespace: &str) -> NamespaceLimits {
        let over = self.overrides.get(namespace);
        NamespaceLimits {
            ttl_ms: over.and_then(|o| o.ttl_ms).unwrap_or(self.default_ttl_ms),
            max_entries: over.and_then(|o| o.max_entries).unwrap_or(self.default_max_entries),
            memory_limit_bytes: over
                .and_then(|o| o.memory_limit_bytes)
                .unwrap_or(self.default_memory_limit_bytes),
        }
    }
}
