/// Per-namespace counters backing `Stats()`.
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct NamespaceCounters {
    pub(crate) hits: u64,
    pub(crate) misses: u64,
    pub(crate) evictions: u64,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct NamespaceStats {
    pub hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
    pub entries: usize,
    pub bytes: u64,
    pub evictions: u64,
}

impl NamespaceCounters {
    pub(crate) fn snapshot(&self, entries: usize, bytes: u64) -> NamespaceStats {
        let total = self.hits + self.misses;
        NamespaceStats {
            hits: self.hits,
            misses: self.misses,
            hit_rate: if total == 0 { 0.0 } else { self.hits as f64 / total as f64 },
            entries,
            bytes,
            evictions: self.evictions,
        }
    }
}
