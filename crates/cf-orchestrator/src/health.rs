use cf_breaker::BreakerSnapshot;
use cf_breaker::CircuitState;
use cf_cache::NamespaceStats;
use cf_monitor::Report;

/// Aggregate snapshot exposed by `Engine::system_health`: one view per
/// subsystem plus a short list of free-text recommendations derived from
/// their current state.
#[derive(Clone, Debug)]
pub struct SystemHealth {
    pub cache: NamespaceStats,
    pub breaker: BreakerSnapshot,
    pub batcher: cf_batcher::BatcherStats,
    pub precompute: PrecomputeHealth,
    pub performance: Report,
    pub recommendations: Vec<String>,
}

#[derive(Clone, Copy, Debug)]
pub struct PrecomputeHealth {
    pub pending: usize,
    pub in_flight: usize,
}

/// Derives plain-language recommendations from a health snapshot. Thresholds
/// are deliberately conservative: this is advisory output for an operator,
/// not a decision input for the orchestrator itself.
pub(crate) fn recommend(health: &SystemHealth) -> Vec<String> {
    let mut out = Vec::new();
    if health.breaker.state != CircuitState::Closed {
        out.push(format!("ai-compute breaker is {:?}; consider investigating upstream compute failures", health.breaker.state));
    }
    if health.cache.entries > 0 && health.cache.hit_rate < 0.3 {
        out.push("cache hit rate is low; consider raising TTLs or widening precompute lookahead".to_string());
    }
    if health.batcher.queue_utilisation > 0.8 {
        out.push("move queue is near capacity; consider raising concurrency or shedding low-priority load".to_string());
    }
    if health.precompute.pending == 0 && health.precompute.in_flight == 0 {
        out.push("precompute queue is idle; warmup or prediction may not be running".to_string());
    }
    out
}
