use crate::config::SelectorConfig;
use crate::record::Outcome;
use crate::record::PerformanceRegistry;
use cf_core::Board;
use cf_core::Clock;
use cf_core::CoreError;
use cf_core::Event;
use cf_core::EventBus;
use cf_core::PlayerColor;
use cf_core::StrategyTag;
use cf_core::SystemClock;
use cf_monitor::Monitor;
use std::sync::Arc;

/// Game phase, classified by board fill ratio.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Opening,
    Midgame,
    Endgame,
}

impl Phase {
    pub fn classify(fill_ratio: f32) -> Self {
        if fill_ratio < 0.25 {
            Phase::Opening
        } else if fill_ratio < 0.75 {
            Phase::Midgame
        } else {
            Phase::Endgame
        }
    }

    fn label(self) -> &'static str {
        match self {
            Phase::Opening => "opening",
            Phase::Midgame => "midgame",
            Phase::Endgame => "endgame",
        }
    }
}

/// Output of `select()`: primary strategy, a strictly
/// simpler fallback, a confidence proxy, a human-readable reason, and an
/// estimated execution time in milliseconds.
#[derive(Clone, Debug)]
pub struct Selection {
    pub primary: StrategyTag,
    pub fallback: StrategyTag,
    pub confidence: f32,
    pub reason: String,
    pub estimated_ms: u64,
}

pub struct StrategySelector {
    config: SelectorConfig,
    registry: PerformanceRegistry,
    clock: Arc<dyn Clock>,
    monitor: Option<Arc<Monitor>>,
    events: Option<Arc<EventBus>>,
}

impl StrategySelector {
    pub fn new(config: SelectorConfig) -> Self {
        Self::build(config, Arc::new(SystemClock), None, None)
    }

    pub fn with_observability(config: SelectorConfig, monitor: Arc<Monitor>, events: Arc<EventBus>) -> Self {
        Self::build(config, Arc::new(SystemClock), Some(monitor), Some(events))
    }

    pub fn with_clock(config: SelectorConfig, clock: Arc<dyn Clock>) -> Self {
        Self::build(config, clock, None, None)
    }

    fn build(config: SelectorConfig, clock: Arc<dyn Clock>, monitor: Option<Arc<Monitor>>, events: Option<Arc<EventBus>>) -> Self {
        Self { registry: PerformanceRegistry::new(clock.clone()), config, clock, monitor, events }
    }

    fn publish(&self, event: Event) {
        if let Some(bus) = &self.events {
            bus.publish(event);
        }
    }

    /// Picks a primary strategy, fallback, and execution budget for one
    /// request. `strategy_override`, when present, bypasses scoring
    /// entirely (the caller already decided).
    pub fn select(
        &self,
        board: &Board,
        player: PlayerColor,
        difficulty: u8,
        time_remaining_ms: Option<u64>,
        strategy_override: Option<StrategyTag>,
    ) -> Result<Selection, CoreError> {
        let fill_ratio = board.fill_ratio();
        let phase = Phase::classify(fill_ratio);
        log::debug!("[strategy] phase={:?} fill_ratio={:.2} player={:?} difficulty={}", phase, fill_ratio, player, difficulty);

        let selection = if let Some(tag) = strategy_override {
            let baseline = self.config.baseline_for(tag);
            Selection {
                primary: tag,
                fallback: tag.simpler(),
                confidence: baseline.confidence,
                reason: format!("strategy override: {}", tag.label()),
                estimated_ms: estimated_execution_ms(baseline.avg_compute_ms, fill_ratio),
            }
        } else {
            let candidates = self.config.candidates(difficulty);
            if candidates.is_empty() {
                return Err(CoreError::internal("no candidate strategies unlocked for this difficulty"));
            }

            let mut scored: Vec<(StrategyTag, f32)> =
                candidates.iter().map(|&tag| (tag, self.score(tag, phase, difficulty, time_remaining_ms))).collect();
            scored.sort_by(|a, b| {
                let baseline_a = self.config.baseline_for(a.0);
                let baseline_b = self.config.baseline_for(b.0);
                b.1.partial_cmp(&a.1)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then_with(|| baseline_a.avg_compute_ms.cmp(&baseline_b.avg_compute_ms))
                    .then_with(|| baseline_a.resource_usage.partial_cmp(&baseline_b.resource_usage).unwrap_or(std::cmp::Ordering::Equal))
            });

            let (primary, best_score) = scored[0];
            let second_score = scored.get(1).map(|(_, s)| *s).unwrap_or(best_score - 1.0);
            let gap = (best_score - second_score).max(0.0);
            let confidence = (0.5 + gap).clamp(0.05, 0.99);
            let fallback = primary.simpler();
            let baseline = self.config.baseline_for(primary);

            Selection {
                primary,
                fallback,
                confidence,
                reason: format!(
                    "selected {} for {} phase at difficulty {} (score {:.3}, gap {:.3} over {})",
                    primary.label(),
                    phase.label(),
                    difficulty,
                    best_score,
                    gap,
                    scored.get(1).map(|(t, _)| t.label()).unwrap_or("no runner-up"),
                ),
                estimated_ms: estimated_execution_ms(baseline.avg_compute_ms, fill_ratio),
            }
        };

        self.publish(Event::StrategySelected { strategy: selection.primary, fallback: selection.fallback, confidence: selection.confidence });
        if let Some(monitor) = &self.monitor {
            monitor.record_metric(
                "strategy.selected",
                1.0,
                "count",
                vec![("strategy".to_string(), selection.primary.label().to_string()), ("phase".to_string(), phase.label().to_string())],
            );
        }
        Ok(selection)
    }

    fn score(&self, tag: StrategyTag, phase: Phase, difficulty: u8, time_remaining_ms: Option<u64>) -> f32 {
        let baseline = self.config.baseline_for(tag);
        let base = baseline.win_rate;
        let phase_bonus = self.config.phase_bonus_for(tag, phase);
        let difficulty_penalty = self.difficulty_penalty(tag, &baseline, difficulty);
        let history_bonus = self.history_bonus(tag, &baseline);
        let time_penalty = self.time_penalty(&baseline, time_remaining_ms);
        base + phase_bonus + difficulty_penalty + history_bonus - time_penalty
    }

    /// Penalises a mismatch between the strategy's relative weight
    /// (`resource_usage`, 0..1) and the requested difficulty, normalised to
    /// the same 0..1 range.
    fn difficulty_penalty(&self, _tag: StrategyTag, baseline: &crate::config::StrategyBaseline, difficulty: u8) -> f32 {
        let normalized_difficulty = difficulty as f32 / cf_core::MAX_DIFFICULTY as f32;
        -self.config.difficulty_penalty_weight * (baseline.resource_usage - normalized_difficulty).abs()
    }

    fn history_bonus(&self, tag: StrategyTag, baseline: &crate::config::StrategyBaseline) -> f32 {
        let record = self.registry.snapshot(tag);
        if record.games_played == 0 {
            return 0.0;
        }
        let recency = (record.games_played as f32 / 20.0).min(1.0);
        let success_delta = record.success_rate() - 0.5;
        let confidence_delta = (record.avg_confidence - baseline.confidence) * 0.5;
        self.config.history_bonus_weight * recency * (success_delta + confidence_delta)
    }

    fn time_penalty(&self, baseline: &crate::config::StrategyBaseline, time_remaining_ms: Option<u64>) -> f32 {
        let expected = baseline.avg_compute_ms as f32;
        let mut penalty = match time_remaining_ms {
            Some(remaining) => {
                let remaining = remaining.max(1) as f32;
                let ratio = expected / remaining;
                if remaining < self.config.tight_deadline_ms as f32 {
                    ratio * 2.0
                } else {
                    ratio
                }
            }
            None => (expected / self.config.base_execution_ms as f32 - 1.0).max(0.0),
        };
        penalty *= self.config.time_penalty_weight;
        penalty
    }

    /// Mutates the rolling stats for `strategy` with a moving average
    /// weighted by `gamesPlayed`.
    pub fn update_performance(&self, strategy: StrategyTag, outcome: Outcome, move_ms: u64, confidence: f32) {
        self.registry.update(strategy, outcome, move_ms, confidence);
    }

    pub fn now_ms(&self) -> i64 {
        self.clock.now_millis()
    }
}

/// Base compute time scaled by board complexity: `1 + fillRatio * 0.5`.
fn estimated_execution_ms(base_ms: u64, fill_ratio: f32) -> u64 {
    let complexity = 1.0 + fill_ratio as f64 * 0.5;
    (base_ms as f64 * complexity).round() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use cf_core::Board;

    #[test]
    fn phase_classification_follows_fill_ratio_thresholds() {
        assert_eq!(Phase::classify(0.0), Phase::Opening);
        assert_eq!(Phase::classify(0.24), Phase::Opening);
        assert_eq!(Phase::classify(0.25), Phase::Midgame);
        assert_eq!(Phase::classify(0.74), Phase::Midgame);
        assert_eq!(Phase::classify(0.75), Phase::Endgame);
        assert_eq!(Phase::classify(1.0), Phase::Endgame);
    }

    #[test]
    fn low_difficulty_never_selects_a_heavy_strategy() {
        let selector = StrategySelector::new(SelectorConfig::default());
        let board = Board::empty();
        let selection = selector.select(&board, PlayerColor::Red, 2, None, None).unwrap();
        assert!(matches!(selection.primary, StrategyTag::Minimax | StrategyTag::AlphaBeta));
    }

    #[test]
    fn minimum_difficulty_never_selects_a_resource_heavy_strategy() {
        let config = SelectorConfig::default();
        let selector = StrategySelector::new(config.clone());
        let board = Board::empty();
        let selection = selector.select(&board, PlayerColor::Red, 1, None, None).unwrap();
        assert!(config.baseline_for(selection.primary).resource_usage <= 0.3);
    }

    #[test]
    fn fallback_is_strictly_simpler_than_primary() {
        let selector = StrategySelector::new(SelectorConfig::default());
        let board = Board::empty();
        let selection = selector.select(&board, PlayerColor::Red, 25, None, None).unwrap();
        assert_eq!(selection.fallback, selection.primary.simpler());
    }

    #[test]
    fn strategy_override_bypasses_scoring() {
        let selector = StrategySelector::new(SelectorConfig::default());
        let board = Board::empty();
        let selection = selector.select(&board, PlayerColor::Red, 1, None, Some(StrategyTag::Heaviest)).unwrap();
        assert_eq!(selection.primary, StrategyTag::Heaviest);
        assert_eq!(selection.fallback, StrategyTag::Mcts);
    }

    #[test]
    fn tight_deadline_increases_time_penalty_and_favours_cheaper_strategy() {
        let selector = StrategySelector::new(SelectorConfig::default());
        let board = Board::empty();
        let generous = selector.select(&board, PlayerColor::Red, 25, Some(10_000), None).unwrap();
        let tight = selector.select(&board, PlayerColor::Red, 25, Some(50), None).unwrap();
        let config = SelectorConfig::default();
        let generous_ms = config.baseline_for(generous.primary).avg_compute_ms;
        let tight_ms = config.baseline_for(tight.primary).avg_compute_ms;
        assert!(tight_ms <= generous_ms);
    }

    #[test]
    fn estimated_ms_scales_with_fill_ratio() {
        assert_eq!(estimated_execution_ms(100, 0.0), 100);
        assert_eq!(estimated_execution_ms(100, 1.0), 150);
    }

    #[test]
    fn update_performance_feeds_back_into_history_bonus() {
        let selector = StrategySelector::new(SelectorConfig::default());
        for _ in 0..20 {
            selector.update_performance(StrategyTag::Minimax, Outcome::Win, 10, 0.95);
        }
        let board = Board::empty();
        let selection = selector.select(&board, PlayerColor::Red, 1, None, None).unwrap();
        assert_eq!(selection.primary, StrategyTag::Minimax);
    }
}
