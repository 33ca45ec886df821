use cf_core::StrategyTag;
use cf_core::MIN_DIFFICULTY;
use std::collections::HashMap;

/// Upper bound on `resource_usage` for a candidate at the lowest
/// difficulty tier. Scoring alone doesn't guarantee this (a strategy with
/// a high enough baseline win rate can still out-score a lighter one), so
/// it's enforced directly on the candidate set instead.
const LOW_DIFFICULTY_RESOURCE_CAP: f32 = 0.3;

/// Closed-form constants for one strategy: its baseline win rate against a
/// neutral opponent, typical compute time, typical confidence, and relative
/// resource usage.
#[derive(Clone, Copy, Debug)]
pub struct StrategyBaseline {
    pub win_rate: f32,
    pub avg_compute_ms: u64,
    pub confidence: f32,
    pub resource_usage: f32,
}

/// Phase-dependent scoring adjustment for one strategy (opening, midgame,
/// endgame bonuses).
#[derive(Clone, Copy, Debug, Default)]
pub struct PhaseBonus {
    pub opening: f32,
    pub midgame: f32,
    pub endgame: f32,
}

#[derive(Clone, Debug)]
pub struct SelectorConfig {
    pub baselines: HashMap<StrategyTag, StrategyBaseline>,
    pub phase_bonuses: HashMap<StrategyTag, PhaseBonus>,
    /// Minimum request difficulty at which a strategy becomes a candidate.
    /// `Minimax` and `AlphaBeta` are unlocked from difficulty 1 (the "always
    /// a candidate" baseline tier); `Mcts` and `Heaviest` unlock higher up.
    pub unlock_difficulty: HashMap<StrategyTag, u8>,
    /// Base execution-time estimate (ms) before the fill-ratio complexity
    /// scale is applied, when a strategy-specific baseline is unavailable.
    pub base_execution_ms: u64,
    /// Below this remaining-time budget, the time penalty is scaled up
    /// ("tight deadline").
    pub tight_deadline_ms: u64,
    /// Weight applied to the difficulty-match penalty term.
    pub difficulty_penalty_weight: f32,
    /// Weight applied to rolling-performance history.
    pub history_bonus_weight: f32,
    /// Weight applied to the time-penalty term.
    pub time_penalty_weight: f32,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        let mut baselines = HashMap::new();
        baselines.insert(
            StrategyTag::Minimax,
            StrategyBaseline { win_rate: 0.55, avg_compute_ms: 50, confidence: 0.60, resource_usage: 0.2 },
        );
        baselines.insert(
            StrategyTag::AlphaBeta,
            StrategyBaseline { win_rate: 0.68, avg_compute_ms: 150, confidence: 0.72, resource_usage: 0.4 },
        );
        baselines.insert(
            StrategyTag::Mcts,
            StrategyBaseline { win_rate: 0.78, avg_compute_ms: 400, confidence: 0.80, resource_usage: 0.7 },
        );
        baselines.insert(
            StrategyTag::Heaviest,
            StrategyBaseline { win_rate: 0.85, avg_compute_ms: 900, confidence: 0.88, resource_usage: 1.0 },
        );

        let mut phase_bonuses = HashMap::new();
        phase_bonuses.insert(StrategyTag::Minimax, PhaseBonus { opening: 0.05, midgame: 0.0, endgame: 0.0 });
        phase_bonuses.insert(StrategyTag::AlphaBeta, PhaseBonus { opening: 0.02, midgame: 0.03, endgame: 0.08 });
        phase_bonuses.insert(StrategyTag::Mcts, PhaseBonus { opening: -0.02, midgame: 0.08, endgame: 0.02 });
        phase_bonuses.insert(StrategyTag::Heaviest, PhaseBonus { opening: -0.06, midgame: 0.04, endgame: 0.10 });

        let mut unlock_difficulty = HashMap::new();
        unlock_difficulty.insert(StrategyTag::Minimax, 1);
        unlock_difficulty.insert(StrategyTag::AlphaBeta, 1);
        unlock_difficulty.insert(StrategyTag::Mcts, 10);
        unlock_difficulty.insert(StrategyTag::Heaviest, 18);

        Self {
            baselines,
            phase_bonuses,
            unlock_difficulty,
            base_execution_ms: 200,
            tight_deadline_ms: 1_000,
            difficulty_penalty_weight: 0.15,
            history_bonus_weight: 0.2,
            time_penalty_weight: 0.25,
        }
    }
}

impl SelectorConfig {
    pub fn baseline_for(&self, strategy: StrategyTag) -> StrategyBaseline {
        self.baselines.get(&strategy).copied().unwrap_or(StrategyBaseline {
            win_rate: 0.5,
            avg_compute_ms: self.base_execution_ms,
            confidence: 0.5,
            resource_usage: 0.5,
        })
    }

    pub fn phase_bonus_for(&self, strategy: StrategyTag, phase: crate::selector::Phase) -> f32 {
        let bonus = self.phase_bonuses.get(&strategy).copied().unwrap_or_default();
        match phase {
            crate::selector::Phase::Opening => bonus.opening,
            crate::selector::Phase::Midgame => bonus.midgame,
            crate::selector::Phase::Endgame => bonus.endgame,
        }
    }

    pub fn candidates(&self, difficulty: u8) -> Vec<StrategyTag> {
        let mut tags: Vec<StrategyTag> = self
            .unlock_difficulty
            .iter()
            .filter(|&(_, &threshold)| difficulty >= threshold)
            .map(|(tag, _)| *tag)
            .filter(|tag| difficulty > MIN_DIFFICULTY || self.baseline_for(*tag).resource_usage <= LOW_DIFFICULTY_RESOURCE_CAP)
            .collect();
        tags.sort_by_key(|t| t.label());
        tags
    }
}
