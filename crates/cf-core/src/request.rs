use crate::board::Board;
use crate::board::PlayerColor;
use crate::error::CoreError;
use std::fmt;

/// Lower bound (inclusive) on `MoveRequest::difficulty`.
pub const MIN_DIFFICULTY: u8 = 1;
/// Upper bound (inclusive) on `MoveRequest::difficulty`.
pub const MAX_DIFFICULTY: u8 = 25;
/// Lower bound (inclusive) on `MoveRequest::priority`.
pub const MIN_PRIORITY: u8 = 1;
/// Upper bound (inclusive) on `MoveRequest::priority`.
pub const MAX_PRIORITY: u8 = 10;
/// Default request deadline when the caller doesn't supply one.
pub const DEFAULT_TIME_LIMIT_MS: u64 = 5_000;

/// Compute strategy identity, shared by the selector, the performance
/// monitor's rolling stats, and the external `ComputeMove` capability.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum StrategyTag {
    Minimax,
    AlphaBeta,
    Mcts,
    Heaviest,
    OpeningBook,
}

impl StrategyTag {
    pub fn label(self) -> &'static str {
        match self {
            StrategyTag::Minimax => "minimax",
            StrategyTag::AlphaBeta => "alpha-beta",
            StrategyTag::Mcts => "mcts",
            StrategyTag::Heaviest => "heaviest",
            StrategyTag::OpeningBook => "opening-book",
        }
    }

    /// Next simpler strategy in the fixed fallback chain:
    /// heaviest -> mcts -> alpha-beta -> minimax. `Minimax` has no simpler
    /// fallback and maps to itself.
    pub fn simpler(self) -> StrategyTag {
        match self {
            StrategyTag::Heaviest => StrategyTag::Mcts,
            StrategyTag::Mcts => StrategyTag::AlphaBeta,
            StrategyTag::AlphaBeta => StrategyTag::Minimax,
            StrategyTag::Minimax => StrategyTag::Minimax,
            StrategyTag::OpeningBook => StrategyTag::Minimax,
        }
    }
}

impl fmt::Display for StrategyTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One user intent: "find a move for this board". Short-lived, consumed
/// once by the orchestrator.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct MoveRequest {
    pub game_id: String,
    pub board: Board,
    pub player: PlayerColor,
    pub difficulty: u8,
    /// Absolute deadline in epoch milliseconds, per `Clock::now_millis`.
    /// `None` means the orchestrator's configured default applies.
    pub deadline_ms: Option<i64>,
    pub priority: u8,
    pub strategy_override: Option<StrategyTag>,
}

impl MoveRequest {
    pub fn new(game_id: impl Into<String>, board: Board, player: PlayerColor, difficulty: u8) -> Self {
        Self {
            game_id: game_id.into(),
            board,
            player,
            difficulty,
            deadline_ms: None,
            priority: 5,
            strategy_override: None,
        }
    }

    pub fn with_priority(mut self, priority: u8) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_deadline_ms(mut self, deadline_ms: i64) -> Self {
        self.deadline_ms = Some(deadline_ms);
        self
    }

    /// Structural validation: difficulty in range, board respects gravity,
    /// and there is at least one legal move.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.difficulty < MIN_DIFFICULTY || self.difficulty > MAX_DIFFICULTY {
            return Err(CoreError::invalid_input(format!(
                "difficulty {} out of range [{MIN_DIFFICULTY}, {MAX_DIFFICULTY}]",
                self.difficulty
            )));
        }
        if self.priority < MIN_PRIORITY || self.priority > MAX_PRIORITY {
            return Err(CoreError::invalid_input(format!(
                "priority {} out of range [{MIN_PRIORITY}, {MAX_PRIORITY}]",
                self.priority
            )));
        }
        if !self.board.respects_gravity() {
            return Err(CoreError::invalid_input("board violates gravity"));
        }
        if self.board.is_full() {
            return Err(CoreError::NoLegalMove);
        }
        Ok(())
    }
}

/// A candidate alternative move, surfaced alongside the chosen one for
/// explainability.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct Alternative {
    pub column: usize,
    pub score: f32,
    pub reasoning: String,
}

/// Orchestrator output for a single `GetMove` call.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct MoveResponse {
    pub column: usize,
    pub confidence: f32,
    pub strategy_used: StrategyTag,
    pub compute_millis: u64,
    pub cached: bool,
    pub reasoning: String,
    pub alternatives: Vec<Alternative>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn difficulty_out_of_range_is_invalid_input() {
        let req = MoveRequest::new("g1", Board::default(), PlayerColor::Red, 26);
        assert!(matches!(req.validate(), Err(CoreError::InvalidInput(_))));
    }

    #[test]
    fn full_board_is_no_legal_move() {
        let mut board = Board::default();
        for col in 0..crate::board::COLS {
            for _ in 0..crate::board::ROWS {
                board = board.drop_piece(col, PlayerColor::Red).unwrap();
            }
        }
        let req = MoveRequest::new("g1", board, PlayerColor::Red, 5);
        assert!(matches!(req.validate(), Err(CoreError::NoLegalMove)));
    }

    #[test]
    fn fallback_chain_terminates_at_minimax() {
        assert_eq!(StrategyTag::Heaviest.simpler(), StrategyTag::Mcts);
        assert_eq!(StrategyTag::Mcts.simpler(), StrategyTag::AlphaBeta);
        assert_eq!(StrategyTag::AlphaBeta.simpler(), StrategyTag::Minimax);
        assert_eq!(StrategyTag::Minimax.simpler(), StrategyTag::Minimax);
    }
}
