use cf_core::Board;
use cf_core::MoveResponse;
use cf_core::PlayerColor;
use cf_core::StrategyTag;

/// Degraded-but-always-available move selection, used when the breaker is
/// open or the compute call fails after retries:
/// centre preference, else the first legal move, confidence 0.3, reported
/// under the `minimax` label regardless of what was actually attempted.
pub(crate) fn fallback_response(board: &Board, player: PlayerColor) -> MoveResponse {
    let legal = board.legal_moves();
    let center = cf_core::COLS / 2;
    let column = if legal.contains(&center) {
        center
    } else {
        *legal.first().expect("fallback invoked on a board with no legal moves; caller must validate first")
    };
    let _ = player;
    MoveResponse {
        column,
        confidence: 0.3,
        strategy_used: StrategyTag::Minimax,
        compute_millis: 0,
        cached: false,
        reasoning: "fallback: compute path unavailable, chose centre-preferred legal move".to_string(),
        alternatives: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefers_the_centre_column_when_open() {
        let board = Board::empty();
        let response = fallback_response(&board, PlayerColor::Red);
        assert_eq!(response.column, cf_core::COLS / 2);
        assert_eq!(response.confidence, 0.3);
        assert_eq!(response.strategy_used, StrategyTag::Minimax);
    }

    #[test]
    fn falls_back_to_any_legal_move_when_centre_is_full() {
        let mut board = Board::empty();
        for _ in 0..cf_core::ROWS {
            board = board.drop_piece(cf_core::COLS / 2, PlayerColor::Red).unwrap();
        }
        let response = fallback_response(&board, PlayerColor::Red);
        assert_ne!(response.column, cf_core::COLS / 2);
        assert!(board.legal_moves().contains(&response.column));
    }
}
