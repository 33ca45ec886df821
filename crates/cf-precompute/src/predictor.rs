use cf_core::Board;
use cf_core::PlayerColor;
use cf_core::COLS;

/// Decay applied to a child position's probability relative to its parent.
const DECAY: f32 = 0.8;
/// Only expand children whose own move probability exceeds this.
const EXPAND_THRESHOLD: f32 = 0.1;
/// Only recurse past a position whose cumulative probability exceeds this.
const RECURSE_THRESHOLD: f32 = 0.3;
/// How many predicted positions `predict_positions` returns at most.
const TOP_N: usize = 20;

/// One speculative future position, the board after some move with `player`
/// to move next, and the probability the engine assigns to reaching it.
#[derive(Clone, Debug)]
pub(crate) struct PredictedPosition {
    pub(crate) board: Board,
    pub(crate) player: PlayerColor,
    pub(crate) probability: f32,
    pub(crate) move_number: usize,
}

/// Heuristic probability that `mover` plays `col` next: base rate, a
/// positional bonus for the center and its neighbours, and large bonuses
/// for an immediate win or blocking the opponent's immediate win.
fn move_heuristic(board: &Board, col: usize, mover: PlayerColor) -> f32 {
    let center = COLS / 2;
    let mut score = 0.1;
    if col == center {
        score += 0.2;
    } else if col + 1 == center || col == center + 1 {
        score += 0.1;
    }
    if board.would_win(col, mover) {
        score += 0.9;
    } else if board.would_win(col, mover.opponent()) {
        score += 0.8;
    }
    score
}

/// Enumerates `mover`'s legal moves on `board` with normalised heuristic
/// probabilities.
fn scored_moves(board: &Board, mover: PlayerColor) -> Vec<(usize, f32)> {
    let legal = board.legal_moves();
    let raw: Vec<(usize, f32)> = legal.iter().map(|&col| (col, move_heuristic(board, col, mover))).collect();
    let total: f32 = raw.iter().map(|(_, s)| s).sum();
    if total <= 0.0 {
        return raw;
    }
    raw.into_iter().map(|(col, s)| (col, s / total)).collect()
}

fn recurse(board: &Board, mover: PlayerColor, lookahead: u8, parent_probability: f32, out: &mut Vec<PredictedPosition>) {
    for (col, move_probability) in scored_moves(board, mover) {
        if move_probability <= EXPAND_THRESHOLD {
            continue;
        }
        let child = match board.drop_piece(col, mover) {
            Ok(child) => child,
            Err(_) => continue,
        };
        let probability = parent_probability * move_probability;
        let next_mover = mover.opponent();
        out.push(PredictedPosition { board: child.clone(), player: next_mover, probability, move_number: child.move_number() });
        if lookahead > 0 && probability > RECURSE_THRESHOLD {
            recurse(&child, next_mover, lookahead - 1, probability * DECAY, out);
        }
    }
}

/// Top `TOP_N` likely next positions reachable from `(board, player)` within
/// `lookahead` plies, each with the opponent (or `player` again, two plies
/// down) to move.
pub(crate) fn predict_positions(board: &Board, player: PlayerColor, lookahead: u8) -> Vec<PredictedPosition> {
    let mut out = Vec::new();
    recurse(board, player, lookahead, 1.0, &mut out);
    out.sort_by(|a, b| b.probability.partial_cmp(&a.probability).unwrap_or(std::cmp::Ordering::Equal));
    out.truncate(TOP_N);
    out
}

/// Compute depth assigned to a predicted position.
pub(crate) fn compute_depth(move_number: usize) -> u8 {
    (8usize.saturating_sub(move_number)).max(4) as u8
}

/// Priority assigned to a predicted position.
pub(crate) fn priority_for(probability: f32) -> f32 {
    probability * 10.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use cf_core::Board;

    #[test]
    fn center_column_scores_higher_than_edge_on_empty_board() {
        let board = Board::empty();
        let scored = scored_moves(&board, PlayerColor::Red);
        let center = scored.iter().find(|(c, _)| *c == COLS / 2).unwrap().1;
        let edge = scored.iter().find(|(c, _)| *c == 0).unwrap().1;
        assert!(center > edge);
    }

    #[test]
    fn probabilities_normalise_to_one_on_empty_board() {
        let board = Board::empty();
        let scored = scored_moves(&board, PlayerColor::Red);
        let total: f32 = scored.iter().map(|(_, p)| p).sum();
        assert!((total - 1.0).abs() < 1e-5);
    }

    #[test]
    fn immediate_win_dominates_the_heuristic() {
        let mut board = Board::empty();
        for col in 0..3 {
            board = board.drop_piece(col, PlayerColor::Red).unwrap();
        }
        let scored = scored_moves(&board, PlayerColor::Red);
        let winning = scored.iter().find(|(c, _)| *c == 3).unwrap().1;
        assert!(scored.iter().all(|(c, p)| *c == 3 || *p <= winning));
    }

    #[test]
    fn predict_positions_returns_at_most_top_n() {
        let board = Board::empty();
        let predicted = predict_positions(&board, PlayerColor::Red, 2);
        assert!(predicted.len() <= TOP_N);
        assert!(!predicted.is_empty());
    }

    #[test]
    fn predicted_positions_have_opponent_to_move() {
        let board = Board::empty();
        let predicted = predict_positions(&board, PlayerColor::Red, 1);
        assert!(predicted.iter().all(|p| p.player == PlayerColor::Yellow));
    }

    #[test]
    fn compute_depth_floors_at_four() {
        assert_eq!(compute_depth(0), 8);
        assert_eq!(compute_depth(6), 4);
        assert_eq!(compute_depth(20), 4);
    }
}
