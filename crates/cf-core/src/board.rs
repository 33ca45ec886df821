use crate::error::CoreError;
use std::fmt;

/// Board height.
pub const ROWS: usize = 6;
/// Board width.
pub const COLS: usize = 7;

/// Contents of a single board cell. Row 0 is the top of the board; row
/// `ROWS - 1` is the floor a dropped piece settles against.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum Cell {
    Empty,
    Red,
    Yellow,
}

impl Cell {
    fn code(self) -> char {
        match self {
            Cell::Empty => '0',
            Cell::Red => '1',
            Cell::Yellow => '2',
        }
    }
}

/// The two players. A plain two-variant enum is enough since Connect Four
/// has no chance element affecting whose turn it is.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum PlayerColor {
    Red,
    Yellow,
}

impl PlayerColor {
    pub fn opponent(self) -> Self {
        match self {
            PlayerColor::Red => PlayerColor::Yellow,
            PlayerColor::Yellow => PlayerColor::Red,
        }
    }
    fn tag(self) -> char {
        match self {
            PlayerColor::Red => 'R',
            PlayerColor::Yellow => 'Y',
        }
    }
}

impl From<PlayerColor> for Cell {
    fn from(p: PlayerColor) -> Self {
        match p {
            PlayerColor::Red => Cell::Red,
            PlayerColor::Yellow => Cell::Yellow,
        }
    }
}

/// Canonical string identity of a board-and-player pair used as a cache key.
/// Same board plus active player always produces the same fingerprint,
/// byte-for-byte: 42 cell codes in row-major order, followed by `-R`/`-Y`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 6x7 Connect Four board. Immutable from the core's point of view: the
/// core never mutates a caller's board, it only derives new boards via
/// [`Board::drop_piece`].
#[derive(Clone, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Board {
    rows: [[Cell; COLS]; ROWS],
}

impl Default for Board {
    fn default() -> Self {
        Self {
            rows: [[Cell::Empty; COLS]; ROWS],
        }
    }
}

impl Board {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Construct a board from row-major rows, top row first. Used mostly by
    /// tests and by callers reconstructing a board from a wire format.
    pub fn from_rows(rows: [[Cell; COLS]; ROWS]) -> Self {
        Self { rows }
    }

    pub fn cell(&self, row: usize, col: usize) -> Cell {
        self.rows[row][col]
    }

    pub fn rows(&self) -> &[[Cell; COLS]; ROWS] {
        &self.rows
    }

    /// True if every gravity invariant holds: a cell can be non-empty only
    /// if the cell directly below it is non-empty (the bottom row is exempt).
    pub fn respects_gravity(&self) -> bool {
        (0..COLS).all(|c| {
            (0..ROWS - 1).all(|r| {
                self.rows[r][c] == Cell::Empty || self.rows[r + 1][c] != Cell::Empty
            })
        })
    }

    /// Fraction of cells occupied, used by the strategy selector's phase
    /// classification.
    pub fn fill_ratio(&self) -> f32 {
        let filled = self
            .rows
            .iter()
            .flatten()
            .filter(|c| **c != Cell::Empty)
            .count();
        filled as f32 / (ROWS * COLS) as f32
    }

    /// Number of pieces already on the board, i.e. the move number about to
    /// be played (0-indexed).
    pub fn move_number(&self) -> usize {
        self.rows.iter().flatten().filter(|c| **c != Cell::Empty).count()
    }

    pub fn is_full(&self) -> bool {
        (0..COLS).all(|c| self.rows[0][c] != Cell::Empty)
    }

    /// Columns whose top cell is empty, i.e. still accept a piece.
    pub fn legal_moves(&self) -> Vec<usize> {
        (0..COLS).filter(|&c| self.rows[0][c] == Cell::Empty).collect()
    }

    pub fn column_full(&self, col: usize) -> bool {
        col >= COLS || self.rows[0][col] != Cell::Empty
    }

    /// Lowest empty row in `col`, or `None` if the column is full.
    fn landing_row(&self, col: usize) -> Option<usize> {
        (0..ROWS).rev().find(|&r| self.rows[r][col] == Cell::Empty)
    }

    /// Drop `player`'s piece into `col`, returning the resulting board.
    /// Fails with `CoreError::NoLegalMove` if the column is full and with
    /// `CoreError::InvalidInput` if `col` is out of range.
    pub fn drop_piece(&self, col: usize, player: PlayerColor) -> Result<Board, CoreError> {
        if col >= COLS {
            return Err(CoreError::invalid_input(format!("column {col} out of range")));
        }
        let row = self
            .landing_row(col)
            .ok_or_else(|| CoreError::NoLegalMove)?;
        let mut next = self.clone();
        next.rows[row][col] = Cell::from(player);
        Ok(next)
    }

    /// Whether dropping `player`'s piece into `col` would complete four in a
    /// row. Used by the precompute heuristic (immediate win / block
    /// detection) and by the orchestrator's fallback path.
    pub fn would_win(&self, col: usize, player: PlayerColor) -> bool {
        match self.drop_piece(col, player) {
            Ok(next) => next.winner() == Some(player),
            Err(_) => false,
        }
    }

    /// First four-in-a-row winner found on the board, if any.
    pub fn winner(&self) -> Option<PlayerColor> {
        const DIRS: [(isize, isize); 4] = [(0, 1), (1, 0), (1, 1), (1, -1)];
        for r in 0..ROWS as isize {
            for c in 0..COLS as isize {
                let cell = self.rows[r as usize][c as usize];
                if cell == Cell::Empty {
                    continue;
                }
                for (dr, dc) in DIRS {
                    let run = (0..4).all(|k| {
                        let rr = r + dr * k;
                        let cc = c + dc * k;
                        rr >= 0
                            && rr < ROWS as isize
                            && cc >= 0
                            && cc < COLS as isize
                            && self.rows[rr as usize][cc as usize] == cell
                    });
                    if run {
                        return Some(match cell {
                            Cell::Red => PlayerColor::Red,
                            Cell::Yellow => PlayerColor::Yellow,
                            Cell::Empty => unreachable!(),
                        });
                    }
                }
            }
        }
        None
    }

    /// Canonical (board, player) identity used as a cache key.
    pub fn fingerprint(&self, active: PlayerColor) -> Fingerprint {
        let mut s = String::with_capacity(ROWS * COLS + 2);
        for row in &self.rows {
            for cell in row {
                s.push(cell.code());
            }
        }
        s.push('-');
        s.push(active.tag());
        Fingerprint(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_board_fingerprint_matches_spec_example() {
        let board = Board::empty();
        let fp = board.fingerprint(PlayerColor::Red);
        assert_eq!(
            fp.as_str(),
            "000000000000000000000000000000000000000000-R"
        );
    }

    #[test]
    fn identical_board_and_player_yield_identical_fingerprint() {
        let a = Board::empty().drop_piece(3, PlayerColor::Red).unwrap();
        let b = Board::empty().drop_piece(3, PlayerColor::Red).unwrap();
        assert_eq!(a.fingerprint(PlayerColor::Yellow), b.fingerprint(PlayerColor::Yellow));
    }

    #[test]
    fn gravity_respected_after_drop() {
        let board = Board::empty()
            .drop_piece(0, PlayerColor::Red)
            .unwrap()
            .drop_piece(0, PlayerColor::Yellow)
            .unwrap();
        assert!(board.respects_gravity());
        assert_eq!(board.cell(ROWS - 1, 0), Cell::Red);
        assert_eq!(board.cell(ROWS - 2, 0), Cell::Yellow);
    }

    #[test]
    fn gravity_violation_detected() {
        let mut rows = [[Cell::Empty; COLS]; ROWS];
        rows[0][0] = Cell::Red; // floating piece, nothing beneath it
        let board = Board::from_rows(rows);
        assert!(!board.respects_gravity());
    }

    #[test]
    fn full_column_rejects_drop() {
        let mut board = Board::empty();
        for _ in 0..ROWS {
            board = board.drop_piece(0, PlayerColor::Red).unwrap();
        }
        assert!(board.column_full(0));
        assert!(matches!(board.drop_piece(0, PlayerColor::Red), Err(CoreError::NoLegalMove)));
        assert!(!board.legal_moves().contains(&0));
    }

    #[test]
    fn detects_horizontal_win() {
        let mut board = Board::empty();
        for col in 0..3 {
            board = board.drop_piece(col, PlayerColor::Red).unwrap();
        }
        assert!(board.would_win(3, PlayerColor::Red));
        let won = board.drop_piece(3, PlayerColor::Red).unwrap();
        assert_eq!(won.winner(), Some(PlayerColor::Red));
    }

    #[test]
    fn blocks_opponent_immediate_win() {
        let mut board = Board::empty();
        for col in 0..3 {
            board = board.drop_piece(col, PlayerColor::Yellow).unwrap();
        }
        assert!(board.would_win(3, PlayerColor::Yellow));
        assert!(!board.would_win(3, PlayerColor::Red));
    }

    #[test]
    fn fill_ratio_tracks_move_count() {
        let board = Board::empty();
        assert_eq!(board.fill_ratio(), 0.0);
        let board = board.drop_piece(0, PlayerColor::Red).unwrap();
        assert!((board.fill_ratio() - 1.0 / (ROWS * COLS) as f32).abs() < 1e-6);
        assert_eq!(board.move_number(), 1);
    }
}
