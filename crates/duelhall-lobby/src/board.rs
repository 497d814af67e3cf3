//! The 3×3 board and its terminal-condition check.

use duelhall_protocol::{CELL_COUNT, Role};

/// Every line that wins the game: three rows, three columns, two diagonals.
///
/// Cells are numbered row-major:
///
/// ```text
///  0 | 1 | 2
///  3 | 4 | 5
///  6 | 7 | 8
/// ```
pub const WINNING_LINES: [[usize; 3]; 8] = [
    [0, 1, 2],
    [3, 4, 5],
    [6, 7, 8],
    [0, 3, 6],
    [1, 4, 7],
    [2, 5, 8],
    [0, 4, 8],
    [2, 4, 6],
];

/// Board cells, each empty or holding one role's marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Board {
    cells: [Option<Role>; CELL_COUNT],
}

impl Board {
    /// Creates an empty board.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if `index` is on the board and empty.
    pub fn is_free(&self, index: usize) -> bool {
        index < CELL_COUNT && self.cells[index].is_none()
    }

    /// Writes `role` into `index`. Callers check [`is_free`](Self::is_free)
    /// first; an out-of-range index is ignored.
    pub fn place(&mut self, index: usize, role: Role) {
        if let Some(cell) = self.cells.get_mut(index) {
            *cell = Some(role);
        }
    }

    /// Number of non-empty cells.
    pub fn filled(&self) -> usize {
        self.cells.iter().filter(|c| c.is_some()).count()
    }

    /// Returns `true` when no empty cell is left.
    pub fn is_full(&self) -> bool {
        self.filled() == CELL_COUNT
    }

    /// Copy of the raw cells, for snapshots.
    pub fn cells(&self) -> [Option<Role>; CELL_COUNT] {
        self.cells
    }

    /// Returns the marker of the first completed line, if any.
    ///
    /// All lines are checked, not just the first hit. Under strict
    /// alternation only one marker can ever complete a line, so the first
    /// line found is the only winner; a board where both markers complete
    /// a line is logged and the first line in [`WINNING_LINES`] order wins.
    pub fn winner(&self) -> Option<Role> {
        let mut completed = WINNING_LINES.iter().filter_map(|line| {
            let first = self.cells[line[0]]?;
            line.iter()
                .all(|&i| self.cells[i] == Some(first))
                .then_some(first)
        });

        let winner = completed.next()?;
        if completed.any(|other| other != winner) {
            tracing::warn!(
                %winner,
                "board has completed lines for both markers"
            );
        }
        Some(winner)
    }
}
