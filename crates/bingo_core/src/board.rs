//! Board configuration domain types.
//!
//! A [`BoardConfiguration`] is built once by the validator and then shared
//! read-only by every player in the session. Square indices are row-major
//! and zero-based: square `r * columns + c` sits at row `r`, column `c`.

use derive_getters::Getters;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::instrument;

/// Fallback display color for squares whose rarity has no color entry.
pub const DEFAULT_COLOR: &str = "#808080";

/// Grid dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BoardSize {
    /// Number of rows.
    pub rows: usize,
    /// Number of columns.
    pub columns: usize,
}

impl BoardSize {
    /// Creates a new board size.
    pub fn new(rows: usize, columns: usize) -> Self {
        Self { rows, columns }
    }

    /// Total number of squares on the board.
    pub fn total_squares(&self) -> usize {
        self.rows.saturating_mul(self.columns)
    }

    /// Whether the board is square, which is the only shape with diagonals.
    pub fn is_square(&self) -> bool {
        self.rows == self.columns
    }

    /// Row-major index of the square at `(row, column)`.
    pub fn index(&self, row: usize, column: usize) -> usize {
        row * self.columns + column
    }
}

/// A single square on the board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Getters)]
pub struct Square {
    name: String,
    rarity: String,
    points: i64,
}

impl Square {
    /// Creates a new square.
    pub fn new(name: impl Into<String>, rarity: impl Into<String>, points: i64) -> Self {
        Self {
            name: name.into(),
            rarity: rarity.into(),
            points,
        }
    }
}

/// Bonus points awarded for completing lines and the full board.
///
/// Every amount defaults to zero when absent from the configuration file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionBonuses {
    /// Bonus per completed row.
    #[serde(default)]
    pub row: u32,
    /// Bonus per completed column.
    #[serde(default)]
    pub column: u32,
    /// Bonus per completed diagonal.
    #[serde(default)]
    pub diagonal: u32,
    /// Bonus for checking every square.
    #[serde(default)]
    pub full_board: u32,
    /// Only the first player to reach a completion earns its bonus.
    #[serde(default)]
    pub only_first_player_gets_bonus: bool,
}

/// Validated, immutable board configuration.
///
/// Construct through [`crate::validate`] or [`crate::parse`]; the invariants
/// (square count matches the grid, every rarity has a color) are only
/// checked there.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Getters)]
#[serde(rename_all = "camelCase")]
pub struct BoardConfiguration {
    board_size: BoardSize,
    squares: Vec<Square>,
    rarity_colors: BTreeMap<String, String>,
    completion_bonuses: CompletionBonuses,
    #[serde(default)]
    exclusive_squares: bool,
}

impl BoardConfiguration {
    /// Number of squares the grid declares.
    pub fn total_squares(&self) -> usize {
        self.board_size.total_squares()
    }

    /// Looks up a square by index. Out-of-range indices yield `None`.
    pub fn square(&self, index: usize) -> Option<&Square> {
        self.squares.get(index)
    }

    /// Whether `index` names a square on this board.
    pub fn contains(&self, index: usize) -> bool {
        index < self.total_squares()
    }

    /// Points for a square, or zero when the index is out of range.
    pub fn points(&self, index: usize) -> i64 {
        self.square(index).map_or(0, |square| square.points)
    }

    /// Display color for a square, falling back to [`DEFAULT_COLOR`].
    #[instrument(skip(self))]
    pub fn color_for(&self, index: usize) -> &str {
        self.square(index)
            .and_then(|square| self.rarity_colors.get(&square.rarity))
            .map_or(DEFAULT_COLOR, String::as_str)
    }

    /// Checks the structural invariant that the square list fills the grid.
    pub fn is_consistent(&self) -> bool {
        self.squares.len() == self.total_squares()
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    /// Builds an already-valid configuration without going through JSON.
    pub fn uniform_board(
        rows: usize,
        columns: usize,
        points: i64,
        bonuses: CompletionBonuses,
        exclusive_squares: bool,
    ) -> BoardConfiguration {
        let size = BoardSize::new(rows, columns);
        let squares = (0..size.total_squares())
            .map(|i| Square::new(format!("Square {i}"), "common", points))
            .collect();
        let mut rarity_colors = BTreeMap::new();
        rarity_colors.insert("common".to_string(), "#ffffff".to_string());
        BoardConfiguration {
            board_size: size,
            squares,
            rarity_colors,
            completion_bonuses: bonuses,
            exclusive_squares,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::uniform_board;
    use super::*;

    #[test]
    fn test_index_is_row_major() {
        let size = BoardSize::new(2, 3);
        assert_eq!(size.index(0, 2), 2);
        assert_eq!(size.index(1, 0), 3);
        assert_eq!(size.total_squares(), 6);
        assert!(!size.is_square());
    }

    #[test]
    fn test_points_out_of_range_is_zero() {
        let config = uniform_board(3, 3, 10, CompletionBonuses::default(), false);
        assert_eq!(config.points(4), 10);
        assert_eq!(config.points(9), 0);
        assert_eq!(config.points(usize::MAX), 0);
    }

    #[test]
    fn test_color_falls_back_to_default() {
        let config = uniform_board(1, 2, 1, CompletionBonuses::default(), false);
        assert_eq!(config.color_for(0), "#ffffff");
        assert_eq!(config.color_for(7), DEFAULT_COLOR);
    }
}
