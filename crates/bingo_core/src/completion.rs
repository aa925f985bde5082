//! Completion detection: rows, columns, diagonals and the full board.

use crate::board::BoardConfiguration;
use derive_more::Display;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::instrument;

/// Main diagonal, top-left to bottom-right.
pub const MAIN_DIAGONAL: usize = 0;

/// Anti-diagonal, top-right to bottom-left.
pub const ANTI_DIAGONAL: usize = 1;

/// One specific completion instance on the board.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, Serialize, Deserialize,
)]
#[serde(tag = "type", content = "index", rename_all = "camelCase")]
pub enum CompletionKey {
    /// A completed row.
    #[display("row {_0}")]
    Row(usize),
    /// A completed column.
    #[display("column {_0}")]
    Column(usize),
    /// A completed diagonal, [`MAIN_DIAGONAL`] or [`ANTI_DIAGONAL`].
    #[display("diagonal {_0}")]
    Diagonal(usize),
    /// Every square checked.
    #[display("full board")]
    FullBoard,
}

/// Every completion a single player has reached.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionResult {
    /// Completed row indices, ascending.
    pub rows: BTreeSet<usize>,
    /// Completed column indices, ascending.
    pub columns: BTreeSet<usize>,
    /// Completed diagonals, a subset of `{0, 1}`.
    pub diagonals: BTreeSet<usize>,
    /// Whether every square is checked.
    pub full_board: bool,
}

impl CompletionResult {
    /// Achieved completions as keys, rows first then columns, diagonals and
    /// the full board.
    pub fn keys(&self) -> Vec<CompletionKey> {
        let mut keys: Vec<CompletionKey> = self
            .rows
            .iter()
            .map(|&r| CompletionKey::Row(r))
            .chain(self.columns.iter().map(|&c| CompletionKey::Column(c)))
            .chain(self.diagonals.iter().map(|&d| CompletionKey::Diagonal(d)))
            .collect();
        if self.full_board {
            keys.push(CompletionKey::FullBoard);
        }
        keys
    }

    /// Whether this result contains `key`.
    pub fn contains(&self, key: CompletionKey) -> bool {
        match key {
            CompletionKey::Row(r) => self.rows.contains(&r),
            CompletionKey::Column(c) => self.columns.contains(&c),
            CompletionKey::Diagonal(d) => self.diagonals.contains(&d),
            CompletionKey::FullBoard => self.full_board,
        }
    }

    /// Keys present here but not in `earlier`, in [`Self::keys`] order.
    pub fn newly_achieved(&self, earlier: &CompletionResult) -> Vec<CompletionKey> {
        self.keys()
            .into_iter()
            .filter(|key| !earlier.contains(*key))
            .collect()
    }

    /// Whether nothing is complete.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
            && self.columns.is_empty()
            && self.diagonals.is_empty()
            && !self.full_board
    }
}

/// Computes every completion the checked squares satisfy.
///
/// Pure and deterministic. Indices outside the board are ignored.
#[instrument(skip(config, checked), fields(checked = checked.len()))]
pub fn compute_completions(
    config: &BoardConfiguration,
    checked: &BTreeSet<usize>,
) -> CompletionResult {
    let size = *config.board_size();
    let is_checked = |index: usize| checked.contains(&index);

    let rows = (0..size.rows)
        .filter(|&r| (0..size.columns).all(|c| is_checked(size.index(r, c))))
        .collect();

    let columns = (0..size.columns)
        .filter(|&c| (0..size.rows).all(|r| is_checked(size.index(r, c))))
        .collect();

    let mut diagonals = BTreeSet::new();
    if size.is_square() {
        let n = size.rows;
        if (0..n).all(|i| is_checked(size.index(i, i))) {
            diagonals.insert(MAIN_DIAGONAL);
        }
        if (0..n).all(|i| is_checked(size.index(i, n - 1 - i))) {
            diagonals.insert(ANTI_DIAGONAL);
        }
    }

    let total = size.total_squares();
    let in_range = checked.range(..total).count();

    CompletionResult {
        rows,
        columns,
        diagonals,
        full_board: total > 0 && in_range == total,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::CompletionBonuses;
    use crate::board::fixtures::uniform_board;

    fn checked(indices: &[usize]) -> BTreeSet<usize> {
        indices.iter().copied().collect()
    }

    #[test]
    fn test_empty_board_has_no_completions() {
        let config = uniform_board(3, 3, 10, CompletionBonuses::default(), false);
        assert!(compute_completions(&config, &BTreeSet::new()).is_empty());
    }

    #[test]
    fn test_top_row() {
        let config = uniform_board(3, 3, 10, CompletionBonuses::default(), false);
        let result = compute_completions(&config, &checked(&[0, 1, 2]));
        assert_eq!(result.rows, checked(&[0]));
        assert!(result.columns.is_empty());
        assert!(result.diagonals.is_empty());
        assert!(!result.full_board);
    }

    #[test]
    fn test_middle_column() {
        let config = uniform_board(3, 3, 10, CompletionBonuses::default(), false);
        let result = compute_completions(&config, &checked(&[1, 4, 7]));
        assert_eq!(result.columns, checked(&[1]));
        assert!(result.rows.is_empty());
    }

    #[test]
    fn test_main_diagonal_on_every_square_size() {
        for n in 1..=6 {
            let config = uniform_board(n, n, 1, CompletionBonuses::default(), false);
            let diagonal: BTreeSet<usize> = (0..n).map(|i| i * n + i).collect();
            let result = compute_completions(&config, &diagonal);
            assert!(result.diagonals.contains(&MAIN_DIAGONAL), "n = {n}");
            if n > 1 {
                assert!(!result.diagonals.contains(&ANTI_DIAGONAL), "n = {n}");
            }
        }
    }

    #[test]
    fn test_anti_diagonal() {
        let config = uniform_board(3, 3, 10, CompletionBonuses::default(), false);
        let result = compute_completions(&config, &checked(&[2, 4, 6]));
        assert_eq!(result.diagonals, checked(&[ANTI_DIAGONAL]));
    }

    #[test]
    fn test_non_square_board_has_no_diagonals() {
        let config = uniform_board(2, 3, 1, CompletionBonuses::default(), false);
        let result = compute_completions(&config, &checked(&[0, 1, 2, 3, 4, 5]));
        assert!(result.diagonals.is_empty());
        assert_eq!(result.rows, checked(&[0, 1]));
        assert_eq!(result.columns, checked(&[0, 1, 2]));
        assert!(result.full_board);
    }

    #[test]
    fn test_single_row_board() {
        let config = uniform_board(1, 4, 1, CompletionBonuses::default(), false);
        let result = compute_completions(&config, &checked(&[2]));
        assert_eq!(result.columns, checked(&[2]));
        assert!(result.rows.is_empty());

        let result = compute_completions(&config, &checked(&[0, 1, 2, 3]));
        assert_eq!(result.rows, checked(&[0]));
        assert_eq!(result.columns, checked(&[0, 1, 2, 3]));
        assert!(result.diagonals.is_empty());
        assert!(result.full_board);
    }

    #[test]
    fn test_out_of_range_indices_ignored() {
        let config = uniform_board(2, 2, 1, CompletionBonuses::default(), false);
        let result = compute_completions(&config, &checked(&[0, 1, 2, 99, 100]));
        assert!(!result.full_board);
        assert_eq!(result.rows, checked(&[0]));
    }

    #[test]
    fn test_idempotent() {
        let config = uniform_board(4, 4, 1, CompletionBonuses::default(), false);
        let squares = checked(&[0, 5, 10, 15, 3, 7, 11]);
        assert_eq!(
            compute_completions(&config, &squares),
            compute_completions(&config, &squares)
        );
    }

    #[test]
    fn test_newly_achieved_only_reports_new_keys() {
        let config = uniform_board(3, 3, 1, CompletionBonuses::default(), false);
        let before = compute_completions(&config, &checked(&[0, 1, 2, 3, 6]));
        let after = compute_completions(&config, &checked(&[0, 1, 2, 3, 6, 4, 8]));
        assert_eq!(
            after.newly_achieved(&before),
            vec![
                CompletionKey::Diagonal(MAIN_DIAGONAL),
                CompletionKey::Diagonal(ANTI_DIAGONAL)
            ]
        );
        assert!(before.newly_achieved(&before).is_empty());
    }
}
