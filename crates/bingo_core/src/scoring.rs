//! Score derivation.
//!
//! A score is the sum of the points of every held square plus completion
//! bonuses. When the board awards bonuses only to the first finisher, the
//! claim ledger decides who that was.
//!
//! All sums saturate at `i64::MAX` instead of overflowing.

use crate::board::{BoardConfiguration, CompletionBonuses};
use crate::completion::CompletionKey;
use crate::ledger::ClaimLedger;
use crate::player::PlayerState;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter};
use tracing::{debug, instrument};

/// Bonus categories, one per completion shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "camelCase")]
pub enum BonusCategory {
    /// Completed rows.
    Row,
    /// Completed columns.
    Column,
    /// Completed diagonals.
    Diagonal,
    /// The whole board.
    FullBoard,
}

impl BonusCategory {
    /// Category a completion instance belongs to.
    pub fn of(key: CompletionKey) -> Self {
        match key {
            CompletionKey::Row(_) => Self::Row,
            CompletionKey::Column(_) => Self::Column,
            CompletionKey::Diagonal(_) => Self::Diagonal,
            CompletionKey::FullBoard => Self::FullBoard,
        }
    }

    /// Configured bonus for one completion in this category.
    pub fn amount(self, bonuses: &CompletionBonuses) -> i64 {
        let amount = match self {
            Self::Row => bonuses.row,
            Self::Column => bonuses.column,
            Self::Diagonal => bonuses.diagonal,
            Self::FullBoard => bonuses.full_board,
        };
        i64::from(amount)
    }
}

/// Score split into its parts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreBreakdown {
    /// Sum of held squares' points.
    pub base: i64,
    /// Row bonuses earned.
    pub rows: i64,
    /// Column bonuses earned.
    pub columns: i64,
    /// Diagonal bonuses earned.
    pub diagonals: i64,
    /// Full-board bonus earned.
    pub full_board: i64,
}

impl ScoreBreakdown {
    /// The final score.
    pub fn total(&self) -> i64 {
        self.base.saturating_add(self.bonus())
    }

    /// All bonuses together.
    pub fn bonus(&self) -> i64 {
        [self.columns, self.diagonals, self.full_board]
            .into_iter()
            .fold(self.rows, i64::saturating_add)
    }

    fn add_bonus(&mut self, category: BonusCategory, amount: i64) {
        let slot = match category {
            BonusCategory::Row => &mut self.rows,
            BonusCategory::Column => &mut self.columns,
            BonusCategory::Diagonal => &mut self.diagonals,
            BonusCategory::FullBoard => &mut self.full_board,
        };
        *slot = slot.saturating_add(amount);
    }
}

/// Computes a player's score.
///
/// Pure: the same configuration, player and ledger always give the same
/// result.
#[instrument(skip_all, fields(player_id = %player.id))]
pub fn compute_score(
    config: &BoardConfiguration,
    player: &PlayerState,
    ledger: &ClaimLedger,
) -> i64 {
    score_breakdown(config, player, ledger).total()
}

/// Computes a player's score split into base points and bonuses.
#[instrument(skip_all, fields(player_id = %player.id))]
pub fn score_breakdown(
    config: &BoardConfiguration,
    player: &PlayerState,
    ledger: &ClaimLedger,
) -> ScoreBreakdown {
    let bonuses = config.completion_bonuses();
    let mut breakdown = ScoreBreakdown {
        base: player
            .checked_squares
            .iter()
            .map(|&i| config.points(i))
            .fold(0, i64::saturating_add),
        ..ScoreBreakdown::default()
    };

    for key in player.completions.keys() {
        let earned = !bonuses.only_first_player_gets_bonus || ledger.is_first(&player.id, key);
        if earned {
            let category = BonusCategory::of(key);
            breakdown.add_bonus(category, category.amount(bonuses));
        } else {
            debug!(%key, "Completion not first, no bonus");
        }
    }

    breakdown
}
