//! Pure bingo session logic.
//!
//! Everything here is free of I/O and locking so it can be driven by any
//! backend:
//!
//! - **Board**: validated, immutable board configuration
//! - **Completion**: rows, columns, diagonals and full board from a checked set
//! - **Ledger**: totally ordered claim record deciding who finished first
//! - **Scoring**: points plus completion bonuses
//!
//! # Example
//!
//! ```
//! use bingo_core::{ClaimLedger, PlayerState, compute_completions, compute_score, parse};
//!
//! let config = parse(r##"{
//!     "boardSize": {"rows": 1, "columns": 2},
//!     "squares": [
//!         {"name": "Free", "rarity": "common", "points": 5},
//!         {"name": "Dragon", "rarity": "rare", "points": 20}
//!     ],
//!     "rarityColors": {"common": "#cccccc", "rare": "#3366ff"},
//!     "completionBonuses": {"row": 10}
//! }"##).unwrap();
//!
//! let mut player = PlayerState::new("p1", "Ada", chrono::Utc::now());
//! player.checked_squares.extend([0, 1]);
//! player.completions = compute_completions(&config, &player.checked_squares);
//! assert_eq!(compute_score(&config, &player, &ClaimLedger::new()), 35);
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod board;
mod completion;
mod ledger;
mod player;
mod scoring;
mod validate;

pub use board::{BoardConfiguration, BoardSize, CompletionBonuses, DEFAULT_COLOR, Square};
pub use completion::{
    ANTI_DIAGONAL, CompletionKey, CompletionResult, MAIN_DIAGONAL, compute_completions,
};
pub use ledger::{ClaimLedger, LedgerEvent, LedgerEventKind, LedgerGap};
pub use player::{PlayerId, PlayerState};
pub use scoring::{BonusCategory, ScoreBreakdown, compute_score, score_breakdown};
pub use validate::{ValidationError, parse, validate};
