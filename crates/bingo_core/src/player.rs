//! Per-player session state.

use crate::completion::CompletionResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Opaque, caller-supplied player identifier.
pub type PlayerId = String;

/// One player's checked squares and the state derived from them.
///
/// `checked_squares` only ever grows. `completions` and `score` are derived
/// and must be recomputed whenever the checked set changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerState {
    /// Stable identifier for the session lifetime.
    pub id: PlayerId,
    /// Display name.
    pub name: String,
    /// Squares this player holds.
    pub checked_squares: BTreeSet<usize>,
    /// Derived completions.
    pub completions: CompletionResult,
    /// Derived score.
    pub score: i64,
    /// When the player first joined this session.
    pub joined_at: DateTime<Utc>,
    /// Last join or accepted claim.
    pub last_active: DateTime<Utc>,
}

impl PlayerState {
    /// Creates a fresh player with nothing checked.
    pub fn new(id: impl Into<PlayerId>, name: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            checked_squares: BTreeSet::new(),
            completions: CompletionResult::default(),
            score: 0,
            joined_at: now,
            last_active: now,
        }
    }

    /// Whether this player holds `index`.
    pub fn holds(&self, index: usize) -> bool {
        self.checked_squares.contains(&index)
    }
}
