//! Player state store and the backing store commits go through.
//!
//! The coordinator keeps the authoritative state in memory. Before any of it
//! changes, the change is described as a [`CommitRecord`] and handed to a
//! [`SessionStore`]. A store that fails leaves the in-memory state alone.

use bingo_core::{BoardConfiguration, CompletionResult, LedgerEvent, PlayerId, PlayerState};
use derive_more::{Display, Error};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tracing::{debug, instrument};

/// Published view of one player's state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerSnapshot {
    /// Player ID.
    pub player_id: PlayerId,
    /// Display name.
    pub name: String,
    /// Held squares, ascending.
    pub checked_squares: BTreeSet<usize>,
    /// Derived completions.
    pub completions: CompletionResult,
    /// Current score.
    pub score: i64,
}

impl From<&PlayerState> for PlayerSnapshot {
    fn from(player: &PlayerState) -> Self {
        Self {
            player_id: player.id.clone(),
            name: player.name.clone(),
            checked_squares: player.checked_squares.clone(),
            completions: player.completions.clone(),
            score: player.score,
        }
    }
}

/// Every player in the session plus an index of who holds which square.
#[derive(Debug, Clone, Default)]
pub struct PlayerStore {
    players: HashMap<PlayerId, PlayerState>,
    join_order: Vec<PlayerId>,
    holders: HashMap<usize, BTreeSet<PlayerId>>,
}

impl PlayerStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up a player.
    pub fn get(&self, player_id: &str) -> Option<&PlayerState> {
        self.players.get(player_id)
    }

    /// Whether the player has joined.
    pub fn contains(&self, player_id: &str) -> bool {
        self.players.contains_key(player_id)
    }

    /// Inserts or replaces a player, keeping the square index in sync.
    ///
    /// A replaced player keeps their first join position.
    pub fn upsert(&mut self, player: PlayerState) {
        if let Some(previous) = self.players.get(&player.id) {
            for square in previous.checked_squares.difference(&player.checked_squares) {
                if let Some(holders) = self.holders.get_mut(square) {
                    holders.remove(&player.id);
                }
            }
        } else {
            self.join_order.push(player.id.clone());
        }

        for &square in &player.checked_squares {
            self.holders
                .entry(square)
                .or_default()
                .insert(player.id.clone());
        }
        self.players.insert(player.id.clone(), player);
    }

    /// Players holding `square`, in ID order.
    pub fn holders(&self, square: usize) -> impl Iterator<Item = &str> {
        self.holders
            .get(&square)
            .into_iter()
            .flatten()
            .map(String::as_str)
    }

    /// Players in join order.
    pub fn iter(&self) -> impl Iterator<Item = &PlayerState> {
        self.join_order.iter().filter_map(|id| self.players.get(id))
    }

    /// Position of a player in join order.
    pub fn join_position(&self, player_id: &str) -> Option<usize> {
        self.join_order.iter().position(|id| id == player_id)
    }

    /// Number of players.
    pub fn len(&self) -> usize {
        self.players.len()
    }

    /// Whether nobody has joined.
    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    /// Removes every player.
    pub fn clear(&mut self) {
        self.players.clear();
        self.join_order.clear();
        self.holders.clear();
    }
}

/// A state change about to be applied.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "record", rename_all = "camelCase")]
pub enum CommitRecord {
    /// A player joined or re-joined.
    PlayerJoined {
        /// Session generation the player joined.
        generation: u64,
        /// Player ID.
        player_id: PlayerId,
        /// Display name.
        name: String,
    },
    /// A square claim was accepted, with its ledger events.
    ClaimAccepted {
        /// Session generation of the claim.
        generation: u64,
        /// Claimant.
        player_id: PlayerId,
        /// The square.
        square: usize,
        /// Ledger events in sequence order.
        events: Vec<LedgerEvent>,
    },
    /// The session was wiped, optionally under a new configuration.
    SessionReset {
        /// Generation that starts with this reset.
        generation: u64,
        /// Replacement configuration, `None` to keep the current one.
        configuration: Option<Arc<BoardConfiguration>>,
    },
}

impl CommitRecord {
    /// Generation this record belongs to.
    pub fn generation(&self) -> u64 {
        match self {
            Self::PlayerJoined { generation, .. }
            | Self::ClaimAccepted { generation, .. }
            | Self::SessionReset { generation, .. } => *generation,
        }
    }
}

/// Backing store failure.
#[derive(Debug, Clone, Display, Error)]
#[display("Store unavailable: {} at {}:{}", message, file, line)]
pub struct StoreError {
    /// Error message.
    pub message: String,
    /// Line number where error occurred.
    pub line: u32,
    /// Source file where error occurred.
    pub file: &'static str,
}

impl StoreError {
    /// Creates a new store error with caller location tracking.
    #[track_caller]
    #[instrument(skip(message))]
    pub fn new(message: impl Into<String>) -> Self {
        let loc = std::panic::Location::caller();
        Self {
            message: message.into(),
            line: loc.line(),
            file: loc.file(),
        }
    }
}

/// Durable substrate behind the session: a replicated log, a database, or
/// nothing at all.
pub trait SessionStore: Send {
    /// Makes `record` durable.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the record could not be committed. The
    /// caller must then leave its state unchanged.
    fn commit(&mut self, record: &CommitRecord) -> Result<(), StoreError>;
}

/// In-process store that journals the records of the current session.
///
/// A [`CommitRecord::SessionReset`] starts a new journal.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    journal: Vec<CommitRecord>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records committed since the last reset (inclusive), oldest first.
    pub fn journal(&self) -> &[CommitRecord] {
        &self.journal
    }
}

impl SessionStore for MemoryStore {
    #[instrument(skip_all, fields(generation = record.generation()))]
    fn commit(&mut self, record: &CommitRecord) -> Result<(), StoreError> {
        if matches!(record, CommitRecord::SessionReset { .. }) {
            debug!(dropped = self.journal.len(), "Session reset, starting new journal");
            self.journal.clear();
        }
        debug!(journal_len = self.journal.len(), "Committing record");
        self.journal.push(record.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn player(id: &str, squares: &[usize]) -> PlayerState {
        let mut player = PlayerState::new(id, id, Utc::now());
        player.checked_squares.extend(squares.iter().copied());
        player
    }

    #[test]
    fn test_upsert_indexes_holders() {
        let mut store = PlayerStore::new();
        store.upsert(player("b", &[1, 2]));
        store.upsert(player("a", &[2]));

        assert_eq!(store.holders(2).collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(store.holders(1).collect::<Vec<_>>(), vec!["b"]);
        assert_eq!(store.holders(7).count(), 0);
    }

    #[test]
    fn test_iter_keeps_join_order_on_replace() {
        let mut store = PlayerStore::new();
        store.upsert(player("z", &[]));
        store.upsert(player("a", &[]));
        store.upsert(player("z", &[4]));

        let ids: Vec<_> = store.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["z", "a"]);
        assert_eq!(store.join_position("a"), Some(1));
        assert_eq!(store.holders(4).collect::<Vec<_>>(), vec!["z"]);
    }

    #[test]
    fn test_clear_empties_index() {
        let mut store = PlayerStore::new();
        store.upsert(player("a", &[0]));
        store.clear();
        assert!(store.is_empty());
        assert_eq!(store.holders(0).count(), 0);
    }

    #[test]
    fn test_memory_store_journals_commits() {
        let mut store = MemoryStore::new();
        let record = CommitRecord::PlayerJoined {
            generation: 3,
            player_id: "a".to_string(),
            name: "Ada".to_string(),
        };
        store.commit(&record).expect("memory store never fails");
        assert_eq!(store.journal(), &[record]);
        assert_eq!(store.journal()[0].generation(), 3);
    }

    #[test]
    fn test_memory_store_reset_starts_new_journal() {
        let mut store = MemoryStore::new();
        for generation in 1..=3 {
            store
                .commit(&CommitRecord::SessionReset {
                    generation,
                    configuration: None,
                })
                .unwrap();
            store
                .commit(&CommitRecord::PlayerJoined {
                    generation,
                    player_id: "a".to_string(),
                    name: "Ada".to_string(),
                })
                .unwrap();
        }
        assert_eq!(store.journal().len(), 2);
        assert!(matches!(
            store.journal()[0],
            CommitRecord::SessionReset { generation: 3, .. }
        ));
    }
}
