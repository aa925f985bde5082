//! Claim arbitration over the shared session state.
//!
//! [`ClaimCoordinator`] is the only thing that mutates players, the ledger
//! and the configuration. Every operation takes `&mut self`, so its owner is
//! the single writer and the exclusivity check-and-set and ledger ordering
//! are linearizable. The session arbiter in [`crate::session`] is that owner
//! for a running server.
//!
//! Every mutation follows the same shape: validate, stage the new state,
//! commit the staged change to the [`SessionStore`], then apply. A failed
//! commit returns before anything in memory has changed.

use crate::store::{CommitRecord, PlayerSnapshot, PlayerStore, SessionStore, StoreError};
use bingo_core::{
    BoardConfiguration, ClaimLedger, LedgerEventKind, PlayerId, PlayerState, ValidationError,
    compute_completions, compute_score,
};
use chrono::Utc;
use derive_more::{Display, Error};
use derive_new::new;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

/// Result of a claim attempt that reached the arbitration step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum ClaimOutcome {
    /// The square is now held by the claimant.
    Accepted {
        /// The claimant's updated state.
        player: PlayerSnapshot,
    },
    /// The claimant already holds this square.
    RejectedAlreadyHeld,
    /// Exclusive mode and another player holds the square.
    RejectedExclusiveConflict {
        /// The player holding the square.
        holder: PlayerId,
    },
}

impl ClaimOutcome {
    /// Whether the claim changed state.
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted { .. })
    }
}

/// Failures of coordinator operations.
#[derive(Debug, Clone, Display, Error)]
pub enum CoordinatorError {
    /// No board has been loaded yet.
    #[display("No board configuration loaded")]
    NoConfiguration,
    /// The player never joined this session.
    #[display("Unknown player '{player_id}'")]
    UnknownPlayer {
        /// Offending ID.
        player_id: PlayerId,
    },
    /// Join request with an unusable ID or name.
    #[display("Invalid player: {reason}")]
    InvalidPlayer {
        /// What is wrong.
        reason: String,
    },
    /// Square index outside the board.
    #[display("Square {square} is not on a board of {total} squares")]
    SquareOutOfRange {
        /// Requested index.
        square: usize,
        /// Number of squares on the board.
        total: usize,
    },
    /// Uploaded configuration was rejected.
    #[display("Invalid configuration: {_0}")]
    InvalidConfiguration(ValidationError),
    /// Backing store failed; retry later.
    #[display("{_0}")]
    StoreUnavailable(StoreError),
    /// An internal invariant does not hold.
    #[display("Inconsistent session state: {reason}")]
    InconsistentState {
        /// Which invariant failed.
        reason: String,
    },
}

impl CoordinatorError {
    /// Whether the same request may succeed if retried unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::StoreUnavailable(_))
    }

    #[track_caller]
    fn inconsistent(reason: impl Into<String>) -> Self {
        let reason = reason.into();
        let loc = std::panic::Location::caller();
        error!(%reason, file = loc.file(), line = loc.line(), "Session invariant violated");
        Self::InconsistentState { reason }
    }
}

impl From<StoreError> for CoordinatorError {
    fn from(err: StoreError) -> Self {
        warn!(error = %err, "Commit failed, state unchanged");
        Self::StoreUnavailable(err)
    }
}

impl From<ValidationError> for CoordinatorError {
    fn from(err: ValidationError) -> Self {
        Self::InvalidConfiguration(err)
    }
}

/// One leaderboard row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, new)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    /// 1-based rank.
    pub rank: usize,
    /// Player ID.
    pub player_id: PlayerId,
    /// Display name.
    pub name: String,
    /// Score.
    pub score: i64,
}

/// Consistent view of the whole session.
///
/// Configuration and players always come from the same generation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    /// Increments on every reset or configuration load.
    pub generation: u64,
    /// Active board, if one is loaded.
    pub configuration: Option<Arc<BoardConfiguration>>,
    /// Players in join order.
    pub players: Vec<PlayerSnapshot>,
    /// Number of ledger events so far.
    pub ledger_len: usize,
}

/// Single-writer arbiter of claims and session lifecycle.
#[derive(Debug)]
pub struct ClaimCoordinator<S> {
    store: S,
    configuration: Option<Arc<BoardConfiguration>>,
    players: PlayerStore,
    ledger: ClaimLedger,
    generation: u64,
}

impl<S: SessionStore> ClaimCoordinator<S> {
    /// Creates a coordinator with no board loaded.
    #[instrument(skip(store))]
    pub fn new(store: S) -> Self {
        info!("Creating claim coordinator");
        Self {
            store,
            configuration: None,
            players: PlayerStore::new(),
            ledger: ClaimLedger::new(),
            generation: 0,
        }
    }

    /// The backing store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// The active board.
    pub fn configuration(&self) -> Option<&Arc<BoardConfiguration>> {
        self.configuration.as_ref()
    }

    /// The claim ledger.
    pub fn ledger(&self) -> &ClaimLedger {
        &self.ledger
    }

    /// Current session generation.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// One player's published state.
    pub fn player(&self, player_id: &str) -> Option<PlayerSnapshot> {
        self.players.get(player_id).map(PlayerSnapshot::from)
    }

    /// Adds a player, or renames a returning one without touching their
    /// claims.
    ///
    /// # Errors
    ///
    /// [`CoordinatorError::InvalidPlayer`] for a blank ID or name,
    /// [`CoordinatorError::StoreUnavailable`] if the commit fails.
    #[instrument(skip(self), fields(generation = self.generation))]
    pub fn join_session(
        &mut self,
        player_id: &str,
        name: &str,
    ) -> Result<PlayerSnapshot, CoordinatorError> {
        let name = name.trim();
        if player_id.is_empty() {
            return Err(CoordinatorError::InvalidPlayer {
                reason: "player ID must not be empty".to_string(),
            });
        }
        if name.is_empty() {
            return Err(CoordinatorError::InvalidPlayer {
                reason: "display name must not be empty".to_string(),
            });
        }

        let now = Utc::now();
        let player = match self.players.get(player_id) {
            Some(existing) => {
                debug!(player_id, "Returning player");
                PlayerState {
                    name: name.to_string(),
                    last_active: now,
                    ..existing.clone()
                }
            }
            None => PlayerState::new(player_id, name, now),
        };

        self.store.commit(&CommitRecord::PlayerJoined {
            generation: self.generation,
            player_id: player_id.to_string(),
            name: name.to_string(),
        })?;

        let snapshot = PlayerSnapshot::from(&player);
        self.players.upsert(player);
        info!(player_id, name, players = self.players.len(), "Player joined");
        Ok(snapshot)
    }

    /// Attempts to mark `square` for `player_id`.
    ///
    /// The exclusivity check, the ledger append and the state update happen
    /// in one `&mut self` call, so no other claim can interleave.
    ///
    /// # Errors
    ///
    /// [`CoordinatorError::NoConfiguration`], [`CoordinatorError::UnknownPlayer`]
    /// and [`CoordinatorError::SquareOutOfRange`] for bad requests;
    /// [`CoordinatorError::StoreUnavailable`] if the commit fails, in which
    /// case nothing changed; [`CoordinatorError::InconsistentState`] if an
    /// internal invariant is broken.
    #[instrument(skip(self), fields(generation = self.generation))]
    pub fn attempt_claim(
        &mut self,
        player_id: &str,
        square: usize,
    ) -> Result<ClaimOutcome, CoordinatorError> {
        let config = self
            .configuration
            .clone()
            .ok_or(CoordinatorError::NoConfiguration)?;
        if !config.is_consistent() {
            return Err(CoordinatorError::inconsistent(format!(
                "configuration has {} squares for a {}x{} board",
                config.squares().len(),
                config.board_size().rows,
                config.board_size().columns
            )));
        }

        let current = self
            .players
            .get(player_id)
            .ok_or_else(|| CoordinatorError::UnknownPlayer {
                player_id: player_id.to_string(),
            })?;

        if !config.contains(square) {
            return Err(CoordinatorError::SquareOutOfRange {
                square,
                total: config.total_squares(),
            });
        }

        if current.holds(square) {
            debug!(player_id, square, "Square already held by claimant");
            return Ok(ClaimOutcome::RejectedAlreadyHeld);
        }

        if *config.exclusive_squares()
            && let Some(holder) = self.players.holders(square).find(|holder| *holder != player_id)
        {
            info!(player_id, square, holder, "Exclusive square already claimed");
            return Ok(ClaimOutcome::RejectedExclusiveConflict {
                holder: holder.to_string(),
            });
        }

        let now = Utc::now();
        let mut updated = current.clone();
        updated.checked_squares.insert(square);
        updated.last_active = now;
        updated.completions = compute_completions(&config, &updated.checked_squares);

        let newly = updated.completions.newly_achieved(&current.completions);
        let kinds = std::iter::once(LedgerEventKind::Square(square))
            .chain(newly.iter().copied().map(LedgerEventKind::Completion))
            .collect();
        let events = self.ledger.stage(player_id, kinds, now);

        self.store.commit(&CommitRecord::ClaimAccepted {
            generation: self.generation,
            player_id: player_id.to_string(),
            square,
            events: events.clone(),
        })?;

        self.ledger
            .append(events)
            .map_err(|gap| CoordinatorError::inconsistent(gap.to_string()))?;

        updated.score = compute_score(&config, &updated, &self.ledger);
        let snapshot = PlayerSnapshot::from(&updated);
        self.players.upsert(updated);

        info!(
            player_id,
            square,
            new_completions = ?newly,
            score = snapshot.score,
            sequence = self.ledger.next_sequence(),
            "Claim accepted"
        );
        Ok(ClaimOutcome::Accepted { player: snapshot })
    }

    /// Validates and installs a new board, clearing every player.
    ///
    /// # Errors
    ///
    /// [`CoordinatorError::InvalidConfiguration`] if validation fails and
    /// [`CoordinatorError::StoreUnavailable`] if the commit fails; in both
    /// cases the previous board and players are untouched.
    #[instrument(skip(self, text), fields(generation = self.generation, bytes = text.len()))]
    pub fn load_configuration(
        &mut self,
        text: &str,
    ) -> Result<Arc<BoardConfiguration>, CoordinatorError> {
        let config = Arc::new(bingo_core::parse(text)?);
        self.reset_with(Some(Arc::clone(&config)))?;
        info!(
            rows = config.board_size().rows,
            columns = config.board_size().columns,
            generation = self.generation,
            "Configuration loaded"
        );
        Ok(config)
    }

    /// Clears every player and the ledger, keeping the current board.
    ///
    /// # Errors
    ///
    /// [`CoordinatorError::StoreUnavailable`] if the commit fails.
    #[instrument(skip(self), fields(generation = self.generation))]
    pub fn reset_session(&mut self) -> Result<u64, CoordinatorError> {
        self.reset_with(None)?;
        info!(generation = self.generation, "Session reset");
        Ok(self.generation)
    }

    fn reset_with(
        &mut self,
        configuration: Option<Arc<BoardConfiguration>>,
    ) -> Result<(), CoordinatorError> {
        let generation = self.generation + 1;
        self.store.commit(&CommitRecord::SessionReset {
            generation,
            configuration: configuration.clone(),
        })?;

        if configuration.is_some() {
            self.configuration = configuration;
        }
        self.players.clear();
        self.ledger.clear();
        self.generation = generation;
        Ok(())
    }

    /// Full session view.
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            generation: self.generation,
            configuration: self.configuration.clone(),
            players: self.players.iter().map(PlayerSnapshot::from).collect(),
            ledger_len: self.ledger.len(),
        }
    }

    /// Players ranked by score, highest first; ties keep join order.
    #[instrument(skip(self))]
    pub fn leaderboard(&self) -> Vec<LeaderboardEntry> {
        let mut players: Vec<&PlayerState> = self.players.iter().collect();
        // Stable sort, so equal scores stay in join order.
        players.sort_by(|a, b| b.score.cmp(&a.score));
        players
            .into_iter()
            .enumerate()
            .map(|(i, player)| {
                LeaderboardEntry::new(i + 1, player.id.clone(), player.name.clone(), player.score)
            })
            .collect()
    }

    /// Squares held by someone other than `viewer` and not by `viewer`,
    /// mapped to one of their holders.
    pub fn held_by_others(&self, viewer: &str) -> BTreeMap<usize, PlayerId> {
        let viewer_holds = |square: usize| {
            self.players
                .get(viewer)
                .is_some_and(|player| player.holds(square))
        };
        self.players
            .iter()
            .filter(|player| player.id != viewer)
            .flat_map(|player| {
                player
                    .checked_squares
                    .iter()
                    .map(move |&square| (square, player.id.clone()))
            })
            .filter(|(square, _)| !viewer_holds(*square))
            .fold(BTreeMap::new(), |mut held, (square, holder)| {
                held.entry(square).or_insert(holder);
                held
            })
    }
}
