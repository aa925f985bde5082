//! Append-only claim ledger.
//!
//! Every accepted square claim and every newly reached completion is
//! recorded with a sequence number. Sequence numbers are the only ordering
//! used to decide who was first; the wall-clock timestamps are informational.

use crate::completion::CompletionKey;
use crate::player::PlayerId;
use chrono::{DateTime, Utc};
use derive_more::{Display, Error};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, instrument, warn};

/// What a ledger event records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LedgerEventKind {
    /// A square was claimed.
    #[display("square {_0}")]
    Square(usize),
    /// A completion was reached.
    #[display("{_0}")]
    Completion(CompletionKey),
}

/// A single, totally ordered ledger entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEvent {
    /// Position in the ledger, starting at zero.
    pub sequence: u64,
    /// What happened.
    pub kind: LedgerEventKind,
    /// Who did it.
    pub player_id: PlayerId,
    /// When the coordinator processed it.
    pub recorded_at: DateTime<Utc>,
}

/// Appending events out of order.
#[derive(Debug, Clone, PartialEq, Eq, Display, Error)]
#[display("Ledger expected sequence {expected}, got {found}")]
pub struct LedgerGap {
    /// Next sequence the ledger would accept.
    pub expected: u64,
    /// Sequence that was offered.
    pub found: u64,
}

/// The session's claim ledger.
#[derive(Debug, Clone, Default)]
pub struct ClaimLedger {
    events: Vec<LedgerEvent>,
    first_claims: HashMap<CompletionKey, PlayerId>,
}

impl ClaimLedger {
    /// Creates an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sequence number the next appended event must carry.
    pub fn next_sequence(&self) -> u64 {
        self.events.len() as u64
    }

    /// Builds events for `kinds` numbered from [`Self::next_sequence`],
    /// without appending them.
    ///
    /// Staged events are committed to the backing store first and appended
    /// with [`Self::append`] only once the commit succeeds.
    #[instrument(skip(self, kinds), fields(player_id = %player_id, count = kinds.len()))]
    pub fn stage(
        &self,
        player_id: &str,
        kinds: Vec<LedgerEventKind>,
        recorded_at: DateTime<Utc>,
    ) -> Vec<LedgerEvent> {
        let start = self.next_sequence();
        kinds
            .into_iter()
            .zip(start..)
            .map(|(kind, sequence)| LedgerEvent {
                sequence,
                kind,
                player_id: player_id.to_string(),
                recorded_at,
            })
            .collect()
    }

    /// Appends staged events.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerGap`] if the events do not continue the ledger
    /// exactly; nothing is appended in that case.
    #[instrument(skip(self, events), fields(count = events.len()))]
    pub fn append(&mut self, events: Vec<LedgerEvent>) -> Result<(), LedgerGap> {
        let start = self.next_sequence();
        for (offset, event) in events.iter().enumerate() {
            let expected = start + offset as u64;
            if event.sequence != expected {
                warn!(expected, found = event.sequence, "Ledger sequence gap");
                return Err(LedgerGap {
                    expected,
                    found: event.sequence,
                });
            }
        }

        for event in events {
            if let LedgerEventKind::Completion(key) = event.kind {
                self.first_claims.entry(key).or_insert_with(|| {
                    debug!(
                        %key,
                        player_id = %event.player_id,
                        sequence = event.sequence,
                        "First claim recorded"
                    );
                    event.player_id.clone()
                });
            }
            self.events.push(event);
        }
        Ok(())
    }

    /// The player whose completion event for `key` came first, if any.
    pub fn first_claimant(&self, key: CompletionKey) -> Option<&str> {
        self.first_claims.get(&key).map(String::as_str)
    }

    /// Whether `player_id` is the first claimant of `key`.
    pub fn is_first(&self, player_id: &str, key: CompletionKey) -> bool {
        self.first_claimant(key) == Some(player_id)
    }

    /// All events in ledger order.
    pub fn events(&self) -> &[LedgerEvent] {
        &self.events
    }

    /// Number of recorded events.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Whether the ledger is empty.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Drops every event, for a session reset.
    pub fn clear(&mut self) {
        self.events.clear();
        self.first_claims.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn completion(key: CompletionKey) -> LedgerEventKind {
        LedgerEventKind::Completion(key)
    }

    #[test]
    fn test_stage_does_not_append() {
        let ledger = ClaimLedger::new();
        let staged = ledger.stage("a", vec![LedgerEventKind::Square(3)], Utc::now());
        assert_eq!(staged.len(), 1);
        assert_eq!(staged[0].sequence, 0);
        assert!(ledger.is_empty());
    }

    #[test]
    fn test_first_claimant_is_earliest_sequence() {
        let mut ledger = ClaimLedger::new();
        let now = Utc::now();

        let a = ledger.stage("a", vec![completion(CompletionKey::Row(0))], now);
        ledger.append(a).unwrap();
        // Same wall-clock time; ledger order still decides.
        let b = ledger.stage("b", vec![completion(CompletionKey::Row(0))], now);
        ledger.append(b).unwrap();

        assert_eq!(ledger.first_claimant(CompletionKey::Row(0)), Some("a"));
        assert!(ledger.is_first("a", CompletionKey::Row(0)));
        assert!(!ledger.is_first("b", CompletionKey::Row(0)));
        assert_eq!(ledger.first_claimant(CompletionKey::Row(1)), None);
    }

    #[test]
    fn test_append_rejects_gap() {
        let mut ledger = ClaimLedger::new();
        let stale = ledger.stage("a", vec![LedgerEventKind::Square(0)], Utc::now());
        let also_stale = ledger.stage("b", vec![LedgerEventKind::Square(1)], Utc::now());
        ledger.append(stale).unwrap();

        let result = ledger.append(also_stale);
        assert_eq!(result, Err(LedgerGap { expected: 1, found: 0 }));
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn test_clear_forgets_first_claims() {
        let mut ledger = ClaimLedger::new();
        let events = ledger.stage("a", vec![completion(CompletionKey::FullBoard)], Utc::now());
        ledger.append(events).unwrap();
        ledger.clear();
        assert!(ledger.is_empty());
        assert_eq!(ledger.first_claimant(CompletionKey::FullBoard), None);
        assert_eq!(ledger.next_sequence(), 0);
    }
}
