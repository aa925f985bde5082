//! A failing backing store must leave the session exactly as it was.

use bingo_server::{
    ClaimCoordinator, CommitRecord, CoordinatorError, SessionError, SessionHandle, SessionStore,
    StoreError,
};
use serde_json::{Value, json};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Store that fails every commit while its switch is on.
#[derive(Debug, Clone, Default)]
struct FlakyStore {
    failing: Arc<AtomicBool>,
    commits: Arc<AtomicUsize>,
}

impl SessionStore for FlakyStore {
    fn commit(&mut self, _record: &CommitRecord) -> Result<(), StoreError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::new("replica quorum lost"));
        }
        self.commits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

fn board() -> String {
    let squares: Vec<Value> = (0..4)
        .map(|i| json!({"name": format!("Square {i}"), "rarity": "rare", "points": 25}))
        .collect();
    json!({
        "boardSize": {"rows": 2, "columns": 2},
        "squares": squares,
        "rarityColors": {"rare": "#3366ff"},
        "completionBonuses": {"row": 10, "onlyFirstPlayerGetsBonus": true}
    })
    .to_string()
}

#[test]
fn test_failed_claim_commit_changes_nothing() {
    let store = FlakyStore::default();
    let failing = Arc::clone(&store.failing);
    let mut coordinator = ClaimCoordinator::new(store);
    coordinator.load_configuration(&board()).unwrap();
    coordinator.join_session("a", "Ada").unwrap();
    coordinator.attempt_claim("a", 0).unwrap();

    let before = coordinator.snapshot();
    let next_sequence = coordinator.ledger().next_sequence();

    failing.store(true, Ordering::SeqCst);
    let err = coordinator.attempt_claim("a", 1).unwrap_err();
    assert!(matches!(err, CoordinatorError::StoreUnavailable(_)));
    assert!(err.is_retryable());
    assert_eq!(coordinator.snapshot(), before);
    assert_eq!(coordinator.ledger().next_sequence(), next_sequence);
    assert_eq!(coordinator.ledger().first_claimant(bingo_core::CompletionKey::Row(0)), None);

    failing.store(false, Ordering::SeqCst);
    let outcome = coordinator.attempt_claim("a", 1).unwrap();
    assert!(outcome.is_accepted());
    // 2 x 25 points plus the row bonus.
    assert_eq!(coordinator.player("a").unwrap().score, 60);
    assert_eq!(coordinator.ledger().first_claimant(bingo_core::CompletionKey::Row(0)), Some("a"));
}

#[test]
fn test_failed_reset_keeps_players() {
    let store = FlakyStore::default();
    let failing = Arc::clone(&store.failing);
    let mut coordinator = ClaimCoordinator::new(store);
    coordinator.load_configuration(&board()).unwrap();
    coordinator.join_session("a", "Ada").unwrap();
    coordinator.attempt_claim("a", 3).unwrap();
    let before = coordinator.snapshot();

    failing.store(true, Ordering::SeqCst);
    assert!(coordinator.reset_session().unwrap_err().is_retryable());
    assert!(coordinator.load_configuration(&board()).is_err());
    assert!(coordinator.join_session("b", "Bo").is_err());
    assert_eq!(coordinator.snapshot(), before);
}

#[tokio::test]
async fn test_store_outage_surfaces_as_retryable_session_error() {
    let store = FlakyStore::default();
    let failing = Arc::clone(&store.failing);
    let commits = Arc::clone(&store.commits);
    let session = SessionHandle::spawn(store, 8);
    session.load_configuration(&board(), None).await.unwrap();
    session.join_session("a", "Ada").await.unwrap();
    let committed = commits.load(Ordering::SeqCst);

    let mut events = session.subscribe();
    failing.store(true, Ordering::SeqCst);
    let err = session.submit_claim("a", 2).await.unwrap_err();
    assert!(matches!(
        err,
        SessionError::Coordinator(CoordinatorError::StoreUnavailable(_))
    ));
    assert!(err.is_retryable());
    assert!(events.try_recv().is_err());
    assert_eq!(commits.load(Ordering::SeqCst), committed);

    let snapshot = session.snapshot().await.unwrap();
    assert!(snapshot.players[0].checked_squares.is_empty());
    assert_eq!(snapshot.ledger_len, 0);
}
