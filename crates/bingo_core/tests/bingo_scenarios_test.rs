//! Scoring scenarios driven through the public API from JSON configurations.

use bingo_core::{
    ClaimLedger, CompletionKey, LedgerEventKind, PlayerState, ValidationError, compute_completions,
    compute_score, parse, validate,
};
use chrono::Utc;
use serde_json::{Value, json};

fn board_json(row_bonus: u32, full_board_bonus: u32, only_first: bool) -> Value {
    let squares: Vec<Value> = (0..9)
        .map(|i| json!({"name": format!("Event {i}"), "rarity": "common", "points": 10}))
        .collect();
    json!({
        "boardSize": {"rows": 3, "columns": 3},
        "squares": squares,
        "rarityColors": {"common": "#d0d0d0"},
        "completionBonuses": {
            "row": row_bonus,
            "column": 0,
            "diagonal": 0,
            "fullBoard": full_board_bonus,
            "onlyFirstPlayerGetsBonus": only_first
        },
        "exclusiveSquares": false
    })
}

fn checked_player(id: &str, squares: impl IntoIterator<Item = usize>) -> PlayerState {
    let mut player = PlayerState::new(id, id.to_uppercase(), Utc::now());
    player.checked_squares.extend(squares);
    player
}

#[test]
fn test_top_row_scenario() {
    let config = validate(&board_json(50, 0, false)).expect("valid board");
    let mut player = checked_player("a", [0, 1, 2]);
    player.completions = compute_completions(&config, &player.checked_squares);

    assert_eq!(player.completions.rows.iter().copied().collect::<Vec<_>>(), vec![0]);
    assert_eq!(compute_score(&config, &player, &ClaimLedger::new()), 80);
}

#[test]
fn test_full_board_first_only_scenario() {
    let config = validate(&board_json(0, 100, true)).expect("valid board");
    let mut a = checked_player("a", 0..9);
    let mut b = checked_player("b", 0..9);
    a.completions = compute_completions(&config, &a.checked_squares);
    b.completions = compute_completions(&config, &b.checked_squares);

    let mut ledger = ClaimLedger::new();
    for player in [&a, &b] {
        let kinds = player
            .completions
            .keys()
            .into_iter()
            .map(LedgerEventKind::Completion)
            .collect();
        let events = ledger.stage(&player.id, kinds, Utc::now());
        ledger.append(events).expect("contiguous");
    }

    assert_eq!(ledger.first_claimant(CompletionKey::FullBoard), Some("a"));
    assert_eq!(compute_score(&config, &a, &ledger), 190);
    assert_eq!(compute_score(&config, &b, &ledger), 90);
}

#[test]
fn test_configuration_round_trips_through_text() {
    let text = board_json(50, 100, false).to_string();
    let config = parse(&text).expect("valid text");
    assert_eq!(config.total_squares(), 9);
    assert_eq!(config.color_for(3), "#d0d0d0");
}

#[test]
fn test_rejects_rarity_without_color() {
    let mut raw = board_json(50, 0, false);
    raw["rarityColors"] = json!({"uncommon": "#00ff00"});
    assert!(matches!(validate(&raw), Err(ValidationError::UnknownRarity { index: 0, .. })));
}
