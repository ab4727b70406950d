//! Integration tests: pairing -> escrow -> game -> settlement
//!
//! Drives the full core through its service objects against the in-memory
//! account store, asserting on the emissions each operation returns and on
//! the resulting ledger state. No sockets involved.

use std::str::FromStr;
use std::sync::Arc;

use rust_decimal::Decimal;

use stakemate::core_types::Color;
use stakemate::escrow::EscrowLedger;
use stakemate::messages::{Outbound, ServerEvent};
use stakemate::queue::{Matchmaker, Ticket};
use stakemate::room::RoomRegistry;
use stakemate::rules::LiveBoard;
use stakemate::session::GameService;
use stakemate::settlement::SettlementEngine;
use stakemate::store::{AccountStore, MemoryAccountStore, TxKind};

fn usd(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

/// Full service graph over one in-memory store.
struct TestHarness {
    store: Arc<MemoryAccountStore>,
    registry: Arc<RoomRegistry>,
    matchmaker: Matchmaker,
    game: GameService,
}

impl TestHarness {
    fn new() -> Self {
        let store = Arc::new(MemoryAccountStore::new());
        let escrow = Arc::new(EscrowLedger::new(store.clone()));
        let registry = Arc::new(RoomRegistry::new());
        let settlement = Arc::new(SettlementEngine::new(escrow.clone(), store.clone()));
        let game = GameService::new(registry.clone(), store.clone(), settlement);
        let matchmaker = Matchmaker::new(escrow, registry.clone());
        Self {
            store,
            registry,
            matchmaker,
            game,
        }
    }

    async fn queue(&self, player: &str, account: &str, stake: &str) -> Vec<Outbound> {
        self.matchmaker
            .enqueue(
                "5+0",
                Ticket {
                    player_id: player.to_string(),
                    session_id: session_of(player),
                    account_id: account.to_string(),
                    stake: usd(stake),
                },
            )
            .await
    }

    async fn join(&self, room_id: &str, player: &str, account: &str) -> Vec<Outbound> {
        self.game
            .join(
                &room_id.to_string(),
                &player.to_string(),
                &session_of(player),
                None,
                Some(account.to_string()),
            )
            .await
    }

    async fn mv(&self, room_id: &str, player: &str, from: &str, to: &str) -> Vec<Outbound> {
        self.game
            .make_move(
                &room_id.to_string(),
                &player.to_string(),
                &session_of(player),
                from,
                to,
                None,
            )
            .await
    }

    /// Seed two accounts with 5.00, pair p1/p2 at stake 1.00, join both
    /// (p1 takes white). Returns the room id.
    async fn paired_room(&self) -> String {
        self.store.seed("a1", usd("5.00"), Some("alice"));
        self.store.seed("a2", usd("5.00"), Some("bob"));
        self.queue("p1", "a1", "1.00").await;
        let out = self.queue("p2", "a2", "1.00").await;
        let room_id = paired_room_id(&out).expect("players were not paired");
        self.join(&room_id, "p1", "a1").await;
        self.join(&room_id, "p2", "a2").await;
        room_id
    }
}

fn session_of(player: &str) -> String {
    format!("sess-{player}")
}

fn paired_room_id(out: &[Outbound]) -> Option<String> {
    out.iter().find_map(|o| match o {
        Outbound::ToSession(_, ServerEvent::Paired { room_id, .. }) => Some(room_id.clone()),
        _ => None,
    })
}

fn rejections(out: &[Outbound]) -> Vec<(String, String)> {
    out.iter()
        .filter_map(|o| match o {
            Outbound::ToSession(session, ServerEvent::QueueRejected { reason }) => {
                Some((session.clone(), reason.clone()))
            }
            _ => None,
        })
        .collect()
}

fn move_rejection(out: &[Outbound]) -> Option<String> {
    out.iter().find_map(|o| match o {
        Outbound::ToSession(_, ServerEvent::MoveRejected { reason }) => Some(reason.clone()),
        _ => None,
    })
}

fn game_over(out: &[Outbound]) -> Option<(String, Option<Color>)> {
    out.iter().find_map(|o| match o {
        Outbound::ToRoom(_, ServerEvent::GameOver { reason, loser }) => {
            Some((reason.clone(), *loser))
        }
        _ => None,
    })
}

// ============================================================================
// Pairing and escrow
// ============================================================================

#[tokio::test]
async fn test_equal_stakes_pair_and_escrow_both() {
    let h = TestHarness::new();
    h.store.seed("a1", usd("5.00"), None);
    h.store.seed("a2", usd("5.00"), None);

    let first = h.queue("p1", "a1", "1.00").await;
    assert!(first.is_empty(), "single ticket must not emit anything");

    let out = h.queue("p2", "a2", "1.00").await;
    let room_id = paired_room_id(&out).expect("expected pairing");
    // Both parties get the same room.
    let paired: Vec<_> = out
        .iter()
        .filter(|o| matches!(o, Outbound::ToSession(_, ServerEvent::Paired { .. })))
        .collect();
    assert_eq!(paired.len(), 2);

    assert_eq!(h.store.balance("a1").await.unwrap(), usd("4.00"));
    assert_eq!(h.store.balance("a2").await.unwrap(), usd("4.00"));
    let txs = h.store.transactions();
    assert_eq!(txs.len(), 2);
    assert!(txs.iter().all(|t| t.kind == TxKind::StakeDebit));
    assert!(txs.iter().all(|t| t.amount == usd("1.00")));

    let room = h.registry.get(&room_id).expect("room exists");
    let room = room.lock().await;
    assert_eq!(room.stake_each, Some(usd("1.00")));
    assert_eq!(room.pot, Some(usd("2.00")));
    assert_eq!(room.time_control.as_deref(), Some("5+0"));
    assert!(!room.over);
}

#[tokio::test]
async fn test_insufficient_funds_rejects_offender_keeps_other() {
    let h = TestHarness::new();
    h.store.seed("a1", usd("0.50"), None);
    h.store.seed("a2", usd("5.00"), None);

    h.queue("p1", "a1", "1.00").await;
    let out = h.queue("p2", "a2", "1.00").await;

    assert_eq!(
        rejections(&out),
        vec![(session_of("p1"), "Insufficient funds".to_string())]
    );
    // p2's ticket is preserved at the bucket front; nobody was debited.
    assert_eq!(h.matchmaker.waiting("5+0", usd("1.00")), 1);
    assert!(h.store.transactions().is_empty());
    assert_eq!(h.store.balance("a1").await.unwrap(), usd("0.50"));
    assert_eq!(h.store.balance("a2").await.unwrap(), usd("5.00"));
}

#[tokio::test]
async fn test_second_debit_failure_compensates_first() {
    let h = TestHarness::new();
    h.store.seed("a1", usd("5.00"), None);
    h.store.seed("a2", usd("5.00"), None);
    h.store.set_fail_writes_for("a2", true);

    h.queue("p1", "a1", "1.00").await;
    let out = h.queue("p2", "a2", "1.00").await;

    let reasons = rejections(&out);
    assert_eq!(reasons.len(), 2);
    assert!(reasons.iter().all(|(_, r)| r == "Escrow failed"));

    // The first debit was rolled back by a compensating refund.
    assert_eq!(h.store.balance("a1").await.unwrap(), usd("5.00"));
    assert_eq!(h.store.balance("a2").await.unwrap(), usd("5.00"));
    let kinds: Vec<_> = h.store.transactions().iter().map(|t| t.kind).collect();
    assert_eq!(kinds, vec![TxKind::StakeDebit, TxKind::StakeRefund]);

    // Both tickets returned to the bucket in their original order.
    assert_eq!(h.matchmaker.waiting("5+0", usd("1.00")), 2);
}

// ============================================================================
// Joining and reconnection
// ============================================================================

#[tokio::test]
async fn test_join_is_idempotent_across_reconnects() {
    let h = TestHarness::new();
    let out = h
        .game
        .join(
            &"room-1".to_string(),
            &"p1".to_string(),
            &"sess-old".to_string(),
            None,
            None,
        )
        .await;
    assert!(
        out.iter().any(|o| matches!(
            o,
            Outbound::ToSession(_, ServerEvent::ColorAssigned { color: Color::White })
        ))
    );

    // Same player, new transport session: same color, no second slot.
    let out = h
        .game
        .join(
            &"room-1".to_string(),
            &"p1".to_string(),
            &"sess-new".to_string(),
            None,
            None,
        )
        .await;
    assert!(
        out.iter().any(|o| matches!(
            o,
            Outbound::ToSession(_, ServerEvent::ColorAssigned { color: Color::White })
        ))
    );

    let room = h.registry.get("room-1").unwrap();
    let room = room.lock().await;
    assert_eq!(room.white.as_ref().unwrap().session_id, "sess-new");
    assert!(room.black.is_none());
}

#[tokio::test]
async fn test_reconnect_snapshot_carries_full_history() {
    let h = TestHarness::new();
    let room_id = h.paired_room().await;
    h.mv(&room_id, "p1", "e2", "e4").await;
    h.mv(&room_id, "p2", "e7", "e5").await;

    let out = h.join(&room_id, "p1", "a1").await;
    let snapshot = out
        .iter()
        .find_map(|o| match o {
            Outbound::ToSession(session, ServerEvent::GameState(state))
                if *session == session_of("p1") =>
            {
                Some(state.clone())
            }
            _ => None,
        })
        .expect("joining session gets a state snapshot");

    assert_eq!(snapshot.history.len(), 2);
    assert_eq!(snapshot.turn, Color::White);

    // The room's position matches the same sequence applied directly
    // through the rules adapter.
    let mut reference = LiveBoard::new();
    reference.apply("e2", "e4", None).unwrap();
    reference.apply("e7", "e5", None).unwrap();
    assert_eq!(snapshot.position, reference.fen());

    assert_eq!(snapshot.stake_each, Some(usd("1.00")));
    assert_eq!(snapshot.pot, Some(usd("2.00")));
    assert_eq!(snapshot.players.white.as_deref(), Some("p1"));
    assert_eq!(snapshot.players.black.as_deref(), Some("p2"));
}

#[tokio::test]
async fn test_join_resolves_names_from_store() {
    let h = TestHarness::new();
    let room_id = h.paired_room().await;
    let out = h.join(&room_id, "p1", "a1").await;
    let names = out.iter().find_map(|o| match o {
        Outbound::ToRoom(_, ServerEvent::PlayerNames { white, black }) => {
            Some((white.clone(), black.clone()))
        }
        _ => None,
    });
    assert_eq!(
        names,
        Some((Some("alice".to_string()), Some("bob".to_string())))
    );
}

// ============================================================================
// Moves and turn order
// ============================================================================

#[tokio::test]
async fn test_turn_order_is_enforced() {
    let h = TestHarness::new();
    let room_id = h.paired_room().await;

    let out = h.mv(&room_id, "p1", "e2", "e4").await;
    assert!(move_rejection(&out).is_none());
    let has_move = out.iter().any(|o| {
        matches!(o, Outbound::ToRoom(_, ServerEvent::MoveMade { notation, .. }) if notation == "e4")
    });
    let has_state = out
        .iter()
        .any(|o| matches!(o, Outbound::ToRoom(_, ServerEvent::GameState(_))));
    assert!(has_move && has_state);

    // Mover tries to move again out of turn.
    let out = h.mv(&room_id, "p1", "d2", "d4").await;
    assert_eq!(move_rejection(&out).as_deref(), Some("not your turn"));

    // Opponent replaying the same squares is simply illegal.
    let out = h.mv(&room_id, "p2", "e2", "e4").await;
    assert_eq!(move_rejection(&out).as_deref(), Some("illegal move"));

    let out = h.mv(&room_id, "p2", "e7", "e5").await;
    assert!(move_rejection(&out).is_none());
}

#[tokio::test]
async fn test_no_moves_until_both_seats_taken() {
    let h = TestHarness::new();
    h.join("room-1", "p1", "a1").await;
    let out = h.mv("room-1", "p1", "e2", "e4").await;
    assert_eq!(move_rejection(&out).as_deref(), Some("waiting for players"));

    h.join("room-1", "p2", "a2").await;
    let out = h.mv("room-1", "p1", "e2", "e4").await;
    assert!(move_rejection(&out).is_none());
}

#[tokio::test]
async fn test_move_rejection_priority() {
    let h = TestHarness::new();
    let out = h.mv("nowhere", "p1", "e2", "e4").await;
    assert_eq!(move_rejection(&out).as_deref(), Some("room not found"));

    let room_id = h.paired_room().await;
    let out = h.mv(&room_id, "stranger", "e2", "e4").await;
    assert_eq!(move_rejection(&out).as_deref(), Some("not in room"));
}

// ============================================================================
// Terminal outcomes and settlement
// ============================================================================

#[tokio::test]
async fn test_checkmate_pays_pot_to_winner() {
    let h = TestHarness::new();
    let room_id = h.paired_room().await;

    // Fool's mate: black mates white.
    h.mv(&room_id, "p1", "f2", "f3").await;
    h.mv(&room_id, "p2", "e7", "e5").await;
    h.mv(&room_id, "p1", "g2", "g4").await;
    let out = h.mv(&room_id, "p2", "d8", "h4").await;

    assert_eq!(game_over(&out), Some(("checkmate".to_string(), None)));

    // Winner takes 2 x stake; loser gets nothing further.
    assert_eq!(h.store.balance("a1").await.unwrap(), usd("4.00"));
    assert_eq!(h.store.balance("a2").await.unwrap(), usd("6.00"));
    let payouts: Vec<_> = h
        .store
        .transactions()
        .into_iter()
        .filter(|t| t.kind == TxKind::StakePayout)
        .collect();
    assert_eq!(payouts.len(), 1);
    assert_eq!(payouts[0].account_id, "a2");
    assert_eq!(payouts[0].amount, usd("2.00"));
    assert_eq!(payouts[0].room_id.as_deref(), Some(room_id.as_str()));

    let games = h.store.games();
    assert_eq!(games.len(), 1);
    assert_eq!(games[0].winner_id.as_deref(), Some("a2"));
    assert_eq!(games[0].loser_id.as_deref(), Some("a1"));
    assert_eq!(games[0].result, "checkmate");
    assert_eq!(games[0].stake, Some(usd("1.00")));
    assert_eq!(games[0].pot, Some(usd("2.00")));

    // The room is terminal: any further move is rejected.
    let out = h.mv(&room_id, "p1", "a2", "a3").await;
    assert_eq!(move_rejection(&out).as_deref(), Some("game over"));
}

#[tokio::test]
async fn test_agreed_draw_refunds_each_stake() {
    let h = TestHarness::new();
    let room_id = h.paired_room().await;

    // Black offers, white accepts.
    let out = h
        .game
        .offer_draw(&room_id, &"p2".to_string())
        .await;
    assert!(out.iter().any(|o| matches!(
        o,
        Outbound::ToRoom(_, ServerEvent::DrawOffered { from: Color::Black })
    )));

    let out = h.game.accept_draw(&room_id, &"p1".to_string()).await;
    assert_eq!(game_over(&out), Some(("draw".to_string(), None)));

    assert_eq!(h.store.balance("a1").await.unwrap(), usd("5.00"));
    assert_eq!(h.store.balance("a2").await.unwrap(), usd("5.00"));
    let refunds: Vec<_> = h
        .store
        .transactions()
        .into_iter()
        .filter(|t| t.kind == TxKind::StakeRefund)
        .collect();
    assert_eq!(refunds.len(), 2);
    assert!(refunds.iter().all(|t| t.amount == usd("1.00")));

    let games = h.store.games();
    assert!(games[0].winner_id.is_none());
    assert_eq!(games[0].result, "draw");
}

#[tokio::test]
async fn test_offerer_cannot_accept_own_draw() {
    let h = TestHarness::new();
    let room_id = h.paired_room().await;

    h.game.offer_draw(&room_id, &"p2".to_string()).await;
    let out = h.game.accept_draw(&room_id, &"p2".to_string()).await;
    assert!(out.is_empty());

    let room = h.registry.get(&room_id).unwrap();
    assert!(!room.lock().await.over);

    // Declining clears the offer; a later accept does nothing.
    let out = h.game.decline_draw(&room_id, &"p1".to_string()).await;
    assert!(out.iter().any(|o| matches!(
        o,
        Outbound::ToRoom(_, ServerEvent::DrawDeclined { by: Color::White })
    )));
    let out = h.game.accept_draw(&room_id, &"p1".to_string()).await;
    assert!(out.is_empty());
}

#[tokio::test]
async fn test_resignation_awards_opponent() {
    let h = TestHarness::new();
    let room_id = h.paired_room().await;

    let out = h.game.resign(&room_id, &"p1".to_string()).await;
    assert_eq!(
        game_over(&out),
        Some(("resign".to_string(), Some(Color::White)))
    );
    assert_eq!(h.store.balance("a2").await.unwrap(), usd("6.00"));
    assert_eq!(h.store.games()[0].winner_id.as_deref(), Some("a2"));
}

#[tokio::test]
async fn test_flag_trusts_declared_loser_once() {
    let h = TestHarness::new();
    let room_id = h.paired_room().await;

    let out = h.game.flag(&room_id, Color::White).await;
    assert_eq!(
        game_over(&out),
        Some(("timeout".to_string(), Some(Color::White)))
    );
    assert_eq!(h.store.balance("a2").await.unwrap(), usd("6.00"));

    // A second flag against a finished room is ignored: no double payout.
    let out = h.game.flag(&room_id, Color::Black).await;
    assert!(out.is_empty());
    assert_eq!(h.store.balance("a1").await.unwrap(), usd("4.00"));
    assert_eq!(h.store.games().len(), 1);
}

// ============================================================================
// Side channels
// ============================================================================

#[tokio::test]
async fn test_chat_broadcasts_without_touching_state() {
    let h = TestHarness::new();
    let room_id = h.paired_room().await;

    let out = h
        .game
        .send_chat(&room_id, "good luck", Some("alice".to_string()))
        .await;
    assert!(out.iter().any(|o| matches!(
        o,
        Outbound::ToRoom(_, ServerEvent::ChatMessage { text, .. }) if text == "good luck"
    )));

    assert!(h.game.send_chat(&room_id, "   ", None).await.is_empty());
    assert!(
        h.game
            .send_chat(&"nowhere".to_string(), "hi", None)
            .await
            .is_empty()
    );
}

#[tokio::test]
async fn test_set_name_rebroadcasts_names() {
    let h = TestHarness::new();
    let room_id = h.paired_room().await;

    let out = h
        .game
        .set_name(&room_id, &"p1".to_string(), "queen_gambit".to_string())
        .await;
    let names = out.iter().find_map(|o| match o {
        Outbound::ToRoom(_, ServerEvent::PlayerNames { white, black }) => {
            Some((white.clone(), black.clone()))
        }
        _ => None,
    });
    assert_eq!(
        names,
        Some((Some("queen_gambit".to_string()), Some("bob".to_string())))
    );
}
