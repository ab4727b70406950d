//! Settlement engine
//!
//! Computes the payout/refund distribution for a terminal outcome and drives
//! the escrow ledger and game-history recording. By the time settlement runs
//! the game-over broadcast has already gone out, so every operation here is
//! best-effort: failures are logged and swallowed, never surfaced to players
//! and never retried. Availability over consistency, by contract.
//!
//! Distribution rule:
//! - draw: each seated account gets its own stake back (`stake_refund` each)
//! - decisive: the winner gets the full pot (`stake_payout`, one entry; the
//!   loser's stake was already held at pairing time)

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use tracing::{info, warn};

use crate::core_types::Color;
use crate::escrow::EscrowLedger;
use crate::room::Room;
use crate::store::{AccountStore, GameRecord, TxKind};

pub struct SettlementEngine {
    escrow: Arc<EscrowLedger>,
    store: Arc<dyn AccountStore>,
}

impl SettlementEngine {
    pub fn new(escrow: Arc<EscrowLedger>, store: Arc<dyn AccountStore>) -> Self {
        Self { escrow, store }
    }

    /// Settle a finished room. `winner` is `None` for any drawn outcome.
    pub async fn settle(&self, room: &Room, winner: Option<Color>, reason: &str) {
        let white_account = room.white.as_ref().and_then(|p| p.account_id.clone());
        let black_account = room.black.as_ref().and_then(|p| p.account_id.clone());
        let stake = room.stake_each.unwrap_or(Decimal::ZERO);
        let pot = room.pot.unwrap_or(Decimal::ZERO);

        info!(
            room_id = %room.id,
            reason,
            winner = winner.map(Color::as_str),
            %stake,
            "settling room"
        );

        match winner {
            None => {
                for account in [&white_account, &black_account].into_iter().flatten() {
                    if stake > Decimal::ZERO {
                        self.refund(account, stake, &room.id).await;
                    }
                }
                self.record_history(room, None, None, reason).await;
            }
            Some(color) => {
                let winner_account = match color {
                    Color::White => white_account.clone(),
                    Color::Black => black_account.clone(),
                };
                let loser_account = match color {
                    Color::White => black_account.clone(),
                    Color::Black => white_account.clone(),
                };
                if let Some(account) = &winner_account {
                    if pot > Decimal::ZERO {
                        self.payout(account, pot, &room.id).await;
                    }
                }
                self.record_history(room, winner_account, loser_account, reason)
                    .await;
            }
        }
    }

    async fn refund(&self, account_id: &str, stake: Decimal, room_id: &str) {
        if let Err(e) = self
            .escrow
            .credit(account_id, stake, TxKind::StakeRefund, Some(room_id))
            .await
        {
            warn!(account_id, room_id, "stake refund failed: {e}");
        }
    }

    async fn payout(&self, account_id: &str, pot: Decimal, room_id: &str) {
        if let Err(e) = self
            .escrow
            .credit(account_id, pot, TxKind::StakePayout, Some(room_id))
            .await
        {
            warn!(account_id, room_id, "pot payout failed: {e}");
        }
    }

    async fn record_history(
        &self,
        room: &Room,
        winner_id: Option<String>,
        loser_id: Option<String>,
        reason: &str,
    ) {
        let entry = GameRecord {
            room_id: room.id.clone(),
            white_id: room.white.as_ref().and_then(|p| p.account_id.clone()),
            black_id: room.black.as_ref().and_then(|p| p.account_id.clone()),
            winner_id,
            loser_id,
            stake: room.stake_each,
            pot: room.pot,
            result: reason.to_string(),
            created_at: Utc::now(),
        };
        if let Err(e) = self.store.record_game(entry).await {
            warn!(room_id = %room.id, "game history record failed: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::room::PlayerSlot;
    use crate::store::MemoryAccountStore;
    use std::str::FromStr;

    fn usd(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn staked_room(store: &MemoryAccountStore) -> Room {
        // Both stakes already escrowed: balances reflect the post-debit state.
        store.seed("acct-w", usd("9.00"), None);
        store.seed("acct-b", usd("4.00"), None);
        let mut room = Room::new("room-1".into());
        room.white = Some(PlayerSlot {
            player_id: "pw".into(),
            session_id: "sw".into(),
            name: None,
            account_id: Some("acct-w".into()),
        });
        room.black = Some(PlayerSlot {
            player_id: "pb".into(),
            session_id: "sb".into(),
            name: None,
            account_id: Some("acct-b".into()),
        });
        room.stake_each = Some(usd("1.00"));
        room.pot = Some(usd("2.00"));
        room.over = true;
        room
    }

    #[tokio::test]
    async fn test_decisive_pays_full_pot_to_winner_only() {
        let store = Arc::new(MemoryAccountStore::new());
        let room = staked_room(&store);
        let engine = SettlementEngine::new(Arc::new(EscrowLedger::new(store.clone())), store.clone());

        engine.settle(&room, Some(Color::Black), "checkmate").await;

        assert_eq!(store.balance("acct-w").await.unwrap(), usd("9.00"));
        assert_eq!(store.balance("acct-b").await.unwrap(), usd("6.00"));

        let txs = store.transactions();
        assert_eq!(txs.len(), 1);
        assert_eq!(txs[0].kind, TxKind::StakePayout);
        assert_eq!(txs[0].amount, usd("2.00"));
        assert_eq!(txs[0].account_id, "acct-b");

        let games = store.games();
        assert_eq!(games.len(), 1);
        assert_eq!(games[0].winner_id.as_deref(), Some("acct-b"));
        assert_eq!(games[0].loser_id.as_deref(), Some("acct-w"));
        assert_eq!(games[0].result, "checkmate");
    }

    #[tokio::test]
    async fn test_draw_refunds_each_stake() {
        let store = Arc::new(MemoryAccountStore::new());
        let room = staked_room(&store);
        let engine = SettlementEngine::new(Arc::new(EscrowLedger::new(store.clone())), store.clone());

        engine.settle(&room, None, "draw").await;

        assert_eq!(store.balance("acct-w").await.unwrap(), usd("10.00"));
        assert_eq!(store.balance("acct-b").await.unwrap(), usd("5.00"));

        let txs = store.transactions();
        assert_eq!(txs.len(), 2);
        assert!(txs.iter().all(|t| t.kind == TxKind::StakeRefund));
        assert!(txs.iter().all(|t| t.amount == usd("1.00")));

        let games = store.games();
        assert!(games[0].winner_id.is_none());
        assert!(games[0].loser_id.is_none());
    }

    #[tokio::test]
    async fn test_store_failure_is_swallowed() {
        let store = Arc::new(MemoryAccountStore::new());
        let room = staked_room(&store);
        let engine = SettlementEngine::new(Arc::new(EscrowLedger::new(store.clone())), store.clone());

        store.set_fail_writes(true);
        store.set_fail_records(true);
        // Must not panic or surface anything.
        engine.settle(&room, Some(Color::White), "resign").await;
        assert!(store.games().is_empty());
    }
}
