//! Pairing queue
//!
//! Waiting players sit in FIFO buckets keyed by (time control, stake in
//! cents) so only equal-stake, equal-time-control players can ever meet. When
//! a bucket reaches two tickets the matchmaker pops the two oldest and runs
//! the pairing protocol: stake equality, balance reads, sufficiency, escrow
//! debits with compensation, then room creation and `paired` notification.
//!
//! The bucket map lock is never held across an await; tickets are popped
//! before the async balance phase and pushed back to the bucket front on
//! failure, preserving queue position.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use tracing::{info, warn};
use uuid::Uuid;

use crate::core_types::{AccountId, PlayerId, SessionId};
use crate::escrow::EscrowLedger;
use crate::messages::{Outbound, ServerEvent};
use crate::room::RoomRegistry;
use crate::store::TxKind;

/// A queued matchmaking request.
#[derive(Debug, Clone)]
pub struct Ticket {
    pub player_id: PlayerId,
    pub session_id: SessionId,
    pub account_id: AccountId,
    pub stake: Decimal,
}

type BucketKey = (String, u64);

/// Stake bucketing: whole cents, floored, never negative.
pub fn stake_cents(stake: Decimal) -> u64 {
    (stake * Decimal::ONE_HUNDRED)
        .floor()
        .to_u64()
        .unwrap_or(0)
}

fn floor_cents(stake: Decimal) -> Decimal {
    Decimal::from(stake_cents(stake)) / Decimal::ONE_HUNDRED
}

pub struct Matchmaker {
    buckets: Mutex<HashMap<BucketKey, VecDeque<Ticket>>>,
    escrow: Arc<EscrowLedger>,
    registry: Arc<RoomRegistry>,
}

impl Matchmaker {
    pub fn new(escrow: Arc<EscrowLedger>, registry: Arc<RoomRegistry>) -> Self {
        Self {
            buckets: Mutex::new(HashMap::new()),
            escrow,
            registry,
        }
    }

    /// Number of tickets waiting in one bucket.
    pub fn waiting(&self, time: &str, stake: Decimal) -> usize {
        let key = (time.to_string(), stake_cents(stake));
        self.buckets
            .lock()
            .unwrap()
            .get(&key)
            .map(VecDeque::len)
            .unwrap_or(0)
    }

    /// Enqueue a ticket and attempt a pairing.
    ///
    /// A duplicate enqueue for a player already in the bucket adds nothing
    /// but still runs the length check, so a client retrying during
    /// reconnect cannot lose a pairing opportunity.
    pub async fn enqueue(&self, time: &str, ticket: Ticket) -> Vec<Outbound> {
        let key: BucketKey = (time.to_string(), stake_cents(ticket.stake));

        let popped = {
            let mut buckets = self.buckets.lock().unwrap();
            let bucket = buckets.entry(key.clone()).or_default();
            if !bucket.iter().any(|t| t.player_id == ticket.player_id) {
                bucket.push_back(ticket.clone());
            }
            info!(
                time,
                player_id = %ticket.player_id,
                stake = %ticket.stake,
                queue_len = bucket.len(),
                "enqueued for pairing"
            );
            if bucket.len() >= 2 {
                let a = bucket.pop_front();
                let b = bucket.pop_front();
                a.zip(b)
            } else {
                None
            }
        };

        match popped {
            Some((a, b)) => self.pair(&key, time, a, b).await,
            None => Vec::new(),
        }
    }

    async fn pair(&self, key: &BucketKey, time: &str, a: Ticket, b: Ticket) -> Vec<Outbound> {
        // Step 1: exact stake equality. Bucket keying makes a mismatch
        // unreachable, but it is enforced anyway as a defensive invariant.
        let stake_each = floor_cents(a.stake);
        if stake_each <= Decimal::ZERO || stake_each != floor_cents(b.stake) {
            warn!(time, a = %a.stake, b = %b.stake, "stake mismatch inside bucket");
            return vec![
                rejected(&a, "Stake mismatch"),
                rejected(&b, "Stake mismatch"),
            ];
        }

        // Step 2: both balances must be readable before anything is touched.
        let bal_a = self.escrow.balance(&a.account_id).await;
        let bal_b = self.escrow.balance(&b.account_id).await;
        let (bal_a, bal_b) = match (bal_a, bal_b) {
            (Ok(x), Ok(y)) => (x, y),
            _ => {
                return vec![
                    rejected(&a, "Balance unavailable"),
                    rejected(&b, "Balance unavailable"),
                ];
            }
        };

        // Step 3: insufficiency rejects only the offender; the other ticket
        // keeps its queue position at the bucket front.
        if bal_a < stake_each {
            self.requeue_front(key, vec![b]);
            return vec![rejected(&a, "Insufficient funds")];
        }
        if bal_b < stake_each {
            self.requeue_front(key, vec![a]);
            return vec![rejected(&b, "Insufficient funds")];
        }

        // Step 4: escrow both stakes, compensating on partial failure.
        if let Err(e) = self.escrow.debit(&a.account_id, stake_each, None).await {
            warn!(account_id = %a.account_id, "escrow debit failed: {e}");
            let out = vec![rejected(&a, "Escrow failed"), rejected(&b, "Escrow failed")];
            self.requeue_front(key, vec![a, b]);
            return out;
        }
        if let Err(e) = self.escrow.debit(&b.account_id, stake_each, None).await {
            warn!(account_id = %b.account_id, "escrow debit failed: {e}");
            self.refund_first_debit(&a.account_id, stake_each).await;
            let out = vec![rejected(&a, "Escrow failed"), rejected(&b, "Escrow failed")];
            self.requeue_front(key, vec![a, b]);
            return out;
        }

        // Step 5: both stakes held - create the room and notify.
        let room_id = Uuid::new_v4().to_string();
        let room = self.registry.get_or_create(&room_id);
        {
            let mut room = room.lock().await;
            room.time_control = Some(time.to_string());
            room.over = false;
            room.stake_each = Some(stake_each);
            room.pot = Some(EscrowLedger::round(stake_each * Decimal::TWO));
        }
        info!(%room_id, time, stake = %stake_each, "players paired");

        let paired = ServerEvent::Paired {
            room_id: room_id.clone(),
            time: time.to_string(),
        };
        vec![
            Outbound::ToSession(a.session_id, paired.clone()),
            Outbound::ToSession(b.session_id, paired),
        ]
    }

    /// Compensating refund for an already-held stake. Best-effort: a failure
    /// here is logged and not retried - the account store offers nothing
    /// stronger to lean on.
    async fn refund_first_debit(&self, account_id: &str, stake: Decimal) {
        if let Err(e) = self
            .escrow
            .credit(account_id, stake, TxKind::StakeRefund, None)
            .await
        {
            warn!(account_id, "compensating refund failed: {e}");
        }
    }

    /// Push tickets back to the bucket front, first argument first.
    fn requeue_front(&self, key: &BucketKey, tickets: Vec<Ticket>) {
        let mut buckets = self.buckets.lock().unwrap();
        let bucket = buckets.entry(key.clone()).or_default();
        for ticket in tickets.into_iter().rev() {
            bucket.push_front(ticket);
        }
    }
}

fn rejected(ticket: &Ticket, reason: &str) -> Outbound {
    Outbound::ToSession(
        ticket.session_id.clone(),
        ServerEvent::QueueRejected {
            reason: reason.to_string(),
        },
    )
}
