//! Escrow ledger
//!
//! Debits, credits, and refunds player balances through the account store and
//! appends immutable ledger entries. The store only offers get/set, so the
//! read-modify-write window is closed here: every balance mutation for an
//! account happens under that account's lock from the lock table. This is a
//! correctness requirement - two concurrent pairings touching the same
//! account must not interleave between the balance read and write.

use std::sync::Arc;

use dashmap::DashMap;
use rust_decimal::{Decimal, RoundingStrategy};
use thiserror::Error;
use tracing::warn;

use crate::core_types::AccountId;
use crate::store::{AccountStore, StoreError, TransactionRecord, TxKind};

#[derive(Debug, Error)]
pub enum EscrowError {
    #[error("insufficient funds")]
    Insufficient,

    #[error("balance unavailable: {0}")]
    Unavailable(#[from] StoreError),
}

pub struct EscrowLedger {
    store: Arc<dyn AccountStore>,
    /// Per-account mutation locks. Entries are never removed; the table is
    /// bounded by the number of accounts seen by this process.
    locks: DashMap<AccountId, Arc<tokio::sync::Mutex<()>>>,
}

impl EscrowLedger {
    pub fn new(store: Arc<dyn AccountStore>) -> Self {
        Self {
            store,
            locks: DashMap::new(),
        }
    }

    /// All persisted amounts carry exactly 2 decimal places.
    pub fn round(amount: Decimal) -> Decimal {
        amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
    }

    async fn account_guard(&self, account_id: &str) -> tokio::sync::OwnedMutexGuard<()> {
        let lock = self
            .locks
            .entry(account_id.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone();
        lock.lock_owned().await
    }

    /// Plain balance read (no lock; callers that act on the value go through
    /// `debit`/`credit`, which re-read under the account lock).
    pub async fn balance(&self, account_id: &str) -> Result<Decimal, EscrowError> {
        Ok(self.store.balance(account_id).await?)
    }

    /// Hold `amount` from an account. Re-validates sufficiency under the
    /// account lock, then writes the decremented balance and appends a
    /// `stake_debit` entry.
    pub async fn debit(
        &self,
        account_id: &str,
        amount: Decimal,
        room_id: Option<&str>,
    ) -> Result<(), EscrowError> {
        let amount = Self::round(amount);
        let _guard = self.account_guard(account_id).await;

        let balance = self.store.balance(account_id).await?;
        if balance < amount {
            return Err(EscrowError::Insufficient);
        }
        let next = Self::round((balance - amount).max(Decimal::ZERO));
        self.store.set_balance(account_id, next).await?;
        self.record(TxKind::StakeDebit, account_id, amount, room_id).await;
        Ok(())
    }

    /// Return funds to an account: `stake_refund` for compensations and draw
    /// settlement, `stake_payout` for the winner's pot, `deposit` for
    /// gateway-triggered top-ups.
    pub async fn credit(
        &self,
        account_id: &str,
        amount: Decimal,
        kind: TxKind,
        room_id: Option<&str>,
    ) -> Result<(), EscrowError> {
        let amount = Self::round(amount);
        let _guard = self.account_guard(account_id).await;

        let balance = self.store.balance(account_id).await?;
        let next = Self::round(balance + amount);
        self.store.set_balance(account_id, next).await?;
        self.record(kind, account_id, amount, room_id).await;
        Ok(())
    }

    /// Ledger append is best-effort once the balance write landed: a failed
    /// entry is logged, not retried, and never unwinds the balance change.
    async fn record(&self, kind: TxKind, account_id: &str, amount: Decimal, room_id: Option<&str>) {
        let entry = TransactionRecord {
            kind,
            account_id: account_id.to_string(),
            amount,
            room_id: room_id.map(str::to_string),
        };
        if let Err(e) = self.store.record_transaction(entry).await {
            warn!(account_id, kind = kind.as_str(), %amount, "ledger entry failed: {e}");
        }
    }
}
