//! Account store interface
//!
//! Balances, the transaction ledger, display names, and game history live in
//! an external store. The core only ever talks to this trait; the concrete
//! backend is PostgreSQL in production and an in-memory store in tests and
//! when no database is configured.

pub mod memory;
pub mod postgres;

pub use memory::MemoryAccountStore;
pub use postgres::PgAccountStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;

use crate::core_types::{AccountId, RoomId};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("account not found: {0}")]
    AccountNotFound(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        StoreError::Unavailable(e.to_string())
    }
}

/// Ledger entry kind. Entries are append-only and never mutated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TxKind {
    Deposit,
    StakeDebit,
    StakeRefund,
    StakePayout,
}

impl TxKind {
    pub fn as_str(self) -> &'static str {
        match self {
            TxKind::Deposit => "deposit",
            TxKind::StakeDebit => "stake_debit",
            TxKind::StakeRefund => "stake_refund",
            TxKind::StakePayout => "stake_payout",
        }
    }
}

/// Immutable escrow ledger entry.
#[derive(Debug, Clone, Serialize)]
pub struct TransactionRecord {
    pub kind: TxKind,
    pub account_id: AccountId,
    pub amount: Decimal,
    pub room_id: Option<RoomId>,
}

/// One finished game, as recorded in history.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GameRecord {
    pub room_id: RoomId,
    pub white_id: Option<AccountId>,
    pub black_id: Option<AccountId>,
    pub winner_id: Option<AccountId>,
    pub loser_id: Option<AccountId>,
    pub stake: Option<Decimal>,
    pub pot: Option<Decimal>,
    pub result: String,
    pub created_at: DateTime<Utc>,
}

/// External account service: simple get/set/insert operations.
///
/// No transactional guarantees beyond a single call; callers that need
/// atomicity across calls serialize access themselves (see the escrow
/// ledger's per-account locks).
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Current balance for an account.
    async fn balance(&self, account_id: &str) -> Result<Decimal, StoreError>;

    /// Overwrite an account's balance.
    async fn set_balance(&self, account_id: &str, next: Decimal) -> Result<(), StoreError>;

    /// Append a ledger entry.
    async fn record_transaction(&self, entry: TransactionRecord) -> Result<(), StoreError>;

    /// Append a game-history entry.
    async fn record_game(&self, entry: GameRecord) -> Result<(), StoreError>;

    /// Resolve an account's display name, if it has one.
    async fn display_name(&self, account_id: &str) -> Result<Option<String>, StoreError>;

    /// Most recent games involving an account, newest first.
    async fn recent_games(
        &self,
        account_id: &str,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<GameRecord>, StoreError>;
}
