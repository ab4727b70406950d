//! In-memory account store
//!
//! Used by tests and as the fallback backend when no `postgres_url` is
//! configured. Failure switches let tests exercise every unavailable-store
//! path without a database.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use rust_decimal::Decimal;

use super::{AccountStore, GameRecord, StoreError, TransactionRecord};

#[derive(Default)]
pub struct MemoryAccountStore {
    balances: Mutex<HashMap<String, Decimal>>,
    names: Mutex<HashMap<String, String>>,
    transactions: Mutex<Vec<TransactionRecord>>,
    games: Mutex<Vec<GameRecord>>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    fail_records: AtomicBool,
    fail_write_accounts: Mutex<HashSet<String>>,
}

impl MemoryAccountStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an account with a balance (and optionally a display name).
    pub fn seed(&self, account_id: &str, balance: Decimal, name: Option<&str>) {
        self.balances
            .lock()
            .unwrap()
            .insert(account_id.to_string(), balance);
        if let Some(name) = name {
            self.names
                .lock()
                .unwrap()
                .insert(account_id.to_string(), name.to_string());
        }
    }

    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_records(&self, fail: bool) {
        self.fail_records.store(fail, Ordering::SeqCst);
    }

    /// Fail balance writes for one account only (e.g. the second debit of a
    /// pairing, to force the compensation path).
    pub fn set_fail_writes_for(&self, account_id: &str, fail: bool) {
        let mut set = self.fail_write_accounts.lock().unwrap();
        if fail {
            set.insert(account_id.to_string());
        } else {
            set.remove(account_id);
        }
    }

    pub fn transactions(&self) -> Vec<TransactionRecord> {
        self.transactions.lock().unwrap().clone()
    }

    pub fn games(&self) -> Vec<GameRecord> {
        self.games.lock().unwrap().clone()
    }
}

#[async_trait]
impl AccountStore for MemoryAccountStore {
    async fn balance(&self, account_id: &str) -> Result<Decimal, StoreError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("reads disabled".into()));
        }
        self.balances
            .lock()
            .unwrap()
            .get(account_id)
            .copied()
            .ok_or_else(|| StoreError::AccountNotFound(account_id.to_string()))
    }

    async fn set_balance(&self, account_id: &str, next: Decimal) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst)
            || self.fail_write_accounts.lock().unwrap().contains(account_id)
        {
            return Err(StoreError::Unavailable("writes disabled".into()));
        }
        self.balances
            .lock()
            .unwrap()
            .insert(account_id.to_string(), next);
        Ok(())
    }

    async fn record_transaction(&self, entry: TransactionRecord) -> Result<(), StoreError> {
        if self.fail_records.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("records disabled".into()));
        }
        self.transactions.lock().unwrap().push(entry);
        Ok(())
    }

    async fn record_game(&self, entry: GameRecord) -> Result<(), StoreError> {
        if self.fail_records.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("records disabled".into()));
        }
        self.games.lock().unwrap().push(entry);
        Ok(())
    }

    async fn display_name(&self, account_id: &str) -> Result<Option<String>, StoreError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("reads disabled".into()));
        }
        Ok(self.names.lock().unwrap().get(account_id).cloned())
    }

    async fn recent_games(
        &self,
        account_id: &str,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<GameRecord>, StoreError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("reads disabled".into()));
        }
        let games = self.games.lock().unwrap();
        let mut mine: Vec<GameRecord> = games
            .iter()
            .filter(|g| {
                g.white_id.as_deref() == Some(account_id)
                    || g.black_id.as_deref() == Some(account_id)
            })
            .cloned()
            .collect();
        mine.reverse();
        Ok(mine
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect())
    }
}
