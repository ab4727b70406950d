//! PostgreSQL account store
//!
//! Schema mirrors the account service this talks to:
//! `profiles(id, username, balance)`, `transactions(...)`, `games(...)`.

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use sqlx::{PgPool, Row};

use super::{AccountStore, GameRecord, StoreError, TransactionRecord};

pub struct PgAccountStore {
    pool: PgPool,
}

impl PgAccountStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let pool = PgPool::connect(url).await?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl AccountStore for PgAccountStore {
    async fn balance(&self, account_id: &str) -> Result<Decimal, StoreError> {
        let row = sqlx::query(r#"SELECT balance FROM profiles WHERE id = $1"#)
            .bind(account_id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|r| r.get("balance"))
            .ok_or_else(|| StoreError::AccountNotFound(account_id.to_string()))
    }

    async fn set_balance(&self, account_id: &str, next: Decimal) -> Result<(), StoreError> {
        let result = sqlx::query(r#"UPDATE profiles SET balance = $2 WHERE id = $1"#)
            .bind(account_id)
            .bind(next)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::AccountNotFound(account_id.to_string()));
        }
        Ok(())
    }

    async fn record_transaction(&self, entry: TransactionRecord) -> Result<(), StoreError> {
        sqlx::query(
            r#"INSERT INTO transactions (type, account_id, amount, room_id, status)
               VALUES ($1, $2, $3, $4, 'complete')"#,
        )
        .bind(entry.kind.as_str())
        .bind(&entry.account_id)
        .bind(entry.amount)
        .bind(&entry.room_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn record_game(&self, entry: GameRecord) -> Result<(), StoreError> {
        sqlx::query(
            r#"INSERT INTO games
               (room_id, white_id, black_id, winner_id, loser_id, stake, pot, result, created_at)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)"#,
        )
        .bind(&entry.room_id)
        .bind(&entry.white_id)
        .bind(&entry.black_id)
        .bind(&entry.winner_id)
        .bind(&entry.loser_id)
        .bind(entry.stake)
        .bind(entry.pot)
        .bind(&entry.result)
        .bind(entry.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn display_name(&self, account_id: &str) -> Result<Option<String>, StoreError> {
        let row = sqlx::query(r#"SELECT username FROM profiles WHERE id = $1"#)
            .bind(account_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.and_then(|r| r.get::<Option<String>, _>("username")))
    }

    async fn recent_games(
        &self,
        account_id: &str,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<GameRecord>, StoreError> {
        let rows = sqlx::query(
            r#"SELECT room_id, white_id, black_id, winner_id, loser_id,
                      stake, pot, result, created_at
               FROM games
               WHERE white_id = $1 OR black_id = $1
               ORDER BY created_at DESC
               LIMIT $2 OFFSET $3"#,
        )
        .bind(account_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| GameRecord {
                room_id: r.get("room_id"),
                white_id: r.get("white_id"),
                black_id: r.get("black_id"),
                winner_id: r.get("winner_id"),
                loser_id: r.get("loser_id"),
                stake: r.get("stake"),
                pot: r.get("pot"),
                result: r.get("result"),
                created_at: r.get::<chrono::DateTime<Utc>, _>("created_at"),
            })
            .collect())
    }
}
