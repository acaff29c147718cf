//! Postgres-backed wallet store
//!
//! This module provides the `PostgresWalletStore` struct, which persists wallets
//! and their audit log in two tables and serializes mutations per wallet with a
//! row-level `SELECT ... FOR UPDATE` lock held for the life of one transaction.
//!
//! # Locking
//!
//! ```text
//! BEGIN
//!   SET LOCAL lock_timeout = '<n>ms'
//!   SELECT ... FROM wallets WHERE id = $1 FOR UPDATE   -- lock_wallet
//!   UPDATE wallets SET balance = ...                   -- commit
//!   INSERT INTO transactions ...                       -- commit
//! COMMIT                                               -- or ROLLBACK on drop
//! ```
//!
//! The row lock is the only serialization point that spans processes, so this
//! store is the one to use when more than one instance shares a database.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{FromRow, Postgres, Transaction};
use tracing::info;
use uuid::Uuid;

use super::traits::{WalletLock, WalletStore};
use crate::config::DatabaseConfig;
use crate::types::{
    Amount, Balance, LedgerError, OperationKind, TransactionRecord, Wallet, WalletId,
};

/// Schema statements, run in order by [`PostgresWalletStore::ensure_schema`]
const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS wallets (
        id         UUID PRIMARY KEY,
        balance    BIGINT NOT NULL DEFAULT 0 CHECK (balance >= 0),
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS transactions (
        id             UUID PRIMARY KEY,
        seq            BIGSERIAL NOT NULL UNIQUE,
        wallet_id      UUID NOT NULL REFERENCES wallets(id),
        operation_type TEXT NOT NULL CHECK (operation_type IN ('DEPOSIT', 'WITHDRAW')),
        amount         BIGINT NOT NULL CHECK (amount > 0),
        created_at     TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS transactions_wallet_seq_idx
        ON transactions (wallet_id, seq)
    "#,
];

#[derive(Debug, FromRow)]
struct WalletRow {
    id: Uuid,
    balance: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<WalletRow> for Wallet {
    fn from(row: WalletRow) -> Self {
        Wallet {
            id: row.id,
            balance: row.balance,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct TransactionRow {
    id: Uuid,
    seq: i64,
    wallet_id: Uuid,
    operation_type: String,
    amount: i64,
    created_at: DateTime<Utc>,
}

impl TryFrom<TransactionRow> for TransactionRecord {
    type Error = LedgerError;

    fn try_from(row: TransactionRow) -> Result<Self, Self::Error> {
        Ok(TransactionRecord {
            id: row.id,
            wallet_id: row.wallet_id,
            kind: row.operation_type.parse()?,
            amount: row.amount,
            sequence: row.seq,
            created_at: row.created_at,
        })
    }
}

/// `SET LOCAL lock_timeout` statement for `timeout`
///
/// Postgres reads `0` as "wait forever", so the value is rounded up to whole
/// milliseconds and never goes below 1.
fn set_lock_timeout(timeout: Duration) -> String {
    let millis = timeout.as_micros().div_ceil(1000).max(1);
    format!("SET LOCAL lock_timeout = '{}ms'", millis)
}

/// Wallet store over an injected Postgres connection pool
#[derive(Debug, Clone)]
pub struct PostgresWalletStore {
    pool: PgPool,
    lock_timeout: Duration,
}

impl PostgresWalletStore {
    /// Wrap an existing pool
    pub fn new(pool: PgPool, lock_timeout: Duration) -> Self {
        Self { pool, lock_timeout }
    }

    /// Open a pool from configuration and verify it with a round trip
    pub async fn connect(
        config: &DatabaseConfig,
        lock_timeout: Duration,
    ) -> Result<Self, LedgerError> {
        info!(
            max_connections = config.max_connections,
            "Connecting to database..."
        );

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.acquire_timeout)
            .connect(&config.url)
            .await?;

        sqlx::query("SELECT 1").execute(&pool).await?;

        info!("Database connection verified");

        Ok(Self::new(pool, lock_timeout))
    }

    /// Create the tables and index if they do not exist
    pub async fn ensure_schema(&self) -> Result<(), LedgerError> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        info!("Wallet schema ready");
        Ok(())
    }

    async fn wallet_exists(&self, wallet_id: WalletId) -> Result<bool, LedgerError> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM wallets WHERE id = $1)")
            .bind(wallet_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(exists)
    }
}

#[async_trait]
impl WalletStore for PostgresWalletStore {
    async fn create_wallet(&self) -> Result<Wallet, LedgerError> {
        let row = sqlx::query_as::<_, WalletRow>(
            r#"
            INSERT INTO wallets (id, balance)
            VALUES ($1, 0)
            RETURNING id, balance, created_at, updated_at
            "#,
        )
        .bind(Uuid::new_v4())
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into())
    }

    async fn get_wallet(&self, wallet_id: WalletId) -> Result<Wallet, LedgerError> {
        sqlx::query_as::<_, WalletRow>(
            "SELECT id, balance, created_at, updated_at FROM wallets WHERE id = $1",
        )
        .bind(wallet_id)
        .fetch_optional(&self.pool)
        .await?
        .map(Wallet::from)
        .ok_or_else(|| LedgerError::wallet_not_found(wallet_id))
    }

    async fn list_transactions(
        &self,
        wallet_id: WalletId,
    ) -> Result<Vec<TransactionRecord>, LedgerError> {
        // Wallets are never deleted, so a positive check stays true for the list query.
        if !self.wallet_exists(wallet_id).await? {
            return Err(LedgerError::wallet_not_found(wallet_id));
        }

        let rows = sqlx::query_as::<_, TransactionRow>(
            r#"
            SELECT id, seq, wallet_id, operation_type, amount, created_at
            FROM transactions
            WHERE wallet_id = $1
            ORDER BY seq
            "#,
        )
        .bind(wallet_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TransactionRecord::try_from).collect()
    }

    async fn lock_wallet(&self, wallet_id: WalletId) -> Result<Box<dyn WalletLock>, LedgerError> {
        let mut tx = self.pool.begin().await?;

        // SET does not take bind parameters; the value is an integer we format ourselves.
        sqlx::query(&set_lock_timeout(self.lock_timeout))
            .execute(&mut *tx)
            .await?;

        let row = sqlx::query_as::<_, WalletRow>(
            r#"
            SELECT id, balance, created_at, updated_at
            FROM wallets
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(wallet_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| LedgerError::from_locked_query(wallet_id, e))?;

        // An early return drops `tx`, which rolls the transaction back.
        let wallet = row
            .map(Wallet::from)
            .ok_or_else(|| LedgerError::wallet_not_found(wallet_id))?;

        Ok(Box::new(PostgresWalletLock { tx, wallet }))
    }

    async fn close(&self) {
        self.pool.close().await;
        info!("Database pool closed");
    }
}

/// Open transaction holding the row lock on one wallet
///
/// Dropping it without commit rolls the transaction back.
struct PostgresWalletLock {
    tx: Transaction<'static, Postgres>,
    wallet: Wallet,
}

#[async_trait]
impl WalletLock for PostgresWalletLock {
    fn wallet(&self) -> &Wallet {
        &self.wallet
    }

    async fn commit(
        self: Box<Self>,
        new_balance: Balance,
        kind: OperationKind,
        amount: Amount,
    ) -> Result<TransactionRecord, LedgerError> {
        let PostgresWalletLock { mut tx, wallet } = *self;

        sqlx::query(
            r#"
            UPDATE wallets
            SET balance = $1, updated_at = NOW()
            WHERE id = $2
            "#,
        )
        .bind(new_balance)
        .bind(wallet.id)
        .execute(&mut *tx)
        .await?;

        let row = sqlx::query_as::<_, TransactionRow>(
            r#"
            INSERT INTO transactions (id, wallet_id, operation_type, amount)
            VALUES ($1, $2, $3, $4)
            RETURNING id, seq, wallet_id, operation_type, amount, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(wallet.id)
        .bind(kind.as_str())
        .bind(amount)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        TransactionRecord::try_from(row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::default(Duration::from_millis(5000), "SET LOCAL lock_timeout = '5000ms'")]
    #[case::zero(Duration::ZERO, "SET LOCAL lock_timeout = '1ms'")]
    #[case::sub_millisecond(Duration::from_micros(300), "SET LOCAL lock_timeout = '1ms'")]
    #[case::rounds_up(Duration::from_micros(1500), "SET LOCAL lock_timeout = '2ms'")]
    fn test_lock_timeout_never_disables_waiting(#[case] timeout: Duration, #[case] expected: &str) {
        assert_eq!(set_lock_timeout(timeout), expected);
    }
}
