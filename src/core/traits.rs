//! Core traits for wallet storage and per-wallet locking
//!
//! These traits are the seam between the balance mutator and the storage
//! backends. Both the in-memory and the Postgres store implement them, so the
//! mutator's read-validate-write algorithm is written once.

use async_trait::async_trait;

use crate::types::{Amount, Balance, LedgerError, OperationKind, TransactionRecord, Wallet, WalletId};

/// Durable, transactional storage for wallets and their audit log
///
/// Implementations must give exclusive per-wallet access through
/// [`WalletStore::lock_wallet`] and must never hold a cross-wallet lock, so
/// unrelated wallets can be mutated in parallel.
#[async_trait]
pub trait WalletStore: Send + Sync + std::fmt::Debug {
    /// Insert a new wallet with balance 0 and a fresh identifier
    async fn create_wallet(&self) -> Result<Wallet, LedgerError>;

    /// Committed read of a wallet row
    ///
    /// Does not wait on in-flight mutations.
    async fn get_wallet(&self, wallet_id: WalletId) -> Result<Wallet, LedgerError>;

    /// All audit records for a wallet, oldest first
    ///
    /// Fails with `WalletNotFound` if the wallet does not exist.
    async fn list_transactions(
        &self,
        wallet_id: WalletId,
    ) -> Result<Vec<TransactionRecord>, LedgerError>;

    /// Acquire the exclusive mutation lock for a wallet and read it under that lock
    ///
    /// Fails with `WalletNotFound` if the wallet does not exist and with
    /// `LockTimeout` if the lock cannot be acquired within the store's bound.
    async fn lock_wallet(&self, wallet_id: WalletId) -> Result<Box<dyn WalletLock>, LedgerError>;

    /// Release storage resources (connection pool, etc.)
    async fn close(&self) {}
}

/// Exclusive, scoped hold on one wallet
///
/// Dropping the lock without calling [`WalletLock::commit`] aborts the
/// mutation: nothing is written and the lock is released.
#[async_trait]
pub trait WalletLock: Send {
    /// The wallet as read under the lock
    fn wallet(&self) -> &Wallet;

    /// Write the new balance and append the audit record as one atomic unit
    ///
    /// The lock is released once the commit returns, whether it succeeded or not.
    async fn commit(
        self: Box<Self>,
        new_balance: Balance,
        kind: OperationKind,
        amount: Amount,
    ) -> Result<TransactionRecord, LedgerError>;
}
