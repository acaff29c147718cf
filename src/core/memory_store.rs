//! Single-instance wallet store with a per-wallet mutex map
//!
//! This module provides the `MemoryWalletStore` struct, which keeps wallets and
//! their audit logs in process memory using concurrent data structures.
//!
//! # Design
//!
//! Each wallet lives in its own slot inside a `DashMap`. A slot carries two locks:
//!
//! - a `tokio::sync::Mutex` that serializes mutations on that wallet and is held
//!   for the whole read-validate-write sequence
//! - a `parking_lot::RwLock` over the committed state (wallet row and audit log)
//!   that is held only while a commit swaps in the new balance and record
//!
//! Readers only touch the second lock, so they never wait on an in-flight
//! mutation and always see a balance together with the record that produced it.
//!
//! # Thread Safety
//!
//! There is no global lock. Mutations on different wallets proceed in parallel;
//! mutations on the same wallet are strictly serialized. Only valid for a single
//! process; multi-instance deployments need the Postgres store.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use parking_lot::RwLock;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::trace;
use uuid::Uuid;

use super::traits::{WalletLock, WalletStore};
use crate::config::DEFAULT_LOCK_TIMEOUT;
use crate::types::{
    Amount, Balance, LedgerError, OperationKind, TransactionRecord, Wallet, WalletId,
};

/// Committed state of one wallet
#[derive(Debug)]
struct WalletState {
    wallet: Wallet,
    log: Vec<TransactionRecord>,
}

/// One wallet's locks and committed state
#[derive(Debug)]
struct WalletSlot {
    /// Serializes mutations; held across read, validate and write
    mutation: Arc<Mutex<()>>,

    /// Committed state; write-locked only for the instant of a commit
    state: RwLock<WalletState>,
}

impl WalletSlot {
    fn new(wallet: Wallet) -> Self {
        Self {
            mutation: Arc::new(Mutex::new(())),
            state: RwLock::new(WalletState {
                wallet,
                log: Vec::new(),
            }),
        }
    }
}

/// In-process wallet store
///
/// `MemoryWalletStore` is `Send + Sync` and is meant to be shared behind an
/// `Arc`. Lock acquisition is bounded by `lock_timeout`.
#[derive(Debug)]
pub struct MemoryWalletStore {
    /// Wallet slots by wallet ID
    wallets: DashMap<WalletId, Arc<WalletSlot>>,

    /// Last assigned audit sequence number
    sequence: Arc<AtomicI64>,

    /// Upper bound on waiting for a wallet's mutation lock
    lock_timeout: Duration,
}

impl MemoryWalletStore {
    /// Create an empty store with the default lock timeout
    pub fn new() -> Self {
        Self::with_lock_timeout(DEFAULT_LOCK_TIMEOUT)
    }

    /// Create an empty store with a custom lock timeout
    pub fn with_lock_timeout(lock_timeout: Duration) -> Self {
        Self {
            wallets: DashMap::new(),
            sequence: Arc::new(AtomicI64::new(0)),
            lock_timeout,
        }
    }

    fn slot(&self, wallet_id: WalletId) -> Result<Arc<WalletSlot>, LedgerError> {
        // Clone the Arc out so the DashMap shard is not held while we wait.
        self.wallets
            .get(&wallet_id)
            .map(|slot| Arc::clone(slot.value()))
            .ok_or_else(|| LedgerError::wallet_not_found(wallet_id))
    }
}

impl Default for MemoryWalletStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WalletStore for MemoryWalletStore {
    async fn create_wallet(&self) -> Result<Wallet, LedgerError> {
        loop {
            let wallet = Wallet::new();
            let mut inserted = false;
            let slot = self.wallets.entry(wallet.id).or_insert_with(|| {
                inserted = true;
                Arc::new(WalletSlot::new(wallet.clone()))
            });
            drop(slot);

            if inserted {
                trace!(wallet = %wallet.id, "wallet created");
                return Ok(wallet);
            }
        }
    }

    async fn get_wallet(&self, wallet_id: WalletId) -> Result<Wallet, LedgerError> {
        let slot = self.slot(wallet_id)?;
        let wallet = slot.state.read().wallet.clone();
        Ok(wallet)
    }

    async fn list_transactions(
        &self,
        wallet_id: WalletId,
    ) -> Result<Vec<TransactionRecord>, LedgerError> {
        let slot = self.slot(wallet_id)?;
        let log = slot.state.read().log.clone();
        Ok(log)
    }

    async fn lock_wallet(&self, wallet_id: WalletId) -> Result<Box<dyn WalletLock>, LedgerError> {
        let slot = self.slot(wallet_id)?;

        let guard = tokio::time::timeout(self.lock_timeout, Arc::clone(&slot.mutation).lock_owned())
            .await
            .map_err(|_| LedgerError::lock_timeout(wallet_id))?;

        let wallet = slot.state.read().wallet.clone();

        Ok(Box::new(MemoryWalletLock {
            slot,
            wallet,
            sequence: Arc::clone(&self.sequence),
            _guard: guard,
        }))
    }
}

/// Mutation lock on one in-memory wallet
///
/// Releasing happens when the owned mutex guard drops, on every exit path.
struct MemoryWalletLock {
    slot: Arc<WalletSlot>,
    wallet: Wallet,
    sequence: Arc<AtomicI64>,
    _guard: OwnedMutexGuard<()>,
}

impl MemoryWalletLock {
    fn write(
        &self,
        new_balance: Balance,
        kind: OperationKind,
        amount: Amount,
    ) -> Result<TransactionRecord, LedgerError> {
        // Same constraints the relational schema enforces with CHECKs.
        if new_balance < 0 {
            return Err(LedgerError::integrity(format!(
                "wallet {} balance would become negative ({})",
                self.wallet.id, new_balance
            )));
        }
        if amount <= 0 {
            return Err(LedgerError::invalid_amount(amount));
        }

        let now = Utc::now();
        let mut state = self.slot.state.write();

        let record = TransactionRecord {
            id: Uuid::new_v4(),
            wallet_id: self.wallet.id,
            kind,
            amount,
            sequence: self.sequence.fetch_add(1, Ordering::SeqCst) + 1,
            created_at: now,
        };

        state.wallet.balance = new_balance;
        state.wallet.updated_at = now;
        state.log.push(record.clone());

        Ok(record)
    }
}

#[async_trait]
impl WalletLock for MemoryWalletLock {
    fn wallet(&self) -> &Wallet {
        &self.wallet
    }

    async fn commit(
        self: Box<Self>,
        new_balance: Balance,
        kind: OperationKind,
        amount: Amount,
    ) -> Result<TransactionRecord, LedgerError> {
        self.write(new_balance, kind, amount)
    }
}
