//! Wallet ledger facade
//!
//! `WalletLedger` is the whole contract surrounding layers need: create a
//! wallet, apply a mutation, read a balance, read the audit trail.

use std::sync::Arc;

use tracing::info;

use super::mutator::BalanceMutator;
use super::traits::WalletStore;
use crate::types::{
    Amount, Balance, LedgerError, OperationKind, TransactionRecord, Wallet, WalletId,
    WalletOperation,
};

/// Entry point for all ledger operations
///
/// Cloning is cheap; clones share the store and can be handed to concurrent tasks.
#[derive(Debug, Clone)]
pub struct WalletLedger {
    store: Arc<dyn WalletStore>,
    mutator: BalanceMutator,
}

impl WalletLedger {
    pub fn new(store: Arc<dyn WalletStore>) -> Self {
        let mutator = BalanceMutator::new(Arc::clone(&store));
        Self { store, mutator }
    }

    /// Create a wallet with balance 0 and return its fresh identifier
    pub async fn create_wallet(&self) -> Result<WalletId, LedgerError> {
        let wallet = self.store.create_wallet().await?;
        info!(wallet = %wallet.id, "wallet created");
        Ok(wallet.id)
    }

    /// Apply a DEPOSIT or WITHDRAW and return the new balance
    pub async fn apply(
        &self,
        wallet_id: WalletId,
        amount: Amount,
        kind: OperationKind,
    ) -> Result<Balance, LedgerError> {
        self.mutator.apply(wallet_id, amount, kind).await
    }

    /// Validate and apply an inbound operation request
    pub async fn apply_operation(&self, operation: &WalletOperation) -> Result<Balance, LedgerError> {
        self.mutator.apply_operation(operation).await
    }

    /// Latest committed balance
    pub async fn get_balance(&self, wallet_id: WalletId) -> Result<Balance, LedgerError> {
        Ok(self.store.get_wallet(wallet_id).await?.balance)
    }

    /// Full committed wallet row
    pub async fn wallet(&self, wallet_id: WalletId) -> Result<Wallet, LedgerError> {
        self.store.get_wallet(wallet_id).await
    }

    /// Audit trail in commit order, oldest first
    ///
    /// Unknown wallets fail with `WalletNotFound`, as `get_balance` does.
    pub async fn list_transactions(
        &self,
        wallet_id: WalletId,
    ) -> Result<Vec<TransactionRecord>, LedgerError> {
        self.store.list_transactions(wallet_id).await
    }

    /// Release the underlying store
    pub async fn close(&self) {
        self.store.close().await;
    }
}
