//! Balance mutation engine
//!
//! This module provides the `BalanceMutator` struct, the only component that
//! changes wallet balances.
//!
//! # Algorithm
//!
//! ```text
//! validate amount            (InvalidAmount, no storage touched)
//! lock wallet                (WalletNotFound | LockTimeout)
//!   read balance under lock
//!   compute next balance     (InsufficientFunds | BalanceOverflow)
//!   commit balance + record  (atomic; Storage | Integrity on failure)
//! unlock                     (always, on every path)
//! ```
//!
//! Any failure drops the lock without committing, so the wallet is left
//! exactly as it was and no audit record is written.

use std::sync::Arc;

use tracing::{debug, warn};

use super::traits::WalletStore;
use crate::types::{
    validate_amount, Amount, Balance, LedgerError, OperationKind, WalletId, WalletOperation,
};

/// Applies signed mutations to wallet balances
///
/// Cheap to clone; all clones share the same store.
#[derive(Debug, Clone)]
pub struct BalanceMutator {
    store: Arc<dyn WalletStore>,
}

impl BalanceMutator {
    pub fn new(store: Arc<dyn WalletStore>) -> Self {
        Self { store }
    }

    /// Apply one DEPOSIT or WITHDRAW to a wallet and return the new balance
    ///
    /// # Errors
    ///
    /// * `InvalidAmount` - `amount <= 0`
    /// * `WalletNotFound` - no such wallet
    /// * `InsufficientFunds` - withdrawal larger than the current balance
    /// * `BalanceOverflow` - deposit would overflow `i64`
    /// * `LockTimeout` / `Storage` - transient; nothing was written
    /// * `Integrity` - a storage constraint rejected the write; nothing was written
    pub async fn apply(
        &self,
        wallet_id: WalletId,
        amount: Amount,
        kind: OperationKind,
    ) -> Result<Balance, LedgerError> {
        validate_amount(amount)?;

        let result = self.apply_locked(wallet_id, amount, kind).await;

        if let Err(error) = &result {
            if error.is_transient() {
                warn!(wallet = %wallet_id, %kind, amount, %error, "mutation aborted");
            } else {
                debug!(wallet = %wallet_id, %kind, amount, %error, "mutation rejected");
            }
        }

        result
    }

    /// Validate and apply an inbound operation request
    pub async fn apply_operation(&self, operation: &WalletOperation) -> Result<Balance, LedgerError> {
        operation.validate()?;
        self.apply(operation.wallet_id, operation.amount, operation.operation_type)
            .await
    }

    async fn apply_locked(
        &self,
        wallet_id: WalletId,
        amount: Amount,
        kind: OperationKind,
    ) -> Result<Balance, LedgerError> {
        let lock = self.store.lock_wallet(wallet_id).await?;

        let current = lock.wallet().balance;
        let new_balance = next_balance(wallet_id, current, amount, kind)?;

        let record = lock.commit(new_balance, kind, amount).await?;

        debug!(
            wallet = %wallet_id,
            %kind,
            amount,
            balance = new_balance,
            sequence = record.sequence,
            "mutation committed"
        );

        Ok(new_balance)
    }
}

/// Balance after applying `amount` in direction `kind` to `current`
///
/// Pure; all rejection rules of a mutation live here.
pub fn next_balance(
    wallet_id: WalletId,
    current: Balance,
    amount: Amount,
    kind: OperationKind,
) -> Result<Balance, LedgerError> {
    match kind {
        OperationKind::Deposit => current
            .checked_add(amount)
            .ok_or_else(|| LedgerError::balance_overflow(wallet_id, current, amount)),
        OperationKind::Withdraw => {
            if amount > current {
                return Err(LedgerError::insufficient_funds(wallet_id, current, amount));
            }
            Ok(current - amount)
        }
    }
}
