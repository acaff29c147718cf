//! Types module
//!
//! Contains core data structures used throughout the application.
//! This module organizes types into logical submodules:
//! - `wallet`: Wallet state and identifier aliases
//! - `transaction`: Operation kinds, requests and audit records
//! - `error`: Error taxonomy for the ledger

pub mod error;
pub mod transaction;
pub mod wallet;

pub use error::LedgerError;
pub use transaction::{
    replayed_balance, validate_amount, OperationKind, TransactionId, TransactionRecord,
    WalletOperation,
};
pub use wallet::{Amount, Balance, Wallet, WalletId};
