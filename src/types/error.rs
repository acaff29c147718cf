//! Error types for the wallet ledger
//!
//! This module defines every error the ledger can return. The taxonomy is a
//! closed set so callers can match exhaustively and map each case to a
//! distinct response.
//!
//! # Error Categories
//!
//! - **Domain errors**: wallet not found, insufficient funds, invalid amount,
//!   invalid operation, balance overflow. Never retried internally.
//! - **Transient errors**: lock timeout and storage failures (connection loss,
//!   deadlock). Retry policy belongs to the caller.
//! - **Integrity errors**: a write broke a storage constraint. Not retryable.
//! - **Input/output errors**: malformed replay CSV, unreadable files.
//! - **Configuration errors**: raised while loading settings at startup.

use thiserror::Error;

use super::wallet::{Amount, Balance, WalletId};

/// Main error type for the wallet ledger
///
/// Every failure path of a mutation leaves the wallet unchanged and writes no
/// audit record, whatever variant is returned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    /// The referenced wallet does not exist
    #[error("Wallet {wallet} not found")]
    WalletNotFound {
        /// The wallet that was looked up
        wallet: WalletId,
    },

    /// A withdrawal would drive the balance negative
    #[error("Insufficient funds in wallet {wallet}: balance {balance}, requested {requested}")]
    InsufficientFunds {
        /// Wallet ID
        wallet: WalletId,
        /// Balance read under the wallet lock
        balance: Balance,
        /// Requested withdrawal amount
        requested: Amount,
    },

    /// Amount was zero or negative
    ///
    /// Rejected before any storage interaction.
    #[error("Invalid amount {amount}: amount must be a positive integer")]
    InvalidAmount {
        /// The rejected amount
        amount: Amount,
    },

    /// Operation kind outside {DEPOSIT, WITHDRAW}
    #[error("Invalid operation '{operation}': expected DEPOSIT or WITHDRAW")]
    InvalidOperation {
        /// The rejected token
        operation: String,
    },

    /// A deposit would overflow the 64-bit balance
    #[error("Balance overflow in wallet {wallet}: balance {balance}, deposit {amount}")]
    BalanceOverflow {
        /// Wallet ID
        wallet: WalletId,
        /// Balance read under the wallet lock
        balance: Balance,
        /// Requested deposit amount
        amount: Amount,
    },

    /// The wallet lock could not be acquired in time
    ///
    /// Transient: nothing was written.
    #[error("Timed out acquiring lock on wallet {wallet}")]
    LockTimeout {
        /// Wallet ID
        wallet: WalletId,
    },

    /// Storage failure (connection loss, deadlock, pool exhaustion)
    ///
    /// Transient: the surrounding transaction was rolled back.
    #[error("Storage error: {message}")]
    Storage {
        /// Description of the storage failure
        message: String,
    },

    /// A write violated a storage constraint (CHECK, foreign key, unique)
    ///
    /// Not transient: retrying the same write fails the same way. The
    /// surrounding transaction was rolled back.
    #[error("Integrity violation: {message}")]
    Integrity {
        /// Description of the violated constraint
        message: String,
    },

    /// Malformed replay input
    #[error("CSV parse error{}: {message}", line.map(|l| format!(" at line {}", l)).unwrap_or_default())]
    ParseError {
        /// Line number where the error occurred (if available)
        line: Option<u64>,
        /// Description of the parsing error
        message: String,
    },

    /// I/O error while reading input or writing output
    #[error("I/O error: {message}")]
    IoError {
        /// Description of the I/O error
        message: String,
    },

    /// Invalid configuration value
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration problem
        message: String,
    },
}

// Postgres reports an expired `lock_timeout` as lock_not_available.
const LOCK_NOT_AVAILABLE: &str = "55P03";

// SQLSTATE class 23: integrity constraint violation.
const INTEGRITY_CONSTRAINT_CLASS: &str = "23";

impl From<sqlx::Error> for LedgerError {
    fn from(error: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db) = &error {
            let code = db.code();
            if code.as_deref().is_some_and(|c| c.starts_with(INTEGRITY_CONSTRAINT_CLASS)) {
                return LedgerError::Integrity {
                    message: error.to_string(),
                };
            }
        }

        LedgerError::Storage {
            message: error.to_string(),
        }
    }
}

impl From<csv::Error> for LedgerError {
    fn from(error: csv::Error) -> Self {
        let line = error.position().map(|pos| pos.line());

        LedgerError::ParseError {
            line,
            message: error.to_string(),
        }
    }
}

impl From<std::io::Error> for LedgerError {
    fn from(error: std::io::Error) -> Self {
        LedgerError::IoError {
            message: error.to_string(),
        }
    }
}

impl LedgerError {
    /// Create a WalletNotFound error
    pub fn wallet_not_found(wallet: WalletId) -> Self {
        LedgerError::WalletNotFound { wallet }
    }

    /// Create an InsufficientFunds error
    pub fn insufficient_funds(wallet: WalletId, balance: Balance, requested: Amount) -> Self {
        LedgerError::InsufficientFunds {
            wallet,
            balance,
            requested,
        }
    }

    /// Create an InvalidAmount error
    pub fn invalid_amount(amount: Amount) -> Self {
        LedgerError::InvalidAmount { amount }
    }

    /// Create an InvalidOperation error
    pub fn invalid_operation(operation: &str) -> Self {
        LedgerError::InvalidOperation {
            operation: operation.to_string(),
        }
    }

    /// Create a BalanceOverflow error
    pub fn balance_overflow(wallet: WalletId, balance: Balance, amount: Amount) -> Self {
        LedgerError::BalanceOverflow {
            wallet,
            balance,
            amount,
        }
    }

    /// Create a LockTimeout error
    pub fn lock_timeout(wallet: WalletId) -> Self {
        LedgerError::LockTimeout { wallet }
    }

    /// Create a Storage error
    pub fn storage(message: impl Into<String>) -> Self {
        LedgerError::Storage {
            message: message.into(),
        }
    }

    /// Create an Integrity error
    pub fn integrity(message: impl Into<String>) -> Self {
        LedgerError::Integrity {
            message: message.into(),
        }
    }

    /// Create a Config error
    pub fn config(message: impl Into<String>) -> Self {
        LedgerError::Config {
            message: message.into(),
        }
    }

    /// Map a storage error raised while holding `wallet`'s lock
    ///
    /// Lock-not-available from the database becomes `LockTimeout` for that wallet.
    pub fn from_locked_query(wallet: WalletId, error: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db) = &error {
            if db.code().as_deref() == Some(LOCK_NOT_AVAILABLE) {
                return LedgerError::lock_timeout(wallet);
            }
        }
        error.into()
    }

    /// Whether the failure is transient (internal/unavailable) rather than a domain rejection
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            LedgerError::LockTimeout { .. } | LedgerError::Storage { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use uuid::Uuid;

    fn wallet() -> WalletId {
        Uuid::parse_str("7f1d2b3c-0000-4000-8000-000000000001").unwrap()
    }

    #[rstest]
    #[case::wallet_not_found(
        LedgerError::wallet_not_found(wallet()),
        "Wallet 7f1d2b3c-0000-4000-8000-000000000001 not found"
    )]
    #[case::insufficient_funds(
        LedgerError::insufficient_funds(wallet(), 600, 1000),
        "Insufficient funds in wallet 7f1d2b3c-0000-4000-8000-000000000001: balance 600, requested 1000"
    )]
    #[case::invalid_amount(
        LedgerError::invalid_amount(-5),
        "Invalid amount -5: amount must be a positive integer"
    )]
    #[case::invalid_operation(
        LedgerError::invalid_operation("TRANSFER"),
        "Invalid operation 'TRANSFER': expected DEPOSIT or WITHDRAW"
    )]
    #[case::balance_overflow(
        LedgerError::balance_overflow(wallet(), i64::MAX, 1),
        "Balance overflow in wallet 7f1d2b3c-0000-4000-8000-000000000001: balance 9223372036854775807, deposit 1"
    )]
    #[case::lock_timeout(
        LedgerError::lock_timeout(wallet()),
        "Timed out acquiring lock on wallet 7f1d2b3c-0000-4000-8000-000000000001"
    )]
    #[case::storage(LedgerError::storage("connection reset"), "Storage error: connection reset")]
    #[case::integrity(
        LedgerError::integrity("transactions_amount_check"),
        "Integrity violation: transactions_amount_check"
    )]
    #[case::parse_error_with_line(
        LedgerError::ParseError { line: Some(3), message: "bad row".to_string() },
        "CSV parse error at line 3: bad row"
    )]
    #[case::parse_error_without_line(
        LedgerError::ParseError { line: None, message: "bad row".to_string() },
        "CSV parse error: bad row"
    )]
    fn test_error_display(#[case] error: LedgerError, #[case] expected: &str) {
        assert_eq!(error.to_string(), expected);
    }

    #[rstest]
    #[case::not_found(LedgerError::wallet_not_found(wallet()), false)]
    #[case::insufficient(LedgerError::insufficient_funds(wallet(), 0, 1), false)]
    #[case::invalid_amount(LedgerError::invalid_amount(0), false)]
    #[case::invalid_operation(LedgerError::invalid_operation("X"), false)]
    #[case::overflow(LedgerError::balance_overflow(wallet(), i64::MAX, 1), false)]
    #[case::lock_timeout(LedgerError::lock_timeout(wallet()), true)]
    #[case::storage(LedgerError::storage("deadlock detected"), true)]
    #[case::integrity(LedgerError::integrity("wallets_balance_check"), false)]
    #[case::config(LedgerError::config("bad timeout"), false)]
    fn test_is_transient(#[case] error: LedgerError, #[case] transient: bool) {
        assert_eq!(error.is_transient(), transient);
    }

    #[test]
    fn test_sqlx_error_conversion() {
        let error: LedgerError = sqlx::Error::PoolTimedOut.into();
        assert!(matches!(error, LedgerError::Storage { .. }));
        assert!(error.is_transient());
    }

    #[test]
    fn test_io_error_conversion() {
        let io_error =
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "Permission denied");
        let error: LedgerError = io_error.into();
        assert_eq!(error.to_string(), "I/O error: Permission denied");
    }

    #[test]
    fn test_locked_query_without_database_code_is_storage() {
        let error = LedgerError::from_locked_query(wallet(), sqlx::Error::PoolClosed);
        assert!(matches!(error, LedgerError::Storage { .. }));
    }
}
