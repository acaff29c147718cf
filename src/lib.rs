//! Wallet Ledger Library
//! # Overview
//!
//! This library provides a concurrency-safe balance-mutation engine for a
//! wallet ledger: every deposit or withdrawal is a read-validate-write cycle
//! performed under an exclusive per-wallet lock, and commits the new balance
//! together with an audit record.
//!
//! # Architecture
//!
//! The system is organized into several key components:
//!
//! - [`types`] - Core data types (Wallet, TransactionRecord, LedgerError, etc.)
//! - [`core`] - Business logic components:
//!   - [`core::ledger`] - `WalletLedger`, the public operations
//!   - [`core::mutator`] - The locked read-validate-write cycle
//!   - [`core::memory_store`] - Single-instance store with per-wallet mutexes
//!   - [`core::postgres_store`] - Postgres store with row-level locks
//!   - [`core::batch_processor`] - Concurrent application of many operations
//! - [`io`] - CSV input of operations and output of balances and history
//! - [`replay`] - Replay of an operations file
//! - [`stress`] - Concurrent-deposit consistency check
//! - [`config`] - Environment configuration
//! - [`cli`] - CLI arguments parsing
//! - [`telemetry`] - `tracing` subscriber setup
//!
//! # Operations
//!
//! - **Deposit**: Credit a wallet; fails only on overflow
//! - **Withdraw**: Debit a wallet; fails if the balance would go negative
//!
//! Both reject non-positive amounts before touching storage.
//!
//! # Guarantees
//!
//! - A balance is never negative
//! - Each committed mutation produces exactly one audit record, atomically
//! - Concurrent mutations of one wallet are serialized; none is lost
//! - Replaying a wallet's audit trail from zero yields its balance

// Module declarations
pub mod cli;
pub mod config;
pub mod core;
pub mod io;
pub mod replay;
pub mod stress;
pub mod telemetry;
pub mod types;

pub use config::{LedgerConfig, StoreBackend};
pub use core::{MemoryWalletStore, PostgresWalletStore, WalletLedger, WalletLock, WalletStore};
pub use types::{
    Amount, Balance, LedgerError, OperationKind, TransactionId, TransactionRecord, Wallet,
    WalletId, WalletOperation,
};
