//! Core business logic module
//!
//! This module contains the balance-mutation engine and its storage seams:
//! - `traits` - `WalletStore` / `WalletLock` abstractions
//! - `memory_store` - single-instance store (per-wallet mutex map)
//! - `postgres_store` - relational store (row-level `FOR UPDATE` locks)
//! - `mutator` - the read-validate-write balance mutator
//! - `ledger` - `WalletLedger`, the four inbound operations
//! - `batch_processor` - concurrent application of many operations

pub mod batch_processor;
pub mod ledger;
pub mod memory_store;
pub mod mutator;
pub mod postgres_store;
pub mod traits;

pub use batch_processor::{BatchProcessor, ProcessingResult};
pub use ledger::WalletLedger;
pub use memory_store::MemoryWalletStore;
pub use mutator::{next_balance, BalanceMutator};
pub use postgres_store::PostgresWalletStore;
pub use traits::{WalletLock, WalletStore};
