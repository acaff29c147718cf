//! Concurrent batch application with wallet-based partitioning
//!
//! This module provides the `BatchProcessor` struct, which applies many
//! operations at once while keeping each wallet's operations in input order.
//!
//! # Design
//!
//! The batch is partitioned by wallet ID. Each partition runs sequentially on
//! its own tokio task; partitions run concurrently, at most `max_concurrent` at
//! a time. The ledger's per-wallet lock already serializes same-wallet
//! mutations, and partitioning adds the guarantee that they commit in the order
//! they appear in the batch.
//!
//! # Architecture
//!
//! ```text
//! BatchProcessor
//!     ├── WalletLedger   (shared, cheap to clone)
//!     └── Arc<Semaphore> (bounds concurrently running partitions)
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tracing::{debug, error};

use super::ledger::WalletLedger;
use crate::types::{Balance, LedgerError, WalletId, WalletOperation};

/// Result of applying a single operation
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessingResult {
    /// Position of the operation in the submitted batch
    pub index: usize,

    /// The operation that was applied
    pub operation: WalletOperation,

    /// New balance, or why the operation was rejected
    pub result: Result<Balance, LedgerError>,
}

/// Batch processor with wallet-based partitioning
#[derive(Debug, Clone)]
pub struct BatchProcessor {
    ledger: WalletLedger,
    permits: Arc<Semaphore>,
    max_concurrent: usize,
}

impl BatchProcessor {
    /// Create a processor running at most `max_concurrent` wallets at a time
    ///
    /// A value of zero falls back to the number of CPU cores.
    pub fn new(ledger: WalletLedger, max_concurrent: usize) -> Self {
        let max_concurrent = if max_concurrent == 0 {
            num_cpus::get()
        } else {
            max_concurrent
        };

        Self {
            ledger,
            permits: Arc::new(Semaphore::new(max_concurrent)),
            max_concurrent,
        }
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    /// Partition a batch by wallet ID, keeping input order within each wallet
    pub fn partition_by_wallet(
        &self,
        batch: Vec<WalletOperation>,
    ) -> HashMap<WalletId, Vec<(usize, WalletOperation)>> {
        let mut partitions: HashMap<WalletId, Vec<(usize, WalletOperation)>> = HashMap::new();
        for (index, operation) in batch.into_iter().enumerate() {
            partitions
                .entry(operation.wallet_id)
                .or_default()
                .push((index, operation));
        }
        partitions
    }

    /// Apply one wallet's operations sequentially
    ///
    /// Failures are recorded and do not stop the remaining operations.
    pub async fn process_wallet_operations(
        &self,
        operations: Vec<(usize, WalletOperation)>,
    ) -> Vec<ProcessingResult> {
        let mut results = Vec::with_capacity(operations.len());
        for (index, operation) in operations {
            let result = self.ledger.apply_operation(&operation).await;
            results.push(ProcessingResult {
                index,
                operation,
                result,
            });
        }
        results
    }

    /// Apply a whole batch and return one result per operation, in input order
    pub async fn process_batch(&self, batch: Vec<WalletOperation>) -> Vec<ProcessingResult> {
        let partitions = self.partition_by_wallet(batch);
        debug!(wallets = partitions.len(), "processing batch");

        let mut tasks = Vec::with_capacity(partitions.len());
        for (_wallet_id, operations) in partitions {
            let processor = self.clone();
            tasks.push(tokio::spawn(async move {
                // The semaphore is never closed.
                let _permit = processor.permits.acquire().await.ok();
                processor.process_wallet_operations(operations).await
            }));
        }

        let mut results = Vec::new();
        for task in tasks {
            match task.await {
                Ok(wallet_results) => results.extend(wallet_results),
                Err(e) => error!("Batch task panicked: {:?}", e),
            }
        }

        results.sort_by_key(|r| r.index);
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::memory_store::MemoryWalletStore;
    use crate::types::OperationKind;
    use uuid::Uuid;

    fn ledger() -> WalletLedger {
        WalletLedger::new(Arc::new(MemoryWalletStore::new()))
    }

    fn deposit(wallet: WalletId, amount: i64) -> WalletOperation {
        WalletOperation::new(wallet, OperationKind::Deposit, amount)
    }

    fn withdraw(wallet: WalletId, amount: i64) -> WalletOperation {
        WalletOperation::new(wallet, OperationKind::Withdraw, amount)
    }

    #[test]
    fn test_zero_concurrency_falls_back_to_cpu_count() {
        let processor = BatchProcessor::new(ledger(), 0);
        assert_eq!(processor.max_concurrent(), num_cpus::get());
    }

    #[test]
    fn test_partition_by_wallet_maintains_order() {
        let processor = BatchProcessor::new(ledger(), 4);
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        let partitions = processor.partition_by_wallet(vec![
            deposit(a, 1),
            deposit(b, 2),
            withdraw(a, 1),
            deposit(a, 3),
        ]);

        assert_eq!(partitions.len(), 2);
        let a_indices: Vec<usize> = partitions[&a].iter().map(|(i, _)| *i).collect();
        assert_eq!(a_indices, vec![0, 2, 3]);
        assert_eq!(partitions[&b].len(), 1);
    }

    #[test]
    fn test_partition_by_wallet_empty_batch() {
        let processor = BatchProcessor::new(ledger(), 4);
        assert!(processor.partition_by_wallet(Vec::new()).is_empty());
    }

    #[tokio::test]
    async fn test_process_batch_applies_in_wallet_order() {
        let ledger = ledger();
        let a = ledger.create_wallet().await.unwrap();
        let b = ledger.create_wallet().await.unwrap();
        let processor = BatchProcessor::new(ledger.clone(), 4);

        let results = processor
            .process_batch(vec![
                deposit(a, 100),
                deposit(b, 50),
                withdraw(a, 30),
                deposit(b, 25),
                withdraw(a, 20),
            ])
            .await;

        let balances: Vec<Balance> = results.iter().map(|r| r.result.clone().unwrap()).collect();
        assert_eq!(balances, vec![100, 50, 70, 75, 50]);
        assert_eq!(ledger.get_balance(a).await.unwrap(), 50);
        assert_eq!(ledger.get_balance(b).await.unwrap(), 75);
    }

    #[tokio::test]
    async fn test_process_batch_continues_after_error() {
        let ledger = ledger();
        let a = ledger.create_wallet().await.unwrap();
        let missing = Uuid::new_v4();
        let processor = BatchProcessor::new(ledger.clone(), 2);

        let results = processor
            .process_batch(vec![
                withdraw(a, 10),
                deposit(missing, 5),
                deposit(a, 10),
                deposit(a, 0),
            ])
            .await;

        assert_eq!(results.len(), 4);
        assert_eq!(
            results[0].result,
            Err(LedgerError::insufficient_funds(a, 0, 10))
        );
        assert_eq!(results[1].result, Err(LedgerError::wallet_not_found(missing)));
        assert_eq!(results[2].result, Ok(10));
        assert_eq!(results[3].result, Err(LedgerError::invalid_amount(0)));
        assert_eq!(ledger.list_transactions(a).await.unwrap().len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_process_batch_many_wallets() {
        let ledger = ledger();
        let mut wallets = Vec::new();
        for _ in 0..50 {
            wallets.push(ledger.create_wallet().await.unwrap());
        }
        let processor = BatchProcessor::new(ledger.clone(), 8);

        let batch: Vec<WalletOperation> = (0..500)
            .map(|i| deposit(wallets[i % wallets.len()], 2))
            .collect();
        let results = processor.process_batch(batch).await;

        assert!(results.iter().all(|r| r.result.is_ok()));
        for wallet in wallets {
            assert_eq!(ledger.get_balance(wallet).await.unwrap(), 20);
        }
    }
}
