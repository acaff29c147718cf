//! Replay of operation files against a ledger
//!
//! Reads `wallet,operation,amount` rows, creates a wallet for every distinct
//! label, applies all operations through the [`BatchProcessor`] and reports the
//! resulting balances.
//!
//! # Pipeline
//!
//! ```text
//! read_operations (csv)
//!     └── resolve wallets (labels -> create_wallet, UUIDs as-is)
//!         └── BatchProcessor (per-wallet order, wallets in parallel)
//!             └── balances -> write_balances_csv
//! ```
//!
//! Individual rejections (unknown operation, insufficient funds, ...) are
//! logged and counted; they never abort the replay.

use std::collections::HashMap;
use std::io::Read;

use tracing::{info, warn};

use crate::core::{BatchProcessor, WalletLedger};
use crate::io::{convert_csv_operation, read_operations, BalanceRow, WalletRef};
use crate::types::{LedgerError, WalletId};

/// Configuration for replay
#[derive(Clone, Debug)]
pub struct ReplayConfig {
    /// Maximum number of wallets processed concurrently
    pub max_concurrent: usize,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            max_concurrent: num_cpus::get(),
        }
    }
}

impl ReplayConfig {
    pub fn new(max_concurrent: usize) -> Self {
        let default = Self::default();

        let max_concurrent = if max_concurrent == 0 {
            warn!(
                "Invalid max_concurrent ({}), using default ({})",
                max_concurrent, default.max_concurrent
            );
            default.max_concurrent
        } else {
            max_concurrent
        };

        Self { max_concurrent }
    }
}

/// Outcome of a replay
#[derive(Debug, Clone, PartialEq)]
pub struct ReplayReport {
    /// Final balance of every wallet the input referenced
    pub balances: Vec<BalanceRow>,
    /// Operations that committed
    pub applied: usize,
    /// Operations that were rejected
    pub rejected: usize,
}

/// Replay every operation in `input` against `ledger`
///
/// Only wallet creation and balance reads can fail the replay as a whole.
pub async fn replay<R: Read>(
    ledger: &WalletLedger,
    input: R,
    config: &ReplayConfig,
) -> Result<ReplayReport, LedgerError> {
    let rows = read_operations(input);

    // Labels in first-appearance order so wallet creation is deterministic.
    let mut wallets: HashMap<WalletRef, WalletId> = HashMap::new();
    let mut labels: Vec<(String, WalletRef)> = Vec::new();
    for row in &rows {
        let wallet_ref = row.wallet_ref();
        if wallets.contains_key(&wallet_ref) {
            continue;
        }
        let wallet_id = match &wallet_ref {
            WalletRef::Id(id) => *id,
            WalletRef::Label(_) => ledger.create_wallet().await?,
        };
        labels.push((row.wallet.trim().to_string(), wallet_ref.clone()));
        wallets.insert(wallet_ref, wallet_id);
    }

    let mut rejected = 0;
    let mut batch = Vec::with_capacity(rows.len());
    for row in &rows {
        let wallet_id = wallets[&row.wallet_ref()];
        match convert_csv_operation(row, wallet_id) {
            Ok(operation) => batch.push(operation),
            Err(error) => {
                warn!(wallet = %row.wallet, %error, "skipping operation");
                rejected += 1;
            }
        }
    }

    let processor = BatchProcessor::new(ledger.clone(), config.max_concurrent);
    let results = processor.process_batch(batch).await;

    let mut applied = 0;
    for result in &results {
        match &result.result {
            Ok(_) => applied += 1,
            Err(error) => {
                warn!(
                    wallet = %result.operation.wallet_id,
                    operation = %result.operation.operation_type,
                    amount = result.operation.amount,
                    %error,
                    "operation rejected"
                );
                rejected += 1;
            }
        }
    }

    let mut balances = Vec::with_capacity(labels.len());
    for (label, wallet_ref) in labels {
        let wallet = wallets[&wallet_ref];
        match ledger.get_balance(wallet).await {
            Ok(balance) => balances.push(BalanceRow {
                label,
                wallet,
                balance,
            }),
            Err(LedgerError::WalletNotFound { .. }) => {
                warn!(%wallet, "input references unknown wallet");
            }
            Err(error) => return Err(error),
        }
    }

    info!(applied, rejected, wallets = balances.len(), "replay finished");

    Ok(ReplayReport {
        balances,
        applied,
        rejected,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::MemoryWalletStore;
    use std::sync::Arc;
    use uuid::Uuid;

    fn ledger() -> WalletLedger {
        WalletLedger::new(Arc::new(MemoryWalletStore::new()))
    }

    fn balance_of(report: &ReplayReport, label: &str) -> i64 {
        report
            .balances
            .iter()
            .find(|row| row.label == label)
            .map(|row| row.balance)
            .unwrap_or_else(|| panic!("no balance for {}", label))
    }

    #[tokio::test]
    async fn test_replay_creates_wallets_per_label() {
        let ledger = ledger();
        let input = "wallet,operation,amount\n\
                     alice,DEPOSIT,1000\n\
                     bob,DEPOSIT,50\n\
                     alice,WITHDRAW,400\n\
                     bob,DEPOSIT,25\n";

        let report = replay(&ledger, input.as_bytes(), &ReplayConfig::default())
            .await
            .unwrap();

        assert_eq!(report.applied, 4);
        assert_eq!(report.rejected, 0);
        assert_eq!(balance_of(&report, "alice"), 600);
        assert_eq!(balance_of(&report, "bob"), 75);
    }

    #[tokio::test]
    async fn test_replay_counts_rejections_and_continues() {
        let ledger = ledger();
        let input = "wallet,operation,amount\n\
                     alice,DEPOSIT,600\n\
                     alice,WITHDRAW,1000\n\
                     alice,REFUND,5\n\
                     alice,DEPOSIT,-5\n\
                     alice,DEPOSIT,7\n";

        let report = replay(&ledger, input.as_bytes(), &ReplayConfig::new(2))
            .await
            .unwrap();

        assert_eq!(report.applied, 2);
        assert_eq!(report.rejected, 3);
        assert_eq!(balance_of(&report, "alice"), 607);

        let wallet = report.balances[0].wallet;
        assert_eq!(ledger.list_transactions(wallet).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_replay_uses_existing_wallet_ids() {
        let ledger = ledger();
        let existing = ledger.create_wallet().await.unwrap();
        ledger
            .apply(existing, 100, crate::types::OperationKind::Deposit)
            .await
            .unwrap();
        let input = format!("wallet,operation,amount\n{},WITHDRAW,40\n", existing);

        let report = replay(&ledger, input.as_bytes(), &ReplayConfig::default())
            .await
            .unwrap();

        assert_eq!(report.balances.len(), 1);
        assert_eq!(report.balances[0].wallet, existing);
        assert_eq!(report.balances[0].balance, 60);
    }

    #[tokio::test]
    async fn test_replay_skips_unknown_wallet_ids() {
        let ledger = ledger();
        let input = format!("wallet,operation,amount\n{},DEPOSIT,40\n", Uuid::new_v4());

        let report = replay(&ledger, input.as_bytes(), &ReplayConfig::default())
            .await
            .unwrap();

        assert!(report.balances.is_empty());
        assert_eq!(report.rejected, 1);
    }

    #[test]
    fn test_zero_max_concurrent_falls_back_to_default() {
        assert_eq!(ReplayConfig::new(0).max_concurrent, num_cpus::get());
        assert_eq!(ReplayConfig::new(3).max_concurrent, 3);
    }
}
