//! Concurrent-deposit consistency check
//!
//! Creates a wallet, fires `tasks` concurrent deposits of `amount` at it and
//! checks that no update was lost and that the audit trail adds up to the
//! final balance.

use std::time::{Duration, Instant};

use futures::future::join_all;
use tracing::{error, info};

use crate::core::WalletLedger;
use crate::types::{replayed_balance, Amount, Balance, LedgerError, OperationKind, WalletId};

/// Outcome of a stress run
#[derive(Debug, Clone, PartialEq)]
pub struct StressReport {
    pub wallet: WalletId,
    pub succeeded: usize,
    pub failed: usize,
    pub balance: Balance,
    pub log_entries: usize,
    pub elapsed: Duration,
}

impl StressReport {
    /// Balance equals successful deposits times amount, and the log agrees
    pub fn is_consistent(&self, amount: Amount, log_sum: i128) -> bool {
        let expected = i128::from(amount) * self.succeeded as i128;
        i128::from(self.balance) == expected
            && log_sum == expected
            && self.log_entries == self.succeeded
    }
}

/// Run `tasks` concurrent deposits of `amount` against a fresh wallet
///
/// Fails with `Integrity` if the final state is inconsistent.
pub async fn run_stress(
    ledger: &WalletLedger,
    tasks: usize,
    amount: Amount,
) -> Result<StressReport, LedgerError> {
    let wallet = ledger.create_wallet().await?;
    let started = Instant::now();

    let handles: Vec<_> = (0..tasks)
        .map(|_| {
            let ledger = ledger.clone();
            tokio::spawn(async move { ledger.apply(wallet, amount, OperationKind::Deposit).await })
        })
        .collect();

    let mut succeeded = 0;
    let mut failed = 0;
    for outcome in join_all(handles).await {
        match outcome {
            Ok(Ok(_)) => succeeded += 1,
            Ok(Err(e)) => {
                error!(error = %e, "deposit failed");
                failed += 1;
            }
            Err(e) => {
                error!("Deposit task panicked: {:?}", e);
                failed += 1;
            }
        }
    }

    let elapsed = started.elapsed();
    let balance = ledger.get_balance(wallet).await?;
    let log = ledger.list_transactions(wallet).await?;

    let report = StressReport {
        wallet,
        succeeded,
        failed,
        balance,
        log_entries: log.len(),
        elapsed,
    };

    if !report.is_consistent(amount, replayed_balance(&log)) {
        return Err(LedgerError::integrity(format!(
            "inconsistent ledger after stress run: {:?}",
            report
        )));
    }

    info!(
        wallet = %wallet,
        succeeded,
        failed,
        balance,
        elapsed_ms = elapsed.as_millis() as u64,
        "stress run consistent"
    );

    Ok(report)
}
