//! Wallet Ledger CLI
//!
//! Command-line interface over the wallet ledger.
//!
//! # Usage
//!
//! ```bash
//! cargo run -- init-schema
//! cargo run -- create
//! cargo run -- deposit 7f1d2b3c-0000-4000-8000-000000000001 1000
//! cargo run -- withdraw 7f1d2b3c-0000-4000-8000-000000000001 400
//! cargo run -- balance 7f1d2b3c-0000-4000-8000-000000000001
//! cargo run -- history 7f1d2b3c-0000-4000-8000-000000000001 > history.csv
//! cargo run -- --backend memory replay operations.csv > balances.csv
//! cargo run -- stress --tasks 1000 --amount 7
//! ```
//!
//! Command output goes to stdout (JSON for single-wallet commands, CSV for
//! history and replay); logs go to stderr.
//!
//! # Exit Codes
//!
//! - 0: Success
//! - 1: Error (invalid configuration, rejected operation, storage failure, interrupt)

use std::fs::File;
use std::io::{self, Write};
use std::process;
use std::sync::Arc;

use serde_json::json;
use tracing::{error, info};

use wallet_ledger::cli::{self, CliArgs, Command};
use wallet_ledger::config::{LedgerConfig, StoreBackend};
use wallet_ledger::core::{MemoryWalletStore, PostgresWalletStore, WalletLedger, WalletStore};
use wallet_ledger::io::{write_balances_csv, write_history_csv};
use wallet_ledger::replay::{replay, ReplayConfig};
use wallet_ledger::stress::run_stress;
use wallet_ledger::types::{Amount, LedgerError, OperationKind, WalletId};

fn main() {
    wallet_ledger::telemetry::init();

    let args = cli::parse_args();

    if let Err(e) = run(args) {
        error!("{}", e);
        process::exit(1);
    }
}

fn run(args: CliArgs) -> Result<(), LedgerError> {
    let mut config = LedgerConfig::from_env()?;
    args.apply_overrides(&mut config)?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async move {
        let store = open_store(&config, &args.command).await?;
        let ledger = WalletLedger::new(store);

        let outcome = tokio::select! {
            result = execute(&ledger, args.command) => result,
            _ = tokio::signal::ctrl_c() => Err(LedgerError::IoError {
                message: "interrupted".to_string(),
            }),
        };

        ledger.close().await;
        outcome
    })
}

async fn open_store(
    config: &LedgerConfig,
    command: &Command,
) -> Result<Arc<dyn WalletStore>, LedgerError> {
    info!(backend = %config.backend, "opening wallet store");

    match config.backend {
        StoreBackend::Memory => Ok(Arc::new(MemoryWalletStore::with_lock_timeout(
            config.lock_timeout,
        ))),
        StoreBackend::Postgres => {
            let store = PostgresWalletStore::connect(&config.database, config.lock_timeout).await?;
            if matches!(command, Command::InitSchema) {
                store.ensure_schema().await?;
            }
            Ok(Arc::new(store))
        }
    }
}

async fn execute(ledger: &WalletLedger, command: Command) -> Result<(), LedgerError> {
    let mut stdout = io::stdout();

    match command {
        Command::InitSchema => Ok(()),
        Command::Create => {
            let wallet = ledger.create_wallet().await?;
            print_json(&mut stdout, json!({ "walletId": wallet, "balance": 0 }))
        }
        Command::Deposit { wallet, amount } => {
            mutate(ledger, &mut stdout, wallet, amount, OperationKind::Deposit).await
        }
        Command::Withdraw { wallet, amount } => {
            mutate(ledger, &mut stdout, wallet, amount, OperationKind::Withdraw).await
        }
        Command::Balance { wallet } => {
            let balance = ledger.get_balance(wallet).await?;
            print_json(&mut stdout, json!({ "walletId": wallet, "balance": balance }))
        }
        Command::History { wallet } => {
            let records = ledger.list_transactions(wallet).await?;
            write_history_csv(&records, &mut stdout)
        }
        Command::Replay {
            input,
            max_concurrent,
        } => {
            let file = File::open(&input).map_err(|e| LedgerError::IoError {
                message: format!("Failed to open file '{}': {}", input.display(), e),
            })?;
            let config = max_concurrent
                .map(ReplayConfig::new)
                .unwrap_or_default();

            let report = replay(ledger, file, &config).await?;
            write_balances_csv(&report.balances, &mut stdout)
        }
        Command::Stress { tasks, amount } => {
            let report = run_stress(ledger, tasks, amount).await?;
            print_json(
                &mut stdout,
                json!({
                    "walletId": report.wallet,
                    "succeeded": report.succeeded,
                    "failed": report.failed,
                    "balance": report.balance,
                    "logEntries": report.log_entries,
                    "elapsedMs": report.elapsed.as_millis() as u64,
                }),
            )
        }
    }
}

async fn mutate(
    ledger: &WalletLedger,
    output: &mut dyn Write,
    wallet: WalletId,
    amount: Amount,
    kind: OperationKind,
) -> Result<(), LedgerError> {
    let balance = ledger.apply(wallet, amount, kind).await?;
    print_json(
        output,
        json!({ "walletId": wallet, "operationType": kind, "amount": amount, "balance": balance }),
    )
}

fn print_json(output: &mut dyn Write, value: serde_json::Value) -> Result<(), LedgerError> {
    writeln!(output, "{}", value)?;
    Ok(())
}
