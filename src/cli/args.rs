use crate::config::{lock_timeout_from_millis, LedgerConfig, StoreBackend};
use crate::types::{Amount, LedgerError, WalletId};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Concurrency-safe wallet ledger
#[derive(Parser, Debug)]
#[command(name = "wallet-ledger")]
#[command(about = "Apply deposits and withdrawals to wallet balances with an audit trail", long_about = None)]
pub struct CliArgs {
    /// Store backing the ledger
    #[arg(
        long = "backend",
        value_name = "BACKEND",
        global = true,
        help = "Store backend: 'memory' or 'postgres' (default: LEDGER_BACKEND or postgres)"
    )]
    pub backend: Option<StoreBackend>,

    /// Postgres connection string
    #[arg(
        long = "database-url",
        value_name = "URL",
        global = true,
        help = "Postgres connection URL (default: DATABASE_URL or DB_* variables)"
    )]
    pub database_url: Option<String>,

    /// Upper bound on waiting for a wallet lock
    #[arg(
        long = "lock-timeout-ms",
        value_name = "MILLIS",
        global = true,
        help = "Milliseconds to wait for a wallet lock before failing (default: 5000)"
    )]
    pub lock_timeout_ms: Option<u64>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Create the wallets and transactions tables if missing
    InitSchema,
    /// Create a wallet with balance 0 and print its id
    Create,
    /// Credit a wallet
    Deposit {
        #[arg(value_name = "WALLET")]
        wallet: WalletId,
        #[arg(value_name = "AMOUNT", allow_negative_numbers = true)]
        amount: Amount,
    },
    /// Debit a wallet
    Withdraw {
        #[arg(value_name = "WALLET")]
        wallet: WalletId,
        #[arg(value_name = "AMOUNT", allow_negative_numbers = true)]
        amount: Amount,
    },
    /// Print the committed balance of a wallet
    Balance {
        #[arg(value_name = "WALLET")]
        wallet: WalletId,
    },
    /// Print the audit trail of a wallet as CSV
    History {
        #[arg(value_name = "WALLET")]
        wallet: WalletId,
    },
    /// Apply every operation in a CSV file and print final balances
    Replay {
        #[arg(value_name = "INPUT", help = "Path to a wallet,operation,amount CSV file")]
        input: PathBuf,
        #[arg(
            long = "max-concurrent",
            value_name = "COUNT",
            help = "Maximum number of wallets processed concurrently (default: CPU cores)"
        )]
        max_concurrent: Option<usize>,
    },
    /// Fire concurrent deposits at one wallet and verify nothing was lost
    Stress {
        #[arg(long = "tasks", value_name = "COUNT", default_value_t = 1000)]
        tasks: usize,
        #[arg(long = "amount", value_name = "AMOUNT", default_value_t = 7)]
        amount: Amount,
    },
}

impl CliArgs {
    /// Apply command-line overrides on top of environment configuration
    ///
    /// Fails with `Config` for a zero lock timeout.
    pub fn apply_overrides(&self, config: &mut LedgerConfig) -> Result<(), LedgerError> {
        if let Some(backend) = self.backend {
            config.backend = backend;
        }
        if let Some(url) = &self.database_url {
            config.database.url = url.clone();
        }
        if let Some(millis) = self.lock_timeout_ms {
            config.lock_timeout = lock_timeout_from_millis(millis)?;
        }
        Ok(())
    }
}
