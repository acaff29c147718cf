//! Runtime configuration
//!
//! Settings come from the process environment after `config.env` and `.env`
//! have been loaded with `dotenv`. Command-line flags override them (see
//! [`crate::cli::CliArgs::apply_overrides`]).

use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use clap::ValueEnum;

use crate::types::LedgerError;

/// Default upper bound on waiting for a wallet lock
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_millis(5000);

/// Which store backs the ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StoreBackend {
    /// In-process store; single instance only
    Memory,
    /// Postgres with row-level locks; safe for multiple instances
    Postgres,
}

impl fmt::Display for StoreBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreBackend::Memory => f.write_str("memory"),
            StoreBackend::Postgres => f.write_str("postgres"),
        }
    }
}

impl FromStr for StoreBackend {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(StoreBackend::Memory),
            "postgres" | "postgresql" => Ok(StoreBackend::Postgres),
            other => Err(LedgerError::config(format!(
                "unknown LEDGER_BACKEND '{}', expected memory or postgres",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerConfig {
    pub backend: StoreBackend,
    pub database: DatabaseConfig,
    pub lock_timeout: Duration,
}

impl LedgerConfig {
    /// Load configuration from `config.env`, `.env` and the process environment
    pub fn from_env() -> Result<Self, LedgerError> {
        dotenv::from_filename("config.env").ok();
        dotenv::dotenv().ok();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, LedgerError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let backend = var("LEDGER_BACKEND", "postgres").parse()?;

        let url = match lookup("DATABASE_URL") {
            Some(url) => url,
            None => format!(
                "postgres://{}:{}@{}:{}/{}?sslmode={}",
                var("DB_USER", "wallet_user"),
                var("DB_PASSWORD", ""),
                var("DB_HOST", "localhost"),
                var("DB_PORT", "5433"),
                var("DB_NAME", "wallet_db"),
                var("DB_SSLMODE", "disable"),
            ),
        };

        Ok(LedgerConfig {
            backend,
            database: DatabaseConfig {
                url,
                max_connections: parse_var(&lookup, "DB_MAX_CONNECTIONS", 20)?,
                min_connections: parse_var(&lookup, "DB_MIN_CONNECTIONS", 2)?,
                acquire_timeout: Duration::from_secs(parse_var(
                    &lookup,
                    "DB_ACQUIRE_TIMEOUT_SECS",
                    5,
                )?),
            },
            lock_timeout: lock_timeout_from_millis(parse_var(
                &lookup,
                "WALLET_LOCK_TIMEOUT_MS",
                DEFAULT_LOCK_TIMEOUT.as_millis() as u64,
            )?)?,
        })
    }
}

/// Lock timeout from a millisecond count; zero is rejected so waits stay bounded
pub fn lock_timeout_from_millis(millis: u64) -> Result<Duration, LedgerError> {
    if millis == 0 {
        return Err(LedgerError::config("lock timeout must be at least 1 ms"));
    }
    Ok(Duration::from_millis(millis))
}

fn parse_var<F, T>(lookup: &F, key: &str, default: T) -> Result<T, LedgerError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| LedgerError::config(format!("invalid {}: '{}'", key, raw))),
    }
}
