//! Wallet-related types for the wallet ledger
//!
//! This module defines the Wallet structure and the identifier and
//! balance aliases shared by every other module.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Wallet identifier (128-bit UUID)
pub type WalletId = Uuid;

/// Wallet balance in minor currency units
///
/// Never negative once a mutation has committed.
pub type Balance = i64;

/// Magnitude of a single mutation in minor currency units
///
/// Always strictly positive; the direction comes from the operation kind.
pub type Amount = i64;

/// Committed wallet state
///
/// Represents a wallet row as seen by readers outside an in-flight mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Wallet {
    /// The wallet identifier
    #[serde(rename = "walletId")]
    pub id: WalletId,

    /// Current committed balance
    ///
    /// Only the balance mutator changes this value, and only together with
    /// an appended transaction record.
    pub balance: Balance,

    /// When the wallet was created
    pub created_at: DateTime<Utc>,

    /// When the balance last changed (equal to `created_at` until the first mutation)
    pub updated_at: DateTime<Utc>,
}

impl Wallet {
    /// Create a new wallet with a fresh identifier and zero balance
    pub fn new() -> Self {
        Self::with_id(Uuid::new_v4())
    }

    /// Create a new zero-balance wallet with the given identifier
    pub fn with_id(id: WalletId) -> Self {
        let now = Utc::now();
        Wallet {
            id,
            balance: 0,
            created_at: now,
            updated_at: now,
        }
    }
}

impl Default for Wallet {
    fn default() -> Self {
        Self::new()
    }
}
