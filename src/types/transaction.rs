//! Transaction-related types for the wallet ledger
//!
//! This module defines operation kinds, inbound operation requests and the
//! append-only audit records produced by every accepted mutation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::error::LedgerError;
use super::wallet::{Amount, WalletId};

/// Audit record identifier
pub type TransactionId = Uuid;

/// Balance mutations supported by the ledger
///
/// Crosses every boundary as one of exactly two tokens: `DEPOSIT` or `WITHDRAW`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperationKind {
    /// Credit funds to a wallet
    Deposit,

    /// Debit funds from a wallet
    ///
    /// Rejected when the amount exceeds the current balance.
    Withdraw,
}

impl OperationKind {
    /// The wire token for this kind
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Deposit => "DEPOSIT",
            OperationKind::Withdraw => "WITHDRAW",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperationKind {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "DEPOSIT" => Ok(OperationKind::Deposit),
            "WITHDRAW" => Ok(OperationKind::Withdraw),
            other => Err(LedgerError::invalid_operation(other)),
        }
    }
}

/// Inbound request to change a wallet's balance
///
/// Mirrors the JSON body callers send: `{"walletId", "operationType", "amount"}`.
/// Unknown fields are rejected so typos surface as errors instead of defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct WalletOperation {
    /// Target wallet
    pub wallet_id: WalletId,

    /// DEPOSIT or WITHDRAW
    pub operation_type: OperationKind,

    /// Magnitude of the change in minor units
    pub amount: Amount,
}

impl WalletOperation {
    pub fn new(wallet_id: WalletId, operation_type: OperationKind, amount: Amount) -> Self {
        Self {
            wallet_id,
            operation_type,
            amount,
        }
    }

    /// Reject non-positive amounts before any storage interaction
    pub fn validate(&self) -> Result<(), LedgerError> {
        validate_amount(self.amount)
    }
}

/// Fails with `InvalidAmount` unless `amount > 0`
pub fn validate_amount(amount: Amount) -> Result<(), LedgerError> {
    if amount <= 0 {
        return Err(LedgerError::invalid_amount(amount));
    }
    Ok(())
}

/// Append-only audit record of one committed mutation
///
/// Created in the same atomic unit as the balance write it describes and
/// never modified afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRecord {
    /// Unique record identifier
    pub id: TransactionId,

    /// Wallet whose balance changed
    pub wallet_id: WalletId,

    /// DEPOSIT or WITHDRAW
    #[serde(rename = "operationType")]
    pub kind: OperationKind,

    /// Magnitude of the change (strictly positive)
    pub amount: Amount,

    /// Store-assigned commit sequence
    ///
    /// Strictly increasing across the store; orders records that share a
    /// `created_at` timestamp.
    pub sequence: i64,

    /// Commit time
    pub created_at: DateTime<Utc>,
}

impl TransactionRecord {
    /// Signed effect of this record on the wallet balance
    pub fn signed_amount(&self) -> i128 {
        match self.kind {
            OperationKind::Deposit => i128::from(self.amount),
            OperationKind::Withdraw => -i128::from(self.amount),
        }
    }
}

/// Balance implied by an audit trail
///
/// Sum of DEPOSIT amounts minus sum of WITHDRAW amounts. Computed in 128 bits
/// so that a corrupted log cannot overflow the check itself.
pub fn replayed_balance(records: &[TransactionRecord]) -> i128 {
    records.iter().map(TransactionRecord::signed_amount).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::deposit("DEPOSIT", OperationKind::Deposit)]
    #[case::withdraw("WITHDRAW", OperationKind::Withdraw)]
    fn test_operation_kind_parses_tokens(#[case] token: &str, #[case] expected: OperationKind) {
        assert_eq!(token.parse::<OperationKind>().unwrap(), expected);
        assert_eq!(expected.to_string(), token);
    }

    #[rstest]
    #[case::lowercase("deposit")]
    #[case::long_form("withdrawal")]
    #[case::empty("")]
    #[case::transfer("TRANSFER")]
    fn test_operation_kind_rejects_unknown_tokens(#[case] token: &str) {
        assert_eq!(
            token.parse::<OperationKind>().unwrap_err(),
            LedgerError::invalid_operation(token)
        );
    }

    #[test]
    fn test_wallet_operation_deserializes_camel_case() {
        let id = Uuid::new_v4();
        let json = format!(
            r#"{{"walletId":"{}","operationType":"WITHDRAW","amount":400}}"#,
            id
        );

        let op: WalletOperation = serde_json::from_str(&json).unwrap();

        assert_eq!(op, WalletOperation::new(id, OperationKind::Withdraw, 400));
    }

    #[test]
    fn test_wallet_operation_rejects_unknown_fields() {
        let json = format!(
            r#"{{"walletId":"{}","operationType":"DEPOSIT","amount":1,"currency":"USD"}}"#,
            Uuid::new_v4()
        );

        assert!(serde_json::from_str::<WalletOperation>(&json).is_err());
    }

    #[test]
    fn test_wallet_operation_rejects_unknown_operation_type() {
        let json = format!(
            r#"{{"walletId":"{}","operationType":"TRANSFER","amount":1}}"#,
            Uuid::new_v4()
        );

        assert!(serde_json::from_str::<WalletOperation>(&json).is_err());
    }

    #[rstest]
    #[case::zero(0)]
    #[case::negative(-5)]
    #[case::min(i64::MIN)]
    fn test_validate_rejects_non_positive_amounts(#[case] amount: i64) {
        let op = WalletOperation::new(Uuid::new_v4(), OperationKind::Deposit, amount);
        assert_eq!(op.validate(), Err(LedgerError::invalid_amount(amount)));
    }

    #[test]
    fn test_replayed_balance_sums_signed_amounts() {
        let wallet_id = Uuid::new_v4();
        let record = |kind, amount, sequence| TransactionRecord {
            id: Uuid::new_v4(),
            wallet_id,
            kind,
            amount,
            sequence,
            created_at: Utc::now(),
        };
        let records = vec![
            record(OperationKind::Deposit, 1000, 1),
            record(OperationKind::Withdraw, 400, 2),
            record(OperationKind::Deposit, 5, 3),
        ];

        assert_eq!(replayed_balance(&records), 605);
        assert_eq!(replayed_balance(&[]), 0);
    }
}
