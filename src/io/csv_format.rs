//! CSV format handling for operation input and ledger output
//!
//! This module centralizes all CSV format concerns, providing:
//! - `CsvOperation` structure for deserializing replay input
//! - Conversion from CSV rows to domain operations
//! - Balance and audit-trail output serialization
//!
//! Input columns: `wallet,operation,amount`. The `wallet` column holds either
//! an existing wallet UUID or a free-form label that replay maps to a freshly
//! created wallet.

use std::io::{Read, Write};

use serde::Deserialize;
use tracing::warn;
use uuid::Uuid;

use crate::types::{
    Amount, Balance, LedgerError, OperationKind, TransactionRecord, WalletId, WalletOperation,
};

/// One row of replay input
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct CsvOperation {
    pub wallet: String,
    pub operation: String,
    pub amount: Amount,
}

/// How a CSV row refers to its wallet
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum WalletRef {
    /// An existing wallet, by UUID
    Id(WalletId),
    /// A label standing for a wallet created during replay
    Label(String),
}

impl CsvOperation {
    pub fn wallet_ref(&self) -> WalletRef {
        let wallet = self.wallet.trim();
        match Uuid::parse_str(wallet) {
            Ok(id) => WalletRef::Id(id),
            Err(_) => WalletRef::Label(wallet.to_string()),
        }
    }
}

/// Read every well-formed operation row
///
/// Malformed rows are logged and skipped; processing continues with the next row.
pub fn read_operations<R: Read>(input: R) -> Vec<CsvOperation> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(input);

    let mut operations = Vec::new();
    for row in reader.deserialize::<CsvOperation>() {
        match row {
            Ok(operation) => operations.push(operation),
            Err(e) => warn!(error = %LedgerError::from(e), "skipping malformed row"),
        }
    }
    operations
}

/// Convert a CSV row into a ledger operation against `wallet_id`
///
/// Fails with `InvalidOperation` for tokens other than DEPOSIT/WITHDRAW. The
/// amount is passed through unchanged; the ledger rejects non-positive ones.
pub fn convert_csv_operation(
    row: &CsvOperation,
    wallet_id: WalletId,
) -> Result<WalletOperation, LedgerError> {
    let kind: OperationKind = row.operation.trim().parse()?;
    Ok(WalletOperation::new(wallet_id, kind, row.amount))
}

fn write_error(error: csv::Error) -> LedgerError {
    LedgerError::IoError {
        message: format!("Failed to write CSV: {}", error),
    }
}

/// One line of balance output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BalanceRow {
    pub label: String,
    pub wallet: WalletId,
    pub balance: Balance,
}

/// Write balances with columns: wallet, label, balance
///
/// Rows are sorted by label for deterministic output.
pub fn write_balances_csv(rows: &[BalanceRow], output: &mut dyn Write) -> Result<(), LedgerError> {
    let mut writer = csv::Writer::from_writer(output);

    writer
        .write_record(["wallet", "label", "balance"])
        .map_err(write_error)?;

    let mut sorted = rows.to_vec();
    sorted.sort_by(|a, b| a.label.cmp(&b.label));

    for row in sorted {
        writer
            .write_record(&[row.wallet.to_string(), row.label, row.balance.to_string()])
            .map_err(write_error)?;
    }

    writer.flush()?;
    Ok(())
}

/// Write an audit trail with columns: sequence, id, wallet, operation, amount, created_at
///
/// Records are written in the order given, which for `list_transactions` is commit order.
pub fn write_history_csv(
    records: &[TransactionRecord],
    output: &mut dyn Write,
) -> Result<(), LedgerError> {
    let mut writer = csv::Writer::from_writer(output);

    writer
        .write_record(["sequence", "id", "wallet", "operation", "amount", "created_at"])
        .map_err(write_error)?;

    for record in records {
        writer
            .write_record(&[
                record.sequence.to_string(),
                record.id.to_string(),
                record.wallet_id.to_string(),
                record.kind.to_string(),
                record.amount.to_string(),
                record.created_at.to_rfc3339(),
            ])
            .map_err(write_error)?;
    }

    writer.flush()?;
    Ok(())
}
