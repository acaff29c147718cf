//! I/O module
//!
//! Handles CSV input of operations and CSV output of balances and audit trails.

pub mod csv_format;

pub use csv_format::{
    convert_csv_operation, read_operations, write_balances_csv, write_history_csv, BalanceRow,
    CsvOperation, WalletRef,
};
