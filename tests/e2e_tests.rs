//! End-to-end replay tests
//!
//! These tests validate the complete replay pipeline using predefined CSV
//! fixtures. Each test:
//! 1. Reads input.csv from a fixture directory
//! 2. Replays all operations against a fresh in-memory ledger
//! 3. Writes the balance CSV to a temporary file
//! 4. Compares the label and balance columns with expected.csv
//!
//! Wallet ids are generated during replay, so the `wallet` column is checked
//! for shape only.
//!
//! Each fixture is replayed with one worker and with several.

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use std::fs::{self, File};
    use std::io::Write;
    use std::path::Path;
    use std::sync::Arc;
    use tempfile::NamedTempFile;
    use uuid::Uuid;
    use wallet_ledger::core::{MemoryWalletStore, WalletLedger};
    use wallet_ledger::io::write_balances_csv;
    use wallet_ledger::replay::{replay, ReplayConfig};

    /// Replay `tests/fixtures/{fixture_name}/input.csv` and return the balance CSV
    async fn replay_fixture(fixture_name: &str, max_concurrent: usize) -> String {
        let input_path = format!("tests/fixtures/{}/input.csv", fixture_name);
        assert!(
            Path::new(&input_path).exists(),
            "Input file not found: {}",
            input_path
        );

        let ledger = WalletLedger::new(Arc::new(MemoryWalletStore::new()));
        let input = File::open(&input_path).expect("Failed to open input file");

        let report = replay(&ledger, input, &ReplayConfig::new(max_concurrent))
            .await
            .unwrap_or_else(|e| panic!("Failed to replay operations: {}", e));

        let mut temp_output = NamedTempFile::new().expect("Failed to create temp file");
        write_balances_csv(&report.balances, &mut temp_output)
            .unwrap_or_else(|e| panic!("Failed to write balances: {}", e));
        temp_output.flush().expect("Failed to flush temp file");

        fs::read_to_string(temp_output.path()).expect("Failed to read output file")
    }

    /// Reduce `wallet,label,balance` output to `label,balance` lines
    fn label_balance_lines(output: &str) -> Vec<String> {
        let mut lines = output.lines();
        assert_eq!(lines.next(), Some("wallet,label,balance"));

        lines
            .map(|line| {
                let mut fields = line.splitn(3, ',');
                let wallet = fields.next().unwrap_or_default();
                assert!(
                    Uuid::parse_str(wallet).is_ok(),
                    "wallet column is not a UUID: {}",
                    wallet
                );
                fields.collect::<Vec<_>>().join(",")
            })
            .collect()
    }

    #[rstest]
    #[case("happy_path")]
    #[case("insufficient_funds")]
    #[case("invalid_operations")]
    #[case("malformed_data")]
    #[case("multiple_wallets")]
    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_fixtures(#[case] fixture: &str, #[values(1, 4)] max_concurrent: usize) {
        let expected_path = format!("tests/fixtures/{}/expected.csv", fixture);
        let expected = fs::read_to_string(&expected_path)
            .unwrap_or_else(|e| panic!("Failed to read {}: {}", expected_path, e));
        let expected: Vec<String> = expected.lines().skip(1).map(str::to_string).collect();

        let actual = label_balance_lines(&replay_fixture(fixture, max_concurrent).await);

        assert_eq!(
            actual, expected,
            "\n\nFixture '{}' failed with max_concurrent {}",
            fixture, max_concurrent
        );
    }
}
