// CLI module
// Command-line interface and argument parsing

mod args;

pub use args::{CliArgs, Command};

use clap::Parser;

/// Parse command-line arguments using clap
///
/// Invalid arguments and `--help` are handled by clap, which prints the
/// message and exits the process.
pub fn parse_args() -> CliArgs {
    CliArgs::parse()
}
