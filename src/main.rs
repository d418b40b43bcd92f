//! Fleet Ledger CLI
//!
//! Command-line interface for applying fleet-rental payments to open
//! charges and reporting customer balances or fleet P&L.
//!
//! # Usage
//!
//! ```bash
//! cargo run -- charges.csv payments.csv > balances.csv
//! cargo run -- --report pnl charges.csv payments.csv > pnl.csv
//! cargo run -- --reprocess charges.csv payments.csv > balances.csv
//! cargo run -- --as-of 2024-02-15 charges.csv payments.csv > balances.csv
//! ```
//!
//! The program loads charges and payments from the input CSV files,
//! applies every payment through the allocation engine (or rebuilds all
//! allocations chronologically with `--reprocess`), and writes the
//! selected report to stdout. Diagnostics go to stderr; set `RUST_LOG`
//! to control verbosity.
//!
//! # Exit Codes
//!
//! - 0: Success
//! - 1: Error (missing arguments, file not found, aborted reprocess, etc.)

use fleet_ledger::cli;
use fleet_ledger::pipeline::{self, RunOptions};
use std::process;
use tracing_subscriber::EnvFilter;

fn main() {
    // Diagnostics go to stderr so reports on stdout stay clean.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = cli::parse_args();

    let options = RunOptions {
        report: args.report,
        reprocess: args.reprocess,
        as_of: args.as_of,
    };

    let mut output = std::io::stdout();
    if let Err(e) = pipeline::run(&args.charges_file, &args.payments_file, options, &mut output) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}
