use chrono::NaiveDate;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Process fleet-rental charges and payments into ledger reports
#[derive(Parser, Debug)]
#[command(name = "fleet-ledger")]
#[command(about = "Apply customer payments to open charges and report balances or P&L", long_about = None)]
pub struct CliArgs {
    /// Input CSV file with scheduled charges
    #[arg(value_name = "CHARGES", help = "Path to the charges CSV file")]
    pub charges_file: PathBuf,

    /// Input CSV file with customer payments
    #[arg(value_name = "PAYMENTS", help = "Path to the payments CSV file")]
    pub payments_file: PathBuf,

    /// Which report to write to stdout
    #[arg(
        long = "report",
        value_name = "REPORT",
        default_value = "balances",
        help = "Report to produce: 'balances' or 'pnl'"
    )]
    pub report: ReportKind,

    /// Run the maintenance reprocessor instead of applying payments in
    /// file order
    #[arg(
        long = "reprocess",
        help = "Rebuild all allocations by replaying payments chronologically"
    )]
    pub reprocess: bool,

    /// Balance cut-off date; future rental charges are excluded until due
    #[arg(
        long = "as-of",
        value_name = "DATE",
        help = "Balance cut-off date (YYYY-MM-DD, default: today)"
    )]
    pub as_of: Option<NaiveDate>,
}

/// Available report kinds
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ReportKind {
    /// Per-customer net positions
    Balances,
    /// Per-vehicle profit and loss totals
    Pnl,
}
