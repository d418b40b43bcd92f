//! End-to-end integration tests
//!
//! These tests validate the complete load-apply-report pipeline using
//! predefined CSV test fixtures. Each test:
//! 1. Reads charges.csv and payments.csv from a fixture directory
//! 2. Applies all payments through the engine
//! 3. Generates the report CSV
//! 4. Compares actual output with expected.csv
//!
//! Test fixtures are located in tests/fixtures/ and cover:
//! - The happy path (charges settled, remainder owed)
//! - FIFO allocation across partially settled charges
//! - Initial-fee exclusion from customer balances
//! - Prepaid future charges surfacing as credit
//! - Multiple customers with mixed rental and fine charges
//! - The P&L report
//!
//! Each fixture is run twice: once applying payments in file order and
//! once through the maintenance reprocessor. Both must produce the same
//! report, because every fixture's file order matches its chronological
//! order. Balance fixtures pin the cut-off date so the due-date filter
//! never depends on the wall clock.

use chrono::NaiveDate;
use fleet_ledger::cli::ReportKind;
use fleet_ledger::pipeline::{run, RunOptions};
use rstest::rstest;
use std::fs;
use std::path::Path;

/// Cut-off date used by every balance fixture
fn as_of() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
}

/// Run a fixture and compare the report with expected.csv
fn run_test_fixture(fixture_name: &str, report: ReportKind, reprocess: bool) {
    let fixture_dir = format!("tests/fixtures/{}", fixture_name);
    let charges_path = format!("{}/charges.csv", fixture_dir);
    let payments_path = format!("{}/payments.csv", fixture_dir);
    let expected_path = format!("{}/expected.csv", fixture_dir);

    assert!(
        Path::new(&charges_path).exists(),
        "Charges file not found: {}",
        charges_path
    );
    assert!(
        Path::new(&payments_path).exists(),
        "Payments file not found: {}",
        payments_path
    );
    assert!(
        Path::new(&expected_path).exists(),
        "Expected file not found: {}",
        expected_path
    );

    let options = RunOptions {
        report,
        reprocess,
        as_of: Some(as_of()),
    };

    let mut output = Vec::new();
    run(
        Path::new(&charges_path),
        Path::new(&payments_path),
        options,
        &mut output,
    )
    .unwrap_or_else(|e| panic!("Pipeline failed for fixture {}: {}", fixture_name, e));

    let actual_output = String::from_utf8(output).expect("Report is not valid UTF-8");
    let expected_output = fs::read_to_string(&expected_path)
        .unwrap_or_else(|e| panic!("Failed to read expected file {}: {}", expected_path, e));

    assert_eq!(
        actual_output, expected_output,
        "\n\nOutput mismatch for fixture: {} (reprocess: {})\n\nActual output:\n{}\n\nExpected output:\n{}\n",
        fixture_name, reprocess, actual_output, expected_output
    );
}

/// End-to-end test for all balance fixtures, with and without reprocessing
#[rstest]
#[case("happy_path")]
#[case("fifo_partial")]
#[case("initial_fee_exclusion")]
#[case("prepayment_credit")]
#[case("multiple_customers")]
fn test_balance_fixtures(#[case] fixture: &str, #[values(false, true)] reprocess: bool) {
    run_test_fixture(fixture, ReportKind::Balances, reprocess);
}

/// End-to-end test for the P&L report fixture
#[rstest]
fn test_pnl_fixture(#[values(false, true)] reprocess: bool) {
    run_test_fixture("pnl_report", ReportKind::Pnl, reprocess);
}
