//! Load-apply-report pipeline for the operator CLI
//!
//! Orchestrates one batch run: stream charges and payments from CSV,
//! apply every payment through the engine (or run the maintenance
//! reprocessor), and write the selected report.
//!
//! # Error Handling
//!
//! Fatal errors (missing input file, report write failure, an aborted
//! reprocess) are returned. Individual row and per-payment errors are
//! logged and skipped so one bad record never blocks the rest of the
//! batch.

use crate::cli::ReportKind;
use crate::core::LedgerEngine;
use crate::io::csv_format::{write_balance_report, write_pnl_report, CustomerPosition};
use crate::io::reader::{ChargeReader, PaymentReader};
use crate::types::PaymentId;
use chrono::{NaiveDate, Utc};
use std::io::Write;
use std::path::Path;
use tracing::warn;

/// Options for one pipeline run
#[derive(Debug, Clone, Copy)]
pub struct RunOptions {
    /// Report to produce
    pub report: ReportKind,
    /// Rebuild allocations chronologically instead of applying payments
    /// in file order
    pub reprocess: bool,
    /// Balance cut-off date; defaults to today
    pub as_of: Option<NaiveDate>,
}

/// Run the full pipeline and write the report to `output`
///
/// # Errors
///
/// Returns a message for fatal errors: unreadable input files, an
/// aborted reprocess, or a report write failure.
pub fn run(
    charges_path: &Path,
    payments_path: &Path,
    options: RunOptions,
    output: &mut dyn Write,
) -> Result<(), String> {
    let mut engine = LedgerEngine::new();

    for result in ChargeReader::new(charges_path)? {
        match result {
            Ok(charge) => {
                if let Err(e) = engine.insert_charge(charge) {
                    warn!(error = %e, "skipping charge row");
                }
            }
            Err(e) => warn!(error = %e, "skipping unparseable charge row"),
        }
    }

    // Payments are applied in file order, mirroring live data entry;
    // --reprocess replays them chronologically instead.
    let mut payment_ids: Vec<PaymentId> = Vec::new();
    for result in PaymentReader::new(payments_path)? {
        match result {
            Ok(payment) => {
                let id = payment.id;
                match engine.insert_payment(payment) {
                    Ok(()) => payment_ids.push(id),
                    Err(e) => warn!(error = %e, "skipping payment row"),
                }
            }
            Err(e) => warn!(error = %e, "skipping unparseable payment row"),
        }
    }

    if options.reprocess {
        engine
            .reapply_all_payments()
            .map_err(|e| e.to_string())?;
    } else {
        for payment in payment_ids {
            if let Err(e) = engine.apply_payment(payment) {
                warn!(payment, error = %e, "payment application failed");
            }
        }
    }

    match options.report {
        ReportKind::Balances => {
            let as_of = options.as_of.unwrap_or_else(|| Utc::now().date_naive());
            let positions: Vec<CustomerPosition> = engine
                .customers()
                .into_iter()
                .map(|customer| CustomerPosition {
                    customer,
                    net: engine.customer_balance_as_of(customer, as_of),
                })
                .collect();
            write_balance_report(&positions, output)
        }
        ReportKind::Pnl => write_pnl_report(&engine.pnl_summary(), output),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;
    use tempfile::NamedTempFile;

    fn temp_csv(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().expect("Failed to create temp file");
        file.write_all(content.as_bytes())
            .expect("Failed to write to temp file");
        file.flush().expect("Failed to flush temp file");
        file
    }

    fn options(report: ReportKind) -> RunOptions {
        RunOptions {
            report,
            reprocess: false,
            as_of: NaiveDate::from_ymd_opt(2024, 3, 1),
        }
    }

    #[test]
    fn test_run_produces_balance_report() {
        let charges = temp_csv(
            "charge,customer,vehicle,rental,category,due_date,amount\n\
             1,1,10,100,rental,2024-01-01,1000.00\n",
        );
        let payments = temp_csv(
            "payment,customer,vehicle,rental,type,method,date,amount\n\
             1,1,10,100,rental,card,2024-01-05,400.00\n",
        );

        let mut output = Vec::new();
        run(
            charges.path(),
            payments.path(),
            options(ReportKind::Balances),
            &mut output,
        )
        .unwrap();

        let report = String::from_utf8(output).unwrap();
        assert_eq!(report, "customer,amount,status\n1,600.00,In Debt\n");
    }

    #[test]
    fn test_run_skips_malformed_rows() {
        let charges = temp_csv(
            "charge,customer,vehicle,rental,category,due_date,amount\n\
             1,1,10,100,rental,2024-01-01,1000.00\n\
             2,1,10,100,rental,bad-date,500.00\n",
        );
        let payments = temp_csv(
            "payment,customer,vehicle,rental,type,method,date,amount\n\
             1,1,10,100,rental,card,2024-01-05,invalid\n\
             2,1,10,100,rental,card,2024-01-05,250.00\n",
        );

        let mut output = Vec::new();
        run(
            charges.path(),
            payments.path(),
            options(ReportKind::Balances),
            &mut output,
        )
        .unwrap();

        // Only the valid charge and the valid payment took effect.
        let report = String::from_utf8(output).unwrap();
        assert_eq!(report, "customer,amount,status\n1,750.00,In Debt\n");
    }

    #[test]
    fn test_run_missing_file_is_fatal() {
        let payments = temp_csv("payment,customer,vehicle,rental,type,method,date,amount\n");
        let mut output = Vec::new();
        let result = run(
            Path::new("missing.csv"),
            payments.path(),
            options(ReportKind::Balances),
            &mut output,
        );
        assert!(result.is_err());
        assert!(result.unwrap_err().contains("Failed to open file"));
    }

    #[test]
    fn test_run_pnl_report() {
        let charges = temp_csv(
            "charge,customer,vehicle,rental,category,due_date,amount\n\
             1,1,10,100,rental,2024-01-01,1000.00\n",
        );
        let payments = temp_csv(
            "payment,customer,vehicle,rental,type,method,date,amount\n\
             1,1,10,100,rental,card,2024-01-05,1000.00\n\
             2,1,10,100,initial_fee,card,2024-01-02,500.00\n",
        );

        let mut output = Vec::new();
        run(
            charges.path(),
            payments.path(),
            options(ReportKind::Pnl),
            &mut output,
        )
        .unwrap();

        let report = String::from_utf8(output).unwrap();
        assert_eq!(
            report,
            "vehicle,category,revenue,cost,net\n\
             10,Rental,1000.00,0,1000.00\n\
             10,Initial Fees,500.00,0,500.00\n"
        );
    }
}
