//! I/O module
//!
//! Handles CSV ingest and report output.
//!
//! # Components
//!
//! - `csv_format` - CSV format handling (row conversion, report serialization)
//! - `reader` - streaming CSV readers for charges and payments

pub mod csv_format;
pub mod reader;

pub use csv_format::{
    convert_charge_record, convert_payment_record, position_status, write_balance_report,
    write_pnl_report, ChargeCsvRecord, CustomerPosition, PaymentCsvRecord,
};
pub use reader::{ChargeReader, PaymentReader};
