//! Streaming CSV readers for charge and payment ingest
//!
//! Each reader wraps a `csv::Reader` and yields converted domain records
//! one at a time, so ingest memory stays constant regardless of file
//! size. Fatal errors (file not found) are returned from `new()`;
//! individual row errors are yielded as `Err` variants carrying the line
//! number, and the caller decides whether to skip or abort.

use crate::io::csv_format::{
    convert_charge_record, convert_payment_record, ChargeCsvRecord, PaymentCsvRecord,
};
use crate::types::{Charge, Payment};
use csv::{Reader, ReaderBuilder, Trim};
use std::fs::File;
use std::path::Path;

fn open_reader(path: &Path) -> Result<Reader<File>, String> {
    let file = File::open(path)
        .map_err(|e| format!("Failed to open file '{}': {}", path.display(), e))?;
    Ok(ReaderBuilder::new()
        .trim(Trim::All)
        .flexible(true)
        .from_reader(file))
}

/// Streaming reader over charge rows
#[derive(Debug)]
pub struct ChargeReader {
    reader: Reader<File>,
    line: u64,
}

impl ChargeReader {
    /// Open a charges CSV file for streaming iteration
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened.
    pub fn new(path: &Path) -> Result<Self, String> {
        Ok(ChargeReader {
            reader: open_reader(path)?,
            line: 1,
        })
    }
}

impl Iterator for ChargeReader {
    type Item = Result<Charge, String>;

    fn next(&mut self) -> Option<Self::Item> {
        self.line += 1;
        let record: Result<ChargeCsvRecord, csv::Error> = self.reader.deserialize().next()?;
        Some(match record {
            Ok(row) => {
                convert_charge_record(row).map_err(|e| format!("line {}: {}", self.line, e))
            }
            Err(e) => Err(format!("line {}: {}", self.line, e)),
        })
    }
}

/// Streaming reader over payment rows
#[derive(Debug)]
pub struct PaymentReader {
    reader: Reader<File>,
    line: u64,
}

impl PaymentReader {
    /// Open a payments CSV file for streaming iteration
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened.
    pub fn new(path: &Path) -> Result<Self, String> {
        Ok(PaymentReader {
            reader: open_reader(path)?,
            line: 1,
        })
    }
}

impl Iterator for PaymentReader {
    type Item = Result<Payment, String>;

    fn next(&mut self) -> Option<Self::Item> {
        self.line += 1;
        let record: Result<PaymentCsvRecord, csv::Error> = self.reader.deserialize().next()?;
        Some(match record {
            Ok(row) => {
                convert_payment_record(row).map_err(|e| format!("line {}: {}", self.line, e))
            }
            Err(e) => Err(format!("line {}: {}", self.line, e)),
        })
    }
}
