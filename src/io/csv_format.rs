//! CSV format handling for ledger ingest and reports
//!
//! This module centralizes all CSV format concerns, providing:
//! - Row structures for charge and payment ingest
//! - Conversion from CSV rows to domain types
//! - Balance and P&L report serialization
//!
//! All functions are pure (no I/O) for easy testing. Report writers are
//! the "display layer" of the balance contract: they take the signed net
//! position, print its absolute value, and attach a status label.

use crate::core::PnlSummaryRow;
use crate::types::{
    Charge, ChargeCategory, ChargeId, CustomerId, Payment, PaymentId, PaymentMethod,
    PaymentType, RentalId, VehicleId,
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::Write;
use std::str::FromStr;

/// CSV row structure for charge ingest
///
/// Matches the input format with columns:
/// charge, customer, vehicle, rental, category, due_date, amount
/// The rental column is empty for fines.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct ChargeCsvRecord {
    pub charge: ChargeId,
    pub customer: CustomerId,
    pub vehicle: VehicleId,
    pub rental: Option<RentalId>,
    pub category: String,
    pub due_date: String,
    pub amount: Option<String>,
}

/// CSV row structure for payment ingest
///
/// Matches the input format with columns:
/// payment, customer, vehicle, rental, type, method, date, amount
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct PaymentCsvRecord {
    pub payment: PaymentId,
    pub customer: CustomerId,
    pub vehicle: Option<VehicleId>,
    pub rental: Option<RentalId>,
    #[serde(rename = "type")]
    pub payment_type: String,
    pub method: String,
    pub date: String,
    pub amount: Option<String>,
}

/// A customer's signed net position, ready for the balance report
#[derive(Debug, Clone, PartialEq)]
pub struct CustomerPosition {
    pub customer: CustomerId,
    pub net: Decimal,
}

fn parse_date(value: &str, field: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|_| format!("Invalid {} '{}', expected YYYY-MM-DD", field, value))
}

fn parse_amount(value: Option<String>, row_id: u32) -> Result<Decimal, String> {
    match value {
        Some(amount_str) if !amount_str.trim().is_empty() => {
            Decimal::from_str(amount_str.trim())
                .map_err(|_| format!("Invalid amount '{}' for row {}", amount_str, row_id))
        }
        _ => Err(format!("Row {} requires an amount", row_id)),
    }
}

/// Convert a ChargeCsvRecord to a Charge
///
/// Parses the category, due date, and amount, leaving amount-positivity
/// validation to the engine.
pub fn convert_charge_record(record: ChargeCsvRecord) -> Result<Charge, String> {
    let category = match record.category.to_lowercase().as_str() {
        "rental" => ChargeCategory::Rental,
        "fines" => ChargeCategory::Fines,
        other => {
            return Err(format!(
                "Invalid charge category '{}' for charge {}",
                other, record.charge
            ))
        }
    };

    let due_date = parse_date(&record.due_date, "due_date")?;
    let amount = parse_amount(record.amount, record.charge)?;

    Ok(Charge::new(
        record.charge,
        record.customer,
        record.vehicle,
        record.rental,
        category,
        due_date,
        amount,
    ))
}

/// Convert a PaymentCsvRecord to a Payment
pub fn convert_payment_record(record: PaymentCsvRecord) -> Result<Payment, String> {
    let payment_type = match record.payment_type.to_lowercase().as_str() {
        "rental" => PaymentType::Rental,
        "initial_fee" => PaymentType::InitialFee,
        "other" => PaymentType::Other,
        other => {
            return Err(format!(
                "Invalid payment type '{}' for payment {}",
                other, record.payment
            ))
        }
    };

    let method = match record.method.to_lowercase().as_str() {
        "cash" => PaymentMethod::Cash,
        "card" => PaymentMethod::Card,
        "bank_transfer" => PaymentMethod::BankTransfer,
        "other" => PaymentMethod::Other,
        other => {
            return Err(format!(
                "Invalid payment method '{}' for payment {}",
                other, record.payment
            ))
        }
    };

    let payment_date = parse_date(&record.date, "date")?;
    let amount = parse_amount(record.amount, record.payment)?;

    Ok(Payment {
        id: record.payment,
        customer: record.customer,
        vehicle: record.vehicle,
        rental: record.rental,
        payment_type,
        method,
        payment_date,
        amount,
    })
}

/// Status label for a signed net position
///
/// Positive means the customer owes, negative means prepaid credit.
pub fn position_status(net: Decimal) -> &'static str {
    if net > Decimal::ZERO {
        "In Debt"
    } else if net < Decimal::ZERO {
        "In Credit"
    } else {
        "Settled"
    }
}

/// Write the customer balance report
///
/// Columns: customer, amount, status. The amount is the absolute value of
/// the signed net position; the sign is carried by the status label.
pub fn write_balance_report(
    positions: &[CustomerPosition],
    output: &mut dyn Write,
) -> Result<(), String> {
    let mut writer = csv::Writer::from_writer(output);

    writer
        .write_record(["customer", "amount", "status"])
        .map_err(|e| format!("Failed to write CSV header: {}", e))?;

    for position in positions {
        writer
            .write_record([
                position.customer.to_string(),
                position.net.abs().to_string(),
                position_status(position.net).to_string(),
            ])
            .map_err(|e| {
                format!(
                    "Failed to write position for customer {}: {}",
                    position.customer, e
                )
            })?;
    }

    writer
        .flush()
        .map_err(|e| format!("Failed to flush CSV output: {}", e))
}

/// Write the fleet P&L report
///
/// Columns: vehicle, category, revenue, cost, net. Unattributed rows
/// leave the vehicle column empty.
pub fn write_pnl_report(rows: &[PnlSummaryRow], output: &mut dyn Write) -> Result<(), String> {
    let mut writer = csv::Writer::from_writer(output);

    writer
        .write_record(["vehicle", "category", "revenue", "cost", "net"])
        .map_err(|e| format!("Failed to write CSV header: {}", e))?;

    for row in rows {
        writer
            .write_record([
                row.vehicle.map(|v| v.to_string()).unwrap_or_default(),
                row.category.to_string(),
                row.revenue.to_string(),
                row.cost.to_string(),
                row.net().to_string(),
            ])
            .map_err(|e| format!("Failed to write P&L row: {}", e))?;
    }

    writer
        .flush()
        .map_err(|e| format!("Failed to flush CSV output: {}", e))
}
