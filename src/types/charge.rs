//! Charge types for the fleet ledger
//!
//! A charge is an amount a customer owes, with a due date. Charges are
//! created when a rental installment or fine is scheduled and are settled
//! by the allocation engine, oldest due date first.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Customer identifier
pub type CustomerId = u32;

/// Vehicle identifier
pub type VehicleId = u32;

/// Rental agreement identifier
pub type RentalId = u32;

/// Charge identifier
pub type ChargeId = u32;

/// Categories of amounts a customer can owe
///
/// Rental charges are the periodic installments of a rental agreement.
/// Fines are one-off obligations (traffic fines, damage penalties) and
/// carry no rental reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChargeCategory {
    /// Periodic rental installment
    Rental,
    /// One-off fine, not tied to a rental period
    Fines,
}

/// An amount owed by a customer
///
/// `remaining_amount` starts equal to `original_amount` and is decreased
/// only by the allocation engine as payments are applied. The invariant
/// `0 <= remaining_amount <= original_amount` holds at all times.
#[derive(Debug, Clone, PartialEq)]
pub struct Charge {
    /// Unique charge identifier
    pub id: ChargeId,

    /// Customer who owes this amount
    pub customer: CustomerId,

    /// Vehicle the obligation relates to
    pub vehicle: VehicleId,

    /// Rental agreement, `None` for fines
    pub rental: Option<RentalId>,

    /// Whether this is a rental installment or a fine
    pub category: ChargeCategory,

    /// Date the amount falls due
    ///
    /// May be in the future; future rental charges are excluded from the
    /// customer balance until due.
    pub due_date: NaiveDate,

    /// Amount originally owed
    pub original_amount: Decimal,

    /// Portion not yet settled by payments
    pub remaining_amount: Decimal,
}

impl Charge {
    /// Create a new charge with nothing applied against it yet
    pub fn new(
        id: ChargeId,
        customer: CustomerId,
        vehicle: VehicleId,
        rental: Option<RentalId>,
        category: ChargeCategory,
        due_date: NaiveDate,
        amount: Decimal,
    ) -> Self {
        Charge {
            id,
            customer,
            vehicle,
            rental,
            category,
            due_date,
            original_amount: amount,
            remaining_amount: amount,
        }
    }

    /// Whether any part of the charge is still unsettled
    pub fn is_open(&self) -> bool {
        self.remaining_amount > Decimal::ZERO
    }

    /// Amount already settled by payments
    pub fn settled_amount(&self) -> Decimal {
        self.original_amount - self.remaining_amount
    }
}
