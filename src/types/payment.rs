//! Payment types for the fleet ledger
//!
//! This module defines customer payment events and the application records
//! that join a payment to the charges it settled. Payments are immutable
//! once recorded; processing them is a separate, explicitly invoked step
//! handled by the allocation engine.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::charge::{ChargeId, CustomerId, RentalId, VehicleId};

/// Payment identifier
pub type PaymentId = u32;

/// Payment application identifier
pub type ApplicationId = u64;

/// What a payment is for
///
/// Rental payments are allocated against the customer's open charges in
/// FIFO order. Initial fees and other payments are company revenue and are
/// posted directly, without touching any charge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentType {
    /// Settles rental installments and fines, oldest due date first
    Rental,
    /// One-off contract initiation fee; company revenue, not customer debt
    InitialFee,
    /// Any other direct revenue payment
    Other,
}

/// How the payment was made
///
/// Pure data entry detail; the allocation engine never branches on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    Card,
    BankTransfer,
    Other,
}

/// A customer payment event
///
/// Recorded by data entry and immutable afterwards. Whether and how it has
/// been allocated is derived from the ledger and application tables, not
/// stored on the payment itself.
#[derive(Debug, Clone, PartialEq)]
pub struct Payment {
    /// Unique payment identifier
    pub id: PaymentId,

    /// Customer who paid
    pub customer: CustomerId,

    /// Vehicle the payment relates to, if any
    pub vehicle: Option<VehicleId>,

    /// Rental agreement the payment relates to, if any
    pub rental: Option<RentalId>,

    /// What the payment is for
    pub payment_type: PaymentType,

    /// How the payment was made
    pub method: PaymentMethod,

    /// Date the payment was received
    pub payment_date: NaiveDate,

    /// Amount paid; always positive
    pub amount: Decimal,
}

/// Join of a payment to a charge it partially or fully settled
///
/// The sum of `amount_applied` for a charge never exceeds that charge's
/// original amount, and the sum for a payment never exceeds the payment
/// amount. Both invariants are enforced by the allocation engine.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentApplication {
    /// Unique application identifier
    pub id: ApplicationId,

    /// Payment that supplied the funds
    pub payment: PaymentId,

    /// Charge the funds were applied to
    pub charge: ChargeId,

    /// Portion of the payment consumed by this charge; always positive
    pub amount_applied: Decimal,
}
