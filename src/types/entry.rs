//! Ledger and P&L entry types
//!
//! Ledger entries are the authoritative, append-only record of customer
//! debt. P&L entries are derived revenue/cost rows for fleet profitability
//! reporting; they share the category taxonomy but serve a different
//! audience and are never used to compute customer balances.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::fmt;

use super::charge::{ChargeCategory, ChargeId, CustomerId, RentalId, VehicleId};
use super::payment::PaymentId;

/// Ledger entry identifier
pub type EntryId = u64;

/// P&L entry identifier
pub type PnlId = u64;

/// Whether a ledger entry records an obligation or a settlement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryType {
    /// An amount owed; positive sign
    Charge,
    /// A payment applied against debt or posted as revenue; negative sign
    Payment,
}

/// Category taxonomy shared by ledger and P&L entries
///
/// Ledger entries only ever use `Rental`, `InitialFees`, `Fines`, and
/// `Other`; the remaining categories exist for fleet cost/revenue P&L
/// postings (vehicle acquisition, servicing, disposal).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntryCategory {
    Rental,
    InitialFees,
    Fines,
    Service,
    Acquisition,
    Disposal,
    Other,
}

impl From<ChargeCategory> for EntryCategory {
    fn from(category: ChargeCategory) -> Self {
        match category {
            ChargeCategory::Rental => EntryCategory::Rental,
            ChargeCategory::Fines => EntryCategory::Fines,
        }
    }
}

impl fmt::Display for EntryCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            EntryCategory::Rental => "Rental",
            EntryCategory::InitialFees => "Initial Fees",
            EntryCategory::Fines => "Fines",
            EntryCategory::Service => "Service",
            EntryCategory::Acquisition => "Acquisition",
            EntryCategory::Disposal => "Disposal",
            EntryCategory::Other => "Other",
        };
        f.write_str(label)
    }
}

/// An authoritative per-customer accounting line
///
/// # Sign convention
///
/// Fixed for the life of the system: Charge entries carry a positive
/// amount (the customer owes), Payment entries carry a negative amount
/// (debt discharged or revenue received). The customer balance is the sum
/// of signed amounts after the exclusion rules in the balance calculator.
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerEntry {
    /// Unique entry identifier
    pub id: EntryId,

    /// Customer the line belongs to
    pub customer: CustomerId,

    /// Vehicle, if the underlying event names one
    pub vehicle: Option<VehicleId>,

    /// Rental agreement, if the underlying event names one
    pub rental: Option<RentalId>,

    /// Obligation or settlement
    pub entry_type: EntryType,

    /// Economic category of the line
    pub category: EntryCategory,

    /// Signed amount; positive for charges, negative for payments
    pub amount: Decimal,

    /// Due date: the charge's own for Charge entries, the settled
    /// charge's for allocation-produced Payment entries
    pub due_date: Option<NaiveDate>,

    /// Links Payment entries back to their payment
    pub payment: Option<PaymentId>,

    /// Links Charge entries back to their charge
    pub charge: Option<ChargeId>,

    /// Unsettled portion; only meaningful for Charge entries
    pub remaining_amount: Option<Decimal>,
}

/// Revenue or cost side of a P&L posting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PnlSide {
    Revenue,
    Cost,
}

impl fmt::Display for PnlSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PnlSide::Revenue => "Revenue",
            PnlSide::Cost => "Cost",
        })
    }
}

/// A derived revenue/cost posting for fleet profitability reporting
///
/// Payment-derived rows carry the originating payment id and are unique
/// per (payment, category); manually entered rows (acquisition costs,
/// disposal proceeds) have no payment id and survive ledger reprocessing.
#[derive(Debug, Clone, PartialEq)]
pub struct PnlEntry {
    /// Unique P&L entry identifier
    pub id: PnlId,

    /// Vehicle the economics attach to, if known
    pub vehicle: Option<VehicleId>,

    /// Customer, for payment-derived rows
    pub customer: Option<CustomerId>,

    /// Date of the economic event
    pub entry_date: NaiveDate,

    /// Revenue or cost
    pub side: PnlSide,

    /// Economic category of the posting
    pub category: EntryCategory,

    /// Posted amount; always positive, the side carries the direction
    pub amount: Decimal,

    /// Originating payment for payment-derived rows
    pub payment: Option<PaymentId>,

    /// Free-form provenance reference for audit purposes
    pub source_ref: String,
}
