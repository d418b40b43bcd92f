//! Error types for the fleet ledger
//!
//! This module defines all error types that can occur while recording
//! charges and payments, allocating payments, and rebuilding the ledger.
//!
//! # Error Categories
//!
//! - **Lookup Errors**: payment or charge missing
//! - **Validation Errors**: non-positive amounts, duplicate identifiers
//! - **Integrity Errors**: uniqueness-constraint violations, over-application,
//!   arithmetic overflow
//! - **Operational Errors**: maintenance lock held, reprocessing aborted,
//!   storage/lock failure
//! - **I/O Errors**: CSV boundary failures
//!
//! The deliberate idempotent no-op (re-applying an already processed
//! payment) is *not* an error; it is surfaced as a flag on the apply
//! outcome.

use rust_decimal::Decimal;
use thiserror::Error;

use super::charge::{ChargeId, CustomerId};
use super::entry::EntryCategory;
use super::payment::PaymentId;

/// Main error type for the fleet ledger engine
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LedgerError {
    /// Payment id does not exist
    #[error("Payment {payment} not found")]
    PaymentNotFound {
        /// The missing payment id
        payment: PaymentId,
    },

    /// Charge id does not exist
    #[error("Charge {charge} not found")]
    ChargeNotFound {
        /// The missing charge id
        charge: ChargeId,
    },

    /// Payment amount is not strictly positive
    #[error("Invalid amount {amount} for payment {payment}")]
    InvalidPayment {
        /// Offending payment id
        payment: PaymentId,
        /// The non-positive amount
        amount: Decimal,
    },

    /// Charge amount is not strictly positive
    #[error("Invalid charge amount {amount}")]
    InvalidCharge {
        /// The non-positive amount
        amount: Decimal,
    },

    /// P&L posting amount is not strictly positive
    #[error("Invalid P&L amount {amount}")]
    InvalidPnlAmount {
        /// The non-positive amount
        amount: Decimal,
    },

    /// A payment with this id has already been recorded
    #[error("Duplicate payment id {payment}")]
    DuplicatePayment {
        /// The duplicated payment id
        payment: PaymentId,
    },

    /// A charge with this id has already been recorded
    #[error("Duplicate charge id {charge}")]
    DuplicateCharge {
        /// The duplicated charge id
        charge: ChargeId,
    },

    /// The store-level uniqueness constraint on payment-derived rows fired
    ///
    /// This closes the race between the engine's idempotency pre-check and
    /// the actual write: a second allocation attempt for the same payment
    /// cannot insert duplicate ledger or P&L rows.
    #[error("Ledger rows for payment {payment} in category {category} already exist")]
    DuplicateEntry {
        /// Payment whose rows collided
        payment: PaymentId,
        /// Category of the colliding rows
        category: EntryCategory,
    },

    /// Application would push a charge's settled total past its original amount
    #[error(
        "Cannot apply {requested} to charge {charge}: only {remaining} remaining"
    )]
    OverApplication {
        /// Charge that would be over-settled
        charge: ChargeId,
        /// Unsettled portion of the charge
        remaining: Decimal,
        /// Amount the caller tried to apply
        requested: Decimal,
    },

    /// Charge deletion rejected because payments have been applied to it
    #[error("Charge {charge} has payment applications and cannot be deleted")]
    ChargeHasApplications {
        /// The referenced charge id
        charge: ChargeId,
    },

    /// A maintenance reprocess holds the ledger; retry once it completes
    #[error("Ledger maintenance is in progress; retry later")]
    MaintenanceInProgress,

    /// Arithmetic overflow would corrupt monetary state
    #[error("Arithmetic overflow in {operation} for customer {customer}")]
    ArithmeticOverflow {
        /// Operation that would overflow
        operation: String,
        /// Customer whose state was being updated
        customer: CustomerId,
    },

    /// Full-replay reprocessing aborted; the ledger was rolled back intact
    #[error("Reprocessing aborted at payment {payment}: {cause}")]
    ReprocessFailed {
        /// Payment whose replay failed
        payment: PaymentId,
        /// Underlying failure
        cause: Box<LedgerError>,
    },

    /// Underlying storage or lock failure; nothing was committed
    #[error("Transaction failure: {message}")]
    TransactionFailure {
        /// Description of the failure
        message: String,
    },

    /// I/O error at the CSV boundary
    #[error("I/O error: {message}")]
    IoError {
        /// Description of the I/O error
        message: String,
    },

    /// CSV parsing error at the ingest boundary
    #[error("CSV parse error{}: {message}", line.map(|l| format!(" at line {}", l)).unwrap_or_default())]
    ParseError {
        /// Line number where the error occurred (if available)
        line: Option<u64>,
        /// Description of the parsing error
        message: String,
    },
}

impl From<std::io::Error> for LedgerError {
    fn from(error: std::io::Error) -> Self {
        LedgerError::IoError {
            message: error.to_string(),
        }
    }
}

impl From<csv::Error> for LedgerError {
    fn from(error: csv::Error) -> Self {
        let line = error.position().map(|pos| pos.line());

        LedgerError::ParseError {
            line,
            message: error.to_string(),
        }
    }
}

// Helper functions for creating common errors

impl LedgerError {
    /// Create a PaymentNotFound error
    pub fn payment_not_found(payment: PaymentId) -> Self {
        LedgerError::PaymentNotFound { payment }
    }

    /// Create a ChargeNotFound error
    pub fn charge_not_found(charge: ChargeId) -> Self {
        LedgerError::ChargeNotFound { charge }
    }

    /// Create an InvalidPayment error
    pub fn invalid_payment(payment: PaymentId, amount: Decimal) -> Self {
        LedgerError::InvalidPayment { payment, amount }
    }

    /// Create an InvalidCharge error
    pub fn invalid_charge(amount: Decimal) -> Self {
        LedgerError::InvalidCharge { amount }
    }

    /// Create a DuplicatePayment error
    pub fn duplicate_payment(payment: PaymentId) -> Self {
        LedgerError::DuplicatePayment { payment }
    }

    /// Create a DuplicateCharge error
    pub fn duplicate_charge(charge: ChargeId) -> Self {
        LedgerError::DuplicateCharge { charge }
    }

    /// Create a DuplicateEntry error
    pub fn duplicate_entry(payment: PaymentId, category: EntryCategory) -> Self {
        LedgerError::DuplicateEntry { payment, category }
    }

    /// Create an OverApplication error
    pub fn over_application(charge: ChargeId, remaining: Decimal, requested: Decimal) -> Self {
        LedgerError::OverApplication {
            charge,
            remaining,
            requested,
        }
    }

    /// Create a ChargeHasApplications error
    pub fn charge_has_applications(charge: ChargeId) -> Self {
        LedgerError::ChargeHasApplications { charge }
    }

    /// Create an ArithmeticOverflow error
    pub fn arithmetic_overflow(operation: &str, customer: CustomerId) -> Self {
        LedgerError::ArithmeticOverflow {
            operation: operation.to_string(),
            customer,
        }
    }

    /// Create a ReprocessFailed error wrapping the per-payment cause
    pub fn reprocess_failed(payment: PaymentId, cause: LedgerError) -> Self {
        LedgerError::ReprocessFailed {
            payment,
            cause: Box::new(cause),
        }
    }

    /// Create a TransactionFailure error
    pub fn transaction_failure(message: &str) -> Self {
        LedgerError::TransactionFailure {
            message: message.to_string(),
        }
    }
}
