//! Types module
//!
//! Contains core data structures used throughout the engine.
//! This module organizes types into logical submodules:
//! - `charge`: charges and identifier aliases
//! - `payment`: payments and payment applications
//! - `entry`: ledger and P&L entry rows
//! - `error`: error types for the fleet ledger

pub mod charge;
pub mod entry;
pub mod error;
pub mod payment;

pub use charge::{Charge, ChargeCategory, ChargeId, CustomerId, RentalId, VehicleId};
pub use entry::{EntryCategory, EntryId, EntryType, LedgerEntry, PnlEntry, PnlId, PnlSide};
pub use error::LedgerError;
pub use payment::{
    ApplicationId, Payment, PaymentApplication, PaymentId, PaymentMethod, PaymentType,
};
