//! Fleet Ledger Engine Library
//! # Overview
//!
//! This library implements the payment ledger and allocation engine of a
//! fleet-rental back office: it turns raw customer payments into ledger
//! postings, allocates cash against outstanding charges in deterministic
//! FIFO order, derives profit-and-loss entries, and computes customer
//! balances.
//!
//! # Architecture
//!
//! The system is organized into several key components:
//!
//! - [`types`] - Core data types (Charge, Payment, LedgerEntry, etc.)
//! - [`cli`] - CLI arguments parsing
//! - [`core`] - Business logic components:
//!   - [`core::engine`] - Allocation, balance, and reprocessing orchestration
//!   - [`core::charge_book`] - Charge storage and the FIFO open-charge query
//!   - [`core::payment_store`] - Payment events and payment applications
//!   - [`core::ledger`] - Ledger/P&L posting with integrity indexes
//! - [`service`] - Thread-safe RPC-style boundary with the maintenance lock
//! - [`io`] - CSV ingest and report output
//! - [`pipeline`] - Load-apply-report orchestration for the CLI
//!
//! # Allocation Rules
//!
//! - Rental payments settle the customer's open charges oldest due date
//!   first; a residual stays unapplied as inert customer credit
//! - Initial fees and other direct payments post straight to company
//!   revenue and never count toward customer debt
//! - Processing is at-most-once per payment: re-applying returns the
//!   original rows without mutation
//!
//! # Balance Semantics
//!
//! The customer balance is the signed sum of ledger rows, excluding
//! initial-fee payments and rental charges not yet due. Positive means
//! the customer owes, zero is settled, negative is prepaid credit.

// Module declarations
pub mod cli;
pub mod core;
pub mod io;
pub mod pipeline;
pub mod service;
pub mod types;

pub use crate::core::{ApplyOutcome, LedgerEngine, PnlSummaryRow, ReprocessSummary};
pub use io::{write_balance_report, write_pnl_report};
pub use service::LedgerService;
pub use types::{
    Charge, ChargeCategory, ChargeId, CustomerId, EntryCategory, LedgerEntry, LedgerError,
    Payment, PaymentApplication, PaymentId, PaymentMethod, PaymentType, PnlEntry, RentalId,
    VehicleId,
};
