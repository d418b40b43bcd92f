//! Payment and application storage
//!
//! This module provides the `PaymentStore` component that records customer
//! payment events and the applications joining each payment to the charges
//! it settled. Payments are immutable once recorded; the applications are
//! rewritten wholesale during a maintenance rebuild.
//!
//! # Duplicate Handling
//!
//! Payment ids must be unique. A second insert with the same id is
//! rejected with `DuplicatePayment` so data-entry retries cannot silently
//! shadow an earlier payment.

use crate::types::{
    ChargeId, CustomerId, LedgerError, Payment, PaymentApplication, PaymentId,
};
use rust_decimal::Decimal;
use std::collections::HashMap;

/// Stores payments and their applications to charges
#[derive(Debug, Clone)]
pub struct PaymentStore {
    /// Map of payment ids to payments
    payments: HashMap<PaymentId, Payment>,
    /// Applications in insertion order
    applications: Vec<PaymentApplication>,
    /// Highest payment id handed out so far
    max_id: PaymentId,
    /// Next application id
    next_application_id: u64,
}

impl PaymentStore {
    /// Create a new empty store
    pub fn new() -> Self {
        PaymentStore {
            payments: HashMap::new(),
            applications: Vec::new(),
            max_id: 0,
            next_application_id: 1,
        }
    }

    /// Next free payment id
    pub fn next_id(&self) -> PaymentId {
        self.max_id + 1
    }

    /// Record a payment event
    ///
    /// # Errors
    ///
    /// Returns `DuplicatePayment` if a payment with the same id already
    /// exists; the existing payment is left untouched.
    pub fn insert(&mut self, payment: Payment) -> Result<(), LedgerError> {
        if self.payments.contains_key(&payment.id) {
            return Err(LedgerError::duplicate_payment(payment.id));
        }
        self.max_id = self.max_id.max(payment.id);
        self.payments.insert(payment.id, payment);
        Ok(())
    }

    /// Look up a payment by id
    pub fn get(&self, payment: PaymentId) -> Option<&Payment> {
        self.payments.get(&payment)
    }

    /// All payments in deterministic replay order
    ///
    /// Ordered by payment date ascending, payment id (creation order)
    /// breaking same-date ties. Replaying in this order reproduces the
    /// same allocations as live processing, because the set of open
    /// charges each payment sees depends on every payment before it.
    pub fn chronological(&self) -> Vec<&Payment> {
        let mut payments: Vec<&Payment> = self.payments.values().collect();
        payments.sort_by_key(|payment| (payment.payment_date, payment.id));
        payments
    }

    /// Record an application of a payment to a charge
    pub fn add_application(
        &mut self,
        payment: PaymentId,
        charge: ChargeId,
        amount_applied: Decimal,
    ) -> PaymentApplication {
        let application = PaymentApplication {
            id: self.next_application_id,
            payment,
            charge,
            amount_applied,
        };
        self.next_application_id += 1;
        self.applications.push(application.clone());
        application
    }

    /// Applications made by a payment
    pub fn applications_for_payment(&self, payment: PaymentId) -> Vec<&PaymentApplication> {
        self.applications
            .iter()
            .filter(|application| application.payment == payment)
            .collect()
    }

    /// Applications made against a charge
    pub fn applications_for_charge(&self, charge: ChargeId) -> Vec<&PaymentApplication> {
        self.applications
            .iter()
            .filter(|application| application.charge == charge)
            .collect()
    }

    /// Whether any payment has been applied to the charge
    pub fn charge_has_applications(&self, charge: ChargeId) -> bool {
        self.applications
            .iter()
            .any(|application| application.charge == charge)
    }

    /// Total amount a payment has applied to charges so far
    pub fn total_applied(&self, payment: PaymentId) -> Decimal {
        self.applications
            .iter()
            .filter(|application| application.payment == payment)
            .map(|application| application.amount_applied)
            .sum()
    }

    /// Distinct customers that have recorded payments
    pub fn customers(&self) -> Vec<CustomerId> {
        let mut customers: Vec<CustomerId> =
            self.payments.values().map(|payment| payment.customer).collect();
        customers.sort_unstable();
        customers.dedup();
        customers
    }

    /// Truncate the application table back to `len` rows
    ///
    /// Used by the engine's commit rollback.
    pub fn truncate_applications(&mut self, len: usize) {
        self.applications.truncate(len);
    }

    /// Number of application rows
    pub fn application_count(&self) -> usize {
        self.applications.len()
    }

    /// Delete every application row
    ///
    /// The payment-side teardown step of a full ledger rebuild; the
    /// payments themselves are kept and replayed. The id counter rewinds
    /// so replays number applications deterministically.
    pub fn clear_applications(&mut self) {
        self.applications.clear();
        self.next_application_id = 1;
    }
}

impl Default for PaymentStore {
    fn default() -> Self {
        Self::new()
    }
}
