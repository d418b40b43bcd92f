//! Payment allocation and ledger orchestration
//!
//! This module provides the `LedgerEngine` that turns raw customer
//! payments into ledger postings, P&L rows, and charge settlements by
//! coordinating the ChargeBook, PaymentStore, and Ledger components.
//!
//! The engine enforces the business rules of the subsystem:
//! - At-most-once processing per payment (idempotency key: payment id)
//! - FIFO allocation: the oldest open obligation is settled first
//! - Initial fees and other direct payments post straight to revenue,
//!   never against charges
//! - Every multi-row write is staged, validated, and committed as a unit;
//!   a failed commit rolls back to the pre-call state
//!
//! # Residual Credit
//!
//! A rental payment larger than the customer's open obligations leaves
//! the residual unapplied. The residual is inert: it shows up as
//! `payment_remaining`, posts nothing, and is only consumed when a later
//! maintenance replay finds charges created after the payment.

use crate::core::charge_book::ChargeBook;
use crate::core::ledger::{Ledger, PnlSummaryRow};
use crate::core::payment_store::PaymentStore;
use crate::types::{
    Charge, ChargeCategory, ChargeId, CustomerId, EntryCategory, EntryType, LedgerEntry,
    LedgerError, Payment, PaymentApplication, PaymentId, PaymentMethod, PaymentType, PnlEntry,
    PnlId, PnlSide, RentalId, VehicleId,
};
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashSet};
use std::time::Instant;
use tracing::{info, warn};

/// Result of applying one payment
///
/// Re-applying an already processed payment returns the rows produced by
/// the first run, flagged with `already_processed`, and mutates nothing.
#[derive(Debug, Clone, PartialEq)]
pub struct ApplyOutcome {
    /// Payment that was applied
    pub payment: PaymentId,

    /// True when this call was an idempotent no-op
    pub already_processed: bool,

    /// Applications joining the payment to the charges it settled
    pub applications: Vec<PaymentApplication>,

    /// Ledger rows produced by the payment
    pub ledger_entries: Vec<LedgerEntry>,

    /// P&L rows produced by the payment
    pub pnl_entries: Vec<PnlEntry>,
}

impl ApplyOutcome {
    /// Total amount applied against charges
    pub fn total_applied(&self) -> Decimal {
        self.applications
            .iter()
            .map(|application| application.amount_applied)
            .sum()
    }
}

/// Result of a full ledger rebuild
#[derive(Debug, Clone, PartialEq)]
pub struct ReprocessSummary {
    /// Payments replayed
    pub payments_processed: usize,

    /// Distinct customers among the replayed payments
    pub customers_affected: usize,

    /// Total amount applied against charges across the replay
    pub total_credit_applied: Decimal,

    /// Wall-clock duration of the rebuild
    pub duration_seconds: f64,
}

/// One staged portion of an allocation: a charge and the amount the
/// payment will consume against it
#[derive(Debug, Clone)]
struct StagedPortion {
    charge: ChargeId,
    category: EntryCategory,
    due_date: NaiveDate,
    amount: Decimal,
}

/// A fully validated allocation, ready to commit
#[derive(Debug, Clone)]
struct StagedAllocation {
    portions: Vec<StagedPortion>,
    /// Direct revenue category for initial-fee / other payments
    direct: Option<EntryCategory>,
    /// P&L totals per category
    totals: BTreeMap<EntryCategory, Decimal>,
}

/// Payment allocation and ledger engine
///
/// Owns the charge, payment, and ledger tables and exposes the
/// subsystem's operations. All state is in memory; the service layer
/// provides locking, and callers persist via whatever storage hosts the
/// engine.
#[derive(Debug, Clone)]
pub struct LedgerEngine {
    charges: ChargeBook,
    payments: PaymentStore,
    ledger: Ledger,
}

impl Default for LedgerEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl LedgerEngine {
    /// Create an engine with empty tables
    pub fn new() -> Self {
        LedgerEngine {
            charges: ChargeBook::new(),
            payments: PaymentStore::new(),
            ledger: Ledger::new(),
        }
    }

    // ---------------------------------------------------------------
    // Charge scheduling
    // ---------------------------------------------------------------

    /// Schedule a charge, assigning the next free id
    ///
    /// Posts the charge's ledger row immediately. No payment-side row and
    /// no P&L row is created, and the balance calculator's due-date filter
    /// keeps future rental charges out of the customer's position, so
    /// scheduling ahead never inflates a balance.
    ///
    /// # Errors
    ///
    /// Returns `InvalidCharge` if `amount` is not strictly positive.
    #[allow(clippy::too_many_arguments)]
    pub fn create_charge(
        &mut self,
        customer: CustomerId,
        vehicle: VehicleId,
        rental: Option<RentalId>,
        category: ChargeCategory,
        due_date: NaiveDate,
        amount: Decimal,
    ) -> Result<Charge, LedgerError> {
        let charge = Charge::new(
            self.charges.next_id(),
            customer,
            vehicle,
            rental,
            category,
            due_date,
            amount,
        );
        self.insert_charge(charge.clone())?;
        Ok(charge)
    }

    /// Register a charge that already carries an id (e.g. CSV ingest)
    ///
    /// # Errors
    ///
    /// Returns `InvalidCharge` for a non-positive amount or a charge with
    /// part of it already settled, and `DuplicateCharge` for a reused id.
    pub fn insert_charge(&mut self, charge: Charge) -> Result<(), LedgerError> {
        if charge.original_amount <= Decimal::ZERO
            || charge.remaining_amount != charge.original_amount
        {
            return Err(LedgerError::invalid_charge(charge.original_amount));
        }
        self.charges.insert(charge.clone())?;
        self.ledger.post_charge(&charge);
        info!(
            charge = charge.id,
            customer = charge.customer,
            due = %charge.due_date,
            amount = %charge.original_amount,
            "charge scheduled"
        );
        Ok(())
    }

    /// Delete a never-paid charge and its ledger row
    ///
    /// # Errors
    ///
    /// Returns `ChargeHasApplications` once any payment has been applied
    /// to the charge (deleting would orphan the application rows), or
    /// `ChargeNotFound` for an unknown id.
    pub fn remove_charge(&mut self, charge: ChargeId) -> Result<Charge, LedgerError> {
        if self.charges.get(charge).is_none() {
            return Err(LedgerError::charge_not_found(charge));
        }
        if self.payments.charge_has_applications(charge) {
            return Err(LedgerError::charge_has_applications(charge));
        }
        let removed = self.charges.remove(charge)?;
        self.ledger.remove_charge(charge);
        Ok(removed)
    }

    // ---------------------------------------------------------------
    // Payment recording
    // ---------------------------------------------------------------

    /// Record a payment event, assigning the next free id
    ///
    /// Recording never allocates; processing is a separate, explicitly
    /// invoked step.
    ///
    /// # Errors
    ///
    /// Returns `InvalidPayment` if `amount` is not strictly positive.
    #[allow(clippy::too_many_arguments)]
    pub fn record_payment(
        &mut self,
        customer: CustomerId,
        vehicle: Option<VehicleId>,
        rental: Option<RentalId>,
        payment_type: PaymentType,
        method: PaymentMethod,
        payment_date: NaiveDate,
        amount: Decimal,
    ) -> Result<Payment, LedgerError> {
        let payment = Payment {
            id: self.payments.next_id(),
            customer,
            vehicle,
            rental,
            payment_type,
            method,
            payment_date,
            amount,
        };
        self.insert_payment(payment.clone())?;
        Ok(payment)
    }

    /// Register a payment that already carries an id (e.g. CSV ingest)
    ///
    /// # Errors
    ///
    /// Returns `InvalidPayment` for a non-positive amount and
    /// `DuplicatePayment` for a reused id.
    pub fn insert_payment(&mut self, payment: Payment) -> Result<(), LedgerError> {
        if payment.amount <= Decimal::ZERO {
            return Err(LedgerError::invalid_payment(payment.id, payment.amount));
        }
        self.payments.insert(payment)
    }

    // ---------------------------------------------------------------
    // Allocation
    // ---------------------------------------------------------------

    /// Apply a payment: allocate it against open charges and post the
    /// ledger and P&L rows
    ///
    /// At-most-once per payment id: if rows for the payment already
    /// exist, the existing rows are returned without mutation. The whole
    /// write set (charge decrements, applications, ledger rows, P&L rows)
    /// commits as a unit or not at all.
    ///
    /// # Errors
    ///
    /// Returns `PaymentNotFound` for an unknown id and `InvalidPayment`
    /// for a non-positive amount. Any commit failure rolls back and
    /// surfaces the underlying error.
    pub fn apply_payment(&mut self, payment_id: PaymentId) -> Result<ApplyOutcome, LedgerError> {
        let payment = self
            .payments
            .get(payment_id)
            .ok_or_else(|| LedgerError::payment_not_found(payment_id))?
            .clone();

        if payment.amount <= Decimal::ZERO {
            return Err(LedgerError::invalid_payment(payment_id, payment.amount));
        }

        if self.ledger.payment_posted(payment_id) {
            info!(payment = payment_id, "payment already processed; returning existing rows");
            return Ok(ApplyOutcome {
                payment: payment_id,
                already_processed: true,
                applications: self
                    .payments
                    .applications_for_payment(payment_id)
                    .into_iter()
                    .cloned()
                    .collect(),
                ledger_entries: self.ledger.entries_for_payment(payment_id),
                pnl_entries: self.ledger.pnl_for_payment(payment_id),
            });
        }

        let staged = self.stage(&payment)?;
        self.commit(&payment, staged)
    }

    /// Plan the allocation without touching any table
    fn stage(&self, payment: &Payment) -> Result<StagedAllocation, LedgerError> {
        let mut totals: BTreeMap<EntryCategory, Decimal> = BTreeMap::new();

        match payment.payment_type {
            PaymentType::InitialFee | PaymentType::Other => {
                // Direct company revenue: no charge is touched.
                let category = if payment.payment_type == PaymentType::InitialFee {
                    EntryCategory::InitialFees
                } else {
                    EntryCategory::Other
                };
                totals.insert(category, payment.amount);
                Ok(StagedAllocation {
                    portions: Vec::new(),
                    direct: Some(category),
                    totals,
                })
            }
            PaymentType::Rental => {
                let mut remaining = payment.amount;
                let mut portions = Vec::new();

                for charge in self.charges.open_for_customer(payment.customer) {
                    if remaining <= Decimal::ZERO {
                        break;
                    }
                    let amount = remaining.min(charge.remaining_amount);
                    remaining = remaining.checked_sub(amount).ok_or_else(|| {
                        LedgerError::arithmetic_overflow("allocate", payment.customer)
                    })?;

                    let category: EntryCategory = charge.category.into();
                    let total = totals.entry(category).or_insert(Decimal::ZERO);
                    *total = total.checked_add(amount).ok_or_else(|| {
                        LedgerError::arithmetic_overflow("allocate", payment.customer)
                    })?;

                    portions.push(StagedPortion {
                        charge: charge.id,
                        category,
                        due_date: charge.due_date,
                        amount,
                    });
                }

                if remaining > Decimal::ZERO {
                    warn!(
                        payment = payment.id,
                        customer = payment.customer,
                        residual = %remaining,
                        "payment not fully applied; residual remains as customer credit"
                    );
                }

                Ok(StagedAllocation {
                    portions,
                    direct: None,
                    totals,
                })
            }
        }
    }

    /// Commit a staged allocation, rolling back the whole write set on
    /// any failure
    fn commit(
        &mut self,
        payment: &Payment,
        staged: StagedAllocation,
    ) -> Result<ApplyOutcome, LedgerError> {
        let ledger_checkpoint = self.ledger.checkpoint();
        let applications_checkpoint = self.payments.application_count();
        let charge_backups: Vec<Charge> = staged
            .portions
            .iter()
            .filter_map(|portion| self.charges.get(portion.charge).cloned())
            .collect();

        match self.write_rows(payment, &staged) {
            Ok(outcome) => {
                info!(
                    payment = payment.id,
                    customer = payment.customer,
                    charges_settled = outcome.applications.len(),
                    applied = %outcome.total_applied(),
                    "payment applied"
                );
                Ok(outcome)
            }
            Err(error) => {
                self.ledger.rollback(ledger_checkpoint);
                self.payments.truncate_applications(applications_checkpoint);
                for charge in charge_backups {
                    self.ledger
                        .sync_charge_remaining(charge.id, charge.remaining_amount);
                    self.charges.restore(charge);
                }
                Err(error)
            }
        }
    }

    fn write_rows(
        &mut self,
        payment: &Payment,
        staged: &StagedAllocation,
    ) -> Result<ApplyOutcome, LedgerError> {
        let mut applications = Vec::new();

        for portion in &staged.portions {
            let remaining = self.charges.apply(portion.charge, portion.amount)?;
            self.ledger.sync_charge_remaining(portion.charge, remaining);
            applications.push(self.payments.add_application(
                payment.id,
                portion.charge,
                portion.amount,
            ));
            self.ledger.post_payment(
                payment,
                portion.category,
                portion.amount,
                Some(portion.due_date),
                Some(portion.charge),
            )?;
        }

        if let Some(category) = staged.direct {
            self.ledger
                .post_payment(payment, category, payment.amount, None, None)?;
        }

        for (&category, &total) in &staged.totals {
            self.ledger.post_pnl(
                payment.vehicle,
                Some(payment.customer),
                payment.payment_date,
                PnlSide::Revenue,
                category,
                total,
                Some(payment.id),
                format!("payment:{}", payment.id),
            )?;
        }

        Ok(ApplyOutcome {
            payment: payment.id,
            already_processed: false,
            applications,
            ledger_entries: self.ledger.entries_for_payment(payment.id),
            pnl_entries: self.ledger.pnl_for_payment(payment.id),
        })
    }

    // ---------------------------------------------------------------
    // Balance calculation
    // ---------------------------------------------------------------

    /// Signed net position of a customer as of a cut-off date
    ///
    /// Sums the customer's ledger rows, excluding rows whose payment is an
    /// initial fee (company revenue, never customer debt) and rental
    /// charge rows not yet due. Positive means the customer owes, zero is
    /// settled, negative is prepaid credit. Labeling and rounding are the
    /// caller's concern.
    pub fn customer_balance_as_of(&self, customer: CustomerId, as_of: NaiveDate) -> Decimal {
        self.ledger
            .entries_for_customer(customer)
            .into_iter()
            .filter(|entry| self.balance_includes(entry, as_of))
            .map(|entry| entry.amount)
            .sum()
    }

    /// Signed net position of a customer as of today
    pub fn customer_net_position(&self, customer: CustomerId) -> Decimal {
        self.customer_balance_as_of(customer, Utc::now().date_naive())
    }

    fn balance_includes(&self, entry: &LedgerEntry, as_of: NaiveDate) -> bool {
        if let Some(payment_id) = entry.payment {
            if let Some(payment) = self.payments.get(payment_id) {
                if payment.payment_type == PaymentType::InitialFee {
                    return false;
                }
            }
        }
        if entry.entry_type == EntryType::Charge && entry.category == EntryCategory::Rental {
            if let Some(due_date) = entry.due_date {
                if due_date > as_of {
                    return false;
                }
            }
        }
        true
    }

    // ---------------------------------------------------------------
    // Maintenance reprocessing
    // ---------------------------------------------------------------

    /// Rebuild every allocation from scratch
    ///
    /// Deletes all payment-derived rows (applications, payment ledger
    /// rows, payment-derived P&L rows), resets every charge to unsettled,
    /// and replays all payments ordered by payment date then id. Safe to
    /// run repeatedly: two consecutive runs yield identical tables.
    ///
    /// # Errors
    ///
    /// Returns `ReprocessFailed` naming the first payment whose replay
    /// failed; the ledger is restored to its pre-call state.
    pub fn reapply_all_payments(&mut self) -> Result<ReprocessSummary, LedgerError> {
        let started = Instant::now();
        let snapshot = self.clone();

        self.payments.clear_applications();
        self.ledger.clear_payment_rows();
        self.charges.reset_remaining();
        let reopened: Vec<(ChargeId, Decimal)> = self
            .charges
            .all_charges()
            .iter()
            .map(|charge| (charge.id, charge.remaining_amount))
            .collect();
        for (charge, remaining) in reopened {
            self.ledger.sync_charge_remaining(charge, remaining);
        }

        let order: Vec<PaymentId> = self
            .payments
            .chronological()
            .iter()
            .map(|payment| payment.id)
            .collect();

        let mut customers: HashSet<CustomerId> = HashSet::new();
        let mut total_credit_applied = Decimal::ZERO;

        for payment_id in &order {
            let customer = self
                .payments
                .get(*payment_id)
                .map(|payment| payment.customer);
            match self.apply_payment(*payment_id) {
                Ok(outcome) => {
                    if let Some(customer) = customer {
                        customers.insert(customer);
                    }
                    total_credit_applied += outcome.total_applied();
                }
                Err(error) => {
                    *self = snapshot;
                    warn!(
                        payment = payment_id,
                        error = %error,
                        "reprocessing aborted; ledger restored"
                    );
                    return Err(LedgerError::reprocess_failed(*payment_id, error));
                }
            }
        }

        let summary = ReprocessSummary {
            payments_processed: order.len(),
            customers_affected: customers.len(),
            total_credit_applied,
            duration_seconds: started.elapsed().as_secs_f64(),
        };
        info!(
            payments = summary.payments_processed,
            customers = summary.customers_affected,
            applied = %summary.total_credit_applied,
            "ledger rebuilt"
        );
        Ok(summary)
    }

    // ---------------------------------------------------------------
    // Fleet P&L postings
    // ---------------------------------------------------------------

    /// Record a manually entered fleet cost (acquisition, service, ...)
    ///
    /// These rows carry no payment id and survive ledger reprocessing.
    ///
    /// # Errors
    ///
    /// Returns `InvalidPnlAmount` for a non-positive amount.
    pub fn record_fleet_cost(
        &mut self,
        vehicle: VehicleId,
        entry_date: NaiveDate,
        category: EntryCategory,
        amount: Decimal,
        source_ref: &str,
    ) -> Result<PnlId, LedgerError> {
        self.record_fleet_entry(vehicle, entry_date, PnlSide::Cost, category, amount, source_ref)
    }

    /// Record a manually entered fleet revenue (disposal proceeds, ...)
    ///
    /// # Errors
    ///
    /// Returns `InvalidPnlAmount` for a non-positive amount.
    pub fn record_fleet_revenue(
        &mut self,
        vehicle: VehicleId,
        entry_date: NaiveDate,
        category: EntryCategory,
        amount: Decimal,
        source_ref: &str,
    ) -> Result<PnlId, LedgerError> {
        self.record_fleet_entry(
            vehicle,
            entry_date,
            PnlSide::Revenue,
            category,
            amount,
            source_ref,
        )
    }

    fn record_fleet_entry(
        &mut self,
        vehicle: VehicleId,
        entry_date: NaiveDate,
        side: PnlSide,
        category: EntryCategory,
        amount: Decimal,
        source_ref: &str,
    ) -> Result<PnlId, LedgerError> {
        if amount <= Decimal::ZERO {
            return Err(LedgerError::InvalidPnlAmount { amount });
        }
        self.ledger.post_pnl(
            Some(vehicle),
            None,
            entry_date,
            side,
            category,
            amount,
            None,
            source_ref.to_string(),
        )
    }

    // ---------------------------------------------------------------
    // Queries
    // ---------------------------------------------------------------

    /// Look up a charge
    pub fn charge(&self, charge: ChargeId) -> Option<&Charge> {
        self.charges.get(charge)
    }

    /// Look up a payment
    pub fn payment(&self, payment: PaymentId) -> Option<&Payment> {
        self.payments.get(payment)
    }

    /// The customer's open charges in FIFO settlement order
    pub fn open_charges(&self, customer: CustomerId) -> Vec<&Charge> {
        self.charges.open_for_customer(customer)
    }

    /// Unapplied portion of a payment (available customer credit)
    ///
    /// # Errors
    ///
    /// Returns `PaymentNotFound` for an unknown id.
    pub fn payment_remaining(&self, payment: PaymentId) -> Result<Decimal, LedgerError> {
        let stored = self
            .payments
            .get(payment)
            .ok_or_else(|| LedgerError::payment_not_found(payment))?;
        Ok(stored.amount - self.payments.total_applied(payment))
    }

    /// Distinct customers with ledger rows, sorted
    pub fn customers(&self) -> Vec<CustomerId> {
        self.ledger.customers()
    }

    /// Full ledger table, in posting order
    pub fn ledger_entries(&self) -> &[LedgerEntry] {
        self.ledger.entries()
    }

    /// Full P&L table, in posting order
    pub fn pnl_entries(&self) -> &[PnlEntry] {
        self.ledger.pnl_entries()
    }

    /// Per-(vehicle, category) P&L totals
    pub fn pnl_summary(&self) -> Vec<PnlSummaryRow> {
        self.ledger.pnl_summary()
    }
}
