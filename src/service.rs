//! Thread-safe service boundary for the ledger engine
//!
//! This module provides `LedgerService`, the RPC-style surface callers
//! (UI, tests, the CLI) invoke. The engine itself is single-threaded; the
//! service wraps it in a reader-writer lock so concurrent callers
//! serialize correctly:
//!
//! - every ledger-affecting call takes the write lock, making each
//!   operation a single atomic unit against shared state
//! - balance and P&L queries take the read lock
//! - a maintenance reprocess raises a flag for its whole duration; while
//!   it is up, mutating calls are rejected with `MaintenanceInProgress`
//!   instead of interleaving with the rebuild
//!
//! Two concurrent `apply_payment` calls for the same payment serialize on
//! the lock and the second becomes the idempotent no-op; the store-level
//! uniqueness constraint backs this up beneath the engine's pre-check.
//!
//! The service is cheaply cloneable; clones share the same engine.

use crate::core::{ApplyOutcome, LedgerEngine, PnlSummaryRow, ReprocessSummary};
use crate::types::{
    Charge, ChargeCategory, ChargeId, CustomerId, EntryCategory, LedgerError, Payment,
    PaymentId, PaymentMethod, PaymentType, PnlId, RentalId, VehicleId,
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::info;

/// Shared, thread-safe handle to a ledger engine
#[derive(Debug, Clone, Default)]
pub struct LedgerService {
    inner: Arc<ServiceInner>,
}

#[derive(Debug, Default)]
struct ServiceInner {
    engine: RwLock<LedgerEngine>,
    maintenance: AtomicBool,
}

/// Clears the maintenance flag when the reprocess call returns,
/// successfully or not
struct MaintenanceGuard<'a> {
    flag: &'a AtomicBool,
}

impl Drop for MaintenanceGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

impl LedgerService {
    /// Create a service around an empty engine
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a service around a pre-populated engine
    pub fn with_engine(engine: LedgerEngine) -> Self {
        LedgerService {
            inner: Arc::new(ServiceInner {
                engine: RwLock::new(engine),
                maintenance: AtomicBool::new(false),
            }),
        }
    }

    /// Apply a payment against the customer's open charges
    ///
    /// Safe to call more than once per payment: repeat calls are
    /// idempotent no-ops returning the original rows.
    ///
    /// # Errors
    ///
    /// Returns `MaintenanceInProgress` while a reprocess holds the
    /// ledger, otherwise whatever the engine surfaces.
    pub fn apply_payment(&self, payment: PaymentId) -> Result<ApplyOutcome, LedgerError> {
        self.write()?.apply_payment(payment)
    }

    /// Schedule a charge
    ///
    /// # Errors
    ///
    /// Returns `MaintenanceInProgress` while a reprocess holds the
    /// ledger, otherwise whatever the engine surfaces.
    #[allow(clippy::too_many_arguments)]
    pub fn create_charge(
        &self,
        customer: CustomerId,
        vehicle: VehicleId,
        rental: Option<RentalId>,
        category: ChargeCategory,
        due_date: NaiveDate,
        amount: Decimal,
    ) -> Result<Charge, LedgerError> {
        self.write()?
            .create_charge(customer, vehicle, rental, category, due_date, amount)
    }

    /// Record a payment event without allocating it
    ///
    /// # Errors
    ///
    /// Returns `MaintenanceInProgress` while a reprocess holds the
    /// ledger, otherwise whatever the engine surfaces.
    #[allow(clippy::too_many_arguments)]
    pub fn record_payment(
        &self,
        customer: CustomerId,
        vehicle: Option<VehicleId>,
        rental: Option<RentalId>,
        payment_type: PaymentType,
        method: PaymentMethod,
        payment_date: NaiveDate,
        amount: Decimal,
    ) -> Result<Payment, LedgerError> {
        self.write()?.record_payment(
            customer,
            vehicle,
            rental,
            payment_type,
            method,
            payment_date,
            amount,
        )
    }

    /// Delete a never-paid charge
    ///
    /// # Errors
    ///
    /// Returns `MaintenanceInProgress` while a reprocess holds the
    /// ledger, otherwise whatever the engine surfaces.
    pub fn remove_charge(&self, charge: ChargeId) -> Result<Charge, LedgerError> {
        self.write()?.remove_charge(charge)
    }

    /// Record a manually entered fleet cost
    ///
    /// # Errors
    ///
    /// Returns `MaintenanceInProgress` while a reprocess holds the
    /// ledger, otherwise whatever the engine surfaces.
    pub fn record_fleet_cost(
        &self,
        vehicle: VehicleId,
        entry_date: NaiveDate,
        category: EntryCategory,
        amount: Decimal,
        source_ref: &str,
    ) -> Result<PnlId, LedgerError> {
        self.write()?
            .record_fleet_cost(vehicle, entry_date, category, amount, source_ref)
    }

    /// Rebuild every allocation by replaying payments chronologically
    ///
    /// Holds the ledger exclusively for its whole duration; competing
    /// mutating calls fail fast with `MaintenanceInProgress`.
    ///
    /// # Errors
    ///
    /// Returns `MaintenanceInProgress` if another reprocess is already
    /// running, or `ReprocessFailed` from the engine (ledger restored).
    pub fn reapply_all_payments(&self) -> Result<ReprocessSummary, LedgerError> {
        if self
            .inner
            .maintenance
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(LedgerError::MaintenanceInProgress);
        }
        let _guard = MaintenanceGuard {
            flag: &self.inner.maintenance,
        };

        info!("maintenance reprocess started");
        let mut engine = self
            .inner
            .engine
            .write()
            .map_err(|_| LedgerError::transaction_failure("ledger lock poisoned"))?;
        engine.reapply_all_payments()
    }

    /// Signed net position of a customer as of today
    ///
    /// Pure read with no side effects; callable at any time.
    ///
    /// # Errors
    ///
    /// Only fails on lock poisoning (`TransactionFailure`).
    pub fn customer_net_position(&self, customer: CustomerId) -> Result<Decimal, LedgerError> {
        Ok(self.read()?.customer_net_position(customer))
    }

    /// Signed net position of a customer as of a cut-off date
    ///
    /// # Errors
    ///
    /// Only fails on lock poisoning (`TransactionFailure`).
    pub fn customer_balance_as_of(
        &self,
        customer: CustomerId,
        as_of: NaiveDate,
    ) -> Result<Decimal, LedgerError> {
        Ok(self.read()?.customer_balance_as_of(customer, as_of))
    }

    /// Unapplied portion of a payment
    ///
    /// # Errors
    ///
    /// Returns `PaymentNotFound` for an unknown id.
    pub fn payment_remaining(&self, payment: PaymentId) -> Result<Decimal, LedgerError> {
        self.read()?.payment_remaining(payment)
    }

    /// Per-(vehicle, category) P&L totals
    ///
    /// # Errors
    ///
    /// Only fails on lock poisoning (`TransactionFailure`).
    pub fn pnl_summary(&self) -> Result<Vec<PnlSummaryRow>, LedgerError> {
        Ok(self.read()?.pnl_summary())
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, LedgerEngine>, LedgerError> {
        if self.inner.maintenance.load(Ordering::Acquire) {
            return Err(LedgerError::MaintenanceInProgress);
        }
        self.inner
            .engine
            .write()
            .map_err(|_| LedgerError::transaction_failure("ledger lock poisoned"))
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, LedgerEngine>, LedgerError> {
        self.inner
            .engine
            .read()
            .map_err(|_| LedgerError::transaction_failure("ledger lock poisoned"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::thread;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn service_with_standing_data() -> (LedgerService, Payment) {
        let service = LedgerService::new();
        service
            .create_charge(
                1,
                10,
                Some(100),
                ChargeCategory::Rental,
                date(2024, 1, 1),
                dec!(1000.00),
            )
            .unwrap();
        let payment = service
            .record_payment(
                1,
                Some(10),
                Some(100),
                PaymentType::Rental,
                PaymentMethod::Card,
                date(2024, 1, 5),
                dec!(1000.00),
            )
            .unwrap();
        (service, payment)
    }

    #[test]
    fn test_apply_and_balance_through_service() {
        let (service, payment) = service_with_standing_data();
        service.apply_payment(payment.id).unwrap();

        assert_eq!(
            service.customer_balance_as_of(1, date(2024, 1, 31)).unwrap(),
            dec!(0.00)
        );
    }

    #[test]
    fn test_clones_share_state() {
        let (service, payment) = service_with_standing_data();
        let clone = service.clone();
        clone.apply_payment(payment.id).unwrap();

        assert_eq!(service.payment_remaining(payment.id).unwrap(), dec!(0.00));
    }

    #[test]
    fn test_concurrent_applies_of_same_payment_write_once() {
        let (service, payment) = service_with_standing_data();

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let service = service.clone();
                let payment_id = payment.id;
                thread::spawn(move || service.apply_payment(payment_id))
            })
            .collect();

        let outcomes: Vec<ApplyOutcome> = handles
            .into_iter()
            .map(|handle| handle.join().unwrap().unwrap())
            .collect();

        // Exactly one call did the work; the rest were no-ops returning
        // the same rows.
        let fresh = outcomes.iter().filter(|o| !o.already_processed).count();
        assert_eq!(fresh, 1);
        for outcome in &outcomes {
            assert_eq!(outcome.applications.len(), 1);
            assert_eq!(outcome.applications[0].amount_applied, dec!(1000.00));
        }
    }

    #[test]
    fn test_reprocess_through_service() {
        let (service, payment) = service_with_standing_data();
        service.apply_payment(payment.id).unwrap();

        let summary = service.reapply_all_payments().unwrap();
        assert_eq!(summary.payments_processed, 1);
        assert_eq!(summary.customers_affected, 1);
        assert_eq!(summary.total_credit_applied, dec!(1000.00));
        assert!(summary.duration_seconds >= 0.0);

        // The flag is down again: mutating calls work.
        assert!(service
            .record_payment(
                2,
                None,
                None,
                PaymentType::Other,
                PaymentMethod::Cash,
                date(2024, 2, 1),
                dec!(50.00),
            )
            .is_ok());
    }

    #[test]
    fn test_pnl_summary_through_service() {
        let (service, payment) = service_with_standing_data();
        service.apply_payment(payment.id).unwrap();
        service
            .record_fleet_cost(
                10,
                date(2024, 1, 2),
                EntryCategory::Service,
                dec!(150.00),
                "workshop invoice",
            )
            .unwrap();

        let summary = service.pnl_summary().unwrap();
        assert_eq!(summary.len(), 2);
    }
}
