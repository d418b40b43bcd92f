//! Ledger and P&L posting store
//!
//! This module provides the `Ledger` component: the append-only tables of
//! ledger entries (the single source of truth for customer debt) and P&L
//! entries (derived revenue/cost rows for fleet profitability reporting).
//!
//! # Uniqueness Constraint
//!
//! Payment-derived rows are guarded by an index inside the insert path:
//! ledger rows are unique per (payment, category, settled charge) and P&L
//! rows per (payment, category). A second allocation attempt for the same
//! payment therefore cannot write duplicates even if it slips past the
//! engine's idempotency pre-check: the constraint lives in the data
//! layer, closing the race between check and write.
//!
//! # Row Lifecycle
//!
//! Charge rows are posted when a charge is scheduled and live forever;
//! only their remaining-amount mirror changes as payments are applied.
//! Payment rows and payment-derived P&L rows are deleted and rebuilt
//! wholesale by the maintenance reprocessor. Manually entered P&L rows
//! (acquisition costs, disposal proceeds) carry no payment id and survive
//! a rebuild untouched.

use crate::types::{
    Charge, ChargeId, CustomerId, EntryCategory, EntryId, EntryType, LedgerEntry, LedgerError,
    Payment, PaymentId, PnlEntry, PnlId, PnlSide, VehicleId,
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashMap, HashSet};

/// Aggregated P&L totals for one (vehicle, category) cell
#[derive(Debug, Clone, PartialEq)]
pub struct PnlSummaryRow {
    /// Vehicle the totals attach to; `None` collects unattributed rows
    pub vehicle: Option<VehicleId>,
    /// Economic category
    pub category: EntryCategory,
    /// Sum of revenue-side amounts
    pub revenue: Decimal,
    /// Sum of cost-side amounts
    pub cost: Decimal,
}

impl PnlSummaryRow {
    /// Revenue minus cost
    pub fn net(&self) -> Decimal {
        self.revenue - self.cost
    }
}

/// The ledger and P&L tables with their integrity indexes
#[derive(Debug, Clone)]
pub struct Ledger {
    /// Ledger entries in posting order
    entries: Vec<LedgerEntry>,
    /// P&L entries in posting order
    pnl: Vec<PnlEntry>,
    /// Position of each charge's ledger row, for remaining-amount updates
    charge_rows: HashMap<ChargeId, usize>,
    /// Uniqueness index for payment ledger rows
    posted_ledger: HashSet<(PaymentId, EntryCategory, Option<ChargeId>)>,
    /// Uniqueness index for payment-derived P&L rows
    posted_pnl: HashSet<(PaymentId, EntryCategory)>,
    /// Payments with at least one ledger row, for the idempotency check
    posted_payments: HashSet<PaymentId>,
    /// Next ledger entry id
    next_entry_id: EntryId,
    /// Next P&L entry id
    next_pnl_id: PnlId,
}

impl Ledger {
    /// Create an empty ledger
    pub fn new() -> Self {
        Ledger {
            entries: Vec::new(),
            pnl: Vec::new(),
            charge_rows: HashMap::new(),
            posted_ledger: HashSet::new(),
            posted_pnl: HashSet::new(),
            posted_payments: HashSet::new(),
            next_entry_id: 1,
            next_pnl_id: 1,
        }
    }

    /// Post the ledger row for a newly scheduled charge
    ///
    /// The row carries the charge's full amount with a positive sign and
    /// mirrors its remaining amount. No payment-side row and no P&L row is
    /// posted here; those only appear when a payment is applied.
    pub fn post_charge(&mut self, charge: &Charge) -> EntryId {
        let id = self.next_entry_id;
        self.next_entry_id += 1;
        self.charge_rows.insert(charge.id, self.entries.len());
        self.entries.push(LedgerEntry {
            id,
            customer: charge.customer,
            vehicle: Some(charge.vehicle),
            rental: charge.rental,
            entry_type: EntryType::Charge,
            category: charge.category.into(),
            amount: charge.original_amount,
            due_date: Some(charge.due_date),
            payment: None,
            charge: Some(charge.id),
            remaining_amount: Some(charge.remaining_amount),
        });
        id
    }

    /// Post a payment row
    ///
    /// `amount` is the positive portion consumed; the row is stored with a
    /// negative sign per the system's convention. For allocation rows,
    /// `charge` and `due_date` name the charge that was settled; direct
    /// revenue rows (initial fees) leave both empty.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateEntry` if a row for the same
    /// (payment, category, charge) already exists.
    pub fn post_payment(
        &mut self,
        payment: &Payment,
        category: EntryCategory,
        amount: Decimal,
        due_date: Option<NaiveDate>,
        charge: Option<ChargeId>,
    ) -> Result<EntryId, LedgerError> {
        let key = (payment.id, category, charge);
        if !self.posted_ledger.insert(key) {
            return Err(LedgerError::duplicate_entry(payment.id, category));
        }
        self.posted_payments.insert(payment.id);

        let id = self.next_entry_id;
        self.next_entry_id += 1;
        self.entries.push(LedgerEntry {
            id,
            customer: payment.customer,
            vehicle: payment.vehicle,
            rental: payment.rental,
            entry_type: EntryType::Payment,
            category,
            amount: -amount,
            due_date,
            payment: Some(payment.id),
            charge,
            remaining_amount: None,
        });
        Ok(id)
    }

    /// Post a P&L row
    ///
    /// # Errors
    ///
    /// Returns `DuplicateEntry` if `payment` is set and a P&L row for the
    /// same (payment, category) already exists. Manual rows (`payment` is
    /// `None`) are unrestricted.
    #[allow(clippy::too_many_arguments)]
    pub fn post_pnl(
        &mut self,
        vehicle: Option<VehicleId>,
        customer: Option<CustomerId>,
        entry_date: NaiveDate,
        side: PnlSide,
        category: EntryCategory,
        amount: Decimal,
        payment: Option<PaymentId>,
        source_ref: String,
    ) -> Result<PnlId, LedgerError> {
        if let Some(payment_id) = payment {
            if !self.posted_pnl.insert((payment_id, category)) {
                return Err(LedgerError::duplicate_entry(payment_id, category));
            }
        }

        let id = self.next_pnl_id;
        self.next_pnl_id += 1;
        self.pnl.push(PnlEntry {
            id,
            vehicle,
            customer,
            entry_date,
            side,
            category,
            amount,
            payment,
            source_ref,
        });
        Ok(id)
    }

    /// Whether any ledger row exists for the payment
    ///
    /// This is the allocation engine's idempotency check: a payment with
    /// posted rows is returned as-is instead of being applied again.
    pub fn payment_posted(&self, payment: PaymentId) -> bool {
        self.posted_payments.contains(&payment)
    }

    /// Mirror a charge's new remaining amount onto its ledger row
    pub fn sync_charge_remaining(&mut self, charge: ChargeId, remaining: Decimal) {
        if let Some(&index) = self.charge_rows.get(&charge) {
            self.entries[index].remaining_amount = Some(remaining);
        }
    }

    /// Remove a charge's ledger row
    ///
    /// Only valid for charges without applications; the engine checks that
    /// before calling.
    pub fn remove_charge(&mut self, charge: ChargeId) {
        if let Some(index) = self.charge_rows.remove(&charge) {
            self.entries.remove(index);
            self.reindex_charge_rows();
        }
    }

    /// All ledger rows for a customer, in posting order
    pub fn entries_for_customer(&self, customer: CustomerId) -> Vec<&LedgerEntry> {
        self.entries
            .iter()
            .filter(|entry| entry.customer == customer)
            .collect()
    }

    /// Cloned ledger rows produced by a payment
    pub fn entries_for_payment(&self, payment: PaymentId) -> Vec<LedgerEntry> {
        self.entries
            .iter()
            .filter(|entry| entry.payment == Some(payment))
            .cloned()
            .collect()
    }

    /// Cloned P&L rows produced by a payment
    pub fn pnl_for_payment(&self, payment: PaymentId) -> Vec<PnlEntry> {
        self.pnl
            .iter()
            .filter(|entry| entry.payment == Some(payment))
            .cloned()
            .collect()
    }

    /// Distinct customers with ledger rows, sorted
    pub fn customers(&self) -> Vec<CustomerId> {
        let mut customers: Vec<CustomerId> =
            self.entries.iter().map(|entry| entry.customer).collect();
        customers.sort_unstable();
        customers.dedup();
        customers
    }

    /// Full ledger table, in posting order
    pub fn entries(&self) -> &[LedgerEntry] {
        &self.entries
    }

    /// Full P&L table, in posting order
    pub fn pnl_entries(&self) -> &[PnlEntry] {
        &self.pnl
    }

    /// Lengths of both tables, used as a rollback checkpoint
    pub fn checkpoint(&self) -> (usize, usize) {
        (self.entries.len(), self.pnl.len())
    }

    /// Roll both tables back to a checkpoint, unwinding the indexes
    ///
    /// Only rows appended after the checkpoint are discarded; the engine
    /// uses this to make a failed multi-row commit leave no trace.
    pub fn rollback(&mut self, checkpoint: (usize, usize)) {
        let (entries_len, pnl_len) = checkpoint;
        while self.entries.len() > entries_len {
            if let Some(entry) = self.entries.pop() {
                match entry.entry_type {
                    EntryType::Payment => {
                        if let Some(payment) = entry.payment {
                            self.posted_ledger
                                .remove(&(payment, entry.category, entry.charge));
                            if !self.entries.iter().any(|e| e.payment == Some(payment)) {
                                self.posted_payments.remove(&payment);
                            }
                        }
                    }
                    EntryType::Charge => {
                        if let Some(charge) = entry.charge {
                            self.charge_rows.remove(&charge);
                        }
                    }
                }
            }
        }
        while self.pnl.len() > pnl_len {
            if let Some(entry) = self.pnl.pop() {
                if let Some(payment) = entry.payment {
                    self.posted_pnl.remove(&(payment, entry.category));
                }
            }
        }
    }

    /// Delete every payment-derived row, keeping charge rows and manual
    /// P&L rows
    ///
    /// The ledger-side teardown step of a full rebuild.
    pub fn clear_payment_rows(&mut self) {
        self.entries
            .retain(|entry| entry.entry_type == EntryType::Charge);
        self.pnl.retain(|entry| entry.payment.is_none());
        self.posted_ledger.clear();
        self.posted_pnl.clear();
        self.posted_payments.clear();
        self.reindex_charge_rows();
        // Rewind the id counters so a rebuild numbers its rows the same
        // way every time; without this, two consecutive rebuilds would
        // produce identical tables except for the ids.
        self.next_entry_id = self.entries.iter().map(|e| e.id).max().unwrap_or(0) + 1;
        self.next_pnl_id = self.pnl.iter().map(|e| e.id).max().unwrap_or(0) + 1;
    }

    /// Per-(vehicle, category) revenue and cost totals
    ///
    /// Rows are ordered by vehicle (unattributed first) and category.
    pub fn pnl_summary(&self) -> Vec<PnlSummaryRow> {
        let mut cells: BTreeMap<(Option<VehicleId>, EntryCategory), (Decimal, Decimal)> =
            BTreeMap::new();
        for entry in &self.pnl {
            let cell = cells
                .entry((entry.vehicle, entry.category))
                .or_insert((Decimal::ZERO, Decimal::ZERO));
            match entry.side {
                PnlSide::Revenue => cell.0 += entry.amount,
                PnlSide::Cost => cell.1 += entry.amount,
            }
        }
        cells
            .into_iter()
            .map(|((vehicle, category), (revenue, cost))| PnlSummaryRow {
                vehicle,
                category,
                revenue,
                cost,
            })
            .collect()
    }

    fn reindex_charge_rows(&mut self) {
        self.charge_rows.clear();
        for (index, entry) in self.entries.iter().enumerate() {
            if entry.entry_type == EntryType::Charge {
                if let Some(charge) = entry.charge {
                    self.charge_rows.insert(charge, index);
                }
            }
        }
    }
}

impl Default for Ledger {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ChargeCategory, PaymentMethod, PaymentType};
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn charge(id: ChargeId) -> Charge {
        Charge::new(
            id,
            1,
            10,
            Some(100),
            ChargeCategory::Rental,
            date(2024, 1, 1),
            dec!(1000.00),
        )
    }

    fn payment(id: PaymentId) -> Payment {
        Payment {
            id,
            customer: 1,
            vehicle: Some(10),
            rental: Some(100),
            payment_type: PaymentType::Rental,
            method: PaymentMethod::Card,
            payment_date: date(2024, 1, 5),
            amount: dec!(1000.00),
        }
    }

    #[test]
    fn test_charge_row_is_positive_and_mirrors_remaining() {
        let mut ledger = Ledger::new();
        ledger.post_charge(&charge(1));

        let rows = ledger.entries_for_customer(1);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].amount, dec!(1000.00));
        assert_eq!(rows[0].remaining_amount, Some(dec!(1000.00)));
        assert_eq!(rows[0].entry_type, EntryType::Charge);

        ledger.sync_charge_remaining(1, dec!(400.00));
        assert_eq!(
            ledger.entries_for_customer(1)[0].remaining_amount,
            Some(dec!(400.00))
        );
    }

    #[test]
    fn test_payment_row_is_negative() {
        let mut ledger = Ledger::new();
        ledger
            .post_payment(
                &payment(1),
                EntryCategory::Rental,
                dec!(600.00),
                Some(date(2024, 1, 1)),
                Some(1),
            )
            .unwrap();

        let rows = ledger.entries_for_payment(1);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].amount, dec!(-600.00));
        assert!(ledger.payment_posted(1));
    }

    #[test]
    fn test_duplicate_payment_row_rejected() {
        let mut ledger = Ledger::new();
        let pay = payment(1);
        ledger
            .post_payment(&pay, EntryCategory::Rental, dec!(600.00), None, Some(1))
            .unwrap();

        let result =
            ledger.post_payment(&pay, EntryCategory::Rental, dec!(600.00), None, Some(1));
        assert!(matches!(
            result.unwrap_err(),
            LedgerError::DuplicateEntry { payment: 1, .. }
        ));

        // Same payment and category against a different charge is a
        // distinct allocation portion, not a duplicate.
        assert!(ledger
            .post_payment(&pay, EntryCategory::Rental, dec!(400.00), None, Some(2))
            .is_ok());
    }

    #[test]
    fn test_duplicate_pnl_row_rejected() {
        let mut ledger = Ledger::new();
        ledger
            .post_pnl(
                Some(10),
                Some(1),
                date(2024, 1, 5),
                PnlSide::Revenue,
                EntryCategory::Rental,
                dec!(1000.00),
                Some(1),
                "payment:1".to_string(),
            )
            .unwrap();

        let result = ledger.post_pnl(
            Some(10),
            Some(1),
            date(2024, 1, 5),
            PnlSide::Revenue,
            EntryCategory::Rental,
            dec!(1000.00),
            Some(1),
            "payment:1".to_string(),
        );
        assert!(matches!(
            result.unwrap_err(),
            LedgerError::DuplicateEntry { payment: 1, .. }
        ));
    }

    #[test]
    fn test_manual_pnl_rows_unrestricted() {
        let mut ledger = Ledger::new();
        for _ in 0..2 {
            ledger
                .post_pnl(
                    Some(10),
                    None,
                    date(2024, 1, 5),
                    PnlSide::Cost,
                    EntryCategory::Service,
                    dec!(150.00),
                    None,
                    "workshop invoice".to_string(),
                )
                .unwrap();
        }
        assert_eq!(ledger.pnl_entries().len(), 2);
    }

    #[test]
    fn test_rollback_unwinds_rows_and_indexes() {
        let mut ledger = Ledger::new();
        ledger.post_charge(&charge(1));
        let checkpoint = ledger.checkpoint();

        let pay = payment(1);
        ledger
            .post_payment(&pay, EntryCategory::Rental, dec!(600.00), None, Some(1))
            .unwrap();
        ledger
            .post_pnl(
                Some(10),
                Some(1),
                date(2024, 1, 5),
                PnlSide::Revenue,
                EntryCategory::Rental,
                dec!(600.00),
                Some(1),
                "payment:1".to_string(),
            )
            .unwrap();

        ledger.rollback(checkpoint);

        assert_eq!(ledger.entries().len(), 1);
        assert!(ledger.pnl_entries().is_empty());
        assert!(!ledger.payment_posted(1));

        // The unique keys were released: posting again succeeds.
        assert!(ledger
            .post_payment(&pay, EntryCategory::Rental, dec!(600.00), None, Some(1))
            .is_ok());
    }

    #[test]
    fn test_clear_payment_rows_keeps_charges_and_manual_pnl() {
        let mut ledger = Ledger::new();
        ledger.post_charge(&charge(1));
        ledger
            .post_payment(&payment(1), EntryCategory::Rental, dec!(600.00), None, Some(1))
            .unwrap();
        ledger
            .post_pnl(
                Some(10),
                Some(1),
                date(2024, 1, 5),
                PnlSide::Revenue,
                EntryCategory::Rental,
                dec!(600.00),
                Some(1),
                "payment:1".to_string(),
            )
            .unwrap();
        ledger
            .post_pnl(
                Some(10),
                None,
                date(2024, 1, 2),
                PnlSide::Cost,
                EntryCategory::Acquisition,
                dec!(15000.00),
                None,
                "purchase invoice".to_string(),
            )
            .unwrap();

        ledger.clear_payment_rows();

        assert_eq!(ledger.entries().len(), 1);
        assert_eq!(ledger.entries()[0].entry_type, EntryType::Charge);
        assert_eq!(ledger.pnl_entries().len(), 1);
        assert_eq!(ledger.pnl_entries()[0].category, EntryCategory::Acquisition);
        assert!(!ledger.payment_posted(1));

        // Charge row updates still land after the rebuild teardown.
        ledger.sync_charge_remaining(1, dec!(250.00));
        assert_eq!(
            ledger.entries_for_customer(1)[0].remaining_amount,
            Some(dec!(250.00))
        );
    }

    #[test]
    fn test_pnl_summary_aggregates_by_vehicle_and_category() {
        let mut ledger = Ledger::new();
        ledger
            .post_pnl(
                Some(10),
                Some(1),
                date(2024, 1, 5),
                PnlSide::Revenue,
                EntryCategory::Rental,
                dec!(600.00),
                Some(1),
                "payment:1".to_string(),
            )
            .unwrap();
        ledger
            .post_pnl(
                Some(10),
                Some(2),
                date(2024, 2, 5),
                PnlSide::Revenue,
                EntryCategory::Rental,
                dec!(400.00),
                Some(2),
                "payment:2".to_string(),
            )
            .unwrap();
        ledger
            .post_pnl(
                Some(10),
                None,
                date(2024, 1, 2),
                PnlSide::Cost,
                EntryCategory::Service,
                dec!(150.00),
                None,
                "workshop invoice".to_string(),
            )
            .unwrap();

        let summary = ledger.pnl_summary();
        assert_eq!(summary.len(), 2);
        assert_eq!(summary[0].category, EntryCategory::Rental);
        assert_eq!(summary[0].revenue, dec!(1000.00));
        assert_eq!(summary[0].net(), dec!(1000.00));
        assert_eq!(summary[1].category, EntryCategory::Service);
        assert_eq!(summary[1].cost, dec!(150.00));
        assert_eq!(summary[1].net(), dec!(-150.00));
    }
}
