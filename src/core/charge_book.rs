//! Charge storage and the open-charge query
//!
//! This module provides the `ChargeBook` struct which maintains every
//! scheduled charge and answers the one query the allocation engine is
//! built on: the customer's open charges in FIFO order (due date
//! ascending, creation order for ties).
//!
//! The book is responsible for:
//! - Registering charges and rejecting duplicate ids
//! - The deterministic open-charge ordering
//! - Decreasing remaining amounts with checked arithmetic
//! - Resetting remaining amounts for a full ledger rebuild
//!
//! The open-charge listing is recomputed on every call rather than cached,
//! so the allocation engine always sees the current set of obligations.

use crate::types::{Charge, ChargeId, CustomerId, LedgerError};
use rust_decimal::Decimal;
use std::collections::HashMap;

/// Stores all charges and answers open-charge queries
#[derive(Debug, Clone)]
pub struct ChargeBook {
    /// Map of charge ids to charges
    charges: HashMap<ChargeId, Charge>,
    /// Highest id handed out so far, for id assignment
    max_id: ChargeId,
}

impl ChargeBook {
    /// Create a new book with no charges
    pub fn new() -> Self {
        ChargeBook {
            charges: HashMap::new(),
            max_id: 0,
        }
    }

    /// Next free charge id
    pub fn next_id(&self) -> ChargeId {
        self.max_id + 1
    }

    /// Register a charge
    ///
    /// # Errors
    ///
    /// Returns `DuplicateCharge` if a charge with the same id already
    /// exists; the existing charge is left untouched.
    pub fn insert(&mut self, charge: Charge) -> Result<(), LedgerError> {
        if self.charges.contains_key(&charge.id) {
            return Err(LedgerError::duplicate_charge(charge.id));
        }
        self.max_id = self.max_id.max(charge.id);
        self.charges.insert(charge.id, charge);
        Ok(())
    }

    /// Look up a charge by id
    pub fn get(&self, charge: ChargeId) -> Option<&Charge> {
        self.charges.get(&charge)
    }

    /// Remove a charge from the book
    ///
    /// The caller is responsible for checking that no payment application
    /// references the charge first.
    ///
    /// # Errors
    ///
    /// Returns `ChargeNotFound` if the id is unknown.
    pub fn remove(&mut self, charge: ChargeId) -> Result<Charge, LedgerError> {
        self.charges
            .remove(&charge)
            .ok_or_else(|| LedgerError::charge_not_found(charge))
    }

    /// The customer's open charges in FIFO settlement order
    ///
    /// Returns every charge with a positive remaining amount, ordered by
    /// due date ascending with charge id (creation order) breaking ties.
    /// This ordering is what makes allocation deterministic: the oldest
    /// obligation is always settled first.
    pub fn open_for_customer(&self, customer: CustomerId) -> Vec<&Charge> {
        let mut open: Vec<&Charge> = self
            .charges
            .values()
            .filter(|charge| charge.customer == customer && charge.is_open())
            .collect();
        open.sort_by_key(|charge| (charge.due_date, charge.id));
        open
    }

    /// All charges sorted by id, for deterministic output
    pub fn all_charges(&self) -> Vec<&Charge> {
        let mut charges: Vec<&Charge> = self.charges.values().collect();
        charges.sort_by_key(|charge| charge.id);
        charges
    }

    /// Decrease a charge's remaining amount by an applied portion
    ///
    /// Uses checked arithmetic and refuses to settle more than is
    /// outstanding, which keeps `0 <= remaining <= original` intact.
    ///
    /// # Errors
    ///
    /// Returns `ChargeNotFound` if the id is unknown, `OverApplication`
    /// if `amount` exceeds the remaining balance, or `ArithmeticOverflow`
    /// if the subtraction would not be representable.
    pub fn apply(&mut self, charge: ChargeId, amount: Decimal) -> Result<Decimal, LedgerError> {
        let entry = self
            .charges
            .get_mut(&charge)
            .ok_or_else(|| LedgerError::charge_not_found(charge))?;

        if amount > entry.remaining_amount {
            return Err(LedgerError::over_application(
                charge,
                entry.remaining_amount,
                amount,
            ));
        }

        let new_remaining = entry
            .remaining_amount
            .checked_sub(amount)
            .ok_or_else(|| LedgerError::arithmetic_overflow("apply", entry.customer))?;

        entry.remaining_amount = new_remaining;
        Ok(new_remaining)
    }

    /// Overwrite a charge wholesale
    ///
    /// Used by the engine's commit rollback to restore the pre-allocation
    /// copy of a charge.
    pub fn restore(&mut self, charge: Charge) {
        self.charges.insert(charge.id, charge);
    }

    /// Reset every charge's remaining amount to its original amount
    ///
    /// The first step of a full ledger rebuild: all allocations are undone
    /// before payments are replayed in chronological order.
    pub fn reset_remaining(&mut self) {
        for charge in self.charges.values_mut() {
            charge.remaining_amount = charge.original_amount;
        }
    }

    /// Number of charges in the book
    pub fn len(&self) -> usize {
        self.charges.len()
    }

    /// Whether the book holds no charges
    pub fn is_empty(&self) -> bool {
        self.charges.is_empty()
    }
}

impl Default for ChargeBook {
    fn default() -> Self {
        Self::new()
    }
}
