// ⚙️ Issuance Engine - Catalog injected once, deterministic computations
//
// (catalog, person, now, stored ledger) → new ledger
//
// The engine never reads the wall clock and never persists anything.
// It is cheap to clone and safe to share across threads.

use chrono::NaiveDate;
use std::sync::Arc;

use crate::aggregator;
use crate::catalog::Catalog;
use crate::error::EngineError;
use crate::ledger::ItemLedgerEntry;
use crate::person::{PersonAttributes, PersonInput};
use crate::reconciler::{self, ReconciliationReport};

#[derive(Debug, Clone)]
pub struct IssuanceEngine {
    catalog: Arc<Catalog>,
}

impl IssuanceEngine {
    pub fn new(catalog: Catalog) -> Self {
        IssuanceEngine {
            catalog: Arc::new(catalog),
        }
    }

    /// Full fresh computation
    pub fn compute_ledger(&self, person: &PersonAttributes, now: NaiveDate) -> Vec<ItemLedgerEntry> {
        aggregator::compute_ledger(person, &self.catalog, now)
    }

    /// Validate boundary input, then compute.
    ///
    /// Validation failures abort before any schedule is produced.
    pub fn compute_from_input(
        &self,
        input: &PersonInput,
        now: NaiveDate,
    ) -> Result<Vec<ItemLedgerEntry>, EngineError> {
        let person = input.validate()?;
        Ok(self.compute_ledger(&person, now))
    }

    pub fn reconcile(
        &self,
        stored: &[ItemLedgerEntry],
        fresh: &[ItemLedgerEntry],
    ) -> Result<ReconciliationReport, EngineError> {
        reconciler::reconcile(stored, fresh)
    }

    /// Recompute as of `now` and merge into the stored ledger.
    ///
    /// `now` may not precede any stored issuance: a ledger cannot be
    /// re-evaluated in the past.
    pub fn refresh(
        &self,
        stored: &[ItemLedgerEntry],
        person: &PersonAttributes,
        now: NaiveDate,
    ) -> Result<ReconciliationReport, EngineError> {
        if let Some((item, last_issued)) = stored
            .iter()
            .filter_map(|entry| entry.last_issued().map(|last| (entry, last)))
            .find(|(_, last)| *last > now)
        {
            return Err(EngineError::EvaluationBeforeHistory {
                item: item.name.clone(),
                last_issued,
                now,
            });
        }

        let fresh = self.compute_ledger(person, now);
        self.reconcile(stored, &fresh)
    }
}

// ============================================================================
// TESTS
// ============================================================================
