// ⚖️ Version Reconciler - Merge a fresh schedule into the stored ledger
//
// Stored issuances are history: they are kept verbatim, consumption
// counters included. A fresh schedule can only contribute the issuances
// that came due after the stored ones. Items are matched by name, never by
// position, so catalog reordering cannot cross-wire entries.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::error::EngineError;
use crate::ledger::ItemLedgerEntry;

// ============================================================================
// REPORT
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ItemChange {
    /// New issuances appended to an existing entry
    Appended { item: String, count: usize },

    /// Item present in the fresh schedule only (catalog gained it)
    Added { item: String, count: usize },

    /// Stored item no longer produced by the catalog, kept as is
    Orphaned { item: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReconciliationReport {
    pub ledger: Vec<ItemLedgerEntry>,
    pub changes: Vec<ItemChange>,
}

impl ReconciliationReport {
    /// Whether the merged ledger differs from the stored one
    pub fn changed(&self) -> bool {
        self.changes
            .iter()
            .any(|change| !matches!(change, ItemChange::Orphaned { .. }))
    }

    pub fn appended_issuances(&self) -> usize {
        self.changes
            .iter()
            .map(|change| match change {
                ItemChange::Appended { count, .. } | ItemChange::Added { count, .. } => *count,
                ItemChange::Orphaned { .. } => 0,
            })
            .sum()
    }

    pub fn summary(&self) -> String {
        let orphaned = self
            .changes
            .iter()
            .filter(|c| matches!(c, ItemChange::Orphaned { .. }))
            .count();

        format!(
            "Reconciled {} items: {} new issuances, {} orphaned items",
            self.ledger.len(),
            self.appended_issuances(),
            orphaned
        )
    }
}

// ============================================================================
// RECONCILE
// ============================================================================

/// Merge `fresh` into `stored`.
///
/// - fresh longer than stored: append the fresh events dated after the
///   last stored one (the surplus tail whenever histories agree)
/// - same length: stored entry returned unmodified
/// - fresh shorter: `ReconciliationRegression`, nothing is merged
///
/// Stored order is preserved; items new to the catalog are appended in
/// fresh order.
pub fn reconcile(
    stored: &[ItemLedgerEntry],
    fresh: &[ItemLedgerEntry],
) -> Result<ReconciliationReport, EngineError> {
    let fresh_by_name: HashMap<&str, &ItemLedgerEntry> =
        fresh.iter().map(|entry| (entry.name.as_str(), entry)).collect();

    let mut ledger = Vec::with_capacity(stored.len().max(fresh.len()));
    let mut changes = Vec::new();

    for stored_entry in stored {
        let Some(fresh_entry) = fresh_by_name.get(stored_entry.name.as_str()) else {
            tracing::warn!(item = %stored_entry.name, "stored item not produced by catalog, keeping history");
            changes.push(ItemChange::Orphaned {
                item: stored_entry.name.clone(),
            });
            ledger.push(stored_entry.clone());
            continue;
        };

        let stored_count = stored_entry.issuances.len();
        let fresh_count = fresh_entry.issuances.len();

        if fresh_count < stored_count {
            return Err(EngineError::ReconciliationRegression {
                item: stored_entry.name.clone(),
                stored: stored_count,
                fresh: fresh_count,
            });
        }

        if fresh_count == stored_count {
            ledger.push(stored_entry.clone());
            continue;
        }

        // Only events dated after the recorded history may be appended
        let tail: Vec<_> = match stored_entry.last_issued() {
            Some(last) => fresh_entry
                .issuances
                .iter()
                .filter(|issuance| issuance.date > last)
                .cloned()
                .collect(),
            None => fresh_entry.issuances.clone(),
        };

        if tail.len() != fresh_count - stored_count {
            tracing::warn!(
                item = %stored_entry.name,
                stored = stored_count,
                fresh = fresh_count,
                appended = tail.len(),
                "stored history diverges from current catalog"
            );
        }

        if tail.is_empty() {
            ledger.push(stored_entry.clone());
            continue;
        }

        let appended = tail.len();
        let mut merged = stored_entry.clone();
        merged.issuances.extend(tail);
        merged.total_quantity = merged.sum_quantity();

        if merged.total_quantity != fresh_entry.total_quantity {
            tracing::warn!(
                item = %merged.name,
                merged = merged.total_quantity,
                fresh = fresh_entry.total_quantity,
                "stored history quantities differ from current catalog"
            );
        }

        tracing::info!(
            item = %merged.name,
            appended,
            total = merged.total_quantity,
            "issuances appended"
        );

        changes.push(ItemChange::Appended {
            item: merged.name.clone(),
            count: appended,
        });
        ledger.push(merged);
    }

    let stored_names: HashSet<&str> = stored.iter().map(|entry| entry.name.as_str()).collect();

    for fresh_entry in fresh {
        if stored_names.contains(fresh_entry.name.as_str()) {
            continue;
        }

        tracing::info!(item = %fresh_entry.name, issuances = fresh_entry.issuances.len(), "item added to ledger");
        changes.push(ItemChange::Added {
            item: fresh_entry.name.clone(),
            count: fresh_entry.issuances.len(),
        });
        ledger.push(fresh_entry.clone());
    }

    Ok(ReconciliationReport { ledger, changes })
}

// ============================================================================
// TESTS
// ============================================================================
