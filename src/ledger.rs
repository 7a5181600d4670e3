// 📒 Issuance Ledger - What was issued, when, and how much of it is used
//
// The ledger is append-only across recomputations. `used_count` belongs to
// the consumption-tracking workflow and is never touched by scheduling.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::Path;

/// A single dated grant of an item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuanceEvent {
    pub date: NaiveDate,

    /// Entitlement at issuance time
    pub quantity: u32,

    /// Units marked as consumed (edited externally, defaults to 0)
    #[serde(default, alias = "used")]
    pub used_count: u32,
}

impl IssuanceEvent {
    pub fn new(date: NaiveDate, quantity: u32) -> Self {
        IssuanceEvent {
            date,
            quantity,
            used_count: 0,
        }
    }

    pub fn remaining(&self) -> u32 {
        self.quantity.saturating_sub(self.used_count)
    }
}

/// Per-item schedule within a person's ledger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemLedgerEntry {
    pub name: String,

    /// Chronological, append-only
    pub issuances: Vec<IssuanceEvent>,

    /// Sum of `quantity` over `issuances` (not reduced by usage)
    pub total_quantity: u32,

    pub cash: f64,
}

impl ItemLedgerEntry {
    pub fn new(name: impl Into<String>, cash: f64) -> Self {
        ItemLedgerEntry {
            name: name.into(),
            issuances: Vec::new(),
            total_quantity: 0,
            cash,
        }
    }

    /// Saturates at `u32::MAX`
    pub fn sum_quantity(&self) -> u32 {
        self.issuances
            .iter()
            .fold(0u32, |total, i| total.saturating_add(i.quantity))
    }

    /// Whether `total_quantity` agrees with the issuances
    pub fn is_consistent(&self) -> bool {
        self.total_quantity == self.sum_quantity()
    }

    pub fn last_issued(&self) -> Option<NaiveDate> {
        self.issuances.last().map(|i| i.date)
    }

    pub fn total_used(&self) -> u32 {
        self.issuances
            .iter()
            .fold(0u32, |total, i| total.saturating_add(i.used_count))
    }

    /// Record consumption on one issuance
    pub fn set_used(&mut self, index: usize, used: u32) -> Result<(), UsageError> {
        let name = self.name.clone();
        let issuance = self
            .issuances
            .get_mut(index)
            .ok_or(UsageError::UnknownIssuance { item: name.clone(), index })?;

        if used > issuance.quantity {
            return Err(UsageError::UsageExceedsQuantity {
                item: name,
                index,
                used,
                quantity: issuance.quantity,
            });
        }

        issuance.used_count = used;
        Ok(())
    }
}

/// Errors from the consumption-tracking workflow
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UsageError {
    #[error("item not in ledger: {0:?}")]
    UnknownItem(String),

    #[error("item {item:?} has no issuance #{index}")]
    UnknownIssuance { item: String, index: usize },

    #[error("item {item:?} issuance #{index}: used {used} exceeds issued quantity {quantity}")]
    UsageExceedsQuantity {
        item: String,
        index: usize,
        used: u32,
        quantity: u32,
    },
}

/// Record consumption on an item of a full ledger
pub fn record_usage(
    ledger: &mut [ItemLedgerEntry],
    item: &str,
    index: usize,
    used: u32,
) -> Result<(), UsageError> {
    ledger
        .iter_mut()
        .find(|entry| entry.name == item)
        .ok_or_else(|| UsageError::UnknownItem(item.to_string()))?
        .set_used(index, used)
}

// ============================================================================
// CSV EXPORT
// ============================================================================

#[derive(Debug, Serialize)]
struct LedgerRow<'a> {
    item: &'a str,
    date: NaiveDate,
    quantity: u32,
    used_count: u32,
    cash: f64,
}

/// Write one CSV row per issuance
pub fn write_ledger_csv<W: Write>(ledger: &[ItemLedgerEntry], writer: W) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);

    for entry in ledger {
        for issuance in &entry.issuances {
            wtr.serialize(LedgerRow {
                item: &entry.name,
                date: issuance.date,
                quantity: issuance.quantity,
                used_count: issuance.used_count,
                cash: entry.cash,
            })
            .context("Failed to write ledger row")?;
        }
    }

    wtr.flush().context("Failed to flush ledger CSV")?;
    Ok(())
}

pub fn export_ledger_csv(ledger: &[ItemLedgerEntry], path: &Path) -> Result<()> {
    let file = std::fs::File::create(path)
        .with_context(|| format!("Failed to create CSV file: {:?}", path))?;
    write_ledger_csv(ledger, file)
}

// ============================================================================
// TESTS
// ============================================================================
