// 🧮 Schedule Aggregator - A person's full ledger from the catalog
//
// Every item visible to the person's gender gets an entry, including items
// with no issuances yet (empty list, total 0), so entries stay stable
// between recomputations.

use chrono::NaiveDate;

use crate::catalog::{Catalog, Rank};
use crate::ledger::ItemLedgerEntry;
use crate::person::PersonAttributes;
use crate::scheduler::schedule_item;

/// Compute a fresh ledger for `person` as of `now`
pub fn compute_ledger(
    person: &PersonAttributes,
    catalog: &Catalog,
    now: NaiveDate,
) -> Vec<ItemLedgerEntry> {
    let ledger: Vec<ItemLedgerEntry> = catalog
        .item_names(person.gender)
        .into_iter()
        .map(|name| {
            let schedule = schedule_item(catalog, person, &name, now);

            // Promoted entry's cash wins when both exist
            let cash = catalog
                .item(person.gender, Rank::Promoted, &name)
                .or_else(|| catalog.item(person.gender, Rank::Base, &name))
                .map(|item| item.cash)
                .unwrap_or(0.0);

            ItemLedgerEntry {
                name,
                issuances: schedule.issuances,
                total_quantity: schedule.total_quantity,
                cash,
            }
        })
        .collect();

    tracing::debug!(
        gender = %person.gender,
        now = %now,
        items = ledger.len(),
        issuances = ledger.iter().map(|e| e.issuances.len()).sum::<usize>(),
        "ledger computed"
    );

    ledger
}
