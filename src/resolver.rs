// 🔎 Period Resolver - Which rule applies on a given date

use chrono::NaiveDate;

use crate::catalog::{CatalogItem, Period};

/// Find the rule whose closed window `[start, end]` contains `date`.
///
/// Returns the first match in catalog order. `None` means "no applicable
/// rule", which the scheduler treats as a stop condition.
pub fn resolve(item: &CatalogItem, date: NaiveDate) -> Option<&Period> {
    item.periods.iter().find(|period| period.contains(date))
}
