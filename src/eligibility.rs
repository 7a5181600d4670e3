// ⏱️ Eligibility Clock - When an item may first be issued, and under which rank

use chrono::NaiveDate;

use crate::catalog::{CatalogItem, Rank};

/// First date `item` may be issued to a person.
///
/// Never earlier than the item's first rule window or the service start.
/// Items restricted to promoted personnel additionally wait for promotion.
pub fn first_eligible_date(
    item: &CatalogItem,
    service_start: NaiveDate,
    promotion: NaiveDate,
    officer_only: bool,
) -> NaiveDate {
    let first_start = item.first_period_start();

    if officer_only {
        promotion.max(first_start).max(service_start)
    } else {
        service_start.max(first_start)
    }
}

/// Rank a person is evaluated under on `date`.
///
/// Promotion takes effect on the promotion date itself, so a person whose
/// service starts on the promotion date is promoted from enrollment.
pub fn rank_at(date: NaiveDate, promotion: NaiveDate) -> Rank {
    if date >= promotion {
        Rank::Promoted
    } else {
        Rank::Base
    }
}
