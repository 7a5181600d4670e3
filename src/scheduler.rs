// 🗓️ Issuance Scheduler - Derive the issuance sequence of one item for one person
//
// A single cursor walks forward from the first eligible date to "now".
// Each step picks the rank's catalog entry, resolves the rule window,
// applies the promotion-transition and expiration guards, then emits
// (or skips a zero-entitlement window) and advances.
//
// Pure: the evaluation date is a parameter, the wall clock is never read.

use chrono::NaiveDate;

use crate::catalog::{Catalog, Rank};
use crate::dates::add_months;
use crate::eligibility::{first_eligible_date, rank_at};
use crate::ledger::IssuanceEvent;
use crate::person::{MaternityLeave, PersonAttributes};
use crate::resolver::resolve;

/// Computed schedule of one item
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ItemSchedule {
    pub issuances: Vec<IssuanceEvent>,
    pub total_quantity: u32,
}

impl ItemSchedule {
    fn emit(&mut self, date: NaiveDate, quantity: u32) {
        self.issuances.push(IssuanceEvent::new(date, quantity));
        self.total_quantity = self.total_quantity.saturating_add(quantity);
    }
}

/// Why the stepping loop stopped (logged only)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stop {
    ReachedNow,
    NoEntryForRank(Rank),
    NoApplicablePeriod,
    WearStraddlesPromotion,
    OneTimeIssuance,
    CalendarExhausted,
}

/// End of the wear period of an issuance made on `issued`.
///
/// A maternity leave starting inside `[issued, issued + months)` extends it
/// by the leave duration.
pub fn wear_expiry(issued: NaiveDate, months: u32, maternity: Option<MaternityLeave>) -> NaiveDate {
    let end = add_months(issued, months);

    match maternity {
        Some(leave) if issued <= leave.start && leave.start < end => add_months(end, leave.months),
        _ => end,
    }
}

/// Schedule `item_name` for `person` up to and including `now`.
///
/// Items with no entry on the person's gender path yield an empty schedule.
pub fn schedule_item(
    catalog: &Catalog,
    person: &PersonAttributes,
    item_name: &str,
    now: NaiveDate,
) -> ItemSchedule {
    let mut schedule = ItemSchedule::default();

    let base = catalog.item(person.gender, Rank::Base, item_name);
    let promoted = catalog.item(person.gender, Rank::Promoted, item_name);

    let (anchor, officer_only) = match (base, promoted) {
        (Some(base_item), _) => (base_item, false),
        (None, Some(promoted_item)) => (promoted_item, true),
        (None, None) => return schedule,
    };

    let promotion = person.promotion_date;
    let maternity = person.maternity();

    let mut current = first_eligible_date(anchor, person.service_start_date, promotion, officer_only);
    let mut last_issued: Option<NaiveDate> = None;

    let stop = loop {
        if current > now {
            break Stop::ReachedNow;
        }

        // 1. Catalog selection by rank at the cursor
        let rank = rank_at(current, promotion);
        let entry = match rank {
            Rank::Base => base,
            Rank::Promoted => promoted,
        };
        let Some(entry) = entry else {
            break Stop::NoEntryForRank(rank);
        };

        // 2. Rule window at the cursor
        let Some(period) = resolve(entry, current) else {
            break Stop::NoApplicablePeriod;
        };

        // 3. Promotion transition: a base wear period that runs past the
        //    promotion date must fully elapse before promoted rules apply
        if rank == Rank::Base {
            let wear_end = add_months(last_issued.unwrap_or(current), period.period_months);
            if wear_end > promotion {
                if wear_end > now {
                    break Stop::WearStraddlesPromotion;
                }
                tracing::debug!(item = item_name, from = %current, to = %wear_end, "waiting out wear period across promotion");
                current = wear_end;
                continue;
            }
        }

        // 4. Previous issuance still in wear
        if let Some(last) = last_issued {
            let expiry = wear_expiry(last, period.period_months, maternity);
            if current < expiry {
                current = expiry;
                continue;
            }
        }

        // 5. Emit (zero quantity windows only move the cursor)
        let next = if period.quantity > 0 {
            schedule.emit(current, period.quantity);
            last_issued = Some(current);

            // 6. Maternity extension of the wear period just started
            wear_expiry(current, period.period_months, maternity)
        } else {
            add_months(current, period.period_months)
        };

        if period.period_months == 0 {
            break Stop::OneTimeIssuance;
        }
        if next <= current {
            break Stop::CalendarExhausted;
        }
        current = next;
    };

    tracing::debug!(
        item = item_name,
        issuances = schedule.issuances.len(),
        total = schedule.total_quantity,
        stop = ?stop,
        "item scheduled"
    );

    schedule
}

// ============================================================================
// TESTS
// ============================================================================
