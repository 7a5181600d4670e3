// 📅 Calendar Dates - Parsing and month arithmetic
//
// All scheduling works on calendar dates (no time of day).
// Catalog files carry dates as DD.MM.YYYY, the API and storage use ISO.

use chrono::{Months, NaiveDate};

use crate::error::EngineError;

/// Formats accepted by `parse_date`, tried in order.
const ACCEPTED_FORMATS: [&str; 2] = ["%Y-%m-%d", "%d.%m.%Y"];

/// Earliest representable date ("since the beginning of time")
pub fn earliest() -> NaiveDate {
    NaiveDate::MIN
}

/// Latest representable date ("indefinitely")
pub fn latest() -> NaiveDate {
    NaiveDate::MAX
}

/// Parse a calendar date in ISO (`2019-01-15`) or catalog (`15.01.2019`) form.
///
/// `field` names the input in the error so the caller can tell which
/// attribute or catalog entry was malformed.
pub fn parse_date(field: &str, value: &str) -> Result<NaiveDate, EngineError> {
    let trimmed = value.trim();

    ACCEPTED_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(trimmed, format).ok())
        .ok_or_else(|| EngineError::MalformedDate {
            field: field.to_string(),
            value: value.to_string(),
        })
}

/// Parse an optional date; `None` and blank strings stay `None`.
pub fn parse_optional_date(
    field: &str,
    value: Option<&str>,
) -> Result<Option<NaiveDate>, EngineError> {
    match value {
        Some(raw) if !raw.trim().is_empty() => parse_date(field, raw).map(Some),
        _ => Ok(None),
    }
}

/// Add calendar months, keeping the day of month where it exists and
/// clamping to the last day otherwise (Jan 31 + 1 month = Feb 28/29).
///
/// Saturates at the latest representable date instead of overflowing.
pub fn add_months(date: NaiveDate, months: u32) -> NaiveDate {
    date.checked_add_months(Months::new(months))
        .unwrap_or_else(latest)
}

/// Format as DD.MM.YYYY, the form used by catalog files and printed reports
pub fn format_catalog_date(date: NaiveDate) -> String {
    date.format("%d.%m.%Y").to_string()
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_parse_both_formats() {
        assert_eq!(parse_date("start", "2019-01-15").unwrap(), ymd(2019, 1, 15));
        assert_eq!(parse_date("start", "15.01.2019").unwrap(), ymd(2019, 1, 15));
        assert_eq!(parse_date("start", " 01.07.2020 ").unwrap(), ymd(2020, 7, 1));
    }

    #[test]
    fn test_parse_malformed_date() {
        let err = parse_date("promotionDate", "2019-13-40").unwrap_err();

        match err {
            EngineError::MalformedDate { field, value } => {
                assert_eq!(field, "promotionDate");
                assert_eq!(value, "2019-13-40");
            }
            other => panic!("unexpected error: {other:?}"),
        }

        assert!(parse_date("x", "yesterday").is_err());
    }

    #[test]
    fn test_parse_optional_date() {
        assert_eq!(parse_optional_date("end", None).unwrap(), None);
        assert_eq!(parse_optional_date("end", Some("")).unwrap(), None);
        assert_eq!(
            parse_optional_date("end", Some("31.12.2024")).unwrap(),
            Some(ymd(2024, 12, 31))
        );
        assert!(parse_optional_date("end", Some("31/12/2024")).is_err());
    }

    #[test]
    fn test_add_months_clamps_end_of_month() {
        assert_eq!(add_months(ymd(2019, 1, 15), 6), ymd(2019, 7, 15));
        assert_eq!(add_months(ymd(2019, 1, 31), 1), ymd(2019, 2, 28));
        assert_eq!(add_months(ymd(2020, 1, 31), 1), ymd(2020, 2, 29));
        assert_eq!(add_months(ymd(2019, 8, 31), 0), ymd(2019, 8, 31));
    }

    #[test]
    fn test_add_months_saturates() {
        assert_eq!(add_months(latest(), 12), latest());
    }

    #[test]
    fn test_format_catalog_date() {
        assert_eq!(format_catalog_date(ymd(2019, 1, 5)), "05.01.2019");
    }
}
