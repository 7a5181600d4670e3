// 👤 Person Attributes - The temporal facts scheduling depends on

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::catalog::Gender;
use crate::dates::{parse_date, parse_optional_date};
use crate::error::EngineError;

/// A maternity window: start date plus length in months
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaternityLeave {
    pub start: NaiveDate,
    pub months: u32,
}

/// Validated person attributes.
///
/// Created once on enrollment; a maternity window may be added later.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonAttributes {
    pub gender: Gender,
    pub service_start_date: NaiveDate,
    pub promotion_date: NaiveDate,

    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maternity_leave_start: Option<NaiveDate>,

    /// Months, 0 when there is no leave
    #[serde(default)]
    pub maternity_leave_duration: u32,
}

impl PersonAttributes {
    pub fn new(gender: Gender, service_start_date: NaiveDate, promotion_date: NaiveDate) -> Self {
        PersonAttributes {
            gender,
            service_start_date,
            promotion_date,
            maternity_leave_start: None,
            maternity_leave_duration: 0,
        }
    }

    pub fn with_maternity(mut self, start: NaiveDate, months: u32) -> Self {
        self.maternity_leave_start = Some(start);
        self.maternity_leave_duration = months;
        self
    }

    /// Maternity window that affects scheduling.
    ///
    /// Only female personnel with a recorded start and non-zero duration
    /// have one; anything else recorded is ignored.
    pub fn maternity(&self) -> Option<MaternityLeave> {
        let start = self.maternity_leave_start?;

        if self.gender != Gender::Female {
            tracing::warn!(gender = %self.gender, "ignoring maternity window on non-female record");
            return None;
        }

        if self.maternity_leave_duration == 0 {
            return None;
        }

        Some(MaternityLeave {
            start,
            months: self.maternity_leave_duration,
        })
    }
}

// ============================================================================
// BOUNDARY INPUT
// ============================================================================

/// Unvalidated person data as received from a caller (API body, CLI flags).
///
/// Accepts the legacy field names `startDate` / `officerDate`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonInput {
    pub gender: Option<String>,

    #[serde(alias = "startDate")]
    pub service_start_date: Option<String>,

    #[serde(alias = "officerDate")]
    pub promotion_date: Option<String>,

    pub maternity_leave_start: Option<String>,
    pub maternity_leave_duration: Option<u32>,
}

impl PersonInput {
    /// Check completeness and parse dates.
    ///
    /// Missing gender, service start or promotion date refuse the record;
    /// any unparseable date is a `MalformedDate`.
    pub fn validate(&self) -> Result<PersonAttributes, EngineError> {
        let gender = self
            .gender
            .as_deref()
            .filter(|g| !g.trim().is_empty())
            .ok_or(EngineError::MissingRequiredAttribute("gender"))?
            .parse::<Gender>()
            .map_err(|_| EngineError::MissingRequiredAttribute("gender"))?;

        let service_start_date = match self.service_start_date.as_deref() {
            Some(raw) if !raw.trim().is_empty() => parse_date("serviceStartDate", raw)?,
            _ => return Err(EngineError::MissingRequiredAttribute("serviceStartDate")),
        };

        let promotion_date = match self.promotion_date.as_deref() {
            Some(raw) if !raw.trim().is_empty() => parse_date("promotionDate", raw)?,
            _ => return Err(EngineError::MissingRequiredAttribute("promotionDate")),
        };

        let maternity_leave_start =
            parse_optional_date("maternityLeaveStart", self.maternity_leave_start.as_deref())?;

        Ok(PersonAttributes {
            gender,
            service_start_date,
            promotion_date,
            maternity_leave_start,
            maternity_leave_duration: self.maternity_leave_duration.unwrap_or(0),
        })
    }
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

    fn complete_input() -> PersonInput {
        PersonInput {
            gender: Some("female".to_string()),
            service_start_date: Some("2018-01-15".to_string()),
            promotion_date: Some("15.01.2020".to_string()),
            maternity_leave_start: Some("2019-06-01".to_string()),
            maternity_leave_duration: Some(12),
        }
    }

    #[test]
    fn test_validate_complete_input() {
        let person = complete_input().validate().unwrap();

        assert_eq!(person.gender, Gender::Female);
        assert_eq!(person.service_start_date, ymd(2018, 1, 15));
        assert_eq!(person.promotion_date, ymd(2020, 1, 15));
        assert_eq!(
            person.maternity(),
            Some(MaternityLeave { start: ymd(2019, 6, 1), months: 12 })
        );
    }

    #[test]
    fn test_validate_missing_attributes() {
        let mut input = complete_input();
        input.gender = None;
        assert_eq!(
            input.validate().unwrap_err(),
            EngineError::MissingRequiredAttribute("gender")
        );

        let mut input = complete_input();
        input.service_start_date = Some("  ".to_string());
        assert_eq!(
            input.validate().unwrap_err(),
            EngineError::MissingRequiredAttribute("serviceStartDate")
        );

        let mut input = complete_input();
        input.promotion_date = None;
        assert_eq!(
            input.validate().unwrap_err(),
            EngineError::MissingRequiredAttribute("promotionDate")
        );
    }

    #[test]
    fn test_validate_malformed_date() {
        let mut input = complete_input();
        input.maternity_leave_start = Some("not a date".to_string());

        assert!(matches!(
            input.validate().unwrap_err(),
            EngineError::MalformedDate { field, .. } if field == "maternityLeaveStart"
        ));
    }

    #[test]
    fn test_legacy_field_names() {
        let json = r#"{"gender":"male","startDate":"2018-01-15","officerDate":"2020-01-15"}"#;
        let input: PersonInput = serde_json::from_str(json).unwrap();
        let person = input.validate().unwrap();

        assert_eq!(person.gender, Gender::Male);
        assert_eq!(person.maternity_leave_duration, 0);
        assert_eq!(person.maternity(), None);
    }

    #[test]
    fn test_maternity_ignored_for_male() {
        let person = PersonAttributes::new(Gender::Male, ymd(2018, 1, 1), ymd(2020, 1, 1))
            .with_maternity(ymd(2019, 1, 1), 6);

        assert_eq!(person.maternity(), None);
    }
}
