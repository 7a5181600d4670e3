// 📚 Supply Catalog - Items and their reissue rules, as data
//
// Four partitions: (male | female) × (base | promoted rank).
// Loaded once at startup, read-only afterwards, and handed to the engine
// explicitly (no process-wide global).

use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use crate::dates::{earliest, latest, parse_optional_date};
use crate::error::EngineError;

// ============================================================================
// GENDER & RANK
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
}

impl Gender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Male => "male",
            Gender::Female => "female",
        }
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Gender {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "male" | "m" => Ok(Gender::Male),
            "female" | "f" => Ok(Gender::Female),
            other => Err(format!("unknown gender: {other:?} (expected male or female)")),
        }
    }
}

/// Which rule set a person is evaluated under at a given date
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rank {
    /// Not yet promoted
    Base,

    /// On or after the promotion date
    Promoted,
}

// ============================================================================
// PERIOD (wear window)
// ============================================================================

/// A time-bounded reissue rule.
///
/// Both bounds are inclusive. A missing start means "since the beginning of
/// time", a missing end means "indefinitely".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Period {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,

    /// Reissue interval in calendar months (0 = one-time issuance)
    pub period_months: u32,

    /// Units issued per event
    pub quantity: u32,
}

impl Period {
    /// Open-ended rule valid for all dates
    pub fn always(period_months: u32, quantity: u32) -> Self {
        Period {
            start_date: None,
            end_date: None,
            period_months,
            quantity,
        }
    }

    /// Rule valid inside `[start, end]`
    pub fn between(
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
        period_months: u32,
        quantity: u32,
    ) -> Self {
        Period {
            start_date,
            end_date,
            period_months,
            quantity,
        }
    }

    pub fn window_start(&self) -> NaiveDate {
        self.start_date.unwrap_or_else(earliest)
    }

    pub fn window_end(&self) -> NaiveDate {
        self.end_date.unwrap_or_else(latest)
    }

    /// Closed-interval containment test
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.window_start() <= date && date <= self.window_end()
    }

    fn overlaps(&self, other: &Period) -> bool {
        self.window_start() <= other.window_end() && other.window_start() <= self.window_end()
    }
}

// ============================================================================
// CATALOG ITEM
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogItem {
    pub name: String,

    /// Ordered reissue rules
    pub periods: Vec<Period>,

    /// Monetary compensation value of the item
    pub cash: f64,
}

impl CatalogItem {
    pub fn new(name: impl Into<String>, cash: f64) -> Self {
        CatalogItem {
            name: name.into(),
            periods: Vec::new(),
            cash,
        }
    }

    pub fn with_period(mut self, period: Period) -> Self {
        self.periods.push(period);
        self
    }

    /// Start of the first rule window (earliest date if unbounded or no rules)
    pub fn first_period_start(&self) -> NaiveDate {
        self.periods
            .first()
            .map(Period::window_start)
            .unwrap_or_else(earliest)
    }

    /// Index pairs of rules whose windows overlap (not rejected, only reported)
    pub fn overlapping_periods(&self) -> Vec<(usize, usize)> {
        let mut pairs = Vec::new();
        for (i, a) in self.periods.iter().enumerate() {
            for (j, b) in self.periods.iter().enumerate().skip(i + 1) {
                if a.overlaps(b) {
                    pairs.push((i, j));
                }
            }
        }
        pairs
    }
}

// ============================================================================
// RAW (on-disk) FORM
// ============================================================================

#[derive(Debug, Deserialize)]
struct RawPeriod {
    start_date: Option<String>,
    end_date: Option<String>,
    period_months: u32,
    quantity: u32,
}

#[derive(Debug, Deserialize)]
struct RawCatalogItem {
    #[serde(alias = "name")]
    item_name: String,
    #[serde(default)]
    periods: Vec<RawPeriod>,
    #[serde(default)]
    cash: Option<f64>,
}

impl RawCatalogItem {
    fn into_item(self) -> Result<CatalogItem, EngineError> {
        let mut periods = Vec::with_capacity(self.periods.len());

        for (index, raw) in self.periods.into_iter().enumerate() {
            let start_field = format!("{}.periods[{}].start_date", self.item_name, index);
            let end_field = format!("{}.periods[{}].end_date", self.item_name, index);

            periods.push(Period {
                start_date: parse_optional_date(&start_field, raw.start_date.as_deref())?,
                end_date: parse_optional_date(&end_field, raw.end_date.as_deref())?,
                period_months: raw.period_months,
                quantity: raw.quantity,
            });
        }

        Ok(CatalogItem {
            name: self.item_name,
            periods,
            cash: self.cash.unwrap_or(0.0),
        })
    }
}

// ============================================================================
// CATALOG PARTITION
// ============================================================================

/// One gender/rank collection of items, in file order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CatalogPartition {
    items: Vec<CatalogItem>,
}

impl CatalogPartition {
    pub fn new(items: Vec<CatalogItem>) -> Self {
        CatalogPartition { items }
    }

    /// Parse a partition from its JSON array form
    pub fn from_json_str(json: &str) -> Result<Self> {
        let raw: Vec<RawCatalogItem> =
            serde_json::from_str(json).context("Failed to parse catalog JSON")?;

        let items = raw
            .into_iter()
            .map(RawCatalogItem::into_item)
            .collect::<Result<Vec<_>, _>>()?;

        for item in &items {
            for (a, b) in item.overlapping_periods() {
                tracing::warn!(item = %item.name, first = a, second = b, "catalog periods overlap");
            }
        }

        Ok(CatalogPartition { items })
    }

    /// Load a partition from a JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read catalog file: {:?}", path.as_ref()))?;

        Self::from_json_str(&content)
            .with_context(|| format!("Invalid catalog file: {:?}", path.as_ref()))
    }

    pub fn get(&self, name: &str) -> Option<&CatalogItem> {
        self.items.iter().find(|item| item.name == name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.items.iter().map(|item| item.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

// ============================================================================
// CATALOG
// ============================================================================

/// File names of the four partitions inside a catalog directory
pub const MALE_BASE_FILE: &str = "non_officer_data.json";
pub const MALE_PROMOTED_FILE: &str = "officer_data.json";
pub const FEMALE_BASE_FILE: &str = "woman_non_officer_data.json";
pub const FEMALE_PROMOTED_FILE: &str = "woman_officer_data.json";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Catalog {
    male_base: CatalogPartition,
    male_promoted: CatalogPartition,
    female_base: CatalogPartition,
    female_promoted: CatalogPartition,
}

impl Catalog {
    pub fn new(
        male_base: CatalogPartition,
        male_promoted: CatalogPartition,
        female_base: CatalogPartition,
        female_promoted: CatalogPartition,
    ) -> Self {
        Catalog {
            male_base,
            male_promoted,
            female_base,
            female_promoted,
        }
    }

    /// Load all four partitions from a directory
    pub fn from_dir<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref();

        let catalog = Catalog {
            male_base: CatalogPartition::from_file(dir.join(MALE_BASE_FILE))?,
            male_promoted: CatalogPartition::from_file(dir.join(MALE_PROMOTED_FILE))?,
            female_base: CatalogPartition::from_file(dir.join(FEMALE_BASE_FILE))?,
            female_promoted: CatalogPartition::from_file(dir.join(FEMALE_PROMOTED_FILE))?,
        };

        tracing::info!(
            dir = %dir.display(),
            male_base = catalog.male_base.len(),
            male_promoted = catalog.male_promoted.len(),
            female_base = catalog.female_base.len(),
            female_promoted = catalog.female_promoted.len(),
            "catalog loaded"
        );

        Ok(catalog)
    }

    pub fn partition(&self, gender: Gender, rank: Rank) -> &CatalogPartition {
        match (gender, rank) {
            (Gender::Male, Rank::Base) => &self.male_base,
            (Gender::Male, Rank::Promoted) => &self.male_promoted,
            (Gender::Female, Rank::Base) => &self.female_base,
            (Gender::Female, Rank::Promoted) => &self.female_promoted,
        }
    }

    /// Entry for `name` on the given gender/rank path, if any
    pub fn item(&self, gender: Gender, rank: Rank, name: &str) -> Option<&CatalogItem> {
        self.partition(gender, rank).get(name)
    }

    /// Deduplicated union of item names visible to a gender.
    ///
    /// Promoted names come first in file order, followed by base-only names.
    pub fn item_names(&self, gender: Gender) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();

        for rank in [Rank::Promoted, Rank::Base] {
            for name in self.partition(gender, rank).names() {
                if !names.iter().any(|existing| existing == name) {
                    names.push(name.to_string());
                }
            }
        }

        names
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

    const BASE_JSON: &str = r#"[
        {
            "item_name": "Winter jacket",
            "periods": [
                { "start_date": null, "end_date": "31.12.2019", "period_months": 36, "quantity": 1 },
                { "start_date": "01.01.2020", "end_date": null, "period_months": 24, "quantity": 1 }
            ],
            "cash": 120.5
        },
        {
            "item_name": "Boots",
            "periods": [
                { "start_date": "2018-03-01", "end_date": null, "period_months": 12, "quantity": 2 }
            ]
        }
    ]"#;

    #[test]
    fn test_partition_from_json() {
        let partition = CatalogPartition::from_json_str(BASE_JSON).unwrap();

        assert_eq!(partition.len(), 2);

        let jacket = partition.get("Winter jacket").unwrap();
        assert_eq!(jacket.cash, 120.5);
        assert_eq!(jacket.periods.len(), 2);
        assert_eq!(jacket.periods[0].start_date, None);
        assert_eq!(jacket.periods[0].end_date, Some(ymd(2019, 12, 31)));
        assert_eq!(jacket.periods[1].period_months, 24);

        let boots = partition.get("Boots").unwrap();
        assert_eq!(boots.cash, 0.0);
        assert_eq!(boots.first_period_start(), ymd(2018, 3, 1));

        assert!(partition.get("Helmet").is_none());
    }

    #[test]
    fn test_malformed_catalog_date_rejected() {
        let json = r#"[{
            "item_name": "Cap",
            "periods": [{ "start_date": "32.01.2019", "end_date": null, "period_months": 12, "quantity": 1 }],
            "cash": 5
        }]"#;

        let err = CatalogPartition::from_json_str(json).unwrap_err();
        let engine_err = err.downcast_ref::<EngineError>().unwrap();

        assert!(matches!(engine_err, EngineError::MalformedDate { field, .. } if field == "Cap.periods[0].start_date"));
    }

    #[test]
    fn test_period_contains_inclusive_bounds() {
        let period = Period::between(Some(ymd(2020, 1, 1)), Some(ymd(2020, 12, 31)), 12, 1);

        assert!(period.contains(ymd(2020, 1, 1)));
        assert!(period.contains(ymd(2020, 12, 31)));
        assert!(!period.contains(ymd(2019, 12, 31)));
        assert!(!period.contains(ymd(2021, 1, 1)));

        let open = Period::always(6, 1);
        assert!(open.contains(ymd(1900, 1, 1)));
        assert!(open.contains(ymd(2999, 1, 1)));
    }

    #[test]
    fn test_overlapping_periods_reported() {
        let item = CatalogItem::new("Shirt", 10.0)
            .with_period(Period::between(None, Some(ymd(2020, 6, 30)), 12, 1))
            .with_period(Period::between(Some(ymd(2020, 6, 30)), None, 6, 2));

        assert_eq!(item.overlapping_periods(), vec![(0, 1)]);
    }

    #[test]
    fn test_item_names_union_is_deduplicated() {
        let base = CatalogPartition::new(vec![
            CatalogItem::new("Boots", 1.0),
            CatalogItem::new("Shirt", 1.0),
        ]);
        let promoted = CatalogPartition::new(vec![
            CatalogItem::new("Cap badge", 1.0),
            CatalogItem::new("Boots", 2.0),
        ]);

        let catalog = Catalog::new(base, promoted, CatalogPartition::default(), CatalogPartition::default());

        assert_eq!(
            catalog.item_names(Gender::Male),
            vec!["Cap badge".to_string(), "Boots".to_string(), "Shirt".to_string()]
        );
        assert!(catalog.item_names(Gender::Female).is_empty());
        assert_eq!(catalog.item(Gender::Male, Rank::Promoted, "Boots").unwrap().cash, 2.0);
    }

    #[test]
    fn test_gender_from_str() {
        assert_eq!("male".parse::<Gender>().unwrap(), Gender::Male);
        assert_eq!("Female".parse::<Gender>().unwrap(), Gender::Female);
        assert!("other".parse::<Gender>().is_err());
    }

    #[test]
    fn test_catalog_from_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(MALE_BASE_FILE), BASE_JSON).unwrap();
        std::fs::write(dir.path().join(MALE_PROMOTED_FILE), "[]").unwrap();
        std::fs::write(dir.path().join(FEMALE_BASE_FILE), "[]").unwrap();
        std::fs::write(dir.path().join(FEMALE_PROMOTED_FILE), "[]").unwrap();

        let catalog = Catalog::from_dir(dir.path()).unwrap();

        assert_eq!(catalog.partition(Gender::Male, Rank::Base).len(), 2);
        assert!(catalog.partition(Gender::Female, Rank::Promoted).is_empty());
    }

    #[test]
    fn test_catalog_from_dir_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Catalog::from_dir(dir.path()).is_err());
    }
}
