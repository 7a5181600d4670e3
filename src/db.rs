// 🗄️ Person Store - SQLite persistence around the engine
//
// One row per person: temporal attributes + the persisted ledger (JSON).
// Reads reconcile the stored ledger against a fresh schedule and write the
// result back. The read-reconcile-write sequence runs in an IMMEDIATE
// transaction and the write is a compare-and-swap on the ledger version
// token, so two concurrent refreshes of one person can never both win.

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Transaction, TransactionBehavior};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::catalog::Gender;
use crate::dates::parse_date;
use crate::engine::IssuanceEngine;
use crate::ledger::{self, ItemLedgerEntry};
use crate::person::{PersonAttributes, PersonInput};
use crate::reconciler::ReconciliationReport;

const ENTITY_PERSON: &str = "person";

/// Entity id of events that concern every person
const ALL_PERSONS: &str = "*";

/// Store-level failures callers may want to tell apart
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("person not found: {0}")]
    NotFound(String),

    #[error("a person named {0:?} already exists")]
    DuplicateName(String),

    #[error("ledger of person {0} was modified concurrently")]
    ConcurrentUpdate(String),
}

/// A person with their persisted ledger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Person {
    /// Stable identity (UUID)
    pub id: String,
    pub name: String,

    #[serde(flatten)]
    pub attributes: PersonAttributes,

    pub ledger: Vec<ItemLedgerEntry>,

    /// SHA-256 of the ledger JSON, the compare-and-swap token
    pub ledger_version: String,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Event for audit trail ("every change is an event")
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Event {
    pub event_id: String,
    pub timestamp: DateTime<Utc>,
    pub event_type: String,
    pub entity_type: String,
    pub entity_id: String,
    pub data: serde_json::Value,
    pub actor: String,
}

impl Event {
    pub fn new(
        event_type: &str,
        entity_type: &str,
        entity_id: &str,
        data: serde_json::Value,
        actor: &str,
    ) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            event_type: event_type.to_string(),
            entity_type: entity_type.to_string(),
            entity_id: entity_id.to_string(),
            data,
            actor: actor.to_string(),
        }
    }
}

/// Version token of a ledger (hex SHA-256 of its JSON form)
pub fn ledger_version(ledger: &[ItemLedgerEntry]) -> Result<String> {
    let json = serde_json::to_vec(ledger).context("Failed to serialize ledger")?;
    let mut hasher = Sha256::new();
    hasher.update(&json);
    Ok(format!("{:x}", hasher.finalize()))
}

pub fn setup_database(conn: &Connection) -> Result<()> {
    // Enable WAL mode for crash recovery
    conn.pragma_update(None, "journal_mode", "WAL")?;

    // ==========================================================================
    // Persons Table (attributes + ledger JSON + version token)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS persons (
            id TEXT PRIMARY KEY,
            name TEXT UNIQUE NOT NULL,
            gender TEXT NOT NULL,
            service_start_date TEXT NOT NULL,
            promotion_date TEXT NOT NULL,
            maternity_leave_start TEXT,
            maternity_leave_duration INTEGER NOT NULL DEFAULT 0,
            ledger TEXT NOT NULL,
            ledger_version TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
        [],
    )?;

    // ==========================================================================
    // Events Table (audit trail)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            event_id TEXT UNIQUE NOT NULL,
            timestamp TEXT NOT NULL,
            event_type TEXT NOT NULL,
            entity_type TEXT NOT NULL,
            entity_id TEXT NOT NULL,
            data TEXT NOT NULL,
            actor TEXT NOT NULL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_events_entity ON events(entity_type, entity_id)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_events_timestamp ON events(timestamp)",
        [],
    )?;

    Ok(())
}

// ============================================================================
// EVENTS
// ============================================================================

/// Insert event into audit trail
pub fn insert_event(conn: &Connection, event: &Event) -> Result<()> {
    let data_json = serde_json::to_string(&event.data)?;

    conn.execute(
        "INSERT INTO events (
            event_id, timestamp, event_type, entity_type, entity_id, data, actor
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            event.event_id,
            event.timestamp.to_rfc3339(),
            event.event_type,
            event.entity_type,
            event.entity_id,
            data_json,
            event.actor,
        ],
    )?;

    Ok(())
}

/// Get events for a specific entity, newest first
pub fn get_events_for_entity(
    conn: &Connection,
    entity_type: &str,
    entity_id: &str,
) -> Result<Vec<Event>> {
    let mut stmt = conn.prepare(
        "SELECT event_id, timestamp, event_type, entity_type, entity_id, data, actor
         FROM events
         WHERE entity_type = ?1 AND entity_id = ?2
         ORDER BY id DESC",
    )?;

    let rows = stmt
        .query_map(params![entity_type, entity_id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, String>(5)?,
                row.get::<_, String>(6)?,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    rows.into_iter()
        .map(
            |(event_id, timestamp, event_type, entity_type, entity_id, data, actor)| {
                Ok(Event {
                    event_id,
                    timestamp: DateTime::parse_from_rfc3339(&timestamp)
                        .context("Invalid event timestamp")?
                        .with_timezone(&Utc),
                    event_type,
                    entity_type,
                    entity_id,
                    data: serde_json::from_str(&data).context("Invalid event data")?,
                    actor,
                })
            },
        )
        .collect()
}

fn record_event(conn: &Connection, event_type: &str, person_id: &str, data: serde_json::Value) -> Result<()> {
    insert_event(conn, &Event::new(event_type, ENTITY_PERSON, person_id, data, "system"))
}

// ============================================================================
// ROW MAPPING
// ============================================================================

const PERSON_COLUMNS: &str = "id, name, gender, service_start_date, promotion_date,
    maternity_leave_start, maternity_leave_duration, ledger, ledger_version,
    created_at, updated_at";

/// Raw column values, decoded outside the rusqlite row callback
struct PersonRow {
    id: String,
    name: String,
    gender: String,
    service_start_date: String,
    promotion_date: String,
    maternity_leave_start: Option<String>,
    maternity_leave_duration: u32,
    ledger: String,
    ledger_version: String,
    created_at: String,
    updated_at: String,
}

impl PersonRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(PersonRow {
            id: row.get(0)?,
            name: row.get(1)?,
            gender: row.get(2)?,
            service_start_date: row.get(3)?,
            promotion_date: row.get(4)?,
            maternity_leave_start: row.get(5)?,
            maternity_leave_duration: row.get(6)?,
            ledger: row.get(7)?,
            ledger_version: row.get(8)?,
            created_at: row.get(9)?,
            updated_at: row.get(10)?,
        })
    }

    fn into_person(self) -> Result<Person> {
        let gender = self.gender.parse::<Gender>().map_err(|e| anyhow!(e))?;
        let maternity_leave_start = self
            .maternity_leave_start
            .as_deref()
            .map(|raw| parse_date("maternity_leave_start", raw))
            .transpose()?;

        Ok(Person {
            attributes: PersonAttributes {
                gender,
                service_start_date: parse_date("service_start_date", &self.service_start_date)?,
                promotion_date: parse_date("promotion_date", &self.promotion_date)?,
                maternity_leave_start,
                maternity_leave_duration: self.maternity_leave_duration,
            },
            ledger: serde_json::from_str(&self.ledger)
                .with_context(|| format!("Invalid stored ledger for person {}", self.id))?,
            ledger_version: self.ledger_version,
            created_at: parse_timestamp(&self.created_at)?,
            updated_at: parse_timestamp(&self.updated_at)?,
            id: self.id,
            name: self.name,
        })
    }
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(raw)
        .with_context(|| format!("Invalid timestamp: {raw}"))?
        .with_timezone(&Utc))
}

fn date_column(date: Option<NaiveDate>) -> Option<String> {
    date.map(|d| d.to_string())
}

// ============================================================================
// QUERIES
// ============================================================================

/// Look up one person; `None` if the id is unknown
pub fn find_person(conn: &Connection, id: &str) -> Result<Option<Person>> {
    let sql = format!("SELECT {PERSON_COLUMNS} FROM persons WHERE id = ?1");

    let row = conn
        .query_row(&sql, params![id], PersonRow::from_row)
        .optional()?;

    row.map(PersonRow::into_person).transpose()
}

/// Look up one person without refreshing the ledger
pub fn get_person(conn: &Connection, id: &str) -> Result<Person> {
    find_person(conn, id)?.ok_or_else(|| StoreError::NotFound(id.to_string()).into())
}

/// All persons, ordered by name
pub fn list_persons(conn: &Connection) -> Result<Vec<Person>> {
    let sql = format!("SELECT {PERSON_COLUMNS} FROM persons ORDER BY name");
    let mut stmt = conn.prepare(&sql)?;

    let rows = stmt
        .query_map([], PersonRow::from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    rows.into_iter().map(PersonRow::into_person).collect()
}

pub fn count_persons(conn: &Connection) -> Result<i64> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM persons", [], |row| row.get(0))?;

    Ok(count)
}

// ============================================================================
// MUTATIONS
// ============================================================================

/// Enroll a person and store their initial ledger as of `now`.
///
/// The name check, insert and audit event commit together.
pub fn enroll_person(
    conn: &Connection,
    engine: &IssuanceEngine,
    name: &str,
    input: &PersonInput,
    now: NaiveDate,
) -> Result<Person> {
    let name = name.trim();
    if name.is_empty() {
        return Err(anyhow!("person name is required"));
    }

    let attributes = input.validate()?;
    let ledger = engine.compute_ledger(&attributes, now);
    let id = uuid::Uuid::new_v4().to_string();

    let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?;

    let exists: bool = tx.query_row(
        "SELECT EXISTS(SELECT 1 FROM persons WHERE name = ?1)",
        params![name],
        |row| row.get(0),
    )?;
    if exists {
        return Err(StoreError::DuplicateName(name.to_string()).into());
    }

    insert_person(&tx, &id, name, &attributes, &ledger)?;

    record_event(
        &tx,
        "person_enrolled",
        &id,
        serde_json::json!({
            "name": name,
            "as_of": now.to_string(),
            "issuances": ledger.iter().map(|e| e.issuances.len()).sum::<usize>(),
        }),
    )?;

    let person = get_person(&tx, &id)?;
    tx.commit()?;

    tracing::info!(person = %id, name, items = ledger.len(), "person enrolled");

    Ok(person)
}

/// Insert a person row; a name taken in the meantime is a `DuplicateName`
fn insert_person(
    conn: &Connection,
    id: &str,
    name: &str,
    attributes: &PersonAttributes,
    ledger: &[ItemLedgerEntry],
) -> Result<()> {
    let version = ledger_version(ledger)?;
    let ledger_json = serde_json::to_string(ledger)?;
    let timestamp = Utc::now().to_rfc3339();

    let inserted = conn.execute(
        "INSERT INTO persons (
            id, name, gender, service_start_date, promotion_date,
            maternity_leave_start, maternity_leave_duration, ledger, ledger_version,
            created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?10)",
        params![
            id,
            name,
            attributes.gender.as_str(),
            attributes.service_start_date.to_string(),
            attributes.promotion_date.to_string(),
            date_column(attributes.maternity_leave_start),
            attributes.maternity_leave_duration,
            ledger_json,
            version,
            timestamp,
        ],
    );

    match inserted {
        Ok(_) => Ok(()),
        Err(rusqlite::Error::SqliteFailure(failure, _))
            if failure.code == ErrorCode::ConstraintViolation =>
        {
            Err(StoreError::DuplicateName(name.to_string()).into())
        }
        Err(e) => Err(anyhow::Error::from(e).context("Failed to insert person")),
    }
}

/// Replace a person's ledger if its version still equals `expected_version`.
///
/// Returns the new version token.
pub fn store_ledger(
    conn: &Connection,
    id: &str,
    ledger: &[ItemLedgerEntry],
    expected_version: &str,
) -> Result<String> {
    let version = ledger_version(ledger)?;
    let ledger_json = serde_json::to_string(ledger)?;

    let updated = conn.execute(
        "UPDATE persons
         SET ledger = ?1, ledger_version = ?2, updated_at = ?3
         WHERE id = ?4 AND ledger_version = ?5",
        params![ledger_json, version, Utc::now().to_rfc3339(), id, expected_version],
    )?;

    if updated == 0 {
        return Err(match find_person(conn, id)? {
            Some(_) => StoreError::ConcurrentUpdate(id.to_string()),
            None => StoreError::NotFound(id.to_string()),
        }
        .into());
    }

    Ok(version)
}

/// Read a person, reconciling their ledger as of `now` and persisting the merge.
///
/// A failed computation (a regression, or `now` earlier than the stored
/// history) rolls back and leaves the stored ledger untouched.
pub fn refresh_person(
    conn: &mut Connection,
    engine: &IssuanceEngine,
    id: &str,
    now: NaiveDate,
) -> Result<(Person, ReconciliationReport)> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let mut person = get_person(&tx, id)?;
    let report = engine
        .refresh(&person.ledger, &person.attributes, now)
        .with_context(|| format!("Failed to reconcile ledger of person {id}"))?;

    if report.changed() {
        person.ledger_version = store_ledger(&tx, id, &report.ledger, &person.ledger_version)?;
        person.ledger = report.ledger.clone();

        record_event(
            &tx,
            "ledger_reconciled",
            id,
            serde_json::json!({
                "as_of": now.to_string(),
                "changes": report.changes,
            }),
        )?;

        tracing::info!(person = %id, as_of = %now, "{}", report.summary());
    }

    tx.commit()?;
    Ok((person, report))
}

/// Consumption tracking: set `usedCount` of one issuance
pub fn record_usage(
    conn: &mut Connection,
    id: &str,
    item: &str,
    index: usize,
    used: u32,
) -> Result<Person> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let mut person = get_person(&tx, id)?;
    ledger::record_usage(&mut person.ledger, item, index, used)?;
    person.ledger_version = store_ledger(&tx, id, &person.ledger, &person.ledger_version)?;

    record_event(
        &tx,
        "usage_recorded",
        id,
        serde_json::json!({ "item": item, "index": index, "used": used }),
    )?;

    tx.commit()?;
    Ok(person)
}

/// Replace a person's temporal attributes (e.g. a maternity window added later).
///
/// The ledger is not recomputed here; the next refresh extends it.
pub fn update_person_attributes(conn: &Connection, id: &str, input: &PersonInput) -> Result<Person> {
    let attributes = input.validate()?;

    let updated = conn.execute(
        "UPDATE persons
         SET gender = ?1, service_start_date = ?2, promotion_date = ?3,
             maternity_leave_start = ?4, maternity_leave_duration = ?5, updated_at = ?6
         WHERE id = ?7",
        params![
            attributes.gender.as_str(),
            attributes.service_start_date.to_string(),
            attributes.promotion_date.to_string(),
            date_column(attributes.maternity_leave_start),
            attributes.maternity_leave_duration,
            Utc::now().to_rfc3339(),
            id,
        ],
    )?;

    if updated == 0 {
        return Err(StoreError::NotFound(id.to_string()).into());
    }

    record_event(conn, "person_updated", id, serde_json::to_value(&attributes)?)?;

    get_person(conn, id)
}

pub fn delete_person(conn: &Connection, id: &str) -> Result<()> {
    let deleted = conn.execute("DELETE FROM persons WHERE id = ?1", params![id])?;

    if deleted == 0 {
        return Err(StoreError::NotFound(id.to_string()).into());
    }

    record_event(conn, "person_deleted", id, serde_json::json!({}))?;
    Ok(())
}

/// Delete every person; returns how many were removed
pub fn delete_all_persons(conn: &Connection) -> Result<usize> {
    let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?;

    let deleted = tx.execute("DELETE FROM persons", [])?;
    record_event(&tx, "persons_cleared", ALL_PERSONS, serde_json::json!({ "deleted": deleted }))?;

    tx.commit()?;
    tracing::warn!(deleted, "all persons deleted");
    Ok(deleted)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Catalog, CatalogItem, CatalogPartition, Period};
    use crate::error::EngineError;
    use crate::ledger::UsageError;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn engine_with(boots: Period) -> IssuanceEngine {
        let items = vec![
            CatalogItem::new("Boots", 30.0).with_period(boots),
            CatalogItem::new("Shirt", 8.0).with_period(Period::always(6, 2)),
        ];
        IssuanceEngine::new(Catalog::new(
            CatalogPartition::new(items.clone()),
            CatalogPartition::new(items.clone()),
            CatalogPartition::new(items.clone()),
            CatalogPartition::new(items),
        ))
    }

    fn engine() -> IssuanceEngine {
        engine_with(Period::always(12, 1))
    }

    fn input() -> PersonInput {
        PersonInput {
            gender: Some("male".to_string()),
            service_start_date: Some("2018-01-15".to_string()),
            promotion_date: Some("2020-01-15".to_string()),
            maternity_leave_start: None,
            maternity_leave_duration: None,
        }
    }

    fn setup() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();
        conn
    }

    fn boots(person: &Person) -> &ItemLedgerEntry {
        person.ledger.iter().find(|e| e.name == "Boots").unwrap()
    }

    #[test]
    fn test_enroll_and_get() {
        let conn = setup();
        let person = enroll_person(&conn, &engine(), "Ivan Petrov", &input(), ymd(2019, 6, 1)).unwrap();

        assert_eq!(person.name, "Ivan Petrov");
        assert_eq!(person.attributes.promotion_date, ymd(2020, 1, 15));
        assert_eq!(boots(&person).issuances.len(), 2);
        assert_eq!(person.ledger_version, ledger_version(&person.ledger).unwrap());

        let loaded = get_person(&conn, &person.id).unwrap();
        assert_eq!(loaded, person);
        assert_eq!(count_persons(&conn).unwrap(), 1);
    }

    #[test]
    fn test_enroll_rejects_duplicate_name_and_bad_input() {
        let conn = setup();
        enroll_person(&conn, &engine(), "Ivan Petrov", &input(), ymd(2019, 6, 1)).unwrap();

        let err = enroll_person(&conn, &engine(), "Ivan Petrov", &input(), ymd(2019, 6, 1)).unwrap_err();
        assert_eq!(
            err.downcast_ref::<StoreError>(),
            Some(&StoreError::DuplicateName("Ivan Petrov".to_string()))
        );

        let mut incomplete = input();
        incomplete.gender = None;
        let err = enroll_person(&conn, &engine(), "Olga", &incomplete, ymd(2019, 6, 1)).unwrap_err();
        assert_eq!(
            err.downcast_ref::<EngineError>(),
            Some(&EngineError::MissingRequiredAttribute("gender"))
        );
        assert_eq!(count_persons(&conn).unwrap(), 1);
    }

    #[test]
    fn test_refresh_appends_and_persists() {
        let mut conn = setup();
        let person = enroll_person(&conn, &engine(), "Ivan Petrov", &input(), ymd(2019, 6, 1)).unwrap();

        let (refreshed, report) = refresh_person(&mut conn, &engine(), &person.id, ymd(2020, 2, 1)).unwrap();

        assert!(report.changed());
        assert_eq!(boots(&refreshed).issuances.len(), 3);
        assert_ne!(refreshed.ledger_version, person.ledger_version);

        let stored = get_person(&conn, &person.id).unwrap();
        assert_eq!(stored.ledger, refreshed.ledger);
        assert_eq!(stored.ledger_version, refreshed.ledger_version);

        let events = get_events_for_entity(&conn, ENTITY_PERSON, &person.id).unwrap();
        assert_eq!(events[0].event_type, "ledger_reconciled");
        assert_eq!(events[1].event_type, "person_enrolled");
    }

    #[test]
    fn test_refresh_without_changes_does_not_write() {
        let mut conn = setup();
        let person = enroll_person(&conn, &engine(), "Ivan Petrov", &input(), ymd(2019, 6, 1)).unwrap();

        let (refreshed, report) = refresh_person(&mut conn, &engine(), &person.id, ymd(2019, 6, 1)).unwrap();

        assert!(!report.changed());
        assert_eq!(refreshed.ledger_version, person.ledger_version);
        assert_eq!(get_events_for_entity(&conn, ENTITY_PERSON, &person.id).unwrap().len(), 1);
    }

    #[test]
    fn test_usage_survives_refresh() {
        let mut conn = setup();
        let person = enroll_person(&conn, &engine(), "Ivan Petrov", &input(), ymd(2019, 6, 1)).unwrap();

        let updated = record_usage(&mut conn, &person.id, "Boots", 1, 1).unwrap();
        assert_eq!(boots(&updated).issuances[1].used_count, 1);

        let (refreshed, _) = refresh_person(&mut conn, &engine(), &person.id, ymd(2022, 2, 1)).unwrap();
        let entry = boots(&refreshed);

        assert_eq!(entry.issuances[1].used_count, 1);
        assert!(entry.issuances.len() > 2);
        assert!(entry.is_consistent());
    }

    #[test]
    fn test_usage_rejected_leaves_ledger_alone() {
        let mut conn = setup();
        let person = enroll_person(&conn, &engine(), "Ivan Petrov", &input(), ymd(2019, 6, 1)).unwrap();

        let err = record_usage(&mut conn, &person.id, "Boots", 0, 5).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<UsageError>(),
            Some(UsageError::UsageExceedsQuantity { .. })
        ));

        assert_eq!(get_person(&conn, &person.id).unwrap().ledger_version, person.ledger_version);
    }

    #[test]
    fn test_regression_leaves_stored_ledger_untouched() {
        let mut conn = setup();
        let person = enroll_person(&conn, &engine(), "Ivan Petrov", &input(), ymd(2021, 6, 1)).unwrap();

        // Catalog edit: boots rule now ends in 2018, so fewer issuances are produced
        let edited = engine_with(Period::between(None, Some(ymd(2018, 12, 31)), 12, 1));
        let err = refresh_person(&mut conn, &edited, &person.id, ymd(2021, 6, 1)).unwrap_err();

        assert!(matches!(
            err.downcast_ref::<EngineError>(),
            Some(EngineError::ReconciliationRegression { .. })
        ));
        assert_eq!(get_person(&conn, &person.id).unwrap(), person);
    }

    #[test]
    fn test_refresh_in_the_past_is_rejected() {
        let mut conn = setup();
        let person = enroll_person(&conn, &engine(), "Ivan Petrov", &input(), ymd(2021, 6, 1)).unwrap();

        let err = refresh_person(&mut conn, &engine(), &person.id, ymd(2019, 6, 1)).unwrap_err();

        assert!(matches!(
            err.downcast_ref::<EngineError>(),
            Some(EngineError::EvaluationBeforeHistory { .. })
        ));
        assert_eq!(get_person(&conn, &person.id).unwrap(), person);
    }

    #[test]
    fn test_store_ledger_compare_and_swap() {
        let conn = setup();
        let person = enroll_person(&conn, &engine(), "Ivan Petrov", &input(), ymd(2019, 6, 1)).unwrap();

        let err = store_ledger(&conn, &person.id, &person.ledger, "stale-version").unwrap_err();
        assert_eq!(
            err.downcast_ref::<StoreError>(),
            Some(&StoreError::ConcurrentUpdate(person.id.clone()))
        );

        let err = store_ledger(&conn, "missing", &person.ledger, "x").unwrap_err();
        assert_eq!(
            err.downcast_ref::<StoreError>(),
            Some(&StoreError::NotFound("missing".to_string()))
        );
    }

    #[test]
    fn test_update_attributes_adds_maternity_window() {
        let conn = setup();
        let mut female = input();
        female.gender = Some("female".to_string());
        let person = enroll_person(&conn, &engine(), "Anna", &female, ymd(2019, 6, 1)).unwrap();

        let mut with_leave = female.clone();
        with_leave.maternity_leave_start = Some("2019-07-01".to_string());
        with_leave.maternity_leave_duration = Some(12);

        let updated = update_person_attributes(&conn, &person.id, &with_leave).unwrap();

        assert_eq!(updated.attributes.maternity_leave_start, Some(ymd(2019, 7, 1)));
        assert_eq!(updated.attributes.maternity_leave_duration, 12);
        assert_eq!(updated.ledger, person.ledger);
    }

    #[test]
    fn test_delete() {
        let conn = setup();
        let a = enroll_person(&conn, &engine(), "A", &input(), ymd(2019, 6, 1)).unwrap();
        enroll_person(&conn, &engine(), "B", &input(), ymd(2019, 6, 1)).unwrap();
        enroll_person(&conn, &engine(), "C", &input(), ymd(2019, 6, 1)).unwrap();

        delete_person(&conn, &a.id).unwrap();
        assert!(find_person(&conn, &a.id).unwrap().is_none());
        assert!(delete_person(&conn, &a.id).is_err());

        let names: Vec<String> = list_persons(&conn).unwrap().into_iter().map(|p| p.name).collect();
        assert_eq!(names, vec!["B".to_string(), "C".to_string()]);

        assert_eq!(delete_all_persons(&conn).unwrap(), 2);
        assert_eq!(count_persons(&conn).unwrap(), 0);

        let cleared = get_events_for_entity(&conn, ENTITY_PERSON, ALL_PERSONS).unwrap();
        assert_eq!(cleared.len(), 1);
        assert_eq!(cleared[0].event_type, "persons_cleared");
        assert_eq!(cleared[0].data["deleted"], 2);
    }

    #[test]
    fn test_insert_taken_name_is_duplicate() {
        let conn = setup();
        let person = enroll_person(&conn, &engine(), "Ivan Petrov", &input(), ymd(2019, 6, 1)).unwrap();

        // A second writer that passed the existence check before the first commit
        let err = insert_person(&conn, "other-id", "Ivan Petrov", &person.attributes, &person.ledger)
            .unwrap_err();

        assert_eq!(
            err.downcast_ref::<StoreError>(),
            Some(&StoreError::DuplicateName("Ivan Petrov".to_string()))
        );
        assert_eq!(count_persons(&conn).unwrap(), 1);
    }

    #[test]
    fn test_enroll_commits_person_and_event_together() {
        let conn = setup();
        let person = enroll_person(&conn, &engine(), "Ivan Petrov", &input(), ymd(2019, 6, 1)).unwrap();

        assert!(conn.is_autocommit());
        let events = get_events_for_entity(&conn, ENTITY_PERSON, &person.id).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, "person_enrolled");
    }
}
