// Issuance Ledger - Core Library
// Scheduling engine, reconciler and person store, shared by the CLI and API server

pub mod dates;
pub mod error;
pub mod catalog;
pub mod resolver;       // Period Resolver
pub mod eligibility;    // Eligibility Clock
pub mod person;
pub mod ledger;
pub mod scheduler;      // Issuance Scheduler
pub mod aggregator;     // Schedule Aggregator
pub mod reconciler;     // Version Reconciler
pub mod engine;
pub mod db;
pub mod config;

// Re-export commonly used types
pub use catalog::{Catalog, CatalogItem, CatalogPartition, Gender, Period, Rank};
pub use error::EngineError;
pub use resolver::resolve;
pub use eligibility::{first_eligible_date, rank_at};
pub use person::{MaternityLeave, PersonAttributes, PersonInput};
pub use ledger::{
    IssuanceEvent, ItemLedgerEntry, UsageError,
    export_ledger_csv, write_ledger_csv,
};
pub use scheduler::{schedule_item, wear_expiry, ItemSchedule};
pub use aggregator::compute_ledger;
pub use reconciler::{reconcile, ItemChange, ReconciliationReport};
pub use engine::IssuanceEngine;
pub use db::{
    Person, Event, StoreError,
    setup_database, enroll_person, find_person, get_person, list_persons, count_persons,
    refresh_person, record_usage, update_person_attributes, delete_person, delete_all_persons,
    store_ledger, ledger_version, insert_event, get_events_for_entity,
};
pub use config::{AppConfig, ServerConfig};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
