// ⚠️ Engine Errors
//
// Fatal conditions only. "Item not applicable" and "no applicable period"
// are ordinary outcomes (Option / loop stop) and never show up here.

use chrono::NaiveDate;

/// Errors raised by the scheduling engine and the reconciler.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    /// An input or catalog date could not be parsed
    #[error("malformed date in {field}: {value:?}")]
    MalformedDate { field: String, value: String },

    /// A person record lacks an attribute the scheduler needs
    #[error("missing required attribute: {0}")]
    MissingRequiredAttribute(&'static str),

    /// A fresh schedule has fewer issuances than the stored ledger
    #[error(
        "reconciliation regression for {item:?}: stored {stored} issuances, fresh schedule has {fresh}"
    )]
    ReconciliationRegression {
        item: String,
        stored: usize,
        fresh: usize,
    },

    /// A stored ledger was refreshed as of a date before its own history
    #[error("evaluation date {now} precedes recorded issuance of {item:?} on {last_issued}")]
    EvaluationBeforeHistory {
        item: String,
        last_issued: NaiveDate,
        now: NaiveDate,
    },
}
