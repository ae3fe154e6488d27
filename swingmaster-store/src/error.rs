//! Storage error taxonomy.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    /// A migration helper found the base table missing entirely.
    #[error("schema missing: {0}")]
    SchemaMissing(String),

    /// An EW rule id with no locked model behind it.
    #[error("unknown EW score rule id: {0}")]
    UnknownRule(String),

    /// Persisted data that no longer parses (dates, enums, JSON payloads).
    #[error("corrupt row: {0}")]
    CorruptRow(String),

    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
