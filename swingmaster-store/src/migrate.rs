//! RC schema migrations. Deterministic, idempotent, no business logic.

use rusqlite::Connection;

use crate::error::StoreError;

const RC_SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS rc_run (
  run_id TEXT PRIMARY KEY,
  created_at TEXT NOT NULL,
  engine_version TEXT NOT NULL,
  policy_id TEXT NOT NULL,
  policy_version TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS rc_state_daily (
  ticker TEXT NOT NULL,
  date TEXT NOT NULL,
  state TEXT NOT NULL,
  reasons_json TEXT NOT NULL,
  confidence INTEGER,
  age INTEGER NOT NULL,
  state_attrs_json TEXT,
  run_id TEXT NOT NULL,
  PRIMARY KEY (ticker, date)
);

CREATE TABLE IF NOT EXISTS rc_transition (
  ticker TEXT NOT NULL,
  date TEXT NOT NULL,
  from_state TEXT NOT NULL,
  to_state TEXT NOT NULL,
  reasons_json TEXT NOT NULL,
  state_attrs_json TEXT,
  run_id TEXT NOT NULL,
  UNIQUE (ticker, date)
);

CREATE TABLE IF NOT EXISTS rc_signal_daily (
  ticker TEXT NOT NULL,
  date TEXT NOT NULL,
  signal_keys_json TEXT NOT NULL,
  run_id TEXT NOT NULL,
  PRIMARY KEY (ticker, date)
);

CREATE TABLE IF NOT EXISTS rc_ew_score_daily (
  ticker TEXT NOT NULL,
  date TEXT NOT NULL,
  ew_score_day3 REAL,
  ew_level_day3 INTEGER,
  ew_rule TEXT,
  inputs_json TEXT,
  created_at TEXT NOT NULL DEFAULT (datetime('now')),
  PRIMARY KEY (ticker, date)
);

CREATE INDEX IF NOT EXISTS idx_rc_state_daily_date ON rc_state_daily (date, state);
CREATE INDEX IF NOT EXISTS idx_rc_transition_to_state ON rc_transition (to_state, date);
";

/// Create the RC tables. Safe to run on every connection before any row
/// operation.
pub fn apply_migrations(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(RC_SCHEMA)?;
    ew_dual_mode_columns(conn)?;
    Ok(())
}

const DUAL_MODE_COLUMNS: [(&str, &str); 8] = [
    ("ew_score_fastpass", "REAL"),
    ("ew_level_fastpass", "INTEGER"),
    ("ew_rule_fastpass", "TEXT"),
    ("inputs_json_fastpass", "TEXT"),
    ("ew_score_rolling", "REAL"),
    ("ew_level_rolling", "INTEGER"),
    ("ew_rule_rolling", "TEXT"),
    ("inputs_json_rolling", "TEXT"),
];

/// Add the fastpass/rolling column groups to `rc_ew_score_daily`.
/// Idempotent: re-running adds nothing. Fails with a clear error when the
/// base table itself is absent.
pub fn ew_dual_mode_columns(conn: &Connection) -> Result<(), StoreError> {
    let table_exists: bool = conn
        .query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'rc_ew_score_daily'",
            [],
            |row| row.get::<_, i64>(0),
        )
        .map(|n| n > 0)?;
    if !table_exists {
        return Err(StoreError::SchemaMissing(
            "rc_ew_score_daily does not exist; run the base migrations first".into(),
        ));
    }

    let mut stmt = conn.prepare("PRAGMA table_info(rc_ew_score_daily)")?;
    let existing: Vec<String> = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .collect::<Result<_, _>>()?;

    for (name, sql_type) in DUAL_MODE_COLUMNS {
        if !existing.iter().any(|c| c == name) {
            conn.execute(
                &format!("ALTER TABLE rc_ew_score_daily ADD COLUMN {name} {sql_type}"),
                [],
            )?;
        }
    }
    Ok(())
}
