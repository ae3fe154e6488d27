//! Repository for `rc_state_daily`, `rc_transition`, and `rc_signal_daily`.
//!
//! Serialization is canonical: reason lists keep decision order with the
//! `POLICY:` prefix, signal keys are sorted, and state-attrs JSON comes from
//! the typed status struct, so identical evaluations produce byte-identical
//! rows.

use chrono::NaiveDate;
use rusqlite::{params, Connection};

use swingmaster_core::domain::{ReasonCode, State, StateAttrs, Transition};
use swingmaster_core::signals::SignalSet;

use crate::error::StoreError;

pub struct RcStateRepo<'a> {
    conn: &'a Connection,
}

fn iso(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// An ENTRY_CONDITIONS_MET decision persists as exactly that, whatever
/// supporting reasons accompanied it.
fn normalize_reasons(reasons: &[ReasonCode]) -> Vec<ReasonCode> {
    if reasons.contains(&ReasonCode::EntryConditionsMet) {
        vec![ReasonCode::EntryConditionsMet]
    } else {
        reasons.to_vec()
    }
}

fn reasons_json(reasons: &[ReasonCode]) -> Result<String, StoreError> {
    let labels: Vec<String> = normalize_reasons(reasons)
        .into_iter()
        .map(|r| r.to_persisted())
        .collect();
    Ok(serde_json::to_string(&labels)?)
}

impl<'a> RcStateRepo<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    pub fn upsert_state(
        &self,
        ticker: &str,
        date: NaiveDate,
        state: State,
        reasons: &[ReasonCode],
        attrs: &StateAttrs,
        run_id: &str,
    ) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT INTO rc_state_daily
               (ticker, date, state, reasons_json, confidence, age, state_attrs_json, run_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT (ticker, date) DO UPDATE SET
               state = excluded.state,
               reasons_json = excluded.reasons_json,
               confidence = excluded.confidence,
               age = excluded.age,
               state_attrs_json = excluded.state_attrs_json,
               run_id = excluded.run_id",
            params![
                ticker,
                iso(date),
                state.as_str(),
                reasons_json(reasons)?,
                attrs.confidence,
                attrs.age,
                attrs.attrs_json(),
                run_id,
            ],
        )?;
        Ok(())
    }

    pub fn upsert_signals(
        &self,
        ticker: &str,
        date: NaiveDate,
        signals: &SignalSet,
        run_id: &str,
    ) -> Result<(), StoreError> {
        let keys_json = serde_json::to_string(&signals.sorted_labels())?;
        self.conn.execute(
            "INSERT INTO rc_signal_daily (ticker, date, signal_keys_json, run_id)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT (ticker, date) DO UPDATE SET
               signal_keys_json = excluded.signal_keys_json,
               run_id = excluded.run_id",
            params![ticker, iso(date), keys_json, run_id],
        )?;
        Ok(())
    }

    /// Stays are not recorded here; pass the transition only when the state
    /// actually moved.
    pub fn upsert_transition(
        &self,
        ticker: &str,
        date: NaiveDate,
        transition: Option<&Transition>,
        attrs: &StateAttrs,
        run_id: &str,
    ) -> Result<(), StoreError> {
        let Some(transition) = transition else {
            return Ok(());
        };
        self.conn.execute(
            "INSERT INTO rc_transition
               (ticker, date, from_state, to_state, reasons_json, state_attrs_json, run_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT (ticker, date) DO UPDATE SET
               from_state = excluded.from_state,
               to_state = excluded.to_state,
               reasons_json = excluded.reasons_json,
               state_attrs_json = excluded.state_attrs_json,
               run_id = excluded.run_id",
            params![
                ticker,
                iso(date),
                transition.from_state.as_str(),
                transition.to_state.as_str(),
                reasons_json(&transition.reasons)?,
                attrs.attrs_json(),
                run_id,
            ],
        )?;
        Ok(())
    }

    /// Tickers sitting in a given state on a date, alphabetical.
    pub fn tickers_in_state(
        &self,
        date: NaiveDate,
        state: State,
    ) -> Result<Vec<String>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT ticker FROM rc_state_daily WHERE date = ?1 AND state = ?2 ORDER BY ticker",
        )?;
        let rows = stmt
            .query_map(params![iso(date), state.as_str()], |row| row.get(0))?
            .collect::<Result<_, _>>()?;
        Ok(rows)
    }
}

/// Daily production list: per-day states joined to EW scores, best scores
/// first, unscored rows last.
#[derive(Debug, Clone)]
pub struct DailyListRow {
    pub ticker: String,
    pub state: String,
    pub ew_level_fastpass: Option<i64>,
    pub ew_score_fastpass: Option<f64>,
    pub ew_rule_fastpass: Option<String>,
}

pub fn fetch_daily_list(
    conn: &Connection,
    date: NaiveDate,
    state: Option<State>,
    limit: Option<usize>,
) -> Result<Vec<DailyListRow>, StoreError> {
    let mut sql = String::from(
        "SELECT s.ticker, s.state, e.ew_level_fastpass, e.ew_score_fastpass, e.ew_rule_fastpass
         FROM rc_state_daily s
         LEFT JOIN rc_ew_score_daily e ON e.ticker = s.ticker AND e.date = s.date
         WHERE s.date = ?1",
    );
    if state.is_some() {
        sql.push_str(" AND s.state = ?2");
    }
    sql.push_str(
        " ORDER BY CASE WHEN e.ew_score_fastpass IS NULL THEN 1 ELSE 0 END,
           e.ew_score_fastpass DESC, s.ticker ASC",
    );
    if let Some(limit) = limit {
        sql.push_str(&format!(" LIMIT {limit}"));
    }

    let map_row = |row: &rusqlite::Row<'_>| -> rusqlite::Result<DailyListRow> {
        Ok(DailyListRow {
            ticker: row.get(0)?,
            state: row.get(1)?,
            ew_level_fastpass: row.get(2)?,
            ew_score_fastpass: row.get(3)?,
            ew_rule_fastpass: row.get(4)?,
        })
    };

    let mut stmt = conn.prepare(&sql)?;
    let rows = match state {
        Some(state) => stmt
            .query_map(params![iso(date), state.as_str()], map_row)?
            .collect::<Result<Vec<_>, _>>()?,
        None => stmt
            .query_map(params![iso(date)], map_row)?
            .collect::<Result<Vec<_>, _>>()?,
    };
    Ok(rows)
}
