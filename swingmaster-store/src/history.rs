//! SQLite-backed state-history port for the policy helpers.
//!
//! Ordering contract: most recent days strictly before the as-of date,
//! newest first. Unparseable rows are skipped rather than failing the
//! policy pass.

use chrono::NaiveDate;
use rusqlite::{params, Connection};

use swingmaster_core::domain::{ReasonCode, State};
use swingmaster_core::policy::{StateHistory, StateHistoryDay};
use swingmaster_core::signals::SignalKey;

pub struct SqliteStateHistory<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteStateHistory<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }
}

fn parse_labels(raw: Option<String>) -> Vec<String> {
    raw.and_then(|s| serde_json::from_str::<Vec<String>>(&s).ok())
        .unwrap_or_default()
}

impl StateHistory for SqliteStateHistory<'_> {
    fn recent_days(&self, ticker: &str, as_of: NaiveDate, limit: usize) -> Vec<StateHistoryDay> {
        if limit == 0 || ticker.is_empty() {
            return Vec::new();
        }
        let as_of = as_of.format("%Y-%m-%d").to_string();
        let Ok(mut stmt) = self.conn.prepare(
            "SELECT s.date, s.state, s.reasons_json, g.signal_keys_json
             FROM rc_state_daily s
             LEFT JOIN rc_signal_daily g ON g.ticker = s.ticker AND g.date = s.date
             WHERE s.ticker = ?1 AND s.date < ?2
             ORDER BY s.date DESC
             LIMIT ?3",
        ) else {
            return Vec::new();
        };

        let rows = stmt.query_map(params![ticker, as_of, limit as i64], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, Option<String>>(2)?,
                row.get::<_, Option<String>>(3)?,
            ))
        });
        let Ok(rows) = rows else {
            return Vec::new();
        };

        let mut days = Vec::new();
        for row in rows.flatten() {
            let (date_raw, state_raw, reasons_raw, keys_raw) = row;
            let Ok(date) = NaiveDate::parse_from_str(&date_raw, "%Y-%m-%d") else {
                continue;
            };
            let Some(state) = State::parse(&state_raw) else {
                continue;
            };
            let reasons: Vec<ReasonCode> = parse_labels(reasons_raw)
                .iter()
                .filter_map(|l| ReasonCode::from_persisted(l))
                .collect();
            let signal_keys: Vec<SignalKey> = parse_labels(keys_raw)
                .iter()
                .filter_map(|l| SignalKey::parse(l))
                .collect();
            days.push(StateHistoryDay {
                date,
                state,
                reasons,
                signal_keys,
            });
        }
        days
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migrate::apply_migrations;
    use crate::state_repo::RcStateRepo;
    use swingmaster_core::domain::StateAttrs;
    use swingmaster_core::signals::SignalSet;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, d).unwrap()
    }

    #[test]
    fn history_reads_back_states_reasons_and_signals() {
        let conn = Connection::open_in_memory().unwrap();
        apply_migrations(&conn).unwrap();
        let repo = RcStateRepo::new(&conn);

        repo.upsert_state(
            "AAPL",
            day(2),
            State::Stabilizing,
            &[ReasonCode::StabilizationConfirmed],
            &StateAttrs::fresh(2),
            "run-1",
        )
        .unwrap();
        repo.upsert_signals(
            "AAPL",
            day(2),
            &SignalSet::from_keys([SignalKey::StabilizationConfirmed, SignalKey::EntrySetupValid]),
            "run-1",
        )
        .unwrap();
        repo.upsert_state(
            "AAPL",
            day(3),
            State::EntryWindow,
            &[ReasonCode::EntryConditionsMet],
            &StateAttrs::fresh(1),
            "run-1",
        )
        .unwrap();

        let history = SqliteStateHistory::new(&conn);
        let days = history.recent_days("AAPL", day(4), 10);
        assert_eq!(days.len(), 2);
        assert_eq!(days[0].date, day(3));
        assert_eq!(days[0].state, State::EntryWindow);
        assert_eq!(days[1].signal_keys.len(), 2);
        assert!(days[1].signal_keys.contains(&SignalKey::EntrySetupValid));

        // Strictly before: the as-of day itself is invisible.
        let days = history.recent_days("AAPL", day(3), 10);
        assert_eq!(days.len(), 1);
        assert_eq!(days[0].date, day(2));
    }

    #[test]
    fn missing_ticker_yields_empty_history() {
        let conn = Connection::open_in_memory().unwrap();
        apply_migrations(&conn).unwrap();
        let history = SqliteStateHistory::new(&conn);
        assert!(history.recent_days("NOPE", day(4), 10).is_empty());
        assert!(history.recent_days("", day(4), 10).is_empty());
    }
}
