//! Previous-state lookup: the most recent persisted row strictly before the
//! as-of date. A ticker with no history starts neutral at age zero.

use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension};

use swingmaster_core::domain::{State, StateAttrs};

use crate::error::StoreError;

pub struct PrevStateProvider<'a> {
    conn: &'a Connection,
}

impl<'a> PrevStateProvider<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    pub fn get_prev(
        &self,
        ticker: &str,
        as_of: NaiveDate,
    ) -> Result<(State, StateAttrs), StoreError> {
        let row = self
            .conn
            .query_row(
                "SELECT state, confidence, age, state_attrs_json
                 FROM rc_state_daily
                 WHERE ticker = ?1 AND date < ?2
                 ORDER BY date DESC
                 LIMIT 1",
                params![ticker, as_of.format("%Y-%m-%d").to_string()],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, Option<i64>>(1)?,
                        row.get::<_, i64>(2)?,
                        row.get::<_, Option<String>>(3)?,
                    ))
                },
            )
            .optional()?;

        let Some((state_raw, confidence, age, attrs_json)) = row else {
            return Ok((State::NoTrade, StateAttrs::fresh(0)));
        };
        let state = State::parse(&state_raw)
            .ok_or_else(|| StoreError::CorruptRow(format!("unknown state '{state_raw}'")))?;
        let attrs = StateAttrs {
            confidence,
            age,
            status: StateAttrs::status_from_json(attrs_json.as_deref()),
        };
        Ok((state, attrs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migrate::apply_migrations;
    use crate::state_repo::RcStateRepo;
    use swingmaster_core::domain::{DowntrendOrigin, ReasonCode};

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, d).unwrap()
    }

    #[test]
    fn unknown_ticker_starts_neutral() {
        let conn = Connection::open_in_memory().unwrap();
        apply_migrations(&conn).unwrap();
        let provider = PrevStateProvider::new(&conn);
        let (state, attrs) = provider.get_prev("AAPL", day(2)).unwrap();
        assert_eq!(state, State::NoTrade);
        assert_eq!(attrs.age, 0);
        assert!(attrs.status.is_empty());
    }

    #[test]
    fn latest_prior_row_wins_and_round_trips_status() {
        let conn = Connection::open_in_memory().unwrap();
        apply_migrations(&conn).unwrap();
        let repo = RcStateRepo::new(&conn);

        let mut attrs = StateAttrs::fresh(2);
        attrs.status.downtrend_origin = Some(DowntrendOrigin::Trend);
        repo.upsert_state(
            "AAPL",
            day(2),
            State::DowntrendEarly,
            &[ReasonCode::TrendStarted],
            &StateAttrs::fresh(1),
            "run-1",
        )
        .unwrap();
        repo.upsert_state(
            "AAPL",
            day(3),
            State::DowntrendEarly,
            &[ReasonCode::NoSignal],
            &attrs,
            "run-1",
        )
        .unwrap();

        let provider = PrevStateProvider::new(&conn);
        let (state, got) = provider.get_prev("AAPL", day(4)).unwrap();
        assert_eq!(state, State::DowntrendEarly);
        assert_eq!(got.age, 2);
        assert_eq!(got.status.downtrend_origin, Some(DowntrendOrigin::Trend));

        // As-of the same day, only the earlier row is visible.
        let (_, earlier) = provider.get_prev("AAPL", day(3)).unwrap();
        assert_eq!(earlier.age, 1);
    }
}
