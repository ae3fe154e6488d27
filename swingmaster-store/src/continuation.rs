//! Entry-continuation confirmation backfill (range/backtest mode).
//!
//! For each entry-window opening, look at the five trading days after the
//! open. A day counts when its close sits above the rolling SMA5; three of
//! five confirms continuation. The verdict becomes decidable on the fifth
//! forward day and is written once: to the StateDaily row of that decision
//! day, mirrored onto the opening Transition row for audit.

use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;

use swingmaster_core::domain::StateAttrs;

use crate::error::StoreError;
use crate::market::MarketData;

const FORWARD_DAYS: usize = 5;
const SMA_WINDOW: usize = 5;
const CONFIRM_MIN_ABOVE: usize = 3;
/// History pulled in front of the entry date so the SMA5 is defined from the
/// first forward day.
const WARMUP_CALENDAR_DAYS: i64 = 40;
const FORWARD_CALENDAR_DAYS: i64 = 30;

fn iso(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

struct Verdict {
    decision_date: NaiveDate,
    above_5: usize,
    confirmed: bool,
}

/// Evaluate one episode. `None` when fewer than five forward days exist yet.
fn evaluate_episode(
    md: &MarketData<'_>,
    ticker: &str,
    entry_date: NaiveDate,
) -> Result<Option<Verdict>, StoreError> {
    let from = entry_date - chrono::Duration::days(WARMUP_CALENDAR_DAYS);
    let to = entry_date + chrono::Duration::days(FORWARD_CALENDAR_DAYS);
    let closes = md.closes_between(ticker, from, to)?;

    let Some(entry_idx) = closes.iter().position(|(d, _)| *d >= entry_date) else {
        return Ok(None);
    };
    let forward = &closes[entry_idx + 1..];
    if forward.len() < FORWARD_DAYS {
        return Ok(None);
    }

    let mut above = 0;
    for fwd in 0..FORWARD_DAYS {
        let idx = entry_idx + 1 + fwd;
        if idx + 1 < SMA_WINDOW {
            continue; // SMA5 undefined this early in the loaded series
        }
        let window = &closes[idx + 1 - SMA_WINDOW..=idx];
        let sma5: f64 = window.iter().map(|(_, c)| c).sum::<f64>() / SMA_WINDOW as f64;
        if closes[idx].1 > sma5 {
            above += 1;
        }
    }

    Ok(Some(Verdict {
        decision_date: forward[FORWARD_DAYS - 1].0,
        above_5: above,
        confirmed: above >= CONFIRM_MIN_ABOVE,
    }))
}

fn set_continuation_flag(json: Option<String>, confirmed: bool) -> Result<String, StoreError> {
    let mut status = StateAttrs::status_from_json(json.as_deref());
    status.entry_continuation_confirmed = Some(confirmed);
    let attrs = StateAttrs {
        confidence: None,
        age: 0,
        status,
    };
    // Status is non-empty by construction, so this always serializes.
    Ok(attrs.attrs_json().expect("non-empty status"))
}

/// Walk every entry-window opening and write the decided verdicts.
/// Write-once: rows that already carry the flag are left alone, so revised
/// history never rewrites a published verdict. Returns decided episodes.
pub fn confirm_entry_continuations(
    rc: &Connection,
    md_conn: &Connection,
) -> Result<usize, StoreError> {
    let md = MarketData::new(md_conn);

    let episodes: Vec<(String, String)> = {
        let mut stmt = rc.prepare(
            "SELECT ticker, date FROM rc_transition
             WHERE to_state = 'ENTRY_WINDOW'
             ORDER BY ticker, date",
        )?;
        let rows = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<Result<_, _>>()?;
        rows
    };

    let mut decided = 0;
    for (ticker, entry_raw) in episodes {
        let entry_date = NaiveDate::parse_from_str(&entry_raw, "%Y-%m-%d")
            .map_err(|_| StoreError::CorruptRow(format!("bad transition date '{entry_raw}'")))?;
        let Some(verdict) = evaluate_episode(&md, &ticker, entry_date)? else {
            debug!(ticker = %ticker, %entry_date, "continuation not decidable yet");
            continue;
        };

        // Decision-day state row; skip when the flag is already set.
        let state_row: Option<(Option<String>,)> = rc
            .query_row(
                "SELECT state_attrs_json FROM rc_state_daily WHERE ticker = ?1 AND date = ?2",
                params![ticker, iso(verdict.decision_date)],
                |row| Ok((row.get(0)?,)),
            )
            .optional()?;
        if let Some((attrs_json,)) = state_row {
            let existing = StateAttrs::status_from_json(attrs_json.as_deref());
            if existing.entry_continuation_confirmed.is_some() {
                continue;
            }
            let updated = set_continuation_flag(attrs_json, verdict.confirmed)?;
            rc.execute(
                "UPDATE rc_state_daily SET state_attrs_json = ?1 WHERE ticker = ?2 AND date = ?3",
                params![updated, ticker, iso(verdict.decision_date)],
            )?;
        }

        // Mirror onto the opening transition row for audit.
        let transition_attrs: Option<Option<String>> = rc
            .query_row(
                "SELECT state_attrs_json FROM rc_transition WHERE ticker = ?1 AND date = ?2",
                params![ticker, iso(entry_date)],
                |row| row.get(0),
            )
            .optional()?;
        if let Some(attrs_json) = transition_attrs {
            let updated = set_continuation_flag(attrs_json, verdict.confirmed)?;
            rc.execute(
                "UPDATE rc_transition SET state_attrs_json = ?1 WHERE ticker = ?2 AND date = ?3",
                params![updated, ticker, iso(entry_date)],
            )?;
        }

        debug!(
            ticker = %ticker,
            %entry_date,
            decision_date = %verdict.decision_date,
            above_5 = verdict.above_5,
            confirmed = verdict.confirmed,
            "entry continuation decided"
        );
        decided += 1;
    }
    Ok(decided)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market::ensure_market_schema;
    use crate::migrate::apply_migrations;
    use crate::state_repo::RcStateRepo;
    use swingmaster_core::data::OhlcBar;
    use swingmaster_core::domain::{ReasonCode, State, Transition};

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, d).unwrap()
    }

    /// Entry on day 10; forward closes chosen so four of five days close
    /// above their SMA5.
    fn seeded(forward_closes: [f64; 5]) -> (Connection, Connection) {
        let rc = Connection::open_in_memory().unwrap();
        apply_migrations(&rc).unwrap();
        let md_conn = Connection::open_in_memory().unwrap();
        ensure_market_schema(&md_conn).unwrap();
        let md = MarketData::new(&md_conn);

        // Flat warmup through the entry day, then the scripted tail.
        for d in 2..=10u32 {
            md.insert_bar("AAPL", &OhlcBar::new(day(d), 102.0, 103.0, 101.0, 102.0))
                .unwrap();
        }
        for (i, close) in forward_closes.into_iter().enumerate() {
            let d = 11 + i as u32;
            md.insert_bar(
                "AAPL",
                &OhlcBar::new(day(d), close, close + 1.0, close - 1.0, close),
            )
            .unwrap();
        }

        let repo = RcStateRepo::new(&rc);
        let attrs = StateAttrs::fresh(1);
        repo.upsert_transition(
            "AAPL",
            day(10),
            Some(&Transition {
                from_state: State::Stabilizing,
                to_state: State::EntryWindow,
                reasons: vec![ReasonCode::EntryConditionsMet],
            }),
            &attrs,
            "run-1",
        )
        .unwrap();
        // Decision day is the fifth forward day (day 15).
        let decision_attrs = StateAttrs::fresh(5);
        repo.upsert_state(
            "AAPL",
            day(15),
            State::EntryWindow,
            &[ReasonCode::EntryConditionsMet],
            &decision_attrs,
            "run-1",
        )
        .unwrap();

        (rc, md_conn)
    }

    fn state_flag(rc: &Connection, d: NaiveDate) -> Option<bool> {
        let attrs: Option<String> = rc
            .query_row(
                "SELECT state_attrs_json FROM rc_state_daily WHERE ticker='AAPL' AND date=?1",
                params![iso(d)],
                |row| row.get(0),
            )
            .unwrap();
        StateAttrs::status_from_json(attrs.as_deref()).entry_continuation_confirmed
    }

    #[test]
    fn four_of_five_above_sma_confirms() {
        // Rising tail: each close above the trailing SMA5 except the dip.
        let (rc, md_conn) = seeded([103.0, 104.0, 102.0, 105.0, 106.0]);
        let decided = confirm_entry_continuations(&rc, &md_conn).unwrap();
        assert_eq!(decided, 1);

        assert_eq!(state_flag(&rc, day(15)), Some(true));

        // Mirrored onto the opening transition row.
        let attrs: Option<String> = rc
            .query_row(
                "SELECT state_attrs_json FROM rc_transition WHERE ticker='AAPL' AND date=?1",
                params![iso(day(10))],
                |row| row.get(0),
            )
            .unwrap();
        let status = StateAttrs::status_from_json(attrs.as_deref());
        assert_eq!(status.entry_continuation_confirmed, Some(true));
    }

    #[test]
    fn fading_tail_does_not_confirm() {
        // Sliding closes under the SMA5 on most forward days.
        let (rc, md_conn) = seeded([99.0, 98.0, 97.0, 96.0, 95.0]);
        confirm_entry_continuations(&rc, &md_conn).unwrap();
        assert_eq!(state_flag(&rc, day(15)), Some(false));
    }

    #[test]
    fn undecidable_before_fifth_forward_day() {
        let (rc, md_conn) = seeded([103.0, 104.0, 102.0, 105.0, 106.0]);
        // Drop the last two forward bars: only three forward days exist.
        md_conn
            .execute("DELETE FROM ohlc_daily WHERE date > '2025-06-13'", [])
            .unwrap();
        let decided = confirm_entry_continuations(&rc, &md_conn).unwrap();
        assert_eq!(decided, 0);
        assert_eq!(state_flag(&rc, day(15)), None);
    }

    #[test]
    fn verdict_is_write_once() {
        let (rc, md_conn) = seeded([103.0, 104.0, 102.0, 105.0, 106.0]);
        confirm_entry_continuations(&rc, &md_conn).unwrap();

        // Rewrite history so the verdict would flip, then re-run.
        md_conn
            .execute("UPDATE ohlc_daily SET close = 50.0 WHERE date > '2025-06-10'", [])
            .unwrap();
        let decided = confirm_entry_continuations(&rc, &md_conn).unwrap();
        assert_eq!(decided, 0);
        assert_eq!(state_flag(&rc, day(15)), Some(true));
    }
}
