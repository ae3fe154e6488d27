//! Dual-mode EW score computation.
//!
//! Both modes walk the tickers sitting in ENTRY_WINDOW on the as-of date.
//! Fastpass freezes its features at the window open (stabilization-to-entry
//! return plus entry-day categoricals) and only the row count moves with the
//! as-of date; rolling re-reads the prefix return every day. Writes go
//! through the isolated per-mode upserts.

use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::json;
use tracing::debug;

use swingmaster_core::domain::StateAttrs;

use crate::error::StoreError;
use crate::market::MarketData;

use super::model::{fastpass_model, rolling_model, sigmoid};
use super::repo::RcEwScoreRepo;
use super::router::{score_level, Market};

fn iso(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

fn parse_date(raw: &str) -> Result<NaiveDate, StoreError> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|_| StoreError::CorruptRow(format!("bad date '{raw}'")))
}

/// Tickers in ENTRY_WINDOW on `as_of`, with their status attrs.
fn entry_window_rows(
    rc: &Connection,
    as_of: NaiveDate,
) -> Result<Vec<(String, Option<String>)>, StoreError> {
    let mut stmt = rc.prepare(
        "SELECT ticker, state_attrs_json
         FROM rc_state_daily
         WHERE date = ?1 AND state = 'ENTRY_WINDOW'
         ORDER BY ticker",
    )?;
    let rows = stmt
        .query_map(params![iso(as_of)], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, Option<String>>(1)?))
        })?
        .collect::<Result<_, _>>()?;
    Ok(rows)
}

/// The day the current entry window opened.
fn entry_window_open_date(
    rc: &Connection,
    ticker: &str,
    as_of: NaiveDate,
) -> Result<Option<NaiveDate>, StoreError> {
    let raw: Option<String> = rc
        .query_row(
            "SELECT date FROM rc_transition
             WHERE ticker = ?1 AND to_state = 'ENTRY_WINDOW' AND date <= ?2
             ORDER BY date DESC
             LIMIT 1",
            params![ticker, iso(as_of)],
            |row| row.get(0),
        )
        .optional()?;
    raw.map(|r| parse_date(&r)).transpose()
}

/// The most recent stabilizing day before the window opened.
fn last_stabilizing_date(
    rc: &Connection,
    ticker: &str,
    before: NaiveDate,
) -> Result<Option<NaiveDate>, StoreError> {
    let raw: Option<String> = rc
        .query_row(
            "SELECT date FROM rc_state_daily
             WHERE ticker = ?1 AND state = 'STABILIZING' AND date < ?2
             ORDER BY date DESC
             LIMIT 1",
            params![ticker, iso(before)],
            |row| row.get(0),
        )
        .optional()?;
    raw.map(|r| parse_date(&r)).transpose()
}

/// Compute and store fastpass scores for every open entry window on `as_of`.
/// Returns the number of rows written.
pub fn run_fastpass(
    rc: &Connection,
    md_conn: &Connection,
    market: Market,
    as_of: NaiveDate,
) -> Result<usize, StoreError> {
    if !market.fastpass_enabled() {
        return Ok(0);
    }
    let model = fastpass_model(market.fastpass_rule_id())?;
    let md = MarketData::new(md_conn);
    let repo = RcEwScoreRepo::new(rc);

    let mut stored = 0;
    for (ticker, attrs_json) in entry_window_rows(rc, as_of)? {
        let Some(entry_date) = entry_window_open_date(rc, &ticker, as_of)? else {
            debug!(ticker = %ticker, %as_of, "no entry-window transition; skipping fastpass");
            continue;
        };
        let Some(last_stab) = last_stabilizing_date(rc, &ticker, entry_date)? else {
            debug!(ticker = %ticker, %as_of, "no stabilizing day before entry; skipping fastpass");
            continue;
        };
        let (Some(close_entry), Some(close_last_stab)) = (
            md.close_on(&ticker, entry_date)?,
            md.close_on(&ticker, last_stab)?,
        ) else {
            continue;
        };
        if close_last_stab <= 0.0 {
            continue;
        }

        let r_stab_to_entry_pct = 100.0 * (close_entry / close_last_stab - 1.0);
        let status = StateAttrs::status_from_json(attrs_json.as_deref());
        let rows_total = md.closes_between(&ticker, entry_date, as_of)?.len() as i64;

        let z = model.beta0
            + model.beta_r_stab_to_entry * r_stab_to_entry_pct
            + model.quality_coef(status.entry_quality)
            + model.profile_coef(status.decline_profile);
        let score = sigmoid(z);
        let level = score_level(score, rows_total, model.threshold);

        let inputs = json!({
            "rule_id": model.rule_id,
            "beta0": model.beta0,
            "threshold": model.threshold,
            "entry_date": iso(entry_date),
            "last_stab_date": iso(last_stab),
            "close_entry": close_entry,
            "close_last_stab": close_last_stab,
            "r_stab_to_entry_pct": r_stab_to_entry_pct,
            "entry_quality": status.entry_quality,
            "decline_profile": status.decline_profile,
            "rows_total": rows_total,
            "score_raw_z": z,
        });
        repo.upsert_fastpass(&ticker, as_of, score, level, model.rule_id, &inputs.to_string())?;
        stored += 1;
    }
    Ok(stored)
}

/// Compute and store rolling scores for every open entry window on `as_of`.
pub fn run_rolling(
    rc: &Connection,
    md_conn: &Connection,
    market: Market,
    as_of: NaiveDate,
) -> Result<usize, StoreError> {
    let Some(rule_id) = market.rolling_rule_id() else {
        return Ok(0);
    };
    let model = rolling_model(rule_id)?;
    let md = MarketData::new(md_conn);
    let repo = RcEwScoreRepo::new(rc);

    let mut stored = 0;
    for (ticker, _) in entry_window_rows(rc, as_of)? {
        let Some(entry_date) = entry_window_open_date(rc, &ticker, as_of)? else {
            continue;
        };
        let closes = md.closes_between(&ticker, entry_date, as_of)?;
        let (Some((_, close_day0)), Some((_, close_today))) = (closes.first(), closes.last())
        else {
            continue;
        };
        if *close_day0 <= 0.0 {
            continue;
        }

        let r_prefix_pct = 100.0 * (close_today / close_day0 - 1.0);
        let rows_total = closes.len() as i64;
        let z = model.beta0 + model.beta1 * r_prefix_pct;
        let score = sigmoid(z);
        let level = score_level(score, rows_total, model.threshold);

        let inputs = json!({
            "rule_id": model.rule_id,
            "beta0": model.beta0,
            "beta1": model.beta1,
            "threshold": model.threshold,
            "entry_date": iso(entry_date),
            "as_of_date": iso(as_of),
            "close_day0": close_day0,
            "close_today": close_today,
            "r_prefix_pct": r_prefix_pct,
            "rows_total": rows_total,
            "score_raw_z": z,
        });
        repo.upsert_rolling(&ticker, as_of, score, level, model.rule_id, &inputs.to_string())?;
        stored += 1;
    }
    Ok(stored)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migrate::apply_migrations;
    use crate::market::ensure_market_schema;
    use crate::state_repo::RcStateRepo;
    use swingmaster_core::data::OhlcBar;
    use swingmaster_core::domain::{
        EntryGate, EntryQuality, ReasonCode, State, StateAttrs, Transition,
    };

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, d).unwrap()
    }

    /// AAPL stabilizes through day 10, opens an entry window on day 11, and
    /// is still in the window on day 13.
    fn seeded() -> (Connection, Connection) {
        let rc = Connection::open_in_memory().unwrap();
        apply_migrations(&rc).unwrap();
        let md_conn = Connection::open_in_memory().unwrap();
        ensure_market_schema(&md_conn).unwrap();

        let md = MarketData::new(&md_conn);
        for (d, close) in [(9u32, 100.0), (10, 101.0), (11, 103.0), (12, 104.0), (13, 105.0)] {
            md.insert_bar(
                "AAPL",
                &OhlcBar::new(day(d), close, close + 1.0, close - 1.0, close),
            )
            .unwrap();
        }

        let repo = RcStateRepo::new(&rc);
        repo.upsert_state(
            "AAPL",
            day(10),
            State::Stabilizing,
            &[ReasonCode::StabilizationConfirmed],
            &StateAttrs::fresh(3),
            "run-1",
        )
        .unwrap();
        let mut entry_attrs = StateAttrs::fresh(1);
        entry_attrs.status.entry_gate = Some(EntryGate::EarlyStabMa20Hl);
        entry_attrs.status.entry_quality = Some(EntryQuality::A);
        repo.upsert_state(
            "AAPL",
            day(11),
            State::EntryWindow,
            &[ReasonCode::EntryConditionsMet],
            &entry_attrs,
            "run-1",
        )
        .unwrap();
        repo.upsert_transition(
            "AAPL",
            day(11),
            Some(&Transition {
                from_state: State::Stabilizing,
                to_state: State::EntryWindow,
                reasons: vec![ReasonCode::EntryConditionsMet],
            }),
            &entry_attrs,
            "run-1",
        )
        .unwrap();
        let mut held = entry_attrs.clone();
        held.age = 3;
        repo.upsert_state(
            "AAPL",
            day(13),
            State::EntryWindow,
            &[ReasonCode::EntryConditionsMet],
            &held,
            "run-1",
        )
        .unwrap();

        (rc, md_conn)
    }

    #[test]
    fn fastpass_scores_open_window_with_frozen_features() {
        let (rc, md_conn) = seeded();
        let stored = run_fastpass(&rc, &md_conn, Market::Omxh, day(13)).unwrap();
        assert_eq!(stored, 1);

        let repo = RcEwScoreRepo::new(&rc);
        let row = repo.get_row("AAPL", day(13)).unwrap().unwrap();
        assert_eq!(row.ew_rule_fastpass.as_deref(), Some("EW_SCORE_FASTPASS_V1_FIN"));
        let score = row.ew_score_fastpass.unwrap();

        // r = 100 * (103/101 - 1), quality A, no profile.
        let model = fastpass_model("EW_SCORE_FASTPASS_V1_FIN").unwrap();
        let r = 100.0 * (103.0 / 101.0 - 1.0);
        let expected = sigmoid(model.beta0 + model.beta_r_stab_to_entry * r + model.quality_a);
        assert!((score - expected).abs() < 1e-12);

        // rows_total = days 11..13 = 3 → provisional level.
        let expected_level = score_level(expected, 3, model.threshold);
        assert_eq!(row.ew_level_fastpass, Some(expected_level));

        let inputs: serde_json::Value =
            serde_json::from_str(row.inputs_json_fastpass.as_deref().unwrap()).unwrap();
        for key in [
            "rule_id",
            "beta0",
            "threshold",
            "entry_date",
            "last_stab_date",
            "close_entry",
            "close_last_stab",
            "r_stab_to_entry_pct",
            "entry_quality",
            "decline_profile",
            "rows_total",
            "score_raw_z",
        ] {
            assert!(inputs.get(key).is_some(), "missing inputs key {key}");
        }
        assert_eq!(inputs["entry_date"], "2025-06-11");
        assert_eq!(inputs["last_stab_date"], "2025-06-10");
        assert_eq!(inputs["entry_quality"], "A");
        assert_eq!(inputs["rows_total"], 3);
    }

    #[test]
    fn rolling_scores_prefix_return() {
        let (rc, md_conn) = seeded();
        let stored = run_rolling(&rc, &md_conn, Market::Omxh, day(13)).unwrap();
        assert_eq!(stored, 1);

        let repo = RcEwScoreRepo::new(&rc);
        let row = repo.get_row("AAPL", day(13)).unwrap().unwrap();
        assert_eq!(row.ew_rule_rolling.as_deref(), Some("EW_SCORE_ROLLING_V2_FIN"));
        // Fastpass columns untouched by the rolling writer.
        assert_eq!(row.ew_score_fastpass, None);

        let model = rolling_model("EW_SCORE_ROLLING_V2_FIN").unwrap();
        let r = 100.0 * (105.0 / 103.0 - 1.0);
        let expected = sigmoid(model.beta0 + model.beta1 * r);
        assert!((row.ew_score_rolling.unwrap() - expected).abs() < 1e-12);

        let inputs: serde_json::Value =
            serde_json::from_str(row.inputs_json_rolling.as_deref().unwrap()).unwrap();
        assert_eq!(inputs["close_day0"], 103.0);
        assert_eq!(inputs["close_today"], 105.0);
        assert_eq!(inputs["rows_total"], 3);
        assert_eq!(inputs["as_of_date"], "2025-06-13");
    }

    #[test]
    fn usa_market_skips_rolling() {
        let (rc, md_conn) = seeded();
        let stored = run_rolling(&rc, &md_conn, Market::Usa, day(13)).unwrap();
        assert_eq!(stored, 0);
    }

    #[test]
    fn no_open_windows_store_nothing() {
        let (rc, md_conn) = seeded();
        let stored = run_fastpass(&rc, &md_conn, Market::Omxh, day(10)).unwrap();
        assert_eq!(stored, 0);
    }
}
