//! `rc_ew_score_daily` repository with isolated column groups.
//!
//! Legacy, fastpass, and rolling writers each touch only their own columns
//! on conflict; `created_at` is set on first insert and never changes.

use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension};

use crate::error::StoreError;

pub struct RcEwScoreRepo<'a> {
    conn: &'a Connection,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EwScoreRow {
    pub ticker: String,
    pub date: String,
    pub ew_score_day3: Option<f64>,
    pub ew_level_day3: Option<i64>,
    pub ew_rule: Option<String>,
    pub inputs_json: Option<String>,
    pub ew_score_fastpass: Option<f64>,
    pub ew_level_fastpass: Option<i64>,
    pub ew_rule_fastpass: Option<String>,
    pub inputs_json_fastpass: Option<String>,
    pub ew_score_rolling: Option<f64>,
    pub ew_level_rolling: Option<i64>,
    pub ew_rule_rolling: Option<String>,
    pub inputs_json_rolling: Option<String>,
    pub created_at: Option<String>,
}

fn iso(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

impl<'a> RcEwScoreRepo<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    pub fn upsert_legacy(
        &self,
        ticker: &str,
        date: NaiveDate,
        score: f64,
        level: i64,
        rule: &str,
        inputs_json: &str,
    ) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT INTO rc_ew_score_daily (ticker, date, ew_score_day3, ew_level_day3, ew_rule, inputs_json)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT (ticker, date) DO UPDATE SET
               ew_score_day3 = excluded.ew_score_day3,
               ew_level_day3 = excluded.ew_level_day3,
               ew_rule = excluded.ew_rule,
               inputs_json = excluded.inputs_json",
            params![ticker, iso(date), score, level, rule, inputs_json],
        )?;
        Ok(())
    }

    pub fn upsert_fastpass(
        &self,
        ticker: &str,
        date: NaiveDate,
        score: f64,
        level: i64,
        rule: &str,
        inputs_json: &str,
    ) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT INTO rc_ew_score_daily
               (ticker, date, ew_score_fastpass, ew_level_fastpass, ew_rule_fastpass, inputs_json_fastpass)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT (ticker, date) DO UPDATE SET
               ew_score_fastpass = excluded.ew_score_fastpass,
               ew_level_fastpass = excluded.ew_level_fastpass,
               ew_rule_fastpass = excluded.ew_rule_fastpass,
               inputs_json_fastpass = excluded.inputs_json_fastpass",
            params![ticker, iso(date), score, level, rule, inputs_json],
        )?;
        Ok(())
    }

    pub fn upsert_rolling(
        &self,
        ticker: &str,
        date: NaiveDate,
        score: f64,
        level: i64,
        rule: &str,
        inputs_json: &str,
    ) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT INTO rc_ew_score_daily
               (ticker, date, ew_score_rolling, ew_level_rolling, ew_rule_rolling, inputs_json_rolling)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT (ticker, date) DO UPDATE SET
               ew_score_rolling = excluded.ew_score_rolling,
               ew_level_rolling = excluded.ew_level_rolling,
               ew_rule_rolling = excluded.ew_rule_rolling,
               inputs_json_rolling = excluded.inputs_json_rolling",
            params![ticker, iso(date), score, level, rule, inputs_json],
        )?;
        Ok(())
    }

    pub fn get_row(
        &self,
        ticker: &str,
        date: NaiveDate,
    ) -> Result<Option<EwScoreRow>, StoreError> {
        let row = self
            .conn
            .query_row(
                "SELECT ticker, date,
                        ew_score_day3, ew_level_day3, ew_rule, inputs_json,
                        ew_score_fastpass, ew_level_fastpass, ew_rule_fastpass, inputs_json_fastpass,
                        ew_score_rolling, ew_level_rolling, ew_rule_rolling, inputs_json_rolling,
                        created_at
                 FROM rc_ew_score_daily
                 WHERE ticker = ?1 AND date = ?2",
                params![ticker, iso(date)],
                |row| {
                    Ok(EwScoreRow {
                        ticker: row.get(0)?,
                        date: row.get(1)?,
                        ew_score_day3: row.get(2)?,
                        ew_level_day3: row.get(3)?,
                        ew_rule: row.get(4)?,
                        inputs_json: row.get(5)?,
                        ew_score_fastpass: row.get(6)?,
                        ew_level_fastpass: row.get(7)?,
                        ew_rule_fastpass: row.get(8)?,
                        inputs_json_fastpass: row.get(9)?,
                        ew_score_rolling: row.get(10)?,
                        ew_level_rolling: row.get(11)?,
                        ew_rule_rolling: row.get(12)?,
                        inputs_json_rolling: row.get(13)?,
                        created_at: row.get(14)?,
                    })
                },
            )
            .optional()?;
        Ok(row)
    }
}
