//! Market-data access: daily OHLC history and the instrument universe.
//!
//! The market database is read-only from the engine's point of view; the
//! write helpers here exist for fixtures and ingestion tooling.

use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension};

use swingmaster_core::data::OhlcBar;

use crate::error::StoreError;

const MD_SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS ohlc_daily (
  ticker TEXT NOT NULL,
  date TEXT NOT NULL,
  open REAL NOT NULL,
  high REAL NOT NULL,
  low REAL NOT NULL,
  close REAL NOT NULL,
  PRIMARY KEY (ticker, date)
);

CREATE TABLE IF NOT EXISTS instrument (
  ticker TEXT PRIMARY KEY,
  market TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_ohlc_daily_date ON ohlc_daily (date);
";

pub fn ensure_market_schema(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(MD_SCHEMA)?;
    Ok(())
}

fn iso(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

fn parse_date(raw: &str) -> Result<NaiveDate, StoreError> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|_| StoreError::CorruptRow(format!("bad date '{raw}'")))
}

pub struct MarketData<'a> {
    conn: &'a Connection,
}

impl<'a> MarketData<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    pub fn insert_bar(&self, ticker: &str, bar: &OhlcBar) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT OR REPLACE INTO ohlc_daily (ticker, date, open, high, low, close)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![ticker, iso(bar.date), bar.open, bar.high, bar.low, bar.close],
        )?;
        Ok(())
    }

    pub fn insert_instrument(&self, ticker: &str, market: &str) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT OR REPLACE INTO instrument (ticker, market) VALUES (?1, ?2)",
            params![ticker, market],
        )?;
        Ok(())
    }

    /// The last `n` bars on or before `as_of`, ascending by date. Fewer rows
    /// than requested means the history is short; callers decide what that
    /// implies.
    pub fn last_n_bars(
        &self,
        ticker: &str,
        as_of: NaiveDate,
        n: usize,
    ) -> Result<Vec<OhlcBar>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT date, open, high, low, close
             FROM ohlc_daily
             WHERE ticker = ?1 AND date <= ?2
             ORDER BY date DESC
             LIMIT ?3",
        )?;
        let mut bars: Vec<OhlcBar> = stmt
            .query_map(params![ticker, iso(as_of), n as i64], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, f64>(1)?,
                    row.get::<_, f64>(2)?,
                    row.get::<_, f64>(3)?,
                    row.get::<_, f64>(4)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?
            .into_iter()
            .map(|(date, open, high, low, close)| {
                Ok(OhlcBar::new(parse_date(&date)?, open, high, low, close))
            })
            .collect::<Result<_, StoreError>>()?;
        bars.reverse();
        Ok(bars)
    }

    pub fn close_on(&self, ticker: &str, date: NaiveDate) -> Result<Option<f64>, StoreError> {
        let close = self
            .conn
            .query_row(
                "SELECT close FROM ohlc_daily WHERE ticker = ?1 AND date = ?2",
                params![ticker, iso(date)],
                |row| row.get(0),
            )
            .optional()?;
        Ok(close)
    }

    /// Closes in `[from, to]` inclusive, ascending.
    pub fn closes_between(
        &self,
        ticker: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<(NaiveDate, f64)>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT date, close FROM ohlc_daily
             WHERE ticker = ?1 AND date >= ?2 AND date <= ?3
             ORDER BY date ASC",
        )?;
        let rows = stmt
            .query_map(params![ticker, iso(from), iso(to)], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, f64>(1)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter()
            .map(|(date, close)| Ok((parse_date(&date)?, close)))
            .collect()
    }

    /// Distinct trading dates across the whole market in `[from, to]`.
    pub fn trading_dates(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<NaiveDate>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT DISTINCT date FROM ohlc_daily
             WHERE date >= ?1 AND date <= ?2
             ORDER BY date ASC",
        )?;
        let rows = stmt
            .query_map(params![iso(from), iso(to)], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        rows.iter().map(|raw| parse_date(raw)).collect()
    }

    /// First-N universe sample for a market code.
    pub fn tickers_for_market(
        &self,
        market: &str,
        limit: usize,
    ) -> Result<Vec<String>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT ticker FROM instrument WHERE market = ?1 ORDER BY ticker LIMIT ?2",
        )?;
        let rows = stmt
            .query_map(params![market, limit as i64], |row| row.get(0))?
            .collect::<Result<_, _>>()?;
        Ok(rows)
    }
}
