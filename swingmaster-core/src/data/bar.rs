//! Single daily OHLC row.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One daily bar. Prices must be finite and positive; high/low must bracket
/// the session.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OhlcBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

impl OhlcBar {
    pub fn new(date: NaiveDate, open: f64, high: f64, low: f64, close: f64) -> Self {
        Self {
            date,
            open,
            high,
            low,
            close,
        }
    }

    /// Validate bar invariants.
    pub fn validate(&self) -> Result<(), BarError> {
        for price in [self.open, self.high, self.low, self.close] {
            if !price.is_finite() || price <= 0.0 {
                return Err(BarError::NonPositivePrice { date: self.date });
            }
        }
        if self.high < self.low {
            return Err(BarError::InvalidRange {
                date: self.date,
                high: self.high,
                low: self.low,
            });
        }
        Ok(())
    }

    /// Session range (high - low).
    pub fn range(&self) -> f64 {
        self.high - self.low
    }

    /// Position of the close within the session range, 0.0 at the low and
    /// 1.0 at the high. `None` on a zero-range session.
    pub fn close_position(&self) -> Option<f64> {
        let range = self.range();
        if range <= 0.0 {
            return None;
        }
        Some((self.close - self.low) / range)
    }
}

#[derive(Debug, Error)]
pub enum BarError {
    #[error("invalid bar range on {date}: high={high}, low={low}")]
    InvalidRange {
        date: NaiveDate,
        high: f64,
        low: f64,
    },

    #[error("non-positive or non-finite price on {date}")]
    NonPositivePrice { date: NaiveDate },
}
