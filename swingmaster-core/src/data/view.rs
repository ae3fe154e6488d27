//! Read-only windowed view over a ticker's OHLC history.
//!
//! Evaluation indexes the series with offset 0 = latest (as-of) row,
//! offset 1 = the day before, and so on. The view stores the series in that
//! most-recent-first order and caches the close/high/low columns so signal
//! modules can slice them without re-walking the bars.

use chrono::NaiveDate;

use super::bar::OhlcBar;

#[derive(Debug, Clone)]
pub struct OhlcView {
    bars: Vec<OhlcBar>,
    closes: Vec<f64>,
    highs: Vec<f64>,
    lows: Vec<f64>,
}

impl OhlcView {
    /// Build a view from bars ordered ascending by date (storage order).
    pub fn from_ascending(ascending: &[OhlcBar]) -> Self {
        let bars: Vec<OhlcBar> = ascending.iter().rev().copied().collect();
        Self::from_descending(bars)
    }

    /// Build a view from bars already in most-recent-first order.
    pub fn from_descending(bars: Vec<OhlcBar>) -> Self {
        let closes = bars.iter().map(|b| b.close).collect();
        let highs = bars.iter().map(|b| b.high).collect();
        let lows = bars.iter().map(|b| b.low).collect();
        Self {
            bars,
            closes,
            highs,
            lows,
        }
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    /// Bars in most-recent-first order.
    pub fn bars(&self) -> &[OhlcBar] {
        &self.bars
    }

    /// Close column, offset 0 = latest.
    pub fn closes(&self) -> &[f64] {
        &self.closes
    }

    pub fn highs(&self) -> &[f64] {
        &self.highs
    }

    pub fn lows(&self) -> &[f64] {
        &self.lows
    }

    /// Date of the latest row in the view.
    pub fn as_of(&self) -> Option<NaiveDate> {
        self.bars.first().map(|b| b.date)
    }

    /// Bars in chronological order, oldest first. The Dow analyzer walks the
    /// series forward in time.
    pub fn ascending(&self) -> Vec<OhlcBar> {
        self.bars.iter().rev().copied().collect()
    }

    /// Average true range over `period` days, measured at `offset` (0 = as of
    /// the latest row). Requires `period + 1` rows beyond the offset.
    ///
    /// TR_i = max(high_i - low_i, |high_i - close_prev|, |low_i - close_prev|),
    /// where close_prev is the next-older row; ATR is the mean of the first
    /// `period` TR values walking back from the offset.
    pub fn atr_from(&self, offset: usize, period: usize) -> Option<f64> {
        let window = self.bars.get(offset..)?;
        if period == 0 || window.len() < period + 1 {
            return None;
        }
        let mut sum = 0.0;
        for i in 0..period {
            let bar = &window[i];
            let prev_close = window[i + 1].close;
            let tr = (bar.high - bar.low)
                .max((bar.high - prev_close).abs())
                .max((bar.low - prev_close).abs());
            sum += tr;
        }
        Some(sum / period as f64)
    }

    /// ATR at the latest row.
    pub fn atr(&self, period: usize) -> Option<f64> {
        self.atr_from(0, period)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn bars_from_closes(closes_desc: &[f64]) -> OhlcView {
        // Synthesizes bars around the close with a fixed 2.0 session range.
        let latest = NaiveDate::from_ymd_opt(2025, 6, 30).unwrap();
        let bars: Vec<OhlcBar> = closes_desc
            .iter()
            .enumerate()
            .map(|(i, &c)| OhlcBar::new(latest - chrono::Duration::days(i as i64), c, c + 1.0, c - 1.0, c))
            .collect();
        OhlcView::from_descending(bars)
    }

    #[test]
    fn offsets_are_most_recent_first() {
        let view = bars_from_closes(&[102.0, 101.0, 100.0]);
        assert_eq!(view.closes(), &[102.0, 101.0, 100.0]);
        assert_eq!(view.bars()[0].close, 102.0);
        let asc = view.ascending();
        assert_eq!(asc[0].close, 100.0);
        assert_eq!(asc[2].close, 102.0);
    }

    #[test]
    fn atr_matches_hand_computation() {
        let latest = NaiveDate::from_ymd_opt(2025, 6, 30).unwrap();
        let mk = |i: i64, h: f64, l: f64, c: f64| {
            OhlcBar::new(latest - chrono::Duration::days(i), c, h, l, c)
        };
        // Desc order: today, yesterday, day before.
        let view = OhlcView::from_descending(vec![
            mk(0, 107.0, 98.0, 99.0),
            mk(1, 108.0, 100.0, 106.0),
            mk(2, 105.0, 95.0, 102.0),
        ]);
        // TR(today)     = max(9, |107-106|, |98-106|)  = 9
        // TR(yesterday) = max(8, |108-102|, |100-102|) = 8
        let atr = view.atr(2).unwrap();
        assert!((atr - 8.5).abs() < 1e-12);
    }

    #[test]
    fn atr_requires_period_plus_one_rows() {
        let view = bars_from_closes(&[100.0, 101.0]);
        assert!(view.atr(2).is_none());
        assert!(view.atr(1).is_some());
        assert!(view.atr_from(1, 1).is_none());
    }

    #[test]
    fn atr_gap_day_uses_prior_close() {
        let latest = NaiveDate::from_ymd_opt(2025, 6, 30).unwrap();
        let view = OhlcView::from_descending(vec![
            OhlcBar::new(latest, 110.0, 115.0, 108.0, 112.0),
            OhlcBar::new(latest - chrono::Duration::days(1), 98.0, 102.0, 97.0, 100.0),
        ]);
        // Gap up: TR = max(7, |115-100|, |108-100|) = 15
        assert!((view.atr(1).unwrap() - 15.0).abs() < 1e-12);
    }
}
