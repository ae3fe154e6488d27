//! ENTRY_SETUP_VALID — a defined-risk setup exists at today's close.
//!
//! Two admissible setups:
//! - base-range: the last 10 sessions form a ≤6% box whose recent-half low
//!   has not drifted under the older-half low; invalidation = the box low;
//! - reclaim-MA20: a fresh cross back above SMA20 closing in the upper part
//!   of the session; invalidation = the 6-day low.
//!
//! Either way the close must sit above the invalidation level with bounded
//! risk (≤2.5 ATR, or ≤6% of entry when ATR is unavailable) and the last
//! three closes must hold the invalidation level.

use crate::data::OhlcView;

use super::{sma_series_desc, SignalKey};

const BASE_WINDOW: usize = 10;
const BASE_RANGE_MAX: f64 = 0.06;
const LOW_DRIFT_EPS: f64 = 0.003;
const SMA_LEN: usize = 20;
const RECLAIM_CLOSE_POS_MIN: f64 = 0.55;
const RECLAIM_LOW_WINDOW: usize = 6;
const ATR_LEN: usize = 14;
const RISK_ATR_MAX: f64 = 2.5;
const RISK_PCT_MAX: f64 = 0.06;
const SUPPORT_DAYS: usize = 3;
const SUPPORT_EPS: f64 = 0.003;

fn base_range_setup(view: &OhlcView) -> Option<f64> {
    let highs = view.highs();
    let lows = view.lows();
    let closes = view.closes();
    if closes.len() < BASE_WINDOW {
        return None;
    }
    let box_high = highs[..BASE_WINDOW].iter().copied().fold(f64::MIN, f64::max);
    let box_low = lows[..BASE_WINDOW].iter().copied().fold(f64::MAX, f64::min);
    if closes[0] <= 0.0 {
        return None;
    }
    if (box_high - box_low) / closes[0] > BASE_RANGE_MAX {
        return None;
    }
    // Low drift: the recent half must not undercut the older half.
    let min_second = lows[..BASE_WINDOW / 2].iter().copied().fold(f64::MAX, f64::min);
    let min_first = lows[BASE_WINDOW / 2..BASE_WINDOW]
        .iter()
        .copied()
        .fold(f64::MAX, f64::min);
    if min_second < min_first * (1.0 - LOW_DRIFT_EPS) {
        return None;
    }
    Some(box_low)
}

fn reclaim_ma20_setup(view: &OhlcView) -> Option<f64> {
    let closes = view.closes();
    if closes.len() < SMA_LEN + 1 {
        return None;
    }
    let sma20 = sma_series_desc(closes, SMA_LEN)?;
    if !(closes[1] <= sma20[1] && closes[0] > sma20[0]) {
        return None;
    }
    let position = view.bars()[0].close_position()?;
    if position < RECLAIM_CLOSE_POS_MIN {
        return None;
    }
    let lows = view.lows();
    if lows.len() < RECLAIM_LOW_WINDOW {
        return None;
    }
    Some(
        lows[..RECLAIM_LOW_WINDOW]
            .iter()
            .copied()
            .fold(f64::MAX, f64::min),
    )
}

pub fn evaluate(view: &OhlcView) -> Option<SignalKey> {
    let closes = view.closes();
    if closes.len() < SUPPORT_DAYS {
        return None;
    }

    let invalidation = base_range_setup(view).or_else(|| reclaim_ma20_setup(view))?;
    let entry = closes[0];
    if entry <= invalidation {
        return None;
    }

    let risk_ok = match view.atr(ATR_LEN) {
        Some(atr) if atr > 0.0 => (entry - invalidation) / atr <= RISK_ATR_MAX,
        _ => (entry - invalidation) / entry <= RISK_PCT_MAX,
    };
    if !risk_ok {
        return None;
    }

    let support_floor = invalidation * (1.0 - SUPPORT_EPS);
    closes[..SUPPORT_DAYS]
        .iter()
        .all(|&c| c >= support_floor)
        .then_some(SignalKey::EntrySetupValid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{OhlcBar, OhlcView};
    use chrono::NaiveDate;

    fn bar(i: i64, low: f64, high: f64, close: f64) -> OhlcBar {
        let date = NaiveDate::from_ymd_opt(2025, 6, 30).unwrap() - chrono::Duration::days(i);
        OhlcBar::new(date, close, high, low, close)
    }

    /// Ten-day 98–102 box closing at 101, quiet history behind it.
    fn base_range_view() -> OhlcView {
        let mut bars = Vec::new();
        for i in 0..10 {
            bars.push(bar(i, 98.0, 102.0, 101.0));
        }
        for i in 10..30 {
            bars.push(bar(i, 99.0, 103.0, 101.0));
        }
        OhlcView::from_descending(bars)
    }

    #[test]
    fn tight_base_fires() {
        assert_eq!(evaluate(&base_range_view()), Some(SignalKey::EntrySetupValid));
    }

    #[test]
    fn wide_base_does_not_fire() {
        let mut bars = Vec::new();
        for i in 0..10 {
            bars.push(bar(i, 92.0, 102.0, 101.0)); // 10% box
        }
        for i in 10..30 {
            bars.push(bar(i, 99.0, 103.0, 101.0));
        }
        let view = OhlcView::from_descending(bars);
        assert_eq!(evaluate(&view), None);
    }

    #[test]
    fn drifting_lows_invalidate_base() {
        let mut bars = Vec::new();
        // Recent half undercuts the older half by 1%.
        for i in 0..5 {
            bars.push(bar(i, 97.0, 100.0, 99.5));
        }
        for i in 5..10 {
            bars.push(bar(i, 98.0, 100.5, 99.8));
        }
        for i in 10..30 {
            bars.push(bar(i, 99.0, 103.0, 101.0));
        }
        let view = OhlcView::from_descending(bars);
        assert_eq!(evaluate(&view), None);
    }

    #[test]
    fn ma20_reclaim_with_strong_close_fires() {
        let mut bars = Vec::new();
        // Today: reclaim above SMA20 (~100) closing near the high. The wide
        // session history keeps ATR large enough for the 2.5R risk check.
        bars.push(bar(0, 99.0, 103.5, 103.0));
        // Yesterday below its SMA; its 95 low becomes the invalidation level.
        bars.push(bar(1, 95.0, 99.0, 97.0));
        for i in 2..30 {
            bars.push(bar(i, 98.0, 102.0, 100.0));
        }
        let view = OhlcView::from_descending(bars);
        assert_eq!(evaluate(&view), Some(SignalKey::EntrySetupValid));
    }

    #[test]
    fn reclaim_with_weak_close_does_not_fire() {
        let mut bars = Vec::new();
        // Close barely above SMA but in the bottom third of the session.
        bars.push(bar(0, 100.2, 103.5, 101.0));
        bars.push(bar(1, 96.0, 99.0, 97.0));
        for i in 2..30 {
            bars.push(bar(i, 99.0, 101.0, 100.0));
        }
        let view = OhlcView::from_descending(bars);
        assert_eq!(evaluate(&view), None);
    }

    #[test]
    fn support_break_blocks_setup() {
        let mut bars = Vec::new();
        // Box holds but yesterday's close knifed under the box low.
        bars.push(bar(0, 98.0, 102.0, 101.0));
        bars.push(bar(1, 98.0, 102.0, 96.0));
        for i in 2..10 {
            bars.push(bar(i, 98.0, 102.0, 101.0));
        }
        for i in 10..30 {
            bars.push(bar(i, 99.0, 103.0, 101.0));
        }
        let view = OhlcView::from_descending(bars);
        assert_eq!(evaluate(&view), None);
    }

    #[test]
    fn short_history_absent() {
        let view = OhlcView::from_descending(vec![bar(0, 98.0, 102.0, 101.0)]);
        assert_eq!(evaluate(&view), None);
    }
}
