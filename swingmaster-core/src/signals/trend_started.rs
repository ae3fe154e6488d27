//! TREND_STARTED — first confirmed breakdown out of an established up-regime.
//!
//! Regime: at least 70% of the last 30 closes above SMA20 with a rising SMA.
//! Trigger: a fresh downward SMA cross, no recent closes already below the
//! SMA (debounce), and a close under the prior 10-day low.

use crate::data::OhlcView;

use super::{sma_series_desc, SignalKey};

pub const SMA_LEN: usize = 20;
pub const SLOPE_LOOKBACK: usize = 5;
pub const REGIME_WINDOW: usize = 30;
pub const ABOVE_RATIO_MIN: f64 = 0.70;
pub const BREAK_LOW_WINDOW: usize = 10;
pub const DEBOUNCE_DAYS: usize = 5;

pub fn evaluate(view: &OhlcView) -> Option<SignalKey> {
    let closes = view.closes();
    let min_required = [
        SMA_LEN + REGIME_WINDOW - 1,
        SMA_LEN + SLOPE_LOOKBACK,
        SMA_LEN + DEBOUNCE_DAYS + 1,
        BREAK_LOW_WINDOW + 1,
    ]
    .into_iter()
    .max()
    .expect("non-empty");
    if closes.len() < min_required {
        return None;
    }

    let sma20 = sma_series_desc(closes, SMA_LEN)?;

    let above_count = (0..REGIME_WINDOW)
        .filter(|&i| closes[i] > sma20[i])
        .count();
    let above_ratio = above_count as f64 / REGIME_WINDOW as f64;
    let slope = sma20[0] - sma20[SLOPE_LOOKBACK];
    let regime_ok = above_ratio >= ABOVE_RATIO_MIN && slope > 0.0;

    // Fresh cross: yesterday at/above its SMA, today below.
    if !(closes[1] >= sma20[1] && closes[0] < sma20[0]) {
        return None;
    }

    // Debounce: no recent day already below the SMA.
    for i in 1..=DEBOUNCE_DAYS + 1 {
        if closes[i] < sma20[i] {
            return None;
        }
    }

    let prior_low = closes[1..1 + BREAK_LOW_WINDOW]
        .iter()
        .copied()
        .fold(f64::MAX, f64::min);
    let breakdown_ok = closes[0] < prior_low;

    (regime_ok && breakdown_ok).then_some(SignalKey::TrendStarted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::view::tests::bars_from_closes;

    /// A long up-regime (closes well above a rising SMA20) ending in a single
    /// hard break below both the SMA and the prior 10-day low.
    fn breakdown_closes() -> Vec<f64> {
        let mut chronological: Vec<f64> = (0..55).map(|i| 90.0 + i as f64 * 0.5).collect();
        chronological.push(100.0); // breakdown day, prior lows sit ≥ 112
        chronological.reverse();
        chronological
    }

    #[test]
    fn breakdown_from_up_regime_fires() {
        let view = bars_from_closes(&breakdown_closes());
        assert_eq!(evaluate(&view), Some(SignalKey::TrendStarted));
    }

    #[test]
    fn no_cross_means_no_signal() {
        // Steady uptrend without the final break.
        let mut chronological: Vec<f64> = (0..56).map(|i| 90.0 + i as f64 * 0.5).collect();
        chronological.reverse();
        let view = bars_from_closes(&chronological);
        assert_eq!(evaluate(&view), None);
    }

    #[test]
    fn debounce_blocks_repeat_trigger() {
        // A dip below the SMA three days ago disqualifies today's cross.
        let mut chronological: Vec<f64> = (0..52).map(|i| 90.0 + i as f64 * 0.5).collect();
        chronological.push(80.0); // prior dip below SMA
        chronological.push(116.5);
        chronological.push(117.0);
        chronological.push(100.0);
        chronological.reverse();
        let view = bars_from_closes(&chronological);
        assert_eq!(evaluate(&view), None);
    }

    #[test]
    fn weak_regime_does_not_fire() {
        // Choppy tape: closes oscillate around the SMA, above-ratio < 0.70.
        let mut chronological: Vec<f64> = (0..55)
            .map(|i| if i % 2 == 0 { 99.0 } else { 101.0 })
            .collect();
        chronological.push(90.0);
        chronological.reverse();
        let view = bars_from_closes(&chronological);
        assert_eq!(evaluate(&view), None);
    }

    #[test]
    fn short_history_absent() {
        let view = bars_from_closes(&[100.0; 30]);
        assert_eq!(evaluate(&view), None);
    }
}
