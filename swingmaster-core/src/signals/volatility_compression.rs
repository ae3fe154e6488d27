//! VOLATILITY_COMPRESSION_DETECTED — ATR%/close at t0 below the t-5 and t-10
//! readings and at most 75% of the rolling 20-day maximum.

use crate::data::OhlcView;

use super::SignalKey;

const ATR_LEN: usize = 14;
const ROLLING_WINDOW: usize = 20;
const OFFSET_T5: usize = 5;
const OFFSET_T10: usize = 10;
const COMPRESSION_RATIO: f64 = 0.75;

pub fn evaluate(view: &OhlcView) -> Option<SignalKey> {
    let closes = view.closes();
    let min_required = (ROLLING_WINDOW - 1) + ATR_LEN + 1;
    if closes.len() < min_required {
        return None;
    }

    let mut atr_pct = [0.0f64; ROLLING_WINDOW];
    for (offset, slot) in atr_pct.iter_mut().enumerate() {
        let close = closes[offset];
        if close <= 0.0 {
            return None;
        }
        let atr = view.atr_from(offset, ATR_LEN)?;
        let pct = atr / close;
        if pct <= 0.0 {
            return None;
        }
        *slot = pct;
    }

    let t0 = atr_pct[0];
    let rolling_max = atr_pct.iter().copied().fold(f64::MIN, f64::max);
    (t0 < atr_pct[OFFSET_T5] && t0 < atr_pct[OFFSET_T10] && t0 <= COMPRESSION_RATIO * rolling_max)
        .then_some(SignalKey::VolatilityCompressionDetected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{OhlcBar, OhlcView};
    use chrono::NaiveDate;

    /// Bars with per-day session ranges given most-recent-first; closes pinned
    /// at 100 so ATR% tracks the ranges directly.
    fn view_with_ranges(ranges_desc: &[f64]) -> OhlcView {
        let latest = NaiveDate::from_ymd_opt(2025, 6, 30).unwrap();
        let bars: Vec<OhlcBar> = ranges_desc
            .iter()
            .enumerate()
            .map(|(i, &r)| {
                let c = 100.0;
                OhlcBar::new(
                    latest - chrono::Duration::days(i as i64),
                    c,
                    c + r / 2.0,
                    c - r / 2.0,
                    c,
                )
            })
            .collect();
        OhlcView::from_descending(bars)
    }

    #[test]
    fn compression_after_expansion_fires() {
        // Recent 10 days tight (range 1), older days wide (range 4):
        // ATR at t0 is far below the t-10 reading and the rolling max.
        let mut ranges = vec![1.0; 10];
        ranges.extend(vec![4.0; 30]);
        let view = view_with_ranges(&ranges);
        assert_eq!(evaluate(&view), Some(SignalKey::VolatilityCompressionDetected));
    }

    #[test]
    fn flat_volatility_does_not_fire() {
        let view = view_with_ranges(&vec![2.0; 40]);
        assert_eq!(evaluate(&view), None);
    }

    #[test]
    fn expanding_volatility_does_not_fire() {
        let mut ranges = vec![4.0; 10];
        ranges.extend(vec![1.0; 30]);
        let view = view_with_ranges(&ranges);
        assert_eq!(evaluate(&view), None);
    }

    #[test]
    fn short_history_absent() {
        let view = view_with_ranges(&vec![1.0; 30]);
        assert_eq!(evaluate(&view), None);
    }
}
