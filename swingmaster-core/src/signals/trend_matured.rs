//! TREND_MATURED — the downtrend has progressed into a late stage.
//!
//! Three gates, all required:
//! - structure: repeated new lows in the recent window OR a ≥10% drawdown
//!   from the reference high;
//! - time: a 70% majority of the last 10 closes below SMA20;
//! - momentum: the last three new lows are tightly spaced (≤2% steps), i.e.
//!   the decline is stalling rather than accelerating.

use crate::data::OhlcView;

use super::{sma_series_desc, SignalKey};

const SMA_LEN: usize = 20;
const STRUCT_WINDOW: usize = 15;
const NEW_LOW_LOOKBACK: usize = 10;
const DRAW_REF_LOOKBACK_A: usize = 20;
const DRAW_REF_LOOKBACK_B: usize = 5;
const DRAW_MIN_DD: f64 = 0.10;
const MIN_AGE_DAYS: usize = 10;
const MOMENTUM_WINDOW: usize = 20;
const MOMENTUM_NEWLOW_COUNT: usize = 3;
const MOMENTUM_DROP_MAX: f64 = 0.02;

fn min_required() -> usize {
    let max_index = [
        MIN_AGE_DAYS - 1,
        STRUCT_WINDOW - 1,
        MOMENTUM_WINDOW - 1,
        DRAW_REF_LOOKBACK_A,
    ]
    .into_iter()
    .max()
    .expect("non-empty");
    [
        SMA_LEN + max_index + 1,
        STRUCT_WINDOW + NEW_LOW_LOOKBACK,
        MOMENTUM_WINDOW + NEW_LOW_LOOKBACK,
        DRAW_REF_LOOKBACK_A + 1,
    ]
    .into_iter()
    .max()
    .expect("non-empty")
}

/// A close below the minimum of the prior `lookback` closes.
fn is_new_low(closes: &[f64], idx: usize, lookback: usize) -> bool {
    let Some(prior) = closes.get(idx + 1..idx + 1 + lookback) else {
        return false;
    };
    if prior.is_empty() {
        return false;
    }
    let prior_min = prior.iter().copied().fold(f64::MAX, f64::min);
    closes[idx] < prior_min
}

fn ceil_ratio(n: usize, ratio: f64) -> usize {
    (n as f64 * ratio).ceil() as usize
}

pub fn evaluate(view: &OhlcView) -> Option<SignalKey> {
    let closes = view.closes();
    if closes.len() < min_required() {
        return None;
    }
    let sma20 = sma_series_desc(closes, SMA_LEN)?;

    // Structure: enough recent new lows, or a deep enough drawdown.
    let new_lows = (0..STRUCT_WINDOW)
        .filter(|&i| is_new_low(closes, i, NEW_LOW_LOOKBACK))
        .count();
    let structure_new_lows = new_lows >= 2;

    let ref_slice = &closes[DRAW_REF_LOOKBACK_B..=DRAW_REF_LOOKBACK_A];
    let ref_high = ref_slice.iter().copied().fold(f64::MIN, f64::max);
    if ref_high <= 0.0 {
        return None;
    }
    let drawdown = (ref_high - closes[0]) / ref_high;
    let structure_ok = structure_new_lows || drawdown >= DRAW_MIN_DD;

    // Time: majority of recent closes below the SMA.
    let below_days = (0..MIN_AGE_DAYS)
        .filter(|&i| closes[i] < sma20[i])
        .count();
    let time_ok = below_days >= ceil_ratio(MIN_AGE_DAYS, 0.70);

    // Momentum: the chronologically last three new lows step down ≤2% each.
    let mut new_low_offsets: Vec<usize> = (0..MOMENTUM_WINDOW)
        .filter(|&i| is_new_low(closes, i, NEW_LOW_LOOKBACK))
        .collect();
    if new_low_offsets.len() < MOMENTUM_NEWLOW_COUNT {
        return None;
    }
    // Largest offset = oldest; the final three entries are the most recent.
    new_low_offsets.sort_unstable_by(|a, b| b.cmp(a));
    let last_three = &new_low_offsets[new_low_offsets.len() - MOMENTUM_NEWLOW_COUNT..];
    let (l1, l2, l3) = (
        closes[last_three[0]],
        closes[last_three[1]],
        closes[last_three[2]],
    );
    if l1 <= 0.0 || l2 <= 0.0 {
        return None;
    }
    let step1 = (l2 - l1).abs() / l1;
    let step2 = (l3 - l2).abs() / l2;
    let momentum_ok = step1 <= MOMENTUM_DROP_MAX && step2 <= MOMENTUM_DROP_MAX;

    (structure_ok && time_ok && momentum_ok).then_some(SignalKey::TrendMatured)
}
