//! STABILIZATION_CONFIRMED — the tape has stopped making downside progress.
//!
//! Four gates over a 7-day recent window against a 20-day baseline:
//! - range-shrink: median daily range/close at most 75% of the baseline
//!   median;
//! - few wide days: at most 20% of recent days range ≥ 1.5× the baseline
//!   median;
//! - no new lows: zero significant undercuts of the baseline low (ε = 0.3%)
//!   and at most one sweep inside the epsilon band;
//! - upper closes: close in the top 45% of the session range on ≥3 of the
//!   7 days.

use crate::data::OhlcView;

use super::{median, SignalKey};

const RECENT_DAYS: usize = 7;
const BASELINE_DAYS: usize = 20;
const RANGE_SHRINK_RATIO: f64 = 0.75;
const WIDE_DAY_MULT: f64 = 1.5;
const WIDE_DAY_MAX_FRAC: f64 = 0.20;
const NEW_LOW_EPS: f64 = 0.003;
const MAX_SWEEPS: usize = 1;
const UPPER_CLOSE_MIN: f64 = 0.55;
const UPPER_CLOSE_DAYS: usize = 3;

pub fn evaluate(view: &OhlcView) -> Option<SignalKey> {
    let bars = view.bars();
    if bars.len() < RECENT_DAYS + BASELINE_DAYS {
        return None;
    }
    let recent = &bars[..RECENT_DAYS];
    let baseline = &bars[RECENT_DAYS..RECENT_DAYS + BASELINE_DAYS];

    let range_ratio = |b: &crate::data::OhlcBar| b.range() / b.close;
    let recent_ratios: Vec<f64> = recent.iter().map(range_ratio).collect();
    let baseline_ratios: Vec<f64> = baseline.iter().map(range_ratio).collect();
    let recent_median = median(&recent_ratios)?;
    let baseline_median = median(&baseline_ratios)?;
    if baseline_median <= 0.0 {
        return None;
    }
    if recent_median > RANGE_SHRINK_RATIO * baseline_median {
        return None;
    }

    let wide_days = recent_ratios
        .iter()
        .filter(|&&r| r >= WIDE_DAY_MULT * baseline_median)
        .count();
    if wide_days as f64 > WIDE_DAY_MAX_FRAC * RECENT_DAYS as f64 {
        return None;
    }

    let baseline_low = baseline.iter().map(|b| b.low).fold(f64::MAX, f64::min);
    let significant_floor = baseline_low * (1.0 - NEW_LOW_EPS);
    let mut significant = 0usize;
    let mut sweeps = 0usize;
    for bar in recent {
        if bar.low < significant_floor {
            significant += 1;
        } else if bar.low < baseline_low {
            sweeps += 1;
        }
    }
    if significant > 0 || sweeps > MAX_SWEEPS {
        return None;
    }

    let upper_closes = recent
        .iter()
        .filter(|b| b.close_position().is_some_and(|p| p >= UPPER_CLOSE_MIN))
        .count();
    (upper_closes >= UPPER_CLOSE_DAYS).then_some(SignalKey::StabilizationConfirmed)
}
