//! STRUCTURAL_DOWNTREND_DETECTED — prefer the Dow facts (DOW_TREND_DOWN or
//! DOW_NEW_LL); otherwise fall back to 1-step pivot structure over the last
//! 30 closes: at least two swing highs and two swing lows with the last two
//! of each descending.

use crate::data::OhlcView;

use super::{SignalKey, SignalSet};

const LOOKBACK_WINDOW: usize = 30;

pub fn evaluate(view: &OhlcView, dow_facts: &SignalSet) -> Option<SignalKey> {
    if dow_facts.has(SignalKey::DowTrendDown) || dow_facts.has(SignalKey::DowNewLl) {
        return Some(SignalKey::StructuralDowntrendDetected);
    }

    let closes = view.closes();
    let window = &closes[..closes.len().min(LOOKBACK_WINDOW)];
    if window.len() < 5 {
        return None;
    }

    // Chronological order for pivot scanning.
    let asc: Vec<f64> = window.iter().rev().copied().collect();
    let mut highs = Vec::new();
    let mut lows = Vec::new();
    for i in 1..asc.len() - 1 {
        if asc[i] > asc[i - 1] && asc[i] > asc[i + 1] {
            highs.push(asc[i]);
        }
        if asc[i] < asc[i - 1] && asc[i] < asc[i + 1] {
            lows.push(asc[i]);
        }
    }
    if highs.len() < 2 || lows.len() < 2 {
        return None;
    }

    let descending_highs = highs[highs.len() - 2] > highs[highs.len() - 1];
    let descending_lows = lows[lows.len() - 2] > lows[lows.len() - 1];
    (descending_highs && descending_lows).then_some(SignalKey::StructuralDowntrendDetected)
}
