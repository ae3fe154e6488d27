//! INVALIDATED — today's low breaks the minimum low of the lookback window.
//! The provider strips same-day STABILIZATION_CONFIRMED and ENTRY_SETUP_VALID
//! when this fires.

use crate::data::OhlcView;

use super::SignalKey;

pub fn evaluate(view: &OhlcView, invalidation_lookback: usize) -> Option<SignalKey> {
    let lows = view.lows();
    if lows.len() < invalidation_lookback + 1 {
        return None;
    }
    let prior_min = lows[1..=invalidation_lookback]
        .iter()
        .copied()
        .fold(f64::MAX, f64::min);
    (lows[0] < prior_min).then_some(SignalKey::Invalidated)
}
