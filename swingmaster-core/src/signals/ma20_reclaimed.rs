//! MA20_RECLAIMED — close crosses from at/below SMA20 back above it.

use crate::data::OhlcView;

use super::SignalKey;

const WINDOW: usize = 20;

pub fn evaluate(view: &OhlcView) -> Option<SignalKey> {
    let closes = view.closes();
    if closes.len() < WINDOW + 1 {
        return None;
    }
    if closes[..WINDOW + 1].iter().any(|&c| c <= 0.0) {
        return None;
    }

    let sma_t0 = closes[..WINDOW].iter().sum::<f64>() / WINDOW as f64;
    let sma_t1 = closes[1..WINDOW + 1].iter().sum::<f64>() / WINDOW as f64;
    (closes[0] > sma_t0 && closes[1] <= sma_t1).then_some(SignalKey::Ma20Reclaimed)
}
