//! SHARP_SELL_OFF_DETECTED — an outsized down move relative to the ticker's
//! own volatility. One-day return beyond 2.5× ATR% or three-day return
//! beyond 3.5× ATR%.

use crate::data::OhlcView;

use super::SignalKey;

const ATR_LEN: usize = 14;
const ONE_DAY_MULT: f64 = 2.5;
const THREE_DAY_MULT: f64 = 3.5;

pub fn evaluate(view: &OhlcView) -> Option<SignalKey> {
    let closes = view.closes();
    if closes.len() < 4 {
        return None;
    }
    let c_t0 = closes[0];
    let c_t1 = closes[1];
    let c_t3 = closes[3];
    if c_t0 <= 0.0 || c_t1 <= 0.0 || c_t3 <= 0.0 {
        return None;
    }

    let atr14 = view.atr(ATR_LEN)?;
    let atr_pct = atr14 / c_t0;
    if atr_pct <= 0.0 {
        return None;
    }

    let one_day = c_t0 / c_t1 - 1.0;
    let three_day = c_t0 / c_t3 - 1.0;
    (one_day <= -(ONE_DAY_MULT * atr_pct) || three_day <= -(THREE_DAY_MULT * atr_pct))
        .then_some(SignalKey::SharpSellOffDetected)
}
