//! SLOW_DRIFT_DETECTED — staircase decline without panic.
//!
//! Monotone weakness at the t-10 / t-5 / t-2 / t0 checkpoints, at least a 3%
//! ten-day decline, and the close trading under a falling MA stack
//! (MA5 < MA10, close < MA10).

use crate::data::OhlcView;

use super::SignalKey;

const LOOKBACK_LONG_DAYS: usize = 10;
const MA_SHORT: usize = 5;
const MA_LONG: usize = 10;
const MIN_DECLINE: f64 = -0.03;

pub fn evaluate(view: &OhlcView) -> Option<SignalKey> {
    let closes = view.closes();
    if closes.len() < LOOKBACK_LONG_DAYS + 1 {
        return None;
    }

    let c_t0 = closes[0];
    let c_t2 = closes[2];
    let c_t5 = closes[5];
    let c_t10 = closes[LOOKBACK_LONG_DAYS];
    if c_t10 <= 0.0 {
        return None;
    }
    if !(c_t10 > c_t5 && c_t5 > c_t2 && c_t2 > c_t0) {
        return None;
    }
    if c_t0 / c_t10 - 1.0 > MIN_DECLINE {
        return None;
    }

    let ma10 = closes[..MA_LONG].iter().sum::<f64>() / MA_LONG as f64;
    let ma5 = closes[..MA_SHORT].iter().sum::<f64>() / MA_SHORT as f64;
    (ma5 < ma10 && c_t0 < ma10).then_some(SignalKey::SlowDriftDetected)
}
