//! Signal layer — primitive facts derived from OHLC windows.
//!
//! Each module computes one signal through the uniform contract
//! `evaluate(&OhlcView, ...) -> Option<SignalKey>`, so the provider can
//! orchestrate them order-independently and invalidation suppression runs as
//! a pure set operation. Signals are observations only: they never read
//! policy state or history.

pub mod dow;
pub mod entry_setup_valid;
pub mod invalidated;
pub mod ma20_reclaimed;
pub mod provider;
pub mod sharp_sell_off;
pub mod slow_drift;
pub mod stabilization_confirmed;
pub mod structural_downtrend;
pub mod trend_matured;
pub mod trend_started;
pub mod volatility_compression;

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

pub use provider::SignalProvider;

/// Closed set of signal identifiers. Labels are the persisted vocabulary.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SignalKey {
    SlowDeclineStarted,
    SlowDriftDetected,
    SharpSellOffDetected,
    StructuralDowntrendDetected,
    VolatilityCompressionDetected,
    Ma20Reclaimed,
    HigherLowConfirmed,
    StructureBreakoutUpConfirmed,
    TrendStarted,
    TrendMatured,
    SellingPressureEased,
    StabilizationConfirmed,
    EntrySetupValid,
    EdgeGone,
    Invalidated,
    DataInsufficient,
    NoSignal,
    DowTrendUp,
    DowTrendDown,
    DowTrendNeutral,
    DowTrendChangeUpToNeutral,
    DowTrendChangeDownToNeutral,
    DowTrendChangeNeutralToUp,
    DowTrendChangeNeutralToDown,
    DowLastLowL,
    DowLastLowHl,
    DowLastLowLl,
    DowLastHighH,
    DowLastHighHh,
    DowLastHighLh,
    DowNewLl,
    DowNewHh,
    DowReset,
    DowBosBreakUp,
    DowBosBreakDown,
}

impl SignalKey {
    pub fn as_str(self) -> &'static str {
        match self {
            SignalKey::SlowDeclineStarted => "SLOW_DECLINE_STARTED",
            SignalKey::SlowDriftDetected => "SLOW_DRIFT_DETECTED",
            SignalKey::SharpSellOffDetected => "SHARP_SELL_OFF_DETECTED",
            SignalKey::StructuralDowntrendDetected => "STRUCTURAL_DOWNTREND_DETECTED",
            SignalKey::VolatilityCompressionDetected => "VOLATILITY_COMPRESSION_DETECTED",
            SignalKey::Ma20Reclaimed => "MA20_RECLAIMED",
            SignalKey::HigherLowConfirmed => "HIGHER_LOW_CONFIRMED",
            SignalKey::StructureBreakoutUpConfirmed => "STRUCTURE_BREAKOUT_UP_CONFIRMED",
            SignalKey::TrendStarted => "TREND_STARTED",
            SignalKey::TrendMatured => "TREND_MATURED",
            SignalKey::SellingPressureEased => "SELLING_PRESSURE_EASED",
            SignalKey::StabilizationConfirmed => "STABILIZATION_CONFIRMED",
            SignalKey::EntrySetupValid => "ENTRY_SETUP_VALID",
            SignalKey::EdgeGone => "EDGE_GONE",
            SignalKey::Invalidated => "INVALIDATED",
            SignalKey::DataInsufficient => "DATA_INSUFFICIENT",
            SignalKey::NoSignal => "NO_SIGNAL",
            SignalKey::DowTrendUp => "DOW_TREND_UP",
            SignalKey::DowTrendDown => "DOW_TREND_DOWN",
            SignalKey::DowTrendNeutral => "DOW_TREND_NEUTRAL",
            SignalKey::DowTrendChangeUpToNeutral => "DOW_TREND_CHANGE_UP_TO_NEUTRAL",
            SignalKey::DowTrendChangeDownToNeutral => "DOW_TREND_CHANGE_DOWN_TO_NEUTRAL",
            SignalKey::DowTrendChangeNeutralToUp => "DOW_TREND_CHANGE_NEUTRAL_TO_UP",
            SignalKey::DowTrendChangeNeutralToDown => "DOW_TREND_CHANGE_NEUTRAL_TO_DOWN",
            SignalKey::DowLastLowL => "DOW_LAST_LOW_L",
            SignalKey::DowLastLowHl => "DOW_LAST_LOW_HL",
            SignalKey::DowLastLowLl => "DOW_LAST_LOW_LL",
            SignalKey::DowLastHighH => "DOW_LAST_HIGH_H",
            SignalKey::DowLastHighHh => "DOW_LAST_HIGH_HH",
            SignalKey::DowLastHighLh => "DOW_LAST_HIGH_LH",
            SignalKey::DowNewLl => "DOW_NEW_LL",
            SignalKey::DowNewHh => "DOW_NEW_HH",
            SignalKey::DowReset => "DOW_RESET",
            SignalKey::DowBosBreakUp => "DOW_BOS_BREAK_UP",
            SignalKey::DowBosBreakDown => "DOW_BOS_BREAK_DOWN",
        }
    }

    pub fn parse(label: &str) -> Option<SignalKey> {
        serde_json::from_value(serde_json::Value::String(label.to_string())).ok()
    }

    /// Dow facts are structural observations; everything else is a primary
    /// signal for the NO_SIGNAL bookkeeping.
    pub fn is_dow_fact(self) -> bool {
        self.as_str().starts_with("DOW_")
    }
}

impl std::fmt::Display for SignalKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable snapshot of observed signals for a single ticker and date.
/// Set semantics: membership matters, order does not.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignalSet {
    keys: BTreeSet<SignalKey>,
}

impl SignalSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_keys<I: IntoIterator<Item = SignalKey>>(keys: I) -> Self {
        Self {
            keys: keys.into_iter().collect(),
        }
    }

    /// The degenerate set a provider emits when preconditions fail.
    pub fn insufficient() -> Self {
        Self::from_keys([SignalKey::DataInsufficient])
    }

    pub fn has(&self, key: SignalKey) -> bool {
        self.keys.contains(&key)
    }

    pub fn insert(&mut self, key: SignalKey) {
        self.keys.insert(key);
    }

    pub fn remove(&mut self, key: SignalKey) {
        self.keys.remove(&key);
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = SignalKey> + '_ {
        self.keys.iter().copied()
    }

    /// Lexicographically sorted labels for persistence (`signal_keys_json`).
    pub fn sorted_labels(&self) -> Vec<&'static str> {
        let mut labels: Vec<&'static str> = self.keys.iter().map(|k| k.as_str()).collect();
        labels.sort_unstable();
        labels
    }
}

impl FromIterator<SignalKey> for SignalSet {
    fn from_iter<T: IntoIterator<Item = SignalKey>>(iter: T) -> Self {
        Self::from_keys(iter)
    }
}

/// Rolling SMA over a most-recent-first series: `out[i]` is the mean of
/// `values[i..i + window]`. `None` when fewer than `window` values exist.
pub(crate) fn sma_series_desc(values: &[f64], window: usize) -> Option<Vec<f64>> {
    if window == 0 || values.len() < window {
        return None;
    }
    let mut out = Vec::with_capacity(values.len() - window + 1);
    let mut sum: f64 = values[..window].iter().sum();
    out.push(sum / window as f64);
    for i in 1..=values.len() - window {
        sum += values[i + window - 1] - values[i - 1];
        out.push(sum / window as f64);
    }
    Some(out)
}

/// Median of a slice; `None` when empty.
pub(crate) fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).expect("finite values"));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_round_trip() {
        for key in [
            SignalKey::SlowDriftDetected,
            SignalKey::Ma20Reclaimed,
            SignalKey::DowTrendChangeUpToNeutral,
            SignalKey::DowLastLowHl,
            SignalKey::DowBosBreakDown,
            SignalKey::DowNewLl,
        ] {
            assert_eq!(SignalKey::parse(key.as_str()), Some(key));
        }
        assert_eq!(SignalKey::parse("MA20_RECLAIMED"), Some(SignalKey::Ma20Reclaimed));
        assert_eq!(SignalKey::parse("NOT_A_SIGNAL"), None);
    }

    #[test]
    fn dow_fact_classification() {
        assert!(SignalKey::DowTrendDown.is_dow_fact());
        assert!(SignalKey::DowReset.is_dow_fact());
        assert!(!SignalKey::TrendStarted.is_dow_fact());
        assert!(!SignalKey::HigherLowConfirmed.is_dow_fact());
    }

    #[test]
    fn set_is_order_independent_and_sorted() {
        let a = SignalSet::from_keys([SignalKey::TrendStarted, SignalKey::DowTrendDown]);
        let b = SignalSet::from_keys([SignalKey::DowTrendDown, SignalKey::TrendStarted]);
        assert_eq!(a, b);
        assert_eq!(a.sorted_labels(), vec!["DOW_TREND_DOWN", "TREND_STARTED"]);
    }

    #[test]
    fn sma_series_desc_rolls_forward() {
        let values = [16.0, 15.0, 14.0, 13.0, 12.0, 11.0, 10.0];
        let sma = sma_series_desc(&values, 5).unwrap();
        assert_eq!(sma.len(), 3);
        assert!((sma[0] - 14.0).abs() < 1e-12);
        assert!((sma[1] - 13.0).abs() < 1e-12);
        assert!((sma[2] - 12.0).abs() < 1e-12);
        assert!(sma_series_desc(&values[..3], 5).is_none());
    }

    #[test]
    fn median_even_and_odd() {
        assert_eq!(median(&[3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(&[4.0, 1.0, 3.0, 2.0]), Some(2.5));
        assert_eq!(median(&[]), None);
    }
}
