//! Dow-theory structure analyzer.
//!
//! Walks the series chronologically, confirms swing pivots over a symmetric
//! window, labels them (H/HH/LH, L/HL/LL) against the active structural
//! high/low, and derives a trend plus reset (BoS) markers. Pivots are
//! re-derived per evaluation; nothing is cached across evaluations.
//!
//! Label semantics:
//! - HH updates the active structural high; LH does not (unless the
//!   sensitive-down-reset option is on and the trend is DOWN).
//! - HL and LL both update the active structural low.
//! - Two consecutive closes through the active structural level while
//!   trending emit a reset marker `R` and clear both levels.

use chrono::NaiveDate;

use crate::data::OhlcView;

use super::{SignalKey, SignalSet};

/// Relative tolerance for "meaningfully different" pivot prices.
pub const EPS_PCT: f64 = 0.0001;
const MEANINGLESS_PCT: f64 = 0.0001;
const BOS_BREAK_COUNT: usize = 2;

#[derive(Debug, Clone)]
pub struct DowConfig {
    /// Symmetric pivot confirmation window.
    pub window: usize,
    /// Detect pivots on session highs/lows rather than closes.
    pub use_high_low: bool,
    /// In a DOWN trend, let an LH pivot pull the active structural high down.
    pub sensitive_down_reset: bool,
}

impl Default for DowConfig {
    fn default() -> Self {
        Self {
            window: 3,
            use_high_low: true,
            sensitive_down_reset: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DowTrend {
    Up,
    Down,
    Neutral,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerLabel {
    H,
    Hh,
    Lh,
    L,
    Hl,
    Ll,
    Reset,
}

impl MarkerLabel {
    fn is_high(self) -> bool {
        matches!(self, MarkerLabel::H | MarkerLabel::Hh | MarkerLabel::Lh)
    }

    fn is_low(self) -> bool {
        matches!(self, MarkerLabel::L | MarkerLabel::Hl | MarkerLabel::Ll)
    }
}

#[derive(Debug, Clone)]
pub struct Marker {
    pub date: NaiveDate,
    pub value: f64,
    pub label: MarkerLabel,
    pub pivot: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum PivotKind {
    High,
    Low,
}

/// Trend derived from the marker sequence after the last reset: UP when the
/// latest swing pair is HH + HL, DOWN when it is LH + LL, otherwise neutral.
fn trend_from_markers(markers: &[Marker]) -> (DowTrend, Option<MarkerLabel>, Option<MarkerLabel>) {
    let view_start = markers
        .iter()
        .rposition(|m| m.label == MarkerLabel::Reset)
        .map(|i| i + 1)
        .unwrap_or(0);
    let view = &markers[view_start..];
    let last_high = view.iter().rev().find(|m| m.label.is_high()).map(|m| m.label);
    let last_low = view.iter().rev().find(|m| m.label.is_low()).map(|m| m.label);
    let trend = match (last_high, last_low) {
        (Some(MarkerLabel::Hh), Some(MarkerLabel::Hl)) => DowTrend::Up,
        (Some(MarkerLabel::Lh), Some(MarkerLabel::Ll)) => DowTrend::Down,
        _ => DowTrend::Neutral,
    };
    (trend, last_high, last_low)
}

/// Trend transitions attributed to the marker that caused them.
fn trend_changes(markers: &[Marker]) -> Vec<(NaiveDate, DowTrend, DowTrend)> {
    let mut changes = Vec::new();
    let mut prev: Option<DowTrend> = None;
    for i in 0..markers.len() {
        let (trend, _, _) = trend_from_markers(&markers[..i + 1]);
        match prev {
            None => prev = Some(trend),
            Some(p) if p != trend => {
                changes.push((markers[i].date, p, trend));
                prev = Some(trend);
            }
            Some(_) => {}
        }
    }
    changes
}

/// Confirmed pivots: a high pivot strictly exceeds every high in the window
/// on both sides (ties disqualify); low pivots mirror. A trailing bar with an
/// empty forward window can still qualify.
fn find_pivots(highs: &[f64], lows: &[f64], window: usize) -> Vec<(usize, PivotKind, f64)> {
    let n = highs.len();
    let mut pivots = Vec::new();
    for i in 0..n {
        let back = i.saturating_sub(window)..i;
        let fwd = i + 1..(i + window + 1).min(n);

        let is_high = back.clone().all(|j| highs[j] < highs[i])
            && fwd.clone().all(|j| highs[j] < highs[i]);
        if is_high {
            pivots.push((i, PivotKind::High, highs[i]));
        }

        let is_low = back.clone().all(|j| lows[j] > lows[i])
            && fwd.clone().all(|j| lows[j] > lows[i]);
        if is_low {
            pivots.push((i, PivotKind::Low, lows[i]));
        }
    }
    pivots
}

/// Compute the full marker sequence over bars in chronological order.
pub fn compute_markers(
    dates: &[NaiveDate],
    closes: &[f64],
    highs: &[f64],
    lows: &[f64],
    config: &DowConfig,
) -> Vec<Marker> {
    let n = closes.len();
    if n == 0 {
        return Vec::new();
    }
    let (piv_highs, piv_lows) = if config.use_high_low {
        (highs, lows)
    } else {
        (closes, closes)
    };
    let pivots = find_pivots(piv_highs, piv_lows, config.window);

    let mut markers: Vec<Marker> = Vec::new();
    let mut active_high: Option<(NaiveDate, f64)> = None;
    let mut active_low: Option<(NaiveDate, f64)> = None;
    let mut bos_down_count = 0usize;
    let mut bos_up_count = 0usize;
    let mut pivot_cursor = 0usize;

    for i in 0..n {
        let val = closes[i];
        let date = dates[i];
        let (trend, _, _) = trend_from_markers(&markers);

        if trend == DowTrend::Neutral {
            bos_down_count = 0;
            bos_up_count = 0;
        }

        // Regime death check runs on every bar, before pivot processing.
        if trend == DowTrend::Up && active_low.is_some_and(|(_, asl)| val < asl) {
            bos_down_count += 1;
        } else {
            bos_down_count = 0;
        }
        if trend == DowTrend::Down && active_high.is_some_and(|(_, ash)| val > ash) {
            bos_up_count += 1;
        } else {
            bos_up_count = 0;
        }

        let reset = (trend == DowTrend::Up && bos_down_count >= BOS_BREAK_COUNT)
            || (trend == DowTrend::Down && bos_up_count >= BOS_BREAK_COUNT);
        if reset {
            markers.push(Marker {
                date,
                value: val,
                label: MarkerLabel::Reset,
                pivot: None,
            });
            active_high = None;
            active_low = None;
            bos_down_count = 0;
            bos_up_count = 0;
            // Pivots on the reset bar are not processed.
            while pivot_cursor < pivots.len() && pivots[pivot_cursor].0 <= i {
                pivot_cursor += 1;
            }
            continue;
        }

        // Pivots confirmed at this bar, highs before lows.
        let start = pivot_cursor;
        while pivot_cursor < pivots.len() && pivots[pivot_cursor].0 == i {
            pivot_cursor += 1;
        }
        let mut pivots_here: Vec<(PivotKind, f64)> = pivots[start..pivot_cursor]
            .iter()
            .map(|&(_, kind, value)| (kind, value))
            .collect();
        pivots_here.sort_by_key(|(kind, _)| match kind {
            PivotKind::High => 0,
            PivotKind::Low => 1,
        });

        for (kind, pivot_val) in pivots_here {
            let (current_trend, _, _) = trend_from_markers(&markers);

            // Skip pivots indistinguishable from the active level.
            let meaningless = match kind {
                PivotKind::High => active_high
                    .is_some_and(|(_, ash)| (pivot_val - ash).abs() / ash < MEANINGLESS_PCT),
                PivotKind::Low => active_low
                    .is_some_and(|(_, asl)| (pivot_val - asl).abs() / asl < MEANINGLESS_PCT),
            };
            if meaningless {
                continue;
            }

            // A "low" pivot back at the structural high acts as a high retest
            // and vice versa.
            let effective = match kind {
                PivotKind::Low
                    if active_high.is_some_and(|(_, ash)| pivot_val >= ash * (1.0 - EPS_PCT)) =>
                {
                    PivotKind::High
                }
                PivotKind::High
                    if active_low.is_some_and(|(_, asl)| pivot_val <= asl * (1.0 + EPS_PCT)) =>
                {
                    PivotKind::Low
                }
                other => other,
            };

            let label = match effective {
                PivotKind::High => match active_high {
                    Some((_, ash)) => {
                        if pivot_val > ash {
                            active_high = Some((date, pivot_val));
                            MarkerLabel::Hh
                        } else {
                            MarkerLabel::Lh
                        }
                    }
                    None => {
                        active_high = Some((date, pivot_val));
                        MarkerLabel::H
                    }
                },
                PivotKind::Low => match active_low {
                    Some((_, asl)) => {
                        let label = if pivot_val > asl {
                            MarkerLabel::Hl
                        } else {
                            MarkerLabel::Ll
                        };
                        active_low = Some((date, pivot_val));
                        label
                    }
                    None => {
                        active_low = Some((date, pivot_val));
                        MarkerLabel::L
                    }
                },
            };

            if label == MarkerLabel::Lh
                && config.sensitive_down_reset
                && current_trend == DowTrend::Down
                && active_high.is_some()
            {
                active_high = Some((date, pivot_val));
            }

            markers.push(Marker {
                date,
                value: val,
                label,
                pivot: Some(pivot_val),
            });
        }
    }

    markers
}

/// Derive the Dow signal facts for an evaluation as of `as_of`.
pub fn compute_facts(view: &OhlcView, as_of: NaiveDate, config: &DowConfig) -> SignalSet {
    let ascending = view.ascending();
    let dates: Vec<NaiveDate> = ascending.iter().map(|b| b.date).collect();
    let closes: Vec<f64> = ascending.iter().map(|b| b.close).collect();
    let highs: Vec<f64> = ascending.iter().map(|b| b.high).collect();
    let lows: Vec<f64> = ascending.iter().map(|b| b.low).collect();

    let mut markers = compute_markers(&dates, &closes, &highs, &lows, config);
    markers.retain(|m| m.date <= as_of);

    let mut facts = SignalSet::new();
    if markers.is_empty() {
        return facts;
    }

    let (trend, last_high, last_low) = trend_from_markers(&markers);
    facts.insert(match trend {
        DowTrend::Up => SignalKey::DowTrendUp,
        DowTrend::Down => SignalKey::DowTrendDown,
        DowTrend::Neutral => SignalKey::DowTrendNeutral,
    });

    match last_low {
        Some(MarkerLabel::Ll) => facts.insert(SignalKey::DowLastLowLl),
        Some(MarkerLabel::Hl) => facts.insert(SignalKey::DowLastLowHl),
        Some(MarkerLabel::L) => facts.insert(SignalKey::DowLastLowL),
        _ => {}
    }
    match last_high {
        Some(MarkerLabel::Hh) => facts.insert(SignalKey::DowLastHighHh),
        Some(MarkerLabel::Lh) => facts.insert(SignalKey::DowLastHighLh),
        Some(MarkerLabel::H) => facts.insert(SignalKey::DowLastHighH),
        _ => {}
    }

    // Fresh structural extremes: the latest pivot must clear the prior one by
    // more than the epsilon band.
    let low_markers: Vec<&Marker> = markers.iter().filter(|m| m.label.is_low()).collect();
    if let [.., prev, last] = low_markers.as_slice() {
        let last_price = last.pivot.unwrap_or(last.value);
        if last.label == MarkerLabel::Ll {
            if let Some(prev_price) = prev.pivot {
                if last_price < prev_price * (1.0 - EPS_PCT) {
                    facts.insert(SignalKey::DowNewLl);
                }
            }
        }
    }
    let high_markers: Vec<&Marker> = markers.iter().filter(|m| m.label.is_high()).collect();
    if let [.., prev, last] = high_markers.as_slice() {
        let last_price = last.pivot.unwrap_or(last.value);
        if last.label == MarkerLabel::Hh {
            if let Some(prev_price) = prev.pivot {
                if last_price > prev_price * (1.0 + EPS_PCT) {
                    facts.insert(SignalKey::DowNewHh);
                }
            }
        }
    }

    for (date, from, to) in trend_changes(&markers) {
        if date != as_of {
            continue;
        }
        match (from, to) {
            (DowTrend::Up, DowTrend::Neutral) => {
                facts.insert(SignalKey::DowTrendChangeUpToNeutral)
            }
            (DowTrend::Down, DowTrend::Neutral) => {
                facts.insert(SignalKey::DowTrendChangeDownToNeutral)
            }
            (DowTrend::Neutral, DowTrend::Up) => {
                facts.insert(SignalKey::DowTrendChangeNeutralToUp)
            }
            (DowTrend::Neutral, DowTrend::Down) => {
                facts.insert(SignalKey::DowTrendChangeNeutralToDown)
            }
            _ => {}
        }
    }

    for (idx, marker) in markers.iter().enumerate() {
        if marker.label != MarkerLabel::Reset || marker.date != as_of {
            continue;
        }
        facts.insert(SignalKey::DowReset);
        let (prior_trend, _, _) = trend_from_markers(&markers[..idx]);
        match prior_trend {
            DowTrend::Up => facts.insert(SignalKey::DowBosBreakDown),
            DowTrend::Down => facts.insert(SignalKey::DowBosBreakUp),
            DowTrend::Neutral => {}
        }
    }

    facts
}
