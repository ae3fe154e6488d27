//! Rule policy v1: hard exclusions → helpers → per-state rules → fallback.
//!
//! Helper priority: EDGE_GONE, CHURN_GUARD, ENTRY_CONDITIONS_MET,
//! RESET_TO_NEUTRAL. The churn guard is a veto: it replaces an
//! otherwise-proposed change with a stay when the recent history shows the
//! ticker oscillating.

use chrono::NaiveDate;

use crate::domain::{Decision, ReasonCode, State, StateAttrs};
use crate::signals::{SignalKey, SignalSet};

use super::history::StateHistory;
use super::TransitionPolicy;

/// Days an entry window may stay open before the edge is declared gone.
pub const ENTRY_WINDOW_MAX_DAYS: i64 = 9;
/// Days a stabilization may grind before it resets to neutral.
pub const STABILIZING_MAX_DAYS: i64 = 20;
/// Lookback for recent stabilization evidence and the edge-gone exception.
pub const STAB_RECENCY_DAYS: usize = 10;
/// Lookback for recent setup evidence.
pub const SETUP_FRESH_DAYS: usize = 5;
/// Realized transitions inside the window that trip the churn guard.
pub const CHURN_GUARD_WINDOW_DAYS: usize = 10;
pub const CHURN_GUARD_THRESHOLD: usize = 3;
/// Quiet days (NO_SIGNAL) in a non-neutral state before a forced reset.
pub const RESET_NO_SIGNAL_DAYS: i64 = 10;

const RESET_BLOCKERS: [SignalKey; 8] = [
    SignalKey::TrendStarted,
    SignalKey::TrendMatured,
    SignalKey::SellingPressureEased,
    SignalKey::StabilizationConfirmed,
    SignalKey::EntrySetupValid,
    SignalKey::Ma20Reclaimed,
    SignalKey::HigherLowConfirmed,
    SignalKey::StructureBreakoutUpConfirmed,
];

const ENTRY_BLOCKERS: [SignalKey; 6] = [
    SignalKey::DataInsufficient,
    SignalKey::Invalidated,
    SignalKey::EdgeGone,
    SignalKey::NoSignal,
    SignalKey::TrendStarted,
    SignalKey::TrendMatured,
];

#[derive(Debug, Clone)]
struct Proposal {
    next_state: State,
    reasons: Vec<ReasonCode>,
}

pub struct PolicyV1<'a> {
    history: Option<&'a dyn StateHistory>,
}

impl<'a> PolicyV1<'a> {
    pub fn new() -> Self {
        Self { history: None }
    }

    pub fn with_history(history: &'a dyn StateHistory) -> Self {
        Self {
            history: Some(history),
        }
    }

    fn recent_days(
        &self,
        ticker: &str,
        as_of: NaiveDate,
        limit: usize,
    ) -> Vec<super::history::StateHistoryDay> {
        self.history
            .map(|h| h.recent_days(ticker, as_of, limit))
            .unwrap_or_default()
    }

    /// Hard exclusions, ordered: DATA_INSUFFICIENT > INVALIDATED.
    fn hard_exclusion(signals: &SignalSet) -> Option<Proposal> {
        if signals.has(SignalKey::DataInsufficient) {
            return Some(Proposal {
                next_state: State::NoTrade,
                reasons: vec![ReasonCode::DataInsufficient],
            });
        }
        if signals.has(SignalKey::Invalidated) {
            return Some(Proposal {
                next_state: State::NoTrade,
                reasons: vec![ReasonCode::Invalidated],
            });
        }
        None
    }

    /// EDGE_GONE: a stale entry window is forced to PASS; a stale
    /// stabilization is forced to neutral unless a setup appeared recently.
    fn edge_gone(
        &self,
        prev_state: State,
        prev_attrs: &StateAttrs,
        ticker: &str,
        as_of: NaiveDate,
    ) -> Option<Proposal> {
        match prev_state {
            State::EntryWindow if prev_attrs.age >= ENTRY_WINDOW_MAX_DAYS => Some(Proposal {
                next_state: State::Pass,
                reasons: vec![ReasonCode::EdgeGone],
            }),
            State::Stabilizing if prev_attrs.age >= STABILIZING_MAX_DAYS => {
                let recent_setup = self
                    .recent_days(ticker, as_of, STAB_RECENCY_DAYS)
                    .iter()
                    .any(|d| d.signal_keys.contains(&SignalKey::EntrySetupValid));
                if recent_setup {
                    None
                } else {
                    Some(Proposal {
                        next_state: State::NoTrade,
                        reasons: vec![ReasonCode::EdgeGone],
                    })
                }
            }
            _ => None,
        }
    }

    /// ENTRY_CONDITIONS_MET: STABILIZING → ENTRY_WINDOW on a same-day valid
    /// setup with stabilization context. Context comes from the same day, a
    /// recent confirmed stabilization, or a freshly closed entry window.
    fn entry_conditions_met(
        &self,
        prev_state: State,
        signals: &SignalSet,
        ticker: &str,
        as_of: NaiveDate,
    ) -> Option<Proposal> {
        if prev_state != State::Stabilizing {
            return None;
        }
        if ENTRY_BLOCKERS.iter().any(|&k| signals.has(k)) {
            return None;
        }
        if !signals.has(SignalKey::EntrySetupValid) {
            return None;
        }

        let recent_stabilization = || {
            self.recent_days(ticker, as_of, STAB_RECENCY_DAYS).iter().any(|d| {
                d.signal_keys.contains(&SignalKey::StabilizationConfirmed)
                    || d.reasons.contains(&ReasonCode::StabilizationConfirmed)
            })
        };
        let recent_entry_window = || {
            self.recent_days(ticker, as_of, SETUP_FRESH_DAYS)
                .iter()
                .any(|d| {
                    d.state == State::EntryWindow
                        || d.signal_keys.contains(&SignalKey::EntrySetupValid)
                })
        };
        let context_ok = signals.has(SignalKey::StabilizationConfirmed)
            || recent_stabilization()
            || recent_entry_window();
        if !context_ok {
            return None;
        }

        Some(Proposal {
            next_state: State::EntryWindow,
            reasons: vec![ReasonCode::EntryConditionsMet],
        })
    }

    /// RESET_TO_NEUTRAL: silent decay. Fires out of any non-neutral state on
    /// an EDGE_GONE observation, or once enough consecutive quiet days have
    /// accumulated, unless any progress signal is present.
    fn reset_to_neutral(&self, prev_state: State, prev_attrs: &StateAttrs, signals: &SignalSet) -> Option<Proposal> {
        if prev_state == State::NoTrade {
            return None;
        }
        if RESET_BLOCKERS.iter().any(|&k| signals.has(k)) {
            return None;
        }
        let quiet_decay =
            signals.has(SignalKey::NoSignal) && prev_attrs.age + 1 >= RESET_NO_SIGNAL_DAYS;
        if signals.has(SignalKey::EdgeGone) || quiet_decay {
            return Some(Proposal {
                next_state: State::NoTrade,
                reasons: vec![ReasonCode::ResetToNeutral],
            });
        }
        None
    }

    fn per_state_rule(prev_state: State, signals: &SignalSet) -> Option<Proposal> {
        let stabilizing_entry = |signals: &SignalSet| {
            if signals.has(SignalKey::StabilizationConfirmed) {
                Some(Proposal {
                    next_state: State::Stabilizing,
                    reasons: vec![ReasonCode::StabilizationConfirmed],
                })
            } else if signals.has(SignalKey::SellingPressureEased) {
                Some(Proposal {
                    next_state: State::Stabilizing,
                    reasons: vec![ReasonCode::SellingPressureEased],
                })
            } else {
                None
            }
        };

        match prev_state {
            State::NoTrade => signals.has(SignalKey::TrendStarted).then(|| Proposal {
                next_state: State::DowntrendEarly,
                reasons: vec![ReasonCode::TrendStarted],
            }),
            State::DowntrendEarly => {
                if signals.has(SignalKey::TrendMatured) {
                    Some(Proposal {
                        next_state: State::DowntrendLate,
                        reasons: vec![ReasonCode::TrendMatured],
                    })
                } else {
                    stabilizing_entry(signals)
                }
            }
            State::DowntrendLate => stabilizing_entry(signals),
            State::Stabilizing => signals.has(SignalKey::StabilizationConfirmed).then(|| Proposal {
                next_state: State::Stabilizing,
                reasons: vec![ReasonCode::StabilizationConfirmed],
            }),
            State::EntryWindow => {
                if signals.has(SignalKey::EntrySetupValid) {
                    Some(Proposal {
                        next_state: State::EntryWindow,
                        reasons: vec![ReasonCode::EntryConditionsMet],
                    })
                } else {
                    Some(Proposal {
                        next_state: State::Pass,
                        reasons: vec![ReasonCode::EntryWindowCompleted],
                    })
                }
            }
            State::Pass => Some(Proposal {
                next_state: State::NoTrade,
                reasons: vec![ReasonCode::PassCompleted],
            }),
        }
    }

    /// Realized state changes inside the churn window, counting the step from
    /// the oldest returned day up to the previous state.
    fn churn_transitions(&self, prev_state: State, ticker: &str, as_of: NaiveDate) -> usize {
        let days = self.recent_days(ticker, as_of, CHURN_GUARD_WINDOW_DAYS);
        if days.is_empty() {
            return 0;
        }
        let mut transitions = 0;
        // days is newest-first; the newest row is yesterday's prev_state.
        let mut later = prev_state;
        for day in &days {
            if day.state != later {
                transitions += 1;
            }
            later = day.state;
        }
        transitions
    }
}

impl Default for PolicyV1<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl TransitionPolicy for PolicyV1<'_> {
    fn decide(
        &self,
        prev_state: State,
        prev_attrs: &StateAttrs,
        signals: &SignalSet,
        ticker: &str,
        as_of: NaiveDate,
    ) -> Decision {
        let proposal = if let Some(hard) = Self::hard_exclusion(signals) {
            hard
        } else if let Some(edge) = self.edge_gone(prev_state, prev_attrs, ticker, as_of) {
            edge
        } else {
            let candidate = self
                .entry_conditions_met(prev_state, signals, ticker, as_of)
                .or_else(|| self.reset_to_neutral(prev_state, prev_attrs, signals))
                .or_else(|| Self::per_state_rule(prev_state, signals))
                .unwrap_or(Proposal {
                    next_state: prev_state,
                    reasons: vec![ReasonCode::NoSignal],
                });

            // Churn guard: veto a freshly proposed change when the ticker has
            // been flip-flopping inside the window.
            if candidate.next_state != prev_state
                && self.churn_transitions(prev_state, ticker, as_of) >= CHURN_GUARD_THRESHOLD
            {
                Proposal {
                    next_state: prev_state,
                    reasons: vec![ReasonCode::ChurnGuard],
                }
            } else {
                candidate
            }
        };

        if proposal.next_state != prev_state {
            Decision::change(proposal.next_state, proposal.reasons)
        } else {
            let reasons = if proposal.reasons.is_empty() {
                vec![ReasonCode::NoSignal]
            } else {
                proposal.reasons
            };
            Decision::stay(prev_state, prev_attrs, reasons)
        }
    }

    fn policy_version(&self) -> &'static str {
        "v1"
    }
}
