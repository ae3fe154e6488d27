//! Structural guardrails applied to every proposed transition.
//!
//! Deterministic and independent of OHLC: only the transition graph and the
//! minimum-age table speak here.

use crate::domain::{ReasonCode, State, StateAttrs};

use super::graph;

/// Minimum days a state must be held before it may be left.
pub fn min_state_age(state: State) -> i64 {
    match state {
        State::NoTrade => 0,
        State::DowntrendEarly => 2,
        State::DowntrendLate => 3,
        State::Stabilizing => 2,
        State::EntryWindow => 1,
        State::Pass => 1,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GuardrailResult {
    pub allowed: bool,
    pub final_state: State,
    pub reasons: Vec<ReasonCode>,
}

/// Check a proposed transition. Stays always pass; changes must be graph
/// edges and the current state must have met its minimum age.
pub fn apply_guardrails(
    prev_state: State,
    prev_attrs: &StateAttrs,
    proposed: State,
) -> GuardrailResult {
    if proposed == prev_state {
        return GuardrailResult {
            allowed: true,
            final_state: prev_state,
            reasons: Vec::new(),
        };
    }

    if !graph::is_allowed(prev_state, proposed) {
        return GuardrailResult {
            allowed: false,
            final_state: prev_state,
            reasons: vec![ReasonCode::DisallowedTransition],
        };
    }

    if prev_attrs.age < min_state_age(prev_state) {
        return GuardrailResult {
            allowed: false,
            final_state: prev_state,
            reasons: vec![ReasonCode::MinStateAgeLock],
        };
    }

    GuardrailResult {
        allowed: true,
        final_state: proposed,
        reasons: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stay_is_always_allowed() {
        let attrs = StateAttrs::fresh(0);
        let result = apply_guardrails(State::Stabilizing, &attrs, State::Stabilizing);
        assert!(result.allowed);
        assert!(result.reasons.is_empty());
    }

    #[test]
    fn graph_violation_blocks_with_disallowed_transition() {
        let attrs = StateAttrs::fresh(10);
        let result = apply_guardrails(State::NoTrade, &attrs, State::EntryWindow);
        assert!(!result.allowed);
        assert_eq!(result.final_state, State::NoTrade);
        assert_eq!(result.reasons, vec![ReasonCode::DisallowedTransition]);
    }

    #[test]
    fn young_state_blocks_with_min_age_lock() {
        let attrs = StateAttrs::fresh(1);
        let result = apply_guardrails(State::DowntrendEarly, &attrs, State::Stabilizing);
        assert!(!result.allowed);
        assert_eq!(result.reasons, vec![ReasonCode::MinStateAgeLock]);
    }

    #[test]
    fn aged_state_passes() {
        let attrs = StateAttrs::fresh(2);
        let result = apply_guardrails(State::DowntrendEarly, &attrs, State::Stabilizing);
        assert!(result.allowed);
        assert_eq!(result.final_state, State::Stabilizing);
    }

    #[test]
    fn no_trade_has_no_age_lock() {
        let attrs = StateAttrs::fresh(0);
        let result = apply_guardrails(State::NoTrade, &attrs, State::DowntrendEarly);
        assert!(result.allowed);
    }
}
