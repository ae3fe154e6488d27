//! Decision and transition carriers produced by the policy layer.
//!
//! Deterministic data containers with no behavior; persisted and audited by
//! the storage layer.

use super::attrs::StateAttrs;
use super::state::{ReasonCode, State};

/// Policy output for one evaluation: proposed next state, audit reasons, and
/// the state-attrs the next row should carry.
#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    pub next_state: State,
    pub reasons: Vec<ReasonCode>,
    pub attrs: StateAttrs,
}

impl Decision {
    /// A stay in `state` with the previous attrs aged by one day.
    pub fn stay(state: State, prev_attrs: &StateAttrs, reasons: Vec<ReasonCode>) -> Self {
        let mut attrs = prev_attrs.clone();
        attrs.age = prev_attrs.age + 1;
        Decision {
            next_state: state,
            reasons,
            attrs,
        }
    }

    /// A change into `state`: age restarts at 1 and status is rebuilt by the
    /// metadata layer.
    pub fn change(state: State, reasons: Vec<ReasonCode>) -> Self {
        Decision {
            next_state: state,
            reasons,
            attrs: StateAttrs::fresh(1),
        }
    }
}

/// Recorded only when the state actually changed; stays appear only in the
/// per-day state rows.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub from_state: State,
    pub to_state: State,
    pub reasons: Vec<ReasonCode>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stay_increments_age_and_keeps_status() {
        let mut prev = StateAttrs::fresh(4);
        prev.status.downtrend_origin = Some(crate::domain::DowntrendOrigin::Slow);
        let d = Decision::stay(State::DowntrendEarly, &prev, vec![ReasonCode::NoSignal]);
        assert_eq!(d.attrs.age, 5);
        assert_eq!(d.attrs.status, prev.status);
    }

    #[test]
    fn change_resets_age_to_one() {
        let d = Decision::change(State::Stabilizing, vec![ReasonCode::StabilizationConfirmed]);
        assert_eq!(d.attrs.age, 1);
        assert!(d.attrs.status.is_empty());
    }
}
