//! Rule policy v2: v1 plus Dow-structure awareness.
//!
//! Three additions on top of v1:
//! - inject INVALIDATED when a stabilizing/entry ticker prints a fresh Dow
//!   lower low;
//! - admit a slow decline into DOWNTREND_EARLY when v1 saw nothing and the
//!   Dow trend is not up;
//! - keep the TREND_STARTED reason visible on a stabilizing stay instead of
//!   reporting a quiet day.

use chrono::NaiveDate;

use crate::domain::{Decision, ReasonCode, State, StateAttrs};
use crate::signals::{SignalKey, SignalSet};

use super::history::StateHistory;
use super::v1::PolicyV1;
use super::TransitionPolicy;

pub struct PolicyV2<'a> {
    v1: PolicyV1<'a>,
}

impl<'a> PolicyV2<'a> {
    pub fn new() -> Self {
        Self { v1: PolicyV1::new() }
    }

    pub fn with_history(history: &'a dyn StateHistory) -> Self {
        Self {
            v1: PolicyV1::with_history(history),
        }
    }

    /// Enrich the signal set with a Dow-derived invalidation. Only applies
    /// while the lifecycle has something to lose (stabilizing or entry), and
    /// never on top of an existing exclusion.
    pub fn enrich_signals(prev_state: State, signals: &SignalSet) -> SignalSet {
        if signals.has(SignalKey::DataInsufficient) || signals.has(SignalKey::Invalidated) {
            return signals.clone();
        }
        if !matches!(prev_state, State::Stabilizing | State::EntryWindow) {
            return signals.clone();
        }
        if !signals.has(SignalKey::DowNewLl) {
            return signals.clone();
        }
        let mut enriched = signals.clone();
        enriched.insert(SignalKey::Invalidated);
        enriched
    }

    /// Decide and also hand back the enriched signal set, so the metadata
    /// layer sees exactly what the rules saw.
    pub fn decide_with_signals(
        &self,
        prev_state: State,
        prev_attrs: &StateAttrs,
        signals: &SignalSet,
        ticker: &str,
        as_of: NaiveDate,
    ) -> (Decision, SignalSet) {
        let enriched = Self::enrich_signals(prev_state, signals);
        let mut decision = self
            .v1
            .decide(prev_state, prev_attrs, &enriched, ticker, as_of);

        // Slow-decline admission: only out of a quiet NO_TRADE day, and not
        // against an up-structure.
        if prev_state == State::NoTrade
            && decision.next_state == State::NoTrade
            && decision.reasons == [ReasonCode::NoSignal]
            && enriched.has(SignalKey::SlowDeclineStarted)
            && !enriched.has(SignalKey::DowTrendUp)
        {
            decision = Decision::change(
                State::DowntrendEarly,
                vec![ReasonCode::SlowDeclineStarted],
            );
        }

        // A trend-start observation during stabilization is worth keeping in
        // the audit trail even though it moves nothing.
        if prev_state == State::Stabilizing
            && decision.next_state == State::Stabilizing
            && decision.reasons == [ReasonCode::NoSignal]
            && enriched.has(SignalKey::TrendStarted)
        {
            decision.reasons = vec![ReasonCode::TrendStarted];
        }

        (decision, enriched)
    }
}

impl Default for PolicyV2<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl TransitionPolicy for PolicyV2<'_> {
    fn decide(
        &self,
        prev_state: State,
        prev_attrs: &StateAttrs,
        signals: &SignalSet,
        ticker: &str,
        as_of: NaiveDate,
    ) -> Decision {
        self.decide_with_signals(prev_state, prev_attrs, signals, ticker, as_of)
            .0
    }

    fn policy_version(&self) -> &'static str {
        "v2"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn as_of() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 30).unwrap()
    }

    fn signals(keys: &[SignalKey]) -> SignalSet {
        SignalSet::from_keys(keys.iter().copied())
    }

    fn decide(prev: State, age: i64, keys: &[SignalKey]) -> Decision {
        PolicyV2::new().decide(prev, &StateAttrs::fresh(age), &signals(keys), "AAPL", as_of())
    }

    #[test]
    fn dow_new_ll_invalidates_stabilizing() {
        let d = decide(State::Stabilizing, 4, &[SignalKey::DowNewLl, SignalKey::DowTrendDown]);
        assert_eq!(d.next_state, State::NoTrade);
        assert_eq!(d.reasons, vec![ReasonCode::Invalidated]);
    }

    #[test]
    fn dow_new_ll_invalidates_entry_window() {
        let d = decide(State::EntryWindow, 2, &[SignalKey::DowNewLl, SignalKey::EntrySetupValid]);
        assert_eq!(d.next_state, State::NoTrade);
        assert_eq!(d.reasons, vec![ReasonCode::Invalidated]);
    }

    #[test]
    fn dow_new_ll_is_inert_in_downtrend_states() {
        let d = decide(State::DowntrendLate, 5, &[SignalKey::DowNewLl]);
        assert_eq!(d.next_state, State::DowntrendLate);
        assert_eq!(d.reasons, vec![ReasonCode::NoSignal]);
    }

    #[test]
    fn enrichment_does_not_stack_on_existing_invalidation() {
        let enriched = PolicyV2::enrich_signals(
            State::Stabilizing,
            &signals(&[SignalKey::Invalidated, SignalKey::DowNewLl]),
        );
        assert_eq!(
            enriched,
            signals(&[SignalKey::Invalidated, SignalKey::DowNewLl])
        );
    }

    #[test]
    fn slow_decline_enters_downtrend_on_quiet_day() {
        let d = decide(
            State::NoTrade,
            3,
            &[SignalKey::SlowDeclineStarted, SignalKey::SlowDriftDetected],
        );
        assert_eq!(d.next_state, State::DowntrendEarly);
        assert_eq!(d.reasons, vec![ReasonCode::SlowDeclineStarted]);
        assert_eq!(d.attrs.age, 1);
    }

    #[test]
    fn dow_up_blocks_slow_decline_admission() {
        let d = decide(
            State::NoTrade,
            3,
            &[SignalKey::SlowDeclineStarted, SignalKey::DowTrendUp],
        );
        assert_eq!(d.next_state, State::NoTrade);
    }

    #[test]
    fn trend_started_is_retained_on_stabilizing_stay() {
        let d = decide(State::Stabilizing, 4, &[SignalKey::TrendStarted]);
        assert_eq!(d.next_state, State::Stabilizing);
        assert_eq!(d.reasons, vec![ReasonCode::TrendStarted]);
        assert_eq!(d.attrs.age, 5);
    }

    #[test]
    fn plain_v1_behavior_passes_through() {
        let d = decide(State::NoTrade, 0, &[SignalKey::TrendStarted]);
        assert_eq!(d.next_state, State::DowntrendEarly);
        assert_eq!(d.reasons, vec![ReasonCode::TrendStarted]);
    }
}
