//! Rule policy v3: v2 state decisions plus entry-gate overrides and
//! state-attrs metadata.
//!
//! v3 never invents reason codes; it may only promote a stabilizing decision
//! into ENTRY_WINDOW through the MA20 gates, and it maintains the closed
//! status key set (origin, entry type, decline profile, stabilization phase,
//! entry gate/quality).

use chrono::NaiveDate;

use crate::domain::{
    Decision, DeclineProfile, DowntrendEntryType, DowntrendOrigin, EntryGate, EntryQuality,
    ReasonCode, StabilizationPhase, State, StateAttrs, StatusAttrs,
};
use crate::signals::{SignalKey, SignalSet};

use super::history::StateHistory;
use super::v2::PolicyV2;
use super::TransitionPolicy;

pub struct PolicyV3<'a> {
    v2: PolicyV2<'a>,
}

impl<'a> PolicyV3<'a> {
    pub fn new() -> Self {
        Self { v2: PolicyV2::new() }
    }

    pub fn with_history(history: &'a dyn StateHistory) -> Self {
        Self {
            v2: PolicyV2::with_history(history),
        }
    }
}

impl Default for PolicyV3<'_> {
    fn default() -> Self {
        Self::new()
    }
}

fn classify_decline_profile(signals: &SignalSet) -> DeclineProfile {
    if signals.has(SignalKey::SlowDriftDetected) {
        DeclineProfile::SlowDrift
    } else if signals.has(SignalKey::SharpSellOffDetected) {
        DeclineProfile::SharpSellOff
    } else if signals.has(SignalKey::StructuralDowntrendDetected)
        || signals.has(SignalKey::TrendMatured)
        || signals.has(SignalKey::DowTrendDown)
    {
        DeclineProfile::StructuralDowntrend
    } else {
        DeclineProfile::Unknown
    }
}

fn resolve_downtrend_origin(
    signals: &SignalSet,
    prev: Option<DowntrendOrigin>,
) -> Option<DowntrendOrigin> {
    if signals.has(SignalKey::TrendStarted) {
        Some(DowntrendOrigin::Trend)
    } else if signals.has(SignalKey::SlowDeclineStarted) {
        Some(DowntrendOrigin::Slow)
    } else {
        prev
    }
}

fn classify_downtrend_entry_type(signals: &SignalSet) -> DowntrendEntryType {
    // SLOW takes precedence over TREND for the entry-type origin.
    let origin = if signals.has(SignalKey::SlowDeclineStarted) {
        Some(DowntrendOrigin::Slow)
    } else if signals.has(SignalKey::TrendStarted) {
        Some(DowntrendOrigin::Trend)
    } else {
        None
    };
    let structural = signals.has(SignalKey::StructuralDowntrendDetected)
        || signals.has(SignalKey::DowTrendDown)
        || signals.has(SignalKey::DowNewLl)
        || signals.has(SignalKey::DowBosBreakDown);
    match (origin, structural) {
        (Some(DowntrendOrigin::Slow), true) => DowntrendEntryType::SlowStructural,
        (Some(DowntrendOrigin::Slow), false) => DowntrendEntryType::SlowSoft,
        (Some(DowntrendOrigin::Trend), true) => DowntrendEntryType::TrendStructural,
        (Some(DowntrendOrigin::Trend), false) => DowntrendEntryType::TrendSoft,
        (None, _) => DowntrendEntryType::Unknown,
    }
}

/// Profile transition on entering a downtrend: specific values stick,
/// UNKNOWN may upgrade, and a missing profile starts at the candidate.
fn apply_one_way_profile(
    prev: Option<DeclineProfile>,
    candidate: DeclineProfile,
) -> DeclineProfile {
    match prev {
        Some(p) if p.is_specific() => p,
        Some(DeclineProfile::Unknown) | None => {
            if candidate.is_specific() {
                candidate
            } else {
                DeclineProfile::Unknown
            }
        }
        Some(p) => p,
    }
}

/// Profile transition while a downtrend is in progress: only the
/// UNKNOWN → specific upgrade is permitted.
fn upgrade_unknown_profile(
    prev: Option<DeclineProfile>,
    candidate: DeclineProfile,
) -> Option<DeclineProfile> {
    match prev {
        Some(p) if p.is_specific() => Some(p),
        Some(DeclineProfile::Unknown) if candidate.is_specific() => Some(candidate),
        other => other,
    }
}

fn resolve_stabilization_phase(
    to_state: State,
    signals: &SignalSet,
    prev: Option<StabilizationPhase>,
) -> Option<StabilizationPhase> {
    match to_state {
        State::Stabilizing => {
            if signals.has(SignalKey::EntrySetupValid) && !signals.has(SignalKey::Invalidated) {
                Some(StabilizationPhase::EarlyReversal)
            } else if signals.has(SignalKey::StabilizationConfirmed)
                && signals.has(SignalKey::VolatilityCompressionDetected)
                && !signals.has(SignalKey::Invalidated)
            {
                Some(StabilizationPhase::BaseBuilding)
            } else {
                Some(StabilizationPhase::EarlyStabilization)
            }
        }
        State::EntryWindow => Some(StabilizationPhase::EarlyReversal),
        _ => prev,
    }
}

impl TransitionPolicy for PolicyV3<'_> {
    fn decide(
        &self,
        prev_state: State,
        prev_attrs: &StateAttrs,
        signals: &SignalSet,
        ticker: &str,
        as_of: NaiveDate,
    ) -> Decision {
        let (decision, enriched) =
            self.v2
                .decide_with_signals(prev_state, prev_attrs, signals, ticker, as_of);
        let prev_status = &prev_attrs.status;

        let mut next_origin = prev_status.downtrend_origin;
        let mut next_entry_type = prev_status.downtrend_entry_type;
        let mut next_profile = prev_status.decline_profile;

        // Gate override: an MA20 reclaim during stabilization opens the
        // entry window early; a confirmed higher low upgrades the quality.
        let mut final_state = decision.next_state;
        let mut gate_a = false;
        let mut gate_b = false;
        if decision.next_state == State::Stabilizing
            && enriched.has(SignalKey::Ma20Reclaimed)
            && !enriched.has(SignalKey::Invalidated)
        {
            final_state = State::EntryWindow;
            if enriched.has(SignalKey::HigherLowConfirmed) {
                gate_a = true;
            } else {
                gate_b = true;
            }
        }

        let mut next_phase =
            resolve_stabilization_phase(final_state, &enriched, prev_status.stabilization_phase);

        let mut next_gate = prev_status.entry_gate;
        let mut next_quality = prev_status.entry_quality;
        if gate_a {
            next_gate = Some(EntryGate::EarlyStabMa20Hl);
            next_quality = Some(EntryQuality::A);
        } else if gate_b {
            next_gate = Some(EntryGate::EarlyStabMa20);
            next_quality = Some(EntryQuality::B);
        } else if final_state == State::EntryWindow
            && next_gate.is_none()
            && next_quality.is_none()
        {
            next_gate = Some(EntryGate::LegacyEntrySetupValid);
            next_quality = Some(EntryQuality::Legacy);
        }

        let candidate_profile = classify_decline_profile(&enriched);

        if prev_state == State::NoTrade && final_state == State::DowntrendEarly {
            next_origin = resolve_downtrend_origin(&enriched, next_origin);
            if next_entry_type.is_none() {
                let mut entry_type = classify_downtrend_entry_type(&enriched);
                if decision.reasons.contains(&ReasonCode::TrendStarted) {
                    entry_type = match entry_type {
                        DowntrendEntryType::SlowStructural => DowntrendEntryType::TrendStructural,
                        DowntrendEntryType::SlowSoft => DowntrendEntryType::TrendSoft,
                        other => other,
                    };
                }
                next_entry_type = Some(entry_type);
            }
            next_profile = Some(apply_one_way_profile(next_profile, candidate_profile));
        } else if matches!(prev_state, State::DowntrendEarly | State::DowntrendLate)
            && matches!(final_state, State::DowntrendEarly | State::DowntrendLate)
        {
            next_profile = upgrade_unknown_profile(next_profile, candidate_profile);
        }

        if final_state == State::NoTrade {
            next_origin = None;
            next_entry_type = None;
            next_profile = None;
            next_gate = None;
            next_quality = None;
            // Invalidated-legacy branch: a stabilization killed on the same
            // day its setup appeared must not read as a reversal.
            next_phase = if prev_state == State::Stabilizing
                && enriched.has(SignalKey::EntrySetupValid)
                && enriched.has(SignalKey::Invalidated)
            {
                Some(StabilizationPhase::EarlyStabilization)
            } else {
                None
            };
        }

        let base_status = if final_state == decision.next_state && final_state == prev_state {
            decision.attrs.status.clone()
        } else {
            StatusAttrs::default()
        };
        let status = StatusAttrs {
            decline_profile: next_profile,
            downtrend_entry_type: next_entry_type,
            downtrend_origin: next_origin,
            entry_continuation_confirmed: base_status.entry_continuation_confirmed,
            entry_gate: next_gate,
            entry_quality: next_quality,
            stabilization_phase: next_phase,
        };

        let age = if final_state == prev_state {
            decision.attrs.age
        } else {
            1
        };

        Decision {
            next_state: final_state,
            reasons: decision.reasons,
            attrs: StateAttrs {
                confidence: decision.attrs.confidence,
                age,
                status,
            },
        }
    }

    fn policy_version(&self) -> &'static str {
        "v3"
    }
}
