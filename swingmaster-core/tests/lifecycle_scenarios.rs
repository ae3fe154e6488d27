//! End-to-end lifecycle scenarios: OHLC → signals → policy → decision.
//!
//! Each scenario drives the real provider and the v3 policy stack through
//! `evaluate_step`, the same path the range runner takes per ticker/day.

use chrono::NaiveDate;
use swingmaster_core::config::ProviderConfig;
use swingmaster_core::data::OhlcBar;
use swingmaster_core::domain::{
    DowntrendEntryType, DowntrendOrigin, EntryGate, EntryQuality, ReasonCode,
    StabilizationPhase, State, StateAttrs,
};
use swingmaster_core::engine::evaluate_step;
use swingmaster_core::policy::{PolicyV3, TransitionPolicy};
use swingmaster_core::signals::{SignalKey, SignalProvider, SignalSet};

fn bars_from_chronological(closes: &[f64]) -> Vec<OhlcBar> {
    let start = NaiveDate::from_ymd_opt(2025, 1, 6).unwrap();
    closes
        .iter()
        .enumerate()
        .map(|(i, &c)| {
            OhlcBar::new(start + chrono::Duration::days(i as i64), c, c + 1.0, c - 1.0, c)
        })
        .collect()
}

fn keys(keys: &[SignalKey]) -> SignalSet {
    SignalSet::from_keys(keys.iter().copied())
}

#[test]
fn trend_start_enters_downtrend_with_metadata() {
    // A 55-day up-regime that breaks hard on the final day: regime ratio and
    // SMA slope hold, the close crosses under SMA20 and the prior 10-day
    // close low. One earlier session carries a deep intraday wick so the
    // breakdown day's low is not itself a fresh 10-day low (that would be an
    // invalidation, which outranks the trend start).
    let mut chronological: Vec<f64> = (0..55).map(|i| 90.0 + i as f64 * 0.5).collect();
    chronological.push(100.0);
    let mut bars = bars_from_chronological(&chronological);
    bars[50].low = bars[50].close - 20.0;

    let provider = SignalProvider::new(ProviderConfig::default());
    let as_of = bars.last().unwrap().date;
    let signals = provider.signals("AAPL", as_of, &bars);
    assert!(signals.has(SignalKey::TrendStarted));

    let policy = PolicyV3::new();
    let result = evaluate_step(
        State::NoTrade,
        &StateAttrs::fresh(5),
        &signals,
        &policy,
        "AAPL",
        as_of,
    )
    .unwrap();

    assert_eq!(result.final_state, State::DowntrendEarly);
    assert!(result.reasons.contains(&ReasonCode::TrendStarted));
    assert_eq!(
        result.final_attrs.status.downtrend_origin,
        Some(DowntrendOrigin::Trend)
    );
    assert!(matches!(
        result.final_attrs.status.downtrend_entry_type,
        Some(DowntrendEntryType::TrendStructural) | Some(DowntrendEntryType::TrendSoft)
    ));
    assert_eq!(result.final_attrs.age, 1);
    assert!(result.transition.is_some());
}

#[test]
fn young_downtrend_cannot_stabilize_yet() {
    let policy = PolicyV3::new();
    let result = evaluate_step(
        State::DowntrendEarly,
        &StateAttrs::fresh(1),
        &keys(&[SignalKey::StabilizationConfirmed]),
        &policy,
        "AAPL",
        NaiveDate::from_ymd_opt(2025, 6, 2).unwrap(),
    )
    .unwrap();

    assert_eq!(result.final_state, State::DowntrendEarly);
    assert!(result.guardrails_blocked);
    assert!(result.reasons.contains(&ReasonCode::MinStateAgeLock));
    assert_eq!(result.final_attrs.age, 2);
}

#[test]
fn dow_lower_low_invalidates_stabilization() {
    // The provider-level suppression has already removed the constructive
    // signals; here v2 injects INVALIDATED from the Dow lower low while the
    // setup signal is still present, and the phase is pinned accordingly.
    let policy = PolicyV3::new();
    let mut prev_attrs = StateAttrs::fresh(4);
    prev_attrs.status.stabilization_phase = Some(StabilizationPhase::EarlyReversal);
    let result = evaluate_step(
        State::Stabilizing,
        &prev_attrs,
        &keys(&[SignalKey::EntrySetupValid, SignalKey::DowNewLl]),
        &policy,
        "AAPL",
        NaiveDate::from_ymd_opt(2025, 6, 2).unwrap(),
    )
    .unwrap();

    assert_eq!(result.final_state, State::NoTrade);
    assert!(result.reasons.contains(&ReasonCode::Invalidated));
    assert_eq!(
        result.final_attrs.status.stabilization_phase,
        Some(StabilizationPhase::EarlyStabilization)
    );
}

#[test]
fn gate_a_overrides_stabilizing_stay() {
    let policy = PolicyV3::new();
    let result = evaluate_step(
        State::Stabilizing,
        &StateAttrs::fresh(3),
        &keys(&[SignalKey::Ma20Reclaimed, SignalKey::HigherLowConfirmed]),
        &policy,
        "AAPL",
        NaiveDate::from_ymd_opt(2025, 6, 2).unwrap(),
    )
    .unwrap();

    assert_eq!(result.final_state, State::EntryWindow);
    assert_eq!(
        result.final_attrs.status.entry_gate,
        Some(EntryGate::EarlyStabMa20Hl)
    );
    assert_eq!(result.final_attrs.status.entry_quality, Some(EntryQuality::A));
    // The gate adds no reason codes of its own.
    assert!(!result.reasons.contains(&ReasonCode::EntryConditionsMet));
}

#[test]
fn stale_entry_window_is_forced_to_pass() {
    let policy = PolicyV3::new();
    let result = evaluate_step(
        State::EntryWindow,
        &StateAttrs::fresh(9),
        &keys(&[SignalKey::EntrySetupValid]),
        &policy,
        "AAPL",
        NaiveDate::from_ymd_opt(2025, 6, 2).unwrap(),
    )
    .unwrap();

    assert_eq!(result.final_state, State::Pass);
    assert_eq!(result.reasons, vec![ReasonCode::EdgeGone]);
}

#[test]
fn full_lifecycle_walk_respects_age_and_graph() {
    // Drive a scripted signal tape through the whole lifecycle and check the
    // bookkeeping at every step.
    let policy = PolicyV3::new();
    let tape: Vec<(Vec<SignalKey>, State)> = vec![
        (vec![SignalKey::NoSignal], State::NoTrade),
        (vec![SignalKey::TrendStarted], State::DowntrendEarly),
        (vec![SignalKey::NoSignal], State::DowntrendEarly),
        (vec![SignalKey::TrendMatured], State::DowntrendLate),
        (vec![SignalKey::NoSignal], State::DowntrendLate),
        (vec![SignalKey::NoSignal], State::DowntrendLate),
        (vec![SignalKey::StabilizationConfirmed], State::Stabilizing),
        (vec![SignalKey::StabilizationConfirmed], State::Stabilizing),
        (
            vec![SignalKey::EntrySetupValid, SignalKey::StabilizationConfirmed],
            State::EntryWindow,
        ),
        (vec![SignalKey::EntrySetupValid], State::EntryWindow),
        (vec![SignalKey::NoSignal], State::Pass),
        (vec![SignalKey::NoSignal], State::NoTrade),
    ];

    let mut state = State::NoTrade;
    let mut attrs = StateAttrs::fresh(1);
    let mut date = NaiveDate::from_ymd_opt(2025, 6, 2).unwrap();

    for (day, (signal_keys, expected)) in tape.into_iter().enumerate() {
        let result = evaluate_step(state, &attrs, &keys(&signal_keys), &policy, "AAPL", date)
            .unwrap_or_else(|e| panic!("day {day}: {e}"));

        assert_eq!(result.final_state, expected, "day {day}");
        assert!(!result.reasons.is_empty(), "day {day}");
        assert!(result.final_attrs.age >= 1, "day {day}");
        if result.final_state == state {
            assert_eq!(result.final_attrs.age, attrs.age + 1, "day {day}");
            assert!(result.transition.is_none(), "day {day}");
        } else {
            assert_eq!(result.final_attrs.age, 1, "day {day}");
            assert!(result.transition.is_some(), "day {day}");
        }

        state = result.final_state;
        attrs = result.final_attrs;
        date += chrono::Duration::days(1);
    }
}

#[test]
fn insufficient_data_is_in_band_for_every_policy_version() {
    use swingmaster_core::policy::{PolicyV1, PolicyV2};

    let date = NaiveDate::from_ymd_opt(2025, 6, 2).unwrap();
    let signals = SignalSet::insufficient();
    let v1 = PolicyV1::new();
    let v2 = PolicyV2::new();
    let v3 = PolicyV3::new();
    let policies: [&dyn TransitionPolicy; 3] = [&v1, &v2, &v3];
    for policy in policies {
        let result = evaluate_step(
            State::DowntrendLate,
            &StateAttrs::fresh(5),
            &signals,
            policy,
            "AAPL",
            date,
        )
        .unwrap();
        assert_eq!(result.final_state, State::NoTrade, "{}", policy.policy_version());
        assert_eq!(result.reasons, vec![ReasonCode::DataInsufficient]);
    }
}
