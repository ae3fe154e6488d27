//! State machine and reason-code identifiers persisted in RC storage.
//!
//! Enum labels must remain stable: they are the persisted values and the
//! audit vocabulary. Reason codes serialize with a `POLICY:` prefix.

use serde::{Deserialize, Serialize};

/// Lifecycle state of a ticker, evaluated once per trading day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum State {
    NoTrade,
    DowntrendEarly,
    DowntrendLate,
    Stabilizing,
    EntryWindow,
    Pass,
}

impl State {
    pub const ALL: [State; 6] = [
        State::NoTrade,
        State::DowntrendEarly,
        State::DowntrendLate,
        State::Stabilizing,
        State::EntryWindow,
        State::Pass,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            State::NoTrade => "NO_TRADE",
            State::DowntrendEarly => "DOWNTREND_EARLY",
            State::DowntrendLate => "DOWNTREND_LATE",
            State::Stabilizing => "STABILIZING",
            State::EntryWindow => "ENTRY_WINDOW",
            State::Pass => "PASS",
        }
    }

    pub fn parse(label: &str) -> Option<State> {
        Self::ALL.into_iter().find(|s| s.as_str() == label)
    }
}

impl std::fmt::Display for State {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stable identifiers for decision reasoning; the label is the persisted code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReasonCode {
    SlowDeclineStarted,
    TrendStarted,
    TrendMatured,
    SellingPressureEased,
    StabilizationConfirmed,
    EntryConditionsMet,
    EdgeGone,
    Invalidated,
    InvalidationBlockedByLock,
    DisallowedTransition,
    PassCompleted,
    EntryWindowCompleted,
    ResetToNeutral,
    ChurnGuard,
    MinStateAgeLock,
    DataInsufficient,
    NoSignal,
}

const PERSIST_PREFIX: &str = "POLICY:";

impl ReasonCode {
    pub const ALL: [ReasonCode; 17] = [
        ReasonCode::SlowDeclineStarted,
        ReasonCode::TrendStarted,
        ReasonCode::TrendMatured,
        ReasonCode::SellingPressureEased,
        ReasonCode::StabilizationConfirmed,
        ReasonCode::EntryConditionsMet,
        ReasonCode::EdgeGone,
        ReasonCode::Invalidated,
        ReasonCode::InvalidationBlockedByLock,
        ReasonCode::DisallowedTransition,
        ReasonCode::PassCompleted,
        ReasonCode::EntryWindowCompleted,
        ReasonCode::ResetToNeutral,
        ReasonCode::ChurnGuard,
        ReasonCode::MinStateAgeLock,
        ReasonCode::DataInsufficient,
        ReasonCode::NoSignal,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ReasonCode::SlowDeclineStarted => "SLOW_DECLINE_STARTED",
            ReasonCode::TrendStarted => "TREND_STARTED",
            ReasonCode::TrendMatured => "TREND_MATURED",
            ReasonCode::SellingPressureEased => "SELLING_PRESSURE_EASED",
            ReasonCode::StabilizationConfirmed => "STABILIZATION_CONFIRMED",
            ReasonCode::EntryConditionsMet => "ENTRY_CONDITIONS_MET",
            ReasonCode::EdgeGone => "EDGE_GONE",
            ReasonCode::Invalidated => "INVALIDATED",
            ReasonCode::InvalidationBlockedByLock => "INVALIDATION_BLOCKED_BY_LOCK",
            ReasonCode::DisallowedTransition => "DISALLOWED_TRANSITION",
            ReasonCode::PassCompleted => "PASS_COMPLETED",
            ReasonCode::EntryWindowCompleted => "ENTRY_WINDOW_COMPLETED",
            ReasonCode::ResetToNeutral => "RESET_TO_NEUTRAL",
            ReasonCode::ChurnGuard => "CHURN_GUARD",
            ReasonCode::MinStateAgeLock => "MIN_STATE_AGE_LOCK",
            ReasonCode::DataInsufficient => "DATA_INSUFFICIENT",
            ReasonCode::NoSignal => "NO_SIGNAL",
        }
    }

    /// Label as stored in `reasons_json`, e.g. `POLICY:TREND_STARTED`.
    pub fn to_persisted(self) -> String {
        format!("{PERSIST_PREFIX}{}", self.as_str())
    }

    /// Tolerant reverse of [`to_persisted`]: accepts the bare code too,
    /// returns `None` for unknown labels rather than failing the row.
    pub fn from_persisted(label: &str) -> Option<ReasonCode> {
        let bare = label.strip_prefix(PERSIST_PREFIX).unwrap_or(label);
        Self::ALL.into_iter().find(|r| r.as_str() == bare)
    }
}

impl std::fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
