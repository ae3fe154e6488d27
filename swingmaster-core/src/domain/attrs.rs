//! State-attrs metadata: the closed status key set and its merge rules.
//!
//! `StatusAttrs` is the per-(ticker, date) classification mapping. Keys with
//! absent values are omitted from the serialized form; an empty mapping
//! serializes to no attrs at all (NULL column). Field order is lexicographic
//! so persisted rows are byte-stable across runs.

use serde::{Deserialize, Serialize};

/// How the downtrend was first entered from NO_TRADE.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DowntrendOrigin {
    #[serde(rename = "TREND")]
    Trend,
    #[serde(rename = "SLOW")]
    Slow,
}

/// One-time classification of the first NO_TRADE → DOWNTREND_EARLY entry.
/// Never overwritten once set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DowntrendEntryType {
    SlowStructural,
    SlowSoft,
    TrendStructural,
    TrendSoft,
    Unknown,
}

/// Shape of the decline. Monotone within a downtrend phase: a specific value
/// never downgrades; UNKNOWN may upgrade to a specific value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeclineProfile {
    SlowDrift,
    SharpSellOff,
    StructuralDowntrend,
    Unknown,
}

impl DeclineProfile {
    pub fn is_specific(self) -> bool {
        !matches!(self, DeclineProfile::Unknown)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StabilizationPhase {
    EarlyStabilization,
    BaseBuilding,
    EarlyReversal,
}

/// Which gate admitted the ticker into ENTRY_WINDOW.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryGate {
    #[serde(rename = "EARLY_STAB_MA20_HL")]
    EarlyStabMa20Hl,
    #[serde(rename = "EARLY_STAB_MA20")]
    EarlyStabMa20,
    #[serde(rename = "LEGACY_ENTRY_SETUP_VALID")]
    LegacyEntrySetupValid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryQuality {
    #[serde(rename = "A")]
    A,
    #[serde(rename = "B")]
    B,
    #[serde(rename = "LEGACY")]
    Legacy,
}

/// Closed status key set. Fields stay in lexicographic order; serde emits
/// struct fields in declaration order, which keeps serialized keys sorted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusAttrs {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decline_profile: Option<DeclineProfile>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub downtrend_entry_type: Option<DowntrendEntryType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub downtrend_origin: Option<DowntrendOrigin>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entry_continuation_confirmed: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entry_gate: Option<EntryGate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entry_quality: Option<EntryQuality>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stabilization_phase: Option<StabilizationPhase>,
}

impl StatusAttrs {
    pub fn is_empty(&self) -> bool {
        self.decline_profile.is_none()
            && self.downtrend_entry_type.is_none()
            && self.downtrend_origin.is_none()
            && self.entry_continuation_confirmed.is_none()
            && self.entry_gate.is_none()
            && self.entry_quality.is_none()
            && self.stabilization_phase.is_none()
    }
}

/// Attributes carried alongside the state for a (ticker, date) row.
///
/// `age` counts days in the current state: 1 on the day of a state change,
/// previous age + 1 on a stay. Never below 1 in a persisted row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StateAttrs {
    pub confidence: Option<i64>,
    pub age: i64,
    pub status: StatusAttrs,
}

impl StateAttrs {
    pub fn fresh(age: i64) -> Self {
        StateAttrs {
            confidence: None,
            age,
            status: StatusAttrs::default(),
        }
    }

    /// Serialized `state_attrs_json` column value. Empty status → `None`
    /// (stored as NULL) so re-runs stay byte-identical.
    pub fn attrs_json(&self) -> Option<String> {
        if self.status.is_empty() {
            return None;
        }
        let wrapper = serde_json::json!({ "status": self.status });
        Some(wrapper.to_string())
    }

    /// Reverse of [`attrs_json`]; tolerant of NULL and malformed payloads.
    pub fn status_from_json(raw: Option<&str>) -> StatusAttrs {
        let Some(raw) = raw else {
            return StatusAttrs::default();
        };
        serde_json::from_str::<serde_json::Value>(raw)
            .ok()
            .and_then(|v| v.get("status").cloned())
            .and_then(|s| serde_json::from_value(s).ok())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_status_serializes_to_null_attrs() {
        let attrs = StateAttrs::fresh(1);
        assert!(attrs.status.is_empty());
        assert_eq!(attrs.attrs_json(), None);
    }

    #[test]
    fn status_keys_are_sorted_and_sparse() {
        let mut attrs = StateAttrs::fresh(3);
        attrs.status.stabilization_phase = Some(StabilizationPhase::BaseBuilding);
        attrs.status.downtrend_origin = Some(DowntrendOrigin::Trend);
        let json = attrs.attrs_json().unwrap();
        assert_eq!(
            json,
            r#"{"status":{"downtrend_origin":"TREND","stabilization_phase":"BASE_BUILDING"}}"#
        );
    }

    #[test]
    fn status_round_trips_through_json() {
        let mut attrs = StateAttrs::fresh(2);
        attrs.status.entry_gate = Some(EntryGate::EarlyStabMa20Hl);
        attrs.status.entry_quality = Some(EntryQuality::A);
        attrs.status.entry_continuation_confirmed = Some(true);
        let json = attrs.attrs_json().unwrap();
        let parsed = StateAttrs::status_from_json(Some(&json));
        assert_eq!(parsed, attrs.status);
    }

    #[test]
    fn malformed_attrs_json_degrades_to_empty() {
        assert!(StateAttrs::status_from_json(Some("not json")).is_empty());
        assert!(StateAttrs::status_from_json(Some("{}")).is_empty());
        assert!(StateAttrs::status_from_json(None).is_empty());
    }
}
