//! Locked EW model constants, keyed by rule id.
//!
//! Rule ids are immutable: changing any coefficient or threshold requires a
//! new rule id (bump the version segment). Never edit a row in place.

use swingmaster_core::domain::{DeclineProfile, EntryQuality};

use crate::error::StoreError;

/// Rolling mode: `score = sigmoid(beta0 + beta1 * r_prefix_pct)`.
#[derive(Debug, Clone, Copy)]
pub struct RollingModel {
    pub rule_id: &'static str,
    pub beta0: f64,
    pub beta1: f64,
    pub threshold: f64,
}

pub const ROLLING_MODELS: &[RollingModel] = &[
    RollingModel {
        rule_id: "EW_SCORE_ROLLING_V2_FIN",
        beta0: -0.4682,
        beta1: 0.2875,
        threshold: 0.45,
    },
    RollingModel {
        rule_id: "EW_SCORE_ROLLING_V2_SE",
        beta0: -0.3917,
        beta1: 0.2604,
        threshold: 0.47,
    },
];

/// Fastpass mode: entry-day logistic over the stabilization-to-entry return
/// plus categorical adjustments for entry quality and decline profile.
#[derive(Debug, Clone, Copy)]
pub struct FastpassModel {
    pub rule_id: &'static str,
    pub beta0: f64,
    pub beta_r_stab_to_entry: f64,
    pub quality_a: f64,
    pub quality_b: f64,
    pub quality_legacy: f64,
    pub profile_slow_drift: f64,
    pub profile_sharp_sell_off: f64,
    pub profile_structural: f64,
    pub threshold: f64,
}

impl FastpassModel {
    pub fn quality_coef(&self, quality: Option<EntryQuality>) -> f64 {
        match quality {
            Some(EntryQuality::A) => self.quality_a,
            Some(EntryQuality::B) => self.quality_b,
            Some(EntryQuality::Legacy) | None => self.quality_legacy,
        }
    }

    pub fn profile_coef(&self, profile: Option<DeclineProfile>) -> f64 {
        match profile {
            Some(DeclineProfile::SlowDrift) => self.profile_slow_drift,
            Some(DeclineProfile::SharpSellOff) => self.profile_sharp_sell_off,
            Some(DeclineProfile::StructuralDowntrend) => self.profile_structural,
            Some(DeclineProfile::Unknown) | None => 0.0,
        }
    }
}

pub const FASTPASS_MODELS: &[FastpassModel] = &[
    FastpassModel {
        rule_id: "EW_SCORE_FASTPASS_V1_FIN",
        beta0: -0.2113,
        beta_r_stab_to_entry: 0.1582,
        quality_a: 0.5274,
        quality_b: 0.2391,
        quality_legacy: 0.0,
        profile_slow_drift: 0.1106,
        profile_sharp_sell_off: -0.1873,
        profile_structural: 0.0349,
        threshold: 0.60,
    },
    FastpassModel {
        rule_id: "EW_SCORE_FASTPASS_V1_SE",
        beta0: -0.1798,
        beta_r_stab_to_entry: 0.1411,
        quality_a: 0.4906,
        quality_b: 0.2127,
        quality_legacy: 0.0,
        profile_slow_drift: 0.0981,
        profile_sharp_sell_off: -0.2034,
        profile_structural: 0.0512,
        threshold: 0.65,
    },
    FastpassModel {
        rule_id: "EW_SCORE_FASTPASS_V1_USA_SMALL",
        beta0: -0.2645,
        beta_r_stab_to_entry: 0.1739,
        quality_a: 0.5612,
        quality_b: 0.2483,
        quality_legacy: 0.0,
        profile_slow_drift: 0.1248,
        profile_sharp_sell_off: -0.1562,
        profile_structural: 0.0278,
        threshold: 0.60,
    },
];

pub fn rolling_model(rule_id: &str) -> Result<&'static RollingModel, StoreError> {
    ROLLING_MODELS
        .iter()
        .find(|m| m.rule_id == rule_id)
        .ok_or_else(|| StoreError::UnknownRule(rule_id.to_string()))
}

pub fn fastpass_model(rule_id: &str) -> Result<&'static FastpassModel, StoreError> {
    FASTPASS_MODELS
        .iter()
        .find(|m| m.rule_id == rule_id)
        .ok_or_else(|| StoreError::UnknownRule(rule_id.to_string()))
}

pub fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}
