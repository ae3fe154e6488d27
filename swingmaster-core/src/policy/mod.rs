//! Policy layer — maps `(prev_state, signals, history)` to a decision.
//!
//! Layered as a pipeline, not inheritance: v1 decides, v2 post-processes the
//! state and reasons, v3 post-processes metadata and the entry gate. All
//! layers are deterministic and never read OHLC directly.

pub mod graph;
pub mod guardrails;
pub mod history;
pub mod v1;
pub mod v2;
pub mod v3;

use chrono::NaiveDate;

use crate::domain::{Decision, State, StateAttrs};
use crate::signals::SignalSet;

pub use graph::allowed_targets;
pub use guardrails::{apply_guardrails, min_state_age, GuardrailResult};
pub use history::{StateHistory, StateHistoryDay};
pub use v1::PolicyV1;
pub use v2::PolicyV2;
pub use v3::PolicyV3;

/// A transition policy decides the next state for one ticker/day.
pub trait TransitionPolicy {
    fn decide(
        &self,
        prev_state: State,
        prev_attrs: &StateAttrs,
        signals: &SignalSet,
        ticker: &str,
        as_of: NaiveDate,
    ) -> Decision;

    /// Identifier recorded in run metadata.
    fn policy_version(&self) -> &'static str;
}
