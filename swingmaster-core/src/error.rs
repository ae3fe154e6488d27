//! Core error taxonomy.
//!
//! Insufficient data is never an error here — it surfaces in-band as the
//! `DATA_INSUFFICIENT` signal and the policy maps it to a neutral stay.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    /// Range orchestration rejected a mixed signal/policy version pair.
    #[error("Incompatible versions: signal-version and policy-version must both be v3, or both non-v3.")]
    IncompatibleVersions,

    /// Bug class: a decision violated the transition graph, produced an empty
    /// reason list, or touched a status key outside the closed set. The
    /// evaluation must abort, never degrade silently.
    #[error("invariant violation: {0}")]
    InvariantViolation(String),
}
