//! Single-step state machine evaluation.
//!
//! Applies the policy decision, then the guardrails, merges the reason
//! lists, and produces the final row plus the transition record when the
//! state actually moved. Deterministic; never reads OHLC.

use chrono::NaiveDate;
use tracing::debug;

use crate::domain::{Decision, ReasonCode, State, StateAttrs, Transition};
use crate::error::EngineError;
use crate::policy::{apply_guardrails, graph, TransitionPolicy};
use crate::signals::SignalSet;

#[derive(Debug, Clone)]
pub struct EvaluationResult {
    pub prev_state: State,
    pub final_state: State,
    pub reasons: Vec<ReasonCode>,
    pub transition: Option<Transition>,
    pub final_attrs: StateAttrs,
    pub guardrails_blocked: bool,
    pub proposed_state: State,
}

/// Evaluate one `(ticker, as_of)` step.
///
/// Errors are invariant violations only; ordinary outcomes (including
/// guardrail blocks) are data.
pub fn evaluate_step(
    prev_state: State,
    prev_attrs: &StateAttrs,
    signals: &SignalSet,
    policy: &dyn TransitionPolicy,
    ticker: &str,
    as_of: NaiveDate,
) -> Result<EvaluationResult, EngineError> {
    let decision: Decision = policy.decide(prev_state, prev_attrs, signals, ticker, as_of);
    let proposed_state = decision.next_state;
    let mut policy_reasons = decision.reasons;

    let guardrail = apply_guardrails(prev_state, prev_attrs, proposed_state);

    let (final_state, final_attrs, guardrail_reasons, blocked) = if guardrail.allowed {
        (guardrail.final_state, decision.attrs, Vec::new(), false)
    } else {
        debug!(
            ticker,
            %as_of,
            prev = %prev_state,
            proposed = %proposed_state,
            reasons = ?guardrail.reasons,
            "guardrail blocked transition"
        );
        let mut reasons = guardrail.reasons;
        // A blocked invalidation is its own audit event; the raw INVALIDATED
        // reason must not survive alongside it.
        if policy_reasons.contains(&ReasonCode::Invalidated)
            && reasons.contains(&ReasonCode::MinStateAgeLock)
        {
            policy_reasons.retain(|r| *r != ReasonCode::Invalidated);
            reasons = vec![ReasonCode::InvalidationBlockedByLock];
        }
        let mut attrs = prev_attrs.clone();
        attrs.age = prev_attrs.age + 1;
        (prev_state, attrs, reasons, true)
    };

    let mut reasons = policy_reasons;
    reasons.extend(guardrail_reasons);

    if reasons.is_empty() {
        return Err(EngineError::InvariantViolation(format!(
            "decision for {ticker} on {as_of} carries no reasons"
        )));
    }
    if final_state != prev_state && !graph::is_allowed(prev_state, final_state) {
        return Err(EngineError::InvariantViolation(format!(
            "transition {prev_state} -> {final_state} is outside the graph"
        )));
    }

    let transition = (final_state != prev_state).then(|| Transition {
        from_state: prev_state,
        to_state: final_state,
        reasons: reasons.clone(),
    });

    Ok(EvaluationResult {
        prev_state,
        final_state,
        reasons,
        transition,
        final_attrs,
        guardrails_blocked: blocked,
        proposed_state,
    })
}
