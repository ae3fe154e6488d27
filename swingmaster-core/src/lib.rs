//! Swingmaster core engine.
//!
//! Deterministic, exclusion-first evaluation of a downtrend → stabilization →
//! entry → pass lifecycle over daily OHLC history. One evaluation maps
//! `(ticker, as-of date, OHLC)` to a signal set, a policy decision with reason
//! codes, and merged state-attrs metadata. No I/O lives here; persistence and
//! market-data access are supplied by callers through ports.

pub mod config;
pub mod data;
pub mod domain;
pub mod engine;
pub mod error;
pub mod policy;
pub mod signals;

pub use engine::{evaluate_step, EvaluationResult};
pub use error::EngineError;
