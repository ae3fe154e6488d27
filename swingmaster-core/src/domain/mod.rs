//! Domain types — the vocabulary of Swingmaster.
//!
//! States, reason codes, state attributes, and decision carriers. All enums
//! are closed: adding a variant forces a compile-time audit of every match.

pub mod attrs;
pub mod decision;
pub mod state;

pub use attrs::{
    DeclineProfile, DowntrendEntryType, DowntrendOrigin, EntryGate, EntryQuality,
    StabilizationPhase, StateAttrs, StatusAttrs,
};
pub use decision::{Decision, Transition};
pub use state::{ReasonCode, State};
