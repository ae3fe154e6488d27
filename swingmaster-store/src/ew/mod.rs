//! EW (entry-window) scoring engine.
//!
//! Dual-mode: fastpass scores are computed from entry-day features the day a
//! window opens; rolling scores are recomputed daily from prefix returns.
//! Markets route to locked rule ids; the 0/1/2/3 level contract is shared by
//! both modes and frozen.

pub mod model;
pub mod repo;
pub mod router;
pub mod score;

pub use model::{fastpass_model, rolling_model, FastpassModel, RollingModel};
pub use repo::RcEwScoreRepo;
pub use router::{score_level, Market};
pub use score::{run_fastpass, run_rolling};
