//! Market-data types consumed by the evaluation pipeline.
//!
//! The engine never talks to a data source directly; callers hand it an
//! immutable OHLC snapshot per evaluation.

pub mod bar;
pub mod view;

pub use bar::{BarError, OhlcBar};
pub use view::OhlcView;
