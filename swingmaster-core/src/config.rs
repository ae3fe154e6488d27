//! Provider configuration: explicit immutable structs with centralized
//! defaults. Thresholds baked into signal modules are module constants; this
//! struct carries only the knobs the provider itself owns.

/// Configuration for the daily signal provider.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub sma_window: usize,
    pub momentum_lookback: usize,
    pub atr_window: usize,
    pub stabilization_days: usize,
    pub entry_sma_window: usize,
    pub invalidation_lookback: usize,
    pub dow_window: usize,
    /// Reject evaluation when the latest row's date is not the as-of date.
    pub require_row_on_date: bool,
}

/// Extra rows requested beyond the strict signal minimums, absorbing short
/// data-vendor gaps at the window edge.
pub const SAFETY_MARGIN_ROWS: usize = 2;

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            sma_window: 20,
            momentum_lookback: 1,
            atr_window: 14,
            stabilization_days: 5,
            entry_sma_window: 5,
            invalidation_lookback: 10,
            dow_window: 3,
            require_row_on_date: false,
        }
    }
}

impl ProviderConfig {
    /// Minimum OHLC rows for a full signal pass. Below this the provider
    /// emits only DATA_INSUFFICIENT.
    pub fn required_rows(&self) -> usize {
        use crate::signals::trend_started::{BREAK_LOW_WINDOW, REGIME_WINDOW, SLOPE_LOOKBACK, SMA_LEN};

        [
            self.sma_window + self.momentum_lookback,
            self.sma_window + 5,
            self.atr_window + 1,
            (self.stabilization_days + 1).max(self.entry_sma_window),
            self.invalidation_lookback + 1,
            2 * self.dow_window + 1,
            SMA_LEN + REGIME_WINDOW - 1,
            SMA_LEN + SLOPE_LOOKBACK,
            BREAK_LOW_WINDOW + 1,
        ]
        .into_iter()
        .max()
        .expect("non-empty")
            + SAFETY_MARGIN_ROWS
    }
}
