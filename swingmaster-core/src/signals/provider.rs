//! Daily signal provider — orchestrates the signal modules over one OHLC
//! window and emits the per-day signal set.
//!
//! The provider never fails: precondition violations degrade to a set
//! containing only DATA_INSUFFICIENT. Module order does not matter; the
//! invalidation suppression and NO_SIGNAL bookkeeping are set operations at
//! the end.

use chrono::NaiveDate;
use tracing::debug;

use crate::config::ProviderConfig;
use crate::data::{OhlcBar, OhlcView};

use super::dow::{self, DowConfig};
use super::{
    entry_setup_valid, invalidated, ma20_reclaimed, sharp_sell_off, slow_drift,
    stabilization_confirmed, structural_downtrend, trend_matured, trend_started,
    volatility_compression, SignalKey, SignalSet,
};

/// Provenance label carried on persisted signal rows.
pub const PROVIDER_SOURCE: &str = "daily_v3";

pub struct SignalProvider {
    config: ProviderConfig,
    dow_config: DowConfig,
}

impl SignalProvider {
    pub fn new(config: ProviderConfig) -> Self {
        let dow_config = DowConfig {
            window: config.dow_window,
            ..DowConfig::default()
        };
        Self { config, dow_config }
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    /// Provenance note for run metadata and audit logs.
    pub fn source(&self) -> &'static str {
        PROVIDER_SOURCE
    }

    /// Evaluate all signals for `ticker` as of `as_of`. `bars` is the OHLC
    /// history in ascending date order, ending at or before the as-of date.
    pub fn signals(&self, ticker: &str, as_of: NaiveDate, bars: &[OhlcBar]) -> SignalSet {
        let required = self.config.required_rows();
        if bars.len() < required {
            debug!(
                ticker,
                %as_of,
                available = bars.len(),
                required,
                "insufficient OHLC history"
            );
            return SignalSet::insufficient();
        }
        let view = OhlcView::from_ascending(bars);
        if self.config.require_row_on_date && view.as_of() != Some(as_of) {
            debug!(ticker, %as_of, latest = ?view.as_of(), "no row on as-of date");
            return SignalSet::insufficient();
        }

        let mut set = SignalSet::new();
        let mut primary = 0usize;

        if let Some(key) = slow_drift::evaluate(&view) {
            set.insert(key);
            // The drift detector subsumes the legacy slow-decline signal.
            set.insert(SignalKey::SlowDeclineStarted);
            primary += 2;
        }
        let module_results = [
            sharp_sell_off::evaluate(&view),
            volatility_compression::evaluate(&view),
            ma20_reclaimed::evaluate(&view),
            trend_matured::evaluate(&view),
            stabilization_confirmed::evaluate(&view),
            entry_setup_valid::evaluate(&view),
        ];
        for key in module_results.into_iter().flatten() {
            set.insert(key);
            primary += 1;
        }

        if let Some(key) = invalidated::evaluate(&view, self.config.invalidation_lookback) {
            set.insert(key);
            primary += 1;
            set.remove(SignalKey::StabilizationConfirmed);
            set.remove(SignalKey::EntrySetupValid);
        }

        let dow_facts = dow::compute_facts(&view, as_of, &self.dow_config);

        if let Some(key) = structural_downtrend::evaluate(&view, &dow_facts) {
            set.insert(key);
            primary += 1;
        }

        // Dow override: a broken up-regime that just went neutral on a lower
        // low is a trend start even when the SMA-cross detector stays quiet.
        let trend_started_base = trend_started::evaluate(&view).is_some();
        if (dow_facts.has(SignalKey::DowTrendChangeUpToNeutral)
            && dow_facts.has(SignalKey::DowLastLowLl))
            || trend_started_base
        {
            set.insert(SignalKey::TrendStarted);
            primary += 1;
        }

        for key in dow_facts.iter() {
            set.insert(key);
        }
        if set.has(SignalKey::DowLastLowHl) {
            set.insert(SignalKey::HigherLowConfirmed);
            primary += 1;
        }
        if set.has(SignalKey::DowBosBreakUp) {
            set.insert(SignalKey::StructureBreakoutUpConfirmed);
            primary += 1;
        }

        if primary == 0 && !set.has(SignalKey::Invalidated) {
            set.insert(SignalKey::NoSignal);
        }
        set
    }
}

impl Default for SignalProvider {
    fn default() -> Self {
        Self::new(ProviderConfig::default())
    }
}
