//! Range/universe orchestration.
//!
//! Iterates trading days in ascending order, evaluates every universe ticker
//! per day (signals → policy → guardrails), and persists state, transition,
//! and signal rows inside one transaction per day. After the range, the
//! entry-continuation backfill and optional EW scoring run over the stored
//! rows. The version-compatibility guard runs before any storage is touched.

use chrono::NaiveDate;
use rusqlite::Connection;
use tracing::{debug, info};

use swingmaster_core::config::ProviderConfig;
use swingmaster_core::engine::evaluate_step;
use swingmaster_core::error::EngineError;
use swingmaster_core::policy::{PolicyV1, PolicyV2, PolicyV3, TransitionPolicy};
use swingmaster_core::signals::SignalProvider;
use swingmaster_store::continuation::confirm_entry_continuations;
use swingmaster_store::ew::{run_fastpass, run_rolling, Market};
use swingmaster_store::history::SqliteStateHistory;
use swingmaster_store::market::MarketData;
use swingmaster_store::migrate::apply_migrations;
use swingmaster_store::prev_state::PrevStateProvider;
use swingmaster_store::run_repo::RcRunRepo;
use swingmaster_store::state_repo::RcStateRepo;

pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Signal/policy pairs must agree on the v3 boundary: v3 signals feed v3
/// metadata the older policies cannot maintain, and vice versa.
pub fn check_version_compat(signal_version: &str, policy_version: &str) -> Result<(), EngineError> {
    if (signal_version == "v3") != (policy_version == "v3") {
        return Err(EngineError::IncompatibleVersions);
    }
    Ok(())
}

fn build_policy<'a>(
    policy_version: &str,
    history: &'a SqliteStateHistory<'a>,
) -> Box<dyn TransitionPolicy + 'a> {
    match policy_version {
        "v1" => Box::new(PolicyV1::with_history(history)),
        "v2" => Box::new(PolicyV2::with_history(history)),
        _ => Box::new(PolicyV3::with_history(history)),
    }
}

#[derive(Debug)]
pub struct RangeRun {
    pub run_id: String,
    pub days_processed: usize,
    pub evaluations: usize,
    pub transitions: usize,
    pub continuations_decided: usize,
    pub ew_rows: usize,
}

pub struct RangeParams {
    pub date_from: NaiveDate,
    pub date_to: NaiveDate,
    pub tickers: Vec<String>,
    pub signal_version: String,
    pub policy_version: String,
    pub require_row_on_date: bool,
    pub ew_market: Option<Market>,
    pub run_id: String,
}

/// Run the pipeline over a date range for a fixed ticker universe.
///
/// Per-ticker evaluations on one day are independent; days for the same
/// ticker must run in ascending date order because each decision reads the
/// previous day's state and age.
pub fn run_range(
    rc: &Connection,
    md_conn: &Connection,
    params: &RangeParams,
) -> anyhow::Result<RangeRun> {
    check_version_compat(&params.signal_version, &params.policy_version)?;

    apply_migrations(rc)?;
    let md = MarketData::new(md_conn);
    let provider = SignalProvider::new(ProviderConfig {
        require_row_on_date: params.require_row_on_date,
        ..ProviderConfig::default()
    });
    let required_rows = provider.config().required_rows();

    let created_at = format!("{}T00:00:00Z", params.date_from.format("%Y-%m-%d"));
    RcRunRepo::new(rc).insert_run(
        &params.run_id,
        &created_at,
        ENGINE_VERSION,
        &format!("rule_{}", params.policy_version),
        &params.policy_version,
    )?;

    let dates = md.trading_dates(params.date_from, params.date_to)?;
    info!(
        run_id = %params.run_id,
        provider = provider.source(),
        days = dates.len(),
        tickers = params.tickers.len(),
        "starting range run"
    );

    let mut evaluations = 0usize;
    let mut transitions = 0usize;

    for date in &dates {
        rc.execute_batch("BEGIN")?;
        let day_result = (|| -> anyhow::Result<()> {
            for ticker in &params.tickers {
                let bars = md.last_n_bars(ticker, *date, required_rows)?;
                let signals = provider.signals(ticker, *date, &bars);

                let (prev_state, prev_attrs) =
                    PrevStateProvider::new(rc).get_prev(ticker, *date)?;
                let history = SqliteStateHistory::new(rc);
                let policy = build_policy(&params.policy_version, &history);
                let evaluation = evaluate_step(
                    prev_state,
                    &prev_attrs,
                    &signals,
                    policy.as_ref(),
                    ticker,
                    *date,
                )?;

                let repo = RcStateRepo::new(rc);
                repo.upsert_state(
                    ticker,
                    *date,
                    evaluation.final_state,
                    &evaluation.reasons,
                    &evaluation.final_attrs,
                    &params.run_id,
                )?;
                repo.upsert_signals(ticker, *date, &signals, &params.run_id)?;
                repo.upsert_transition(
                    ticker,
                    *date,
                    evaluation.transition.as_ref(),
                    &evaluation.final_attrs,
                    &params.run_id,
                )?;

                evaluations += 1;
                if evaluation.transition.is_some() {
                    transitions += 1;
                    debug!(
                        ticker = %ticker,
                        date = %date,
                        from = %evaluation.prev_state,
                        to = %evaluation.final_state,
                        "transition"
                    );
                }
            }
            Ok(())
        })();
        match day_result {
            Ok(()) => rc.execute_batch("COMMIT")?,
            Err(e) => {
                rc.execute_batch("ROLLBACK")?;
                return Err(e);
            }
        }
    }

    let continuations_decided = confirm_entry_continuations(rc, md_conn)?;

    let mut ew_rows = 0usize;
    if let Some(market) = params.ew_market {
        for date in &dates {
            ew_rows += run_fastpass(rc, md_conn, market, *date)?;
            ew_rows += run_rolling(rc, md_conn, market, *date)?;
        }
    }

    info!(
        run_id = %params.run_id,
        evaluations,
        transitions,
        continuations_decided,
        ew_rows,
        "range run complete"
    );

    Ok(RangeRun {
        run_id: params.run_id.clone(),
        days_processed: dates.len(),
        evaluations,
        transitions,
        continuations_decided,
        ew_rows,
    })
}
