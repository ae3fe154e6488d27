//! Swingmaster CLI.
//!
//! Commands:
//! - `run-range` — evaluate a universe over a date range and persist state,
//!   transition, and signal rows; optionally score entry windows per day
//! - `ew-score` — compute fastpass/rolling EW scores for one date
//! - `daily-list` — print the per-day production list, best scores first

mod config;
mod runner;

use std::path::PathBuf;

use anyhow::Context;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use rusqlite::Connection;

use swingmaster_core::domain::State;
use swingmaster_store::ew::{run_fastpass, run_rolling, Market};
use swingmaster_store::market::MarketData;
use swingmaster_store::migrate::apply_migrations;
use swingmaster_store::state_repo::fetch_daily_list;

use config::RunConfig;
use runner::{run_range, RangeParams};

#[derive(Parser)]
#[command(name = "swingmaster", version, about = "Deterministic market-state engine for swing investing")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the evaluation pipeline over a date range.
    RunRange {
        /// TOML run config; flags below override nothing when this is given.
        #[arg(long, conflicts_with_all = ["md_db", "rc_db", "date_from", "date_to"])]
        config: Option<PathBuf>,
        #[arg(long)]
        md_db: Option<PathBuf>,
        #[arg(long)]
        rc_db: Option<PathBuf>,
        #[arg(long)]
        date_from: Option<NaiveDate>,
        /// Inclusive end date.
        #[arg(long)]
        date_to: Option<NaiveDate>,
        /// Comma-separated tickers; overrides --market.
        #[arg(long)]
        tickers: Option<String>,
        /// Market code for universe selection.
        #[arg(long)]
        market: Option<String>,
        #[arg(long, default_value_t = 50)]
        limit: usize,
        #[arg(long, default_value = "v3")]
        signal_version: String,
        #[arg(long, default_value = "v3")]
        policy_version: String,
        #[arg(long)]
        require_row_on_date: bool,
        /// Score entry windows for this market after each day.
        #[arg(long)]
        ew_market: Option<String>,
        /// Stable run identifier; defaults to one derived from the range.
        #[arg(long)]
        run_id: Option<String>,
    },
    /// Compute EW scores for one as-of date.
    EwScore {
        #[arg(long)]
        rc_db: PathBuf,
        #[arg(long)]
        md_db: PathBuf,
        #[arg(long)]
        date: NaiveDate,
        #[arg(long)]
        market: String,
    },
    /// Print the daily production list.
    DailyList {
        #[arg(long)]
        rc_db: PathBuf,
        #[arg(long)]
        date: NaiveDate,
        /// Filter to one state, e.g. ENTRY_WINDOW.
        #[arg(long)]
        state: Option<String>,
        #[arg(long)]
        limit: Option<usize>,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    match Cli::parse().command {
        Command::RunRange {
            config,
            md_db,
            rc_db,
            date_from,
            date_to,
            tickers,
            market,
            limit,
            signal_version,
            policy_version,
            require_row_on_date,
            ew_market,
            run_id,
        } => {
            let (md_path, rc_path, params) = if let Some(path) = config {
                let cfg = RunConfig::from_file(&path)
                    .with_context(|| format!("loading config {}", path.display()))?;
                // Reject mixed version pairs before any database is opened.
                runner::check_version_compat(&cfg.run.signal_version, &cfg.run.policy_version)?;
                params_from_config(cfg)?
            } else {
                runner::check_version_compat(&signal_version, &policy_version)?;
                let md_path = md_db.context("--md-db is required without --config")?;
                let rc_path = rc_db.context("--rc-db is required without --config")?;
                let date_from = date_from.context("--date-from is required without --config")?;
                let date_to = date_to.context("--date-to is required without --config")?;
                let ticker_list = tickers
                    .map(|t| {
                        t.split(',')
                            .map(|s| s.trim().to_string())
                            .filter(|s| !s.is_empty())
                            .collect::<Vec<_>>()
                    })
                    .unwrap_or_default();
                let params = RangeParams {
                    date_from,
                    date_to,
                    tickers: ticker_list,
                    signal_version,
                    policy_version,
                    require_row_on_date,
                    ew_market: ew_market.as_deref().map(Market::parse).transpose()?,
                    run_id: run_id
                        .unwrap_or_else(|| format!("range-{date_from}-{date_to}")),
                };
                // Universe via market code when no explicit tickers given.
                let mut params = params;
                if params.tickers.is_empty() {
                    let market_code =
                        market.context("--tickers or --market is required without --config")?;
                    let md_conn = Connection::open(&md_path)?;
                    params.tickers =
                        MarketData::new(&md_conn).tickers_for_market(&market_code, limit)?;
                }
                (md_path, rc_path, params)
            };

            let rc = Connection::open(&rc_path)?;
            let md_conn = Connection::open(&md_path)?;
            let result = run_range(&rc, &md_conn, &params)?;
            println!(
                "run_id={} days={} evaluations={} transitions={} continuations={} ew_rows={}",
                result.run_id,
                result.days_processed,
                result.evaluations,
                result.transitions,
                result.continuations_decided,
                result.ew_rows,
            );
        }
        Command::EwScore {
            rc_db,
            md_db,
            date,
            market,
        } => {
            let market = Market::parse(&market)?;
            let rc = Connection::open(&rc_db)?;
            let md_conn = Connection::open(&md_db)?;
            apply_migrations(&rc)?;
            let fastpass = run_fastpass(&rc, &md_conn, market, date)?;
            let rolling = run_rolling(&rc, &md_conn, market, date)?;
            println!("fastpass_rows={fastpass} rolling_rows={rolling}");
        }
        Command::DailyList {
            rc_db,
            date,
            state,
            limit,
        } => {
            let state = state
                .map(|s| {
                    State::parse(&s).with_context(|| format!("unknown state '{s}'"))
                })
                .transpose()?;
            let rc = Connection::open(&rc_db)?;
            let rows = fetch_daily_list(&rc, date, state, limit)?;
            println!("ticker | state | ew_level_fastpass | ew_score_fastpass | rule");
            for row in rows {
                let level = row
                    .ew_level_fastpass
                    .map_or_else(|| "-".to_string(), |l| l.to_string());
                let score = row
                    .ew_score_fastpass
                    .map_or_else(|| "-".to_string(), |s| format!("{s:.6}"));
                let rule = row.ew_rule_fastpass.unwrap_or_else(|| "-".to_string());
                println!("{} | {} | {} | {} | {}", row.ticker, row.state, level, score, rule);
            }
        }
    }
    Ok(())
}

/// Resolve a TOML config into run parameters plus database paths.
fn params_from_config(cfg: RunConfig) -> anyhow::Result<(PathBuf, PathBuf, RangeParams)> {
    let date_from = NaiveDate::parse_from_str(&cfg.run.date_from, "%Y-%m-%d")
        .with_context(|| format!("bad date_from '{}'", cfg.run.date_from))?;
    let date_to = NaiveDate::parse_from_str(&cfg.run.date_to, "%Y-%m-%d")
        .with_context(|| format!("bad date_to '{}'", cfg.run.date_to))?;

    let md_path = PathBuf::from(&cfg.run.md_db);
    let tickers = if !cfg.universe.tickers.is_empty() {
        cfg.universe.tickers.clone()
    } else if let Some(market_code) = &cfg.universe.market {
        let md_conn = Connection::open(&md_path)?;
        MarketData::new(&md_conn).tickers_for_market(market_code, cfg.universe.limit)?
    } else {
        anyhow::bail!("config needs universe.tickers or universe.market");
    };

    let params = RangeParams {
        date_from,
        date_to,
        tickers,
        signal_version: cfg.run.signal_version.clone(),
        policy_version: cfg.run.policy_version.clone(),
        require_row_on_date: cfg.run.require_row_on_date,
        ew_market: cfg
            .run
            .ew_market
            .as_deref()
            .map(Market::parse)
            .transpose()?,
        run_id: format!("range-{date_from}-{date_to}"),
    };
    Ok((md_path, PathBuf::from(&cfg.run.rc_db), params))
}
