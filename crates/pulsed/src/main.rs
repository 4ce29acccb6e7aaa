//! Pulsed - Trend validation engine daemon.
//!
//! Opens the engine store and runs the two periodic sweeps: the outbox
//! reconciler (queued submissions) and the voting-window expiry sweep.

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tokio::time::{interval, Duration};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use pulse_common::config::EngineConfig;
use pulse_common::{DEFAULT_CONFIG_PATH, DEFAULT_DB_PATH};
use pulsed::TrendEngine;

#[derive(Parser)]
#[command(name = "pulsed")]
#[command(about = "TrendPulse validation and reward engine daemon", long_about = None)]
#[command(version)]
struct Cli {
    /// Engine database path
    #[arg(long, default_value = DEFAULT_DB_PATH)]
    db: PathBuf,

    /// Engine config file (TOML, missing file uses defaults)
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Seconds between reconciler passes
    #[arg(long, default_value_t = 5)]
    reconcile_interval: u64,

    /// Seconds between expiry sweeps
    #[arg(long, default_value_t = 300)]
    sweep_interval: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();

    info!("pulsed v{} starting", env!("CARGO_PKG_VERSION"));

    let config = EngineConfig::load(&cli.config)?;
    info!(
        quorum = config.quorum,
        voting_window_hours = config.voting_window_hours,
        daily_xp_cap = config.daily_xp_cap,
        "engine config loaded"
    );

    let engine = TrendEngine::open(&cli.db, config)?;
    info!(db = %cli.db.display(), "engine store opened");

    let mut reconcile_tick = interval(Duration::from_secs(cli.reconcile_interval.max(1)));
    let mut sweep_tick = interval(Duration::from_secs(cli.sweep_interval.max(1)));

    info!("pulsed ready");

    loop {
        tokio::select! {
            _ = reconcile_tick.tick() => {
                if let Err(e) = engine.run_reconciler_once() {
                    error!("reconciler pass failed: {}", e);
                }
            }
            _ = sweep_tick.tick() => {
                if let Err(e) = engine.sweep_expired() {
                    error!("expiry sweep failed: {}", e);
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("shutting down gracefully");
                break;
            }
        }
    }

    Ok(())
}
