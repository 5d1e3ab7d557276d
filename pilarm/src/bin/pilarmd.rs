//! Door monitor daemon.
//!
//! Exit codes: 0 after a clean shutdown, 1 when startup fails, 2 when workers
//! had to be abandoned at shutdown.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;

use pilarm::config::Config;
use pilarm::daemon::Daemon;
use pilarm::shutdown::ShutdownOutcome;
use pilarm::tracing::LogLevelHandle;
use pilarm::tracing::prelude::*;

/// Bound on joining runtime threads at exit, e.g. a stdin reader blocked in a
/// read that will never return.
const RUNTIME_SHUTDOWN_TIMEOUT: Duration = Duration::from_millis(500);

#[derive(Parser)]
#[command(name = "pilarmd")]
#[command(about = "Watches a door switch and posts Slack alerts when it stays open")]
#[command(version)]
struct Args {
    /// Path to the config file
    #[arg(short, long, env = "PILARM_CONFIG", default_value = "pilarm.toml")]
    config: PathBuf,
}

fn main() -> ExitCode {
    let args = Args::parse();
    let log_level = pilarm::tracing::init_journald_or_stdout();

    match run(&args, &log_level) {
        Ok(ShutdownOutcome::Clean) => {
            info!("Exiting");
            ExitCode::SUCCESS
        }
        Ok(ShutdownOutcome::Forced { stuck_workers }) => {
            error!(stuck_workers, "Exiting with workers still running");
            ExitCode::from(2)
        }
        Err(e) => {
            error!("{e:#}");
            ExitCode::from(1)
        }
    }
}

fn run(args: &Args, log_level: &LogLevelHandle) -> Result<ShutdownOutcome> {
    let config = Config::load(&args.config)
        .with_context(|| format!("failed to load {}", args.config.display()))?;
    log_level.apply(config.log_level);
    info!(path = %args.config.display(), "Validated config");
    debug!("Effective config:\n{config}");

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;

    let outcome = runtime.block_on(Daemon::new(config).run());
    runtime.shutdown_timeout(RUNTIME_SHUTDOWN_TIMEOUT);

    Ok(outcome?)
}
