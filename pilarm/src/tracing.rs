//! Logging setup.
//!
//! Logs go to journald when the process runs under systemd (detected via
//! `JOURNAL_STREAM`) and to stdout otherwise. The filter sits behind a reload
//! handle so the level from the config file can be applied once it is known.

use std::env;

use ::tracing::Level;
use ::tracing::level_filters::LevelFilter;
use time::UtcOffset;
use time::macros::format_description;
use tracing_subscriber::fmt::time::OffsetTime;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Registry, fmt, reload};

pub mod prelude {
    pub use ::tracing::{debug, error, info, trace, warn};
}

use prelude::*;

const DEFAULT_LEVEL: LevelFilter = LevelFilter::INFO;

/// Handle for changing the log level after startup.
pub struct LogLevelHandle {
    filter: reload::Handle<EnvFilter, Registry>,
    env_override: bool,
}

impl LogLevelHandle {
    /// Apply the configured level, unless `RUST_LOG` already chose one.
    pub fn apply(&self, level: Level) {
        if self.env_override {
            debug!(configured = %level, "RUST_LOG is set; ignoring configured log level");
            return;
        }

        let filter = EnvFilter::default().add_directive(LevelFilter::from_level(level).into());
        if let Err(e) = self.filter.reload(filter) {
            warn!(error = %e, "Failed to apply log level");
        }
    }
}

/// Install the global subscriber.
///
/// Call before starting the async runtime: the local UTC offset can only be
/// determined reliably while the process is single-threaded.
pub fn init_journald_or_stdout() -> LogLevelHandle {
    let env_override = env::var_os(EnvFilter::DEFAULT_ENV).is_some();
    let filter = EnvFilter::builder()
        .with_default_directive(DEFAULT_LEVEL.into())
        .from_env_lossy();
    let (filter, handle) = reload::Layer::new(filter);

    let journald = if env::var_os("JOURNAL_STREAM").is_some() {
        tracing_journald::layer().ok()
    } else {
        None
    };

    let stdout = journald.is_none().then(|| {
        let offset = UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC);
        let timer = OffsetTime::new(
            offset,
            format_description!("[year]-[month]-[day] [hour]:[minute]:[second].[subsecond digits:3]"),
        );
        fmt::layer().with_timer(timer).with_target(false)
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(journald)
        .with(stdout)
        .init();

    LogLevelHandle {
        filter: handle,
        env_override,
    }
}
