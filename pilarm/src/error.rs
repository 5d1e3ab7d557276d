//! Error types shared across the crate.
//!
//! Only [`StartupError`] (and the [`ConfigError`] it wraps) ever stops the
//! process. Everything else is logged by the worker that hit it.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Why a configuration file was rejected.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("malformed config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("configuration keys missing: {}", .0.join(", "))]
    MissingKeys(Vec<&'static str>),

    #[error("expected an integer for {key}, got {value}")]
    NotAnInteger { key: &'static str, value: String },

    #[error("{key} must be greater than zero, got {value}")]
    NotPositive { key: &'static str, value: i64 },

    #[error("{key} is out of range: {value}")]
    OutOfRange { key: &'static str, value: i64 },

    #[error(
        "overtime_delay ({overtime}s) must not be shorter than first_alert_delay ({first}s)"
    )]
    OvertimeBeforeFirstAlert { first: u64, overtime: u64 },

    #[error("got value {value} for {key}; expected true or false")]
    NotABool { key: &'static str, value: String },

    #[error("{0} is not a valid log level; expected one of trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("invalid timestamp format: {0:?}")]
    InvalidTimestampFormat(String),
}

/// Failures talking to a GPIO line.
#[derive(Debug, Error)]
pub enum GpioError {
    #[error("gpio{pin}: {source}")]
    Io {
        pin: u32,
        #[source]
        source: io::Error,
    },

    #[error("gpio{pin}: unexpected value {value:?}")]
    InvalidValue { pin: u32, value: String },

    #[error("gpio{pin} did not appear after export")]
    NotExported { pin: u32 },

    #[error("gpio{pin}: read timed out")]
    Timeout { pin: u32 },

    #[error("pin {pin} with offset {offset} is beyond the last gpio line")]
    LineOutOfRange { pin: u32, offset: u32 },
}

/// Failures delivering a notification or talking to the chat API.
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("{method} returned error: {code}")]
    Api { method: &'static str, code: String },

    #[error("could not find slack channel named {0}")]
    ChannelNotFound(String),
}

/// Anything that prevents the daemon from starting its workers.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to resolve notification channel: {0}")]
    Channel(#[source] NotifyError),

    #[error("failed to set up switch input: {0}")]
    Gpio(#[from] GpioError),

    #[error("failed to install signal handlers: {0}")]
    Signals(#[source] io::Error),
}
