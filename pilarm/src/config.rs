//! Monitor configuration.
//!
//! The config file is flat TOML. Every key has a default except the Slack
//! credentials. Numeric keys accept either TOML integers or strings holding an
//! integer, and boolean keys accept `"true"`/`"false"` strings in any case, so
//! hand-edited files and env-templated files both work.
//!
//! ```toml
//! slack_api_token = "xoxb-..."
//! slack_channel = "#front-door"
//! first_alert_delay = 30
//! overtime_delay = 300
//! ```

use std::env;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use ::tracing::Level;
use chrono::format::{Item, StrftimeItems};
use serde::Deserialize;

use crate::alarm::AlarmConfig;
use crate::error::ConfigError;
use crate::notify::{DEFAULT_API_URL, MessageTemplates, SlackConfig};
use crate::sensor::Polarity;

/// Overrides `slack_api_token` from the file when set.
pub const TOKEN_ENV: &str = "PILARM_SLACK_API_TOKEN";

const DEFAULT_SYSFS_ROOT: &str = "/sys/class/gpio";

/// File contents before validation.
#[derive(Debug, Default, Deserialize)]
struct RawConfig {
    timestamp_format: Option<String>,
    first_alert_delay: Option<toml::Value>,
    overtime_delay: Option<toml::Value>,
    open_message_template: Option<String>,
    overtime_message_template: Option<String>,

    slack_api_token: Option<String>,
    slack_channel: Option<String>,
    slack_api_url: Option<String>,

    switch_pin: Option<toml::Value>,
    switch_active_low: Option<toml::Value>,
    gpio_sysfs_root: Option<PathBuf>,
    gpio_offset: Option<toml::Value>,
    status_light: Option<toml::Value>,
    light_pin_r: Option<toml::Value>,
    light_pin_g: Option<toml::Value>,
    light_pin_b: Option<toml::Value>,

    dev_mode: Option<toml::Value>,
    disable_gpio: Option<toml::Value>,
    log_level: Option<String>,

    sample_interval_ms: Option<toml::Value>,
    tick_interval_ms: Option<toml::Value>,
    shutdown_timeout_secs: Option<toml::Value>,
    notification_grace_secs: Option<toml::Value>,
}

/// Door switch wiring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwitchConfig {
    pub pin: u32,
    pub polarity: Polarity,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GpioConfig {
    pub sysfs_root: PathBuf,
    /// Added to every pin number before it reaches the kernel.
    pub offset: u32,
}

/// Pins of the RGB status light.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LightPins {
    pub red: u32,
    pub green: u32,
    pub blue: u32,
}

/// Worker cadences and shutdown bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timings {
    pub sample_interval: Duration,
    pub tick_interval: Duration,
    pub shutdown_timeout: Duration,
    pub notification_grace: Duration,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            sample_interval: Duration::from_millis(1000),
            tick_interval: Duration::from_millis(100),
            shutdown_timeout: Duration::from_secs(5),
            notification_grace: Duration::from_secs(3),
        }
    }
}

/// Validated configuration. Immutable once loaded.
#[derive(Debug, Clone)]
pub struct Config {
    pub alarm: AlarmConfig,
    pub templates: MessageTemplates,
    pub slack: SlackConfig,
    pub switch: SwitchConfig,
    pub gpio: GpioConfig,
    /// `None` unless the light is enabled and GPIO is not disabled.
    pub status_light: Option<LightPins>,
    /// Read door toggles from stdin instead of the switch.
    pub dev_mode: bool,
    /// Never touch GPIO.
    pub disable_gpio: bool,
    pub log_level: Level,
    pub timings: Timings,
}

impl Config {
    /// Load and validate a config file.
    ///
    /// [`TOKEN_ENV`], when set and non-empty, replaces the file's token.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let token = env::var(TOKEN_ENV).ok().filter(|t| !t.is_empty());

        Self::from_toml_with_token(&content, token)
    }

    /// Parse and validate TOML content. The environment is not consulted.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Self::from_toml_with_token(content, None)
    }

    fn from_toml_with_token(
        content: &str,
        token_override: Option<String>,
    ) -> Result<Self, ConfigError> {
        let raw: RawConfig = toml::from_str(content)?;
        Self::validate(raw, token_override)
    }

    fn validate(raw: RawConfig, token_override: Option<String>) -> Result<Self, ConfigError> {
        let api_token = token_override.or(raw.slack_api_token).filter(|t| !t.is_empty());
        let channel = raw
            .slack_channel
            .map(|c| c.trim_start_matches('#').to_string())
            .filter(|c| !c.is_empty());

        let (api_token, channel) = match (api_token, channel) {
            (Some(token), Some(channel)) => (token, channel),
            (token, channel) => {
                let mut missing = Vec::new();
                if channel.is_none() {
                    missing.push("slack_channel");
                }
                if token.is_none() {
                    missing.push("slack_api_token");
                }
                return Err(ConfigError::MissingKeys(missing));
            }
        };

        let first_alert_delay = positive("first_alert_delay", raw.first_alert_delay.as_ref(), 3)?;
        let overtime_delay = positive("overtime_delay", raw.overtime_delay.as_ref(), 8)?;
        if overtime_delay < first_alert_delay {
            return Err(ConfigError::OvertimeBeforeFirstAlert {
                first: first_alert_delay,
                overtime: overtime_delay,
            });
        }
        let alarm = AlarmConfig {
            first_alert_delay: Duration::from_secs(first_alert_delay),
            overtime_delay: Duration::from_secs(overtime_delay),
        };

        let defaults = MessageTemplates::default();
        let timestamp_format = raw.timestamp_format.unwrap_or(defaults.timestamp_format);
        if !is_valid_strftime(&timestamp_format) {
            return Err(ConfigError::InvalidTimestampFormat(timestamp_format));
        }
        let templates = MessageTemplates {
            timestamp_format,
            open_message: raw.open_message_template.unwrap_or(defaults.open_message),
            overtime_message: raw
                .overtime_message_template
                .unwrap_or(defaults.overtime_message),
            overtime_delay: alarm.overtime_delay,
        };

        let slack = SlackConfig {
            api_url: raw
                .slack_api_url
                .unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            api_token,
            channel,
        };

        let switch = SwitchConfig {
            pin: pin("switch_pin", raw.switch_pin.as_ref(), 2)?,
            polarity: Polarity::from_active_low(boolean(
                "switch_active_low",
                raw.switch_active_low.as_ref(),
                true,
            )?),
        };
        let gpio = GpioConfig {
            sysfs_root: raw
                .gpio_sysfs_root
                .unwrap_or_else(|| PathBuf::from(DEFAULT_SYSFS_ROOT)),
            offset: pin("gpio_offset", raw.gpio_offset.as_ref(), 0)?,
        };
        let light = LightPins {
            red: pin("light_pin_r", raw.light_pin_r.as_ref(), 14)?,
            green: pin("light_pin_g", raw.light_pin_g.as_ref(), 15)?,
            blue: pin("light_pin_b", raw.light_pin_b.as_ref(), 18)?,
        };
        for (key, number) in [
            ("switch_pin", switch.pin),
            ("light_pin_r", light.red),
            ("light_pin_g", light.green),
            ("light_pin_b", light.blue),
        ] {
            within_line_range(key, number, gpio.offset)?;
        }

        let dev_mode = boolean("dev_mode", raw.dev_mode.as_ref(), false)?;
        let disable_gpio = boolean("disable_gpio", raw.disable_gpio.as_ref(), false)?;
        let light_enabled = boolean("status_light", raw.status_light.as_ref(), false)?;

        let log_level = match raw.log_level {
            Some(level) => parse_level(&level)?,
            None => Level::INFO,
        };

        let timings = Timings {
            sample_interval: Duration::from_millis(positive(
                "sample_interval_ms",
                raw.sample_interval_ms.as_ref(),
                1000,
            )?),
            tick_interval: Duration::from_millis(positive(
                "tick_interval_ms",
                raw.tick_interval_ms.as_ref(),
                100,
            )?),
            shutdown_timeout: Duration::from_secs(positive(
                "shutdown_timeout_secs",
                raw.shutdown_timeout_secs.as_ref(),
                5,
            )?),
            notification_grace: Duration::from_secs(positive(
                "notification_grace_secs",
                raw.notification_grace_secs.as_ref(),
                3,
            )?),
        };

        Ok(Self {
            alarm,
            templates,
            slack,
            switch,
            gpio,
            status_light: (light_enabled && !disable_gpio).then_some(light),
            dev_mode,
            disable_gpio,
            log_level,
            timings,
        })
    }
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "first_alert_delay = {}", self.alarm.first_alert_delay.as_secs())?;
        writeln!(f, "overtime_delay = {}", self.alarm.overtime_delay.as_secs())?;
        writeln!(f, "timestamp_format = {:?}", self.templates.timestamp_format)?;
        writeln!(f, "open_message_template = {:?}", self.templates.open_message)?;
        writeln!(f, "overtime_message_template = {:?}", self.templates.overtime_message)?;
        writeln!(f, "slack_api_url = {:?}", self.slack.api_url)?;
        writeln!(f, "slack_api_token = \"<redacted>\"")?;
        writeln!(f, "slack_channel = {:?}", self.slack.channel)?;
        writeln!(f, "switch_pin = {}", self.switch.pin)?;
        writeln!(
            f,
            "switch_active_low = {}",
            self.switch.polarity == Polarity::ActiveLow
        )?;
        writeln!(f, "gpio_sysfs_root = {:?}", self.gpio.sysfs_root)?;
        writeln!(f, "gpio_offset = {}", self.gpio.offset)?;
        match self.status_light {
            Some(pins) => writeln!(
                f,
                "status_light = true (r={}, g={}, b={})",
                pins.red, pins.green, pins.blue
            )?,
            None => writeln!(f, "status_light = false")?,
        }
        writeln!(f, "dev_mode = {}", self.dev_mode)?;
        writeln!(f, "disable_gpio = {}", self.disable_gpio)?;
        writeln!(f, "log_level = {:?}", self.log_level.as_str().to_lowercase())?;
        writeln!(f, "sample_interval_ms = {}", self.timings.sample_interval.as_millis())?;
        writeln!(f, "tick_interval_ms = {}", self.timings.tick_interval.as_millis())?;
        writeln!(f, "shutdown_timeout_secs = {}", self.timings.shutdown_timeout.as_secs())?;
        write!(
            f,
            "notification_grace_secs = {}",
            self.timings.notification_grace.as_secs()
        )
    }
}

fn integer(
    key: &'static str,
    value: Option<&toml::Value>,
    default: i64,
) -> Result<i64, ConfigError> {
    match value {
        None => Ok(default),
        Some(toml::Value::Integer(i)) => Ok(*i),
        Some(toml::Value::String(s)) => {
            s.trim().parse().map_err(|_| ConfigError::NotAnInteger {
                key,
                value: s.clone(),
            })
        }
        Some(other) => Err(ConfigError::NotAnInteger {
            key,
            value: other.to_string(),
        }),
    }
}

fn positive(
    key: &'static str,
    value: Option<&toml::Value>,
    default: u64,
) -> Result<u64, ConfigError> {
    let value = integer(key, value, default as i64)?;
    u64::try_from(value)
        .ok()
        .filter(|v| *v > 0)
        .ok_or(ConfigError::NotPositive { key, value })
}

fn pin(
    key: &'static str,
    value: Option<&toml::Value>,
    default: u32,
) -> Result<u32, ConfigError> {
    let value = integer(key, value, i64::from(default))?;
    u32::try_from(value).map_err(|_| ConfigError::OutOfRange { key, value })
}

/// `pin + gpio_offset` must still name a kernel line.
fn within_line_range(key: &'static str, pin: u32, offset: u32) -> Result<(), ConfigError> {
    match pin.checked_add(offset) {
        Some(_) => Ok(()),
        None => Err(ConfigError::OutOfRange {
            key,
            value: i64::from(pin) + i64::from(offset),
        }),
    }
}

fn boolean(
    key: &'static str,
    value: Option<&toml::Value>,
    default: bool,
) -> Result<bool, ConfigError> {
    match value {
        None => Ok(default),
        Some(toml::Value::Boolean(b)) => Ok(*b),
        Some(toml::Value::String(s)) if s.eq_ignore_ascii_case("true") => Ok(true),
        Some(toml::Value::String(s)) if s.eq_ignore_ascii_case("false") => Ok(false),
        Some(toml::Value::String(s)) => Err(ConfigError::NotABool {
            key,
            value: s.clone(),
        }),
        Some(other) => Err(ConfigError::NotABool {
            key,
            value: other.to_string(),
        }),
    }
}

fn parse_level(level: &str) -> Result<Level, ConfigError> {
    match level.to_ascii_lowercase().as_str() {
        "trace" => Ok(Level::TRACE),
        "debug" => Ok(Level::DEBUG),
        "info" => Ok(Level::INFO),
        "warn" | "warning" => Ok(Level::WARN),
        "error" => Ok(Level::ERROR),
        _ => Err(ConfigError::InvalidLogLevel(level.to_string())),
    }
}

fn is_valid_strftime(format: &str) -> bool {
    !StrftimeItems::new(format).any(|item| matches!(item, Item::Error))
}
