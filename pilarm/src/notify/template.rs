use std::fmt::{self, Write};
use std::time::Duration;

use chrono::{DateTime, TimeZone};

use super::AlertKind;

const TIMESTAMP_TOKEN: &str = "$TIMESTAMP";
const DURATION_TOKEN: &str = "$DURATION";

/// Message text for both alerts.
///
/// `$TIMESTAMP` expands to the dispatch time in `timestamp_format` (strftime
/// syntax). `$DURATION` expands to the overtime threshold in whole seconds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageTemplates {
    pub timestamp_format: String,
    pub open_message: String,
    pub overtime_message: String,
    pub overtime_delay: Duration,
}

impl Default for MessageTemplates {
    fn default() -> Self {
        Self {
            timestamp_format: "%I:%M:%S %p on %Y/%m/%d".to_string(),
            open_message: "Door opened at $TIMESTAMP".to_string(),
            overtime_message: "Door has been opened for $DURATION seconds as of $TIMESTAMP"
                .to_string(),
            overtime_delay: Duration::from_secs(8),
        }
    }
}

impl MessageTemplates {
    pub fn render<Tz>(&self, kind: AlertKind, now: &DateTime<Tz>) -> String
    where
        Tz: TimeZone,
        Tz::Offset: fmt::Display,
    {
        let timestamp = self.timestamp(now);
        match kind {
            AlertKind::DoorOpen => self.open_message.replace(TIMESTAMP_TOKEN, &timestamp),
            AlertKind::Overtime => self
                .overtime_message
                .replace(TIMESTAMP_TOKEN, &timestamp)
                .replace(DURATION_TOKEN, &self.overtime_delay.as_secs().to_string()),
        }
    }

    fn timestamp<Tz>(&self, now: &DateTime<Tz>) -> String
    where
        Tz: TimeZone,
        Tz::Offset: fmt::Display,
    {
        let mut out = String::new();
        // Formats are validated at load time; fall back rather than panic.
        if write!(out, "{}", now.format(&self.timestamp_format)).is_err() {
            out = now.to_rfc3339();
        }
        out
    }
}
