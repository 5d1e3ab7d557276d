use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlarmConfig {
    /// How long the door must stay open before the first alert. Shorter opens
    /// are treated as transient and produce no notification.
    pub first_alert_delay: Duration,

    /// How long the door must stay open before the overtime alert. Never
    /// shorter than `first_alert_delay`.
    pub overtime_delay: Duration,
}

impl Default for AlarmConfig {
    fn default() -> Self {
        Self {
            first_alert_delay: Duration::from_secs(3),
            overtime_delay: Duration::from_secs(8),
        }
    }
}
