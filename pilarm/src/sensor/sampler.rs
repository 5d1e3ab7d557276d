use std::time::Duration;

use tokio::sync::watch;
use tokio::time;
use tokio_util::sync::CancellationToken;

use super::{DoorState, Polarity};
use crate::error::GpioError;
use crate::gpio::GpioPin;
use crate::tracing::prelude::*;

/// Periodically reads the door switch and publishes its state.
///
/// No debouncing happens here; the alarm thresholds take care of flicker. A
/// failed read leaves the published state untouched for that tick.
pub struct SensorSampler<P> {
    pin: P,
    polarity: Polarity,
    interval: Duration,
    door_tx: watch::Sender<DoorState>,
    consecutive_failures: u64,
}

impl<P: GpioPin> SensorSampler<P> {
    pub fn new(
        pin: P,
        polarity: Polarity,
        interval: Duration,
        door_tx: watch::Sender<DoorState>,
    ) -> Self {
        Self {
            pin,
            polarity,
            interval,
            door_tx,
            consecutive_failures: 0,
        }
    }

    pub async fn run(mut self, shutdown: CancellationToken) {
        debug!(interval_ms = self.interval.as_millis() as u64, "Switch sampler started");
        let mut interval = time::interval(self.interval);
        interval.set_missed_tick_behavior(time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    break;
                }
                _ = interval.tick() => {
                    self.sample().await;
                }
            }
        }

        info!("Switch input task shutting down");
    }

    async fn sample(&mut self) {
        // A read may never take longer than one sampling period.
        let line = self.pin.line();
        let reading = match time::timeout(self.interval, self.pin.read()).await {
            Ok(result) => result,
            Err(_) => Err(GpioError::Timeout { pin: line }),
        };

        match reading {
            Ok(value) => {
                if self.consecutive_failures > 0 {
                    info!(
                        failures = self.consecutive_failures,
                        "Switch reads recovered"
                    );
                    self.consecutive_failures = 0;
                }

                let state = self.polarity.decode(value);
                let changed = self.door_tx.send_if_modified(|current| {
                    if *current == state {
                        false
                    } else {
                        *current = state;
                        true
                    }
                });
                if changed {
                    debug!(door = %state, "Switch state changed");
                }
            }
            Err(e) => {
                self.consecutive_failures += 1;
                if is_report_point(self.consecutive_failures) {
                    warn!(
                        error = %e,
                        failures = self.consecutive_failures,
                        "Failed to read switch; keeping previous state"
                    );
                } else {
                    debug!(error = %e, "Failed to read switch");
                }
            }
        }
    }
}

/// 1, 10, 100, ... so a dead sensor doesn't flood the log.
fn is_report_point(mut n: u64) -> bool {
    while n >= 10 && n % 10 == 0 {
        n /= 10;
    }
    n == 1
}
