//! Wires the workers together and runs them until shutdown.
//!
//! Startup is all-or-nothing: the notification channel is resolved, signal
//! handlers are installed and GPIO lines are claimed before any worker is
//! spawned, so a [`StartupError`] never leaves tasks behind.

use std::sync::Arc;

use tokio::io::BufReader;
use tokio::sync::watch;

use crate::alarm::{AlarmMonitor, AlarmState};
use crate::config::{Config, LightPins};
use crate::error::StartupError;
use crate::gpio::{Gpio, GpioPin, PinMode, SysfsGpio, SysfsGpioPin};
use crate::notify::{Notifier, SlackClient};
use crate::sensor::{DoorState, ManualOverride, SensorSampler};
use crate::shutdown::{Shutdown, ShutdownOutcome, SignalListener};
use crate::status_light::StatusLight;
use crate::tracing::prelude::*;

/// Where door readings come from.
enum DoorInput {
    Switch(SysfsGpioPin),
    Keyboard,
    Disabled,
}

pub struct Daemon {
    config: Config,
    shutdown: Shutdown,
}

impl Daemon {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            shutdown: Shutdown::new(),
        }
    }

    /// Handle for requesting shutdown from outside the daemon.
    pub fn shutdown_handle(&self) -> Shutdown {
        self.shutdown.clone()
    }

    /// Start every worker and wait until shutdown completes.
    pub async fn run(self) -> Result<ShutdownOutcome, StartupError> {
        let Self { config, shutdown } = self;

        let slack = SlackClient::new(&config.slack).map_err(StartupError::Channel)?;
        let channel_id = slack
            .resolve_channel(&config.slack.channel)
            .await
            .map_err(StartupError::Channel)?;
        info!(
            channel = %config.slack.channel,
            id = %channel_id,
            "Resolved notification channel"
        );

        let signals = SignalListener::install().map_err(StartupError::Signals)?;

        let mut gpio = SysfsGpio::new(&config.gpio.sysfs_root, config.gpio.offset);
        let input = if config.dev_mode {
            DoorInput::Keyboard
        } else if config.disable_gpio {
            DoorInput::Disabled
        } else {
            DoorInput::Switch(gpio.pin(config.switch.pin, PinMode::Input).await?)
        };
        let light = match config.status_light {
            Some(pins) => Some(light_pins(&mut gpio, pins).await?),
            None => None,
        };

        let (door_tx, door_rx) = watch::channel(DoorState::Closed);
        let (state_tx, state_rx) = watch::channel(AlarmState::Idle);

        match input {
            DoorInput::Switch(pin) => {
                info!(pin = pin.line(), "Reading door switch");
                let sampler = SensorSampler::new(
                    pin,
                    config.switch.polarity,
                    config.timings.sample_interval,
                    door_tx,
                );
                shutdown.spawn_worker("switch", sampler.run(shutdown.token()));
            }
            DoorInput::Keyboard => {
                info!("Development mode: press enter to toggle the door, type exit to quit");
                let keyboard = ManualOverride::new(BufReader::new(tokio::io::stdin()), door_tx);
                shutdown.spawn_worker("keyboard", keyboard.run(shutdown.clone()));
            }
            DoorInput::Disabled => {
                warn!("GPIO disabled and not in development mode; the door will always read closed");
            }
        }

        if let Some([red, green, blue]) = light {
            let light = StatusLight::new(red, green, blue, state_rx);
            shutdown.spawn_worker("status-light", light.run(shutdown.token()));
        }

        let notifier = Notifier::new(
            Arc::new(slack),
            channel_id,
            config.templates.clone(),
            shutdown.dispatches(),
        );
        let monitor = AlarmMonitor::new(
            config.alarm,
            config.timings.tick_interval,
            door_rx,
            state_tx,
            notifier,
        );
        shutdown.spawn_worker("alarm", monitor.run(shutdown.token()));
        shutdown.spawn_worker("signals", signals.run(shutdown.clone()));

        info!("Door monitor running");
        shutdown.requested().await;

        Ok(shutdown
            .await_all_stopped(
                config.timings.shutdown_timeout,
                config.timings.notification_grace,
            )
            .await)
    }
}

async fn light_pins(
    gpio: &mut SysfsGpio,
    pins: LightPins,
) -> Result<[SysfsGpioPin; 3], StartupError> {
    Ok([
        gpio.pin(pins.red, PinMode::Output).await?,
        gpio.pin(pins.green, PinMode::Output).await?,
        gpio.pin(pins.blue, PinMode::Output).await?,
    ])
}
