//! RGB status light mirroring the alarm state.

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::alarm::AlarmState;
use crate::gpio::{GpioPin, PinValue};
use crate::tracing::prelude::*;

/// Which of the three channels are lit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color {
    pub red: bool,
    pub green: bool,
    pub blue: bool,
}

impl Color {
    pub const OFF: Self = Self::rgb(false, false, false);
    pub const GREEN: Self = Self::rgb(false, true, false);
    pub const BLUE: Self = Self::rgb(false, false, true);
    pub const YELLOW: Self = Self::rgb(true, true, false);
    pub const RED: Self = Self::rgb(true, false, false);

    const fn rgb(red: bool, green: bool, blue: bool) -> Self {
        Self { red, green, blue }
    }

    pub fn for_state(state: AlarmState) -> Self {
        match state {
            AlarmState::Idle => Self::GREEN,
            AlarmState::OpenPending => Self::BLUE,
            AlarmState::Alerted => Self::YELLOW,
            AlarmState::Overtime => Self::RED,
        }
    }
}

pub struct StatusLight<P> {
    red: P,
    green: P,
    blue: P,
    state_rx: watch::Receiver<AlarmState>,
}

impl<P: GpioPin> StatusLight<P> {
    pub fn new(red: P, green: P, blue: P, state_rx: watch::Receiver<AlarmState>) -> Self {
        Self {
            red,
            green,
            blue,
            state_rx,
        }
    }

    pub async fn run(mut self, shutdown: CancellationToken) {
        let initial = *self.state_rx.borrow_and_update();
        self.show(Color::for_state(initial)).await;

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    break;
                }
                changed = self.state_rx.changed() => {
                    if changed.is_err() {
                        debug!("Alarm state channel closed");
                        break;
                    }
                    let state = *self.state_rx.borrow_and_update();
                    self.show(Color::for_state(state)).await;
                }
            }
        }

        self.show(Color::OFF).await;
        info!("Status light task shutting down");
    }

    async fn show(&mut self, color: Color) {
        let channels = [
            (&mut self.red, color.red),
            (&mut self.green, color.green),
            (&mut self.blue, color.blue),
        ];
        for (pin, on) in channels {
            if let Err(e) = pin.write(PinValue::from(on)).await {
                warn!(error = %e, "Failed to set status light");
            }
        }
    }
}
