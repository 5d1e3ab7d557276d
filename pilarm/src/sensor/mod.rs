//! Door switch inputs.
//!
//! Exactly one producer writes the current [`DoorState`] into a
//! `watch` channel: the [`SensorSampler`] on real hardware, or the
//! [`ManualOverride`] in development mode. The alarm monitor reads the latest
//! value once per tick; no history is kept.

mod manual;
mod sampler;

use strum::Display;

use crate::gpio::PinValue;

pub use manual::ManualOverride;
pub use sampler::SensorSampler;

/// Whether the door is open or closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display)]
#[strum(serialize_all = "lowercase")]
pub enum DoorState {
    #[default]
    Closed,
    Open,
}

impl DoorState {
    pub fn is_open(self) -> bool {
        matches!(self, DoorState::Open)
    }

    pub fn toggled(self) -> Self {
        match self {
            DoorState::Closed => DoorState::Open,
            DoorState::Open => DoorState::Closed,
        }
    }
}

/// Which pin level means "open".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Polarity {
    /// Switch pulls the line low when the door opens (pull-up wiring).
    ActiveLow,
    ActiveHigh,
}

impl Polarity {
    pub fn from_active_low(active_low: bool) -> Self {
        if active_low {
            Polarity::ActiveLow
        } else {
            Polarity::ActiveHigh
        }
    }

    pub fn decode(self, value: PinValue) -> DoorState {
        match (self, value) {
            (Polarity::ActiveLow, PinValue::Low) | (Polarity::ActiveHigh, PinValue::High) => {
                DoorState::Open
            }
            _ => DoorState::Closed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn active_low_reads_low_as_open() {
        assert_eq!(Polarity::ActiveLow.decode(PinValue::Low), DoorState::Open);
        assert_eq!(Polarity::ActiveLow.decode(PinValue::High), DoorState::Closed);
    }

    #[test]
    fn active_high_reads_high_as_open() {
        assert_eq!(Polarity::ActiveHigh.decode(PinValue::High), DoorState::Open);
        assert_eq!(Polarity::ActiveHigh.decode(PinValue::Low), DoorState::Closed);
    }

    #[test]
    fn toggle_flips_state() {
        assert_eq!(DoorState::Closed.toggled(), DoorState::Open);
        assert_eq!(DoorState::Open.toggled(), DoorState::Closed);
        assert!(!DoorState::default().is_open());
    }
}
