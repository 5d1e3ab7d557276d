//! GPIO abstraction.
//!
//! The door switch and the optional status light sit on plain GPIO lines.
//! Workers talk to them through [`GpioPin`] so tests can swap in fakes.

pub mod sysfs;

use async_trait::async_trait;

use crate::error::GpioError;

pub use sysfs::{SysfsGpio, SysfsGpioPin};

pub type Result<T> = std::result::Result<T, GpioError>;

/// Direction of a GPIO line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinMode {
    Input,
    Output,
}

/// Logic level of a GPIO line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinValue {
    Low,
    High,
}

impl From<bool> for PinValue {
    fn from(high: bool) -> Self {
        if high { PinValue::High } else { PinValue::Low }
    }
}

impl From<PinValue> for u8 {
    fn from(value: PinValue) -> Self {
        match value {
            PinValue::Low => 0,
            PinValue::High => 1,
        }
    }
}

/// A GPIO controller that hands out pins by number.
#[async_trait]
pub trait Gpio {
    type Pin: GpioPin;

    /// Claim a pin and put it in the given mode.
    async fn pin(&mut self, number: u32, mode: PinMode) -> Result<Self::Pin>;
}

/// A single GPIO line.
#[async_trait]
pub trait GpioPin: Send {
    /// Line number as the kernel knows it.
    fn line(&self) -> u32;

    async fn read(&mut self) -> Result<PinValue>;

    async fn write(&mut self, value: PinValue) -> Result<()>;
}
