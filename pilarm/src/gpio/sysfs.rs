//! GPIO through the Linux sysfs interface (`/sys/class/gpio`).
//!
//! Pins are exported on first use. A pin that is already exported (export
//! fails with `EBUSY`) is reused as is.

use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use tokio::{fs, time};

use super::{Gpio, GpioPin, PinMode, PinValue, Result};
use crate::error::GpioError;
use crate::tracing::prelude::*;

/// How long to wait for udev to create the pin directory after export.
const EXPORT_SETTLE_TIMEOUT: Duration = Duration::from_millis(500);
const EXPORT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// GPIO controller backed by sysfs.
#[derive(Debug, Clone)]
pub struct SysfsGpio {
    root: PathBuf,
    /// Added to every pin number. Newer kernels number the header pins from
    /// a non-zero chip base.
    offset: u32,
}

impl SysfsGpio {
    pub fn new(root: impl Into<PathBuf>, offset: u32) -> Self {
        Self {
            root: root.into(),
            offset,
        }
    }

    async fn export(&self, line: u32) -> Result<PathBuf> {
        let dir = self.root.join(format!("gpio{line}"));
        if fs::try_exists(&dir).await.unwrap_or(false) {
            return Ok(dir);
        }

        debug!(line, "Exporting gpio");
        match fs::write(self.root.join("export"), line.to_string()).await {
            Ok(()) => {}
            Err(e) if is_already_exported(&e) => {}
            Err(source) => return Err(GpioError::Io { pin: line, source }),
        }

        let settle = async {
            while !fs::try_exists(&dir).await.unwrap_or(false) {
                time::sleep(EXPORT_POLL_INTERVAL).await;
            }
        };
        time::timeout(EXPORT_SETTLE_TIMEOUT, settle)
            .await
            .map_err(|_| GpioError::NotExported { pin: line })?;

        Ok(dir)
    }
}

#[async_trait]
impl Gpio for SysfsGpio {
    type Pin = SysfsGpioPin;

    async fn pin(&mut self, number: u32, mode: PinMode) -> Result<Self::Pin> {
        let line = number
            .checked_add(self.offset)
            .ok_or(GpioError::LineOutOfRange {
                pin: number,
                offset: self.offset,
            })?;
        let dir = self.export(line).await?;

        let direction = match mode {
            PinMode::Input => "in",
            PinMode::Output => "out",
        };
        fs::write(dir.join("direction"), direction)
            .await
            .map_err(|source| GpioError::Io { pin: line, source })?;

        Ok(SysfsGpioPin {
            line,
            value_path: dir.join("value"),
        })
    }
}

/// A single exported sysfs GPIO line.
#[derive(Debug)]
pub struct SysfsGpioPin {
    line: u32,
    value_path: PathBuf,
}

impl SysfsGpioPin {
    fn io_error(&self, source: io::Error) -> GpioError {
        GpioError::Io {
            pin: self.line,
            source,
        }
    }
}

#[async_trait]
impl GpioPin for SysfsGpioPin {
    fn line(&self) -> u32 {
        self.line
    }

    async fn read(&mut self) -> Result<PinValue> {
        let raw = fs::read_to_string(&self.value_path)
            .await
            .map_err(|e| self.io_error(e))?;

        parse_value(self.line, &raw)
    }

    async fn write(&mut self, value: PinValue) -> Result<()> {
        fs::write(&self.value_path, u8::from(value).to_string())
            .await
            .map_err(|e| self.io_error(e))
    }
}

fn parse_value(line: u32, raw: &str) -> Result<PinValue> {
    match raw.trim() {
        "0" => Ok(PinValue::Low),
        "1" => Ok(PinValue::High),
        other => Err(GpioError::InvalidValue {
            pin: line,
            value: other.to_string(),
        }),
    }
}

/// The kernel answers EBUSY when the line is exported already.
fn is_already_exported(e: &io::Error) -> bool {
    e.kind() == io::ErrorKind::ResourceBusy
}

/// True if `root` looks like a sysfs GPIO class directory.
pub fn is_available(root: &Path) -> bool {
    root.join("export").exists()
}
