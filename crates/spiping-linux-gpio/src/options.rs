//! Helpers shared by the option parsers

use crate::error::{LinuxGpioError, Result};

use gpiocdev::line::Offset;

/// Highest `gpiochip=N` accepted
const MAX_GPIOCHIP: u32 = 9;

/// Chip device selection collected from `dev=` / `gpiochip=`
#[derive(Debug, Default)]
pub(crate) struct ChipOption {
    dev: Option<String>,
    gpiochip: Option<u32>,
}

impl ChipOption {
    /// Consume `dev` or `gpiochip`; returns false for other keys
    pub(crate) fn accept(&mut self, key: &str, value: &str) -> Result<bool> {
        match key {
            "dev" => self.dev = Some(value.to_string()),
            "gpiochip" => {
                let n = value.parse().map_err(|_| {
                    LinuxGpioError::InvalidParameter(format!("gpiochip value: {}", value))
                })?;
                self.gpiochip = Some(n);
            }
            _ => return Ok(false),
        }
        Ok(true)
    }

    /// Resolve to a device path
    pub(crate) fn device(self) -> Result<String> {
        match (self.dev, self.gpiochip) {
            (Some(_), Some(_)) => Err(LinuxGpioError::ConflictingDevice),
            (Some(dev), None) if !dev.is_empty() => Ok(dev),
            (None, Some(n)) if n <= MAX_GPIOCHIP => Ok(format!("/dev/gpiochip{}", n)),
            (None, Some(n)) => Err(LinuxGpioError::InvalidParameter(format!(
                "gpiochip {} (maximum is {})",
                n, MAX_GPIOCHIP
            ))),
            _ => Err(LinuxGpioError::NoDevice),
        }
    }
}

/// Parse a GPIO line offset
pub(crate) fn parse_line(name: &'static str, value: &str) -> Result<Offset> {
    value
        .parse()
        .map_err(|_| LinuxGpioError::InvalidLineNumber {
            name,
            value: value.to_string(),
        })
}

/// Parse a boolean option (`1`/`0`, `true`/`false`, `yes`/`no`)
pub(crate) fn parse_bool(name: &str, value: &str) -> Result<bool> {
    match value {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(LinuxGpioError::InvalidParameter(format!(
            "{} value: {}",
            name, value
        ))),
    }
}
