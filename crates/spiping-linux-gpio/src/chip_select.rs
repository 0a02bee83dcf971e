//! GPIO chip select line
//!
//! Drives a single output line through the GPIO character device. The line
//! is requested at its idle level so the first cycle starts deasserted.
//! Toggle errors are logged and otherwise dropped: the chip select interface
//! is infallible, and a stuck line shows up as a failed or garbled transfer.

use crate::error::{LinuxGpioError, Result};
use crate::options::{parse_bool, parse_line, ChipOption};

use gpiocdev::line::{Offset, Value};
use gpiocdev::request::{Config, Request};

use spiping_core::transport::ChipSelect;

/// Configuration for a GPIO chip select line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GpioChipSelectConfig {
    /// Device path (e.g., "/dev/gpiochip0")
    pub device: String,
    /// CS GPIO line offset
    pub cs: Offset,
    /// Line is driven high to select (default: active low)
    pub active_high: bool,
}

impl GpioChipSelectConfig {
    /// Create an active-low configuration
    pub fn new(device: impl Into<String>, cs: Offset) -> Self {
        Self {
            device: device.into(),
            cs,
            active_high: false,
        }
    }

    /// Select the active level
    pub fn with_active_high(mut self, active_high: bool) -> Self {
        self.active_high = active_high;
        self
    }
}

/// Physical line value for a CS state
fn level(active_high: bool, asserted: bool) -> Value {
    if active_high == asserted {
        Value::Active
    } else {
        Value::Inactive
    }
}

/// Chip select on a Linux GPIO line
pub struct GpioChipSelect {
    request: Request,
    offset: Offset,
    active_high: bool,
    asserted: bool,
}

impl GpioChipSelect {
    /// Request the line, initially deasserted
    pub fn open(config: &GpioChipSelectConfig) -> Result<Self> {
        if config.device.is_empty() {
            return Err(LinuxGpioError::NoDevice);
        }

        log::debug!(
            "linux_gpio_cs: Requesting line {} on {}",
            config.cs,
            config.device
        );

        let mut req_config = Config::default();
        req_config
            .with_line(config.cs)
            .as_output(level(config.active_high, false));

        let request = Request::from_config(req_config)
            .on_chip(&config.device)
            .with_consumer("spiping-cs")
            .request()
            .map_err(|source| LinuxGpioError::LineRequestFailed {
                path: config.device.clone(),
                source,
            })?;

        log::info!(
            "linux_gpio_cs: Opened {} (cs={}, active {})",
            config.device,
            config.cs,
            if config.active_high { "high" } else { "low" }
        );

        Ok(Self {
            request,
            offset: config.cs,
            active_high: config.active_high,
            asserted: false,
        })
    }

    /// Whether the line is currently driven active
    pub fn is_asserted(&self) -> bool {
        self.asserted
    }

    fn drive(&mut self, asserted: bool) {
        let value = level(self.active_high, asserted);
        if let Err(e) = self.request.set_value(self.offset, value) {
            log::error!("linux_gpio_cs: Failed to set CS line {}: {}", self.offset, e);
            return;
        }
        self.asserted = asserted;
    }
}

impl ChipSelect for GpioChipSelect {
    fn assert(&mut self) {
        self.drive(true);
    }

    fn deassert(&mut self) {
        self.drive(false);
    }
}

impl Drop for GpioChipSelect {
    fn drop(&mut self) {
        if self.asserted {
            self.drive(false);
        }
    }
}

/// Parse chip select options from a list of key-value pairs
///
/// # Supported Options
///
/// - `dev=/dev/gpiochipN` - GPIO chip device path (required, or use gpiochip)
/// - `gpiochip=N` - GPIO chip number (alternative to dev)
/// - `cs=N` - CS GPIO line offset (required)
/// - `active_high=1` - Drive the line high to select (optional, default 0)
pub fn parse_cs_options(options: &[(&str, &str)]) -> Result<GpioChipSelectConfig> {
    let mut chip = ChipOption::default();
    let mut cs = None;
    let mut active_high = false;

    for (key, value) in options {
        if chip.accept(key, value)? {
            continue;
        }
        match *key {
            "cs" => cs = Some(parse_line("cs", value)?),
            "active_high" => active_high = parse_bool(key, value)?,
            _ => log::warn!("linux_gpio_cs: Unknown option: {}={}", key, value),
        }
    }

    let device = chip.device()?;
    let cs = cs.ok_or(LinuxGpioError::MissingParameter("cs"))?;

    Ok(GpioChipSelectConfig::new(device, cs).with_active_high(active_high))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level() {
        // Active low: selected = physical low
        assert_eq!(level(false, true), Value::Inactive);
        assert_eq!(level(false, false), Value::Active);
        assert_eq!(level(true, true), Value::Active);
        assert_eq!(level(true, false), Value::Inactive);
    }

    #[test]
    fn test_parse_cs_options() {
        let config = parse_cs_options(&[("gpiochip", "0"), ("cs", "8")]).unwrap();
        assert_eq!(config, GpioChipSelectConfig::new("/dev/gpiochip0", 8));

        let config =
            parse_cs_options(&[("dev", "/dev/gpiochip1"), ("cs", "3"), ("active_high", "1")])
                .unwrap();
        assert_eq!(config.device, "/dev/gpiochip1");
        assert!(config.active_high);
    }

    #[test]
    fn test_parse_cs_options_errors() {
        assert!(matches!(
            parse_cs_options(&[("gpiochip", "0")]),
            Err(LinuxGpioError::MissingParameter("cs"))
        ));
        assert!(matches!(
            parse_cs_options(&[("cs", "8")]),
            Err(LinuxGpioError::NoDevice)
        ));
        assert!(matches!(
            parse_cs_options(&[("gpiochip", "0"), ("cs", "x")]),
            Err(LinuxGpioError::InvalidLineNumber { .. })
        ));
    }

    #[test]
    fn test_open_missing_chip() {
        let config = GpioChipSelectConfig::new("/nonexistent/gpiochip9", 1);
        assert!(matches!(
            GpioChipSelect::open(&config),
            Err(LinuxGpioError::LineRequestFailed { .. })
        ));
    }
}
