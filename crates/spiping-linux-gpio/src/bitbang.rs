//! Linux GPIO bitbang pins
//!
//! `LinuxGpioPins` implements the core `BitbangPins` trait on four GPIO
//! lines (CS, SCK, MOSI, MISO) so the portable `BitbangTransport` can run
//! SPI on boards without a usable spidev controller.

use crate::error::{LinuxGpioError, Result};
use crate::options::{parse_line, ChipOption};

use gpiocdev::line::{Offset, Value};
use gpiocdev::request::{Config, Request};

use spiping_core::transport::{BitbangPins, BitbangTransport};

/// GPIO line indices
#[derive(Debug, Clone, Copy)]
enum Line {
    Cs = 0,
    Sck = 1,
    Mosi = 2,
    Miso = 3,
}

/// Number of GPIO lines we use
const NUM_LINES: usize = 4;

/// Default half-period delay in nanoseconds (for ~100 kHz SPI clock)
const DEFAULT_HALF_PERIOD_NS: u64 = 5000;

/// Half period in nanoseconds for a clock of `hz`
fn half_period_ns(hz: u32) -> u64 {
    500_000_000 / u64::from(hz.max(1))
}

/// Configuration for opening GPIO bitbang pins
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinuxGpioPinsConfig {
    /// Device path (e.g., "/dev/gpiochip0")
    pub device: String,
    /// CS (Chip Select) GPIO line offset
    pub cs: Offset,
    /// SCK (Clock) GPIO line offset
    pub sck: Offset,
    /// MOSI (Master Out Slave In) GPIO line offset
    pub mosi: Offset,
    /// MISO (Master In Slave Out) GPIO line offset
    pub miso: Offset,
    /// Fastest clock the pins will be driven at, in Hz
    pub max_speed_hz: Option<u32>,
}

impl LinuxGpioPinsConfig {
    /// Create a new configuration with the given device path and pins
    pub fn new(
        device: impl Into<String>,
        cs: Offset,
        sck: Offset,
        mosi: Offset,
        miso: Offset,
    ) -> Self {
        Self {
            device: device.into(),
            cs,
            sck,
            mosi,
            miso,
            max_speed_hz: None,
        }
    }

    /// Cap the SPI clock (approximate, via half-period calculation)
    pub fn with_max_speed_hz(mut self, hz: u32) -> Self {
        self.max_speed_hz = Some(hz);
        self
    }

    fn offsets(&self) -> [Offset; NUM_LINES] {
        let mut offsets = [0; NUM_LINES];
        offsets[Line::Cs as usize] = self.cs;
        offsets[Line::Sck as usize] = self.sck;
        offsets[Line::Mosi as usize] = self.mosi;
        offsets[Line::Miso as usize] = self.miso;
        offsets
    }

    fn check_distinct(&self) -> Result<()> {
        let offsets = self.offsets();
        for (i, a) in offsets.iter().enumerate() {
            if offsets[i + 1..].contains(a) {
                return Err(LinuxGpioError::DuplicateLine(*a));
            }
        }
        Ok(())
    }
}

/// SPI lines driven through the GPIO character device
pub struct LinuxGpioPins {
    /// GPIO line request handle
    request: Request,
    /// GPIO line offsets indexed by Line enum
    offsets: [Offset; NUM_LINES],
    /// Half-period delay in nanoseconds
    half_period_ns: u64,
    /// Lower bound on the half period from the configured clock cap
    min_half_period_ns: u64,
}

impl LinuxGpioPins {
    /// Request the four lines with CS high, SCK and MOSI low
    pub fn open(config: &LinuxGpioPinsConfig) -> Result<Self> {
        if config.device.is_empty() {
            return Err(LinuxGpioError::NoDevice);
        }
        config.check_distinct()?;

        log::debug!("linux_gpio_spi: Opening device {}", config.device);

        let mut req_config = Config::default();
        req_config.with_line(config.cs).as_output(Value::Active); // CS starts high (inactive)
        req_config.with_line(config.sck).as_output(Value::Inactive);
        req_config.with_line(config.mosi).as_output(Value::Inactive);
        req_config.with_line(config.miso).as_input();

        let request = Request::from_config(req_config)
            .on_chip(&config.device)
            .with_consumer("spiping")
            .request()
            .map_err(|source| LinuxGpioError::LineRequestFailed {
                path: config.device.clone(),
                source,
            })?;

        log::info!(
            "linux_gpio_spi: Opened {} (cs={}, sck={}, mosi={}, miso={})",
            config.device,
            config.cs,
            config.sck,
            config.mosi,
            config.miso
        );

        let min_half_period_ns = config.max_speed_hz.map(half_period_ns).unwrap_or(0);

        Ok(Self {
            request,
            offsets: config.offsets(),
            half_period_ns: DEFAULT_HALF_PERIOD_NS.max(min_half_period_ns),
            min_half_period_ns,
        })
    }

    /// Current half-period delay in nanoseconds
    pub fn half_period(&self) -> u64 {
        self.half_period_ns
    }

    fn set_line(&self, line: Line, high: bool) {
        let value = if high { Value::Active } else { Value::Inactive };
        if let Err(e) = self.request.set_value(self.offsets[line as usize], value) {
            log::error!("Failed to set {:?}: {}", line, e);
        }
    }
}

impl BitbangPins for LinuxGpioPins {
    fn set_cs(&mut self, active: bool) {
        // CS is active low
        self.set_line(Line::Cs, !active);
    }

    fn set_sck(&mut self, high: bool) {
        self.set_line(Line::Sck, high);
    }

    fn set_mosi(&mut self, high: bool) {
        self.set_line(Line::Mosi, high);
    }

    fn get_miso(&self) -> bool {
        match self.request.value(self.offsets[Line::Miso as usize]) {
            Ok(Value::Active) => true,
            Ok(Value::Inactive) => false,
            Err(e) => {
                log::error!("Failed to get MISO: {}", e);
                false
            }
        }
    }

    fn half_period_delay(&self) {
        if self.half_period_ns > 0 {
            std::thread::sleep(std::time::Duration::from_nanos(self.half_period_ns));
        }
    }

    fn set_frequency(&mut self, hz: u32) {
        let ns = half_period_ns(hz).max(self.min_half_period_ns);
        if ns != self.half_period_ns {
            log::debug!("linux_gpio_spi: half period {} ns", ns);
            self.half_period_ns = ns;
        }
    }
}

/// Parse bitbang options from a list of key-value pairs
///
/// # Supported Options
///
/// - `dev=/dev/gpiochipN` - GPIO chip device path (required, or use gpiochip)
/// - `gpiochip=N` - GPIO chip number (alternative to dev)
/// - `cs=N` - CS (chip select) GPIO line offset (required)
/// - `sck=N` - SCK (clock) GPIO line offset (required)
/// - `mosi=N` - MOSI GPIO line offset (required)
/// - `miso=N` - MISO GPIO line offset (required)
/// - `spispeed=N` - Clock ceiling in kHz (optional)
pub fn parse_spi_options(options: &[(&str, &str)]) -> Result<LinuxGpioPinsConfig> {
    let mut chip = ChipOption::default();
    let mut cs = None;
    let mut sck = None;
    let mut mosi = None;
    let mut miso = None;
    let mut max_speed_hz = None;

    for (key, value) in options {
        if chip.accept(key, value)? {
            continue;
        }
        match *key {
            "cs" => cs = Some(parse_line("cs", value)?),
            "sck" => sck = Some(parse_line("sck", value)?),
            "mosi" => mosi = Some(parse_line("mosi", value)?),
            "miso" => miso = Some(parse_line("miso", value)?),
            "spispeed" => {
                let speed_khz = value
                    .parse::<u32>()
                    .ok()
                    .filter(|&khz| khz > 0)
                    .ok_or_else(|| {
                        LinuxGpioError::InvalidParameter(format!("spispeed value: {}", value))
                    })?;
                max_speed_hz = Some(speed_khz.saturating_mul(1000));
            }
            _ => log::warn!("linux_gpio_spi: Unknown option: {}={}", key, value),
        }
    }

    let device = chip.device()?;
    let mut config = LinuxGpioPinsConfig::new(
        device,
        cs.ok_or(LinuxGpioError::MissingParameter("cs"))?,
        sck.ok_or(LinuxGpioError::MissingParameter("sck"))?,
        mosi.ok_or(LinuxGpioError::MissingParameter("mosi"))?,
        miso.ok_or(LinuxGpioError::MissingParameter("miso"))?,
    );
    config.max_speed_hz = max_speed_hz;
    config.check_distinct()?;

    Ok(config)
}

/// Open GPIO pins and wrap them in a bitbang transport
pub fn open_bitbang(config: &LinuxGpioPinsConfig) -> Result<BitbangTransport<LinuxGpioPins>> {
    Ok(BitbangTransport::new(LinuxGpioPins::open(config)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_half_period() {
        assert_eq!(half_period_ns(100_000), 5000);
        assert_eq!(half_period_ns(1_000_000), 500);
        assert_eq!(half_period_ns(0), 500_000_000);
    }

    #[test]
    fn test_parse_spi_options() {
        let config = parse_spi_options(&[
            ("gpiochip", "0"),
            ("cs", "25"),
            ("sck", "11"),
            ("mosi", "10"),
            ("miso", "9"),
            ("spispeed", "500"),
        ])
        .unwrap();
        assert_eq!(
            config,
            LinuxGpioPinsConfig::new("/dev/gpiochip0", 25, 11, 10, 9).with_max_speed_hz(500_000)
        );
    }

    #[test]
    fn test_parse_spi_options_errors() {
        assert!(matches!(
            parse_spi_options(&[("gpiochip", "0"), ("cs", "25"), ("sck", "11"), ("mosi", "10")]),
            Err(LinuxGpioError::MissingParameter("miso"))
        ));
        assert!(matches!(
            parse_spi_options(&[
                ("gpiochip", "0"),
                ("cs", "25"),
                ("sck", "11"),
                ("mosi", "10"),
                ("miso", "10"),
            ]),
            Err(LinuxGpioError::DuplicateLine(10))
        ));
        assert!(matches!(
            parse_spi_options(&[
                ("gpiochip", "0"),
                ("cs", "25"),
                ("sck", "11"),
                ("mosi", "10"),
                ("miso", "9"),
                ("spispeed", "0"),
            ]),
            Err(LinuxGpioError::InvalidParameter(_))
        ));
    }
}
