//! spiping-linux-gpio - Linux GPIO support for spiping
//!
//! This crate drives SPI-related lines through the Linux GPIO character
//! device interface (gpiocdev):
//!
//! - `GpioChipSelect`: a software chip select line for the engine, used when
//!   the SPI controller must not touch CS itself
//! - `LinuxGpioPins`: four bitbanged lines for the portable bitbang
//!   transport, for boards without a spidev controller
//!
//! # Example
//!
//! ```no_run
//! use spiping_core::engine::Engine;
//! use spiping_core::profile::LOOPBACK;
//! use spiping_linux_gpio::{GpioChipSelect, GpioChipSelectConfig};
//! use spiping_linux_gpio::{open_bitbang, LinuxGpioPinsConfig};
//!
//! let cs = GpioChipSelect::open(&GpioChipSelectConfig::new("/dev/gpiochip0", 8))?;
//! //                                                   device          CS
//! let bus = open_bitbang(&LinuxGpioPinsConfig::new("/dev/gpiochip0", 7, 11, 10, 9))?;
//! //                                              device          CS SCK MOSI MISO
//!
//! let mut engine = Engine::with_chip_select(
//!     LOOPBACK.config,
//!     bus,
//!     cs,
//!     LOOPBACK.message,
//!     LOOPBACK.policy,
//! )?;
//! println!("passed: {}", engine.run_once().passed());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # Usage with the spiping CLI
//!
//! ```bash
//! # spidev bus with chip select on GPIO 8 of gpiochip0
//! spiping run -t linux_spi:dev=/dev/spidev0.0 --cs software --cs-gpio gpiochip=0,cs=8
//!
//! # Fully bitbanged bus, CS driven by the bitbang transport
//! spiping run -t linux_gpio_spi:gpiochip=0,cs=8,sck=11,mosi=10,miso=9 --cs hardware
//! ```
//!
//! # System Requirements
//!
//! - Linux kernel 4.8+ with GPIO character device support (kernel 5.5+ for v2 API)
//! - Access to `/dev/gpiochipN` devices (may require root or udev rules)

pub mod bitbang;
pub mod chip_select;
pub mod error;
mod options;

// Re-exports
pub use bitbang::{open_bitbang, parse_spi_options, LinuxGpioPins, LinuxGpioPinsConfig};
pub use chip_select::{parse_cs_options, GpioChipSelect, GpioChipSelectConfig};
pub use error::{LinuxGpioError, Result};

use spiping_core::transport::{BusTransport, ChipSelect};

/// Open a GPIO chip select line and return it boxed
///
/// This is a convenience function for the CLI `--cs-gpio` option.
///
/// # Options
///
/// - `dev=/dev/gpiochip0` - GPIO chip device path (or use gpiochip=N)
/// - `gpiochip=0` - GPIO chip number (alternative to dev)
/// - `cs=8` - CS line offset (required)
/// - `active_high=1` - Select by driving the line high (optional)
pub fn open_gpio_chip_select(
    options: &[(&str, &str)],
) -> std::result::Result<Box<dyn ChipSelect + Send>, Box<dyn std::error::Error>> {
    let config = parse_cs_options(options)?;
    let cs = GpioChipSelect::open(&config)?;
    Ok(Box::new(cs))
}

/// Open a GPIO bitbang bus and return a boxed `BusTransport`
///
/// This is a convenience function for the CLI transport dispatch.
///
/// # Options
///
/// - `dev=/dev/gpiochip0` - GPIO chip device path (or use gpiochip=N)
/// - `gpiochip=0` - GPIO chip number (alternative to dev)
/// - `cs=25`, `sck=11`, `mosi=10`, `miso=9` - Line offsets (required)
/// - `spispeed=100` - Clock ceiling in kHz (optional)
pub fn open_linux_gpio_spi(
    options: &[(&str, &str)],
) -> std::result::Result<Box<dyn BusTransport + Send>, Box<dyn std::error::Error>> {
    let config = parse_spi_options(options)?;
    let bus = open_bitbang(&config)?;
    Ok(Box::new(bus))
}
