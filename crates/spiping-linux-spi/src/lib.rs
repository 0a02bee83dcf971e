//! spiping-linux-spi - Linux spidev bus transport
//!
//! This crate drives an SPI controller through the Linux spidev character
//! device interface at `/dev/spidevX.Y`, where X is the bus number and Y is
//! the chip select.
//!
//! # Example
//!
//! ```no_run
//! use spiping_core::transport::BusTransport;
//! use spiping_core::TransactionConfig;
//! use spiping_linux_spi::{LinuxSpi, LinuxSpiConfig};
//!
//! let config = LinuxSpiConfig::new("/dev/spidev0.0").with_max_speed(4_000_000);
//! let mut spi = LinuxSpi::open(&config)?;
//!
//! let tx = *b"Hello from nRF";
//! let mut rx = [0u8; 14];
//! spi.transceive(&TransactionConfig::new(), &tx, &mut rx)
//!     .map_err(|code| format!("transfer failed: {}", code))?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # Usage with the spiping CLI
//!
//! ```bash
//! # Loopback test with MOSI wired to MISO, CS left to the controller
//! spiping run -t linux_spi:dev=/dev/spidev0.0 --mode loopback --cs hardware
//!
//! # Loopback test with CS on GPIO 8 of gpiochip0
//! spiping run -t linux_spi:dev=/dev/spidev0.0 --cs-gpio gpiochip=0,cs=8
//!
//! # Cap the clock at 500 kHz
//! spiping run -t linux_spi:dev=/dev/spidev0.0,spispeed=500 --mode peer
//! ```
//!
//! # System Requirements
//!
//! - Linux kernel with spidev support enabled (`CONFIG_SPI_SPIDEV`)
//! - Read/write access to `/dev/spidevX.Y` device
//! - Controllers must support `SPI_NO_CS` when chip select is driven by a
//!   separate GPIO line

pub mod device;
pub mod error;

// Re-exports
pub use device::{mode, mode_bits, parse_options, LinuxSpi, LinuxSpiConfig};
pub use error::{LinuxSpiError, Result};

use spiping_core::transport::BusTransport;

/// Open a Linux SPI device and return a boxed `BusTransport`
///
/// This is a convenience function for the CLI transport dispatch.
///
/// # Options
///
/// - `dev=/dev/spidev0.0` - Required: device path
/// - `spispeed=4000` - Optional: clock ceiling in kHz (default: 2000)
/// - `mode=0` - Optional: SPI mode 0-3 programmed at open (default: 0)
pub fn open_linux_spi(
    options: &[(&str, &str)],
) -> std::result::Result<Box<dyn BusTransport + Send>, Box<dyn std::error::Error>> {
    let config = parse_options(options)?;
    let spi = LinuxSpi::open(&config)?;
    Ok(Box::new(spi))
}
