//! Linux SPI device implementation
//!
//! This module provides the `LinuxSpi` struct that implements the
//! `BusTransport` trait using Linux's spidev interface.

use crate::error::{LinuxSpiError, Result};

use spiping_core::config::{BitOrder, CsStrategy, TransactionConfig, TransferFlags};
use spiping_core::error::ErrorCode;
use spiping_core::transport::BusTransport;

use std::fs::{File, OpenOptions};
use std::os::unix::io::AsRawFd;

/// Path to kernel spidev buffer size parameter
const BUF_SIZE_SYSFS: &str = "/sys/module/spidev/parameters/bufsiz";

/// Default maximum SPI clock speed in Hz (2 MHz)
const DEFAULT_SPEED_HZ: u32 = 2_000_000;

/// spidev mode bits
pub mod mode {
    /// Clock phase: sample on the trailing edge
    pub const SPI_CPHA: u8 = 0x01;
    /// Clock polarity: clock idles high
    pub const SPI_CPOL: u8 = 0x02;
    /// Least significant bit first
    pub const SPI_LSB_FIRST: u8 = 0x08;
    /// Controller leaves chip select alone
    pub const SPI_NO_CS: u8 = 0x40;
}

/// Linux spidev ioctl constants
mod ioctl {
    use nix::ioctl_write_ptr;

    // SPI ioctl magic number
    const SPI_IOC_MAGIC: u8 = b'k';

    // SPI ioctl type numbers
    const SPI_IOC_TYPE_MODE: u8 = 1;
    const SPI_IOC_TYPE_BITS_PER_WORD: u8 = 3;
    const SPI_IOC_TYPE_MAX_SPEED_HZ: u8 = 4;

    ioctl_write_ptr!(spi_ioc_wr_mode, SPI_IOC_MAGIC, SPI_IOC_TYPE_MODE, u8);
    ioctl_write_ptr!(
        spi_ioc_wr_bits_per_word,
        SPI_IOC_MAGIC,
        SPI_IOC_TYPE_BITS_PER_WORD,
        u8
    );
    ioctl_write_ptr!(
        spi_ioc_wr_max_speed_hz,
        SPI_IOC_MAGIC,
        SPI_IOC_TYPE_MAX_SPEED_HZ,
        u32
    );

    // SPI_IOC_MESSAGE(n) = _IOW(SPI_IOC_MAGIC, 0, char[n * sizeof(struct spi_ioc_transfer)])

    /// Size of struct spi_ioc_transfer
    pub const SPI_IOC_TRANSFER_SIZE: usize = 32;

    /// Calculate ioctl number for SPI_IOC_MESSAGE(n)
    pub fn spi_ioc_message(n: u8) -> libc::c_ulong {
        let size = (n as usize) * SPI_IOC_TRANSFER_SIZE;
        // _IOC(dir, type, nr, size) = ((dir)<<30)|((size)<<16)|((type)<<8)|(nr), _IOC_WRITE = 1
        ((1u32 << 30) | ((size as u32) << 16) | ((SPI_IOC_MAGIC as u32) << 8)) as libc::c_ulong
    }
}

/// SPI transfer structure for ioctl
/// This must match the kernel's struct spi_ioc_transfer layout
#[repr(C)]
#[derive(Debug, Default, Clone)]
struct SpiIocTransfer {
    tx_buf: u64,          // __u64 tx_buf
    rx_buf: u64,          // __u64 rx_buf
    len: u32,             // __u32 len
    speed_hz: u32,        // __u32 speed_hz
    delay_usecs: u16,     // __u16 delay_usecs
    bits_per_word: u8,    // __u8 bits_per_word
    cs_change: u8,        // __u8 cs_change
    tx_nbits: u8,         // __u8 tx_nbits
    rx_nbits: u8,         // __u8 rx_nbits
    word_delay_usecs: u8, // __u8 word_delay_usecs
    _pad: u8,             // padding
}

/// Configuration for opening a Linux SPI device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinuxSpiConfig {
    /// Device path (e.g., "/dev/spidev0.0")
    pub device: String,
    /// Upper bound on the SPI clock in Hz (default: 2 MHz)
    pub max_speed_hz: u32,
    /// SPI mode (0-3) programmed at open, before the first transfer
    pub mode: u8,
}

impl Default for LinuxSpiConfig {
    fn default() -> Self {
        Self {
            device: String::new(),
            max_speed_hz: DEFAULT_SPEED_HZ,
            mode: 0,
        }
    }
}

impl LinuxSpiConfig {
    /// Create a new configuration with the given device path
    pub fn new(device: impl Into<String>) -> Self {
        Self {
            device: device.into(),
            ..Default::default()
        }
    }

    /// Set the maximum SPI clock speed in Hz
    pub fn with_max_speed(mut self, speed_hz: u32) -> Self {
        self.max_speed_hz = speed_hz;
        self
    }

    /// Set the initial SPI mode (0-3)
    pub fn with_mode(mut self, mode: u8) -> Self {
        self.mode = mode;
        self
    }
}

/// spidev mode byte for a transaction configuration
///
/// The controller is told to keep its hands off CS (`SPI_NO_CS`) unless the
/// transaction asks for hardware chip select.
pub fn mode_bits(config: &TransactionConfig) -> u8 {
    let mut bits = 0;
    if config.mode.phase() {
        bits |= mode::SPI_CPHA;
    }
    if config.mode.polarity() {
        bits |= mode::SPI_CPOL;
    }
    if config.bit_order == BitOrder::LsbFirst {
        bits |= mode::SPI_LSB_FIRST;
    }
    if config.cs_strategy != CsStrategy::Hardware {
        bits |= mode::SPI_NO_CS;
    }
    bits
}

fn errno_code(err: &std::io::Error) -> ErrorCode {
    ErrorCode::from_errno(err.raw_os_error().unwrap_or(libc::EIO))
}

/// Linux SPI bus using the spidev interface
///
/// Each `transceive` is a single full-duplex `SPI_IOC_MESSAGE(1)`. The mode
/// byte is reprogrammed whenever the transaction configuration changes it.
pub struct LinuxSpi {
    /// File handle for spidev device
    file: File,
    /// Device path, for logs
    device: String,
    /// Maximum kernel buffer size
    max_kernel_buf_size: usize,
    /// Clock ceiling in Hz
    max_speed_hz: u32,
    /// Mode byte currently programmed
    mode_bits: u8,
    /// Configuration locked by `LOCK_ON`
    locked: Option<TransactionConfig>,
    /// CS left asserted by `HOLD_ON_CS`
    cs_held: bool,
}

impl LinuxSpi {
    /// Open a Linux SPI device with the given configuration
    pub fn open(config: &LinuxSpiConfig) -> Result<Self> {
        if config.device.is_empty() {
            return Err(LinuxSpiError::NoDevice);
        }
        if config.mode > 3 {
            return Err(LinuxSpiError::InvalidParameter(format!(
                "SPI mode {} (must be 0-3)",
                config.mode
            )));
        }

        log::debug!("linux_spi: Opening device {}", config.device);

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&config.device)
            .map_err(|e| LinuxSpiError::OpenFailed {
                path: config.device.clone(),
                source: e,
            })?;

        let fd = file.as_raw_fd();

        let mode = config.mode;
        unsafe {
            ioctl::spi_ioc_wr_mode(fd, &mode).map_err(|e| LinuxSpiError::SetModeFailed {
                mode,
                source: std::io::Error::from_raw_os_error(e as i32),
            })?;
        }

        // Set bits per word (always 8)
        let bits: u8 = 8;
        unsafe {
            ioctl::spi_ioc_wr_bits_per_word(fd, &bits).map_err(|e| {
                LinuxSpiError::SetBitsPerWordFailed {
                    bits,
                    source: std::io::Error::from_raw_os_error(e as i32),
                }
            })?;
        }

        let speed = config.max_speed_hz;
        unsafe {
            ioctl::spi_ioc_wr_max_speed_hz(fd, &speed).map_err(|e| {
                LinuxSpiError::SetSpeedFailed {
                    speed,
                    source: std::io::Error::from_raw_os_error(e as i32),
                }
            })?;
        }

        log::info!(
            "linux_spi: Opened {} (mode={}, max speed={} kHz)",
            config.device,
            mode,
            speed / 1000
        );

        let max_kernel_buf_size = get_max_kernel_buf_size();
        log::debug!(
            "linux_spi: Max kernel buffer size: {} bytes",
            max_kernel_buf_size
        );

        Ok(Self {
            file,
            device: config.device.clone(),
            max_kernel_buf_size,
            max_speed_hz: speed,
            mode_bits: mode,
            locked: None,
            cs_held: false,
        })
    }

    /// Open a device with default settings
    pub fn open_device(device: &str) -> Result<Self> {
        Self::open(&LinuxSpiConfig::new(device))
    }

    /// Clock ceiling in Hz
    pub fn max_speed_hz(&self) -> u32 {
        self.max_speed_hz
    }

    /// True while `HOLD_ON_CS` keeps CS asserted
    pub fn cs_held(&self) -> bool {
        self.cs_held
    }

    /// Drop the configuration lock taken by `LOCK_ON`
    pub fn unlock(&mut self) {
        self.locked = None;
    }

    fn apply_config(&mut self, config: &TransactionConfig) -> std::result::Result<(), ErrorCode> {
        if config.validate().is_err() {
            log::debug!("linux_spi: rejecting config {:?}", config);
            return Err(ErrorCode::INVALID);
        }

        match self.locked {
            Some(locked) if locked != *config => {
                log::debug!("linux_spi: {} locked to another configuration", self.device);
                return Err(ErrorCode::BUSY);
            }
            None if config.flags.contains(TransferFlags::LOCK_ON) => {
                self.locked = Some(*config);
            }
            _ => {}
        }

        let bits = mode_bits(config);
        if bits != self.mode_bits {
            let fd = self.file.as_raw_fd();
            unsafe { ioctl::spi_ioc_wr_mode(fd, &bits) }.map_err(|e| {
                log::error!("linux_spi: Failed to set mode bits {:#04x}: {}", bits, e);
                ErrorCode::from_errno(e as i32)
            })?;
            log::debug!("linux_spi: Mode bits {:#04x} -> {:#04x}", self.mode_bits, bits);
            self.mode_bits = bits;
        }

        Ok(())
    }
}

impl BusTransport for LinuxSpi {
    fn transceive(
        &mut self,
        config: &TransactionConfig,
        tx: &[u8],
        rx: &mut [u8],
    ) -> std::result::Result<(), ErrorCode> {
        if tx.len() != rx.len() || tx.len() > self.max_kernel_buf_size {
            log::error!(
                "linux_spi: Bad transfer length {} (rx {}, max {})",
                tx.len(),
                rx.len(),
                self.max_kernel_buf_size
            );
            return Err(ErrorCode::INVALID);
        }
        self.apply_config(config)?;

        let hold_cs = config.cs_strategy == CsStrategy::Hardware
            && config.flags.contains(TransferFlags::HOLD_ON_CS);

        let transfer = SpiIocTransfer {
            tx_buf: tx.as_ptr() as u64,
            rx_buf: rx.as_mut_ptr() as u64,
            len: tx.len() as u32,
            speed_hz: config.clock_frequency_hz.min(self.max_speed_hz),
            bits_per_word: config.word_size_bits,
            // On the last transfer of a message this leaves CS asserted
            cs_change: u8::from(hold_cs),
            ..Default::default()
        };

        let fd = self.file.as_raw_fd();
        let ret = unsafe { libc::ioctl(fd, ioctl::spi_ioc_message(1), &transfer) };
        if ret < 0 {
            let err = std::io::Error::last_os_error();
            log::error!("linux_spi: SPI transfer on {} failed: {}", self.device, err);
            return Err(errno_code(&err));
        }

        self.cs_held = hold_cs;
        Ok(())
    }
}

/// Read the maximum kernel buffer size from sysfs, or use page size as fallback
fn get_max_kernel_buf_size() -> usize {
    if let Ok(content) = std::fs::read_to_string(BUF_SIZE_SYSFS) {
        if let Ok(size) = content.trim().parse::<usize>() {
            if size > 0 {
                log::debug!("linux_spi: Using buffer size {} from sysfs", size);
                return size;
            }
        }
        log::warn!("linux_spi: Invalid buffer size in {}", BUF_SIZE_SYSFS);
    } else {
        log::debug!("linux_spi: Cannot read {}, using page size", BUF_SIZE_SYSFS);
    }

    let page_size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) } as usize;
    log::debug!("linux_spi: Using page size {} as buffer size", page_size);
    page_size
}

/// Parse transport options from a list of key-value pairs
///
/// - `dev=/dev/spidevX.Y` - Required: device path
/// - `spispeed=4000` - Optional: clock ceiling in kHz (default: 2000)
/// - `mode=0` - Optional: SPI mode 0-3 programmed at open (default: 0)
pub fn parse_options(options: &[(&str, &str)]) -> Result<LinuxSpiConfig> {
    let mut config = LinuxSpiConfig::default();

    for (key, value) in options {
        match *key {
            "dev" => {
                config.device = value.to_string();
            }
            "spispeed" => {
                let speed_khz: u32 = value.parse().map_err(|_| {
                    LinuxSpiError::InvalidParameter(format!("spispeed value: {}", value))
                })?;
                if speed_khz == 0 {
                    return Err(LinuxSpiError::InvalidParameter(
                        "spispeed must be non-zero".into(),
                    ));
                }
                config.max_speed_hz = speed_khz.saturating_mul(1000);
            }
            "mode" => {
                let mode: u8 = value.parse().map_err(|_| {
                    LinuxSpiError::InvalidParameter(format!("mode value: {}", value))
                })?;
                if mode > 3 {
                    return Err(LinuxSpiError::InvalidParameter(format!(
                        "SPI mode {} (must be 0-3)",
                        mode
                    )));
                }
                config.mode = mode;
            }
            _ => {
                log::warn!("linux_spi: Unknown option: {}={}", key, value);
            }
        }
    }

    if config.device.is_empty() {
        return Err(LinuxSpiError::NoDevice);
    }

    Ok(config)
}
