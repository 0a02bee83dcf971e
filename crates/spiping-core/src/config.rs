//! Bus configuration for a transaction
//!
//! A `TransactionConfig` is built once at startup and handed by reference to
//! the bus transport on every transfer.

use crate::error::ConfigError;
use bitflags::bitflags;

/// Default SPI clock speed in Hz (1 MHz)
pub const DEFAULT_FREQUENCY_HZ: u32 = 1_000_000;

/// The only supported word size
pub const WORD_SIZE_BITS: u8 = 8;

/// Bit order on the wire
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum BitOrder {
    /// Most significant bit first
    #[default]
    MsbFirst,
    /// Least significant bit first
    LsbFirst,
}

/// SPI clock mode (CPOL x CPHA)
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum SpiMode {
    /// CPOL=0, CPHA=0
    #[default]
    Mode0,
    /// CPOL=0, CPHA=1
    Mode1,
    /// CPOL=1, CPHA=0
    Mode2,
    /// CPOL=1, CPHA=1
    Mode3,
}

impl SpiMode {
    /// Clock idles high
    pub const fn polarity(&self) -> bool {
        matches!(self, Self::Mode2 | Self::Mode3)
    }

    /// Data is sampled on the trailing clock edge
    pub const fn phase(&self) -> bool {
        matches!(self, Self::Mode1 | Self::Mode3)
    }

    /// Mode number as used by spidev and most datasheets
    pub const fn number(&self) -> u8 {
        match self {
            Self::Mode0 => 0,
            Self::Mode1 => 1,
            Self::Mode2 => 2,
            Self::Mode3 => 3,
        }
    }

    /// Parse a mode number (0-3)
    pub const fn from_number(n: u8) -> Option<Self> {
        match n {
            0 => Some(Self::Mode0),
            1 => Some(Self::Mode1),
            2 => Some(Self::Mode2),
            3 => Some(Self::Mode3),
            _ => None,
        }
    }
}

/// Who drives the chip select line
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum CsStrategy {
    /// The engine toggles CS through a `ChipSelect` controller
    Software,
    /// The bus transport or peripheral drives CS automatically
    #[default]
    Hardware,
    /// No chip select (e.g. MOSI wired to MISO for loopback)
    None,
}

bitflags! {
    /// Operation flags passed through to the transport
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct TransferFlags: u8 {
        /// Keep CS asserted after the transfer completes
        const HOLD_ON_CS = 1 << 0;
        /// Keep the bus locked to this configuration between transfers
        const LOCK_ON    = 1 << 1;
    }
}

impl Default for TransferFlags {
    fn default() -> Self {
        TransferFlags::empty()
    }
}

/// Immutable bus configuration for the process lifetime
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TransactionConfig {
    /// SPI clock frequency in Hz
    pub clock_frequency_hz: u32,
    /// Bits per word (must be 8)
    pub word_size_bits: u8,
    /// Bit order
    pub bit_order: BitOrder,
    /// Clock polarity and phase
    pub mode: SpiMode,
    /// Chip select ownership
    pub cs_strategy: CsStrategy,
    /// Peripheral index on the bus
    pub slave: u8,
    /// Transport operation flags
    pub flags: TransferFlags,
}

impl Default for TransactionConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl TransactionConfig {
    /// 1 MHz, 8-bit words, MSB first, mode 0, hardware CS
    pub const fn new() -> Self {
        Self {
            clock_frequency_hz: DEFAULT_FREQUENCY_HZ,
            word_size_bits: WORD_SIZE_BITS,
            bit_order: BitOrder::MsbFirst,
            mode: SpiMode::Mode0,
            cs_strategy: CsStrategy::Hardware,
            slave: 0,
            flags: TransferFlags::empty(),
        }
    }

    /// Set the clock frequency in Hz
    pub const fn with_frequency(mut self, hz: u32) -> Self {
        self.clock_frequency_hz = hz;
        self
    }

    /// Set the bit order
    pub const fn with_bit_order(mut self, order: BitOrder) -> Self {
        self.bit_order = order;
        self
    }

    /// Set the SPI mode
    pub const fn with_mode(mut self, mode: SpiMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set the chip select strategy
    pub const fn with_cs_strategy(mut self, strategy: CsStrategy) -> Self {
        self.cs_strategy = strategy;
        self
    }

    /// Set the peripheral index
    pub const fn with_slave(mut self, slave: u8) -> Self {
        self.slave = slave;
        self
    }

    /// Set the transport operation flags
    pub const fn with_flags(mut self, flags: TransferFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Check the invariants every transport relies on
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.clock_frequency_hz == 0 {
            return Err(ConfigError::ZeroFrequency);
        }
        if self.word_size_bits != WORD_SIZE_BITS {
            return Err(ConfigError::UnsupportedWordSize(self.word_size_bits));
        }
        Ok(())
    }

    /// True when the engine must toggle CS itself
    pub const fn software_cs(&self) -> bool {
        matches!(self.cs_strategy, CsStrategy::Software)
    }
}
