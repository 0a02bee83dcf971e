//! Error types for spiping-core
//!
//! This module provides a no_std compatible error type for the construction
//! paths of the engine, and the `ErrorCode` that bus transports report.
//!
//! A failed transfer is not an `Error`: `Engine::run_once` reports it through
//! `TransactionStatus::BusError` so the periodic loop can keep going.

use core::fmt;

/// Failure code reported by a bus transport
///
/// Follows the negative-errno convention of embedded SPI APIs. Any non-zero
/// value is a failure; the named constants cover the codes the bundled
/// transports produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ErrorCode(pub i32);

impl ErrorCode {
    /// I/O error during the exchange
    pub const IO: Self = Self(-5);
    /// Bus is busy or locked by another owner
    pub const BUSY: Self = Self(-16);
    /// Device is missing or not ready
    pub const NO_DEVICE: Self = Self(-19);
    /// Bus configuration rejected by the transport
    pub const INVALID: Self = Self(-22);
    /// Transport-level timeout
    pub const TIMED_OUT: Self = Self(-116);

    /// Raw code value
    pub const fn code(self) -> i32 {
        self.0
    }

    /// Build a code from a positive OS errno value
    pub const fn from_errno(errno: i32) -> Self {
        if errno > 0 {
            Self(-errno)
        } else {
            Self(errno)
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match *self {
            Self::IO => "I/O error",
            Self::BUSY => "bus busy",
            Self::NO_DEVICE => "device not ready",
            Self::INVALID => "configuration rejected",
            Self::TIMED_OUT => "timed out",
            _ => return write!(f, "error {}", self.0),
        };
        write!(f, "{} ({})", name, self.0)
    }
}

/// Reason a `TransactionConfig` was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// Clock frequency must be positive
    ZeroFrequency,
    /// Only 8-bit words are supported
    UnsupportedWordSize(u8),
    /// Expected response length differs from the transmit message
    ResponseLength {
        /// Transmit message length
        expected: usize,
        /// Expected response length
        found: usize,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ZeroFrequency => write!(f, "clock frequency must be non-zero"),
            Self::UnsupportedWordSize(bits) => {
                write!(f, "unsupported word size: {} bits (only 8 supported)", bits)
            }
            Self::ResponseLength { expected, found } => write!(
                f,
                "expected response is {} bytes, message is {} bytes",
                found, expected
            ),
        }
    }
}

/// Core error type - no_std compatible, Copy for efficiency
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Bus transport reported a failure
    Bus(ErrorCode),
    /// Bus configuration is invalid
    InvalidConfig(ConfigError),
    /// Software chip select selected but no controller supplied
    MissingChipSelect,
    /// Message payload has zero length
    EmptyMessage,
}

impl From<ErrorCode> for Error {
    fn from(code: ErrorCode) -> Self {
        Self::Bus(code)
    }
}

impl From<ConfigError> for Error {
    fn from(err: ConfigError) -> Self {
        Self::InvalidConfig(err)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bus(code) => write!(f, "SPI transfer failed: {}", code),
            Self::InvalidConfig(err) => write!(f, "invalid configuration: {}", err),
            Self::MissingChipSelect => {
                write!(f, "software chip select requires a chip select controller")
            }
            Self::EmptyMessage => write!(f, "message must not be empty"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

/// Result type alias using the core Error type
pub type Result<T> = core::result::Result<T, Error>;
