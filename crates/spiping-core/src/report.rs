//! Per-cycle results and their rendering
//!
//! A `TransactionResult` is what `run_once` returns; a `CycleReport` is the
//! structured event handed to the log sink afterwards. Rendering helpers
//! implement `Display` so they work without allocation.

use crate::error::ErrorCode;
use crate::validate::ValidationOutcome;
use core::fmt;

/// Log target for cycle reports
pub const REPORT_TARGET: &str = "spiping::report";

/// Transfer status of one cycle
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TransactionStatus {
    /// All bytes were exchanged
    Ok,
    /// Transport reported a failure
    BusError(ErrorCode),
}

impl TransactionStatus {
    /// True for `Ok`
    pub const fn is_ok(&self) -> bool {
        matches!(self, Self::Ok)
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok => write!(f, "OK"),
            Self::BusError(code) => write!(f, "BUS_ERROR({})", code.code()),
        }
    }
}

/// Outcome of a single `run_once`
///
/// `received` borrows the engine's receive buffer and is only present when
/// the transfer succeeded.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TransactionResult<'a, const N: usize> {
    /// Transfer status
    pub status: TransactionStatus,
    /// Received bytes (valid only if `status` is `Ok`)
    pub received: Option<&'a [u8; N]>,
    /// Validation outcome (absent on bus error)
    pub outcome: Option<ValidationOutcome>,
}

impl<'a, const N: usize> TransactionResult<'a, N> {
    /// Successful transfer
    pub fn ok(received: &'a [u8; N], outcome: ValidationOutcome) -> Self {
        Self {
            status: TransactionStatus::Ok,
            received: Some(received),
            outcome: Some(outcome),
        }
    }

    /// Failed transfer; nothing received is trusted
    pub fn bus_error(code: ErrorCode) -> Self {
        Self {
            status: TransactionStatus::BusError(code),
            received: None,
            outcome: None,
        }
    }

    /// True only when the transfer succeeded and the policy passed
    pub fn passed(&self) -> bool {
        self.status.is_ok() && self.outcome == Some(ValidationOutcome::Passed)
    }
}

/// Structured event emitted after each cycle
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CycleReport<'a, const N: usize> {
    /// 1-based cycle number
    pub cycle: u32,
    /// Transfer status
    pub status: TransactionStatus,
    /// Received bytes (only on success)
    pub received: Option<&'a [u8; N]>,
    /// Validation outcome (only on success)
    pub outcome: Option<ValidationOutcome>,
}

impl<'a, const N: usize> CycleReport<'a, N> {
    /// Build a report from a cycle result
    pub fn new(cycle: u32, result: &TransactionResult<'a, N>) -> Self {
        Self {
            cycle,
            status: result.status,
            received: result.received,
            outcome: result.outcome,
        }
    }

    /// Emit the report through the `log` facade
    ///
    /// Bus errors log at error level, mismatches at warn, everything else at
    /// info.
    pub fn log(&self) {
        match (self.status, self.received, self.outcome) {
            (TransactionStatus::BusError(code), _, _) => {
                log::error!(
                    target: REPORT_TARGET,
                    "cycle {}: SPI transceive error: {}",
                    self.cycle,
                    code
                );
            }
            (TransactionStatus::Ok, Some(rx), Some(outcome)) => {
                let level = if outcome.is_mismatch() {
                    log::Level::Warn
                } else {
                    log::Level::Info
                };
                log::log!(
                    target: REPORT_TARGET,
                    level,
                    "cycle {}: received [{}] \"{}\": {}",
                    self.cycle,
                    HexBytes(rx),
                    EscapedAscii(rx),
                    outcome
                );
            }
            (TransactionStatus::Ok, _, _) => {
                log::info!(target: REPORT_TARGET, "cycle {}: OK", self.cycle);
            }
        }
    }
}

impl<const N: usize> fmt::Display for CycleReport<'_, N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cycle={} status={}", self.cycle, self.status)?;
        if let Some(rx) = self.received {
            write!(f, " hex=[{}] ascii=\"{}\"", HexBytes(rx), EscapedAscii(rx))?;
        }
        if let Some(outcome) = self.outcome {
            write!(f, " validation={}", outcome)?;
        }
        Ok(())
    }
}

/// Space-separated upper-case hex rendering of a byte slice
#[derive(Clone, Copy, Debug)]
pub struct HexBytes<'a>(pub &'a [u8]);

impl fmt::Display for HexBytes<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, byte) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{:02X}", byte)?;
        }
        Ok(())
    }
}

/// Printable ASCII rendering with non-printable bytes escaped
///
/// `\0`, `\t`, `\n`, `\r`, `\\` and `\"` use their short escapes; other
/// bytes outside `0x20..=0x7E` render as `\xNN`.
#[derive(Clone, Copy, Debug)]
pub struct EscapedAscii<'a>(pub &'a [u8]);

impl fmt::Display for EscapedAscii<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for &byte in self.0 {
            match byte {
                0 => f.write_str("\\0")?,
                b'\t' => f.write_str("\\t")?,
                b'\n' => f.write_str("\\n")?,
                b'\r' => f.write_str("\\r")?,
                b'\\' => f.write_str("\\\\")?,
                b'"' => f.write_str("\\\"")?,
                0x20..=0x7E => write!(f, "{}", byte as char)?,
                _ => write!(f, "\\x{:02X}", byte)?,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::fmt::Write;

    fn render<T: fmt::Display>(value: T) -> heapless::String<256> {
        let mut s = heapless::String::new();
        write!(s, "{}", value).unwrap();
        s
    }

    #[test]
    fn test_hex_bytes() {
        assert_eq!(render(HexBytes(&[0x48, 0x00, 0xFF])).as_str(), "48 00 FF");
        assert_eq!(render(HexBytes(&[])).as_str(), "");
    }

    #[test]
    fn test_escaped_ascii() {
        assert_eq!(render(EscapedAscii(b"Hi\0\n\x7F\"\\")).as_str(), "Hi\\0\\n\\x7F\\\"\\\\");
        assert_eq!(render(EscapedAscii(b"Hello from nRF")).as_str(), "Hello from nRF");
    }

    #[test]
    fn test_report_display() {
        let rx = *b"ok";
        let result = TransactionResult::ok(&rx, ValidationOutcome::Passed);
        let report = CycleReport::new(3, &result);
        assert_eq!(
            render(report).as_str(),
            "cycle=3 status=OK hex=[6F 6B] ascii=\"ok\" validation=PASSED"
        );

        let result = TransactionResult::<2>::bus_error(ErrorCode::IO);
        let report = CycleReport::new(4, &result);
        assert_eq!(render(report).as_str(), "cycle=4 status=BUS_ERROR(-5)");
        assert!(!result.passed());
    }
}
