//! Bus transport and chip select trait definitions
//!
//! `BusTransport` uses `maybe_async` to support both sync and async modes.
//! - By default (`is_sync` feature), transfers are blocking
//! - Without `is_sync`, `transceive` is an `async fn` (Embassy, tokio)
//!
//! `ChipSelect` is always synchronous: it is a single digital output write.

use crate::config::TransactionConfig;
use crate::error::ErrorCode;
use maybe_async::maybe_async;

/// Raw full-duplex byte exchange over the physical bus
///
/// Implementations must:
///
/// 1. Exchange exactly `tx.len()` bytes, writing the bytes clocked in to `rx`
///    (callers always pass `rx.len() == tx.len()`)
/// 2. Report failure through `ErrorCode`, never by panicking
/// 3. Never retry internally
/// 4. Drive the chip select line only when `config.cs_strategy` is
///    `CsStrategy::Hardware`, leaving it alone otherwise
///
/// On error the contents of `rx` are unspecified.
///
/// ## Example
///
/// ```ignore
/// #[maybe_async]
/// impl BusTransport for MySpi {
///     async fn transceive(
///         &mut self,
///         config: &TransactionConfig,
///         tx: &[u8],
///         rx: &mut [u8],
///     ) -> Result<(), ErrorCode> {
///         self.apply(config)?;
///         self.dma_transfer(tx, rx).await
///     }
/// }
/// ```
#[maybe_async(AFIT)]
pub trait BusTransport {
    /// Exchange `tx` for `rx` using the given bus configuration
    async fn transceive(
        &mut self,
        config: &TransactionConfig,
        tx: &[u8],
        rx: &mut [u8],
    ) -> Result<(), ErrorCode>;
}

/// Software-controlled chip select line
///
/// Assumed infallible at this layer; a broken line surfaces as a failed or
/// garbled transfer.
pub trait ChipSelect {
    /// Drive the line to its active level
    fn assert(&mut self);

    /// Return the line to its idle level
    fn deassert(&mut self);
}

/// Placeholder controller for engines without software chip select
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NoChipSelect;

impl ChipSelect for NoChipSelect {
    fn assert(&mut self) {}

    fn deassert(&mut self) {}
}

impl<C: ChipSelect + ?Sized> ChipSelect for &mut C {
    fn assert(&mut self) {
        (**self).assert()
    }

    fn deassert(&mut self) {
        (**self).deassert()
    }
}

// Blanket impl for boxed transports to allow trait objects (sync mode only)
// In async mode, traits with async fn are not object-safe
#[cfg(all(feature = "alloc", feature = "is_sync"))]
impl BusTransport for alloc::boxed::Box<dyn BusTransport + Send> {
    fn transceive(
        &mut self,
        config: &TransactionConfig,
        tx: &[u8],
        rx: &mut [u8],
    ) -> Result<(), ErrorCode> {
        (**self).transceive(config, tx, rx)
    }
}

#[cfg(all(feature = "alloc", feature = "is_sync"))]
impl ChipSelect for alloc::boxed::Box<dyn ChipSelect + Send> {
    fn assert(&mut self) {
        (**self).assert()
    }

    fn deassert(&mut self) {
        (**self).deassert()
    }
}

/// Information about a transport backend
#[derive(Debug, Clone)]
pub struct TransportInfo {
    /// Name of the transport
    pub name: &'static str,
    /// Alternative names/aliases
    pub aliases: &'static [&'static str],
    /// Description
    pub description: &'static str,
    /// Whether this transport talks to real hardware
    pub hardware: bool,
}
