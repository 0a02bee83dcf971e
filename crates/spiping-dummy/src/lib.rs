//! spiping-dummy - In-memory bus transports for testing
//!
//! This crate provides bus transports that need no hardware: a loopback wire,
//! a canned peer, a silent bus, a failing bus and a scripted bus. It also
//! provides bitbang pins with MOSI wired to MISO so the portable bitbang
//! transport can be exercised end to end.
//!
//! With the `std` feature, `BusLog` records chip select and transfer events
//! in order so tests can check how a cycle drove the bus.

#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(feature = "alloc")]
extern crate alloc;

#[cfg(feature = "alloc")]
use alloc::collections::VecDeque;
#[cfg(feature = "alloc")]
use alloc::vec::Vec;

use spiping_core::config::TransactionConfig;
use spiping_core::error::ErrorCode;
use spiping_core::transport::{BitbangPins, BusTransport};

/// Longest reply a `PeerTransport` can hold
pub const MAX_REPLY_LEN: usize = 64;

fn check_lengths(tx: &[u8], rx: &[u8]) -> Result<(), ErrorCode> {
    if tx.len() != rx.len() {
        log::error!("dummy: tx/rx length mismatch ({} vs {})", tx.len(), rx.len());
        return Err(ErrorCode::INVALID);
    }
    Ok(())
}

/// Bus with MOSI wired to MISO: every byte sent comes straight back
#[derive(Debug, Default, Clone)]
pub struct EchoTransport {
    transfers: u32,
    last_config: Option<TransactionConfig>,
}

impl EchoTransport {
    /// Create a loopback bus
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of completed transfers
    pub fn transfers(&self) -> u32 {
        self.transfers
    }

    /// Configuration used by the most recent transfer
    pub fn last_config(&self) -> Option<&TransactionConfig> {
        self.last_config.as_ref()
    }
}

impl BusTransport for EchoTransport {
    fn transceive(
        &mut self,
        config: &TransactionConfig,
        tx: &[u8],
        rx: &mut [u8],
    ) -> Result<(), ErrorCode> {
        check_lengths(tx, rx)?;
        rx.copy_from_slice(tx);
        self.transfers += 1;
        self.last_config = Some(*config);
        Ok(())
    }
}

/// Peer device that always shifts out the same reply
///
/// A reply shorter than the transfer is followed by zero bytes; a longer one
/// is cut off, as a real shift register would.
#[derive(Debug, Clone)]
pub struct PeerTransport {
    reply: heapless::Vec<u8, MAX_REPLY_LEN>,
    received: heapless::Vec<u8, MAX_REPLY_LEN>,
}

impl PeerTransport {
    /// Create a peer answering with `reply`
    ///
    /// Returns `None` if `reply` is longer than `MAX_REPLY_LEN`.
    pub fn new(reply: &[u8]) -> Option<Self> {
        Some(Self {
            reply: heapless::Vec::from_slice(reply).ok()?,
            received: heapless::Vec::new(),
        })
    }

    /// Reply shifted out every transfer
    pub fn reply(&self) -> &[u8] {
        &self.reply
    }

    /// Bytes the peer saw on MOSI during the last transfer
    pub fn received(&self) -> &[u8] {
        &self.received
    }
}

impl BusTransport for PeerTransport {
    fn transceive(
        &mut self,
        _config: &TransactionConfig,
        tx: &[u8],
        rx: &mut [u8],
    ) -> Result<(), ErrorCode> {
        check_lengths(tx, rx)?;
        let n = self.reply.len().min(rx.len());
        rx[..n].copy_from_slice(&self.reply[..n]);
        rx[n..].fill(0);

        self.received.clear();
        let seen = tx.len().min(MAX_REPLY_LEN);
        // Bounded by MAX_REPLY_LEN
        let _ = self.received.extend_from_slice(&tx[..seen]);
        Ok(())
    }
}

/// Bus with nothing attached: MISO reads all zeros
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentTransport;

impl BusTransport for SilentTransport {
    fn transceive(
        &mut self,
        _config: &TransactionConfig,
        tx: &[u8],
        rx: &mut [u8],
    ) -> Result<(), ErrorCode> {
        check_lengths(tx, rx)?;
        rx.fill(0);
        Ok(())
    }
}

/// Bus that fails with a fixed error code
///
/// Built with `failing_first`, only the first transfers fail and the rest
/// behave like `EchoTransport`.
#[derive(Debug, Clone)]
pub struct FailingTransport {
    code: ErrorCode,
    remaining: Option<u32>,
    attempts: u32,
}

impl FailingTransport {
    /// Fail every transfer with `code`
    pub fn new(code: ErrorCode) -> Self {
        Self {
            code,
            remaining: None,
            attempts: 0,
        }
    }

    /// Fail the first `count` transfers with `code`, then echo
    pub fn failing_first(count: u32, code: ErrorCode) -> Self {
        Self {
            code,
            remaining: Some(count),
            attempts: 0,
        }
    }

    /// Number of transfers attempted so far
    pub fn attempts(&self) -> u32 {
        self.attempts
    }
}

impl BusTransport for FailingTransport {
    fn transceive(
        &mut self,
        _config: &TransactionConfig,
        tx: &[u8],
        rx: &mut [u8],
    ) -> Result<(), ErrorCode> {
        self.attempts += 1;
        match &mut self.remaining {
            Some(0) => {
                check_lengths(tx, rx)?;
                rx.copy_from_slice(tx);
                Ok(())
            }
            Some(n) => {
                *n -= 1;
                Err(self.code)
            }
            None => Err(self.code),
        }
    }
}

/// Bus that plays back a queue of canned results
///
/// Each transfer pops one entry: `Ok(bytes)` is copied into the receive
/// buffer (zero padded or truncated), `Err(code)` fails the transfer. Once
/// the queue is empty the bus reads all zeros.
#[cfg(feature = "alloc")]
#[derive(Debug, Default, Clone)]
pub struct ScriptedTransport {
    script: VecDeque<Result<Vec<u8>, ErrorCode>>,
    sent: Vec<Vec<u8>>,
}

#[cfg(feature = "alloc")]
impl ScriptedTransport {
    /// Create an empty script
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful reply
    pub fn reply(mut self, bytes: &[u8]) -> Self {
        self.script.push_back(Ok(bytes.to_vec()));
        self
    }

    /// Queue a failed transfer
    pub fn fail(mut self, code: ErrorCode) -> Self {
        self.script.push_back(Err(code));
        self
    }

    /// Number of entries not yet played
    pub fn pending(&self) -> usize {
        self.script.len()
    }

    /// Every transmit buffer seen, in order
    pub fn sent(&self) -> &[Vec<u8>] {
        &self.sent
    }
}

#[cfg(feature = "alloc")]
impl BusTransport for ScriptedTransport {
    fn transceive(
        &mut self,
        _config: &TransactionConfig,
        tx: &[u8],
        rx: &mut [u8],
    ) -> Result<(), ErrorCode> {
        check_lengths(tx, rx)?;
        self.sent.push(tx.to_vec());

        match self.script.pop_front() {
            Some(Ok(bytes)) => {
                let n = bytes.len().min(rx.len());
                rx[..n].copy_from_slice(&bytes[..n]);
                rx[n..].fill(0);
                Ok(())
            }
            Some(Err(code)) => Err(code),
            None => {
                rx.fill(0);
                Ok(())
            }
        }
    }
}

/// Bitbang pins with MOSI wired to MISO
///
/// Counts clock edges and chip select activations so tests can see the
/// bitbang transport actually drove the lines.
#[derive(Debug, Default, Clone)]
pub struct LoopbackPins {
    cs_active: bool,
    sck: bool,
    mosi: bool,
    edges: u32,
    selects: u32,
}

impl LoopbackPins {
    /// Create idle pins
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether CS is currently driven active
    pub fn cs_active(&self) -> bool {
        self.cs_active
    }

    /// Current SCK level
    pub fn sck(&self) -> bool {
        self.sck
    }

    /// Number of SCK transitions so far
    pub fn edges(&self) -> u32 {
        self.edges
    }

    /// Number of times CS went active
    pub fn selects(&self) -> u32 {
        self.selects
    }
}

impl BitbangPins for LoopbackPins {
    fn set_cs(&mut self, active: bool) {
        if active && !self.cs_active {
            self.selects += 1;
        }
        self.cs_active = active;
    }

    fn set_sck(&mut self, high: bool) {
        if high != self.sck {
            self.edges += 1;
        }
        self.sck = high;
    }

    fn set_mosi(&mut self, high: bool) {
        self.mosi = high;
    }

    fn get_miso(&self) -> bool {
        self.mosi
    }

    fn half_period_delay(&self) {}
}

/// One observable action on the bus
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusEvent {
    /// Software CS driven active
    CsAssert,
    /// Software CS driven idle
    CsDeassert,
    /// A transfer was started
    Transfer {
        /// Bytes exchanged
        len: usize,
        /// Whether the transport drives CS for this transfer
        hardware_cs: bool,
    },
}

#[cfg(feature = "std")]
pub use recording::{BusLog, LoggedTransport, RecordingChipSelect};

#[cfg(feature = "std")]
mod recording {
    use super::BusEvent;
    use spiping_core::config::{CsStrategy, TransactionConfig};
    use spiping_core::error::ErrorCode;
    use spiping_core::transport::{BusTransport, ChipSelect};
    use std::sync::{Arc, Mutex, MutexGuard};

    /// Shared, ordered record of bus events
    #[derive(Debug, Default, Clone)]
    pub struct BusLog(Arc<Mutex<Vec<BusEvent>>>);

    impl BusLog {
        /// Create an empty log
        pub fn new() -> Self {
            Self::default()
        }

        fn events_mut(&self) -> MutexGuard<'_, Vec<BusEvent>> {
            self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
        }

        /// Append an event
        pub fn push(&self, event: BusEvent) {
            self.events_mut().push(event);
        }

        /// Snapshot of all events so far
        pub fn events(&self) -> Vec<BusEvent> {
            self.events_mut().clone()
        }

        /// Forget all events
        pub fn clear(&self) {
            self.events_mut().clear();
        }
    }

    /// Chip select line that records every level change
    #[derive(Debug, Clone)]
    pub struct RecordingChipSelect {
        log: BusLog,
        active: bool,
    }

    impl RecordingChipSelect {
        /// Create a line recording into `log`
        pub fn new(log: BusLog) -> Self {
            Self { log, active: false }
        }

        /// Whether the line is currently active
        pub fn is_active(&self) -> bool {
            self.active
        }
    }

    impl ChipSelect for RecordingChipSelect {
        fn assert(&mut self) {
            self.active = true;
            self.log.push(BusEvent::CsAssert);
        }

        fn deassert(&mut self) {
            self.active = false;
            self.log.push(BusEvent::CsDeassert);
        }
    }

    /// Transport wrapper that records each transfer before delegating
    #[derive(Debug, Clone)]
    pub struct LoggedTransport<T> {
        inner: T,
        log: BusLog,
    }

    impl<T> LoggedTransport<T> {
        /// Wrap `inner`, recording into `log`
        pub fn new(inner: T, log: BusLog) -> Self {
            Self { inner, log }
        }

        /// Wrapped transport
        pub fn inner(&self) -> &T {
            &self.inner
        }
    }

    impl<T: BusTransport> BusTransport for LoggedTransport<T> {
        fn transceive(
            &mut self,
            config: &TransactionConfig,
            tx: &[u8],
            rx: &mut [u8],
        ) -> Result<(), ErrorCode> {
            self.log.push(BusEvent::Transfer {
                len: tx.len(),
                hardware_cs: config.cs_strategy == CsStrategy::Hardware,
            });
            self.inner.transceive(config, tx, rx)
        }
    }
}
