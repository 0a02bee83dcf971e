//! Bitbang bus transport
//!
//! This module provides a portable `BusTransport` for SPI implemented via
//! software-controlled GPIO pins (bitbanging). Examples include:
//! - Microcontroller GPIO ports without a free SPI peripheral
//! - Linux GPIO character devices
//! - Test doubles that wire MOSI back to MISO
//!
//! ## Architecture
//!
//! 1. **BitbangPins** is the minimal set of line operations a platform provides
//! 2. **read_write_byte** clocks one full-duplex byte in any SPI mode and bit order
//! 3. **BitbangTransport** wraps the pins and implements `BusTransport`
//!
//! The transport drives CS itself only for `CsStrategy::Hardware`, so a
//! bitbang bus can also be used with an engine-owned software CS line.
//!
//! `HOLD_ON_CS` keeps the hardware CS line asserted after a transfer and
//! `LOCK_ON` pins the bus to the first configuration used; both last until
//! `BitbangTransport::release` is called.

use super::BusTransport;
use crate::config::{BitOrder, CsStrategy, SpiMode, TransactionConfig, TransferFlags};
use crate::error::ErrorCode;
use maybe_async::maybe_async;

/// Trait for low-level bitbang SPI line operations
pub trait BitbangPins {
    /// Set chip select (CS is active low, so `active=true` means CS=0)
    fn set_cs(&mut self, active: bool);

    /// Set clock line value
    fn set_sck(&mut self, high: bool);

    /// Set MOSI line value
    fn set_mosi(&mut self, high: bool);

    /// Get MISO line value
    fn get_miso(&self) -> bool;

    /// Delay for half a clock period
    fn half_period_delay(&self);

    /// Optional: adjust the half period to approximate `hz`
    fn set_frequency(&mut self, _hz: u32) {}

    /// Optional: Set SCK and MOSI atomically (optimization)
    ///
    /// Default implementation calls `set_sck` then `set_mosi`.
    fn set_sck_set_mosi(&mut self, sck: bool, mosi: bool) {
        self.set_sck(sck);
        self.set_mosi(mosi);
    }

    /// Optional: Set SCK and get MISO atomically (optimization)
    ///
    /// Default implementation calls `set_sck` then `get_miso`.
    fn set_sck_get_miso(&mut self, sck: bool) -> bool {
        self.set_sck(sck);
        self.get_miso()
    }

    /// Optional: Request exclusive bus access
    fn request_bus(&mut self) {}

    /// Optional: Release bus access
    fn release_bus(&mut self) {}
}

/// Position of the `i`-th transmitted bit within a byte
const fn bit_index(order: BitOrder, i: u8) -> u8 {
    match order {
        BitOrder::MsbFirst => 7 - i,
        BitOrder::LsbFirst => i,
    }
}

/// Exchange one byte in the given mode and bit order
///
/// Expects SCK at its idle level on entry and leaves it there on return.
pub fn read_write_byte<P: BitbangPins + ?Sized>(
    pins: &mut P,
    mode: SpiMode,
    order: BitOrder,
    byte: u8,
) -> u8 {
    let idle = mode.polarity();
    let mut read = 0u8;

    for i in 0..8 {
        let shift = bit_index(order, i);
        let bit = (byte >> shift) & 1 != 0;

        let sampled = if mode.phase() {
            // Data changes on the leading edge, sampled on the trailing edge
            pins.set_sck_set_mosi(!idle, bit);
            pins.half_period_delay();
            let sampled = pins.set_sck_get_miso(idle);
            pins.half_period_delay();
            sampled
        } else {
            // Data set up while idle, sampled on the leading edge
            pins.set_sck_set_mosi(idle, bit);
            pins.half_period_delay();
            let sampled = pins.set_sck_get_miso(!idle);
            pins.half_period_delay();
            sampled
        };

        if sampled {
            read |= 1 << shift;
        }
    }

    if !mode.phase() {
        pins.set_sck(idle);
    }

    read
}

/// Exchange a buffer, byte by byte
pub fn transfer_bytes<P: BitbangPins + ?Sized>(
    pins: &mut P,
    mode: SpiMode,
    order: BitOrder,
    tx: &[u8],
    rx: &mut [u8],
) {
    for (out, inp) in tx.iter().zip(rx.iter_mut()) {
        *inp = read_write_byte(pins, mode, order, *out);
    }
}

/// `BusTransport` over bitbanged GPIO lines
pub struct BitbangTransport<P> {
    pins: P,
    /// Hardware CS left asserted by `HOLD_ON_CS`
    cs_held: bool,
    /// Configuration locked by `LOCK_ON`
    locked: Option<TransactionConfig>,
}

impl<P: BitbangPins> BitbangTransport<P> {
    /// Wrap a set of pins; CS starts deasserted
    pub fn new(mut pins: P) -> Self {
        pins.set_cs(false);
        Self {
            pins,
            cs_held: false,
            locked: None,
        }
    }

    /// Access the underlying pins
    pub fn pins(&self) -> &P {
        &self.pins
    }

    /// Mutable access to the underlying pins
    pub fn pins_mut(&mut self) -> &mut P {
        &mut self.pins
    }

    /// Consume the transport, returning the pins
    pub fn into_inner(self) -> P {
        self.pins
    }

    /// True while `HOLD_ON_CS` keeps CS asserted
    pub fn cs_held(&self) -> bool {
        self.cs_held
    }

    /// Drop any held CS and configuration lock
    pub fn release(&mut self) {
        if self.cs_held {
            self.pins.set_cs(false);
            self.cs_held = false;
        }
        self.locked = None;
    }

    fn check_config(&mut self, config: &TransactionConfig) -> Result<(), ErrorCode> {
        if config.validate().is_err() {
            log::debug!("bitbang: rejecting config {:?}", config);
            return Err(ErrorCode::INVALID);
        }

        match self.locked {
            Some(locked) if locked != *config => {
                log::debug!("bitbang: bus locked to another configuration");
                return Err(ErrorCode::BUSY);
            }
            None if config.flags.contains(TransferFlags::LOCK_ON) => {
                self.locked = Some(*config);
            }
            _ => {}
        }

        Ok(())
    }
}

#[maybe_async(AFIT)]
impl<P: BitbangPins> BusTransport for BitbangTransport<P> {
    async fn transceive(
        &mut self,
        config: &TransactionConfig,
        tx: &[u8],
        rx: &mut [u8],
    ) -> Result<(), ErrorCode> {
        if tx.len() != rx.len() {
            return Err(ErrorCode::INVALID);
        }
        self.check_config(config)?;

        let hardware_cs = config.cs_strategy == CsStrategy::Hardware;

        self.pins.request_bus();
        self.pins.set_frequency(config.clock_frequency_hz);
        self.pins.set_sck(config.mode.polarity());

        if hardware_cs && !self.cs_held {
            self.pins.set_cs(true);
            self.pins.half_period_delay();
        }

        transfer_bytes(&mut self.pins, config.mode, config.bit_order, tx, rx);

        if hardware_cs {
            if config.flags.contains(TransferFlags::HOLD_ON_CS) {
                self.cs_held = true;
            } else {
                self.pins.half_period_delay();
                self.pins.set_cs(false);
                self.cs_held = false;
            }
        }

        self.pins.release_bus();
        Ok(())
    }
}

#[cfg(all(test, feature = "is_sync"))]
mod tests {
    use super::*;
    use core::cell::Cell;

    /// Pins with MOSI optionally wired to MISO, recording every sample
    #[derive(Default)]
    struct ProbePins {
        cs_active: bool,
        cs_toggles: u32,
        sck: bool,
        mosi: bool,
        wired: bool,
        /// MISO bits to present, consumed LSB first
        miso_script: Cell<u8>,
        /// MOSI level at each sample point, first sample in bit 0
        sampled_mosi: Cell<u8>,
        samples: Cell<u8>,
        frequency: u32,
    }

    impl ProbePins {
        fn wired() -> Self {
            Self {
                wired: true,
                ..Default::default()
            }
        }

        fn scripted(bits: u8) -> Self {
            Self {
                miso_script: Cell::new(bits),
                ..Default::default()
            }
        }
    }

    impl BitbangPins for ProbePins {
        fn set_cs(&mut self, active: bool) {
            if active != self.cs_active {
                self.cs_toggles += 1;
            }
            self.cs_active = active;
        }

        fn set_sck(&mut self, high: bool) {
            self.sck = high;
        }

        fn set_mosi(&mut self, high: bool) {
            self.mosi = high;
        }

        fn get_miso(&self) -> bool {
            let n = self.samples.get();
            // Only the first byte's samples are kept
            if self.mosi {
                let bit = 1u8.checked_shl(n.into()).unwrap_or(0);
                self.sampled_mosi.set(self.sampled_mosi.get() | bit);
            }
            self.samples.set(n.wrapping_add(1));

            if self.wired {
                self.mosi
            } else {
                let script = self.miso_script.get();
                self.miso_script.set(script >> 1);
                script & 1 != 0
            }
        }

        fn half_period_delay(&self) {}

        fn set_frequency(&mut self, hz: u32) {
            self.frequency = hz;
        }
    }

    const MODES: [SpiMode; 4] = [SpiMode::Mode0, SpiMode::Mode1, SpiMode::Mode2, SpiMode::Mode3];

    #[test]
    fn test_wired_loopback_all_modes() {
        for mode in MODES {
            for order in [BitOrder::MsbFirst, BitOrder::LsbFirst] {
                let mut pins = ProbePins::wired();
                pins.sck = mode.polarity();
                for byte in [0x00, 0xFF, 0xA5, 0x3C, 0x81] {
                    assert_eq!(read_write_byte(&mut pins, mode, order, byte), byte);
                    assert_eq!(pins.sck, mode.polarity(), "SCK not idle after {:?}", mode);
                }
            }
        }
    }

    #[test]
    fn test_bit_order_on_wire() {
        for mode in MODES {
            let mut pins = ProbePins::default();
            read_write_byte(&mut pins, mode, BitOrder::MsbFirst, 0x01);
            assert_eq!(pins.samples.get(), 8);
            // 0x01 MSB first: the single 1 bit is the last one on the wire
            assert_eq!(pins.sampled_mosi.get(), 0x80);

            let mut pins = ProbePins::default();
            read_write_byte(&mut pins, mode, BitOrder::LsbFirst, 0x01);
            assert_eq!(pins.sampled_mosi.get(), 0x01);
        }
    }

    #[test]
    fn test_multi_byte_sampling() {
        let mut pins = ProbePins::wired();
        let tx = [0x01, 0xFF, 0xFF, 0xFF];
        let mut rx = [0u8; 4];

        transfer_bytes(&mut pins, SpiMode::Mode0, BitOrder::LsbFirst, &tx, &mut rx);

        assert_eq!(rx, tx);
        assert_eq!(pins.samples.get(), 32);
        assert_eq!(pins.sampled_mosi.get(), 0x01);
    }

    #[test]
    fn test_bit_order_on_read() {
        // Wire order: 1,0,0,0,0,0,1,1
        let wire = 0b1100_0001u8;

        let mut pins = ProbePins::scripted(wire);
        let read = read_write_byte(&mut pins, SpiMode::Mode0, BitOrder::MsbFirst, 0);
        assert_eq!(read, 0b1000_0011);

        let mut pins = ProbePins::scripted(wire);
        let read = read_write_byte(&mut pins, SpiMode::Mode0, BitOrder::LsbFirst, 0);
        assert_eq!(read, wire);
    }

    #[test]
    fn test_transport_hardware_cs() {
        let mut bus = BitbangTransport::new(ProbePins::wired());
        let config = TransactionConfig::new().with_frequency(250_000);
        let tx = *b"ping";
        let mut rx = [0u8; 4];

        bus.transceive(&config, &tx, &mut rx).unwrap();

        assert_eq!(rx, tx);
        assert!(!bus.pins().cs_active);
        assert_eq!(bus.pins().cs_toggles, 2);
        assert_eq!(bus.pins().frequency, 250_000);
    }

    #[test]
    fn test_transport_leaves_cs_alone() {
        for strategy in [CsStrategy::Software, CsStrategy::None] {
            let mut bus = BitbangTransport::new(ProbePins::wired());
            let config = TransactionConfig::new().with_cs_strategy(strategy);
            let mut rx = [0u8; 2];

            bus.transceive(&config, &[1, 2], &mut rx).unwrap();

            assert_eq!(rx, [1, 2]);
            assert_eq!(bus.pins().cs_toggles, 0);
        }
    }

    #[test]
    fn test_transport_rejects_bad_config() {
        let mut bus = BitbangTransport::new(ProbePins::wired());
        let mut config = TransactionConfig::new();
        config.word_size_bits = 9;
        let mut rx = [0u8; 1];

        assert_eq!(bus.transceive(&config, &[1], &mut rx), Err(ErrorCode::INVALID));
        assert_eq!(
            bus.transceive(&TransactionConfig::new(), &[1, 2], &mut rx),
            Err(ErrorCode::INVALID)
        );
        assert_eq!(bus.pins().cs_toggles, 0);
    }

    #[test]
    fn test_hold_on_cs_until_release() {
        let mut bus = BitbangTransport::new(ProbePins::wired());
        let config = TransactionConfig::new().with_flags(TransferFlags::HOLD_ON_CS);
        let mut rx = [0u8; 1];

        bus.transceive(&config, &[7], &mut rx).unwrap();
        bus.transceive(&config, &[8], &mut rx).unwrap();
        assert!(bus.cs_held());
        assert!(bus.pins().cs_active);
        assert_eq!(bus.pins().cs_toggles, 1);

        bus.release();
        assert!(!bus.cs_held());
        assert!(!bus.pins().cs_active);
    }

    #[test]
    fn test_lock_on_rejects_other_config() {
        let mut bus = BitbangTransport::new(ProbePins::wired());
        let locked = TransactionConfig::new().with_flags(TransferFlags::LOCK_ON);
        let other = TransactionConfig::new().with_mode(SpiMode::Mode3);
        let mut rx = [0u8; 1];

        bus.transceive(&locked, &[1], &mut rx).unwrap();
        assert_eq!(bus.transceive(&other, &[1], &mut rx), Err(ErrorCode::BUSY));

        bus.release();
        assert_eq!(bus.transceive(&other, &[1], &mut rx), Ok(()));
    }
}
