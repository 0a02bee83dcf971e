//! Run command implementation
//!
//! Resolves the CLI flags against a built-in profile, then runs the engine
//! once per period: run a cycle, log its report, sleep. Bus errors and
//! mismatches never stop the loop; only `--count` does.

use crate::cli::{CheckMode, CsArg, RunArgs};
use crate::transports;

use spiping_core::config::{BitOrder, CsStrategy, SpiMode, TransactionConfig};
use spiping_core::engine::Engine;
use spiping_core::message::Message;
use spiping_core::profile;
use spiping_core::report::TransactionStatus;
use spiping_core::transport::{BusTransport, ChipSelect, NoChipSelect};
use spiping_core::validate::{ValidationOutcome, ValidationPolicy};

use std::time::Duration;
use thiserror::Error;

/// Frame lengths a message can be sent in, smallest first
pub const FRAME_SIZES: [usize; 5] = [8, profile::HELLO_LEN, 16, 32, 64];

/// Errors from resolving or running the `run` command
#[derive(Debug, Error)]
pub enum RunError {
    /// Message has no bytes
    #[error("Message must not be empty")]
    EmptyMessage,

    /// Message does not fit the largest frame
    #[error("Message is {0} bytes, maximum is 64")]
    MessageTooLong(usize),

    /// Expected reply longer than the message frame
    #[error("Expected reply is {found} bytes, longer than the {frame}-byte frame")]
    ReplyTooLong { found: usize, frame: usize },

    /// Some cycles of a counted run did not pass
    #[error("{failed} of {total} cycles failed")]
    CyclesFailed { failed: u32, total: u32 },

    /// Engine construction failed
    #[error(transparent)]
    Engine(#[from] spiping_core::Error),
}

/// What each reply is checked against
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Check {
    /// Reply must echo the message
    Loopback,
    /// Reply must equal these bytes, zero padded to the frame
    Peer(Vec<u8>),
    /// Reply is only reported
    Report,
}

/// Run settings after applying CLI overrides to the profile
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub config: TransactionConfig,
    pub message: Vec<u8>,
    pub check: Check,
    pub period_ms: u32,
    pub count: Option<u32>,
}

/// Strip the NUL padding of a built-in reply
fn trim_nul(bytes: &[u8]) -> &[u8] {
    let end = bytes.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
    &bytes[..end]
}

impl Settings {
    /// Apply `args` on top of the profile selected by `--mode`
    pub fn resolve(args: &RunArgs) -> Self {
        let profile = match args.mode {
            CheckMode::Peer => &profile::PEER,
            CheckMode::Loopback | CheckMode::Report => &profile::LOOPBACK,
        };
        log::debug!("Using {} profile", profile.name);

        let mut config = profile.config;
        if let Some(hz) = args.speed {
            config = config.with_frequency(hz);
        }
        if let Some(mode) = args.spi_mode.and_then(SpiMode::from_number) {
            config = config.with_mode(mode);
        }
        if args.lsb_first {
            config = config.with_bit_order(BitOrder::LsbFirst);
        }
        if let Some(cs) = args.cs {
            config = config.with_cs_strategy(match cs {
                CsArg::Software => CsStrategy::Software,
                CsArg::Hardware => CsStrategy::Hardware,
                CsArg::None => CsStrategy::None,
            });
        }

        let message = match &args.message {
            Some(text) => text.as_bytes().to_vec(),
            None => profile.message.as_bytes().to_vec(),
        };

        let check = match args.mode {
            CheckMode::Peer => {
                let reply = match &args.expect {
                    Some(text) => text.as_bytes().to_vec(),
                    None => trim_nul(profile::PEER_REPLY.as_bytes()).to_vec(),
                };
                Check::Peer(reply)
            }
            CheckMode::Loopback | CheckMode::Report => {
                if args.expect.is_some() {
                    log::warn!("--expect is only used with --mode peer, ignoring it");
                }
                if args.mode == CheckMode::Loopback {
                    Check::Loopback
                } else {
                    Check::Report
                }
            }
        };

        let requested = args.period_ms.unwrap_or(profile.period_ms);
        let period_ms = profile::clamp_period_ms(requested);
        if period_ms != requested {
            log::warn!("Period {} ms out of range, using {} ms", requested, period_ms);
        }

        Self {
            config,
            message,
            check,
            period_ms,
            count: args.count,
        }
    }

    /// Smallest frame that fits the message
    pub fn frame_len(&self) -> Result<usize, RunError> {
        let len = self.message.len();
        if len == 0 {
            return Err(RunError::EmptyMessage);
        }
        let frame = FRAME_SIZES
            .iter()
            .copied()
            .find(|&n| n >= len)
            .ok_or(RunError::MessageTooLong(len))?;

        if let Check::Peer(reply) = &self.check {
            if reply.len() > frame {
                return Err(RunError::ReplyTooLong {
                    found: reply.len(),
                    frame,
                });
            }
        }
        Ok(frame)
    }
}

/// Tally of cycle results
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Summary {
    pub cycles: u32,
    pub passed: u32,
    pub mismatched: u32,
    pub unchecked: u32,
    pub bus_errors: u32,
}

impl Summary {
    fn record(&mut self, status: TransactionStatus, outcome: Option<ValidationOutcome>) {
        self.cycles = self.cycles.saturating_add(1);
        let tally = match (status, outcome) {
            (TransactionStatus::BusError(_), _) => &mut self.bus_errors,
            (TransactionStatus::Ok, Some(ValidationOutcome::Passed)) => &mut self.passed,
            (TransactionStatus::Ok, Some(o)) if o.is_mismatch() => &mut self.mismatched,
            (TransactionStatus::Ok, _) => &mut self.unchecked,
        };
        *tally = tally.saturating_add(1);
    }

    fn done(&self, count: Option<u32>) -> bool {
        count.is_some_and(|n| self.cycles >= n)
    }

    /// Cycles that hit a bus error or a mismatch
    pub fn failed(&self) -> u32 {
        self.mismatched.saturating_add(self.bus_errors)
    }

    /// Log the tally; a counted run with failures becomes an error
    pub fn finish(self) -> Result<Self, RunError> {
        log::info!(
            "{} cycles: {} passed, {} mismatched, {} unchecked, {} bus errors",
            self.cycles,
            self.passed,
            self.mismatched,
            self.unchecked,
            self.bus_errors
        );
        if self.failed() > 0 {
            return Err(RunError::CyclesFailed {
                failed: self.failed(),
                total: self.cycles,
            });
        }
        Ok(self)
    }
}

/// Build an engine for an `N`-byte frame
pub fn build_engine<const N: usize, T: BusTransport, C: ChipSelect>(
    settings: &Settings,
    bus: T,
    cs: C,
) -> Result<Engine<T, C, N>, RunError> {
    let tx = Message::<N>::padded(&settings.message)
        .ok_or(RunError::MessageTooLong(settings.message.len()))?;

    let policy = match &settings.check {
        Check::Loopback => ValidationPolicy::Loopback,
        Check::Report => ValidationPolicy::ReportOnly,
        Check::Peer(reply) => {
            ValidationPolicy::PeerResponse(Message::padded(reply).ok_or(RunError::ReplyTooLong {
                found: reply.len(),
                frame: N,
            })?)
        }
    };

    Ok(Engine::with_chip_select(settings.config, bus, cs, tx, policy)?)
}

/// Run cycles until `settings.count` is reached (forever without a count)
pub fn drive<const N: usize, T: BusTransport, C: ChipSelect>(
    settings: &Settings,
    bus: T,
    cs: C,
) -> Result<Summary, RunError> {
    let mut engine = build_engine::<N, T, C>(settings, bus, cs)?;
    let period = Duration::from_millis(u64::from(settings.period_ms));
    let mut summary = Summary::default();

    log::info!(
        "Sending {} bytes every {} ms ({} policy)",
        N,
        settings.period_ms,
        engine.policy().name()
    );

    while !summary.done(settings.count) {
        if summary.cycles > 0 {
            std::thread::sleep(period);
        }

        let result = engine.run_once();
        summary.record(result.status, result.outcome);

        if let Some(report) = engine.report() {
            report.log();
        }
    }

    Ok(summary)
}

/// Execute the `run` command
pub fn run(args: &RunArgs) -> Result<(), Box<dyn std::error::Error>> {
    let settings = Settings::resolve(args);
    let frame = settings.frame_len()?;
    if frame != settings.message.len() {
        log::warn!(
            "Message zero padded from {} to {} bytes",
            settings.message.len(),
            frame
        );
    }

    let opened = transports::open_transport(&args.transport)?;
    let cs: Box<dyn ChipSelect + Send> = if settings.config.software_cs() {
        transports::open_chip_select(args.cs_gpio.as_deref(), &opened.info)?
    } else {
        if args.cs_gpio.is_some() {
            log::warn!(
                "--cs-gpio is only used with software chip select ({:?} selected)",
                settings.config.cs_strategy
            );
        }
        Box::new(NoChipSelect)
    };

    let bus = opened.bus;
    let summary = match frame {
        8 => drive::<8, _, _>(&settings, bus, cs)?,
        14 => drive::<14, _, _>(&settings, bus, cs)?,
        16 => drive::<16, _, _>(&settings, bus, cs)?,
        32 => drive::<32, _, _>(&settings, bus, cs)?,
        64 => drive::<64, _, _>(&settings, bus, cs)?,
        other => return Err(RunError::MessageTooLong(other).into()),
    };

    summary.finish()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{Cli, Commands};
    use clap::Parser;

    fn args(extra: &[&str]) -> RunArgs {
        let mut argv = vec!["spiping", "run", "-t", "dummy"];
        argv.extend_from_slice(extra);
        match Cli::try_parse_from(argv).unwrap().command {
            Commands::Run(args) => args,
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn test_resolve_loopback_defaults() {
        let settings = Settings::resolve(&args(&[]));
        assert_eq!(settings.config, profile::LOOPBACK.config);
        assert_eq!(settings.message, b"Hello from nRF");
        assert_eq!(settings.check, Check::Loopback);
        assert_eq!(settings.period_ms, profile::DEFAULT_PERIOD_MS);
        assert_eq!(settings.count, None);
        assert_eq!(settings.frame_len().unwrap(), 14);
    }

    #[test]
    fn test_resolve_peer_defaults() {
        let settings = Settings::resolve(&args(&["--mode", "peer"]));
        assert_eq!(settings.config, profile::PEER.config);
        assert_eq!(settings.check, Check::Peer(b"Hi from STM32".to_vec()));
        assert_eq!(settings.frame_len().unwrap(), 14);
    }

    #[test]
    fn test_resolve_overrides() {
        let settings = Settings::resolve(&args(&[
            "--speed",
            "500k",
            "--spi-mode",
            "3",
            "--lsb-first",
            "--cs",
            "none",
            "--period-ms",
            "0",
            "--message",
            "ping",
            "--mode",
            "report",
        ]));
        assert_eq!(settings.config.clock_frequency_hz, 500_000);
        assert_eq!(settings.config.mode, SpiMode::Mode3);
        assert_eq!(settings.config.bit_order, BitOrder::LsbFirst);
        assert_eq!(settings.config.cs_strategy, CsStrategy::None);
        assert_eq!(settings.period_ms, profile::MIN_PERIOD_MS);
        assert_eq!(settings.check, Check::Report);
        assert_eq!(settings.frame_len().unwrap(), 8);
    }

    #[test]
    fn test_frame_len() {
        let mut settings = Settings::resolve(&args(&[]));
        for (len, frame) in [(1, 8), (8, 8), (9, 14), (15, 16), (17, 32), (64, 64)] {
            settings.message = vec![b'x'; len];
            assert_eq!(settings.frame_len().unwrap(), frame, "len {}", len);
        }

        settings.message = vec![b'x'; 65];
        assert!(matches!(settings.frame_len(), Err(RunError::MessageTooLong(65))));

        settings.message.clear();
        assert!(matches!(settings.frame_len(), Err(RunError::EmptyMessage)));

        let settings = Settings::resolve(&args(&["--mode", "peer", "--message", "hi"]));
        assert!(matches!(
            settings.frame_len(),
            Err(RunError::ReplyTooLong { found: 13, frame: 8 })
        ));
    }

    #[test]
    fn test_summary() {
        let mut summary = Summary::default();
        summary.record(TransactionStatus::Ok, Some(ValidationOutcome::Passed));
        summary.record(TransactionStatus::Ok, Some(ValidationOutcome::Unexpected));
        summary.record(TransactionStatus::Ok, Some(ValidationOutcome::Unchecked));
        summary.record(
            TransactionStatus::BusError(spiping_core::ErrorCode::IO),
            None,
        );
        assert_eq!(summary.cycles, 4);
        assert_eq!(summary.failed(), 2);
        assert!(summary.done(Some(4)));
        assert!(!summary.done(None));
        assert!(matches!(
            summary.finish(),
            Err(RunError::CyclesFailed { failed: 2, total: 4 })
        ));
    }

    #[test]
    fn test_summary_saturates() {
        let mut summary = Summary {
            cycles: u32::MAX,
            passed: u32::MAX,
            bus_errors: u32::MAX,
            mismatched: 1,
            ..Default::default()
        };
        summary.record(TransactionStatus::Ok, Some(ValidationOutcome::Passed));
        assert_eq!(summary.cycles, u32::MAX);
        assert_eq!(summary.passed, u32::MAX);
        assert_eq!(summary.failed(), u32::MAX);
        assert!(summary.done(Some(u32::MAX)));
    }

    #[cfg(feature = "dummy")]
    mod dummy_runs {
        use super::*;
        use spiping_dummy::{EchoTransport, FailingTransport, PeerTransport, SilentTransport};

        #[test]
        fn test_loopback_cycles() {
            let settings = Settings::resolve(&args(&["--count", "3", "--period-ms", "1"]));
            let summary =
                drive::<14, _, _>(&settings, EchoTransport::new(), NoChipSelect).unwrap();
            assert_eq!(summary.cycles, 3);
            assert_eq!(summary.passed, 3);
            assert!(summary.finish().is_ok());
        }

        #[test]
        fn test_padded_message() {
            let settings = Settings::resolve(&args(&[
                "--message",
                "Hello, SPI bus!",
                "--count",
                "1",
            ]));
            assert_eq!(settings.frame_len().unwrap(), 16);
            let summary =
                drive::<16, _, _>(&settings, EchoTransport::new(), NoChipSelect).unwrap();
            assert_eq!(summary.passed, 1);
        }

        #[test]
        fn test_peer_cycles() {
            let settings = Settings::resolve(&args(&["--mode", "peer", "--count", "2"]));
            let peer = PeerTransport::new(b"Hi from STM32").unwrap();
            let summary = drive::<14, _, _>(&settings, peer, NoChipSelect).unwrap();
            assert_eq!(summary.passed, 2);

            let summary = drive::<14, _, _>(&settings, SilentTransport, NoChipSelect).unwrap();
            assert_eq!(summary.mismatched, 2);
            assert!(summary.finish().is_err());
        }

        #[test]
        fn test_bus_errors_keep_running() {
            let settings = Settings::resolve(&args(&["--count", "3", "--period-ms", "1"]));
            let bus = FailingTransport::failing_first(2, spiping_core::ErrorCode::IO);
            let summary = drive::<14, _, _>(&settings, bus, NoChipSelect).unwrap();
            assert_eq!(summary.bus_errors, 2);
            assert_eq!(summary.passed, 1);
        }

        #[test]
        fn test_zero_count() {
            let settings = Settings::resolve(&args(&["--count", "0"]));
            let summary =
                drive::<14, _, _>(&settings, EchoTransport::new(), NoChipSelect).unwrap();
            assert_eq!(summary.cycles, 0);
        }
    }
}
