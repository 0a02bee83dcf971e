//! SPI transaction engine
//!
//! The engine owns one fixed-length transmit message, the receive buffer of
//! the same length, a bus configuration and the collaborators that move the
//! bytes. Each call to `Engine::run_once` walks one full cycle of the state
//! machine:
//!
//! ```text
//! Idle -> CsAssert -> Transfer -> CsDeassert -> Validate -> Wait -> Idle
//! ```
//!
//! `CsAssert` and `CsDeassert` only touch the line for `CsStrategy::Software`.
//! `Transfer` is the only blocking step. The `Wait` delay itself belongs to
//! the caller's loop; the next `run_once` leaves `Wait` before starting.
//!
//! Whatever the transfer does, the software CS line is back at its idle level
//! when `run_once` returns.

use crate::config::TransactionConfig;
use crate::error::{Error, Result};
use crate::message::Message;
use crate::report::{CycleReport, TransactionResult, TransactionStatus};
use crate::transport::{BusTransport, ChipSelect, NoChipSelect};
use crate::validate::{ValidationOutcome, ValidationPolicy};
use maybe_async::maybe_async;

/// Engine state
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum State {
    /// Ready to start a cycle
    Idle,
    /// Asserting chip select
    CsAssert,
    /// Transfer in progress
    Transfer,
    /// Returning chip select to idle
    CsDeassert,
    /// Judging the received bytes
    Validate,
    /// Cycle finished, waiting for the next period
    Wait,
}

/// Inputs to the state machine
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Event {
    /// A new cycle begins
    Start,
    /// Chip select is active (or needs no action)
    Asserted,
    /// Transport exchanged all bytes
    Transferred,
    /// Transport reported an error
    TransferFailed,
    /// Chip select is back at idle
    Deasserted,
    /// Validation done (or skipped after a bus error)
    Validated,
    /// The wait period is over
    PeriodElapsed,
}

/// What the engine must do after a transition
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Action {
    /// Nothing to do
    DoNothing,
    /// Event not valid in the current state
    Reject,
    /// Drive software CS active
    AssertCs,
    /// Run the bus transfer
    Transfer,
    /// Drive software CS idle
    DeassertCs,
    /// Apply the validation policy
    Validate,
    /// Cycle complete, hand the result to the caller
    Report,
}

impl State {
    /// Transition table
    ///
    /// An event that does not belong to the current state leaves it unchanged
    /// and yields `Action::Reject`.
    pub fn next(self, event: Event) -> (State, Action) {
        match (self, event) {
            (State::Idle, Event::Start) => (State::CsAssert, Action::AssertCs),
            (State::CsAssert, Event::Asserted) => (State::Transfer, Action::Transfer),
            (State::Transfer, Event::Transferred) => (State::CsDeassert, Action::DeassertCs),
            (State::Transfer, Event::TransferFailed) => (State::CsDeassert, Action::DeassertCs),
            (State::CsDeassert, Event::Deasserted) => (State::Validate, Action::Validate),
            (State::Validate, Event::Validated) => (State::Wait, Action::Report),
            (State::Wait, Event::PeriodElapsed) => (State::Idle, Action::DoNothing),
            (s, _e) => (s, Action::Reject),
        }
    }
}

/// Single-bus SPI transaction engine
///
/// `T` is the bus transport, `C` the software chip select controller
/// (`NoChipSelect` when the transport or nobody owns CS) and `N` the message
/// length.
pub struct Engine<T, C, const N: usize> {
    config: TransactionConfig,
    transport: T,
    cs: C,
    tx: Message<N>,
    rx: [u8; N],
    policy: ValidationPolicy<N>,
    state: State,
    cycle: u32,
    status: Option<TransactionStatus>,
    outcome: Option<ValidationOutcome>,
}

impl<T: BusTransport, const N: usize> Engine<T, NoChipSelect, N> {
    /// Create an engine for hardware-managed or absent chip select
    ///
    /// Fails with `Error::MissingChipSelect` if `config` asks for software CS.
    pub fn new(
        config: TransactionConfig,
        transport: T,
        tx: Message<N>,
        policy: ValidationPolicy<N>,
    ) -> Result<Self> {
        if config.software_cs() {
            return Err(Error::MissingChipSelect);
        }
        Self::build(config, transport, NoChipSelect, tx, policy)
    }
}

impl<T: BusTransport, C: ChipSelect, const N: usize> Engine<T, C, N> {
    /// Create an engine that drives chip select through `cs`
    ///
    /// The line is deasserted once here so the first cycle starts idle.
    pub fn with_chip_select(
        config: TransactionConfig,
        transport: T,
        mut cs: C,
        tx: Message<N>,
        policy: ValidationPolicy<N>,
    ) -> Result<Self> {
        if !config.software_cs() {
            log::debug!(
                "engine: chip select controller unused with {:?}",
                config.cs_strategy
            );
        }
        cs.deassert();
        Self::build(config, transport, cs, tx, policy)
    }

    fn build(
        config: TransactionConfig,
        transport: T,
        cs: C,
        tx: Message<N>,
        policy: ValidationPolicy<N>,
    ) -> Result<Self> {
        config.validate()?;
        tx.check()?;

        log::debug!(
            "engine: {} bytes, {} Hz, mode {}, {:?} CS, {} policy",
            N,
            config.clock_frequency_hz,
            config.mode.number(),
            config.cs_strategy,
            policy.name()
        );

        Ok(Self {
            config,
            transport,
            cs,
            tx,
            rx: [0; N],
            policy,
            state: State::Idle,
            cycle: 0,
            status: None,
            outcome: None,
        })
    }

    /// Run one transaction cycle
    ///
    /// Never fails: a transport error is returned as
    /// `TransactionStatus::BusError` and the engine is ready for the next
    /// cycle. Received bytes are only exposed when the transfer succeeded.
    #[maybe_async]
    pub async fn run_once(&mut self) -> TransactionResult<'_, N> {
        self.enter_idle();
        self.cycle = self.cycle.wrapping_add(1);

        let mut status = TransactionStatus::Ok;
        let mut outcome = None;
        let mut event = Event::Start;

        loop {
            let (state, action) = self.state.next(event);
            log::trace!("engine: {:?} --{:?}--> {:?}", self.state, event, state);
            self.state = state;

            event = match action {
                Action::AssertCs => {
                    self.assert_cs();
                    Event::Asserted
                }
                Action::Transfer => {
                    log::debug!("engine: transmitting {} bytes", N);
                    match self
                        .transport
                        .transceive(&self.config, self.tx.as_bytes(), &mut self.rx)
                        .await
                    {
                        Ok(()) => Event::Transferred,
                        Err(code) => {
                            status = TransactionStatus::BusError(code);
                            Event::TransferFailed
                        }
                    }
                }
                Action::DeassertCs => {
                    self.deassert_cs();
                    Event::Deasserted
                }
                Action::Validate => {
                    if status.is_ok() {
                        outcome = Some(self.policy.check(&self.tx, &self.rx));
                    }
                    Event::Validated
                }
                Action::Report => break,
                Action::DoNothing | Action::Reject => {
                    log::error!("engine: unexpected {:?} in state {:?}", event, self.state);
                    break;
                }
            };
        }

        self.status = Some(status);
        self.outcome = outcome;

        match status {
            TransactionStatus::Ok => TransactionResult {
                status,
                received: Some(&self.rx),
                outcome,
            },
            TransactionStatus::BusError(code) => TransactionResult::bus_error(code),
        }
    }

    /// Bring the engine back to `Idle` before a cycle
    ///
    /// A cycle interrupted mid-way (an async transfer dropped before
    /// completion) leaves the engine outside `Wait`; CS is released then.
    fn enter_idle(&mut self) {
        match self.state {
            State::Idle => {}
            State::Wait => {
                let (state, _) = self.state.next(Event::PeriodElapsed);
                self.state = state;
            }
            interrupted => {
                log::warn!("engine: recovering from interrupted cycle in {:?}", interrupted);
                self.deassert_cs();
                self.state = State::Idle;
            }
        }
    }

    fn assert_cs(&mut self) {
        if self.config.software_cs() {
            self.cs.assert();
            log::debug!("engine: CS asserted");
        }
    }

    fn deassert_cs(&mut self) {
        if self.config.software_cs() {
            self.cs.deassert();
            log::debug!("engine: CS deasserted");
        }
    }

    /// Report for the most recent cycle, if any ran
    pub fn report(&self) -> Option<CycleReport<'_, N>> {
        let status = self.status?;
        Some(CycleReport {
            cycle: self.cycle,
            status,
            received: status.is_ok().then_some(&self.rx),
            outcome: self.outcome,
        })
    }

    /// Current state
    pub fn state(&self) -> State {
        self.state
    }

    /// Number of cycles started so far
    pub fn cycle(&self) -> u32 {
        self.cycle
    }

    /// Bus configuration
    pub fn config(&self) -> &TransactionConfig {
        &self.config
    }

    /// Active validation policy
    pub fn policy(&self) -> &ValidationPolicy<N> {
        &self.policy
    }

    /// Transmit message
    pub fn tx(&self) -> &Message<N> {
        &self.tx
    }

    /// Access the transport
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Mutable access to the transport
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Access the chip select controller
    pub fn chip_select(&self) -> &C {
        &self.cs
    }

    /// Tear the engine down, returning its collaborators
    pub fn into_parts(self) -> (T, C) {
        (self.transport, self.cs)
    }
}

#[cfg(all(test, feature = "is_sync"))]
mod tests {
    use super::*;
    use crate::config::CsStrategy;
    use crate::error::{ConfigError, ErrorCode};
    use core::cell::RefCell;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Step {
        CsLow,
        CsHigh,
        Transfer,
    }

    type Trace = RefCell<heapless::Vec<Step, 64>>;

    fn record(trace: &Trace, step: Step) {
        trace.borrow_mut().push(step).unwrap();
    }

    /// What the mock bus does with each transfer
    enum Reply {
        Echo,
        Fixed(&'static [u8]),
        Cycle(&'static [&'static [u8]]),
        Fail(ErrorCode),
    }

    struct MockBus<'a> {
        trace: &'a Trace,
        reply: Reply,
        transfers: usize,
    }

    impl<'a> MockBus<'a> {
        fn new(trace: &'a Trace, reply: Reply) -> Self {
            Self {
                trace,
                reply,
                transfers: 0,
            }
        }
    }

    impl BusTransport for MockBus<'_> {
        fn transceive(
            &mut self,
            _config: &TransactionConfig,
            tx: &[u8],
            rx: &mut [u8],
        ) -> core::result::Result<(), ErrorCode> {
            record(self.trace, Step::Transfer);
            let n = self.transfers;
            self.transfers += 1;
            match self.reply {
                Reply::Echo => rx.copy_from_slice(tx),
                Reply::Fixed(bytes) => rx.copy_from_slice(bytes),
                Reply::Cycle(replies) => rx.copy_from_slice(replies[n % replies.len()]),
                Reply::Fail(code) => return Err(code),
            }
            Ok(())
        }
    }

    struct MockCs<'a> {
        trace: &'a Trace,
        active: bool,
    }

    impl<'a> MockCs<'a> {
        fn new(trace: &'a Trace) -> Self {
            Self {
                trace,
                active: false,
            }
        }
    }

    impl ChipSelect for MockCs<'_> {
        fn assert(&mut self) {
            record(self.trace, Step::CsLow);
            self.active = true;
        }

        fn deassert(&mut self) {
            record(self.trace, Step::CsHigh);
            self.active = false;
        }
    }

    const HELLO: Message<14> = Message::new(*b"Hello from nRF");

    fn software() -> TransactionConfig {
        TransactionConfig::new().with_cs_strategy(CsStrategy::Software)
    }

    #[test]
    fn test_transition_table() {
        let mut state = State::Idle;
        for (event, expected) in [
            (Event::Start, State::CsAssert),
            (Event::Asserted, State::Transfer),
            (Event::TransferFailed, State::CsDeassert),
            (Event::Deasserted, State::Validate),
            (Event::Validated, State::Wait),
            (Event::PeriodElapsed, State::Idle),
        ] {
            let (next, action) = state.next(event);
            assert_ne!(action, Action::Reject);
            assert_eq!(next, expected);
            state = next;
        }

        assert_eq!(State::Idle.next(Event::Transferred), (State::Idle, Action::Reject));
        assert_eq!(State::Wait.next(Event::Start), (State::Wait, Action::Reject));
        assert_eq!(
            State::Transfer.next(Event::Transferred),
            (State::CsDeassert, Action::DeassertCs)
        );
    }

    #[test]
    fn test_loopback_hello() {
        let trace = Trace::default();
        let bus = MockBus::new(&trace, Reply::Echo);
        let mut engine = Engine::with_chip_select(
            software(),
            bus,
            MockCs::new(&trace),
            HELLO,
            ValidationPolicy::Loopback,
        )
        .unwrap();

        let result = engine.run_once();
        assert_eq!(result.status, TransactionStatus::Ok);
        assert_eq!(result.received, Some(b"Hello from nRF"));
        assert_eq!(result.outcome, Some(ValidationOutcome::Passed));
        assert!(result.passed());
        assert_eq!(engine.state(), State::Wait);
    }

    #[test]
    fn test_peer_silent_is_unexpected() {
        let trace = Trace::default();
        let bus = MockBus::new(&trace, Reply::Fixed(&[0; 14]));
        let expected = Message::new(*b"Hi from STM32\0");
        let config = TransactionConfig::new().with_cs_strategy(CsStrategy::Hardware);
        let mut engine =
            Engine::new(config, bus, HELLO, ValidationPolicy::PeerResponse(expected)).unwrap();

        let result = engine.run_once();
        assert_eq!(result.status, TransactionStatus::Ok);
        assert_eq!(result.received, Some(&[0u8; 14]));
        assert_eq!(result.outcome, Some(ValidationOutcome::Unexpected));
    }

    #[test]
    fn test_peer_exact_reply_passes() {
        let trace = Trace::default();
        let bus = MockBus::new(&trace, Reply::Fixed(b"Hi from STM32\0"));
        let expected = Message::new(*b"Hi from STM32\0");
        let mut engine = Engine::new(
            TransactionConfig::new(),
            bus,
            HELLO,
            ValidationPolicy::PeerResponse(expected),
        )
        .unwrap();

        assert_eq!(engine.run_once().outcome, Some(ValidationOutcome::Passed));
    }

    #[test]
    fn test_bus_error_releases_cs() {
        let trace = Trace::default();
        let bus = MockBus::new(&trace, Reply::Fail(ErrorCode(-5)));
        let mut engine = Engine::with_chip_select(
            software(),
            bus,
            MockCs::new(&trace),
            HELLO,
            ValidationPolicy::Loopback,
        )
        .unwrap();

        let result = engine.run_once();
        assert_eq!(result.status, TransactionStatus::BusError(ErrorCode(-5)));
        assert_eq!(result.received, None);
        assert_eq!(result.outcome, None);
        assert!(!result.passed());

        assert!(!engine.chip_select().active);
        assert_eq!(
            trace.borrow().as_slice(),
            &[Step::CsHigh, Step::CsLow, Step::Transfer, Step::CsHigh]
        );
    }

    #[test]
    fn test_bus_error_retried_next_cycle() {
        let trace = Trace::default();
        let bus = MockBus::new(&trace, Reply::Fail(ErrorCode::NO_DEVICE));
        let mut engine =
            Engine::new(TransactionConfig::new(), bus, HELLO, ValidationPolicy::Loopback).unwrap();

        for cycle in 1..=3 {
            let result = engine.run_once();
            assert_eq!(result.status, TransactionStatus::BusError(ErrorCode::NO_DEVICE));
            assert_eq!(engine.cycle(), cycle);
        }
        assert_eq!(engine.transport().transfers, 3);
    }

    #[test]
    fn test_hardware_cs_not_touched() {
        for strategy in [CsStrategy::Hardware, CsStrategy::None] {
            let trace = Trace::default();
            let bus = MockBus::new(&trace, Reply::Echo);
            let config = TransactionConfig::new().with_cs_strategy(strategy);
            let mut engine = Engine::with_chip_select(
                config,
                bus,
                MockCs::new(&trace),
                HELLO,
                ValidationPolicy::Loopback,
            )
            .unwrap();

            engine.run_once();
            // Only the initial deassert from construction
            assert_eq!(trace.borrow().as_slice(), &[Step::CsHigh, Step::Transfer]);
        }
    }

    #[test]
    fn test_repeated_cycles_identical() {
        let trace = Trace::default();
        let bus = MockBus::new(&trace, Reply::Echo);
        let mut engine = Engine::with_chip_select(
            software(),
            bus,
            MockCs::new(&trace),
            HELLO,
            ValidationPolicy::Loopback,
        )
        .unwrap();

        let first = {
            let r = engine.run_once();
            (r.status, *r.received.unwrap(), r.outcome)
        };
        for _ in 0..9 {
            let r = engine.run_once();
            assert_eq!((r.status, *r.received.unwrap(), r.outcome), first);
        }
        assert_eq!(engine.cycle(), 10);
        assert!(!engine.chip_select().active);
        // Initial deassert plus CS low, transfer and CS high per cycle
        assert_eq!(trace.borrow().len(), 1 + 3 * 10);
    }

    #[test]
    fn test_rx_overwritten_each_cycle() {
        const REPLIES: &[&[u8]] = &[b"AAAA", b"BB\0\0"];
        let trace = Trace::default();
        let bus = MockBus::new(&trace, Reply::Cycle(REPLIES));
        let mut engine = Engine::new(
            TransactionConfig::new(),
            bus,
            Message::new(*b"ping"),
            ValidationPolicy::ReportOnly,
        )
        .unwrap();

        assert_eq!(engine.run_once().received, Some(b"AAAA"));
        assert_eq!(engine.run_once().received, Some(b"BB\0\0"));
        assert_eq!(engine.run_once().outcome, Some(ValidationOutcome::Unchecked));
    }

    #[test]
    fn test_report_tracks_last_cycle() {
        let trace = Trace::default();
        let bus = MockBus::new(&trace, Reply::Echo);
        let mut engine =
            Engine::new(TransactionConfig::new(), bus, HELLO, ValidationPolicy::Loopback).unwrap();

        assert!(engine.report().is_none());
        engine.run_once();

        let report = engine.report().unwrap();
        assert_eq!(report.cycle, 1);
        assert_eq!(report.status, TransactionStatus::Ok);
        assert_eq!(report.received, Some(HELLO.as_bytes()));
        assert_eq!(report.outcome, Some(ValidationOutcome::Passed));
    }

    #[test]
    fn test_construction_errors() {
        let trace = Trace::default();

        let result = Engine::new(
            software(),
            MockBus::new(&trace, Reply::Echo),
            HELLO,
            ValidationPolicy::Loopback,
        );
        assert!(matches!(result, Err(Error::MissingChipSelect)));

        let result = Engine::new(
            TransactionConfig::new().with_frequency(0),
            MockBus::new(&trace, Reply::Echo),
            HELLO,
            ValidationPolicy::Loopback,
        );
        assert!(matches!(
            result,
            Err(Error::InvalidConfig(ConfigError::ZeroFrequency))
        ));

        let result = Engine::new(
            TransactionConfig::new(),
            MockBus::new(&trace, Reply::Echo),
            Message::<0>::new([]),
            ValidationPolicy::Loopback,
        );
        assert!(matches!(result, Err(Error::EmptyMessage)));
    }
}
