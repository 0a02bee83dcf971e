//! Built-in startup profiles
//!
//! Constant configurations for the two classic bring-up setups:
//!
//! - **LOOPBACK**: MOSI wired to MISO, CS toggled in software, reply must echo
//!   the message
//! - **PEER**: a second board replies with a fixed greeting, CS driven by the
//!   SPI peripheral, bus locked to this configuration

use crate::config::{CsStrategy, TransactionConfig, TransferFlags, DEFAULT_FREQUENCY_HZ};
use crate::message::Message;
use crate::validate::ValidationPolicy;

/// Default delay between cycles in milliseconds
pub const DEFAULT_PERIOD_MS: u32 = 1000;

/// Shortest accepted delay between cycles
pub const MIN_PERIOD_MS: u32 = 1;

/// Longest accepted delay between cycles
pub const MAX_PERIOD_MS: u32 = 60_000;

/// Length of the built-in messages
pub const HELLO_LEN: usize = 14;

/// Greeting sent by the controller
pub const HELLO: Message<HELLO_LEN> = Message::new(*b"Hello from nRF");

/// Reply expected from the peer, NUL padded to the message length
pub const PEER_REPLY: Message<HELLO_LEN> = Message::new(*b"Hi from STM32\0");

/// A complete startup configuration
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Profile<const N: usize> {
    /// Profile name
    pub name: &'static str,
    /// Bus configuration
    pub config: TransactionConfig,
    /// Message sent every cycle
    pub message: Message<N>,
    /// How the reply is judged
    pub policy: ValidationPolicy<N>,
    /// Delay between cycles in milliseconds
    pub period_ms: u32,
}

/// Loopback self-test: software CS, reply must equal `HELLO`
pub const LOOPBACK: Profile<HELLO_LEN> = Profile {
    name: "loopback",
    config: TransactionConfig::new()
        .with_frequency(DEFAULT_FREQUENCY_HZ)
        .with_cs_strategy(CsStrategy::Software),
    message: HELLO,
    policy: ValidationPolicy::Loopback,
    period_ms: DEFAULT_PERIOD_MS,
};

/// Peer test: hardware CS, reply must equal `PEER_REPLY`
pub const PEER: Profile<HELLO_LEN> = Profile {
    name: "peer",
    config: TransactionConfig::new()
        .with_frequency(DEFAULT_FREQUENCY_HZ)
        .with_cs_strategy(CsStrategy::Hardware)
        .with_flags(TransferFlags::LOCK_ON),
    message: HELLO,
    policy: ValidationPolicy::PeerResponse(PEER_REPLY),
    period_ms: DEFAULT_PERIOD_MS,
};

/// Built-in profiles, by name
pub static PROFILES: [Profile<HELLO_LEN>; 2] = [LOOPBACK, PEER];

/// Look up a built-in profile by name
pub fn find(name: &str) -> Option<&'static Profile<HELLO_LEN>> {
    PROFILES.iter().find(|p| p.name == name)
}

/// Clamp a requested period into the accepted range
pub const fn clamp_period_ms(ms: u32) -> u32 {
    if ms < MIN_PERIOD_MS {
        MIN_PERIOD_MS
    } else if ms > MAX_PERIOD_MS {
        MAX_PERIOD_MS
    } else {
        ms
    }
}
