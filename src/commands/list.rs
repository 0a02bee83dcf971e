//! List command implementation

use crate::transports;
use spiping_core::profile::{self, Profile, PROFILES};
use spiping_core::report::EscapedAscii;
use spiping_core::validate::ValidationPolicy;

/// List available transports and built-in profiles
pub fn list() {
    println!("Available transports:");
    println!();
    for t in transports::available_transports() {
        let kind = if t.hardware { "hardware" } else { "in-memory" };
        println!("  {:16} {:10} {}", t.name, kind, t.description);
        if !t.aliases.is_empty() {
            println!("  {:16} {:10} aliases: {}", "", "", t.aliases.join(", "));
        }
    }

    println!();
    println!("Built-in profiles (--mode):");
    println!();
    println!(
        "  {:10} {:10} {:>10} {:>8}  {}",
        "Name", "CS", "Clock", "Period", "Expected reply"
    );
    println!("  {}", "-".repeat(64));
    for p in &PROFILES {
        println!(
            "  {:10} {:10} {:>10} {:>8}  {}",
            p.name,
            format!("{:?}", p.config.cs_strategy),
            format_frequency(p.config.clock_frequency_hz),
            format!("{} ms", p.period_ms),
            expected_reply(p)
        );
    }
    println!();
    println!(
        "Periods are clamped to {}..={} ms.",
        profile::MIN_PERIOD_MS,
        profile::MAX_PERIOD_MS
    );
}

fn expected_reply<const N: usize>(p: &Profile<N>) -> String {
    match &p.policy {
        ValidationPolicy::Loopback => "echo of message".to_string(),
        ValidationPolicy::PeerResponse(reply) => format!("\"{}\"", EscapedAscii(reply.as_bytes())),
        ValidationPolicy::ReportOnly => "-".to_string(),
    }
}

fn format_frequency(hz: u32) -> String {
    if hz >= 1_000_000 && hz % 1_000_000 == 0 {
        format!("{} MHz", hz / 1_000_000)
    } else if hz >= 1_000 && hz % 1_000 == 0 {
        format!("{} kHz", hz / 1_000)
    } else {
        format!("{} Hz", hz)
    }
}
