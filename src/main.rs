//! spiping - Periodic SPI master transaction driver
//!
//! Sends the same message over an SPI bus once per period and checks what
//! comes back, either against the message itself (MOSI wired to MISO) or
//! against the fixed reply of a peer device.
//!
//! # Architecture
//!
//! The transaction engine in `spiping-core` owns the cycle: chip select
//! sequencing, transceive and validation. The bus itself is a `BusTransport`:
//! - **In-memory transports** (dummy, dummy_peer, ...) - For bring-up and tests
//! - **Linux spidev** - Kernel SPI controller, hardware or software CS
//! - **Linux GPIO** - Bitbanged bus, plus GPIO chip select for spidev
//!
//! Every cycle is reported through the `log` facade; a bus error never stops
//! the loop.

mod cli;
mod commands;
mod transports;

use clap::Parser;
use cli::{Cli, Commands};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logger; RUST_LOG still overrides the verbosity flags
    env_logger::Builder::new()
        .filter_level(log_level(cli.verbose))
        .parse_env(env_logger::Env::default())
        .init();

    match cli.command {
        Commands::Run(args) => commands::run::run(&args),
        Commands::List => {
            commands::list();
            Ok(())
        }
    }
}

/// Log level for the number of -v flags
fn log_level(verbose: u8) -> log::LevelFilter {
    match verbose {
        0 => log::LevelFilter::Info,
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level() {
        assert_eq!(log_level(0), log::LevelFilter::Info);
        assert_eq!(log_level(1), log::LevelFilter::Debug);
        assert_eq!(log_level(2), log::LevelFilter::Trace);
        assert_eq!(log_level(5), log::LevelFilter::Trace);
    }

    #[test]
    fn test_verbose_flag_enables_debug() {
        let cli = Cli::try_parse_from(["spiping", "-v", "list"]).unwrap();
        let logger = env_logger::Builder::new()
            .filter_level(log_level(cli.verbose))
            .build();
        let debug = log::MetadataBuilder::new()
            .level(log::Level::Debug)
            .target("spiping")
            .build();
        let trace = log::MetadataBuilder::new()
            .level(log::Level::Trace)
            .target("spiping")
            .build();

        assert!(log::Log::enabled(&logger, &debug));
        assert!(!log::Log::enabled(&logger, &trace));
    }
}
