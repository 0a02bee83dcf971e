//! CLI argument parsing

use crate::transports;
use clap::{Args, Parser, Subcommand, ValueEnum};

/// Parse a string as a hex or decimal u32
fn parse_hex_u32(s: &str) -> Result<u32, String> {
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16).map_err(|e| format!("Invalid hex value: {}", e))
    } else {
        s.parse::<u32>().map_err(|e| format!("Invalid number: {}", e))
    }
}

/// Parse a clock frequency, accepting k/M suffixes ("500k", "1M")
fn parse_frequency(s: &str) -> Result<u32, String> {
    let (digits, scale) = if let Some(n) = s.strip_suffix(['k', 'K']) {
        (n, 1_000)
    } else if let Some(n) = s.strip_suffix('M') {
        (n, 1_000_000)
    } else {
        (s, 1)
    };
    let value = parse_hex_u32(digits)?;
    match value.checked_mul(scale) {
        Some(0) => Err("Frequency must be non-zero".to_string()),
        Some(hz) => Ok(hz),
        None => Err(format!("Frequency too large: {}", s)),
    }
}

/// Generate dynamic help text for the transport argument
fn transport_help() -> String {
    format!(
        "Bus transport to use [available: {}]",
        transports::transport_names_short()
    )
}

#[derive(Parser)]
#[command(name = "spiping")]
#[command(author, version, about = "Periodic SPI master transaction driver", long_about = None)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run transaction cycles until interrupted (or --count is reached)
    Run(RunArgs),

    /// List available transports and built-in profiles
    List,
}

/// How received bytes are judged
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum CheckMode {
    /// MOSI wired to MISO: reply must equal the message
    #[default]
    Loopback,
    /// Peer device must reply with the expected response
    Peer,
    /// Only report what was received
    Report,
}

/// Who drives the chip select line
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum CsArg {
    /// Toggled by spiping around each transfer (needs --cs-gpio on real hardware)
    Software,
    /// Driven by the SPI controller
    Hardware,
    /// No chip select
    None,
}

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Transport specification: name or name:key=value,...
    #[arg(short, long, help = transport_help())]
    pub transport: String,

    /// Validation mode; also selects the built-in profile defaults
    #[arg(short, long, value_enum, default_value_t = CheckMode::Loopback)]
    pub mode: CheckMode,

    /// Message sent every cycle (default: "Hello from nRF")
    #[arg(long)]
    pub message: Option<String>,

    /// Expected peer reply, zero padded to the message length (default: "Hi from STM32")
    #[arg(long)]
    pub expect: Option<String>,

    /// Chip select strategy (default: from the profile)
    #[arg(long, value_enum)]
    pub cs: Option<CsArg>,

    /// GPIO line for software chip select: dev=/dev/gpiochipN|gpiochip=N,cs=<line>[,active_high=1]
    #[arg(long)]
    pub cs_gpio: Option<String>,

    /// SPI clock frequency in Hz (k/M suffixes accepted)
    #[arg(long, value_parser = parse_frequency)]
    pub speed: Option<u32>,

    /// SPI mode (CPOL/CPHA)
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=3))]
    pub spi_mode: Option<u8>,

    /// Shift the least significant bit first
    #[arg(long)]
    pub lsb_first: bool,

    /// Delay between cycles in milliseconds
    #[arg(short, long, value_parser = parse_hex_u32)]
    pub period_ms: Option<u32>,

    /// Stop after this many cycles
    #[arg(short = 'n', long)]
    pub count: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_frequency() {
        assert_eq!(parse_frequency("1000000"), Ok(1_000_000));
        assert_eq!(parse_frequency("500k"), Ok(500_000));
        assert_eq!(parse_frequency("8M"), Ok(8_000_000));
        assert_eq!(parse_frequency("0x100"), Ok(256));
        assert!(parse_frequency("0").is_err());
        assert!(parse_frequency("5000M").is_err());
        assert!(parse_frequency("fast").is_err());
    }

    #[test]
    fn test_run_args() {
        let cli = Cli::try_parse_from([
            "spiping",
            "-v",
            "run",
            "-t",
            "dummy",
            "--mode",
            "peer",
            "--cs",
            "hardware",
            "--spi-mode",
            "3",
            "--count",
            "5",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 1);

        let Commands::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.transport, "dummy");
        assert_eq!(args.mode, CheckMode::Peer);
        assert_eq!(args.cs, Some(CsArg::Hardware));
        assert_eq!(args.spi_mode, Some(3));
        assert_eq!(args.count, Some(5));
        assert!(!args.lsb_first);
        assert!(args.message.is_none());
    }

    #[test]
    fn test_run_args_rejected() {
        assert!(Cli::try_parse_from(["spiping", "run"]).is_err());
        assert!(Cli::try_parse_from(["spiping", "run", "-t", "dummy", "--spi-mode", "4"]).is_err());
        assert!(Cli::try_parse_from(["spiping", "run", "-t", "dummy", "--mode", "echo"]).is_err());
    }
}
