//! Transport registration and dispatch
//!
//! This module provides a centralized registry for all bus transports, with
//! support for feature-gated inclusion and dynamic help text generation.

use spiping_core::transport::{BusTransport, ChipSelect, NoChipSelect, TransportInfo};

/// Get information about all available transports (enabled at compile time)
#[allow(unused_mut, clippy::vec_init_then_push)]
pub fn available_transports() -> Vec<TransportInfo> {
    let mut transports = Vec::new();

    #[cfg(feature = "dummy")]
    {
        transports.push(TransportInfo {
            name: "dummy",
            aliases: &["echo", "loopback"],
            description: "In-memory loopback bus, MOSI wired to MISO",
            hardware: false,
        });
        transports.push(TransportInfo {
            name: "dummy_peer",
            aliases: &["peer"],
            description: "In-memory peer with a fixed reply (reply=<text>)",
            hardware: false,
        });
        transports.push(TransportInfo {
            name: "dummy_silent",
            aliases: &["silent"],
            description: "In-memory bus with nothing attached, reads zeros",
            hardware: false,
        });
        transports.push(TransportInfo {
            name: "dummy_fail",
            aliases: &["fail"],
            description: "In-memory bus that fails (code=<errno>,first=<n>)",
            hardware: false,
        });
        transports.push(TransportInfo {
            name: "dummy_bitbang",
            aliases: &[],
            description: "Bitbang transport over wired-loopback pins",
            hardware: false,
        });
    }

    #[cfg(feature = "linux-spi")]
    transports.push(TransportInfo {
        name: "linux_spi",
        aliases: &["linux-spi", "spidev"],
        description: "Linux spidev interface (dev=/dev/spidevX.Y,spispeed=<kHz>,mode=<0-3>)",
        hardware: true,
    });

    #[cfg(feature = "linux-gpio")]
    transports.push(TransportInfo {
        name: "linux_gpio_spi",
        aliases: &["linux-gpio-spi", "gpio"],
        description: "GPIO bitbang (dev=|gpiochip=,cs=,sck=,mosi=,miso=,spispeed=<kHz>)",
        hardware: true,
    });

    transports
}

/// Generate help text listing all available transports
pub fn transport_help() -> String {
    let transports = available_transports();

    if transports.is_empty() {
        return "No transports available (recompile with transport features enabled)".to_string();
    }

    let mut help = String::from("Available transports:\n");
    for t in &transports {
        help.push_str(&format!("  {:16} - {}\n", t.name, t.description));
    }
    help
}

/// Generate a short list of transport names for CLI help
pub fn transport_names_short() -> String {
    let transports = available_transports();
    let names: Vec<&str> = transports.iter().map(|t| t.name).collect();
    names.join(", ")
}

/// Look up a transport by name or alias
pub fn find_transport(name: &str) -> Option<TransportInfo> {
    available_transports()
        .into_iter()
        .find(|t| t.name == name || t.aliases.contains(&name))
}

/// Parse a transport string into name and options
///
/// Format: "name" or "name:option1=value1,option2=value2"
pub fn parse_transport_string(s: &str) -> Result<(&str, Vec<(&str, &str)>), String> {
    match s.split_once(':') {
        Some((name, opts)) => Ok((name, parse_options(opts)?)),
        None => Ok((s, Vec::new())),
    }
}

/// Parse "key=value,key=value" into pairs
fn parse_options(opts: &str) -> Result<Vec<(&str, &str)>, String> {
    opts.split(',')
        .filter(|opt| !opt.is_empty())
        .map(|opt| {
            opt.split_once('=').ok_or_else(|| {
                format!("Invalid parameter format: '{}' (expected key=value)", opt)
            })
        })
        .collect()
}

/// An opened bus transport
pub struct OpenedTransport {
    /// Registry entry it was opened from
    pub info: TransportInfo,
    /// The transport itself
    pub bus: Box<dyn BusTransport + Send>,
}

/// Open the transport named by `spec`
pub fn open_transport(spec: &str) -> Result<OpenedTransport, Box<dyn std::error::Error>> {
    let (name, options) = parse_transport_string(spec)?;
    let info = find_transport(name).ok_or_else(|| unknown_transport_error(name))?;

    log::info!("Opening {} transport...", info.name);
    let bus = open_by_name(info.name, &options)?;
    Ok(OpenedTransport { info, bus })
}

#[allow(unused_variables)]
fn open_by_name(
    name: &str,
    options: &[(&str, &str)],
) -> Result<Box<dyn BusTransport + Send>, Box<dyn std::error::Error>> {
    match name {
        #[cfg(feature = "dummy")]
        "dummy" => {
            warn_unused_options(name, options);
            Ok(Box::new(spiping_dummy::EchoTransport::new()))
        }

        #[cfg(feature = "dummy")]
        "dummy_peer" => {
            let reply = option(options, "reply").unwrap_or("Hi from STM32");
            let peer = spiping_dummy::PeerTransport::new(reply.as_bytes()).ok_or_else(|| {
                format!(
                    "Reply too long: {} bytes (maximum {})",
                    reply.len(),
                    spiping_dummy::MAX_REPLY_LEN
                )
            })?;
            Ok(Box::new(peer))
        }

        #[cfg(feature = "dummy")]
        "dummy_silent" => {
            warn_unused_options(name, options);
            Ok(Box::new(spiping_dummy::SilentTransport))
        }

        #[cfg(feature = "dummy")]
        "dummy_fail" => {
            use spiping_core::ErrorCode;

            let code = match option(options, "code") {
                Some(v) => v
                    .parse::<i32>()
                    .ok()
                    .filter(|&c| c != 0)
                    .map(ErrorCode::from_errno)
                    .ok_or_else(|| format!("Invalid code value: {}", v))?,
                None => ErrorCode::IO,
            };
            let bus = match option(options, "first") {
                Some(v) => {
                    let n = v
                        .parse()
                        .map_err(|_| format!("Invalid first value: {}", v))?;
                    spiping_dummy::FailingTransport::failing_first(n, code)
                }
                None => spiping_dummy::FailingTransport::new(code),
            };
            Ok(Box::new(bus))
        }

        #[cfg(feature = "dummy")]
        "dummy_bitbang" => {
            warn_unused_options(name, options);
            Ok(Box::new(spiping_core::transport::BitbangTransport::new(
                spiping_dummy::LoopbackPins::new(),
            )))
        }

        #[cfg(feature = "linux-spi")]
        "linux_spi" => spiping_linux_spi::open_linux_spi(options).map_err(|e| {
            format!(
                "Failed to open Linux SPI device: {}\n\
                 Make sure the device exists and you have read/write permissions.\n\
                 You may need to: sudo usermod -aG spi $USER",
                e
            )
            .into()
        }),

        #[cfg(feature = "linux-gpio")]
        "linux_gpio_spi" => spiping_linux_gpio::open_linux_gpio_spi(options)
            .map_err(|e| format!("Failed to open GPIO bitbang bus: {}", e).into()),

        _ => Err(unknown_transport_error(name)),
    }
}

/// Open the software chip select line described by `spec`
///
/// Without a spec, only in-memory transports get a placeholder line; real
/// hardware needs an actual GPIO.
pub fn open_chip_select(
    spec: Option<&str>,
    transport: &TransportInfo,
) -> Result<Box<dyn ChipSelect + Send>, Box<dyn std::error::Error>> {
    match spec {
        Some(spec) => open_gpio_chip_select(spec),
        None if !transport.hardware => {
            log::debug!("{}: using a placeholder chip select line", transport.name);
            Ok(Box::new(NoChipSelect))
        }
        None => Err(format!(
            "Software chip select on {} needs a line: pass --cs-gpio gpiochip=N,cs=<line> \
             or use --cs hardware",
            transport.name
        )
        .into()),
    }
}

#[cfg(feature = "linux-gpio")]
fn open_gpio_chip_select(
    spec: &str,
) -> Result<Box<dyn ChipSelect + Send>, Box<dyn std::error::Error>> {
    // Accept both "gpiochip=0,cs=8" and "gpio:gpiochip=0,cs=8"
    let opts = spec.split_once(':').map_or(spec, |(_, opts)| opts);
    let options = parse_options(opts)?;
    spiping_linux_gpio::open_gpio_chip_select(&options)
        .map_err(|e| format!("Failed to open GPIO chip select: {}", e).into())
}

#[cfg(not(feature = "linux-gpio"))]
fn open_gpio_chip_select(
    _spec: &str,
) -> Result<Box<dyn ChipSelect + Send>, Box<dyn std::error::Error>> {
    Err("GPIO chip select support not compiled in (enable the linux-gpio feature)".into())
}

#[cfg_attr(not(feature = "dummy"), allow(dead_code))]
fn option<'a>(options: &[(&str, &'a str)], key: &str) -> Option<&'a str> {
    options.iter().find(|(k, _)| *k == key).map(|(_, v)| *v)
}

#[cfg_attr(not(feature = "dummy"), allow(dead_code))]
fn warn_unused_options(name: &str, options: &[(&str, &str)]) {
    for (key, value) in options {
        log::warn!("{}: Unknown option: {}={}", name, key, value);
    }
}

fn unknown_transport_error(name: &str) -> Box<dyn std::error::Error> {
    let mut msg = format!("Unknown transport: {}\n\n", name);
    msg.push_str(&transport_help());
    msg.push_str("\nUse 'spiping list' for more details");
    msg.into()
}
