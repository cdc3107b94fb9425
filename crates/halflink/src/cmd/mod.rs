use clap::{Args, Subcommand};
use std::path::Path;
use std::time::Duration;

use crate::exit::CliResult;
use crate::output::OutputFormat;

pub mod call;
pub mod link;
pub mod monitor;
pub mod ports;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Send one request and print the device's reply.
    Call(CallArgs),
    /// Print unsolicited device packets until interrupted.
    Monitor(MonitorArgs),
    /// List serial ports.
    Ports(PortsArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat, config: Option<&Path>) -> CliResult<i32> {
    match command {
        Command::Call(args) => call::run(args, format, config),
        Command::Monitor(args) => monitor::run(args, format, config),
        Command::Ports(args) => ports::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

/// Options shared by every command that opens a link.
#[derive(Args, Debug)]
pub struct LinkArgs {
    /// Serial device path (e.g. /dev/ttyACM0, COM3).
    #[arg(env = "HALFLINK_PORT")]
    pub port: String,
    /// Key of reply packets addressed to the host (decimal or 0x-prefixed).
    #[arg(long, env = "HALFLINK_REPLY_KEY", value_parser = parse_key)]
    pub reply_key: Option<u8>,
    /// Payload size of reply packets.
    #[arg(long, default_value_t = 8)]
    pub reply_size: usize,
    /// Key the device reports errors with.
    #[arg(long, env = "HALFLINK_ERROR_KEY", value_parser = parse_key)]
    pub error_key: Option<u8>,
    /// Payload size of device error packets.
    #[arg(long, default_value_t = 1)]
    pub error_size: usize,
    /// Baud rate override.
    #[arg(long, env = "HALFLINK_BAUD")]
    pub baud: Option<u32>,
    /// Serial read timeout (e.g. 500ms, 1s).
    #[arg(long, value_parser = parse_duration)]
    pub read_timeout: Option<Duration>,
}

#[derive(Args, Debug)]
pub struct CallArgs {
    #[command(flatten)]
    pub link: LinkArgs,
    /// Request key.
    #[arg(long, short = 'k', value_parser = parse_key)]
    pub key: u8,
    /// Request arguments as hex (e.g. 2a000000).
    #[arg(long, default_value = "")]
    pub hex: String,
    /// Maximum time to wait for the reply.
    #[arg(long, default_value = "5s", value_parser = parse_duration)]
    pub timeout: Duration,
}

#[derive(Args, Debug)]
pub struct MonitorArgs {
    #[command(flatten)]
    pub link: LinkArgs,
    /// Push packet to listen for, as KEY:SIZE. Repeatable.
    #[arg(long = "push", value_name = "KEY:SIZE", value_parser = parse_push, required = true)]
    pub pushes: Vec<PushKey>,
    /// Exit after printing N packets.
    #[arg(long)]
    pub count: Option<usize>,
}

#[derive(Args, Debug, Default)]
pub struct PortsArgs {}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

/// A device-initiated packet the monitor decodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PushKey {
    pub key: u8,
    pub size: usize,
}

pub fn parse_key(input: &str) -> Result<u8, String> {
    let input = input.trim();
    let parsed = match input
        .strip_prefix("0x")
        .or_else(|| input.strip_prefix("0X"))
    {
        Some(hex) => u8::from_str_radix(hex, 16),
        None => input.parse(),
    };
    parsed.map_err(|_| format!("invalid key: {input} (expected 0-255 or 0x00-0xFF)"))
}

pub fn parse_push(input: &str) -> Result<PushKey, String> {
    let (key, size) = input
        .split_once(':')
        .ok_or_else(|| format!("invalid push spec: {input} (expected KEY:SIZE)"))?;
    let key = parse_key(key)?;
    let size = size
        .trim()
        .parse()
        .map_err(|_| format!("invalid push size: {size}"))?;
    Ok(PushKey { key, size })
}

pub fn parse_duration(input: &str) -> Result<Duration, String> {
    let input = input.trim();
    if input.is_empty() {
        return Err("duration must not be empty".to_string());
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| format!("invalid duration value: {input}"))?;

    if value == 0 {
        return Err("duration must be greater than zero".to_string());
    }

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        _ => Ok(Duration::from_secs(value)),
    }
}
