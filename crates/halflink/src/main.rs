mod cmd;
mod exit;
mod logging;
mod output;

use std::path::PathBuf;

use clap::Parser;

use crate::cmd::Command;
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "halflink", version, about = "Half-duplex serial remote link CLI")]
struct Cli {
    /// Output format.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(long, value_name = "LEVEL", default_value = "info", global = true)]
    log_level: LogLevel,

    /// Link configuration file (JSON).
    #[arg(long, value_name = "FILE", env = "HALFLINK_CONFIG", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level);

    let format = cli.format.unwrap_or_else(OutputFormat::default_for_stdout);
    let result = cmd::run(cli.command, format, cli.config.as_deref());

    match result {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_call_subcommand() {
        let cli = Cli::try_parse_from([
            "halflink",
            "call",
            "/dev/ttyACM0",
            "--key",
            "0x02",
            "--hex",
            "2a000000",
            "--reply-key",
            "0",
        ])
        .expect("call args should parse");

        match cli.command {
            Command::Call(args) => {
                assert_eq!(args.key, 2);
                assert_eq!(args.link.reply_key, Some(0));
                assert_eq!(args.link.reply_size, 8);
                assert_eq!(args.timeout, std::time::Duration::from_secs(5));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn monitor_requires_a_push_key() {
        let err = Cli::try_parse_from(["halflink", "monitor", "/dev/ttyACM0"])
            .expect_err("monitor without --push should fail");
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn monitor_accepts_repeated_push_keys() {
        let cli = Cli::try_parse_from([
            "halflink",
            "monitor",
            "/dev/ttyACM0",
            "--push",
            "3:4",
            "--push",
            "0x07:0",
            "--count",
            "2",
        ])
        .expect("monitor args should parse");

        match cli.command {
            Command::Monitor(args) => {
                assert_eq!(args.pushes.len(), 2);
                assert_eq!(args.pushes[1].key, 7);
                assert_eq!(args.count, Some(2));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn rejects_out_of_range_key() {
        let err = Cli::try_parse_from(["halflink", "call", "/dev/ttyACM0", "--key", "300"])
            .expect_err("key above 255 should fail");
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn global_flags_follow_the_subcommand() {
        let cli = Cli::try_parse_from(["halflink", "ports", "--format", "json"])
            .expect("ports args should parse");
        assert_eq!(cli.format, Some(OutputFormat::Json));
        assert!(matches!(cli.command, Command::Ports(_)));
    }
}
