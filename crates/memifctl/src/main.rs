mod cmd;
mod exit;
mod input;
mod logging;
mod output;
mod registry;

use std::path::PathBuf;

use clap::Parser;
use memifctl_client::ClientConfig;
use memifctl_transport::DEFAULT_API_SOCKET;

use crate::cmd::{parse_duration, Command, Context};
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;
use crate::registry::CommandRegistry;

#[derive(Parser, Debug)]
#[command(
    name = "memifctl",
    version,
    about = "Configure memif interfaces over the dataplane control API"
)]
struct Cli {
    /// Dataplane API socket.
    #[arg(
        long,
        value_name = "PATH",
        env = "MEMIFCTL_SOCKET",
        default_value = DEFAULT_API_SOCKET,
        global = true
    )]
    socket: PathBuf,

    /// Connect and handshake timeout (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s", global = true)]
    timeout: String,

    /// Output format.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(long, value_name = "LEVEL", default_value = "warn", global = true)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level);

    let result = parse_duration(&cli.timeout).and_then(|timeout| {
        let mut client = ClientConfig::new(cli.socket);
        client.handshake.timeout = timeout;

        let registry = CommandRegistry::builtin();
        let ctx = Context {
            registry: &registry,
            client,
            format: cli.format.unwrap_or_else(OutputFormat::default_for_stdout),
        };
        cmd::run(cli.command, &ctx)
    });

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
    fn api_commands_keep_their_tokens() {
        let cli = Cli::try_parse_from([
            "memifctl",
            "--socket",
            "/tmp/api.sock",
            "create",
            "id=3",
            "ring_size",
            "2048",
            "master",
        ])
        .expect("api command should parse");

        assert_eq!(cli.socket, PathBuf::from("/tmp/api.sock"));
        let Command::Api(argv) = cli.command else {
            panic!("expected an api command");
        };
        assert_eq!(argv, ["create", "id=3", "ring_size", "2048", "master"]);
    }

    #[test]
    fn parses_batch_with_keep_going() {
        let cli = Cli::try_parse_from(["memifctl", "batch", "setup.txt", "--keep-going"])
            .expect("batch args should parse");
        let Command::Batch(args) = cli.command else {
            panic!("expected batch");
        };
        assert!(args.keep_going);
        assert_eq!(args.file, Some(PathBuf::from("setup.txt")));
    }

    #[test]
    fn builtin_subcommands_take_precedence() {
        let cli = Cli::try_parse_from(["memifctl", "--format", "json", "info"])
            .expect("info should parse");
        assert!(matches!(cli.command, Command::Info));
        assert!(matches!(cli.format, Some(OutputFormat::Json)));
    }

    #[test]
    fn rejects_unknown_format() {
        let err = Cli::try_parse_from(["memifctl", "--format", "xml", "dump"])
            .expect_err("unknown format should fail");
        assert_eq!(err.kind(), clap::error::ErrorKind::InvalidValue);
    }
}
