use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Subcommand};
use memifctl_api::MessageKind;
use memifctl_client::{Client, ClientConfig, Completion, LOCAL_ERROR};

use crate::exit::{call_exit_code, CliError, CliResult, USAGE};
use crate::output::OutputFormat;
use crate::registry::CommandRegistry;

pub mod api;
pub mod batch;
pub mod dump;
pub mod info;
pub mod interface;
pub mod socket;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run API commands line by line from a file or stdin.
    Batch(BatchArgs),
    /// List the API commands this client knows.
    Commands,
    /// Connect, ping and print negotiated connection metadata.
    Info,
    /// Show version information.
    Version(VersionArgs),
    /// An API command by message name or alias, followed by its tokens.
    #[command(external_subcommand)]
    Api(Vec<String>),
}

#[derive(Args, Debug)]
pub struct BatchArgs {
    /// Command file. Reads stdin when omitted or `-`.
    pub file: Option<PathBuf>,
    /// Run the remaining lines after a failure.
    #[arg(long)]
    pub keep_going: bool,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

/// What every subcommand shares.
pub struct Context<'a> {
    pub registry: &'a CommandRegistry,
    pub client: ClientConfig,
    pub format: OutputFormat,
}

impl Context<'_> {
    pub fn connect(&self) -> memifctl_client::Result<Client> {
        memifctl_client::connect_with_config(&self.client)
    }
}

pub fn run(command: Command, ctx: &Context<'_>) -> CliResult<i32> {
    match command {
        Command::Batch(args) => batch::run(args, ctx),
        Command::Commands => {
            crate::output::print_commands(ctx.registry, ctx.format);
            Ok(crate::exit::SUCCESS)
        }
        Command::Info => info::run(ctx),
        Command::Version(args) => version::run(args),
        Command::Api(argv) => api::run(&argv, ctx),
    }
}

/// The result of one API command, successful or not.
#[derive(Debug)]
pub struct Outcome {
    pub command: String,
    pub kind: Option<MessageKind>,
    /// Call result code: `0`, a dataplane code, or a local/transport code.
    pub retval: i32,
    pub completion: Option<Completion>,
    pub error: Option<String>,
}

impl Outcome {
    pub fn completed(command: &str, kind: MessageKind, completion: Completion) -> Self {
        Self {
            command: command.to_string(),
            kind: Some(kind),
            retval: completion.retval,
            completion: Some(completion),
            error: None,
        }
    }

    pub fn local_error(
        command: &str,
        kind: Option<MessageKind>,
        message: impl Into<String>,
    ) -> Self {
        Self::failed(command, kind, LOCAL_ERROR, message)
    }

    pub fn failed(
        command: &str,
        kind: Option<MessageKind>,
        retval: i32,
        message: impl Into<String>,
    ) -> Self {
        Self {
            command: command.to_string(),
            kind,
            retval,
            completion: None,
            error: Some(message.into()),
        }
    }

    pub fn exit_code(&self) -> i32 {
        call_exit_code(self.retval)
    }
}

pub(crate) fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, millis) = match input.strip_suffix("ms") {
        Some(number) => (number, true),
        None => (input.strip_suffix('s').unwrap_or(input), false),
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;
    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    Ok(if millis {
        Duration::from_millis(value)
    } else {
        Duration::from_secs(value)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_duration_seconds_and_millis() {
        assert_eq!(parse_duration("2s").unwrap(), Duration::from_secs(2));
        assert_eq!(parse_duration("150ms").unwrap(), Duration::from_millis(150));
        assert_eq!(parse_duration("3").unwrap(), Duration::from_secs(3));
    }

    #[test]
    fn parse_duration_rejects_invalid_values() {
        assert!(parse_duration("0s").is_err());
        assert!(parse_duration("bad").is_err());
        assert!(parse_duration("").is_err());
    }

    #[test]
    fn outcome_exit_codes_follow_retval() {
        assert_eq!(Outcome::local_error("dump", None, "x").exit_code(), USAGE);
        assert_eq!(
            Outcome::failed("dump", None, memifctl_client::TRANSPORT_ERROR, "gone").exit_code(),
            crate::exit::TRANSPORT_ERROR
        );
    }
}
