use memifctl_client::Client;
use tracing::{debug, warn};

use crate::cmd::{Context, Outcome};
use crate::exit::{client_error, CliError, CliResult, USAGE};
use crate::output::print_outcome;

pub fn run(argv: &[String], ctx: &Context<'_>) -> CliResult<i32> {
    let (name, tokens) = argv
        .split_first()
        .ok_or_else(|| CliError::new(USAGE, "missing command"))?;

    let mut client = None;
    let outcome = execute(ctx, &mut client, name, tokens)?;
    print_outcome(&outcome, ctx.format);
    Ok(outcome.exit_code())
}

/// Parse and issue one API command.
///
/// Input is validated before `client` is touched, so a rejected command
/// never opens a connection. An empty `client` is connected on first use
/// and kept for the caller.
pub fn execute<S: AsRef<str>>(
    ctx: &Context<'_>,
    client: &mut Option<Client>,
    name: &str,
    tokens: &[S],
) -> CliResult<Outcome> {
    let Some(command) = ctx.registry.lookup(name) else {
        return Ok(Outcome::local_error(
            name,
            None,
            format!("unknown command '{name}'"),
        ));
    };

    let request = match command.parse_tokens(tokens) {
        Ok(request) => request,
        Err(err) => {
            debug!(command = command.name, error = %err, "input rejected");
            return Ok(Outcome::local_error(
                command.name,
                Some(command.kind),
                err.to_string(),
            ));
        }
    };

    let client = match client {
        Some(client) => client,
        None => client.insert(
            ctx.connect()
                .map_err(|err| client_error("connect failed", err))?,
        ),
    };

    debug!(command = command.name, "issuing call");
    match client.call(&request) {
        Ok(completion) => {
            if !completion.is_success() {
                warn!(
                    command = command.name,
                    retval = completion.retval,
                    "dataplane rejected the request"
                );
            }
            Ok(Outcome::completed(command.name, command.kind, completion))
        }
        Err(err) => Ok(Outcome::failed(
            command.name,
            Some(command.kind),
            err.result_code(),
            err.to_string(),
        )),
    }
}
