use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

use tracing::{debug, info};

use crate::cmd::{api, BatchArgs, Context};
use crate::exit::{io_error, CliResult, SUCCESS};
use crate::output::print_outcome;

pub fn run(args: BatchArgs, ctx: &Context<'_>) -> CliResult<i32> {
    match args.file.as_deref() {
        Some(path) if path != Path::new("-") => {
            let file = File::open(path)
                .map_err(|err| io_error(&format!("failed opening {}", path.display()), err))?;
            run_lines(BufReader::new(file), args.keep_going, ctx)
        }
        _ => run_lines(io::stdin().lock(), args.keep_going, ctx),
    }
}

/// Run each non-blank, non-comment line as one API command over a single
/// connection. Returns the exit code of the first failure, or of the last
/// failure with `keep_going`.
fn run_lines<R: BufRead>(reader: R, keep_going: bool, ctx: &Context<'_>) -> CliResult<i32> {
    let mut client = None;
    let mut code = SUCCESS;

    for (number, line) in reader.lines().enumerate() {
        let line = line.map_err(|err| io_error("failed reading batch input", err))?;
        let mut words = line.split_whitespace();
        let Some(name) = words.next().filter(|word| !word.starts_with('#')) else {
            continue;
        };
        let tokens: Vec<&str> = words.collect();

        debug!(line = number + 1, command = name, "batch command");
        let outcome = api::execute(ctx, &mut client, name, &tokens)?;
        print_outcome(&outcome, ctx.format);

        let exit = outcome.exit_code();
        if exit != SUCCESS {
            code = exit;
            if !keep_going {
                info!(line = number + 1, "stopping batch after failure");
                break;
            }
        }
    }

    Ok(code)
}
