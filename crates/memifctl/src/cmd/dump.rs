use memifctl_api::Request;

use crate::input::{InputError, TokenInput};

pub fn interfaces(input: &mut TokenInput) -> Result<Request, InputError> {
    no_arguments(input)?;
    Ok(Request::Dump)
}

pub fn sockets(input: &mut TokenInput) -> Result<Request, InputError> {
    no_arguments(input)?;
    Ok(Request::SocketFilenameDump)
}

fn no_arguments(input: &mut TokenInput) -> Result<(), InputError> {
    match input.next_token() {
        Some(token) => Err(InputError::Unknown(token)),
        None => Ok(()),
    }
}
