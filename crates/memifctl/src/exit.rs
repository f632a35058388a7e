use std::fmt;
use std::io;

use memifctl_client::{ClientError, LOCAL_ERROR, TRANSPORT_ERROR as CALL_TRANSPORT_ERROR};
use memifctl_frame::FrameError;
use memifctl_transport::TransportError;

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
/// The dataplane answered with a non-zero result code.
pub const REMOTE_REJECTED: i32 = 4;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

/// Process exit code for a call result code.
pub fn call_exit_code(retval: i32) -> i32 {
    match retval {
        0 => SUCCESS,
        LOCAL_ERROR => USAGE,
        CALL_TRANSPORT_ERROR => TRANSPORT_ERROR,
        _ => REMOTE_REJECTED,
    }
}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        io::ErrorKind::NotFound | io::ErrorKind::ConnectionRefused => TRANSPORT_ERROR,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    match err {
        TransportError::Bind { source, .. }
        | TransportError::Connect { source, .. }
        | TransportError::Accept(source)
        | TransportError::Io(source) => io_error(context, source),
        TransportError::PathTooLong { .. } => CliError::new(USAGE, format!("{context}: {err}")),
    }
}

pub fn frame_error(context: &str, err: FrameError) -> CliError {
    match err {
        FrameError::Io(source) => io_error(context, source),
        FrameError::PayloadTooLarge { .. } | FrameError::InvalidMagic => {
            CliError::new(DATA_INVALID, format!("{context}: {err}"))
        }
        FrameError::ConnectionClosed => CliError::new(TRANSPORT_ERROR, format!("{context}: {err}")),
    }
}

pub fn client_error(context: &str, err: ClientError) -> CliError {
    match err {
        ClientError::Transport(err) => transport_error(context, err),
        ClientError::Frame(err) => frame_error(context, err),
        ClientError::Timeout(_) => CliError::new(TIMEOUT, format!("{context}: {err}")),
        ClientError::Json(_) | ClientError::Api(_) => {
            CliError::new(DATA_INVALID, format!("{context}: {err}"))
        }
        ClientError::HandshakeFailed(_) => CliError::new(FAILURE, format!("{context}: {err}")),
        ClientError::Disconnected(_) => CliError::new(TRANSPORT_ERROR, format!("{context}: {err}")),
        ClientError::CallInProgress => CliError::new(INTERNAL, format!("{context}: {err}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn call_results_map_to_exit_codes() {
        assert_eq!(call_exit_code(0), SUCCESS);
        assert_eq!(call_exit_code(-99), USAGE);
        assert_eq!(call_exit_code(-100), TRANSPORT_ERROR);
        assert_eq!(call_exit_code(-3), REMOTE_REJECTED);
    }

    #[test]
    fn missing_socket_is_a_transport_error() {
        let err = ClientError::Transport(TransportError::Connect {
            path: "/nonexistent/api.sock".into(),
            source: io::Error::from(io::ErrorKind::NotFound),
        });
        assert_eq!(client_error("connect failed", err).code, TRANSPORT_ERROR);
    }

    #[test]
    fn permission_denied_keeps_its_code() {
        let err = io::Error::from(io::ErrorKind::PermissionDenied);
        assert_eq!(io_error("connect failed", err).code, PERMISSION_DENIED);
    }
}
