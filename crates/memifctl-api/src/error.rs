use crate::message::MessageKind;

/// Errors raised while encoding or decoding API messages.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// A message body ended before all fixed fields were read.
    #[error("{kind} truncated: need {needed} more bytes, {available} available")]
    Truncated {
        kind: MessageKind,
        needed: usize,
        available: usize,
    },

    /// An enum field carried a value with no defined meaning.
    #[error("{kind}: invalid {field} value {value}")]
    InvalidField {
        kind: MessageKind,
        field: &'static str,
        value: u32,
    },

    /// A string does not fit the wire length prefix limit.
    #[error("string too long ({len} bytes, max {max})")]
    StringTooLong { len: usize, max: usize },

    /// The encoded size did not match the size computed up front.
    #[error("{kind}: encoded {written} bytes, expected {expected}")]
    SizeMismatch {
        kind: MessageKind,
        expected: usize,
        written: usize,
    },

    /// The dataplane message table has no entry for this message.
    #[error("message {0} not offered by the dataplane")]
    UnsupportedMessage(&'static str),

    /// The decoder was asked for a message kind it cannot produce.
    #[error("{0} is not a {1}")]
    WrongDirection(MessageKind, &'static str),

    /// Malformed hardware address text.
    #[error("invalid hardware address '{0}' (expected xx:xx:xx:xx:xx:xx)")]
    InvalidMac(String),
}

pub type Result<T> = std::result::Result<T, ApiError>;
