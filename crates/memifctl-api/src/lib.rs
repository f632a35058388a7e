//! memif control-plane messages.
//!
//! Typed [`Request`]s are encoded into the dataplane's binary layout
//! (network byte order, length-prefixed strings) and replies are decoded
//! back into [`Reply`] values. Message ids are not fixed: the dataplane
//! hands out a [`MessageTable`] at connect time.
//!
//! [`bits`] holds the small numeric helpers used to validate configuration
//! values before anything is encoded.

pub mod bits;
pub mod error;
pub mod mac;
pub mod message;
pub mod reply;
pub mod request;
mod wire;

pub use error::{ApiError, Result};
pub use mac::MacAddress;
pub use message::{MessageEntry, MessageKind, MessageTable, ReplyExpectation};
pub use reply::{InterfaceDetails, Reply, SocketFilenameDetails};
pub use request::{
    CreateInterface, DeleteInterface, InterfaceMode, InterfaceRole, Request, SocketFilenameAddDel,
    MAX_SECRET_LEN,
};
pub use wire::MAX_STRING_LEN;
