//! Framing for the dataplane control channel.
//!
//! Every API message travels in one frame:
//! - a 2-byte magic (`"VA"`) for stream synchronization
//! - a 4-byte big-endian payload length
//! - a 2-byte big-endian message id
//!
//! Message ids are assigned by the dataplane and learned during the
//! handshake; id [`HANDSHAKE`] is the only fixed one.

pub mod codec;
pub mod error;
pub mod reader;
pub mod writer;

pub use codec::{
    decode_frame, encode_frame, Frame, FrameConfig, DEFAULT_MAX_PAYLOAD, HANDSHAKE, HEADER_SIZE,
};
pub use error::{FrameError, Result};
pub use reader::FrameReader;
pub use writer::FrameWriter;
