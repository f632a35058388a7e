//! Control-channel transport to a memif dataplane process.
//!
//! The dataplane exposes its binary API on a Unix domain socket. This crate
//! owns the connected [`ControlStream`] and the [`ControlSocket`] used to
//! connect to (or, for simulated dataplanes, listen on) that socket.
//!
//! This is the lowest layer of memifctl. Framing and message encoding build
//! on top of it.

pub mod error;
pub mod socket;
pub mod stream;

pub use error::{Result, TransportError};
pub use socket::{ControlSocket, DEFAULT_API_SOCKET};
pub use stream::ControlStream;
