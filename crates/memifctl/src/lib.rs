//! Client for the dataplane memif control API.
//!
//! # Crate Structure
//!
//! - [`transport`]: Unix socket connection to the dataplane API socket
//! - [`frame`]: message framing
//! - [`api`]: memif message types, their codec and the numeric validators
//! - [`client`]: handshake and call correlation (the simulated dataplane
//!   sits behind the `sim` feature)

/// Re-export transport types.
pub mod transport {
    pub use memifctl_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use memifctl_frame::*;
}

/// Re-export API message types.
pub mod api {
    pub use memifctl_api::*;
}

/// Re-export client types.
pub mod client {
    pub use memifctl_client::*;
}
