//! Blocking client for the dataplane memif control API.
//!
//! [`connect`] opens the API socket, runs the handshake that hands out the
//! client index and message table, and starts a [`Client`]. Each
//! [`Client::call`] sends one request and blocks until the matching reply,
//! or for dumps until the control-ping sentinel closes the record stream.
//!
//! With the `sim` feature, [`sim::SimDataplane`] serves the same protocol
//! from memory for tests.

pub mod config;
pub mod connector;
pub mod engine;
pub mod error;
pub mod handshake;
#[cfg(feature = "sim")]
pub mod sim;

pub use config::ClientConfig;
pub use connector::{connect, connect_with_config};
pub use engine::{Client, Completion, LOCAL_ERROR, TRANSPORT_ERROR};
pub use error::{ClientError, Result};
pub use handshake::{
    handshake_client, handshake_client_with_config, handshake_server, handshake_server_with_config,
    HandshakeConfig, HandshakeRequest, HandshakeResponse, HandshakeResult,
};
