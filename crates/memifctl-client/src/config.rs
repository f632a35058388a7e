use std::path::PathBuf;

use memifctl_transport::DEFAULT_API_SOCKET;

use crate::handshake::HandshakeConfig;

/// Where and how to connect to the dataplane.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Path of the dataplane API socket.
    pub socket_path: PathBuf,
    pub handshake: HandshakeConfig,
    /// Largest reply payload accepted after the handshake.
    pub max_payload_size: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            socket_path: PathBuf::from(DEFAULT_API_SOCKET),
            handshake: HandshakeConfig::default(),
            max_payload_size: memifctl_frame::DEFAULT_MAX_PAYLOAD,
        }
    }
}

impl ClientConfig {
    pub fn new(socket_path: impl Into<PathBuf>) -> Self {
        Self {
            socket_path: socket_path.into(),
            ..Self::default()
        }
    }
}
