use std::path::Path;

use memifctl_frame::{FrameConfig, FrameReader, FrameWriter};
use memifctl_transport::ControlSocket;
use tracing::debug;

use crate::config::ClientConfig;
use crate::engine::Client;
use crate::error::Result;
use crate::handshake::handshake_client_with_config;

/// Connect to the dataplane API socket at `path` with default settings.
pub fn connect(path: impl AsRef<Path>) -> Result<Client> {
    connect_with_config(&ClientConfig::new(path.as_ref()))
}

/// Connect, run the handshake and start the correlation engine.
pub fn connect_with_config(config: &ClientConfig) -> Result<Client> {
    let handshake_config = &config.handshake;
    debug!(path = %config.socket_path.display(), "connecting to dataplane");

    let stream = ControlSocket::connect(&config.socket_path)?;
    let reader_stream = stream.try_clone()?;

    let frame_config = FrameConfig {
        max_payload_size: handshake_config.max_handshake_payload,
        read_timeout: Some(handshake_config.timeout),
        write_timeout: Some(handshake_config.timeout),
    };

    let mut reader = FrameReader::with_config_stream(reader_stream, frame_config.clone())?;
    let mut writer = FrameWriter::with_config_stream(stream, frame_config)?;

    let handshake = handshake_client_with_config(&mut reader, &mut writer, handshake_config)?;
    // The handshake runs under a tighter payload budget than regular replies.
    reader.set_max_payload_size(config.max_payload_size);
    writer.set_max_payload_size(config.max_payload_size);

    Client::start(reader, writer, handshake)
}
