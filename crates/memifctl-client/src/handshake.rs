use std::collections::HashSet;
use std::io::{ErrorKind, Read, Write};
use std::time::{Duration, Instant};

use memifctl_api::{MessageEntry, MessageTable};
use memifctl_frame::{FrameError, FrameReader, FrameWriter, HANDSHAKE};
use serde::{Deserialize, Serialize};

use crate::error::{ClientError, Result};

const MAX_TABLE_ENTRIES: usize = 4096;
const MAX_PROTOCOL_LEN: usize = 32;
const MAX_VERSION_LEN: usize = 16;
const MAX_CLIENT_NAME_LEN: usize = 64;
const MAX_MESSAGE_NAME_LEN: usize = 128;

/// Client hello sent on the handshake message id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HandshakeRequest {
    pub protocol: String,
    pub version: String,
    /// Free-form name the dataplane shows for this client.
    pub client_name: String,
}

/// Dataplane answer: who we are and how messages are numbered.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HandshakeResponse {
    pub protocol: String,
    pub version: String,
    /// Index the dataplane assigned to this client; echoed in every request.
    pub client_index: u32,
    pub messages: Vec<MessageEntry>,
}

/// Result of a successful handshake.
#[derive(Debug, Clone)]
pub struct HandshakeResult {
    pub client_index: u32,
    /// Negotiated protocol version.
    pub protocol_version: String,
    pub message_table: MessageTable,
    /// Name the peer announced (the client's own name on the client side).
    pub client_name: String,
}

/// Configuration for handshake negotiation.
#[derive(Debug, Clone)]
pub struct HandshakeConfig {
    /// Timeout for each blocking handshake operation.
    pub timeout: Duration,
    /// Expected protocol name.
    pub protocol_name: String,
    /// Local protocol version.
    pub protocol_version: String,
    pub client_name: String,
    /// Maximum handshake frame payload size in bytes.
    pub max_handshake_payload: usize,
}

impl Default for HandshakeConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5),
            protocol_name: "memif-api".to_string(),
            protocol_version: "1.0".to_string(),
            client_name: "memifctl".to_string(),
            max_handshake_payload: 64 * 1024,
        }
    }
}

/// Client side of the handshake with default settings.
pub fn handshake_client<R: Read, W: Write>(
    reader: &mut FrameReader<R>,
    writer: &mut FrameWriter<W>,
) -> Result<HandshakeResult> {
    handshake_client_with_config(reader, writer, &HandshakeConfig::default())
}

/// Announce this client and learn the dataplane's message table.
pub fn handshake_client_with_config<R: Read, W: Write>(
    reader: &mut FrameReader<R>,
    writer: &mut FrameWriter<W>,
    config: &HandshakeConfig,
) -> Result<HandshakeResult> {
    check_hello(&config.protocol_name, &config.protocol_version)?;
    check_len("client_name", &config.client_name, MAX_CLIENT_NAME_LEN)?;

    send_json(
        writer,
        &HandshakeRequest {
            protocol: config.protocol_name.clone(),
            version: config.protocol_version.clone(),
            client_name: config.client_name.clone(),
        },
    )?;

    let resp: HandshakeResponse = serde_json::from_slice(&recv_hello(reader, config)?)?;
    check_hello(&resp.protocol, &resp.version)?;
    negotiate(config, &resp.protocol, &config.protocol_version, &resp.version)?;
    validate_entries(&resp.messages)?;

    Ok(HandshakeResult {
        client_index: resp.client_index,
        protocol_version: resp.version,
        message_table: MessageTable::from_entries(resp.messages),
        client_name: config.client_name.clone(),
    })
}

/// Dataplane side of the handshake with default settings.
pub fn handshake_server<R: Read, W: Write>(
    reader: &mut FrameReader<R>,
    writer: &mut FrameWriter<W>,
    client_index: u32,
    table: &MessageTable,
) -> Result<HandshakeResult> {
    let config = HandshakeConfig::default();
    handshake_server_with_config(reader, writer, client_index, table, &config)
}

/// Accept a client hello and answer with `client_index` and `table`.
pub fn handshake_server_with_config<R: Read, W: Write>(
    reader: &mut FrameReader<R>,
    writer: &mut FrameWriter<W>,
    client_index: u32,
    table: &MessageTable,
    config: &HandshakeConfig,
) -> Result<HandshakeResult> {
    check_hello(&config.protocol_name, &config.protocol_version)?;
    let messages = table.entries();
    validate_entries(&messages)?;

    let req: HandshakeRequest = serde_json::from_slice(&recv_hello(reader, config)?)?;
    check_hello(&req.protocol, &req.version)?;
    check_len("client_name", &req.client_name, MAX_CLIENT_NAME_LEN)?;
    negotiate(config, &req.protocol, &req.version, &config.protocol_version)?;

    send_json(
        writer,
        &HandshakeResponse {
            protocol: config.protocol_name.clone(),
            version: config.protocol_version.clone(),
            client_index,
            messages,
        },
    )?;

    Ok(HandshakeResult {
        client_index,
        protocol_version: config.protocol_version.clone(),
        message_table: table.clone(),
        client_name: req.client_name,
    })
}

fn send_json<T: Serialize, W: Write>(writer: &mut FrameWriter<W>, value: &T) -> Result<()> {
    writer.send(HANDSHAKE, &serde_json::to_vec(value)?)?;
    Ok(())
}

/// Wait for the peer's handshake frame until `config.timeout` elapses.
fn recv_hello<R: Read>(reader: &mut FrameReader<R>, config: &HandshakeConfig) -> Result<Vec<u8>> {
    let deadline = Instant::now() + config.timeout;
    let frame = loop {
        if Instant::now() >= deadline {
            return Err(ClientError::Timeout(config.timeout));
        }
        match reader.read_frame() {
            Ok(frame) => break frame,
            Err(FrameError::Io(err))
                if matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {}
            Err(FrameError::ConnectionClosed) => {
                return Err(ClientError::Disconnected(
                    "peer closed the connection during the handshake".to_string(),
                ))
            }
            Err(err) => return Err(err.into()),
        }
    };

    if frame.msg_id != HANDSHAKE {
        return Err(failed(format!(
            "message id {} arrived before the handshake completed",
            frame.msg_id
        )));
    }
    if frame.payload.len() > config.max_handshake_payload {
        return Err(failed(format!(
            "handshake of {} bytes exceeds the {} byte limit",
            frame.payload.len(),
            config.max_handshake_payload
        )));
    }
    Ok(frame.payload.to_vec())
}

/// Same protocol, same major version, and the client's minor at least the
/// dataplane's.
fn negotiate(
    config: &HandshakeConfig,
    protocol: &str,
    client_version: &str,
    server_version: &str,
) -> Result<()> {
    if protocol != config.protocol_name {
        return Err(failed(format!(
            "peer speaks '{protocol}', not '{}'",
            config.protocol_name
        )));
    }
    let (client_major, client_minor) = parse_version(client_version)?;
    let (server_major, server_minor) = parse_version(server_version)?;
    if client_major != server_major || client_minor < server_minor {
        return Err(failed(format!(
            "client version {client_version} cannot talk to dataplane version {server_version}"
        )));
    }
    Ok(())
}

/// Message ids must be unique, non-zero and named.
fn validate_entries(entries: &[MessageEntry]) -> Result<()> {
    if entries.len() > MAX_TABLE_ENTRIES {
        return Err(failed(format!(
            "message table has {} entries (limit {MAX_TABLE_ENTRIES})",
            entries.len()
        )));
    }

    let mut ids = HashSet::with_capacity(entries.len());
    let mut names = HashSet::with_capacity(entries.len());
    for entry in entries {
        check_len("message name", &entry.name, MAX_MESSAGE_NAME_LEN)?;
        if entry.id == HANDSHAKE {
            return Err(failed(format!(
                "'{}' claims the handshake message id",
                entry.name
            )));
        }
        if !ids.insert(entry.id) || !names.insert(entry.name.as_str()) {
            return Err(failed(format!(
                "'{}' ({}) appears twice in the message table",
                entry.name, entry.id
            )));
        }
    }
    Ok(())
}

fn check_hello(protocol: &str, version: &str) -> Result<()> {
    check_len("protocol", protocol, MAX_PROTOCOL_LEN)?;
    check_len("version", version, MAX_VERSION_LEN)?;
    parse_version(version).map(drop)
}

fn check_len(what: &str, value: &str, max: usize) -> Result<()> {
    if value.is_empty() || value.len() > max {
        return Err(failed(format!(
            "{what} must be 1 to {max} bytes, got {}",
            value.len()
        )));
    }
    Ok(())
}

/// `<major>.<minor>`, both decimal.
fn parse_version(version: &str) -> Result<(u16, u16)> {
    let parsed = version.split_once('.').and_then(|(major, minor)| {
        Some((major.parse::<u16>().ok()?, minor.parse::<u16>().ok()?))
    });
    parsed.ok_or_else(|| failed(format!("malformed version '{version}'")))
}

fn failed(reason: String) -> ClientError {
    ClientError::HandshakeFailed(reason)
}

#[cfg(test)]
mod tests {
    use std::io::{Cursor, ErrorKind, Read};
    use std::os::unix::net::UnixStream;
    use std::thread;
    use std::time::Duration;

    use memifctl_api::MessageKind;

    use super::*;

    fn server_with(
        stream: UnixStream,
        table: MessageTable,
        config: HandshakeConfig,
    ) -> thread::JoinHandle<Result<HandshakeResult>> {
        thread::spawn(move || {
            let mut reader = FrameReader::new(stream.try_clone().unwrap());
            let mut writer = FrameWriter::new(stream);
            handshake_server_with_config(&mut reader, &mut writer, 17, &table, &config)
        })
    }

    #[test]
    fn successful_handshake_delivers_table_and_index() {
        let (left, right) = UnixStream::pair().unwrap();
        let server = server_with(left, MessageTable::standard(), HandshakeConfig::default());

        let mut reader = FrameReader::new(right.try_clone().unwrap());
        let mut writer = FrameWriter::new(right);
        let client = handshake_client(&mut reader, &mut writer).unwrap();
        let server = server.join().unwrap().unwrap();

        assert_eq!(client.client_index, 17);
        assert_eq!(client.protocol_version, "1.0");
        assert!(client.message_table.supports_memif());
        assert_eq!(
            client.message_table.id(MessageKind::ControlPing).unwrap(),
            MessageTable::standard().id(MessageKind::ControlPing).unwrap()
        );
        assert_eq!(server.client_name, "memifctl");
    }

    #[test]
    fn wrong_protocol_name_rejected() {
        let (left, right) = UnixStream::pair().unwrap();
        let server = server_with(left, MessageTable::standard(), HandshakeConfig::default());

        let mut reader = FrameReader::new(right.try_clone().unwrap());
        let mut writer = FrameWriter::new(right);
        let cfg = HandshakeConfig {
            protocol_name: "other".to_string(),
            ..HandshakeConfig::default()
        };
        let client = handshake_client_with_config(&mut reader, &mut writer, &cfg);

        assert!(matches!(client, Err(ClientError::Disconnected(_))));
        assert!(matches!(
            server.join().unwrap(),
            Err(ClientError::HandshakeFailed(_))
        ));
    }

    #[test]
    fn newer_server_minor_is_incompatible() {
        let (left, right) = UnixStream::pair().unwrap();
        let server = server_with(
            left,
            MessageTable::standard(),
            HandshakeConfig {
                protocol_version: "1.3".to_string(),
                ..HandshakeConfig::default()
            },
        );

        let mut reader = FrameReader::new(right.try_clone().unwrap());
        let mut writer = FrameWriter::new(right);
        let cfg = HandshakeConfig {
            protocol_version: "1.2".to_string(),
            ..HandshakeConfig::default()
        };
        assert!(handshake_client_with_config(&mut reader, &mut writer, &cfg).is_err());
        assert!(matches!(
            server.join().unwrap(),
            Err(ClientError::HandshakeFailed(_))
        ));
    }

    #[test]
    fn older_server_minor_is_compatible() {
        let local = HandshakeConfig::default();
        assert!(negotiate(&local, "memif-api", "1.4", "1.2").is_ok());
        assert!(negotiate(&local, "memif-api", "1.2", "1.2").is_ok());
        assert!(negotiate(&local, "memif-api", "2.0", "1.0").is_err());
        assert!(negotiate(&local, "other", "1.0", "1.0").is_err());
    }

    #[test]
    fn versions_need_exactly_two_numeric_parts() {
        assert_eq!(parse_version("12.3").unwrap(), (12, 3));
        for bad in ["1", "1.2.3", "a.1", "1.", ""] {
            assert!(
                matches!(parse_version(bad), Err(ClientError::HandshakeFailed(_))),
                "{bad}"
            );
        }
    }

    #[test]
    fn invalid_json_rejected() {
        let (left, right) = UnixStream::pair().unwrap();
        let mut raw_writer = FrameWriter::new(left);
        raw_writer.send(HANDSHAKE, b"{not-json").unwrap();

        let mut reader = FrameReader::new(right.try_clone().unwrap());
        let mut writer = FrameWriter::new(right);
        let result = handshake_server(&mut reader, &mut writer, 1, &MessageTable::standard());

        assert!(matches!(result, Err(ClientError::Json(_))));
    }

    #[test]
    fn non_handshake_frame_rejected() {
        let (left, right) = UnixStream::pair().unwrap();
        let mut raw_writer = FrameWriter::new(left);
        raw_writer.send(1, b"{}").unwrap();

        let mut reader = FrameReader::new(right.try_clone().unwrap());
        let mut writer = FrameWriter::new(right);
        let result = handshake_client(&mut reader, &mut writer);

        assert!(matches!(result, Err(ClientError::HandshakeFailed(_))));
    }

    #[test]
    fn table_using_handshake_id_is_rejected() {
        let entries = vec![MessageEntry {
            name: "control_ping".to_string(),
            id: HANDSHAKE,
        }];
        assert!(matches!(
            validate_entries(&entries),
            Err(ClientError::HandshakeFailed(_))
        ));
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let entries = vec![
            MessageEntry {
                name: "control_ping".to_string(),
                id: 5,
            },
            MessageEntry {
                name: "control_ping_reply".to_string(),
                id: 5,
            },
        ];
        assert!(matches!(
            validate_entries(&entries),
            Err(ClientError::HandshakeFailed(_))
        ));
    }

    #[test]
    fn handshake_timeout() {
        let mut reader = FrameReader::new(AlwaysTimedOutReader);
        let mut writer = FrameWriter::new(Cursor::new(Vec::<u8>::new()));
        let cfg = HandshakeConfig {
            timeout: Duration::from_millis(25),
            ..HandshakeConfig::default()
        };

        let result = handshake_client_with_config(&mut reader, &mut writer, &cfg);
        assert!(matches!(result, Err(ClientError::Timeout(_))));
    }

    #[test]
    fn rejects_oversized_handshake_payload() {
        let (left, right) = UnixStream::pair().unwrap();
        let server = server_with(
            left,
            MessageTable::standard(),
            HandshakeConfig {
                max_handshake_payload: 16,
                ..HandshakeConfig::default()
            },
        );

        let mut reader = FrameReader::new(right.try_clone().unwrap());
        let mut writer = FrameWriter::new(right);
        let result = handshake_client(&mut reader, &mut writer);
        assert!(matches!(result, Err(ClientError::Disconnected(_))));
        assert!(matches!(
            server.join().unwrap(),
            Err(ClientError::HandshakeFailed(_))
        ));
    }

    struct AlwaysTimedOutReader;

    impl Read for AlwaysTimedOutReader {
        fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
            Err(std::io::Error::from(ErrorKind::TimedOut))
        }
    }
}
