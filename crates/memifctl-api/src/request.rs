use std::fmt;

use bytes::{BufMut, Bytes};
use serde::Serialize;

use crate::error::{ApiError, Result};
use crate::mac::MacAddress;
use crate::message::{MessageKind, ReplyExpectation};
use crate::wire::{put_mac, put_string, string_payload_len, WireReader, WireWriter, STRING_PREFIX};

/// Longest shared secret the dataplane stores.
pub const MAX_SECRET_LEN: usize = 24;

const CLIENT_INDEX_LEN: usize = 4;
const ADD_DEL_FIXED: usize = CLIENT_INDEX_LEN + 1 + 4 + STRING_PREFIX;
const CREATE_FIXED: usize = CLIENT_INDEX_LEN + 4 + 4 + 4 + 4 + 2 + 6 + STRING_PREFIX;
const DELETE_FIXED: usize = CLIENT_INDEX_LEN + 4;

/// Which side of the interface allocates the shared memory regions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InterfaceRole {
    /// Primary side: owns the rings.
    Master,
    /// Secondary side: connects to a master.
    Slave,
}

impl InterfaceRole {
    pub const fn to_wire(self) -> u8 {
        match self {
            InterfaceRole::Master => 0,
            InterfaceRole::Slave => 1,
        }
    }

    pub const fn from_wire(value: u8) -> Option<Self> {
        match value {
            0 => Some(InterfaceRole::Master),
            1 => Some(InterfaceRole::Slave),
            _ => None,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            InterfaceRole::Master => "master",
            InterfaceRole::Slave => "slave",
        }
    }
}

impl fmt::Display for InterfaceRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Layer the interface carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InterfaceMode {
    Ethernet,
    Ip,
}

impl InterfaceMode {
    pub const fn to_wire(self) -> u8 {
        match self {
            InterfaceMode::Ethernet => 0,
            InterfaceMode::Ip => 1,
        }
    }

    pub const fn from_wire(value: u8) -> Option<Self> {
        match value {
            0 => Some(InterfaceMode::Ethernet),
            1 => Some(InterfaceMode::Ip),
            _ => None,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            InterfaceMode::Ethernet => "ethernet",
            InterfaceMode::Ip => "ip",
        }
    }
}

impl fmt::Display for InterfaceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Map (or unmap) a socket id to a control socket filename.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SocketFilenameAddDel {
    pub is_add: bool,
    pub socket_id: u32,
    /// Empty on delete.
    pub filename: String,
}

/// Parameters of a new memif interface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateInterface {
    pub role: InterfaceRole,
    pub mode: InterfaceMode,
    pub rx_queues: u8,
    pub tx_queues: u8,
    /// Interface id, unique per socket.
    pub id: u32,
    pub socket_id: u32,
    /// Descriptors per ring; zero lets the dataplane choose.
    pub ring_size: u32,
    /// Buffer size in bytes; zero lets the dataplane choose.
    pub buffer_size: u16,
    pub hw_addr: MacAddress,
    pub secret: Option<String>,
}

impl Default for CreateInterface {
    fn default() -> Self {
        Self {
            role: InterfaceRole::Slave,
            mode: InterfaceMode::Ethernet,
            rx_queues: 1,
            tx_queues: 1,
            id: 0,
            socket_id: 0,
            ring_size: 0,
            buffer_size: 0,
            hw_addr: MacAddress::ZERO,
            secret: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeleteInterface {
    pub sw_if_index: u32,
}

/// A validated control request, ready to encode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    SocketFilenameAddDel(SocketFilenameAddDel),
    /// Same body; the reply also reports the socket id.
    SocketFilenameAddDelV2(SocketFilenameAddDel),
    Create(CreateInterface),
    Delete(DeleteInterface),
    Dump,
    SocketFilenameDump,
    /// The parameterless sentinel that closes a dump.
    ControlPing,
}

impl Request {
    pub fn kind(&self) -> MessageKind {
        match self {
            Request::SocketFilenameAddDel(_) => MessageKind::SocketFilenameAddDel,
            Request::SocketFilenameAddDelV2(_) => MessageKind::SocketFilenameAddDelV2,
            Request::Create(_) => MessageKind::Create,
            Request::Delete(_) => MessageKind::Delete,
            Request::Dump => MessageKind::Dump,
            Request::SocketFilenameDump => MessageKind::SocketFilenameDump,
            Request::ControlPing => MessageKind::ControlPing,
        }
    }

    /// How the dataplane answers this request.
    pub fn expectation(&self) -> Result<ReplyExpectation> {
        let kind = self.kind();
        kind.expectation().ok_or(ApiError::WrongDirection(kind, "request"))
    }

    /// Encode the message body (without frame header).
    ///
    /// The buffer is sized from the fixed layout plus any string body before
    /// anything is written.
    pub fn encode(&self, client_index: u32) -> Result<Bytes> {
        let kind = self.kind();
        match self {
            Request::SocketFilenameAddDel(req) | Request::SocketFilenameAddDelV2(req) => {
                let trailing = string_payload_len(&req.filename)?;
                let mut w = WireWriter::new(kind, ADD_DEL_FIXED, trailing);
                let buf = w.buf();
                buf.put_u32(client_index);
                buf.put_u8(u8::from(req.is_add));
                buf.put_u32(req.socket_id);
                put_string(buf, &req.filename);
                w.finish()
            }
            Request::Create(req) => {
                let secret = req.secret.as_deref().unwrap_or("");
                let trailing = string_payload_len(secret)?;
                let mut w = WireWriter::new(kind, CREATE_FIXED, trailing);
                let buf = w.buf();
                buf.put_u32(client_index);
                buf.put_u8(req.role.to_wire());
                buf.put_u8(req.mode.to_wire());
                buf.put_u8(req.rx_queues);
                buf.put_u8(req.tx_queues);
                buf.put_u32(req.id);
                buf.put_u32(req.socket_id);
                buf.put_u32(req.ring_size);
                buf.put_u16(req.buffer_size);
                put_mac(buf, &req.hw_addr);
                put_string(buf, secret);
                w.finish()
            }
            Request::Delete(req) => {
                let mut w = WireWriter::new(kind, DELETE_FIXED, 0);
                let buf = w.buf();
                buf.put_u32(client_index);
                buf.put_u32(req.sw_if_index);
                w.finish()
            }
            Request::Dump | Request::SocketFilenameDump | Request::ControlPing => {
                let mut w = WireWriter::new(kind, CLIENT_INDEX_LEN, 0);
                w.buf().put_u32(client_index);
                w.finish()
            }
        }
    }

    /// Decode a request body; returns the sender's client index with it.
    pub fn decode(kind: MessageKind, payload: Bytes) -> Result<(u32, Request)> {
        let mut r = WireReader::new(kind, payload);
        let client_index = r.u32()?;

        let request = match kind {
            MessageKind::SocketFilenameAddDel | MessageKind::SocketFilenameAddDelV2 => {
                let body = SocketFilenameAddDel {
                    is_add: r.u8()? != 0,
                    socket_id: r.u32()?,
                    filename: r.string()?,
                };
                if kind == MessageKind::SocketFilenameAddDel {
                    Request::SocketFilenameAddDel(body)
                } else {
                    Request::SocketFilenameAddDelV2(body)
                }
            }
            MessageKind::Create => {
                let role = r.u8()?;
                let role = InterfaceRole::from_wire(role)
                    .ok_or_else(|| r.invalid("role", u32::from(role)))?;
                let mode = r.u8()?;
                let mode = InterfaceMode::from_wire(mode)
                    .ok_or_else(|| r.invalid("mode", u32::from(mode)))?;
                let rx_queues = r.u8()?;
                let tx_queues = r.u8()?;
                let id = r.u32()?;
                let socket_id = r.u32()?;
                let ring_size = r.u32()?;
                let buffer_size = r.u16()?;
                let hw_addr = r.mac()?;
                let secret = r.string()?;
                Request::Create(CreateInterface {
                    role,
                    mode,
                    rx_queues,
                    tx_queues,
                    id,
                    socket_id,
                    ring_size,
                    buffer_size,
                    hw_addr,
                    secret: (!secret.is_empty()).then_some(secret),
                })
            }
            MessageKind::Delete => Request::Delete(DeleteInterface {
                sw_if_index: r.u32()?,
            }),
            MessageKind::Dump => Request::Dump,
            MessageKind::SocketFilenameDump => Request::SocketFilenameDump,
            MessageKind::ControlPing => Request::ControlPing,
            other => return Err(ApiError::WrongDirection(other, "request")),
        };
        r.finish();

        Ok((client_index, request))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_create() -> CreateInterface {
        CreateInterface {
            role: InterfaceRole::Master,
            mode: InterfaceMode::Ip,
            rx_queues: 4,
            tx_queues: 255,
            id: 0xdead_beef,
            socket_id: 7,
            ring_size: 2048,
            buffer_size: u16::MAX,
            hw_addr: MacAddress([0x02, 0, 0, 0, 0, 0x2a]),
            secret: Some("s3cret".to_string()),
        }
    }

    #[test]
    fn socket_add_layout_is_network_order() {
        let req = Request::SocketFilenameAddDel(SocketFilenameAddDel {
            is_add: true,
            socket_id: 5,
            filename: "/tmp/a.sock".to_string(),
        });
        let bytes = req.encode(0x0102_0304).unwrap();

        assert_eq!(bytes.len(), ADD_DEL_FIXED + "/tmp/a.sock".len());
        assert_eq!(&bytes[0..4], &[1, 2, 3, 4]);
        assert_eq!(bytes[4], 1);
        assert_eq!(&bytes[5..9], &[0, 0, 0, 5]);
        assert_eq!(&bytes[9..13], &[0, 0, 0, 11]);
        assert_eq!(&bytes[13..], b"/tmp/a.sock");
    }

    #[test]
    fn create_round_trips_every_field() {
        let req = Request::Create(sample_create());
        let bytes = req.encode(3).unwrap();
        assert_eq!(bytes.len(), CREATE_FIXED + "s3cret".len());

        let (client_index, decoded) = Request::decode(MessageKind::Create, bytes).unwrap();
        assert_eq!(client_index, 3);
        assert_eq!(decoded, req);
    }

    #[test]
    fn create_without_secret_has_empty_string_field() {
        let req = Request::Create(CreateInterface::default());
        let bytes = req.encode(0).unwrap();
        assert_eq!(bytes.len(), CREATE_FIXED);
        assert_eq!(&bytes[CREATE_FIXED - 4..], &[0, 0, 0, 0]);

        let (_, decoded) = Request::decode(MessageKind::Create, bytes).unwrap();
        assert_eq!(decoded, req);
    }

    #[test]
    fn parameterless_requests_carry_only_client_index() {
        for req in [Request::Dump, Request::SocketFilenameDump, Request::ControlPing] {
            let bytes = req.encode(9).unwrap();
            assert_eq!(bytes.as_ref(), &[0, 0, 0, 9]);
            let (client_index, decoded) = Request::decode(req.kind(), bytes).unwrap();
            assert_eq!((client_index, decoded), (9, req));
        }
    }

    #[test]
    fn delete_round_trips() {
        let req = Request::Delete(DeleteInterface { sw_if_index: 12 });
        let bytes = req.encode(1).unwrap();
        assert_eq!(bytes.len(), DELETE_FIXED);
        assert_eq!(Request::decode(MessageKind::Delete, bytes).unwrap().1, req);
    }

    #[test]
    fn decode_rejects_unknown_role() {
        let mut bytes = Request::Create(sample_create()).encode(0).unwrap().to_vec();
        bytes[4] = 9;
        let err = Request::decode(MessageKind::Create, Bytes::from(bytes)).unwrap_err();
        assert!(matches!(
            err,
            ApiError::InvalidField {
                field: "role",
                value: 9,
                ..
            }
        ));
    }

    #[test]
    fn decode_rejects_truncated_create() {
        let bytes = Request::Create(sample_create()).encode(0).unwrap();
        let short = bytes.slice(..20);
        assert!(matches!(
            Request::decode(MessageKind::Create, short),
            Err(ApiError::Truncated { .. })
        ));
    }

    #[test]
    fn decode_refuses_reply_kinds() {
        assert!(matches!(
            Request::decode(MessageKind::CreateReply, Bytes::from_static(&[0, 0, 0, 0])),
            Err(ApiError::WrongDirection(MessageKind::CreateReply, _))
        ));
    }

    #[test]
    fn kind_and_expectation_agree_with_message_table_metadata() {
        let requests = [
            Request::SocketFilenameAddDel(SocketFilenameAddDel {
                is_add: false,
                socket_id: 1,
                filename: String::new(),
            }),
            Request::Create(CreateInterface::default()),
            Request::Delete(DeleteInterface { sw_if_index: 1 }),
            Request::Dump,
            Request::SocketFilenameDump,
            Request::ControlPing,
        ];
        for req in requests {
            assert_eq!(req.expectation().ok(), req.kind().expectation());
        }
    }
}
