use bytes::{BufMut, Bytes};
use serde::Serialize;

use crate::bits::extract_bits;
use crate::error::{ApiError, Result};
use crate::mac::MacAddress;
use crate::message::MessageKind;
use crate::request::{InterfaceMode, InterfaceRole};
use crate::wire::{put_mac, put_string, string_payload_len, WireReader, WireWriter, STRING_PREFIX};

const RETVAL_LEN: usize = 4;
const DETAILS_FIXED: usize = 4 + 6 + 4 + 1 + 1 + 4 + 4 + 2 + 1 + STRING_PREFIX;
const SOCKET_DETAILS_FIXED: usize = 4 + STRING_PREFIX;
const CONTROL_PING_FIXED: usize = RETVAL_LEN + 4 + 4;

const FLAG_ADMIN_UP: u32 = 0;
const FLAG_LINK_UP: u32 = 1;

/// One interface reported by a dump.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InterfaceDetails {
    pub sw_if_index: u32,
    pub hw_addr: MacAddress,
    pub id: u32,
    pub role: InterfaceRole,
    pub mode: InterfaceMode,
    pub socket_id: u32,
    pub ring_size: u32,
    pub buffer_size: u16,
    pub admin_up: bool,
    pub link_up: bool,
    pub if_name: String,
}

impl InterfaceDetails {
    fn flags(&self) -> u8 {
        (u8::from(self.link_up) << FLAG_LINK_UP) | (u8::from(self.admin_up) << FLAG_ADMIN_UP)
    }
}

/// One socket id → filename mapping reported by a dump.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SocketFilenameDetails {
    pub socket_id: u32,
    pub socket_filename: String,
}

/// A decoded dataplane message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    SocketFilenameAddDel { retval: i32 },
    SocketFilenameAddDelV2 { retval: i32, socket_id: u32 },
    Create { retval: i32, sw_if_index: u32 },
    Delete { retval: i32 },
    Details(InterfaceDetails),
    SocketFilenameDetails(SocketFilenameDetails),
    /// Acknowledges a control ping; closes every dump.
    ControlPing {
        retval: i32,
        client_index: u32,
        vpe_pid: u32,
    },
}

impl Reply {
    pub fn kind(&self) -> MessageKind {
        match self {
            Reply::SocketFilenameAddDel { .. } => MessageKind::SocketFilenameAddDelReply,
            Reply::SocketFilenameAddDelV2 { .. } => MessageKind::SocketFilenameAddDelV2Reply,
            Reply::Create { .. } => MessageKind::CreateReply,
            Reply::Delete { .. } => MessageKind::DeleteReply,
            Reply::Details(_) => MessageKind::Details,
            Reply::SocketFilenameDetails(_) => MessageKind::SocketFilenameDetails,
            Reply::ControlPing { .. } => MessageKind::ControlPingReply,
        }
    }

    /// Result code carried by acks; `None` for detail records.
    pub fn retval(&self) -> Option<i32> {
        match self {
            Reply::SocketFilenameAddDel { retval }
            | Reply::SocketFilenameAddDelV2 { retval, .. }
            | Reply::Create { retval, .. }
            | Reply::Delete { retval }
            | Reply::ControlPing { retval, .. } => Some(*retval),
            Reply::Details(_) | Reply::SocketFilenameDetails(_) => None,
        }
    }

    pub fn encode(&self) -> Result<Bytes> {
        let kind = self.kind();
        match self {
            Reply::SocketFilenameAddDel { retval } | Reply::Delete { retval } => {
                let mut w = WireWriter::new(kind, RETVAL_LEN, 0);
                w.buf().put_i32(*retval);
                w.finish()
            }
            Reply::SocketFilenameAddDelV2 {
                retval,
                socket_id: handle,
            }
            | Reply::Create {
                retval,
                sw_if_index: handle,
            } => {
                let mut w = WireWriter::new(kind, RETVAL_LEN + 4, 0);
                let buf = w.buf();
                buf.put_i32(*retval);
                buf.put_u32(*handle);
                w.finish()
            }
            Reply::Details(d) => {
                let trailing = string_payload_len(&d.if_name)?;
                let mut w = WireWriter::new(kind, DETAILS_FIXED, trailing);
                let buf = w.buf();
                buf.put_u32(d.sw_if_index);
                put_mac(buf, &d.hw_addr);
                buf.put_u32(d.id);
                buf.put_u8(d.role.to_wire());
                buf.put_u8(d.mode.to_wire());
                buf.put_u32(d.socket_id);
                buf.put_u32(d.ring_size);
                buf.put_u16(d.buffer_size);
                buf.put_u8(d.flags());
                put_string(buf, &d.if_name);
                w.finish()
            }
            Reply::SocketFilenameDetails(d) => {
                let trailing = string_payload_len(&d.socket_filename)?;
                let mut w = WireWriter::new(kind, SOCKET_DETAILS_FIXED, trailing);
                let buf = w.buf();
                buf.put_u32(d.socket_id);
                put_string(buf, &d.socket_filename);
                w.finish()
            }
            Reply::ControlPing {
                retval,
                client_index,
                vpe_pid,
            } => {
                let mut w = WireWriter::new(kind, CONTROL_PING_FIXED, 0);
                let buf = w.buf();
                buf.put_i32(*retval);
                buf.put_u32(*client_index);
                buf.put_u32(*vpe_pid);
                w.finish()
            }
        }
    }

    /// Decode a message body received under `kind`.
    pub fn decode(kind: MessageKind, payload: Bytes) -> Result<Reply> {
        let mut r = WireReader::new(kind, payload);
        let reply = match kind {
            MessageKind::SocketFilenameAddDelReply => Reply::SocketFilenameAddDel { retval: r.i32()? },
            MessageKind::SocketFilenameAddDelV2Reply => Reply::SocketFilenameAddDelV2 {
                retval: r.i32()?,
                socket_id: r.u32()?,
            },
            MessageKind::CreateReply => Reply::Create {
                retval: r.i32()?,
                sw_if_index: r.u32()?,
            },
            MessageKind::DeleteReply => Reply::Delete { retval: r.i32()? },
            MessageKind::Details => {
                let sw_if_index = r.u32()?;
                let hw_addr = r.mac()?;
                let id = r.u32()?;
                let role = r.u8()?;
                let role = InterfaceRole::from_wire(role)
                    .ok_or_else(|| r.invalid("role", u32::from(role)))?;
                let mode = r.u8()?;
                let mode = InterfaceMode::from_wire(mode)
                    .ok_or_else(|| r.invalid("mode", u32::from(mode)))?;
                let socket_id = r.u32()?;
                let ring_size = r.u32()?;
                let buffer_size = r.u16()?;
                let flags = u64::from(r.u8()?);
                let if_name = r.string()?;
                Reply::Details(InterfaceDetails {
                    sw_if_index,
                    hw_addr,
                    id,
                    role,
                    mode,
                    socket_id,
                    ring_size,
                    buffer_size,
                    admin_up: extract_bits(flags, FLAG_ADMIN_UP, 1) == 1,
                    link_up: extract_bits(flags, FLAG_LINK_UP, 1) == 1,
                    if_name,
                })
            }
            MessageKind::SocketFilenameDetails => {
                Reply::SocketFilenameDetails(SocketFilenameDetails {
                    socket_id: r.u32()?,
                    socket_filename: r.string()?,
                })
            }
            MessageKind::ControlPingReply => Reply::ControlPing {
                retval: r.i32()?,
                client_index: r.u32()?,
                vpe_pid: r.u32()?,
            },
            other => return Err(ApiError::WrongDirection(other, "reply")),
        };
        r.finish();
        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn details() -> InterfaceDetails {
        InterfaceDetails {
            sw_if_index: 3,
            hw_addr: MacAddress([0x02, 0xfe, 0, 0, 0, 1]),
            id: 42,
            role: InterfaceRole::Slave,
            mode: InterfaceMode::Ethernet,
            socket_id: 0,
            ring_size: 1024,
            buffer_size: u16::MAX,
            admin_up: true,
            link_up: false,
            if_name: "memif0/42".to_string(),
        }
    }

    #[test]
    fn details_round_trip_including_flags() {
        for (admin_up, link_up) in [(false, false), (true, false), (false, true), (true, true)] {
            let reply = Reply::Details(InterfaceDetails {
                admin_up,
                link_up,
                ..details()
            });
            let bytes = reply.encode().unwrap();
            assert_eq!(bytes.len(), DETAILS_FIXED + "memif0/42".len());
            assert_eq!(Reply::decode(MessageKind::Details, bytes).unwrap(), reply);
        }
    }

    #[test]
    fn create_ack_carries_negative_retval_verbatim() {
        let reply = Reply::Create {
            retval: -3,
            sw_if_index: 0,
        };
        let bytes = reply.encode().unwrap();
        assert_eq!(&bytes[..4], &(-3i32).to_be_bytes());
        let decoded = Reply::decode(MessageKind::CreateReply, bytes).unwrap();
        assert_eq!(decoded.retval(), Some(-3));
    }

    #[test]
    fn socket_details_name_is_not_read_past_declared_length() {
        let reply = Reply::SocketFilenameDetails(SocketFilenameDetails {
            socket_id: 5,
            socket_filename: "/tmp/a.sock".to_string(),
        });
        let mut bytes = reply.encode().unwrap().to_vec();
        bytes.extend_from_slice(b"garbage");
        let decoded = Reply::decode(MessageKind::SocketFilenameDetails, Bytes::from(bytes)).unwrap();
        assert_eq!(decoded, reply);
    }

    #[test]
    fn control_ping_reply_round_trips() {
        let reply = Reply::ControlPing {
            retval: 0,
            client_index: 7,
            vpe_pid: 4242,
        };
        let bytes = reply.encode().unwrap();
        assert_eq!(
            Reply::decode(MessageKind::ControlPingReply, bytes).unwrap(),
            reply
        );
    }

    #[test]
    fn short_ack_is_truncated_error() {
        let err = Reply::decode(MessageKind::CreateReply, Bytes::from_static(&[0, 0, 0, 0, 1]))
            .unwrap_err();
        assert!(matches!(
            err,
            ApiError::Truncated {
                kind: MessageKind::CreateReply,
                needed: 4,
                available: 1
            }
        ));
    }

    #[test]
    fn requests_are_not_replies() {
        assert!(matches!(
            Reply::decode(MessageKind::Dump, Bytes::new()),
            Err(ApiError::WrongDirection(MessageKind::Dump, "reply"))
        ));
    }

    #[test]
    fn details_serialize_for_output() {
        let json = serde_json::to_value(details()).unwrap();
        assert_eq!(json["hw_addr"], "02:fe:00:00:00:01");
        assert_eq!(json["role"], "slave");
        assert_eq!(json["buffer_size"], 65535);
    }

    #[test]
    fn retval_absent_on_detail_records() {
        assert_eq!(Reply::Details(details()).retval(), None);
        assert_eq!(Reply::Delete { retval: -4 }.retval(), Some(-4));
    }
}
