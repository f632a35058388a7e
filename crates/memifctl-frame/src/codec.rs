use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{FrameError, Result};

/// Frame header: magic (2) + length (4) + message id (2) = 8 bytes.
pub const HEADER_SIZE: usize = 8;

/// Magic bytes: "VA" (0x56 0x41).
pub const MAGIC: [u8; 2] = [0x56, 0x41];

/// Default maximum payload size: 1 MiB. API messages are small; dumps
/// arrive as one frame per record.
pub const DEFAULT_MAX_PAYLOAD: usize = 1024 * 1024;

/// Message id reserved for the connection handshake.
pub const HANDSHAKE: u16 = 0;

/// One API message as carried on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Dataplane-assigned message id.
    pub msg_id: u16,
    /// Encoded message body.
    pub payload: Bytes,
}

impl Frame {
    pub fn new(msg_id: u16, payload: impl Into<Bytes>) -> Self {
        Self {
            msg_id,
            payload: payload.into(),
        }
    }
}

/// Encode a frame into `dst`.
///
/// ```text
/// ┌────────────┬─────────────┬──────────────┬──────────────────┐
/// │ Magic (2B) │ Length      │ Message id   │ Payload          │
/// │ 0x56 0x41  │ (4B BE)     │ (2B BE)      │ (Length bytes)   │
/// └────────────┴─────────────┴──────────────┴──────────────────┘
/// ```
pub fn encode_frame(msg_id: u16, payload: &[u8], dst: &mut BytesMut) -> Result<()> {
    let len = u32::try_from(payload.len()).map_err(|_| FrameError::PayloadTooLarge {
        size: payload.len(),
        max: u32::MAX as usize,
    })?;
    dst.reserve(HEADER_SIZE + payload.len());
    dst.put_slice(&MAGIC);
    dst.put_u32(len);
    dst.put_u16(msg_id);
    dst.put_slice(payload);
    Ok(())
}

/// Decode one frame from the front of `src`.
///
/// Returns `Ok(None)` until a complete frame is buffered; consumes the
/// frame bytes on success.
pub fn decode_frame(src: &mut BytesMut, max_payload: usize) -> Result<Option<Frame>> {
    if src.len() < HEADER_SIZE {
        return Ok(None);
    }

    if src[0..2] != MAGIC {
        return Err(FrameError::InvalidMagic);
    }

    let payload_len = u32::from_be_bytes([src[2], src[3], src[4], src[5]]) as usize;
    let msg_id = u16::from_be_bytes([src[6], src[7]]);

    if payload_len > max_payload {
        return Err(FrameError::PayloadTooLarge {
            size: payload_len,
            max: max_payload,
        });
    }

    if src.len() < HEADER_SIZE + payload_len {
        return Ok(None);
    }

    src.advance(HEADER_SIZE);
    let payload = src.split_to(payload_len).freeze();

    Ok(Some(Frame { msg_id, payload }))
}

/// Reader/writer limits.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Maximum payload size in bytes. Default: 1 MiB.
    pub max_payload_size: usize,
    /// Read timeout applied to the stream, if any.
    pub read_timeout: Option<std::time::Duration>,
    /// Write timeout applied to the stream, if any.
    pub write_timeout: Option<std::time::Duration>,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_payload_size: DEFAULT_MAX_PAYLOAD,
            read_timeout: None,
            write_timeout: None,
        }
    }
}
