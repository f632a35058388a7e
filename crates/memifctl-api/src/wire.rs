use bytes::{Buf, BufMut, Bytes, BytesMut};
use tracing::trace;

use crate::error::{ApiError, Result};
use crate::mac::MacAddress;
use crate::message::MessageKind;

/// Longest string body accepted in either direction.
pub const MAX_STRING_LEN: usize = 64 * 1024;

/// Size of a string's length prefix.
pub(crate) const STRING_PREFIX: usize = 4;

/// Trailing bytes a string adds after the fixed part of a message.
pub(crate) fn string_payload_len(s: &str) -> Result<usize> {
    if s.len() > MAX_STRING_LEN {
        return Err(ApiError::StringTooLong {
            len: s.len(),
            max: MAX_STRING_LEN,
        });
    }
    Ok(s.len())
}

/// Write `u32 BE length` + raw bytes; returns the body length written.
pub(crate) fn put_string(dst: &mut BytesMut, s: &str) -> usize {
    dst.put_u32(s.len() as u32);
    dst.put_slice(s.as_bytes());
    s.len()
}

pub(crate) fn put_mac(dst: &mut BytesMut, mac: &MacAddress) {
    dst.put_slice(&mac.octets());
}

/// Builds one message into a buffer sized up front.
pub(crate) struct WireWriter {
    kind: MessageKind,
    expected: usize,
    buf: BytesMut,
}

impl WireWriter {
    pub(crate) fn new(kind: MessageKind, fixed: usize, trailing: usize) -> Self {
        let expected = fixed + trailing;
        Self {
            kind,
            expected,
            buf: BytesMut::with_capacity(expected),
        }
    }

    pub(crate) fn buf(&mut self) -> &mut BytesMut {
        &mut self.buf
    }

    /// Check the written size against the computed one and freeze.
    pub(crate) fn finish(self) -> Result<Bytes> {
        if self.buf.len() != self.expected {
            return Err(ApiError::SizeMismatch {
                kind: self.kind,
                expected: self.expected,
                written: self.buf.len(),
            });
        }
        Ok(self.buf.freeze())
    }
}

/// Bounds-checked big-endian field reader over one message body.
///
/// Bytes past the last known field are ignored, so newer dataplanes may
/// append fields.
pub(crate) struct WireReader {
    kind: MessageKind,
    buf: Bytes,
}

impl WireReader {
    pub(crate) fn new(kind: MessageKind, buf: Bytes) -> Self {
        Self { kind, buf }
    }

    fn need(&self, n: usize) -> Result<()> {
        if self.buf.remaining() < n {
            return Err(ApiError::Truncated {
                kind: self.kind,
                needed: n,
                available: self.buf.remaining(),
            });
        }
        Ok(())
    }

    pub(crate) fn u8(&mut self) -> Result<u8> {
        self.need(1)?;
        Ok(self.buf.get_u8())
    }

    pub(crate) fn u16(&mut self) -> Result<u16> {
        self.need(2)?;
        Ok(self.buf.get_u16())
    }

    pub(crate) fn u32(&mut self) -> Result<u32> {
        self.need(4)?;
        Ok(self.buf.get_u32())
    }

    pub(crate) fn i32(&mut self) -> Result<i32> {
        self.need(4)?;
        Ok(self.buf.get_i32())
    }

    pub(crate) fn mac(&mut self) -> Result<MacAddress> {
        self.need(6)?;
        let mut octets = [0u8; 6];
        self.buf.copy_to_slice(&mut octets);
        Ok(MacAddress(octets))
    }

    /// Length-prefixed string. Only the declared bytes are read; trailing
    /// NULs are dropped and invalid UTF-8 is replaced.
    pub(crate) fn string(&mut self) -> Result<String> {
        let len = self.u32()? as usize;
        if len > MAX_STRING_LEN {
            return Err(ApiError::StringTooLong {
                len,
                max: MAX_STRING_LEN,
            });
        }
        self.need(len)?;
        let body = self.buf.split_to(len);
        let body = match body.iter().position(|b| *b == 0) {
            Some(nul) => &body[..nul],
            None => &body[..],
        };
        Ok(String::from_utf8_lossy(body).into_owned())
    }

    /// Drop whatever follows the known fields.
    pub(crate) fn finish(self) {
        if self.buf.has_remaining() {
            trace!(kind = %self.kind, extra = self.buf.remaining(), "ignoring trailing bytes");
        }
    }

    pub(crate) fn invalid(&self, field: &'static str, value: u32) -> ApiError {
        ApiError::InvalidField {
            kind: self.kind,
            field,
            value,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_reads_only_declared_length() {
        let mut buf = BytesMut::new();
        put_string(&mut buf, "abc");
        buf.put_slice(b"def");

        let mut reader = WireReader::new(MessageKind::Details, buf.freeze());
        assert_eq!(reader.string().unwrap(), "abc");
        assert_eq!(reader.u8().unwrap(), b'd');
    }

    #[test]
    fn string_stops_at_embedded_nul() {
        let mut buf = BytesMut::new();
        buf.put_u32(6);
        buf.put_slice(b"eth\0\0\0");

        let mut reader = WireReader::new(MessageKind::Details, buf.freeze());
        assert_eq!(reader.string().unwrap(), "eth");
    }

    #[test]
    fn string_longer_than_buffer_is_truncated_error() {
        let mut buf = BytesMut::new();
        buf.put_u32(10);
        buf.put_slice(b"abc");

        let mut reader = WireReader::new(MessageKind::SocketFilenameDetails, buf.freeze());
        assert!(matches!(
            reader.string(),
            Err(ApiError::Truncated {
                needed: 10,
                available: 3,
                ..
            })
        ));
    }

    #[test]
    fn writer_detects_size_mismatch() {
        let mut writer = WireWriter::new(MessageKind::Delete, 8, 0);
        writer.buf().put_u32(1);
        assert!(matches!(
            writer.finish(),
            Err(ApiError::SizeMismatch {
                expected: 8,
                written: 4,
                ..
            })
        ));
    }

    #[test]
    fn oversized_string_is_rejected_before_encoding() {
        let long = "x".repeat(MAX_STRING_LEN + 1);
        assert!(matches!(
            string_payload_len(&long),
            Err(ApiError::StringTooLong { .. })
        ));
    }
}
