use std::io::{ErrorKind, Read};

use bytes::BytesMut;
use memifctl_transport::{ControlStream, TransportError};

use crate::codec::{decode_frame, Frame, FrameConfig};
use crate::error::{FrameError, Result};

const READ_CHUNK_SIZE: usize = 4 * 1024;

/// Reads complete frames from any `Read` stream.
///
/// Partial reads are buffered internally; callers only see whole frames.
pub struct FrameReader<T> {
    inner: T,
    buf: BytesMut,
    config: FrameConfig,
}

impl<T: Read> FrameReader<T> {
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(READ_CHUNK_SIZE),
            config,
        }
    }

    /// Read the next complete frame (blocking).
    ///
    /// Returns `Err(FrameError::ConnectionClosed)` at EOF, including EOF in
    /// the middle of a frame.
    pub fn read_frame(&mut self) -> Result<Frame> {
        loop {
            if let Some(frame) = decode_frame(&mut self.buf, self.config.max_payload_size)? {
                return Ok(frame);
            }

            let mut chunk = [0u8; READ_CHUNK_SIZE];
            let read = match self.inner.read(&mut chunk) {
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            };

            if read == 0 {
                return Err(FrameError::ConnectionClosed);
            }

            self.buf.extend_from_slice(&chunk[..read]);
        }
    }

    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Update maximum payload size for subsequent frames.
    pub fn set_max_payload_size(&mut self, max_payload_size: usize) {
        self.config.max_payload_size = max_payload_size;
    }
}

impl FrameReader<ControlStream> {
    /// Wrap a control stream and apply the configured read timeout.
    pub fn with_config_stream(inner: ControlStream, config: FrameConfig) -> Result<Self> {
        inner
            .set_read_timeout(config.read_timeout)
            .map_err(transport_to_frame_error)?;
        Ok(Self::with_config(inner, config))
    }

    /// Replace the read timeout on the underlying stream.
    pub fn set_read_timeout(&mut self, timeout: Option<std::time::Duration>) -> Result<()> {
        self.inner
            .set_read_timeout(timeout)
            .map_err(transport_to_frame_error)?;
        self.config.read_timeout = timeout;
        Ok(())
    }
}

pub(crate) fn transport_to_frame_error(err: TransportError) -> FrameError {
    match err {
        TransportError::Io(io) | TransportError::Accept(io) => FrameError::Io(io),
        TransportError::Bind { source, .. } | TransportError::Connect { source, .. } => {
            FrameError::Io(source)
        }
        other => FrameError::Io(std::io::Error::other(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use bytes::BufMut;

    use super::*;
    use crate::codec::{encode_frame, MAGIC};
    use crate::writer::FrameWriter;

    #[test]
    fn reads_back_to_back_frames() {
        let mut wire = BytesMut::new();
        encode_frame(10, b"one", &mut wire).unwrap();
        encode_frame(11, b"two", &mut wire).unwrap();

        let mut reader = FrameReader::new(Cursor::new(wire.to_vec()));
        let f1 = reader.read_frame().unwrap();
        let f2 = reader.read_frame().unwrap();

        assert_eq!((f1.msg_id, f1.payload.as_ref()), (10, b"one".as_ref()));
        assert_eq!((f2.msg_id, f2.payload.as_ref()), (11, b"two".as_ref()));
    }

    #[test]
    fn reassembles_byte_by_byte_input() {
        let mut wire = BytesMut::new();
        encode_frame(4, b"slow", &mut wire).unwrap();

        let mut reader = FrameReader::new(ByteByByteReader {
            bytes: wire.to_vec(),
            pos: 0,
        });
        let frame = reader.read_frame().unwrap();
        assert_eq!(frame.msg_id, 4);
        assert_eq!(frame.payload.as_ref(), b"slow");
    }

    #[test]
    fn clean_eof_is_connection_closed() {
        let mut reader = FrameReader::new(Cursor::new(Vec::<u8>::new()));
        assert!(matches!(
            reader.read_frame(),
            Err(FrameError::ConnectionClosed)
        ));
    }

    #[test]
    fn eof_mid_frame_is_connection_closed() {
        let mut partial = BytesMut::new();
        partial.put_slice(&MAGIC);
        partial.put_u32(16);
        partial.put_u16(2);
        partial.put_slice(b"only-part");

        let mut reader = FrameReader::new(Cursor::new(partial.to_vec()));
        assert!(matches!(
            reader.read_frame(),
            Err(FrameError::ConnectionClosed)
        ));
    }

    #[test]
    fn oversized_frame_is_rejected() {
        let mut wire = BytesMut::new();
        encode_frame(1, &[0u8; 64], &mut wire).unwrap();

        let cfg = FrameConfig {
            max_payload_size: 16,
            ..FrameConfig::default()
        };
        let mut reader = FrameReader::with_config(Cursor::new(wire.to_vec()), cfg);
        assert!(matches!(
            reader.read_frame(),
            Err(FrameError::PayloadTooLarge { .. })
        ));
    }

    #[test]
    fn interrupted_read_is_retried() {
        let mut wire = BytesMut::new();
        encode_frame(8, b"ok", &mut wire).unwrap();

        let mut reader = FrameReader::new(InterruptedOnce {
            interrupted: false,
            inner: Cursor::new(wire.to_vec()),
        });
        let frame = reader.read_frame().unwrap();
        assert_eq!(frame.msg_id, 8);
    }

    #[test]
    fn roundtrip_over_control_stream_pair() {
        let (left, right) = ControlStream::pair().unwrap();
        let mut writer = FrameWriter::new(left);
        let mut reader = FrameReader::with_config_stream(right, FrameConfig::default()).unwrap();

        writer.send(42, b"memif").unwrap();
        let frame = reader.read_frame().unwrap();
        assert_eq!(frame.msg_id, 42);
        assert_eq!(frame.payload.as_ref(), b"memif");
    }

    #[test]
    fn read_timeout_surfaces_as_io_error() {
        let (_left, right) = ControlStream::pair().unwrap();
        let cfg = FrameConfig {
            read_timeout: Some(std::time::Duration::from_millis(10)),
            ..FrameConfig::default()
        };
        let mut reader = FrameReader::with_config_stream(right, cfg).unwrap();

        let err = reader.read_frame().unwrap_err();
        assert!(matches!(
            err,
            FrameError::Io(ref e) if e.kind() == ErrorKind::WouldBlock || e.kind() == ErrorKind::TimedOut
        ));
    }

    struct ByteByByteReader {
        bytes: Vec<u8>,
        pos: usize,
    }

    impl Read for ByteByByteReader {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.pos >= self.bytes.len() || buf.is_empty() {
                return Ok(0);
            }
            buf[0] = self.bytes[self.pos];
            self.pos += 1;
            Ok(1)
        }
    }

    struct InterruptedOnce {
        interrupted: bool,
        inner: Cursor<Vec<u8>>,
    }

    impl Read for InterruptedOnce {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if !self.interrupted {
                self.interrupted = true;
                return Err(std::io::Error::from(ErrorKind::Interrupted));
            }
            self.inner.read(buf)
        }
    }
}
