/// Errors that can occur while encoding, reading or writing frames.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The frame header does not start with the expected magic.
    #[error("invalid frame magic (expected 0x5641 \"VA\")")]
    InvalidMagic,

    /// The payload exceeds the configured maximum size.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// An I/O error occurred on the underlying stream.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The peer closed the connection (possibly mid-frame).
    #[error("connection closed")]
    ConnectionClosed,
}

pub type Result<T> = std::result::Result<T, FrameError>;
