/// Errors that can occur during frame encoding/decoding.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The trailing checksum byte does not match the header and payload.
    #[error("checksum mismatch (expected {expected:#04x}, got {actual:#04x})")]
    ChecksumMismatch { expected: u8, actual: u8 },

    /// The frame body is shorter than its header declares.
    #[error("truncated frame ({actual} bytes, need at least {needed})")]
    Truncated { needed: usize, actual: usize },

    /// The frame body grew past the configured maximum before its end delimiter.
    #[error("frame exceeds {max} bytes")]
    FrameTooLarge { max: usize },

    /// An escape marker was followed by a byte that is not a known substitute.
    #[error("invalid escape sequence 0xAB {0:#04x}")]
    InvalidEscape(u8),

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The channel reached EOF.
    #[error("connection closed")]
    ConnectionClosed,
}

impl FrameError {
    /// True for errors that only affect a single frame; the stream is still usable.
    pub fn is_corrupt_frame(&self) -> bool {
        matches!(
            self,
            Self::ChecksumMismatch { .. }
                | Self::Truncated { .. }
                | Self::FrameTooLarge { .. }
                | Self::InvalidEscape(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, FrameError>;
