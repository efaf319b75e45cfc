use dbgvis_primitive::PrimitiveError;

/// Errors that can occur while writing or playing back recordings.
#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    /// The file does not start with a recording header we understand.
    #[error("not a recording file: {0}")]
    BadHeader(String),

    /// A frame's data ends before its header says it should.
    #[error("frame {frame} truncated (needed {needed} bytes, {available} available)")]
    Truncated {
        frame: usize,
        needed: u64,
        available: u64,
    },

    /// A frame's payload does not match its own sub-headers.
    #[error("frame {frame} is corrupt: {reason}")]
    Corrupt { frame: usize, reason: String },

    /// Seek target past the last indexed frame.
    #[error("frame {index} out of range ({count} frames)")]
    FrameOutOfRange { index: usize, count: usize },

    /// A frame grew past what its 32-bit header can describe.
    #[error("frame too large for the recording format ({size} bytes)")]
    FrameTooLarge { size: u64 },

    /// Primitive records inside a frame failed to decode.
    #[error("primitive decode failed: {0}")]
    Primitive(#[from] PrimitiveError),

    /// I/O error on the underlying file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, RecordError>;
