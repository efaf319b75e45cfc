use crate::config::RunMode;

/// Errors that can occur in session operations.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Connection setup or framing failed.
    #[error("connection error: {0}")]
    Frame(#[from] dbgvis_frame::FrameError),

    /// Recording or playback failed.
    #[error("recording error: {0}")]
    Record(#[from] dbgvis_record::RecordError),

    /// Primitive records inside a packet failed to decode.
    #[error("primitive error: {0}")]
    Primitive(#[from] dbgvis_primitive::PrimitiveError),

    /// A packet tag we do not know.
    #[error("unknown packet type {0}")]
    UnknownPacket(u32),

    /// A packet whose body does not match its type.
    #[error("malformed {packet} packet: {reason}")]
    Malformed {
        packet: &'static str,
        reason: String,
    },

    /// The run mode writes a recording but no stream file was configured.
    #[error("run mode {0} requires a stream file")]
    MissingStreamFile(RunMode),

    /// Invalid configuration value.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// JSON configuration could not be parsed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, SessionError>;
