/// Errors that can occur while decoding primitive streams.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PrimitiveError {
    /// A record header or payload extends past the end of the buffer.
    #[error("primitive stream truncated (needed {needed} bytes, {available} available)")]
    Truncated { needed: usize, available: usize },

    /// Bytes were left over after the declared number of records.
    #[error("{0} trailing bytes after the last primitive")]
    TrailingBytes(usize),

    /// The display partition tag is not one we know.
    #[error("unknown display type {0}")]
    UnknownDisplayType(u32),
}

pub type Result<T> = std::result::Result<T, PrimitiveError>;
