//! Message framing for the debug-visualization stream.
//!
//! Every message is wrapped in a 16-byte envelope:
//! - An 8-byte tag (`BPACKET\0` or `CPACKET\0`) whose first byte announces the
//!   sender's byte order
//! - A 4-byte payload length in the sender's byte order
//! - A 4-byte CRC-32 over the tag and length
//!
//! A receiver that loses alignment drops one byte at a time until a header
//! passes both checks again, so garbage on the wire costs bytes, not the
//! connection.

pub mod codec;
pub mod connection;
pub mod endian;
pub mod error;
pub mod reader;
pub mod writer;

#[cfg(feature = "async")]
pub mod async_codec;

#[cfg(feature = "async")]
pub use async_codec::EnvelopeCodec;
pub use codec::{
    decode_envelope, encode_envelope, Decoded, Envelope, FrameConfig, DEFAULT_MAX_PAYLOAD,
    HEADER_SIZE,
};
pub use connection::{Connection, ConnectionConfig, ConnectionStats, Message, Role};
pub use endian::Endian;
pub use error::{FrameError, Result};
pub use reader::FrameReader;
pub use writer::FrameWriter;
