//! Socket transport for the debug-visualization stream.
//!
//! This is the lowest layer of dbgvis: bind, accept and connect TCP sockets
//! and hand out a [`SocketStream`] that the framing layer reads and writes.
//! Everything else builds on top of the types provided here.

pub mod error;
pub mod stream;
pub mod tcp;

pub use error::{Result, TransportError};
pub use stream::SocketStream;
pub use tcp::{TcpEndpoint, DEFAULT_HOST, DEFAULT_PORT};
