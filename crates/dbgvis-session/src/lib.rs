//! Frame-synchronized debug primitive sessions.
//!
//! A [`Session`] connects a producer of debug primitives to one consumer:
//! a remote viewer over TCP, the caller's own renderer, or a recording file.
//! Over a connection it runs a version handshake, accumulates received
//! packets into frames, acknowledges each flushed frame, and paces the
//! producer on those acknowledgements. Commands, named resources and input
//! events share the same connection.
//!
//! ```no_run
//! use dbgvis_primitive::{Command, DebugPrimitive, DisplayType, NullRenderer};
//! use dbgvis_session::{RunMode, Session, SessionConfig};
//!
//! let config = SessionConfig { mode: RunMode::Server, ..SessionConfig::default() };
//! let mut session = Session::start(config, None)?;
//! let line = DebugPrimitive::from_floats(Command::LINE, &[0.0, 0.0, 0.0, 1.0, 1.0, 1.0]);
//! for frame in 0.. {
//!     session.process_messages(&mut NullRenderer);
//!     if session.send_frame(frame, &[(DisplayType::WorldZ, vec![line.clone()])], &mut NullRenderer) {
//!         session.server_wait(None);
//!     }
//! }
//! # Ok::<(), dbgvis_session::SessionError>(())
//! ```

pub mod args;
pub mod config;
pub mod error;
pub mod input;
pub mod packet;
pub mod resource;
pub mod session;

pub use args::split_args;
pub use config::{RunMode, SessionConfig, DEFAULT_HOST, DEFAULT_PORT};
pub use error::{Result, SessionError};
pub use input::{InputEvent, InputKind};
pub use packet::{Packet, PROTOCOL_VERSION};
pub use resource::{Resource, ResourceProvider};
pub use session::Session;
