//! Stream debug primitives from a running program to a viewer.
//!
//! A producer builds frames of small self-describing drawing records and
//! hands them to a [`session::Session`], which ships them to a connected
//! viewer, renders them locally, or records them for later replay. A viewer
//! acknowledges every frame so the producer never runs ahead of it.
//!
//! # Crate Structure
//!
//! - [`transport`]: TCP endpoints
//! - [`frame`]: endian-tagged envelopes with CRC and resync, and the
//!   background-thread connection
//! - [`primitive`]: primitive records, frames, renderers and the retained buffer
//! - [`record`]: recording files and command logs
//! - [`session`]: handshake, frame sync, ACK pacing and side channels

/// Re-export transport types.
pub mod transport {
    pub use dbgvis_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use dbgvis_frame::*;
}

/// Re-export primitive types.
pub mod primitive {
    pub use dbgvis_primitive::*;
}

/// Re-export recording types.
pub mod record {
    pub use dbgvis_record::*;
}

/// Re-export session types.
pub mod session {
    pub use dbgvis_session::*;
}
