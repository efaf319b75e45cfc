//! Recording files for debug primitive streams.
//!
//! A recording is written frame by frame without holding a frame in memory
//! and is indexed on open by scanning frame headers, so any frame can be
//! decoded directly. Files written on a host of the other byte order play
//! back with every field converted.
//!
//! The remote-command stream has its own plain-text log ([`CommandLog`],
//! [`CommandPlayback`]).

pub mod commands;
pub mod error;
pub mod format;
pub mod reader;
pub mod writer;

pub use commands::{CommandLog, CommandPlayback};
pub use error::{RecordError, Result};
pub use format::{FrameIndexEntry, FORMAT_VERSION, MAGIC};
pub use reader::RecordingReader;
pub use writer::RecordingWriter;
