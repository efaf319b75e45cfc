//! Debug primitives and the retained buffer.
//!
//! A debug primitive is a self-describing record (`command | length |
//! payload`) that a renderer may or may not understand; the declared length
//! always lets a decoder step over it. Primitives travel in frames,
//! partitioned by [`DisplayType`] so a consumer can flush each partition as
//! one batch.
//!
//! The [`RetainedBuffer`] keeps whatever is still alive between frames so a
//! consumer that attaches late sees the current scene, not just the deltas.

pub mod command;
pub mod error;
pub mod primitive;
pub mod renderer;
pub mod retained;

pub use command::Command;
pub use dbgvis_frame::Endian;
pub use error::{PrimitiveError, Result};
pub use primitive::{
    decode_primitives, encode_primitives, DebugPrimitive, DisplayBatch, DisplayType, Frame,
    RECORD_HEADER_SIZE,
};
pub use renderer::{deliver_frame, CollectingRenderer, NullRenderer, Renderer};
pub use retained::{ResetScope, RetainedBuffer, RetainedRecord};
