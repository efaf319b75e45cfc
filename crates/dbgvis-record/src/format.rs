//! On-disk layout of a recording.
//!
//! ```text
//! file    = magic[4] "DBGR" | version u32 | big_endian u32 | frame*
//! frame   = item_count u32 | item_length u32 | batch{item_count}
//! batch   = display u32 | primitive_count u32 | byte_length u32 | records[byte_length]
//! ```
//!
//! Every integer is in the writer's byte order, announced by the flag word.
//! `item_length` is the byte size of the frame body that follows the frame
//! header. A frame whose `item_count` is still [`UNFINISHED_FRAME`] was never
//! finalized.

use dbgvis_frame::Endian;

use crate::error::{RecordError, Result};

pub const MAGIC: [u8; 4] = *b"DBGR";
pub const FORMAT_VERSION: u32 = 1;

pub const FILE_HEADER_SIZE: usize = 12;
pub const FRAME_HEADER_SIZE: usize = 8;
pub const BATCH_HEADER_SIZE: usize = 12;

/// Placeholder `item_count` written before a frame is finalized.
pub const UNFINISHED_FRAME: u32 = u32::MAX;

/// Encode the file header for a writer using `endian`.
pub fn encode_file_header(endian: Endian) -> [u8; FILE_HEADER_SIZE] {
    let mut header = [0u8; FILE_HEADER_SIZE];
    header[..4].copy_from_slice(&MAGIC);
    header[4..8].copy_from_slice(&endian.u32_to(FORMAT_VERSION));
    header[8..12].copy_from_slice(&endian.u32_to(u32::from(endian.is_big())));
    header
}

/// Validate a file header and return the byte order of the file.
pub fn decode_file_header(header: &[u8; FILE_HEADER_SIZE]) -> Result<Endian> {
    if header[..4] != MAGIC {
        return Err(RecordError::BadHeader(format!("bad magic {:02x?}", &header[..4])));
    }

    let flag = [header[8], header[9], header[10], header[11]];
    let endian = [Endian::Little, Endian::Big]
        .into_iter()
        .find(|endian| endian.u32_from(flag) == u32::from(endian.is_big()))
        .ok_or_else(|| RecordError::BadHeader(format!("endianness flag {flag:02x?}")))?;

    let version = endian.u32_from([header[4], header[5], header[6], header[7]]);
    if version != FORMAT_VERSION {
        return Err(RecordError::BadHeader(format!(
            "unsupported version {version} (expected {FORMAT_VERSION})"
        )));
    }
    Ok(endian)
}

/// Location and size of one recorded frame, found by scanning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameIndexEntry {
    /// Offset of the frame header from the start of the file.
    pub offset: u64,
    /// Number of display batches in the frame.
    pub item_count: u32,
    /// Byte length of the frame body.
    pub item_length: u32,
}

impl FrameIndexEntry {
    /// Offset of the first byte after this frame.
    pub fn end(&self) -> u64 {
        self.offset + FRAME_HEADER_SIZE as u64 + u64::from(self.item_length)
    }
}
