use std::fs::File;
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::Path;

use bytes::BytesMut;
use dbgvis_frame::Endian;
use dbgvis_primitive::{encode_primitives, DebugPrimitive, DisplayType};
use tracing::{debug, info};

use crate::error::{RecordError, Result};
use crate::format::{encode_file_header, BATCH_HEADER_SIZE, FRAME_HEADER_SIZE, UNFINISHED_FRAME};

/// The frame currently being written.
#[derive(Debug)]
struct OpenFrame {
    header_offset: u64,
    item_count: u32,
    item_length: u64,
}

/// Appends frames of primitives to a recording.
///
/// The first batch of a frame writes a placeholder frame header and
/// remembers where it is; [`RecordingWriter::finalize_frame`] seeks back,
/// patches in the real counts and returns to the end. A frame is never held
/// in memory as a whole.
#[derive(Debug)]
pub struct RecordingWriter<W: Write + Seek> {
    inner: W,
    endian: Endian,
    open: Option<OpenFrame>,
    frames_written: usize,
    scratch: BytesMut,
}

impl RecordingWriter<BufWriter<File>> {
    /// Create (or truncate) a recording at `path` in host byte order.
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        Self::create_with_endian(path, Endian::NATIVE)
    }

    /// Create a recording whose integers are written in `endian` order.
    pub fn create_with_endian(path: impl AsRef<Path>, endian: Endian) -> Result<Self> {
        let path = path.as_ref();
        let file = File::create(path)?;
        info!(path = %path.display(), ?endian, "recording primitive stream");
        Self::new(BufWriter::new(file), endian)
    }
}

impl<W: Write + Seek> RecordingWriter<W> {
    /// Write a file header to `inner` and start recording after it.
    pub fn new(mut inner: W, endian: Endian) -> Result<Self> {
        inner.write_all(&encode_file_header(endian))?;
        Ok(Self {
            inner,
            endian,
            open: None,
            frames_written: 0,
            scratch: BytesMut::new(),
        })
    }

    /// Append one display batch to the current frame, opening it if needed.
    ///
    /// An empty batch writes nothing.
    pub fn write_batch(&mut self, display: DisplayType, primitives: &[DebugPrimitive]) -> Result<()> {
        if primitives.is_empty() {
            return Ok(());
        }
        self.open_frame()?;

        self.scratch.clear();
        encode_primitives(primitives, self.endian, &mut self.scratch);
        let byte_length = u32::try_from(self.scratch.len()).map_err(|_| RecordError::FrameTooLarge {
            size: self.scratch.len() as u64,
        })?;

        let mut header = [0u8; BATCH_HEADER_SIZE];
        header[..4].copy_from_slice(&self.endian.u32_to(display.as_u32()));
        header[4..8].copy_from_slice(&self.endian.u32_to(primitives.len() as u32));
        header[8..].copy_from_slice(&self.endian.u32_to(byte_length));
        self.inner.write_all(&header)?;
        self.inner.write_all(&self.scratch)?;

        if let Some(open) = self.open.as_mut() {
            open.item_count += 1;
            open.item_length += (BATCH_HEADER_SIZE + self.scratch.len()) as u64;
        }
        Ok(())
    }

    /// Close the current frame by patching its header.
    ///
    /// A frame with no batches is still recorded, as an empty frame.
    pub fn finalize_frame(&mut self) -> Result<()> {
        self.open_frame()?;
        let Some(open) = self.open.take() else {
            return Ok(());
        };

        let item_length = u32::try_from(open.item_length).map_err(|_| RecordError::FrameTooLarge {
            size: open.item_length,
        })?;
        let mut header = [0u8; FRAME_HEADER_SIZE];
        header[..4].copy_from_slice(&self.endian.u32_to(open.item_count));
        header[4..].copy_from_slice(&self.endian.u32_to(item_length));

        self.inner.seek(SeekFrom::Start(open.header_offset))?;
        self.inner.write_all(&header)?;
        self.inner.seek(SeekFrom::End(0))?;

        debug!(
            frame = self.frames_written,
            batches = open.item_count,
            bytes = item_length,
            "finalized recorded frame"
        );
        self.frames_written += 1;
        Ok(())
    }

    /// Number of finalized frames.
    pub fn frames_written(&self) -> usize {
        self.frames_written
    }

    pub fn endian(&self) -> Endian {
        self.endian
    }

    /// Flush buffered bytes to the underlying writer.
    pub fn flush(&mut self) -> Result<()> {
        self.inner.flush()?;
        Ok(())
    }

    /// Flush and return the underlying writer.
    ///
    /// A frame that was opened but not finalized stays marked unfinished and
    /// is skipped on playback.
    pub fn finish(mut self) -> Result<W> {
        if self.open.is_some() {
            debug!("recording closed with an unfinished frame");
        }
        self.inner.flush()?;
        Ok(self.inner)
    }

    fn open_frame(&mut self) -> Result<()> {
        if self.open.is_some() {
            return Ok(());
        }
        let header_offset = self.inner.stream_position()?;
        let mut placeholder = [0u8; FRAME_HEADER_SIZE];
        placeholder[..4].copy_from_slice(&self.endian.u32_to(UNFINISHED_FRAME));
        self.inner.write_all(&placeholder)?;
        self.open = Some(OpenFrame {
            header_offset,
            item_count: 0,
            item_length: 0,
        });
        Ok(())
    }
}
