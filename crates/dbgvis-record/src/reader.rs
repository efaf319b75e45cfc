use std::fs::File;
use std::io::{BufReader, ErrorKind, Read, Seek, SeekFrom};
use std::path::Path;

use dbgvis_frame::Endian;
use dbgvis_primitive::{decode_primitives, DisplayType, Frame};
use tracing::{debug, info, warn};

use crate::error::{RecordError, Result};
use crate::format::{
    decode_file_header, FrameIndexEntry, BATCH_HEADER_SIZE, FILE_HEADER_SIZE, FRAME_HEADER_SIZE,
    UNFINISHED_FRAME,
};

/// Random-access playback of a recording.
///
/// Opening scans the frame headers once to build an index; primitive data is
/// only read when a frame is requested.
#[derive(Debug)]
pub struct RecordingReader<R: Read + Seek> {
    inner: R,
    endian: Endian,
    index: Vec<FrameIndexEntry>,
    cursor: usize,
}

impl RecordingReader<BufReader<File>> {
    /// Open and index the recording at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let reader = Self::from_reader(BufReader::new(File::open(path)?))?;
        info!(
            path = %path.display(),
            frames = reader.frame_count(),
            endian = ?reader.endian,
            "opened recording"
        );
        Ok(reader)
    }
}

impl<R: Read + Seek> RecordingReader<R> {
    /// Validate the header of `inner` and index its frames.
    pub fn from_reader(mut inner: R) -> Result<Self> {
        inner.seek(SeekFrom::Start(0))?;
        let mut header = [0u8; FILE_HEADER_SIZE];
        inner.read_exact(&mut header).map_err(|err| match err.kind() {
            ErrorKind::UnexpectedEof => RecordError::BadHeader("file shorter than header".into()),
            _ => RecordError::Io(err),
        })?;
        let endian = decode_file_header(&header)?;
        let index = scan_frames(&mut inner, endian)?;

        Ok(Self {
            inner,
            endian,
            index,
            cursor: 0,
        })
    }

    /// Number of complete frames in the recording.
    pub fn frame_count(&self) -> usize {
        self.index.len()
    }

    /// Byte order the recording was written in.
    pub fn endian(&self) -> Endian {
        self.endian
    }

    pub fn index(&self) -> &[FrameIndexEntry] {
        &self.index
    }

    /// Frame that [`RecordingReader::next_frame`] returns next.
    pub fn position(&self) -> usize {
        self.cursor
    }

    /// Seek to frame `n` and decode it, in host byte order.
    ///
    /// Sequential playback continues from `n + 1`. A frame that fails to
    /// decode is returned as an error and nothing of it is kept.
    pub fn set_frame(&mut self, n: usize) -> Result<Frame> {
        let entry = *self.index.get(n).ok_or(RecordError::FrameOutOfRange {
            index: n,
            count: self.index.len(),
        })?;

        self.inner
            .seek(SeekFrom::Start(entry.offset + FRAME_HEADER_SIZE as u64))?;
        let mut body = Vec::with_capacity(entry.item_length as usize);
        (&mut self.inner)
            .take(u64::from(entry.item_length))
            .read_to_end(&mut body)?;
        if body.len() < entry.item_length as usize {
            return Err(RecordError::Truncated {
                frame: n,
                needed: u64::from(entry.item_length),
                available: body.len() as u64,
            });
        }

        let frame = decode_frame(n, &body, entry.item_count, self.endian)?;
        self.cursor = n + 1;
        Ok(frame)
    }

    /// Decode the frame after the last one read, or `None` at the end.
    pub fn next_frame(&mut self) -> Result<Option<Frame>> {
        if self.cursor >= self.index.len() {
            return Ok(None);
        }
        self.set_frame(self.cursor).map(Some)
    }

    /// Restart sequential playback from the first frame.
    pub fn rewind(&mut self) {
        self.cursor = 0;
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

/// Walk frame headers from just after the file header to the end.
///
/// Stops at the first frame that is unfinished or runs past the end of the
/// file; everything before it is indexed.
fn scan_frames<R: Read + Seek>(inner: &mut R, endian: Endian) -> Result<Vec<FrameIndexEntry>> {
    let len = inner.seek(SeekFrom::End(0))?;
    let mut index = Vec::new();
    let mut offset = FILE_HEADER_SIZE as u64;

    while offset < len {
        if len - offset < FRAME_HEADER_SIZE as u64 {
            warn!(offset, trailing = len - offset, "ignoring truncated frame header");
            break;
        }
        inner.seek(SeekFrom::Start(offset))?;
        let mut header = [0u8; FRAME_HEADER_SIZE];
        inner.read_exact(&mut header)?;

        let entry = FrameIndexEntry {
            offset,
            item_count: endian.u32_from([header[0], header[1], header[2], header[3]]),
            item_length: endian.u32_from([header[4], header[5], header[6], header[7]]),
        };
        if entry.item_count == UNFINISHED_FRAME {
            warn!(frame = index.len(), offset, "ignoring unfinished frame");
            break;
        }
        if entry.end() > len {
            warn!(
                frame = index.len(),
                offset,
                declared = entry.item_length,
                available = len - offset - FRAME_HEADER_SIZE as u64,
                "ignoring truncated frame"
            );
            break;
        }
        index.push(entry);
        offset = entry.end();
    }

    debug!(frames = index.len(), bytes = len, "indexed recording");
    Ok(index)
}

fn decode_frame(n: usize, body: &[u8], item_count: u32, endian: Endian) -> Result<Frame> {
    let mut frame = Frame::new(n as u32);
    let mut offset = 0usize;

    for batch in 0..item_count {
        let header = body
            .get(offset..offset + BATCH_HEADER_SIZE)
            .ok_or_else(|| RecordError::Corrupt {
                frame: n,
                reason: format!("batch {batch} header runs past the frame"),
            })?;
        let display = DisplayType::from_u32(endian.u32_from([header[0], header[1], header[2], header[3]]))?;
        let count = endian.u32_from([header[4], header[5], header[6], header[7]]) as usize;
        let byte_length = endian.u32_from([header[8], header[9], header[10], header[11]]) as usize;
        offset += BATCH_HEADER_SIZE;

        let records = body
            .get(offset..offset.saturating_add(byte_length))
            .ok_or_else(|| RecordError::Corrupt {
                frame: n,
                reason: format!("batch {batch} declares {byte_length} bytes past the frame"),
            })?;
        frame.push(display, decode_primitives(records, count, endian)?);
        offset += byte_length;
    }

    if offset != body.len() {
        return Err(RecordError::Corrupt {
            frame: n,
            reason: format!("{} bytes after the last batch", body.len() - offset),
        });
    }
    Ok(frame)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use dbgvis_primitive::{Command, DebugPrimitive};

    use super::*;
    use crate::writer::RecordingWriter;

    fn frame_primitives(i: u32) -> Vec<(DisplayType, Vec<DebugPrimitive>)> {
        vec![
            (
                DisplayType::WorldZ,
                vec![
                    DebugPrimitive::from_words(Command::SET_COLOR, &[i]),
                    DebugPrimitive::from_floats(Command::LINE, &[i as f32, 0.0, 0.0, 1.0, 1.0, 1.0]),
                ],
            ),
            (
                DisplayType::Screen,
                vec![DebugPrimitive::with_text(Command::TEXT, &[i], &format!("frame {i}"))],
            ),
        ]
    }

    fn record(endian: Endian, frames: u32) -> Vec<u8> {
        let mut writer = RecordingWriter::new(Cursor::new(Vec::new()), endian).unwrap();
        for i in 0..frames {
            for (display, primitives) in frame_primitives(i) {
                writer.write_batch(display, &primitives).unwrap();
            }
            writer.finalize_frame().unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    fn expected(i: u32) -> Frame {
        let mut frame = Frame::new(i);
        for (display, primitives) in frame_primitives(i) {
            frame.push(display, primitives);
        }
        frame
    }

    #[test]
    fn record_playback_roundtrip() {
        let bytes = record(Endian::NATIVE, 12);
        let mut reader = RecordingReader::from_reader(Cursor::new(bytes)).unwrap();
        assert_eq!(reader.frame_count(), 12);
        for i in (0..12).rev() {
            assert_eq!(reader.set_frame(i as usize).unwrap(), expected(i));
        }
    }

    #[test]
    fn foreign_recording_decodes_to_host_values() {
        let bytes = record(Endian::NATIVE.opposite(), 3);
        let mut reader = RecordingReader::from_reader(Cursor::new(bytes)).unwrap();
        assert_eq!(reader.endian(), Endian::NATIVE.opposite());
        let frame = reader.set_frame(2).unwrap();
        assert_eq!(frame, expected(2));
        let text = &frame.batch(DisplayType::Screen).unwrap().primitives[0];
        assert_eq!(text.text(), Some("frame 2"));
    }

    #[test]
    fn sequential_playback_follows_seek() {
        let bytes = record(Endian::NATIVE, 5);
        let mut reader = RecordingReader::from_reader(Cursor::new(bytes)).unwrap();
        assert_eq!(reader.next_frame().unwrap().unwrap().counter, 0);
        reader.set_frame(3).unwrap();
        assert_eq!(reader.next_frame().unwrap().unwrap().counter, 4);
        assert!(reader.next_frame().unwrap().is_none());
        reader.rewind();
        assert_eq!(reader.position(), 0);
    }

    #[test]
    fn out_of_range_seek() {
        let bytes = record(Endian::NATIVE, 2);
        let mut reader = RecordingReader::from_reader(Cursor::new(bytes)).unwrap();
        assert!(matches!(
            reader.set_frame(2),
            Err(RecordError::FrameOutOfRange { index: 2, count: 2 })
        ));
    }

    #[test]
    fn truncated_trailing_frame_is_not_indexed() {
        let mut bytes = record(Endian::NATIVE, 4);
        bytes.truncate(bytes.len() - 3);
        let mut reader = RecordingReader::from_reader(Cursor::new(bytes)).unwrap();
        assert_eq!(reader.frame_count(), 3);
        assert_eq!(reader.set_frame(2).unwrap(), expected(2));
    }

    #[test]
    fn unfinished_frame_is_not_indexed() {
        let mut writer = RecordingWriter::new(Cursor::new(Vec::new()), Endian::NATIVE).unwrap();
        for (display, primitives) in frame_primitives(0) {
            writer.write_batch(display, &primitives).unwrap();
        }
        writer.finalize_frame().unwrap();
        for (display, primitives) in frame_primitives(1) {
            writer.write_batch(display, &primitives).unwrap();
        }
        let bytes = writer.finish().unwrap().into_inner();

        let reader = RecordingReader::from_reader(Cursor::new(bytes)).unwrap();
        assert_eq!(reader.frame_count(), 1);
    }

    #[test]
    fn empty_frames_are_indexed() {
        let mut writer = RecordingWriter::new(Cursor::new(Vec::new()), Endian::NATIVE).unwrap();
        writer.finalize_frame().unwrap();
        writer.finalize_frame().unwrap();
        let bytes = writer.finish().unwrap().into_inner();

        let mut reader = RecordingReader::from_reader(Cursor::new(bytes)).unwrap();
        assert_eq!(reader.frame_count(), 2);
        assert!(reader.set_frame(1).unwrap().is_empty());
    }

    #[test]
    fn bad_header_is_rejected() {
        let err = RecordingReader::from_reader(Cursor::new(b"NOPE\x01\0\0\0\0\0\0\0".to_vec())).unwrap_err();
        assert!(matches!(err, RecordError::BadHeader(_)));

        let err = RecordingReader::from_reader(Cursor::new(b"DBG".to_vec())).unwrap_err();
        assert!(matches!(err, RecordError::BadHeader(_)));
    }

    #[test]
    fn corrupt_batch_header_fails_that_frame_only() {
        let mut bytes = record(Endian::Little, 2);
        // Display tag of the first batch of frame 0.
        let at = FILE_HEADER_SIZE + FRAME_HEADER_SIZE;
        bytes[at..at + 4].copy_from_slice(&9u32.to_le_bytes());

        let mut reader = RecordingReader::from_reader(Cursor::new(bytes)).unwrap();
        assert!(matches!(reader.set_frame(0), Err(RecordError::Primitive(_))));
        assert_eq!(reader.set_frame(1).unwrap(), expected(1));
    }

    #[test]
    fn open_file_on_disk() {
        let path = temp_path("disk");
        let mut writer = RecordingWriter::create(&path).unwrap();
        for (display, primitives) in frame_primitives(7) {
            writer.write_batch(display, &primitives).unwrap();
        }
        writer.finalize_frame().unwrap();
        writer.finish().unwrap();

        let mut reader = RecordingReader::open(&path).unwrap();
        let mut frame = reader.set_frame(0).unwrap();
        frame.counter = 7;
        assert_eq!(frame, expected(7));
        let _ = std::fs::remove_file(&path);
    }

    fn temp_path(tag: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!(
            "dbgvis-record-{tag}-{}-{}.dbgr",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap()
                .as_nanos()
        ))
    }
}
