use bytes::{BufMut, Bytes, BytesMut};
use dbgvis_frame::endian::swap_words;
use dbgvis_frame::Endian;

use crate::command::Command;
use crate::error::{PrimitiveError, Result};

/// Record header: command (4) + payload length (4) = 8 bytes.
pub const RECORD_HEADER_SIZE: usize = 8;

/// Display partition of a primitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DisplayType {
    /// World space, depth tested.
    WorldZ = 0,
    /// World space, drawn on top.
    WorldNoZ = 1,
    /// Screen space overlay.
    Screen = 2,
}

impl DisplayType {
    /// Every partition, in flush order.
    pub const ALL: [DisplayType; 3] = [DisplayType::WorldZ, DisplayType::WorldNoZ, DisplayType::Screen];

    pub fn as_u32(self) -> u32 {
        self as u32
    }

    pub fn from_u32(tag: u32) -> Result<Self> {
        match tag {
            0 => Ok(DisplayType::WorldZ),
            1 => Ok(DisplayType::WorldNoZ),
            2 => Ok(DisplayType::Screen),
            other => Err(PrimitiveError::UnknownDisplayType(other)),
        }
    }

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            DisplayType::WorldZ => "world-z",
            DisplayType::WorldNoZ => "world-no-z",
            DisplayType::Screen => "screen",
        }
    }
}

/// One renderable record.
///
/// The payload is held in host byte order; conversion happens only when a
/// stream is encoded for, or decoded from, a peer or file in the other order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DebugPrimitive {
    command: Command,
    payload: Bytes,
}

impl DebugPrimitive {
    /// Wrap an already host-ordered payload.
    pub fn new(command: Command, payload: impl Into<Bytes>) -> Self {
        Self {
            command,
            payload: payload.into(),
        }
    }

    /// Build a primitive whose payload is a list of 32-bit words.
    pub fn from_words(command: Command, words: &[u32]) -> Self {
        let mut payload = BytesMut::with_capacity(words.len() * 4);
        for word in words {
            payload.put_slice(&word.to_ne_bytes());
        }
        Self::new(command, payload.freeze())
    }

    /// Build a primitive from float fields (positions, colors, sizes).
    pub fn from_floats(command: Command, values: &[f32]) -> Self {
        let words: Vec<u32> = values.iter().map(|v| v.to_bits()).collect();
        Self::from_words(command, &words)
    }

    /// Build a text-bearing primitive: `word_count | words | text`.
    pub fn with_text(command: Command, words: &[u32], text: &str) -> Self {
        let mut payload = BytesMut::with_capacity(4 + words.len() * 4 + text.len());
        payload.put_slice(&(words.len() as u32).to_ne_bytes());
        for word in words {
            payload.put_slice(&word.to_ne_bytes());
        }
        payload.put_slice(text.as_bytes());
        Self::new(command, payload.freeze())
    }

    /// Build a `BLOCK_INFO` marker. Block id 0 closes the current block.
    pub fn block_info(block_id: u32, visible: bool) -> Self {
        Self::from_words(Command::BLOCK_INFO, &[block_id, u32::from(visible)])
    }

    pub fn command(&self) -> Command {
        self.command
    }

    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// Size of this record in a primitive stream.
    pub fn wire_size(&self) -> usize {
        RECORD_HEADER_SIZE + self.payload.len()
    }

    /// The payload word at `index`, in host order.
    pub fn word(&self, index: usize) -> Option<u32> {
        let start = index.checked_mul(4)?;
        let bytes = self.payload.get(start..start + 4)?;
        Some(u32::from_ne_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// `(block_id, visible)` of a `BLOCK_INFO` record.
    pub fn block_fields(&self) -> Option<(u32, bool)> {
        if self.command != Command::BLOCK_INFO {
            return None;
        }
        Some((self.word(0)?, self.word(1)? != 0))
    }

    /// Trailing text of a text-bearing record, if it is valid UTF-8.
    pub fn text(&self) -> Option<&str> {
        if !self.command.carries_text() {
            return None;
        }
        let count = self.word(0)? as usize;
        let start = count.checked_add(1)?.checked_mul(4)?;
        std::str::from_utf8(self.payload.get(start..)?).ok()
    }
}

/// Primitives of one display partition within a frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayBatch {
    pub display: DisplayType,
    pub primitives: Vec<DebugPrimitive>,
}

/// An ordered frame of primitives, grouped by display partition.
///
/// Batches are kept in flush order and there is at most one per partition,
/// so primitives of one display type are always contiguous.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Frame {
    pub counter: u32,
    batches: Vec<DisplayBatch>,
}

impl Frame {
    pub fn new(counter: u32) -> Self {
        Self {
            counter,
            batches: Vec::new(),
        }
    }

    /// Append primitives to the batch of `display`.
    pub fn push(&mut self, display: DisplayType, primitives: impl IntoIterator<Item = DebugPrimitive>) {
        let index = match self.batches.binary_search_by_key(&display, |b| b.display) {
            Ok(index) => index,
            Err(index) => {
                self.batches.insert(
                    index,
                    DisplayBatch {
                        display,
                        primitives: Vec::new(),
                    },
                );
                index
            }
        };
        self.batches[index].primitives.extend(primitives);
    }

    pub fn batches(&self) -> &[DisplayBatch] {
        &self.batches
    }

    pub fn into_batches(self) -> Vec<DisplayBatch> {
        self.batches
    }

    pub fn batch(&self, display: DisplayType) -> Option<&DisplayBatch> {
        self.batches.iter().find(|b| b.display == display)
    }

    pub fn primitive_count(&self) -> usize {
        self.batches.iter().map(|b| b.primitives.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.primitive_count() == 0
    }

    pub fn clear(&mut self) {
        self.batches.clear();
    }
}

/// Append `primitives` to `dst` as records in `endian` byte order.
pub fn encode_primitives(primitives: &[DebugPrimitive], endian: Endian, dst: &mut BytesMut) {
    let total: usize = primitives.iter().map(DebugPrimitive::wire_size).sum();
    dst.reserve(total);
    for primitive in primitives {
        endian.put_u32(dst, primitive.command.0);
        endian.put_u32(dst, primitive.payload.len() as u32);
        let start = dst.len();
        dst.put_slice(&primitive.payload);
        if endian.is_foreign() {
            swap_payload(primitive.command, &mut dst[start..], Endian::NATIVE);
        }
    }
}

/// Decode exactly `count` records written in `endian` byte order.
///
/// The returned primitives are in host order. Every record is length-checked
/// before it is read, and unknown commands are kept as-is.
pub fn decode_primitives(src: &[u8], count: usize, endian: Endian) -> Result<Vec<DebugPrimitive>> {
    let mut primitives = Vec::with_capacity(count.min(src.len() / RECORD_HEADER_SIZE));
    let mut offset = 0usize;

    for _ in 0..count {
        let header = src
            .get(offset..offset + RECORD_HEADER_SIZE)
            .ok_or(PrimitiveError::Truncated {
                needed: offset + RECORD_HEADER_SIZE,
                available: src.len(),
            })?;
        let command = Command(endian.u32_from([header[0], header[1], header[2], header[3]]));
        let len = endian.u32_from([header[4], header[5], header[6], header[7]]) as usize;
        offset += RECORD_HEADER_SIZE;

        let body = src
            .get(offset..offset.saturating_add(len))
            .ok_or(PrimitiveError::Truncated {
                needed: offset.saturating_add(len),
                available: src.len(),
            })?;
        offset += len;

        let payload = if endian.is_foreign() {
            let mut owned = body.to_vec();
            swap_payload(command, &mut owned, endian);
            Bytes::from(owned)
        } else {
            Bytes::copy_from_slice(body)
        };
        primitives.push(DebugPrimitive { command, payload });
    }

    if offset != src.len() {
        return Err(PrimitiveError::TrailingBytes(src.len() - offset));
    }
    Ok(primitives)
}

/// Swap the multi-byte fields of one payload between the two byte orders.
///
/// `current` is the order the payload is in before the swap; it is needed to
/// read the word count of text-bearing records.
fn swap_payload(command: Command, payload: &mut [u8], current: Endian) {
    if !command.carries_text() {
        swap_words(payload);
        return;
    }
    if payload.len() < 4 {
        return;
    }
    let count = current.u32_from([payload[0], payload[1], payload[2], payload[3]]) as usize;
    let word_bytes = count
        .saturating_add(1)
        .saturating_mul(4)
        .min(payload.len() / 4 * 4);
    swap_words(&mut payload[..word_bytes]);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<DebugPrimitive> {
        vec![
            DebugPrimitive::from_words(Command::SET_COLOR, &[0xFF00_00FF]),
            DebugPrimitive::from_floats(Command::LINE, &[0.0, 1.0, 2.0, 3.0, 4.0, 5.0]),
            DebugPrimitive::with_text(Command::TEXT, &[7, 8], "héllo"),
            DebugPrimitive::new(Command(4242), Bytes::from_static(b"opaque")),
        ]
    }

    #[test]
    fn native_stream_roundtrip() {
        let mut buf = BytesMut::new();
        encode_primitives(&sample(), Endian::NATIVE, &mut buf);
        let decoded = decode_primitives(&buf, 4, Endian::NATIVE).unwrap();
        assert_eq!(decoded, sample());
    }

    #[test]
    fn foreign_stream_decodes_to_same_values() {
        let foreign = Endian::NATIVE.opposite();
        let mut buf = BytesMut::new();
        encode_primitives(&sample(), foreign, &mut buf);

        // First record header is visibly in the other order.
        assert_eq!(foreign.u32_from([buf[4], buf[5], buf[6], buf[7]]), 4);

        let decoded = decode_primitives(&buf, 4, foreign).unwrap();
        assert_eq!(decoded, sample());
        assert_eq!(decoded[0].word(0), Some(0xFF00_00FF));
        assert_eq!(decoded[2].text(), Some("héllo"));
        assert_eq!(decoded[2].word(1), Some(7));
    }

    #[test]
    fn foreign_text_bytes_are_not_swapped() {
        let primitive = DebugPrimitive::with_text(Command::MESSAGE, &[], "abcd");
        let mut buf = BytesMut::new();
        encode_primitives(&[primitive], Endian::NATIVE.opposite(), &mut buf);
        assert_eq!(&buf[buf.len() - 4..], b"abcd");
    }

    #[test]
    fn truncated_record_is_rejected() {
        let mut buf = BytesMut::new();
        encode_primitives(&sample(), Endian::NATIVE, &mut buf);
        let err = decode_primitives(&buf[..buf.len() - 1], 4, Endian::NATIVE).unwrap_err();
        assert!(matches!(err, PrimitiveError::Truncated { .. }));
    }

    #[test]
    fn trailing_bytes_are_rejected() {
        let mut buf = BytesMut::new();
        encode_primitives(&sample(), Endian::NATIVE, &mut buf);
        let err = decode_primitives(&buf, 3, Endian::NATIVE).unwrap_err();
        assert!(matches!(err, PrimitiveError::TrailingBytes(_)));
    }

    #[test]
    fn block_fields_roundtrip() {
        let marker = DebugPrimitive::block_info(12, true);
        assert_eq!(marker.block_fields(), Some((12, true)));
        assert_eq!(DebugPrimitive::block_info(3, false).block_fields(), Some((3, false)));
        assert_eq!(sample()[1].block_fields(), None);
    }

    #[test]
    fn frame_keeps_display_types_contiguous() {
        let mut frame = Frame::new(9);
        let line = DebugPrimitive::from_floats(Command::LINE, &[0.0; 6]);
        frame.push(DisplayType::Screen, [line.clone()]);
        frame.push(DisplayType::WorldZ, [line.clone()]);
        frame.push(DisplayType::Screen, [line.clone(), line]);

        let order: Vec<DisplayType> = frame.batches().iter().map(|b| b.display).collect();
        assert_eq!(order, vec![DisplayType::WorldZ, DisplayType::Screen]);
        assert_eq!(frame.batch(DisplayType::Screen).unwrap().primitives.len(), 3);
        assert_eq!(frame.primitive_count(), 4);
    }

    #[test]
    fn display_type_tags() {
        for display in DisplayType::ALL {
            assert_eq!(DisplayType::from_u32(display.as_u32()).unwrap(), display);
        }
        assert_eq!(
            DisplayType::from_u32(3),
            Err(PrimitiveError::UnknownDisplayType(3))
        );
    }
}
