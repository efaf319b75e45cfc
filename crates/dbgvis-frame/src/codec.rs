use bytes::{Buf, BufMut, Bytes, BytesMut};
use crc::{Crc, CRC_32_ISCSI};

use crate::endian::Endian;
use crate::error::{FrameError, Result};

/// Envelope header: tag (8) + length (4) + hash (4) = 16 bytes.
pub const HEADER_SIZE: usize = 16;

/// Length of the tag that opens every envelope.
pub const TAG_LEN: usize = 8;

/// Tag body shared by both byte orders; the first byte selects the order.
pub const TAG_BODY: [u8; 7] = *b"PACKET\0";

/// First tag byte of a big-endian sender.
pub const BIG_ENDIAN_MARK: u8 = b'B';

/// First tag byte of a little-endian sender.
pub const LITTLE_ENDIAN_MARK: u8 = b'C';

/// Default maximum payload size: 64 MiB.
pub const DEFAULT_MAX_PAYLOAD: usize = 64 * 1024 * 1024;

const HEADER_CRC: Crc<u32> = Crc::<u32>::new(&CRC_32_ISCSI);

/// One complete message as it came off the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    /// Byte order the sender used for the header and, by convention, the payload.
    pub endian: Endian,
    /// The message payload.
    pub payload: Bytes,
}

impl Envelope {
    /// Create an envelope for an outgoing payload.
    pub fn new(endian: Endian, payload: impl Into<Bytes>) -> Self {
        Self {
            endian,
            payload: payload.into(),
        }
    }

    /// The total wire size of this envelope (header + payload).
    pub fn wire_size(&self) -> usize {
        HEADER_SIZE + self.payload.len()
    }
}

/// Result of one decode attempt.
#[derive(Debug, Default)]
pub struct Decoded {
    /// The next complete envelope, if the buffer held one.
    pub envelope: Option<Envelope>,
    /// Bytes discarded while searching for a valid header.
    pub skipped: usize,
}

/// Encode a payload into the wire format.
///
/// Wire format:
/// ```text
/// ┌──────────────────┬────────────┬────────────┬─────────────────┐
/// │ Tag (8B)         │ Length     │ Hash       │ Payload         │
/// │ 'B'|'C' PACKET\0 │ (4B order) │ (4B order) │ (Length bytes)  │
/// └──────────────────┴────────────┴────────────┴─────────────────┘
/// ```
/// "order" is the sender's byte order announced by the first tag byte. The
/// hash is CRC-32C over the tag and length bytes exactly as written.
pub fn encode_envelope(payload: &[u8], endian: Endian, dst: &mut BytesMut) -> Result<()> {
    if payload.len() > u32::MAX as usize {
        return Err(FrameError::PayloadTooLarge {
            size: payload.len(),
            max: u32::MAX as usize,
        });
    }
    dst.reserve(HEADER_SIZE + payload.len());
    let start = dst.len();
    dst.put_u8(match endian {
        Endian::Big => BIG_ENDIAN_MARK,
        Endian::Little => LITTLE_ENDIAN_MARK,
    });
    dst.put_slice(&TAG_BODY);
    endian.put_u32(dst, payload.len() as u32);
    let hash = HEADER_CRC.checksum(&dst[start..start + TAG_LEN + 4]);
    endian.put_u32(dst, hash);
    dst.put_slice(payload);
    Ok(())
}

/// Decode the next envelope from a reassembly buffer.
///
/// Bytes that cannot start a valid header are discarded one at a time, so a
/// stream that lost alignment (garbage, a truncated message from an earlier
/// session) realigns on the next intact header. Returns no envelope when the
/// buffer ends before a complete message; the partial bytes stay buffered.
pub fn decode_envelope(src: &mut BytesMut, max_payload: usize) -> Decoded {
    let mut skipped = 0usize;
    loop {
        match check_header(src, max_payload) {
            HeaderCheck::Incomplete => {
                return Decoded {
                    envelope: None,
                    skipped,
                }
            }
            HeaderCheck::Invalid => {
                src.advance(1);
                skipped += 1;
            }
            HeaderCheck::Valid { endian, len } => {
                if src.len() < HEADER_SIZE + len {
                    return Decoded {
                        envelope: None,
                        skipped,
                    };
                }
                src.advance(HEADER_SIZE);
                let payload = src.split_to(len).freeze();
                return Decoded {
                    envelope: Some(Envelope { endian, payload }),
                    skipped,
                };
            }
        }
    }
}

enum HeaderCheck {
    Incomplete,
    Invalid,
    Valid { endian: Endian, len: usize },
}

fn check_header(src: &[u8], max_payload: usize) -> HeaderCheck {
    let Some(&mark) = src.first() else {
        return HeaderCheck::Incomplete;
    };
    let endian = match mark {
        BIG_ENDIAN_MARK => Endian::Big,
        LITTLE_ENDIAN_MARK => Endian::Little,
        _ => return HeaderCheck::Invalid,
    };

    // Reject a wrong tag as soon as the differing byte is visible.
    let visible = src.len().min(TAG_LEN);
    if src[1..visible] != TAG_BODY[..visible - 1] {
        return HeaderCheck::Invalid;
    }
    if src.len() < HEADER_SIZE {
        return HeaderCheck::Incomplete;
    }

    let len = endian.u32_from([src[8], src[9], src[10], src[11]]) as usize;
    let hash = endian.u32_from([src[12], src[13], src[14], src[15]]);
    if HEADER_CRC.checksum(&src[..TAG_LEN + 4]) != hash || len > max_payload {
        return HeaderCheck::Invalid;
    }
    HeaderCheck::Valid { endian, len }
}

/// Configuration for the envelope codec.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Maximum payload size in bytes. Default: 64 MiB.
    pub max_payload_size: usize,
    /// Byte order used for outgoing envelopes. Default: the host's.
    pub endian: Endian,
    /// Read timeout for blocking operations.
    pub read_timeout: Option<std::time::Duration>,
    /// Write timeout for blocking operations.
    pub write_timeout: Option<std::time::Duration>,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_payload_size: DEFAULT_MAX_PAYLOAD,
            endian: Endian::NATIVE,
            read_timeout: None,
            write_timeout: None,
        }
    }
}
