//! Session packets.
//!
//! Every packet is one envelope payload: `type u32 | body`. Integers are in
//! the sender's byte order, which the envelope carries; strings are
//! `len u32 | utf8`.
//!
//! | type | body |
//! |---|---|
//! | `PRIMITIVES` | `frame | display | count | byte_length | records` |
//! | `COMMAND` | `text` |
//! | `ACK` | `frame` |
//! | `VERSION` | `version` |
//! | `APP_NAME` | `name` |
//! | `FINALIZE_FRAME` | `frame` |
//! | `REQUEST_RESOURCE` | `namespace | name` |
//! | `RESOURCE` | `namespace | name | len | data` |
//! | `INPUT_EVENT` | `kind | id | pressed | x | y` |

use bytes::{BufMut, Bytes, BytesMut};
use dbgvis_frame::Endian;
use dbgvis_primitive::{decode_primitives, encode_primitives, DebugPrimitive, DisplayType};

use crate::error::{Result, SessionError};
use crate::input::{InputEvent, InputKind};

/// Version exchanged in the handshake; peers must match exactly.
pub const PROTOCOL_VERSION: u32 = 1;

pub const PRIMITIVES: u32 = 0;
pub const COMMAND: u32 = 1;
pub const ACK: u32 = 2;
pub const VERSION: u32 = 3;
pub const APP_NAME: u32 = 4;
pub const FINALIZE_FRAME: u32 = 5;
pub const REQUEST_RESOURCE: u32 = 6;
pub const RESOURCE: u32 = 7;
pub const INPUT_EVENT: u32 = 8;

/// One decoded session packet.
#[derive(Debug, Clone, PartialEq)]
pub enum Packet {
    Primitives {
        frame: u32,
        display: DisplayType,
        primitives: Vec<DebugPrimitive>,
    },
    Command(String),
    Ack {
        frame: u32,
    },
    Version(u32),
    AppName(String),
    FinalizeFrame {
        frame: u32,
    },
    RequestResource {
        namespace: String,
        name: String,
    },
    Resource {
        namespace: String,
        name: String,
        data: Bytes,
    },
    InputEvent(InputEvent),
}

impl Packet {
    pub fn type_tag(&self) -> u32 {
        match self {
            Packet::Primitives { .. } => PRIMITIVES,
            Packet::Command(_) => COMMAND,
            Packet::Ack { .. } => ACK,
            Packet::Version(_) => VERSION,
            Packet::AppName(_) => APP_NAME,
            Packet::FinalizeFrame { .. } => FINALIZE_FRAME,
            Packet::RequestResource { .. } => REQUEST_RESOURCE,
            Packet::Resource { .. } => RESOURCE,
            Packet::InputEvent(_) => INPUT_EVENT,
        }
    }

    pub fn name(&self) -> &'static str {
        type_name(self.type_tag())
    }

    /// Serialize in `endian` byte order.
    pub fn encode(&self, endian: Endian) -> Bytes {
        let mut dst = BytesMut::new();
        endian.put_u32(&mut dst, self.type_tag());
        match self {
            Packet::Primitives {
                frame,
                display,
                primitives,
            } => put_primitives(&mut dst, endian, *frame, *display, primitives),
            Packet::Command(text) | Packet::AppName(text) => put_string(&mut dst, endian, text),
            Packet::Ack { frame } | Packet::FinalizeFrame { frame } => endian.put_u32(&mut dst, *frame),
            Packet::Version(version) => endian.put_u32(&mut dst, *version),
            Packet::RequestResource { namespace, name } => {
                put_string(&mut dst, endian, namespace);
                put_string(&mut dst, endian, name);
            }
            Packet::Resource {
                namespace,
                name,
                data,
            } => {
                put_string(&mut dst, endian, namespace);
                put_string(&mut dst, endian, name);
                endian.put_u32(&mut dst, data.len() as u32);
                dst.put_slice(data);
            }
            Packet::InputEvent(event) => {
                endian.put_u32(&mut dst, event.kind as u32);
                endian.put_u32(&mut dst, event.id);
                endian.put_u32(&mut dst, u32::from(event.pressed));
                endian.put_u32(&mut dst, event.x.to_bits());
                endian.put_u32(&mut dst, event.y.to_bits());
            }
        }
        dst.freeze()
    }

    /// Parse a payload sent in `endian` byte order.
    ///
    /// Every length is checked against what is present, and trailing bytes
    /// are an error.
    pub fn decode(src: &[u8], endian: Endian) -> Result<Packet> {
        let mut body = Body::new(src, endian, "packet");
        let tag = body.u32()?;
        body.packet = type_name(tag);

        let packet = match tag {
            PRIMITIVES => {
                let frame = body.u32()?;
                let display = DisplayType::from_u32(body.u32()?)?;
                let count = body.u32()? as usize;
                let len = body.u32()? as usize;
                let records = body.bytes(len)?;
                Packet::Primitives {
                    frame,
                    display,
                    primitives: decode_primitives(records, count, endian)?,
                }
            }
            COMMAND => Packet::Command(body.string()?),
            ACK => Packet::Ack { frame: body.u32()? },
            VERSION => Packet::Version(body.u32()?),
            APP_NAME => Packet::AppName(body.string()?),
            FINALIZE_FRAME => Packet::FinalizeFrame { frame: body.u32()? },
            REQUEST_RESOURCE => Packet::RequestResource {
                namespace: body.string()?,
                name: body.string()?,
            },
            RESOURCE => {
                let namespace = body.string()?;
                let name = body.string()?;
                let len = body.u32()? as usize;
                Packet::Resource {
                    namespace,
                    name,
                    data: Bytes::copy_from_slice(body.bytes(len)?),
                }
            }
            INPUT_EVENT => {
                let kind_tag = body.u32()?;
                let kind = InputKind::from_u32(kind_tag)
                    .ok_or_else(|| body.malformed(format!("unknown input kind {kind_tag}")))?;
                Packet::InputEvent(InputEvent {
                    kind,
                    id: body.u32()?,
                    pressed: body.u32()? != 0,
                    x: f32::from_bits(body.u32()?),
                    y: f32::from_bits(body.u32()?),
                })
            }
            other => return Err(SessionError::UnknownPacket(other)),
        };
        body.finish()?;
        Ok(packet)
    }
}

fn type_name(tag: u32) -> &'static str {
    match tag {
        PRIMITIVES => "PRIMITIVES",
        COMMAND => "COMMAND",
        ACK => "ACK",
        VERSION => "VERSION",
        APP_NAME => "APP_NAME",
        FINALIZE_FRAME => "FINALIZE_FRAME",
        REQUEST_RESOURCE => "REQUEST_RESOURCE",
        RESOURCE => "RESOURCE",
        INPUT_EVENT => "INPUT_EVENT",
        _ => "UNKNOWN",
    }
}

/// Encode a `PRIMITIVES` packet without building a [`Packet`] first.
pub fn encode_primitives_packet(
    frame: u32,
    display: DisplayType,
    primitives: &[DebugPrimitive],
    endian: Endian,
) -> Bytes {
    let mut dst = BytesMut::new();
    endian.put_u32(&mut dst, PRIMITIVES);
    put_primitives(&mut dst, endian, frame, display, primitives);
    dst.freeze()
}

fn put_primitives(
    dst: &mut BytesMut,
    endian: Endian,
    frame: u32,
    display: DisplayType,
    primitives: &[DebugPrimitive],
) {
    endian.put_u32(dst, frame);
    endian.put_u32(dst, display.as_u32());
    endian.put_u32(dst, primitives.len() as u32);
    let mut records = BytesMut::new();
    encode_primitives(primitives, endian, &mut records);
    endian.put_u32(dst, records.len() as u32);
    dst.put_slice(&records);
}

fn put_string(dst: &mut BytesMut, endian: Endian, text: &str) {
    endian.put_u32(dst, text.len() as u32);
    dst.put_slice(text.as_bytes());
}

/// Bounds-checked cursor over a packet body.
struct Body<'a> {
    src: &'a [u8],
    offset: usize,
    endian: Endian,
    packet: &'static str,
}

impl<'a> Body<'a> {
    fn new(src: &'a [u8], endian: Endian, packet: &'static str) -> Self {
        Self {
            src,
            offset: 0,
            endian,
            packet,
        }
    }

    fn malformed(&self, reason: String) -> SessionError {
        SessionError::Malformed {
            packet: self.packet,
            reason,
        }
    }

    fn bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        let src = self.src;
        let end = self.offset.saturating_add(len);
        let slice = src.get(self.offset..end).ok_or_else(|| {
            self.malformed(format!(
                "needs {len} bytes at offset {}, {} available",
                self.offset,
                src.len().saturating_sub(self.offset)
            ))
        })?;
        self.offset = end;
        Ok(slice)
    }

    fn u32(&mut self) -> Result<u32> {
        let b = self.bytes(4)?;
        Ok(self.endian.u32_from([b[0], b[1], b[2], b[3]]))
    }

    fn string(&mut self) -> Result<String> {
        let len = self.u32()? as usize;
        let bytes = self.bytes(len)?;
        String::from_utf8(bytes.to_vec()).map_err(|err| self.malformed(format!("invalid UTF-8: {err}")))
    }

    fn finish(&self) -> Result<()> {
        if self.offset != self.src.len() {
            return Err(self.malformed(format!(
                "{} trailing bytes",
                self.src.len() - self.offset
            )));
        }
        Ok(())
    }
}
