//! `tokio_util` codec speaking the same envelope format as [`FrameReader`]
//! and [`FrameWriter`].
//!
//! [`FrameReader`]: crate::FrameReader
//! [`FrameWriter`]: crate::FrameWriter

use bytes::{Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};
use tracing::debug;

use crate::codec::{decode_envelope, encode_envelope, Envelope, DEFAULT_MAX_PAYLOAD};
use crate::endian::Endian;
use crate::error::{FrameError, Result};

/// Envelope codec for `Framed` streams.
#[derive(Debug, Clone)]
pub struct EnvelopeCodec {
    max_payload_size: usize,
    endian: Endian,
    resync_bytes: u64,
}

impl EnvelopeCodec {
    pub fn new() -> Self {
        Self::with_config(DEFAULT_MAX_PAYLOAD, Endian::NATIVE)
    }

    pub fn with_config(max_payload_size: usize, endian: Endian) -> Self {
        Self {
            max_payload_size,
            endian,
            resync_bytes: 0,
        }
    }

    /// Total bytes discarded while realigning on a valid header.
    pub fn resync_bytes(&self) -> u64 {
        self.resync_bytes
    }
}

impl Default for EnvelopeCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for EnvelopeCodec {
    type Item = Envelope;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Envelope>> {
        let decoded = decode_envelope(src, self.max_payload_size);
        if decoded.skipped > 0 {
            debug!(skipped = decoded.skipped, "resynchronized envelope stream");
            self.resync_bytes += decoded.skipped as u64;
        }
        Ok(decoded.envelope)
    }
}

impl Encoder<Bytes> for EnvelopeCodec {
    type Error = FrameError;

    fn encode(&mut self, item: Bytes, dst: &mut BytesMut) -> Result<()> {
        if item.len() > self.max_payload_size {
            return Err(FrameError::PayloadTooLarge {
                size: item.len(),
                max: self.max_payload_size,
            });
        }
        encode_envelope(&item, self.endian, dst)
    }
}

#[cfg(test)]
mod tests {
    use futures_util::{SinkExt, StreamExt};
    use tokio::io::AsyncWriteExt;
    use tokio_util::codec::{FramedRead, FramedWrite};

    use super::*;

    #[tokio::test]
    async fn framed_roundtrip_over_duplex() {
        let (client, server) = tokio::io::duplex(64);
        let mut sink = FramedWrite::new(client, EnvelopeCodec::new());
        let mut stream = FramedRead::new(server, EnvelopeCodec::new());

        let writer = tokio::spawn(async move {
            for i in 0..16u8 {
                sink.send(Bytes::from(vec![i; i as usize * 10])).await.unwrap();
            }
        });

        for i in 0..16u8 {
            let envelope = stream.next().await.unwrap().unwrap();
            assert_eq!(envelope.payload.as_ref(), vec![i; i as usize * 10].as_slice());
        }
        writer.await.unwrap();
    }

    #[tokio::test]
    async fn framed_read_skips_garbage() {
        let (mut client, server) = tokio::io::duplex(256);
        let mut wire = BytesMut::new();
        wire.extend_from_slice(b"junk!");
        encode_envelope(b"kept", Endian::Big, &mut wire).unwrap();
        client.write_all(&wire).await.unwrap();
        drop(client);

        let mut stream = FramedRead::new(server, EnvelopeCodec::new());
        let envelope = stream.next().await.unwrap().unwrap();
        assert_eq!(envelope.endian, Endian::Big);
        assert_eq!(envelope.payload.as_ref(), b"kept");
        assert_eq!(stream.decoder().resync_bytes(), 5);
        assert!(stream.next().await.is_none());
    }

    #[test]
    fn encoder_rejects_oversized_payload() {
        let mut codec = EnvelopeCodec::with_config(2, Endian::Little);
        let mut dst = BytesMut::new();
        let err = codec.encode(Bytes::from_static(b"abc"), &mut dst).unwrap_err();
        assert!(matches!(err, FrameError::PayloadTooLarge { .. }));
    }
}
