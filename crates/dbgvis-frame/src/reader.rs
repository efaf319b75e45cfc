use std::io::{ErrorKind, Read};

use bytes::BytesMut;
use dbgvis_transport::SocketStream;
use tracing::debug;

use crate::codec::{decode_envelope, Envelope, FrameConfig};
use crate::error::{FrameError, Result};

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;
const READ_CHUNK_SIZE: usize = 8 * 1024;

/// Reads complete envelopes from any `Read` stream.
///
/// Handles partial reads and realignment internally: callers always get
/// complete envelopes, and garbage between them is dropped and counted.
pub struct FrameReader<T> {
    inner: T,
    buf: BytesMut,
    config: FrameConfig,
    resync_bytes: u64,
}

impl<T: Read> FrameReader<T> {
    /// Create a new frame reader with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new frame reader with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            config,
            resync_bytes: 0,
        }
    }

    /// Read the next complete envelope (blocking).
    ///
    /// Returns `Err(FrameError::ConnectionClosed)` when EOF is reached.
    pub fn read_envelope(&mut self) -> Result<Envelope> {
        loop {
            let decoded = decode_envelope(&mut self.buf, self.config.max_payload_size);
            if decoded.skipped > 0 {
                debug!(skipped = decoded.skipped, "resynchronized envelope stream");
                self.resync_bytes += decoded.skipped as u64;
            }
            if let Some(envelope) = decoded.envelope {
                return Ok(envelope);
            }

            let mut chunk = [0u8; READ_CHUNK_SIZE];
            let read = match self.inner.read(&mut chunk) {
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            };

            if read == 0 {
                return Err(FrameError::ConnectionClosed);
            }

            self.buf.extend_from_slice(&chunk[..read]);
        }
    }

    /// Total bytes discarded while realigning on a valid header.
    pub fn resync_bytes(&self) -> u64 {
        self.resync_bytes
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the reader and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Current frame reader configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

impl FrameReader<SocketStream> {
    /// Create a frame reader for a socket and apply the read timeout from config.
    pub fn with_config_socket(inner: SocketStream, config: FrameConfig) -> Result<Self> {
        inner.set_read_timeout(config.read_timeout)?;
        Ok(Self::with_config(inner, config))
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use bytes::BytesMut;

    use super::*;
    use crate::codec::{encode_envelope, HEADER_SIZE};
    use crate::endian::Endian;

    fn wire(payloads: &[&[u8]]) -> Vec<u8> {
        let mut wire = BytesMut::new();
        for payload in payloads {
            encode_envelope(payload, Endian::NATIVE, &mut wire).unwrap();
        }
        wire.to_vec()
    }

    #[test]
    fn read_multiple_envelopes() {
        let mut reader = FrameReader::new(Cursor::new(wire(&[b"one", b"two", b"three"])));

        assert_eq!(reader.read_envelope().unwrap().payload.as_ref(), b"one");
        assert_eq!(reader.read_envelope().unwrap().payload.as_ref(), b"two");
        assert_eq!(reader.read_envelope().unwrap().payload.as_ref(), b"three");
        assert!(matches!(
            reader.read_envelope(),
            Err(FrameError::ConnectionClosed)
        ));
    }

    #[test]
    fn read_envelope_with_large_payload() {
        let payload = vec![0xAB; 64 * 1024];
        let mut reader = FrameReader::new(Cursor::new(wire(&[&payload])));
        let envelope = reader.read_envelope().unwrap();
        assert_eq!(envelope.payload.as_ref(), payload.as_slice());
    }

    #[test]
    fn byte_by_byte_delivery_roundtrips_every_length() {
        let payloads: Vec<Vec<u8>> = (0..64usize)
            .map(|len| (0..len).map(|i| (i * 7 + len) as u8).collect())
            .collect();
        let refs: Vec<&[u8]> = payloads.iter().map(Vec::as_slice).collect();

        let mut reader = FrameReader::new(ByteByByteReader {
            bytes: wire(&refs),
            pos: 0,
        });
        for expected in &payloads {
            let envelope = reader.read_envelope().unwrap();
            assert_eq!(envelope.payload.as_ref(), expected.as_slice());
        }
        assert_eq!(reader.resync_bytes(), 0);
    }

    #[test]
    fn garbage_between_messages_is_dropped() {
        let mut bytes = wire(&[b"before"]);
        let garbage: Vec<u8> = (0..37u8).map(|b| b.wrapping_mul(31)).collect();
        bytes.extend_from_slice(&garbage);
        bytes.extend_from_slice(&wire(&[b"after", b"later"]));

        let mut reader = FrameReader::new(ByteByByteReader { bytes, pos: 0 });
        assert_eq!(reader.read_envelope().unwrap().payload.as_ref(), b"before");
        assert_eq!(reader.read_envelope().unwrap().payload.as_ref(), b"after");
        assert_eq!(reader.read_envelope().unwrap().payload.as_ref(), b"later");
        assert_eq!(reader.resync_bytes(), garbage.len() as u64);
    }

    #[test]
    fn truncated_message_from_previous_session_is_skipped() {
        let stale = wire(&[b"stale message that never finished"]);
        let mut bytes = stale[..HEADER_SIZE - 3].to_vec();
        bytes.extend_from_slice(&wire(&[b"fresh"]));

        let mut reader = FrameReader::new(Cursor::new(bytes));
        assert_eq!(reader.read_envelope().unwrap().payload.as_ref(), b"fresh");
        assert_eq!(reader.resync_bytes(), (HEADER_SIZE - 3) as u64);
    }

    #[test]
    fn connection_closed_mid_envelope() {
        let full = wire(&[b"only-part-of-this"]);
        let mut reader = FrameReader::new(Cursor::new(full[..HEADER_SIZE + 4].to_vec()));
        let err = reader.read_envelope().unwrap_err();
        assert!(matches!(err, FrameError::ConnectionClosed));
    }

    #[test]
    fn interrupted_read_retries() {
        let reader = InterruptedThenData {
            interrupted: false,
            bytes: wire(&[b"ok"]),
            pos: 0,
        };
        let mut framed = FrameReader::new(reader);
        assert_eq!(framed.read_envelope().unwrap().payload.as_ref(), b"ok");
    }

    #[test]
    fn roundtrip_over_socket_pair() {
        let listener = dbgvis_transport::TcpEndpoint::bind("127.0.0.1", 0).unwrap();
        let port = listener.local_addr().port();
        let client = std::thread::spawn(move || {
            let stream = dbgvis_transport::TcpEndpoint::connect("127.0.0.1", port).unwrap();
            let mut writer = crate::writer::FrameWriter::new(stream);
            writer.send(b"ping").unwrap();
        });

        let stream = listener.accept().unwrap();
        let cfg = FrameConfig {
            read_timeout: Some(std::time::Duration::from_secs(5)),
            ..FrameConfig::default()
        };
        let mut reader = FrameReader::with_config_socket(stream, cfg).unwrap();
        assert_eq!(reader.read_envelope().unwrap().payload.as_ref(), b"ping");
        client.join().unwrap();
    }

    #[derive(Debug)]
    struct ByteByByteReader {
        bytes: Vec<u8>,
        pos: usize,
    }

    impl Read for ByteByByteReader {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.pos >= self.bytes.len() || buf.is_empty() {
                return Ok(0);
            }
            buf[0] = self.bytes[self.pos];
            self.pos += 1;
            Ok(1)
        }
    }

    struct InterruptedThenData {
        interrupted: bool,
        bytes: Vec<u8>,
        pos: usize,
    }

    impl Read for InterruptedThenData {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if !self.interrupted {
                self.interrupted = true;
                return Err(std::io::Error::from(ErrorKind::Interrupted));
            }
            let remaining = self.bytes.len() - self.pos;
            let n = remaining.min(buf.len());
            buf[..n].copy_from_slice(&self.bytes[self.pos..self.pos + n]);
            self.pos += n;
            Ok(n)
        }
    }
}
