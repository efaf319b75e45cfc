//! A framed, duplex connection serviced by one background I/O thread.
//!
//! The caller's thread only touches two queues: outbound envelopes waiting to
//! be written and inbound messages waiting to be consumed. Each queue has its
//! own mutex; counters that both threads read are atomics.

use std::collections::VecDeque;
use std::io::{ErrorKind, Read, Write};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use bytes::{Bytes, BytesMut};
use dbgvis_transport::{SocketStream, TcpEndpoint};
use tracing::{debug, info, warn};

use crate::codec::{decode_envelope, encode_envelope, DEFAULT_MAX_PAYLOAD};
use crate::endian::Endian;
use crate::error::Result;

const READ_CHUNK_SIZE: usize = 64 * 1024;

/// Which side of the connection this process plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Listens, accepts one peer at a time, and listens again after it leaves.
    Server,
    /// Connects once; the connection is over when the peer goes away.
    Client,
}

/// Tuning for a [`Connection`].
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Maximum accepted payload size; larger declared lengths are treated as garbage.
    pub max_payload_size: usize,
    /// Byte order of outgoing envelopes.
    pub endian: Endian,
    /// Read timeout of the I/O thread, and its sleep while no peer is attached.
    pub poll_interval: Duration,
    /// Upper bound on one blocking socket write.
    pub write_timeout: Duration,
    /// Upper bound on establishing a client connection.
    pub connect_timeout: Duration,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            max_payload_size: DEFAULT_MAX_PAYLOAD,
            endian: Endian::NATIVE,
            poll_interval: Duration::from_millis(1),
            write_timeout: Duration::from_millis(250),
            connect_timeout: Duration::from_secs(5),
        }
    }
}

/// One received message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub payload: Bytes,
    /// Byte order of the sender.
    pub endian: Endian,
    /// [`Connection::generation`] of the peer that sent it.
    pub generation: u64,
}

/// Point-in-time counters of a connection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConnectionStats {
    pub pending_out_messages: usize,
    pub pending_out_bytes: usize,
    pub pending_in_messages: usize,
    pub resync_bytes: u64,
    pub generation: u64,
}

struct Shared {
    outbound: Mutex<VecDeque<Bytes>>,
    inbound: Mutex<VecDeque<Message>>,
    inbound_ready: Condvar,
    connected: AtomicBool,
    quit: AtomicBool,
    drop_peer: AtomicBool,
    generation: AtomicU64,
    peer_addr: Mutex<Option<SocketAddr>>,
    pending_out_messages: AtomicUsize,
    pending_out_bytes: AtomicUsize,
    pending_in_messages: AtomicUsize,
    resync_bytes: AtomicU64,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Shared {
    fn new() -> Self {
        Self {
            outbound: Mutex::new(VecDeque::new()),
            inbound: Mutex::new(VecDeque::new()),
            inbound_ready: Condvar::new(),
            connected: AtomicBool::new(false),
            quit: AtomicBool::new(false),
            drop_peer: AtomicBool::new(false),
            generation: AtomicU64::new(0),
            peer_addr: Mutex::new(None),
            pending_out_messages: AtomicUsize::new(0),
            pending_out_bytes: AtomicUsize::new(0),
            pending_in_messages: AtomicUsize::new(0),
            resync_bytes: AtomicU64::new(0),
        }
    }

    fn clear_outbound(&self) {
        lock(&self.outbound).clear();
        self.pending_out_messages.store(0, Ordering::SeqCst);
        self.pending_out_bytes.store(0, Ordering::SeqCst);
    }

    fn clear_inbound(&self) {
        lock(&self.inbound).clear();
        self.pending_in_messages.store(0, Ordering::SeqCst);
    }

    fn pop_outbound(&self) -> Option<Bytes> {
        lock(&self.outbound).pop_front()
    }

    /// Counters may already have been zeroed by a peer drop; never wrap below zero.
    fn finish_outbound(&self, len: usize) {
        saturating_sub(&self.pending_out_messages, 1);
        saturating_sub(&self.pending_out_bytes, len);
    }

    fn push_inbound(&self, message: Message) {
        lock(&self.inbound).push_back(message);
        self.pending_in_messages.fetch_add(1, Ordering::SeqCst);
        self.inbound_ready.notify_all();
    }

    fn should_stop(&self) -> bool {
        self.quit.load(Ordering::SeqCst) || self.drop_peer.load(Ordering::SeqCst)
    }
}

fn saturating_sub(counter: &AtomicUsize, amount: usize) {
    // The closure never returns None, so the update cannot fail.
    let _ = counter.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |current| {
        Some(current.saturating_sub(amount))
    });
}

/// Framed duplex connection with a background I/O thread.
///
/// `send` never blocks; `receive`, `recv` and `peek_length` never block;
/// `recv_timeout` blocks at most for its timeout. Dropping the connection
/// stops the I/O thread and joins it before the socket is released.
pub struct Connection {
    role: Role,
    shared: Arc<Shared>,
    endian: Endian,
    local_addr: Option<SocketAddr>,
    io_thread: Option<JoinHandle<()>>,
}

impl Connection {
    /// Bind `host:port` and service clients one at a time on a background thread.
    ///
    /// Fails fast if the address cannot be bound.
    pub fn listen(host: &str, port: u16, config: ConnectionConfig) -> Result<Self> {
        let endpoint = TcpEndpoint::bind(host, port)?;
        endpoint.set_nonblocking(true)?;
        let local_addr = Some(endpoint.local_addr());

        let shared = Arc::new(Shared::new());
        let endian = config.endian;
        let thread_shared = Arc::clone(&shared);
        let io_thread = std::thread::Builder::new()
            .name("dbgvis-io-server".to_string())
            .spawn(move || run_server(endpoint, thread_shared, config))?;

        Ok(Self {
            role: Role::Server,
            shared,
            endian,
            local_addr,
            io_thread: Some(io_thread),
        })
    }

    /// Connect to `host:port` and service the connection on a background thread.
    ///
    /// Fails fast if the peer cannot be reached.
    pub fn connect(host: &str, port: u16, config: ConnectionConfig) -> Result<Self> {
        let stream = TcpEndpoint::connect_timeout(host, port, config.connect_timeout)?;
        let local_addr = stream.local_addr();

        let shared = Arc::new(Shared::new());
        *lock(&shared.peer_addr) = stream.peer_addr();
        shared.generation.store(1, Ordering::SeqCst);
        shared.connected.store(true, Ordering::SeqCst);

        let endian = config.endian;
        let thread_shared = Arc::clone(&shared);
        let io_thread = std::thread::Builder::new()
            .name("dbgvis-io-client".to_string())
            .spawn(move || run_client(stream, thread_shared, config))?;

        Ok(Self {
            role: Role::Client,
            shared,
            endian,
            local_addr,
            io_thread: Some(io_thread),
        })
    }

    /// Queue a copy of `payload` for delivery.
    ///
    /// Returns false when there is no live peer to deliver to; the payload is
    /// dropped rather than held for a future peer.
    pub fn send(&self, payload: &[u8]) -> bool {
        if self.shared.quit.load(Ordering::SeqCst) || !self.is_connected() {
            return false;
        }

        let mut buf = BytesMut::new();
        if let Err(err) = encode_envelope(payload, self.endian, &mut buf) {
            warn!(error = %err, "dropping unframeable payload");
            return false;
        }
        let wire = buf.freeze();
        let len = wire.len();

        lock(&self.shared.outbound).push_back(wire);
        self.shared
            .pending_out_messages
            .fetch_add(1, Ordering::SeqCst);
        self.shared.pending_out_bytes.fetch_add(len, Ordering::SeqCst);
        true
    }

    /// Length and sender byte order of the next complete message, without consuming it.
    pub fn peek_length(&self) -> Option<(usize, Endian)> {
        lock(&self.shared.inbound)
            .front()
            .map(|message| (message.payload.len(), message.endian))
    }

    /// Copy the next message into `buf` and consume it.
    ///
    /// Returns `None` and leaves the message queued when nothing is ready or
    /// when `buf` is smaller than the message; size the buffer from
    /// [`Connection::peek_length`] and retry.
    pub fn receive(&self, buf: &mut [u8]) -> Option<(usize, Endian)> {
        let mut inbound = lock(&self.shared.inbound);
        let front = inbound.front()?;
        let len = front.payload.len();
        if len > buf.len() {
            return None;
        }
        buf[..len].copy_from_slice(&front.payload);
        let endian = front.endian;
        inbound.pop_front();
        self.shared
            .pending_in_messages
            .fetch_sub(1, Ordering::SeqCst);
        Some((len, endian))
    }

    /// Take the next message if one is ready.
    pub fn recv(&self) -> Option<Message> {
        let message = lock(&self.shared.inbound).pop_front()?;
        self.shared
            .pending_in_messages
            .fetch_sub(1, Ordering::SeqCst);
        Some(message)
    }

    /// Take the next message, waiting up to `timeout` for one to arrive.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<Message> {
        let deadline = Instant::now() + timeout;
        let mut inbound = lock(&self.shared.inbound);
        loop {
            if let Some(message) = inbound.pop_front() {
                self.shared
                    .pending_in_messages
                    .fetch_sub(1, Ordering::SeqCst);
                return Some(message);
            }
            let now = Instant::now();
            if now >= deadline {
                return None;
            }
            let (guard, _) = self
                .shared
                .inbound_ready
                .wait_timeout(inbound, deadline - now)
                .unwrap_or_else(PoisonError::into_inner);
            inbound = guard;
        }
    }

    /// Whether a peer is currently attached.
    pub fn is_connected(&self) -> bool {
        self.shared.connected.load(Ordering::SeqCst)
    }

    /// Drop the current peer and discard everything queued for it.
    ///
    /// A server goes back to listening; a client connection is finished.
    pub fn disconnect_peer(&self) {
        if !self.is_connected() {
            return;
        }
        info!(role = ?self.role, "dropping peer connection");
        self.shared.drop_peer.store(true, Ordering::SeqCst);
        self.shared.connected.store(false, Ordering::SeqCst);
        self.shared.clear_outbound();
    }

    /// Increments once per attached peer; a change means a new session.
    pub fn generation(&self) -> u64 {
        self.shared.generation.load(Ordering::SeqCst)
    }

    /// Snapshot of the queue and resync counters.
    pub fn stats(&self) -> ConnectionStats {
        ConnectionStats {
            pending_out_messages: self.shared.pending_out_messages.load(Ordering::SeqCst),
            pending_out_bytes: self.shared.pending_out_bytes.load(Ordering::SeqCst),
            pending_in_messages: self.shared.pending_in_messages.load(Ordering::SeqCst),
            resync_bytes: self.shared.resync_bytes.load(Ordering::SeqCst),
            generation: self.generation(),
        }
    }

    /// Role this connection was created with.
    pub fn role(&self) -> Role {
        self.role
    }

    /// Byte order used for outgoing envelopes.
    pub fn endian(&self) -> Endian {
        self.endian
    }

    /// Address of this end: the listening address of a server, the socket's own
    /// address for a client.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// Address of the attached peer, if any.
    ///
    /// A server forgets the address once the peer disconnects.
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        *lock(&self.shared.peer_addr)
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.shared.quit.store(true, Ordering::SeqCst);
        if let Some(handle) = self.io_thread.take() {
            if handle.join().is_err() {
                warn!("connection I/O thread panicked");
            }
        }
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("role", &self.role)
            .field("connected", &self.is_connected())
            .field("local_addr", &self.local_addr)
            .field("peer_addr", &self.peer_addr())
            .finish()
    }
}

fn run_server(endpoint: TcpEndpoint, shared: Arc<Shared>, config: ConnectionConfig) {
    while !shared.quit.load(Ordering::SeqCst) {
        match endpoint.try_accept() {
            Ok(Some(stream)) => {
                shared.clear_inbound();
                shared.clear_outbound();
                shared.drop_peer.store(false, Ordering::SeqCst);
                let generation = shared.generation.fetch_add(1, Ordering::SeqCst) + 1;
                *lock(&shared.peer_addr) = stream.peer_addr();
                shared.connected.store(true, Ordering::SeqCst);
                info!(peer = ?stream.peer_addr(), generation, "peer connected");

                service_stream(stream, &shared, &config);

                shared.connected.store(false, Ordering::SeqCst);
                *lock(&shared.peer_addr) = None;
                shared.clear_outbound();
                info!(generation, "peer disconnected; listening again");
            }
            Ok(None) => std::thread::sleep(config.poll_interval),
            Err(err) => {
                warn!(error = %err, "accept failed");
                std::thread::sleep(config.poll_interval);
            }
        }
    }
    debug!("server I/O thread exiting");
}

fn run_client(stream: SocketStream, shared: Arc<Shared>, config: ConnectionConfig) {
    info!(peer = ?stream.peer_addr(), "connected");
    service_stream(stream, &shared, &config);
    shared.connected.store(false, Ordering::SeqCst);
    shared.clear_outbound();
    debug!("client I/O thread exiting");
}

/// Pump one attached stream until it fails or the owner asks us to stop.
fn service_stream(mut stream: SocketStream, shared: &Shared, config: &ConnectionConfig) {
    if let Err(err) = stream
        .set_read_timeout(Some(config.poll_interval.max(Duration::from_micros(100))))
        .and_then(|()| stream.set_write_timeout(Some(config.write_timeout)))
    {
        warn!(error = %err, "failed configuring socket timeouts");
        stream.shutdown();
        return;
    }

    let mut reassembly = BytesMut::with_capacity(READ_CHUNK_SIZE);
    let mut chunk = vec![0u8; READ_CHUNK_SIZE];
    let mut in_flight: Option<(Bytes, usize)> = None;
    let generation = shared.generation.load(Ordering::SeqCst);

    loop {
        if shared.should_stop() {
            // The owner is closing, not dropping the peer: hand over what is already queued.
            if !shared.drop_peer.load(Ordering::SeqCst) {
                if let Err(err) = write_pending(&mut stream, shared, &mut in_flight) {
                    debug!(error = %err, "final write failed");
                }
            }
            break;
        }

        if let Err(err) = write_pending(&mut stream, shared, &mut in_flight) {
            debug!(error = %err, "write failed");
            break;
        }

        match stream.read(&mut chunk) {
            Ok(0) => {
                debug!("peer closed the stream");
                break;
            }
            Ok(n) => {
                reassembly.extend_from_slice(&chunk[..n]);
                loop {
                    let decoded = decode_envelope(&mut reassembly, config.max_payload_size);
                    if decoded.skipped > 0 {
                        debug!(skipped = decoded.skipped, "resynchronized envelope stream");
                        shared
                            .resync_bytes
                            .fetch_add(decoded.skipped as u64, Ordering::SeqCst);
                    }
                    match decoded.envelope {
                        Some(envelope) => shared.push_inbound(Message {
                            payload: envelope.payload,
                            endian: envelope.endian,
                            generation,
                        }),
                        None => break,
                    }
                }
            }
            Err(err)
                if matches!(
                    err.kind(),
                    ErrorKind::WouldBlock | ErrorKind::TimedOut | ErrorKind::Interrupted
                ) => {}
            Err(err) => {
                debug!(error = %err, "read failed");
                break;
            }
        }
    }

    stream.shutdown();
}

/// Write queued envelopes until the queue is empty or the socket pushes back.
fn write_pending(
    stream: &mut SocketStream,
    shared: &Shared,
    in_flight: &mut Option<(Bytes, usize)>,
) -> std::io::Result<()> {
    loop {
        if in_flight.is_none() {
            *in_flight = shared.pop_outbound().map(|wire| (wire, 0));
        }
        let Some((wire, offset)) = in_flight.as_mut() else {
            return Ok(());
        };

        match stream.write(&wire[*offset..]) {
            Ok(0) => return Err(ErrorKind::WriteZero.into()),
            Ok(n) => {
                *offset += n;
                if *offset == wire.len() {
                    shared.finish_outbound(wire.len());
                    *in_flight = None;
                }
            }
            Err(err)
                if matches!(
                    err.kind(),
                    ErrorKind::WouldBlock | ErrorKind::TimedOut | ErrorKind::Interrupted
                ) =>
            {
                return Ok(());
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::writer::FrameWriter;

    fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if cond() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(2));
        }
        cond()
    }

    fn pair() -> (Connection, Connection) {
        let server = Connection::listen("127.0.0.1", 0, ConnectionConfig::default()).unwrap();
        let port = server.local_addr().unwrap().port();
        let client = Connection::connect("127.0.0.1", port, ConnectionConfig::default()).unwrap();
        assert!(wait_until(Duration::from_secs(5), || server.is_connected()));
        (server, client)
    }

    #[test]
    fn send_and_receive_both_directions() {
        let (server, client) = pair();

        assert!(client.send(b"to server"));
        let message = server.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(message.payload.as_ref(), b"to server");
        assert_eq!(message.endian, Endian::NATIVE);

        assert!(server.send(b"to client"));
        let message = client.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(message.payload.as_ref(), b"to client");
    }

    #[test]
    fn messages_arrive_in_send_order() {
        let (server, client) = pair();
        for i in 0..200u32 {
            assert!(client.send(format!("msg-{i}").as_bytes()));
        }
        for i in 0..200u32 {
            let message = server.recv_timeout(Duration::from_secs(5)).unwrap();
            assert_eq!(message.payload.as_ref(), format!("msg-{i}").as_bytes());
        }
    }

    #[test]
    fn peek_then_receive_with_sized_buffer() {
        let (server, client) = pair();
        client.send(b"twelve bytes");
        assert!(wait_until(Duration::from_secs(5), || server
            .peek_length()
            .is_some()));

        let (len, endian) = server.peek_length().unwrap();
        assert_eq!(len, 12);
        assert_eq!(endian, Endian::NATIVE);

        let mut small = [0u8; 4];
        assert!(server.receive(&mut small).is_none());
        assert_eq!(server.peek_length().map(|(len, _)| len), Some(12));

        let mut buf = vec![0u8; len];
        assert_eq!(server.receive(&mut buf), Some((12, Endian::NATIVE)));
        assert_eq!(&buf, b"twelve bytes");
        assert!(server.peek_length().is_none());
    }

    #[test]
    fn garbage_from_raw_peer_is_skipped() {
        let server = Connection::listen("127.0.0.1", 0, ConnectionConfig::default()).unwrap();
        let port = server.local_addr().unwrap().port();
        let stream = TcpEndpoint::connect("127.0.0.1", port).unwrap();
        let mut writer = FrameWriter::new(stream);

        writer.send_raw(b"\x01\x02noise BPACK").unwrap();
        writer.send(b"valid").unwrap();

        let message = server.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(message.payload.as_ref(), b"valid");
        assert_eq!(server.stats().resync_bytes, 13);
    }

    #[test]
    fn server_listens_again_after_client_leaves() {
        let server = Connection::listen("127.0.0.1", 0, ConnectionConfig::default()).unwrap();
        let port = server.local_addr().unwrap().port();

        let first = Connection::connect("127.0.0.1", port, ConnectionConfig::default()).unwrap();
        assert!(wait_until(Duration::from_secs(5), || server.generation() == 1));
        drop(first);
        assert!(wait_until(Duration::from_secs(5), || !server.is_connected()));

        let second = Connection::connect("127.0.0.1", port, ConnectionConfig::default()).unwrap();
        assert!(wait_until(Duration::from_secs(5), || server.generation() == 2
            && server.is_connected()));
        second.send(b"again");
        let message = server.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(message.payload.as_ref(), b"again");
    }

    #[test]
    fn disconnect_peer_discards_and_reports_not_connected() {
        let (server, client) = pair();
        server.disconnect_peer();
        assert!(!server.is_connected());
        assert!(!server.send(b"nobody listening"));
        assert_eq!(server.stats().pending_out_messages, 0);
        assert!(wait_until(Duration::from_secs(5), || !client.is_connected()));
        assert!(!client.send(b"too late"));
    }

    #[test]
    fn messages_carry_the_sender_generation() {
        let server = Connection::listen("127.0.0.1", 0, ConnectionConfig::default()).unwrap();
        let port = server.local_addr().unwrap().port();

        let first = Connection::connect("127.0.0.1", port, ConnectionConfig::default()).unwrap();
        first.send(b"one");
        let message = server.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(message.generation, 1);
        drop(first);
        assert!(wait_until(Duration::from_secs(5), || !server.is_connected()));

        let second = Connection::connect("127.0.0.1", port, ConnectionConfig::default()).unwrap();
        second.send(b"two");
        let message = server.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(message.payload.as_ref(), b"two");
        assert_eq!(message.generation, 2);
        assert_eq!(message.generation, server.generation());
    }

    #[test]
    fn completed_write_after_drop_does_not_wrap_counters() {
        let shared = Shared::new();
        shared.pending_out_messages.store(1, Ordering::SeqCst);
        shared.pending_out_bytes.store(24, Ordering::SeqCst);

        // A peer drop zeroes the counters while the I/O thread still has a write in flight.
        shared.clear_outbound();
        shared.finish_outbound(24);

        assert_eq!(shared.pending_out_messages.load(Ordering::SeqCst), 0);
        assert_eq!(shared.pending_out_bytes.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn client_and_server_report_both_addresses() {
        let (server, client) = pair();
        let bound = server.local_addr().unwrap();

        assert_eq!(client.peer_addr(), Some(bound));
        assert_ne!(client.local_addr(), Some(bound));
        assert!(wait_until(Duration::from_secs(5), || server.peer_addr().is_some()));
        assert_eq!(server.peer_addr(), client.local_addr());

        drop(client);
        assert!(wait_until(Duration::from_secs(5), || server.peer_addr().is_none()));
        assert_eq!(server.local_addr(), Some(bound));
    }

    #[test]
    fn connect_refused_fails_fast() {
        let port = {
            let endpoint = TcpEndpoint::bind("127.0.0.1", 0).unwrap();
            endpoint.local_addr().port()
        };
        let result = Connection::connect("127.0.0.1", port, ConnectionConfig::default());
        assert!(result.is_err());
    }

    #[test]
    fn recv_timeout_returns_none_when_idle() {
        let (server, _client) = pair();
        let start = Instant::now();
        assert!(server.recv_timeout(Duration::from_millis(20)).is_none());
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn foreign_byte_order_is_reported() {
        let config = ConnectionConfig {
            endian: Endian::NATIVE.opposite(),
            ..ConnectionConfig::default()
        };
        let server = Connection::listen("127.0.0.1", 0, ConnectionConfig::default()).unwrap();
        let port = server.local_addr().unwrap().port();
        let client = Connection::connect("127.0.0.1", port, config).unwrap();

        client.send(b"swapped header");
        let message = server.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(message.endian, Endian::NATIVE.opposite());
        assert_eq!(message.payload.as_ref(), b"swapped header");
    }
}
