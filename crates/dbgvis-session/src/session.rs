use std::collections::VecDeque;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::net::SocketAddr;
use std::path::PathBuf;

use bytes::Bytes;
use dbgvis_frame::{Connection, Message, Role};
use dbgvis_primitive::{deliver_frame, DebugPrimitive, DisplayType, Frame, NullRenderer, Renderer};
use dbgvis_record::{CommandLog, CommandPlayback, RecordingReader, RecordingWriter};
use tracing::{debug, info, warn};

use crate::args::split_args;
use crate::config::{RunMode, SessionConfig};
use crate::error::{Result, SessionError};
use crate::input::InputEvent;
use crate::packet::{encode_primitives_packet, Packet, PROTOCOL_VERSION};
use crate::resource::{Resource, ResourceProvider};

type StreamWriter = RecordingWriter<BufWriter<File>>;
type StreamReader = RecordingReader<BufReader<File>>;

/// What we know about the current peer. Reset whenever the peer changes.
#[derive(Debug, Default)]
struct PeerState {
    hello_sent: bool,
    remote_version: Option<u32>,
    remote_app_name: Option<String>,
    /// Frame sent and not yet acknowledged.
    awaiting_ack: Option<u32>,
    /// Frame being assembled from received packets.
    accumulating: Option<Frame>,
    last_flushed: Option<u32>,
    synchronized_frame: Option<u32>,
}

impl PeerState {
    fn good_version(&self) -> bool {
        self.remote_version == Some(PROTOCOL_VERSION)
    }
}

/// One process's end of a debug-visualization stream.
///
/// A producer calls [`Session::send_frame`] then [`Session::server_wait`]
/// once per tick. A consumer calls [`Session::process_messages`] with its
/// renderer. Both may use the command, resource and input side channels.
///
/// Nothing here blocks except `server_wait`, and that is bounded by
/// `max_server_wait` iterations.
pub struct Session {
    config: SessionConfig,
    mode: RunMode,
    connection: Option<Connection>,
    provider: Option<Box<dyn ResourceProvider>>,
    generation: u64,
    peer: PeerState,
    commands: VecDeque<String>,
    resources: VecDeque<Resource>,
    input_events: VecDeque<InputEvent>,
    stream: Option<StreamWriter>,
    playback: Option<StreamReader>,
    playback_next: usize,
    command_log: Option<CommandLog>,
    command_playback: Option<CommandPlayback>,
}

impl Session {
    /// Start a session in the configured run mode.
    ///
    /// Fails if the listener cannot bind, the client cannot connect (unless
    /// `client-or-file` can fall back to its stream file), or a configured
    /// file cannot be opened.
    pub fn start(config: SessionConfig, provider: Option<Box<dyn ResourceProvider>>) -> Result<Self> {
        config.validate()?;
        let mut mode = config.mode;
        let connection = match config.mode {
            RunMode::Server => Some(Connection::listen(
                &config.host,
                config.port,
                config.connection_config(),
            )?),
            RunMode::Client => Some(Connection::connect(
                &config.host,
                config.port,
                config.connection_config(),
            )?),
            RunMode::ClientOrFile => {
                match Connection::connect(&config.host, config.port, config.connection_config()) {
                    Ok(connection) => Some(connection),
                    Err(err) if config.stream_file.is_some() => {
                        warn!(
                            host = %config.host,
                            port = config.port,
                            error = %err,
                            "no viewer reachable, recording to file"
                        );
                        mode = RunMode::File;
                        None
                    }
                    Err(err) => return Err(err.into()),
                }
            }
            RunMode::Local | RunMode::File => None,
        };

        // A connected client-or-file session only uses its stream file as a fallback.
        let stream = match (&config.stream_file, mode) {
            (Some(path), m) if m != RunMode::ClientOrFile => Some(StreamWriter::create(path)?),
            _ => None,
        };
        let playback = config
            .stream_playback_file
            .as_ref()
            .map(StreamReader::open)
            .transpose()?;
        let command_log = config
            .command_record_file
            .as_ref()
            .map(CommandLog::create)
            .transpose()?;
        let command_playback = config
            .command_playback_file
            .as_ref()
            .map(CommandPlayback::open)
            .transpose()?;

        info!(
            mode = %mode,
            host = %config.host,
            port = config.port,
            app = %config.app_name,
            "session started"
        );

        Ok(Self {
            config,
            mode,
            connection,
            provider,
            generation: 0,
            peer: PeerState::default(),
            commands: VecDeque::new(),
            resources: VecDeque::new(),
            input_events: VecDeque::new(),
            stream,
            playback,
            playback_next: 0,
            command_log,
            command_playback,
        })
    }

    /// Deliver one frame to this session's sink.
    ///
    /// Sends one `PRIMITIVES` packet per non-empty display group, then
    /// `FINALIZE_FRAME`. With `echo_locally` (or in `local` mode) the frame
    /// also goes to `renderer`, and an open stream file records it.
    ///
    /// Returns whether the frame reached the sink of the run mode: the
    /// renderer for `local`, the recording for `file`, the peer otherwise.
    /// Nothing is sent to a peer that is absent or has not matched versions.
    pub fn send_frame(
        &mut self,
        frame_counter: u32,
        batches: &[(DisplayType, Vec<DebugPrimitive>)],
        renderer: &mut dyn Renderer,
    ) -> bool {
        self.sync_connection();

        let mut frame = Frame::new(frame_counter);
        for (display, primitives) in batches {
            frame.push(*display, primitives.iter().cloned());
        }

        if self.mode == RunMode::Local || self.config.echo_locally {
            deliver_frame(renderer, frame.batches());
        }
        let recorded = self.record_frame(&frame);

        match self.mode {
            RunMode::Local => true,
            RunMode::File => recorded,
            RunMode::Server | RunMode::Client | RunMode::ClientOrFile => self.send_remote_frame(&frame),
        }
    }

    fn send_remote_frame(&mut self, frame: &Frame) -> bool {
        if !self.can_send() {
            debug!(
                frame = frame.counter,
                connected = self.is_connected(),
                good_version = self.peer.good_version(),
                "frame not sent"
            );
            return false;
        }
        let Some(connection) = self.connection.as_ref() else {
            return false;
        };

        let endian = connection.endian();
        let mut sent = true;
        for batch in frame.batches() {
            if batch.primitives.is_empty() {
                continue;
            }
            let packet = encode_primitives_packet(frame.counter, batch.display, &batch.primitives, endian);
            sent &= connection.send(&packet);
        }
        sent &= connection.send(&Packet::FinalizeFrame { frame: frame.counter }.encode(endian));

        if sent {
            self.peer.awaiting_ack = Some(frame.counter);
            debug!(
                frame = frame.counter,
                primitives = frame.primitive_count(),
                "sent frame"
            );
        }
        sent
    }

    /// Wait for the peer to acknowledge the last frame sent.
    ///
    /// Each iteration processes inbound packets, then waits up to one poll
    /// interval for more. After `max_server_wait` iterations `keep_waiting`
    /// is asked, with the iteration number, whether to go on; without it, or
    /// when it declines, the peer is dropped and false is returned.
    ///
    /// Returns true at once when there is nothing to wait for. Packets that
    /// arrive while waiting are handled as in `process_messages`, with
    /// primitives going nowhere; recorded playback does not advance.
    pub fn server_wait(&mut self, mut keep_waiting: Option<&mut dyn FnMut(u32) -> bool>) -> bool {
        let Some(expected) = self.peer.awaiting_ack else {
            return true;
        };
        let poll = self.config.poll_interval();
        let mut iteration = 0u32;

        loop {
            self.sync_connection();
            self.drain_inbound(&mut NullRenderer);
            if self.peer.awaiting_ack.is_none() {
                return true;
            }
            if !self.is_connected() {
                debug!(frame = expected, "peer went away while waiting for ACK");
                self.peer.awaiting_ack = None;
                return false;
            }
            if iteration >= self.config.max_server_wait {
                let extend = keep_waiting
                    .as_mut()
                    .is_some_and(|keep_waiting| (**keep_waiting)(iteration));
                if !extend {
                    warn!(
                        frame = expected,
                        iterations = iteration,
                        "no ACK from peer, dropping connection"
                    );
                    self.drop_peer();
                    return false;
                }
            }

            let message = self
                .connection
                .as_ref()
                .and_then(|connection| connection.recv_timeout(poll));
            if let Some(message) = message {
                self.handle_message(message, &mut NullRenderer);
            }
            iteration = iteration.saturating_add(1);
        }
    }

    /// Handle every packet that has arrived, and play back one recorded
    /// frame if a playback file is open.
    ///
    /// Completed frames go to `renderer` and are acknowledged. Returns the
    /// number of packets and recorded frames handled.
    pub fn process_messages(&mut self, renderer: &mut dyn Renderer) -> usize {
        self.sync_connection();
        self.play_next(renderer) + self.drain_inbound(renderer)
    }

    /// Handle the packets queued when called; later arrivals wait for the next call.
    fn drain_inbound(&mut self, renderer: &mut dyn Renderer) -> usize {
        let mut handled = 0;
        let pending = self
            .connection
            .as_ref()
            .map_or(0, |connection| connection.stats().pending_in_messages);
        for _ in 0..pending {
            let Some(message) = self.connection.as_ref().and_then(Connection::recv) else {
                break;
            };
            self.handle_message(message, renderer);
            handled += 1;
        }
        handled
    }

    /// Queue a command for the peer. Parsed there with shell-like quoting.
    pub fn send_command(&mut self, command: &str) -> bool {
        self.send_side_channel(&Packet::Command(command.to_string()))
    }

    /// Next command from the peer, or from the command playback file once
    /// the peer's queue is empty.
    pub fn get_command(&mut self) -> Option<Vec<String>> {
        if let Some(text) = self.commands.pop_front() {
            if let Some(log) = self.command_log.as_mut() {
                if let Err(err) = log.append(&text) {
                    warn!(error = %err, "command recording failed, stopping it");
                    self.command_log = None;
                }
            }
            return Some(split_args(&text));
        }

        let playback = self.command_playback.as_mut()?;
        match playback.next_command() {
            Ok(Some(text)) => Some(split_args(&text)),
            Ok(None) => {
                info!("command playback finished");
                self.command_playback = None;
                None
            }
            Err(err) => {
                warn!(error = %err, "command playback failed, stopping it");
                self.command_playback = None;
                None
            }
        }
    }

    /// Push a named blob to the peer.
    pub fn send_resource(&mut self, namespace: &str, name: &str, data: &[u8]) -> bool {
        self.send_side_channel(&Packet::Resource {
            namespace: namespace.to_string(),
            name: name.to_string(),
            data: Bytes::copy_from_slice(data),
        })
    }

    /// Ask the peer's resource provider for a named blob.
    ///
    /// The answer, if any, shows up in [`Session::get_resource`].
    pub fn request_resource(&mut self, namespace: &str, name: &str) -> bool {
        self.send_side_channel(&Packet::RequestResource {
            namespace: namespace.to_string(),
            name: name.to_string(),
        })
    }

    pub fn get_resource(&mut self) -> Option<Resource> {
        self.resources.pop_front()
    }

    pub fn send_input_event(&mut self, event: InputEvent) -> bool {
        self.send_side_channel(&Packet::InputEvent(event))
    }

    pub fn get_input_event(&mut self) -> Option<InputEvent> {
        self.input_events.pop_front()
    }

    /// Start (or stop, with `None`) recording frames to a stream file.
    ///
    /// Any current recording is closed first.
    pub fn set_stream_file(&mut self, path: Option<PathBuf>) -> Result<()> {
        if let Some(writer) = self.stream.take() {
            writer.finish()?;
        }
        if let Some(path) = &path {
            self.stream = Some(StreamWriter::create(path)?);
        }
        self.config.stream_file = path;
        Ok(())
    }

    /// Deliver recorded frame `n` to `renderer` and continue playback after it.
    pub fn playback_frame(&mut self, n: usize, renderer: &mut dyn Renderer) -> Result<()> {
        let reader = self
            .playback
            .as_mut()
            .ok_or_else(|| SessionError::Config("no stream playback file is open".into()))?;
        let frame = reader.set_frame(n)?;
        deliver_frame(renderer, frame.batches());
        self.playback_next = n + 1;
        self.peer.synchronized_frame = Some(frame.counter);
        Ok(())
    }

    /// Frames in the open playback file.
    pub fn playback_frame_count(&self) -> Option<usize> {
        self.playback.as_ref().map(RecordingReader::frame_count)
    }

    /// Name the peer announced in the handshake.
    pub fn remote_app_name(&self) -> Option<&str> {
        self.peer.remote_app_name.as_deref()
    }

    pub fn is_connected(&self) -> bool {
        self.connection
            .as_ref()
            .is_some_and(Connection::is_connected)
    }

    /// Whether the peer announced the same protocol version.
    pub fn has_good_version(&self) -> bool {
        self.peer.good_version()
    }

    /// Last frame the consumer is known to have completed: the last ACK
    /// received on a producer, the last frame flushed on a consumer.
    pub fn synchronized_frame(&self) -> Option<u32> {
        self.peer.synchronized_frame
    }

    /// Effective run mode; `client-or-file` becomes `file` when it fell back.
    pub fn mode(&self) -> RunMode {
        self.mode
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Listening address of a server, or the socket's own address for a client.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.connection.as_ref().and_then(Connection::local_addr)
    }

    /// Address of the attached peer.
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.connection.as_ref().and_then(Connection::peer_addr)
    }

    pub fn connection(&self) -> Option<&Connection> {
        self.connection.as_ref()
    }

    /// Drop the current peer. A server keeps listening for the next one.
    pub fn drop_peer(&mut self) {
        if let Some(connection) = self.connection.as_ref() {
            connection.disconnect_peer();
        }
        self.peer = PeerState::default();
    }

    fn can_send(&self) -> bool {
        self.is_connected() && self.peer.good_version()
    }

    fn send_side_channel(&mut self, packet: &Packet) -> bool {
        self.sync_connection();
        if !self.can_send() {
            debug!(packet = packet.name(), "side-channel packet not sent");
            return false;
        }
        self.send_packet(packet)
    }

    fn send_packet(&self, packet: &Packet) -> bool {
        self.connection
            .as_ref()
            .is_some_and(|connection| connection.send(&packet.encode(connection.endian())))
    }

    /// Notice a new peer and, as a client, open the handshake.
    fn sync_connection(&mut self) {
        let Some(connection) = self.connection.as_ref() else {
            return;
        };
        let generation = connection.generation();
        let role = connection.role();
        let connected = connection.is_connected();

        if generation > self.generation {
            self.reset_peer(generation);
        }
        if role == Role::Client && connected && !self.peer.hello_sent {
            self.send_hello();
        }
    }

    fn reset_peer(&mut self, generation: u64) {
        debug!(generation, "new peer");
        self.generation = generation;
        self.peer = PeerState::default();
    }

    fn send_hello(&mut self) {
        let version = self.send_packet(&Packet::Version(PROTOCOL_VERSION));
        let name = self.send_packet(&Packet::AppName(self.config.app_name.clone()));
        self.peer.hello_sent = version && name;
    }

    fn handle_message(&mut self, message: Message, renderer: &mut dyn Renderer) {
        // A message can be the first sign of a new peer, or a leftover from the last one.
        if message.generation < self.generation {
            debug!(
                generation = message.generation,
                current = self.generation,
                "dropping message from a previous peer"
            );
            return;
        }
        if message.generation > self.generation {
            self.reset_peer(message.generation);
        }

        let packet = match Packet::decode(&message.payload, message.endian) {
            Ok(packet) => packet,
            Err(err) => {
                warn!(error = %err, bytes = message.payload.len(), "dropping undecodable packet");
                return;
            }
        };

        match packet {
            Packet::Primitives {
                frame,
                display,
                primitives,
            } => self.accept_primitives(frame, display, primitives, renderer),
            Packet::FinalizeFrame { frame } => self.finalize_remote_frame(frame, renderer),
            Packet::Ack { frame } => {
                self.peer.synchronized_frame = Some(frame);
                if self.peer.awaiting_ack.is_some_and(|expected| frame >= expected) {
                    self.peer.awaiting_ack = None;
                }
            }
            Packet::Version(version) => self.accept_version(version),
            Packet::AppName(name) => {
                info!(app = %name, "peer announced itself");
                self.peer.remote_app_name = Some(name);
            }
            Packet::Command(text) => self.commands.push_back(text),
            Packet::RequestResource { namespace, name } => self.answer_resource_request(&namespace, &name),
            Packet::Resource {
                namespace,
                name,
                data,
            } => self.resources.push_back(Resource {
                namespace,
                name,
                data,
                remote_endian: message.endian,
            }),
            Packet::InputEvent(event) => self.input_events.push_back(event),
        }
    }

    fn accept_version(&mut self, version: u32) {
        self.peer.remote_version = Some(version);
        if version == PROTOCOL_VERSION {
            info!(version, "protocol version matched");
        } else {
            warn!(
                local = PROTOCOL_VERSION,
                remote = version,
                "protocol version mismatch, withholding primitives"
            );
        }
        if !self.peer.hello_sent {
            self.send_hello();
        }
    }

    fn accept_primitives(
        &mut self,
        frame: u32,
        display: DisplayType,
        primitives: Vec<DebugPrimitive>,
        renderer: &mut dyn Renderer,
    ) {
        if !self.peer.good_version() {
            debug!(frame, "withholding primitives until versions match");
            return;
        }

        match self.peer.accumulating.as_ref().map(|acc| acc.counter) {
            Some(current) if frame == current => {}
            Some(current) if frame > current => {
                self.flush_accumulated(renderer);
                self.peer.accumulating = Some(Frame::new(frame));
            }
            Some(current) => {
                debug!(current, frame, "frame counter went backwards, discarding partial frame");
                self.peer.last_flushed = None;
                self.peer.accumulating = Some(Frame::new(frame));
            }
            None => {
                if self.peer.last_flushed == Some(frame) {
                    warn!(frame, "primitives for a frame already flushed");
                    return;
                }
                self.peer.accumulating = Some(Frame::new(frame));
            }
        }
        if let Some(accumulating) = self.peer.accumulating.as_mut() {
            accumulating.push(display, primitives);
        }
    }

    fn finalize_remote_frame(&mut self, frame: u32, renderer: &mut dyn Renderer) {
        if !self.peer.good_version() {
            return;
        }
        match self.peer.accumulating.as_ref().map(|acc| acc.counter) {
            Some(current) if frame < current => {
                debug!(current, frame, "ignoring stale frame finalization");
            }
            Some(current) => {
                self.flush_accumulated(renderer);
                if frame > current {
                    self.flush_frame(Frame::new(frame), renderer);
                }
            }
            None if self.peer.last_flushed == Some(frame) => {}
            None => self.flush_frame(Frame::new(frame), renderer),
        }
    }

    fn flush_accumulated(&mut self, renderer: &mut dyn Renderer) {
        if let Some(frame) = self.peer.accumulating.take() {
            self.flush_frame(frame, renderer);
        }
    }

    /// Hand a completed frame to the renderer and acknowledge it.
    fn flush_frame(&mut self, frame: Frame, renderer: &mut dyn Renderer) {
        deliver_frame(renderer, frame.batches());
        self.record_frame(&frame);
        self.send_packet(&Packet::Ack {
            frame: frame.counter,
        });
        self.peer.last_flushed = Some(frame.counter);
        self.peer.synchronized_frame = Some(frame.counter);
        debug!(
            frame = frame.counter,
            primitives = frame.primitive_count(),
            "flushed frame"
        );
    }

    /// Append `frame` to the stream file, if one is open.
    fn record_frame(&mut self, frame: &Frame) -> bool {
        let Some(writer) = self.stream.as_mut() else {
            return false;
        };
        let written = frame
            .batches()
            .iter()
            .try_for_each(|batch| writer.write_batch(batch.display, &batch.primitives))
            .and_then(|()| writer.finalize_frame())
            .and_then(|()| writer.flush());
        match written {
            Ok(()) => true,
            Err(err) => {
                warn!(error = %err, "stream recording failed, stopping it");
                self.stream = None;
                false
            }
        }
    }

    fn answer_resource_request(&mut self, namespace: &str, name: &str) {
        let Some(provider) = self.provider.as_mut() else {
            warn!(namespace, name, "resource requested but no provider is registered");
            return;
        };
        let Some(data) = provider.resource(namespace, name) else {
            debug!(namespace, name, "requested resource not found");
            return;
        };
        let sent = self.send_packet(&Packet::Resource {
            namespace: namespace.to_string(),
            name: name.to_string(),
            data,
        });
        debug!(namespace, name, sent, "answered resource request");
    }

    fn play_next(&mut self, renderer: &mut dyn Renderer) -> usize {
        let Some(reader) = self.playback.as_mut() else {
            return 0;
        };
        if self.playback_next >= reader.frame_count() {
            return 0;
        }
        let index = self.playback_next;
        self.playback_next += 1;
        match reader.set_frame(index) {
            Ok(frame) => {
                deliver_frame(renderer, frame.batches());
                self.peer.synchronized_frame = Some(frame.counter);
                1
            }
            Err(err) => {
                warn!(frame = index, error = %err, "skipping unreadable recorded frame");
                0
            }
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Some(writer) = self.stream.take() {
            if let Err(err) = writer.finish() {
                warn!(error = %err, "closing stream recording failed");
            }
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("mode", &self.mode)
            .field("connected", &self.is_connected())
            .field("good_version", &self.peer.good_version())
            .field("remote_app_name", &self.peer.remote_app_name)
            .field("synchronized_frame", &self.peer.synchronized_frame)
            .field("recording", &self.stream.is_some())
            .finish()
    }
}
