//! Connection channel with signal-based delivery.

use std::io::{self, BufWriter, Read, Write};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use tether_core::logging::targets;
use tether_core::{ConnectionId, Signal};

use super::config::ChannelConfig;
use super::endpoint::{Endpoint, EndpointSource};
use super::message::{Batch, Message};
use super::state::ChannelState;
use crate::codec::{self, FrameDecoder};
use crate::error::{ChannelError, Result};

/// Identifies a message subscriber registered with [`Channel::subscribe`].
pub type SubscriptionId = ConnectionId;

/// One open connection.
struct Session {
    generation: u64,
    endpoint: Endpoint,
    writer: BufWriter<TcpStream>,
    receiver: JoinHandle<()>,
}

impl Session {
    fn write_frame(&mut self, frame: &[u8]) -> io::Result<()> {
        self.writer.write_all(frame)?;
        self.writer.flush()
    }
}

/// The channel's connection, guarded by a single mutex.
enum Link {
    Disconnected,
    Connected(Session),
}

impl Link {
    fn state(&self) -> ChannelState {
        match self {
            Link::Disconnected => ChannelState::Disconnected,
            Link::Connected(_) => ChannelState::Connected,
        }
    }
}

/// State shared between the channel handle and its receive task.
struct Shared {
    source: Box<dyn EndpointSource>,
    config: ChannelConfig,
    link: Mutex<Link>,
    /// Handle on the open socket that `disconnect` can shut down without
    /// waiting for a send blocked on `link`.
    control: Mutex<Option<(u64, TcpStream)>>,
    /// Generation of the open connection, or 0 when disconnected.
    live_generation: AtomicU64,
    next_generation: AtomicU64,

    message_received: Signal<Message>,
    connected: Signal<Endpoint>,
    disconnected: Signal<()>,
    bytes_written: Signal<usize>,
    error: Signal<ChannelError>,
}

/// A client connection to a remote server.
///
/// The channel connects lazily: the first [`send`](Self::send) reads the
/// endpoint from its [`EndpointSource`], opens a TCP connection, and starts a
/// dedicated receive task. Every inbound object is published on
/// [`message_received`](Self::message_received). Any I/O failure closes the
/// connection; the next send opens a fresh one, rereading the endpoint.
///
/// Writes are serialized internally, so a channel may be shared between
/// threads (for example behind an `Arc`).
///
/// # Signals
///
/// - [`message_received`](Self::message_received): Emitted for each inbound object
/// - [`connected`](Self::connected): Emitted when a connection is established
/// - [`disconnected`](Self::disconnected): Emitted when a connection is closed
/// - [`bytes_written`](Self::bytes_written): Emitted after a frame is flushed
/// - [`error`](Self::error): Emitted when an operation fails
///
/// Slots run on the thread that caused the event: the caller of `send` for
/// `connected`, `bytes_written` and write errors, and the receive task for
/// inbound messages and read errors. Slots may call back into the channel.
///
/// # Example
///
/// ```no_run
/// use tether_net::{Channel, ConfigFile};
///
/// let channel = Channel::new(ConfigFile::new("config.txt"));
///
/// channel.subscribe(|message| {
///     println!("Server says: {}", message.payload());
/// });
///
/// channel.send(["login", "erik"]);
/// ```
pub struct Channel {
    shared: Arc<Shared>,
}

impl Channel {
    /// Create a channel with the default configuration.
    pub fn new(source: impl EndpointSource + 'static) -> Self {
        Self::with_config(source, ChannelConfig::default())
    }

    /// Create a channel with a custom configuration.
    pub fn with_config(source: impl EndpointSource + 'static, config: ChannelConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                source: Box::new(source),
                config,
                link: Mutex::new(Link::Disconnected),
                control: Mutex::new(None),
                live_generation: AtomicU64::new(0),
                next_generation: AtomicU64::new(1),
                message_received: Signal::new(),
                connected: Signal::new(),
                disconnected: Signal::new(),
                bytes_written: Signal::new(),
                error: Signal::new(),
            }),
        }
    }

    /// Send items to the server as one batch, connecting first if needed.
    ///
    /// Failures are logged and emitted on [`error`](Self::error); a failed
    /// write closes the connection and drops the batch. Use
    /// [`try_send`](Self::try_send) to also receive the error.
    pub fn send<I, T>(&self, items: I)
    where
        I: IntoIterator<Item = T>,
        T: Serialize,
    {
        let _ = self.try_send(items);
    }

    /// Like [`send`](Self::send), but returns the failure to the caller too.
    pub fn try_send<I, T>(&self, items: I) -> Result<()>
    where
        I: IntoIterator<Item = T>,
        T: Serialize,
    {
        match Batch::from_items(items) {
            Ok(batch) => self.shared.send_batch(&batch),
            Err(err) => Err(self.shared.encode_failed(err)),
        }
    }

    /// Send a prebuilt batch. Failures are logged and emitted on [`error`](Self::error).
    pub fn send_batch(&self, batch: &Batch) {
        let _ = self.try_send_batch(batch);
    }

    /// Send a prebuilt batch and return any failure.
    pub fn try_send_batch(&self, batch: &Batch) -> Result<()> {
        self.shared.send_batch(batch)
    }

    /// Close the connection.
    ///
    /// Closes the output side, the input side, and then the socket. Each step
    /// is attempted even if an earlier one fails; failures are logged only.
    /// Calling this while disconnected does nothing.
    ///
    /// A send blocked in a write on another thread is interrupted first; it
    /// returns a write error and the batch is dropped.
    pub fn disconnect(&self) {
        self.shared.interrupt();
        if let Some(session) = self.shared.take_session(None) {
            tracing::debug!(
                target: targets::CHANNEL,
                endpoint = %session.endpoint,
                generation = session.generation,
                "disconnecting"
            );
            self.shared.close_session(session);
            self.shared.disconnected.emit(());
        }
    }

    /// Register a subscriber for inbound messages.
    ///
    /// Subscribers run on the receive task in registration order, once per
    /// message, in the order messages arrived.
    pub fn subscribe<F>(&self, subscriber: F) -> SubscriptionId
    where
        F: Fn(&Message) + Send + Sync + 'static,
    {
        self.shared.message_received.connect(subscriber)
    }

    /// Remove a subscriber. Returns `false` if it was not registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.shared.message_received.disconnect(id)
    }

    /// Signal emitted for each inbound message.
    pub fn message_received(&self) -> &Signal<Message> {
        &self.shared.message_received
    }

    /// Signal emitted when a connection is established.
    pub fn connected(&self) -> &Signal<Endpoint> {
        &self.shared.connected
    }

    /// Signal emitted when the connection is closed, for any reason.
    pub fn disconnected(&self) -> &Signal<()> {
        &self.shared.disconnected
    }

    /// Signal emitted with the frame size after each successful write.
    pub fn bytes_written(&self) -> &Signal<usize> {
        &self.shared.bytes_written
    }

    /// Signal emitted when an operation fails.
    pub fn error(&self) -> &Signal<ChannelError> {
        &self.shared.error
    }

    /// Get the current connection state.
    pub fn state(&self) -> ChannelState {
        self.shared.link.lock().state()
    }

    /// Check if the channel is connected.
    pub fn is_connected(&self) -> bool {
        self.state() == ChannelState::Connected
    }

    /// The endpoint of the open connection, if any.
    pub fn endpoint(&self) -> Option<Endpoint> {
        match &*self.shared.link.lock() {
            Link::Connected(session) => Some(session.endpoint.clone()),
            Link::Disconnected => None,
        }
    }

    /// The channel's configuration.
    pub fn config(&self) -> &ChannelConfig {
        &self.shared.config
    }
}

impl Drop for Channel {
    fn drop(&mut self) {
        self.disconnect();
    }
}

impl std::fmt::Debug for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Channel")
            .field("source", &self.shared.source.describe())
            .field("endpoint", &self.endpoint())
            .field("state", &self.state())
            .finish()
    }
}

impl Shared {
    fn is_live(&self, generation: u64) -> bool {
        self.live_generation.load(Ordering::SeqCst) == generation
    }

    fn send_batch(self: &Arc<Self>, batch: &Batch) -> Result<()> {
        let frame = codec::encode_frame(batch, self.config.max_frame_length)
            .map_err(|err| self.encode_failed(err))?;

        let mut link = self.link.lock();
        let mut opened = None;
        if matches!(*link, Link::Disconnected) {
            match self.open() {
                Ok(session) => {
                    opened = Some(session.endpoint.clone());
                    *link = Link::Connected(session);
                }
                Err(err) => {
                    drop(link);
                    tracing::warn!(target: targets::CHANNEL, error = %err, "connect failed");
                    self.error.emit(err.clone());
                    return Err(err);
                }
            }
        }
        let Link::Connected(session) = &mut *link else {
            return Err(ChannelError::write(io::ErrorKind::NotConnected.into()));
        };

        let generation = session.generation;
        let result = session.write_frame(&frame);
        drop(link);

        if let Some(endpoint) = opened {
            self.connected.emit(endpoint);
        }

        match result {
            Ok(()) => {
                tracing::trace!(
                    target: targets::CHANNEL,
                    generation,
                    items = batch.len(),
                    bytes = frame.len(),
                    "batch written"
                );
                self.bytes_written.emit(frame.len());
                Ok(())
            }
            Err(e) => {
                let err = ChannelError::write(e);
                self.fail(generation, err.clone());
                Err(err)
            }
        }
    }

    fn encode_failed(&self, err: ChannelError) -> ChannelError {
        tracing::warn!(target: targets::CHANNEL, error = %err, "dropping unencodable batch");
        self.error.emit(err.clone());
        err
    }

    /// Open a new connection and start its receive task.
    fn open(self: &Arc<Self>) -> Result<Session> {
        let endpoint = self.source.endpoint()?;
        tracing::debug!(
            target: targets::CHANNEL,
            endpoint = %endpoint,
            source = %self.source.describe(),
            "connecting"
        );

        let stream = self.connect_stream(&endpoint)?;
        let as_connect_error = |e| ChannelError::connect(endpoint.address(), e);
        self.configure(&stream).map_err(as_connect_error)?;
        let input = stream.try_clone().map_err(as_connect_error)?;
        let control = stream.try_clone().map_err(as_connect_error)?;

        let generation = self.next_generation.fetch_add(1, Ordering::SeqCst);
        self.live_generation.store(generation, Ordering::SeqCst);

        let shared = Arc::clone(self);
        let receiver = thread::Builder::new()
            .name(format!("tether-recv-{generation}"))
            .spawn(move || shared.receive_loop(generation, input))
            .map_err(|e| {
                self.live_generation.store(0, Ordering::SeqCst);
                as_connect_error(e)
            })?;

        *self.control.lock() = Some((generation, control));
        tracing::debug!(
            target: targets::CHANNEL,
            endpoint = %endpoint,
            generation,
            "connected"
        );

        Ok(Session {
            generation,
            endpoint,
            writer: BufWriter::with_capacity(self.config.write_buffer_size, stream),
            receiver,
        })
    }

    fn connect_stream(&self, endpoint: &Endpoint) -> Result<TcpStream> {
        let address = endpoint.address();
        let target = (endpoint.host(), endpoint.port());

        let Some(timeout) = non_zero(self.config.connect_timeout) else {
            return TcpStream::connect(target).map_err(|e| ChannelError::connect(&address, e));
        };

        let mut last_error = None;
        for addr in target
            .to_socket_addrs()
            .map_err(|e| ChannelError::connect(&address, e))?
        {
            match TcpStream::connect_timeout(&addr, timeout) {
                Ok(stream) => return Ok(stream),
                Err(e) if e.kind() == io::ErrorKind::TimedOut => {
                    last_error = Some(ChannelError::ConnectTimeout(address.clone()));
                }
                Err(e) => last_error = Some(ChannelError::connect(&address, e)),
            }
        }

        Err(last_error.unwrap_or_else(|| {
            ChannelError::connect(
                &address,
                io::Error::new(io::ErrorKind::NotFound, "endpoint resolved to no addresses"),
            )
        }))
    }

    fn configure(&self, stream: &TcpStream) -> io::Result<()> {
        stream.set_read_timeout(non_zero(self.config.read_timeout))?;
        stream.set_write_timeout(non_zero(self.config.write_timeout))?;
        stream.set_nodelay(self.config.no_delay)
    }

    /// Shut down the open socket without taking the link lock.
    ///
    /// The connection stops being live first, so the failures this causes in
    /// a blocked writer or the receive task are not reported as errors.
    fn interrupt(&self) {
        let Some((generation, control)) = self.control.lock().take() else {
            return;
        };
        let _ = self.live_generation.compare_exchange(
            generation,
            0,
            Ordering::SeqCst,
            Ordering::SeqCst,
        );
        if let Err(e) = control.shutdown(Shutdown::Both) {
            log_teardown(generation, ChannelError::teardown("socket", e));
        }
    }

    /// Detach the open session, if it matches `generation` (or any, if `None`).
    fn take_session(&self, generation: Option<u64>) -> Option<Session> {
        let mut link = self.link.lock();
        match &*link {
            Link::Connected(session) if generation.is_none_or(|g| g == session.generation) => {}
            _ => return None,
        }
        self.live_generation.store(0, Ordering::SeqCst);
        *self.control.lock() = None;
        match std::mem::replace(&mut *link, Link::Disconnected) {
            Link::Connected(session) => Some(session),
            Link::Disconnected => None,
        }
    }

    /// Release a detached session's resources, then wait for its receive task
    /// unless called from that task.
    fn close_session(&self, session: Session) {
        let Session {
            generation,
            writer,
            receiver,
            ..
        } = session;

        // Every successful send flushes; leftover bytes belong to a failed write.
        let (stream, unflushed) = writer.into_parts();
        if let Ok(bytes) = unflushed
            && !bytes.is_empty()
        {
            tracing::debug!(
                target: targets::CHANNEL,
                generation,
                bytes = bytes.len(),
                "discarding unflushed output"
            );
        }
        if let Err(e) = stream.shutdown(Shutdown::Write) {
            log_teardown(generation, ChannelError::teardown("output stream", e));
        }
        if let Err(e) = stream.shutdown(Shutdown::Read) {
            log_teardown(generation, ChannelError::teardown("input stream", e));
        }
        drop(stream);
        tracing::trace!(target: targets::CHANNEL, generation, "socket closed");

        if receiver.thread().id() != thread::current().id() && receiver.join().is_err() {
            tracing::warn!(target: targets::CHANNEL, generation, "receive task panicked");
        }
    }

    /// Tear down connection `generation` after a failure.
    ///
    /// Does nothing if that connection is already gone or being disconnected,
    /// so a stale receive task never reports errors for a connection it no
    /// longer owns.
    fn fail(&self, generation: u64, err: ChannelError) {
        let session = if self.is_live(generation) {
            self.take_session(Some(generation))
        } else {
            None
        };
        let Some(session) = session else {
            tracing::trace!(
                target: targets::CHANNEL,
                generation,
                error = %err,
                "ignoring failure of closed connection"
            );
            return;
        };

        tracing::warn!(
            target: targets::CHANNEL,
            endpoint = %session.endpoint,
            generation,
            error = %err,
            "connection failed"
        );
        self.close_session(session);
        self.error.emit(err);
        self.disconnected.emit(());
    }

    /// Body of the receive task for connection `generation`.
    fn receive_loop(&self, generation: u64, mut input: TcpStream) {
        tracing::debug!(target: targets::CHANNEL, generation, "receive task started");

        let mut decoder = FrameDecoder::new(self.config.max_frame_length);
        let mut buffer = vec![0u8; self.config.read_buffer_size.max(1)];

        'receive: while self.is_live(generation) {
            match input.read(&mut buffer) {
                Ok(0) => {
                    let eof = io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "connection closed by peer",
                    );
                    self.fail(generation, ChannelError::read(eof));
                    break;
                }
                Ok(n) => decoder.extend(&buffer[..n]),
                Err(e)
                    if matches!(
                        e.kind(),
                        io::ErrorKind::WouldBlock
                            | io::ErrorKind::TimedOut
                            | io::ErrorKind::Interrupted
                    ) =>
                {
                    continue;
                }
                Err(e) => {
                    self.fail(generation, ChannelError::read(e));
                    break;
                }
            }

            loop {
                match decoder.decode::<Value>() {
                    Ok(Some(payload)) => {
                        if !self.is_live(generation) {
                            break 'receive;
                        }
                        tracing::trace!(target: targets::CHANNEL, generation, "message received");
                        self.message_received.emit(Message::new(payload));
                    }
                    Ok(None) => break,
                    Err(err) => {
                        self.fail(generation, err);
                        break 'receive;
                    }
                }
            }
        }

        tracing::debug!(target: targets::CHANNEL, generation, "receive task exiting");
    }
}

/// Sockets reject a zero timeout; treat it as none.
fn non_zero(timeout: Option<Duration>) -> Option<Duration> {
    timeout.filter(|t| !t.is_zero())
}

fn log_teardown(generation: u64, err: ChannelError) {
    tracing::debug!(target: targets::CHANNEL, generation, error = %err, "teardown step failed");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;

    fn unused_endpoint() -> Endpoint {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        Endpoint::new("127.0.0.1", port)
    }

    #[test]
    fn test_initial_state() {
        let channel = Channel::new(Endpoint::new("127.0.0.1", 9000));

        assert_eq!(channel.state(), ChannelState::Disconnected);
        assert!(!channel.is_connected());
        assert!(channel.endpoint().is_none());
        assert_eq!(channel.config().read_timeout, Some(std::time::Duration::from_secs(10)));
    }

    #[test]
    fn test_disconnect_when_idle_emits_nothing() {
        let channel = Channel::new(Endpoint::new("127.0.0.1", 9000));
        let count = Arc::new(AtomicU64::new(0));

        let count_clone = count.clone();
        channel.disconnected().connect(move |()| {
            count_clone.fetch_add(1, Ordering::SeqCst);
        });

        channel.disconnect();
        channel.disconnect();

        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert_eq!(channel.state(), ChannelState::Disconnected);
    }

    #[test]
    fn test_stale_failure_is_ignored() {
        let channel = Channel::new(unused_endpoint());
        let errors = Arc::new(AtomicU64::new(0));

        let errors_clone = errors.clone();
        channel.error().connect(move |_| {
            errors_clone.fetch_add(1, Ordering::SeqCst);
        });

        channel
            .shared
            .fail(42, ChannelError::read(io::ErrorKind::BrokenPipe.into()));

        assert_eq!(errors.load(Ordering::SeqCst), 0);
        assert_eq!(channel.state(), ChannelState::Disconnected);
    }

    #[test]
    fn test_config_error_is_a_connect_failure() {
        let channel = Channel::new(|| "not-an-endpoint".parse::<Endpoint>());

        let err = channel.try_send(["ping"]).unwrap_err();

        assert!(matches!(err, ChannelError::Config(_)));
        assert_eq!(channel.state(), ChannelState::Disconnected);
    }

    #[test]
    fn test_subscribe_unsubscribe() {
        let channel = Channel::new(Endpoint::new("127.0.0.1", 9000));

        let id = channel.subscribe(|_| {});
        assert_eq!(channel.message_received().connection_count(), 1);
        assert!(channel.unsubscribe(id));
        assert!(!channel.unsubscribe(id));
        assert_eq!(channel.message_received().connection_count(), 0);
    }
}
