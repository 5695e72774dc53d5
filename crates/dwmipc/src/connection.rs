//! Connection to dwm's IPC socket
//!
//! A [`Connection`] owns one socket and runs the request/reply protocol on
//! it. Exactly one request is outstanding at a time and its reply is the next
//! packet read, so replies come back in request order.
//!
//! ## States
//!
//! ```text
//!          request()                 subscribe()
//!  Idle <------------> AwaitingReply ----------> Subscribed --listen()--> Listening
//!   |                                                |                        |
//!   +---------------------- close() / fatal error ---+------------------------+--> Closed
//! ```
//!
//! Once subscribed, a connection only receives EVENT packets and request-mode
//! calls are refused. Open a second connection to query dwm while listening.
//!
//! ## Example
//!
//! ```ignore
//! let mut con = Connection::connect(get_socket_path()?)?;
//! con.subscribe(Event::TagChange)?;
//! con.on_tag_change(|ev| println!("tags on monitor {}: {:#b}", ev.monitor_number, ev.new_state.selected))?;
//! con.listen()?;
//! ```

use std::collections::{BTreeSet, HashMap, VecDeque};
use std::fmt;
use std::io::{self, ErrorKind};
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, trace, warn};

use crate::error::{HeaderError, IpcError, Result};
use crate::event::{Event, EventPayload};
use crate::header::{Header, MessageType, HEADER_SIZE};
use crate::packet::{GetClientArgs, Packet, RunCommandArgs, SubscribeAction, SubscribeArgs};
use crate::transport::Transport;
use crate::types::{
    Client, ClientFocusChangeEvent, FocusedStateChangeEvent, FocusedTitleChangeEvent, Layout,
    LayoutChangeEvent, Monitor, MonitorFocusChangeEvent, Tag, TagChangeEvent, WindowId,
};

/// Socket path used by the dwm IPC patch when none is configured
pub const DEFAULT_SOCKET_PATH: &str = "/tmp/dwm.sock";

/// Environment variable that overrides the socket path
pub const DWM_SOCKET_ENV: &str = "DWM_IPC_SOCKET";

/// Default upper bound on a declared payload length (8 MiB)
pub const DEFAULT_MAX_PAYLOAD_LEN: u32 = 8 * 1024 * 1024;

/// Default number of events held back while a SUBSCRIBE reply is awaited
pub const DEFAULT_MAX_PENDING_EVENTS: usize = 256;

/// Initial delay between retry attempts (100ms)
const INITIAL_RETRY_DELAY_MS: u64 = 100;

/// Maximum delay between retry attempts (1 second)
const MAX_RETRY_DELAY_MS: u64 = 1000;

/// Locate dwm's IPC socket
///
/// Uses `$DWM_IPC_SOCKET` when set and non-empty, otherwise
/// [`DEFAULT_SOCKET_PATH`].
///
/// # Errors
///
/// Returns `IpcError::Errno` with `ENOENT` if the path does not exist.
pub fn get_socket_path() -> Result<PathBuf> {
    let socket_path = std::env::var_os(DWM_SOCKET_ENV)
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_SOCKET_PATH));

    if !socket_path.exists() {
        return Err(IpcError::errno(
            "dwm socket not found",
            io::Error::from_raw_os_error(nix::libc::ENOENT),
        ));
    }

    Ok(socket_path)
}

/// Where a connection is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    Idle,
    /// A request has been written and its reply is being read
    AwaitingReply,
    Subscribed,
    /// Inside [`Connection::listen`]
    Listening,
    Closed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Idle => "idle",
            ConnectionState::AwaitingReply => "awaiting a reply",
            ConnectionState::Subscribed => "subscribed",
            ConnectionState::Listening => "listening",
            ConnectionState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Tunables for a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionConfig {
    /// Largest payload length a header may declare before it is rejected
    pub max_payload_len: u32,
    /// Events that may overtake a SUBSCRIBE reply before the connection is
    /// dropped. Together with `max_payload_len` this bounds the queue.
    pub max_pending_events: usize,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            max_payload_len: DEFAULT_MAX_PAYLOAD_LEN,
            max_pending_events: DEFAULT_MAX_PENDING_EVENTS,
        }
    }
}

/// Callback invoked for each dispatched event
pub type EventHandler = Box<dyn FnMut(&EventPayload) + Send>;

/// A session with dwm over one socket
pub struct Connection<T: Transport = UnixStream> {
    /// `None` once the connection is closed
    transport: Option<T>,
    state: ConnectionState,
    config: ConnectionConfig,
    subscriptions: BTreeSet<Event>,
    handlers: HashMap<Event, EventHandler>,
    /// EVENT packets that arrived while a SUBSCRIBE reply was awaited
    pending: VecDeque<Packet>,
}

impl<T: Transport> fmt::Debug for Connection<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut handled: Vec<Event> = self.handlers.keys().copied().collect();
        handled.sort();

        f.debug_struct("Connection")
            .field("state", &self.state)
            .field("config", &self.config)
            .field("subscriptions", &self.subscriptions)
            .field("handlers", &handled)
            .field("pending", &self.pending.len())
            .finish()
    }
}

impl Connection<UnixStream> {
    /// Connect to the dwm IPC socket at `path` with default settings
    ///
    /// # Errors
    ///
    /// Returns `IpcError::Errno` if the socket cannot be connected.
    pub fn connect(path: impl AsRef<Path>) -> Result<Self> {
        Self::connect_with_config(path, ConnectionConfig::default())
    }

    pub fn connect_with_config(path: impl AsRef<Path>, config: ConnectionConfig) -> Result<Self> {
        let path = path.as_ref();
        let socket = UnixStream::connect(path)
            .map_err(|e| IpcError::errno("Failed to connect to dwm IPC socket", e))?;

        debug!(path = %path.display(), "Connected to dwm IPC socket");
        Ok(Self::from_transport(socket, config))
    }

    /// Connect with retries and exponential backoff
    ///
    /// Makes up to `max_retries + 1` attempts. The delay starts at 100ms,
    /// doubles after each failure and is capped at 1 second. Useful while dwm
    /// is still starting or restarting in place.
    ///
    /// # Errors
    ///
    /// Returns the error of the last attempt once all attempts have failed.
    pub fn connect_with_retry(
        path: impl AsRef<Path>,
        config: ConnectionConfig,
        max_retries: u32,
    ) -> Result<Self> {
        let path = path.as_ref();
        let mut attempt = 0;
        let mut delay_ms = INITIAL_RETRY_DELAY_MS;

        loop {
            attempt += 1;

            match Self::connect_with_config(path, config) {
                Ok(connection) => return Ok(connection),
                Err(e) if attempt > max_retries => {
                    warn!(
                        attempts = attempt,
                        last_error = %e,
                        "Failed to connect to dwm after all retry attempts"
                    );
                    return Err(e);
                }
                Err(e) => {
                    warn!(
                        attempt = attempt,
                        max_retries = max_retries,
                        delay_ms = delay_ms,
                        error = %e,
                        "dwm IPC connection failed, retrying..."
                    );

                    std::thread::sleep(Duration::from_millis(delay_ms));

                    // Exponential backoff with cap
                    delay_ms = (delay_ms * 2).min(MAX_RETRY_DELAY_MS);
                }
            }
        }
    }
}

impl<T: Transport> Connection<T> {
    /// Wrap an already connected transport
    pub fn from_transport(transport: T, config: ConnectionConfig) -> Self {
        Self {
            transport: Some(transport),
            state: ConnectionState::Idle,
            config,
            subscriptions: BTreeSet::new(),
            handlers: HashMap::new(),
            pending: VecDeque::new(),
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Events this connection is subscribed to
    pub fn subscriptions(&self) -> &BTreeSet<Event> {
        &self.subscriptions
    }

    /// The underlying transport, e.g. to set a read timeout on the socket
    pub fn transport(&self) -> Option<&T> {
        self.transport.as_ref()
    }

    // ------------------------------------------------------------------------
    // Request mode
    // ------------------------------------------------------------------------

    /// Send a request and decode its reply
    ///
    /// Only valid while idle. `args` is JSON-encoded as the payload; pass
    /// `None` for requests that take no arguments.
    ///
    /// # Errors
    ///
    /// Returns `IpcError::InvalidOperation` if the connection is not idle,
    /// without touching the socket. Returns `IpcError::ResultFailure` or
    /// `IpcError::Reply` if dwm rejected or mismatched the request; the
    /// connection stays idle. Returns `IpcError::Eof`,
    /// `IpcError::SocketClosed`, `IpcError::Errno` or `IpcError::Header` on
    /// transport failures; the connection is closed.
    pub fn request<R, A>(&mut self, message_type: MessageType, args: Option<&A>) -> Result<R>
    where
        R: DeserializeOwned,
        A: Serialize + ?Sized,
    {
        const OPERATION: &str = "send a request";

        self.require(OPERATION, &[ConnectionState::Idle])?;

        match message_type {
            MessageType::Event => {
                return Err(IpcError::invalid(OPERATION, "EVENT packets are only sent by dwm"))
            }
            MessageType::Subscribe => {
                return Err(IpcError::invalid(
                    OPERATION,
                    "use subscribe() or unsubscribe() to manage subscriptions",
                ))
            }
            _ => {}
        }

        let reply = self.exchange(message_type, args)?;
        reply.parse_reply(message_type)
    }

    /// List monitors and their state
    pub fn get_monitors(&mut self) -> Result<Vec<Monitor>> {
        self.request::<_, ()>(MessageType::GetMonitors, None)
    }

    /// List the tags configured in dwm
    pub fn get_tags(&mut self) -> Result<Vec<Tag>> {
        self.request::<_, ()>(MessageType::GetTags, None)
    }

    /// List the layouts configured in dwm
    pub fn get_layouts(&mut self) -> Result<Vec<Layout>> {
        self.request::<_, ()>(MessageType::GetLayouts, None)
    }

    /// Get the properties of the client managing window `window_id`
    pub fn get_client(&mut self, window_id: WindowId) -> Result<Client> {
        self.request(
            MessageType::GetDwmClient,
            Some(&GetClientArgs {
                client_window_id: window_id,
            }),
        )
    }

    /// Run one of dwm's IPC commands
    ///
    /// # Errors
    ///
    /// Returns `IpcError::ResultFailure` if the command does not exist or the
    /// arguments are wrong in number or type.
    pub fn run_command(&mut self, command: &str, args: &[Value]) -> Result<Value> {
        self.request(
            MessageType::RunCommand,
            Some(&RunCommandArgs { command, args }),
        )
    }

    // ------------------------------------------------------------------------
    // Subscription mode
    // ------------------------------------------------------------------------

    /// Subscribe to an event
    ///
    /// Valid while idle or already subscribed, so several events can be
    /// subscribed to before calling [`listen`](Self::listen). After the first
    /// successful subscription the connection no longer accepts requests.
    ///
    /// # Errors
    ///
    /// Returns `IpcError::InvalidOperation` if already subscribed to `event`.
    /// Returns `IpcError::ResultFailure` if dwm refuses the subscription.
    pub fn subscribe(&mut self, event: Event) -> Result<()> {
        const OPERATION: &str = "subscribe";

        self.require(
            OPERATION,
            &[ConnectionState::Idle, ConnectionState::Subscribed],
        )?;

        if self.subscriptions.contains(&event) {
            return Err(IpcError::invalid(
                OPERATION,
                format!("already subscribed to {}", event),
            ));
        }

        self.send_subscription(event, SubscribeAction::Subscribe)?;

        self.subscriptions.insert(event);
        self.state = ConnectionState::Subscribed;
        debug!(event = %event, "Subscribed to dwm event");
        Ok(())
    }

    /// Stop receiving an event
    ///
    /// The connection stays in subscription mode even when no subscriptions
    /// remain.
    pub fn unsubscribe(&mut self, event: Event) -> Result<()> {
        const OPERATION: &str = "unsubscribe";

        self.require(OPERATION, &[ConnectionState::Subscribed])?;

        if !self.subscriptions.contains(&event) {
            return Err(IpcError::invalid(
                OPERATION,
                format!("not subscribed to {}", event),
            ));
        }

        self.send_subscription(event, SubscribeAction::Unsubscribe)?;

        self.subscriptions.remove(&event);
        debug!(event = %event, "Unsubscribed from dwm event");
        Ok(())
    }

    fn send_subscription(&mut self, event: Event, action: SubscribeAction) -> Result<()> {
        let reply = self.exchange(MessageType::Subscribe, Some(&SubscribeArgs { event, action }))?;
        let _: Value = reply.parse_reply(MessageType::Subscribe)?;
        Ok(())
    }

    /// Register the handler for one event kind
    ///
    /// Replaces any handler already registered for `event`. Handlers cannot
    /// change once [`listen`](Self::listen) has started.
    pub fn register_handler<F>(&mut self, event: Event, handler: F) -> Result<()>
    where
        F: FnMut(&EventPayload) + Send + 'static,
    {
        self.require(
            "register a handler",
            &[ConnectionState::Idle, ConnectionState::Subscribed],
        )?;

        if self.handlers.insert(event, Box::new(handler)).is_some() {
            debug!(event = %event, "Replaced event handler");
        }
        Ok(())
    }

    pub fn on_tag_change<F>(&mut self, mut handler: F) -> Result<()>
    where
        F: FnMut(&TagChangeEvent) + Send + 'static,
    {
        self.register_handler(Event::TagChange, move |payload| {
            if let EventPayload::TagChange(ev) = payload {
                handler(ev)
            }
        })
    }

    pub fn on_client_focus_change<F>(&mut self, mut handler: F) -> Result<()>
    where
        F: FnMut(&ClientFocusChangeEvent) + Send + 'static,
    {
        self.register_handler(Event::ClientFocusChange, move |payload| {
            if let EventPayload::ClientFocusChange(ev) = payload {
                handler(ev)
            }
        })
    }

    pub fn on_layout_change<F>(&mut self, mut handler: F) -> Result<()>
    where
        F: FnMut(&LayoutChangeEvent) + Send + 'static,
    {
        self.register_handler(Event::LayoutChange, move |payload| {
            if let EventPayload::LayoutChange(ev) = payload {
                handler(ev)
            }
        })
    }

    pub fn on_monitor_focus_change<F>(&mut self, mut handler: F) -> Result<()>
    where
        F: FnMut(&MonitorFocusChangeEvent) + Send + 'static,
    {
        self.register_handler(Event::MonitorFocusChange, move |payload| {
            if let EventPayload::MonitorFocusChange(ev) = payload {
                handler(ev)
            }
        })
    }

    pub fn on_focused_title_change<F>(&mut self, mut handler: F) -> Result<()>
    where
        F: FnMut(&FocusedTitleChangeEvent) + Send + 'static,
    {
        self.register_handler(Event::FocusedTitleChange, move |payload| {
            if let EventPayload::FocusedTitleChange(ev) = payload {
                handler(ev)
            }
        })
    }

    pub fn on_focused_state_change<F>(&mut self, mut handler: F) -> Result<()>
    where
        F: FnMut(&FocusedStateChangeEvent) + Send + 'static,
    {
        self.register_handler(Event::FocusedStateChange, move |payload| {
            if let EventPayload::FocusedStateChange(ev) = payload {
                handler(ev)
            }
        })
    }

    /// Receive events and dispatch them to handlers until the socket closes
    ///
    /// Blocks the calling thread. Handlers run synchronously, in arrival
    /// order. Events without a registered handler are skipped. The
    /// connection is closed when this returns.
    ///
    /// # Errors
    ///
    /// Returns `Ok(())` when dwm closes the socket. Returns
    /// `IpcError::InvalidOperation` if not subscribed or no handler is
    /// registered. Any other failure ends the loop and is returned,
    /// including `HeaderError::UnexpectedType` for a non-EVENT packet.
    pub fn listen(&mut self) -> Result<()> {
        const OPERATION: &str = "listen";

        self.require(OPERATION, &[ConnectionState::Subscribed])?;

        if self.handlers.is_empty() {
            return Err(IpcError::invalid(OPERATION, "no event handlers registered"));
        }

        self.state = ConnectionState::Listening;
        debug!(subscriptions = ?self.subscriptions, "Listening for dwm events");

        let err = loop {
            let next = match self.pending.pop_front() {
                Some(packet) => Ok(packet),
                None => self.read_event_packet(),
            };

            if let Err(e) = next.and_then(|packet| self.dispatch(&packet)) {
                break e;
            }
        };

        self.close();

        match err {
            IpcError::SocketClosed => {
                info!("dwm closed the event connection");
                Ok(())
            }
            e => Err(e),
        }
    }

    /// Dispatch at most one event without blocking when none is waiting
    ///
    /// Returns the kind of the dispatched event.
    ///
    /// # Errors
    ///
    /// Returns `IpcError::NoMsg` if no event is waiting; the connection stays
    /// subscribed. Fatal failures close the connection as in `listen`.
    pub fn poll_event(&mut self) -> Result<Event> {
        self.require("poll for events", &[ConnectionState::Subscribed])?;

        let packet = match self.pending.pop_front() {
            Some(packet) => packet,
            None => {
                let packet = self.try_read_packet().map_err(|e| self.fail(e))?;
                self.expect_event(packet).map_err(|e| self.fail(e))?
            }
        };

        let payload = EventPayload::decode(&packet.payload)?;
        let event = payload.event();
        self.invoke(&payload);
        Ok(event)
    }

    /// Release the socket
    ///
    /// Idempotent. Every later operation fails with
    /// `IpcError::InvalidOperation`.
    pub fn close(&mut self) {
        if let Some(transport) = self.transport.take() {
            if let Err(e) = transport.shutdown() {
                // The peer may already be gone
                debug!(error = %e, "Shutdown of dwm socket failed");
            }
            debug!("Closed dwm IPC connection");
        }

        self.pending.clear();
        self.state = ConnectionState::Closed;
    }

    // ------------------------------------------------------------------------
    // Protocol internals
    // ------------------------------------------------------------------------

    fn require(&self, operation: &'static str, allowed: &[ConnectionState]) -> Result<()> {
        if allowed.contains(&self.state) {
            return Ok(());
        }
        Err(IpcError::invalid(
            operation,
            format!("connection is {}", self.state),
        ))
    }

    /// Close the connection if `err` is fatal, then hand it back
    fn fail(&mut self, err: IpcError) -> IpcError {
        if err.is_fatal() {
            warn!(error = %err, "Closing dwm IPC connection");
            self.close();
        }
        err
    }

    /// Write a request and read the packet that answers it
    ///
    /// Restores the state the connection was in before the call unless the
    /// failure was fatal.
    fn exchange<A>(&mut self, message_type: MessageType, args: Option<&A>) -> Result<Packet>
    where
        A: Serialize + ?Sized,
    {
        let request = Packet::build_request(message_type, args)?;
        let resume = self.state;

        self.state = ConnectionState::AwaitingReply;
        match self.exchange_inner(message_type, &request) {
            Ok(reply) => {
                self.state = resume;
                Ok(reply)
            }
            Err(e) if e.is_fatal() => Err(self.fail(e)),
            Err(e) => {
                self.state = resume;
                Err(e)
            }
        }
    }

    fn exchange_inner(&mut self, message_type: MessageType, request: &[u8]) -> Result<Packet> {
        debug!(
            message_type = %message_type,
            payload_len = request.len() - HEADER_SIZE,
            "Sending dwm request"
        );
        write_packet(self.transport_mut()?, request)?;

        loop {
            let max = self.config.max_payload_len;
            let reply = read_packet(self.transport_mut()?, [0; HEADER_SIZE], 0, max)?;

            // Events for earlier subscriptions can overtake a SUBSCRIBE reply
            if reply.header.message_type == MessageType::Event && !self.subscriptions.is_empty() {
                let limit = self.config.max_pending_events;
                if self.pending.len() >= limit {
                    return Err(HeaderError::TooManyPendingEvents { limit }.into());
                }
                trace!(
                    payload_len = reply.header.payload_len,
                    "Queued event received while awaiting reply"
                );
                self.pending.push_back(reply);
                continue;
            }

            debug!(
                message_type = %reply.header.message_type,
                payload_len = reply.header.payload_len,
                "Received dwm reply"
            );
            return Ok(reply);
        }
    }

    fn read_event_packet(&mut self) -> Result<Packet> {
        let max = self.config.max_payload_len;
        let packet = read_packet(self.transport_mut()?, [0; HEADER_SIZE], 0, max)?;
        self.expect_event(packet)
    }

    fn expect_event(&self, packet: Packet) -> Result<Packet> {
        if packet.header.message_type != MessageType::Event {
            return Err(HeaderError::UnexpectedType {
                expected: MessageType::Event,
                actual: packet.header.message_type,
            }
            .into());
        }
        Ok(packet)
    }

    /// Read one packet, failing with `NoMsg` instead of blocking if the
    /// socket has nothing to read
    fn try_read_packet(&mut self) -> Result<Packet> {
        let max = self.config.max_payload_len;
        let transport = self.transport_mut()?;
        let mut header = [0u8; HEADER_SIZE];

        transport
            .set_nonblocking(true)
            .map_err(|e| IpcError::errno("Error setting dwm socket non-blocking", e))?;

        let first = loop {
            match transport.read(&mut header) {
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                other => break other,
            }
        };

        transport
            .set_nonblocking(false)
            .map_err(|e| IpcError::errno("Error setting dwm socket blocking", e))?;

        match first {
            Ok(0) => Err(IpcError::SocketClosed),
            Ok(n) => read_packet(transport, header, n, max),
            Err(e) if e.kind() == ErrorKind::WouldBlock => Err(IpcError::NoMsg),
            Err(e) => Err(IpcError::errno("Error reading header", e)),
        }
    }

    fn dispatch(&mut self, packet: &Packet) -> Result<()> {
        let payload = EventPayload::decode(&packet.payload)?;
        self.invoke(&payload);
        Ok(())
    }

    fn invoke(&mut self, payload: &EventPayload) {
        let event = payload.event();
        match self.handlers.get_mut(&event) {
            Some(handler) => {
                trace!(event = %event, "Dispatching dwm event");
                handler(payload);
            }
            None => trace!(event = %event, "No handler registered, skipping event"),
        }
    }

    fn transport_mut(&mut self) -> Result<&mut T> {
        let state = self.state;
        self.transport
            .as_mut()
            .ok_or_else(|| IpcError::invalid("use socket", format!("connection is {}", state)))
    }
}

/// Write a whole buffer, continuing after partial writes and interruptions
fn write_packet<W: io::Write>(writer: &mut W, bytes: &[u8]) -> Result<()> {
    let mut written = 0;

    while written < bytes.len() {
        match writer.write(&bytes[written..]) {
            Ok(0) => return Err(IpcError::SocketClosed),
            Ok(n) => written += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(IpcError::errno("Error writing packet to dwm socket", e)),
        }
    }

    writer
        .flush()
        .map_err(|e| IpcError::errno("Error flushing dwm socket", e))
}

enum Fill {
    Complete,
    /// The peer closed after this many bytes
    Eof(usize),
}

/// Read until `buf` is full, continuing after short reads and interruptions
fn fill<R: io::Read>(reader: &mut R, buf: &mut [u8], context: &'static str) -> Result<Fill> {
    let mut read = 0;

    while read < buf.len() {
        match reader.read(&mut buf[read..]) {
            Ok(0) => return Ok(Fill::Eof(read)),
            Ok(n) => read += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(IpcError::errno(context, e)),
        }
    }

    Ok(Fill::Complete)
}

/// Read one packet whose first `already` header bytes are in `header`
///
/// The declared length is checked against `max_payload_len` before the
/// payload buffer is allocated.
fn read_packet<R: io::Read>(
    reader: &mut R,
    mut header: [u8; HEADER_SIZE],
    already: usize,
    max_payload_len: u32,
) -> Result<Packet> {
    if let Fill::Eof(read) = fill(reader, &mut header[already..], "Error reading header")? {
        let read = already + read;
        if read == 0 {
            return Err(IpcError::SocketClosed);
        }
        return Err(IpcError::Eof {
            read,
            expected: HEADER_SIZE,
        });
    }

    let header = Header::decode(&header)?;
    header.check_len(max_payload_len)?;

    let expected = header.payload_len as usize;
    let mut payload = vec![0u8; expected];
    if let Fill::Eof(read) = fill(reader, &mut payload, "Error reading payload")? {
        return Err(IpcError::Eof { read, expected });
    }

    trace!(
        message_type = %header.message_type,
        payload_len = expected,
        "Read packet"
    );
    Ok(Packet { header, payload })
}
