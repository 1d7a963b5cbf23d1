//! Reconnecting, obfuscated connection to one datacenter.
//!
//! A [`Connection`] owns one socket and one reconnect timer. It never blocks
//! and never runs on its own: the reactor calls it back when the socket
//! connects, delivers bytes or drops, and when the timer fires. Everything
//! the orchestrator needs to know is queued as a [`ConnectionEvent`] and
//! drained with [`Connection::poll_event`].
//!
//! # States
//!
//! ```text
//!            connect()                on_connected()
//!   Idle ─────────────────▶ Connecting ─────────────▶ Connected
//!    ▲  ▲                      ▲   │                      │
//!    │  │      timer fires     │   │  on_disconnected()   │
//!    │  │   ┌──────────────────┘   ▼                      │
//!    │  │  Reconnecting ◀──────────┴──────────────────────┘
//!    │  │                (budget left and work to do)
//!    │  └── nothing pending / budget exhausted
//!    └───── suspend_connection_idle(true)
//!
//!   any state ── suspend_connection() ──▶ Suspended ── connect() ──▶ Connecting
//! ```
//!
//! Each attempt picks its obfuscation mode from the active secret and, on the
//! first write, sends a fresh preamble that keys both stream contexts. Inbound
//! bytes are unscrambled, reassembled by the frame decoder and surfaced as
//! events. A stream that stops making sense is torn down and retried with
//! fresh contexts.

use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};

use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::{debug, trace, warn};

use crate::core::{
    AddressFlags, ConfigError, ConnectionDelegate, ConnectionType, Datacenter, DisconnectReason,
    ERROR_HOST_UNREACHABLE, ERROR_NETWORK_UNREACHABLE, NEXT_PORT_AFTER_FAILURES, SecretType,
    Socket, TEST_BACKEND_DC_OFFSET, TLS_STREAM_TAG, Timer, TimerToken,
};
use crate::crypto::{ObfuscatedStream, ObfuscationMode, Preamble, Secret};

use super::backoff::{ExponentialBackoffStrategy, JitterSource};
use super::config::ConnectionConfig;
use super::error::{TransportError, TransportResult};
use super::event::{EventMask, SocketEventHandler, TimerEventHandler};
use super::framing::{FrameDecoder, InboundItem, encode_frame};

/// Source of process-unique connection tokens. Zero is never handed out.
static NEXT_CONNECTION_TOKEN: AtomicU32 = AtomicU32::new(1);

fn next_connection_token() -> u32 {
    loop {
        let token = NEXT_CONNECTION_TOKEN.fetch_add(1, Ordering::Relaxed);
        if token != 0 {
            return token;
        }
    }
}

/// Connection lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// Not connected; connects on demand.
    Idle,
    /// Socket open requested, or open and waiting for the first byte.
    Connecting,
    /// Waiting for the reconnect timer.
    Reconnecting,
    /// Socket connected.
    Connected,
    /// Explicitly suspended by the orchestrator.
    Suspended,
}

impl ConnectionState {
    /// Whether a socket is open (or opening) in this state.
    pub fn is_live(self) -> bool {
        matches!(self, Self::Connecting | Self::Connected)
    }
}

/// Notification for the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// The socket connected.
    Connected {
        /// Token assigned to this link.
        connection_token: u32,
    },
    /// A complete inbound message.
    Frame {
        /// Token of the link it arrived on.
        connection_token: u32,
        /// Message bytes.
        payload: Vec<u8>,
    },
    /// The peer acknowledged receipt of a message early.
    QuickAck {
        /// Acknowledged id.
        ack_id: u32,
    },
    /// The peer answered with a transport error code.
    TransportFailure {
        /// Error code.
        code: i32,
    },
    /// The link went down.
    Closed {
        /// Why the socket closed.
        reason: DisconnectReason,
        /// OS error code, 0 if none.
        error: i32,
        /// Whether a reconnect was scheduled.
        will_reconnect: bool,
    },
    /// Automatic reconnects are exhausted; the connection stays idle.
    ReconnectBudgetExhausted {
        /// Consecutive failed attempts.
        failed_attempts: u32,
    },
}

/// Reconnecting, obfuscated connection. See the [module docs](self).
pub struct Connection {
    datacenter: Rc<dyn Datacenter>,
    connection_type: ConnectionType,
    connection_num: u32,
    socket: Box<dyn Socket>,
    timer: Box<dyn Timer>,
    delegate: Rc<dyn ConnectionDelegate>,
    config: ConnectionConfig,
    backoff: ExponentialBackoffStrategy,
    rng: StdRng,

    state: ConnectionState,
    explicitly_suspended: bool,

    // Per attempt
    mode: ObfuscationMode,
    secret: Option<Secret>,
    stream: Option<ObfuscatedStream>,
    decoder: FrameDecoder,
    first_packet_sent: bool,
    has_some_data_since_last_connect: bool,

    // Retry bookkeeping
    failed_connection_count: u32,
    retry_reconnect_attempt: u32,
    current_timeout: u64,
    timer_token: TimerToken,
    wait_for_reconnect_timer: bool,
    is_trying_next_port: bool,
    force_next_port: bool,

    connection_token: u32,
    was_connected: bool,
    useful_data: bool,
    useful_data_receive_time: Option<Instant>,
    last_activity: Instant,

    events: VecDeque<ConnectionEvent>,
}

impl Connection {
    /// Start building a connection of `connection_type`.
    pub fn builder(connection_type: ConnectionType, connection_num: u32) -> ConnectionBuilder {
        ConnectionBuilder::new(connection_type, connection_num)
    }

    /// Begin connecting.
    ///
    /// No-op while connecting, connected or waiting for the reconnect timer.
    /// Coming from `Idle` or `Suspended`, the retry counters start over.
    pub fn connect(&mut self) {
        if self.wait_for_reconnect_timer || self.state.is_live() {
            trace!(state = ?self.state, "connect ignored");
            return;
        }
        if !self.delegate.is_network_available() {
            debug!(
                conn_type = ?self.connection_type,
                num = self.connection_num,
                "no network, not connecting"
            );
            self.events.push_back(ConnectionEvent::Closed {
                reason: DisconnectReason::Error,
                error: 0,
                will_reconnect: false,
            });
            return;
        }
        if matches!(self.state, ConnectionState::Idle | ConnectionState::Suspended) {
            self.reset_all_retries();
            self.explicitly_suspended = false;
        }
        self.open_socket();
    }

    /// Open the socket for a new attempt without touching the retry counters.
    fn reconnect(&mut self) {
        self.open_socket();
    }

    fn open_socket(&mut self) {
        self.state = ConnectionState::Connecting;

        let flags = self.address_flags();
        if self.force_next_port {
            self.datacenter.next_address_or_port(flags);
            self.is_trying_next_port = true;
            self.force_next_port = false;
        }

        let Some(address) = self.datacenter.current_address(flags) else {
            warn!(
                dc = self.datacenter.id(),
                conn_type = ?self.connection_type,
                "{}",
                TransportError::NoAddress(self.datacenter.id())
            );
            self.state = ConnectionState::Idle;
            self.events.push_back(ConnectionEvent::Closed {
                reason: DisconnectReason::Error,
                error: 0,
                will_reconnect: false,
            });
            return;
        };
        let port = self.datacenter.current_port(flags);

        self.secret = self.active_secret();
        self.mode = ObfuscationMode::select(self.secret.as_ref(), self.config.prefer_abridged);
        self.reset_attempt_state();
        self.last_activity = Instant::now();

        debug!(
            conn_type = ?self.connection_type,
            num = self.connection_num,
            %address,
            port,
            mode = ?self.mode,
            attempt = self.retry_reconnect_attempt,
            "connecting"
        );

        if let Err(err) = self.socket.open(&address, port, flags) {
            warn!(%address, port, error = %err, "socket open failed");
            self.on_disconnected(1, err.raw_os_error().unwrap_or(0));
        }
    }

    /// Suspend the connection until the next [`connect`](Self::connect).
    pub fn suspend_connection(&mut self) {
        self.suspend_connection_idle(false);
    }

    /// Tear the connection down, ending in `Idle` when `idle` is set and in
    /// `Suspended` otherwise.
    ///
    /// Cancels any pending reconnect; requests routed here are untouched.
    pub fn suspend_connection_idle(&mut self, idle: bool) {
        self.cancel_reconnect_timer();

        let was_live = self.state.is_live();
        if was_live {
            self.socket.close();
        }
        self.reset_attempt_state();
        self.connection_token = 0;
        self.explicitly_suspended = !idle;
        self.state = if idle {
            ConnectionState::Idle
        } else {
            ConnectionState::Suspended
        };

        debug!(
            conn_type = ?self.connection_type,
            num = self.connection_num,
            state = ?self.state,
            "connection suspended"
        );

        if was_live {
            self.events.push_back(ConnectionEvent::Closed {
                reason: DisconnectReason::Closed,
                error: 0,
                will_reconnect: false,
            });
        }
    }

    /// Frame, obfuscate and write `buffer`.
    ///
    /// The first write of an attempt is preceded by the preamble (or the TLS
    /// tag). A quick acknowledgment is only requested for `encrypted`
    /// payloads.
    pub fn send_data(
        &mut self,
        buffer: &[u8],
        report_ack: bool,
        encrypted: bool,
    ) -> TransportResult<()> {
        if !self.state.is_live() {
            let err = TransportError::NotWritable(self.state);
            warn!(
                conn_type = ?self.connection_type,
                num = self.connection_num,
                len = buffer.len(),
                "{err}"
            );
            return Err(err);
        }

        let mut frame = encode_frame(self.mode, buffer, report_ack && encrypted, &mut self.rng)?;

        let mut out = Vec::with_capacity(frame.len() + crate::core::PREAMBLE_SIZE);
        if !self.first_packet_sent {
            match self.mode.preamble_tag() {
                Some(tag) => {
                    let dc_id = self.preamble_dc_id();
                    let preamble = Preamble::generate(&mut self.rng, tag, dc_id);
                    let (stream, wire) =
                        ObfuscatedStream::initiate(&preamble, self.secret.as_ref());
                    out.extend_from_slice(&wire);
                    self.stream = Some(stream);
                }
                None => out.extend_from_slice(&TLS_STREAM_TAG),
            }
            self.first_packet_sent = true;
        }

        if let Some(stream) = self.stream.as_mut() {
            stream.encrypt(&mut frame);
        }
        out.extend_from_slice(&frame);

        trace!(len = buffer.len(), wire = out.len(), report_ack, "sending frame");
        self.last_activity = Instant::now();
        if let Err(err) = self.socket.write(&out) {
            // The stream contexts already moved past bytes the peer never saw
            warn!(
                conn_type = ?self.connection_type,
                num = self.connection_num,
                len = out.len(),
                "socket write failed: {err}"
            );
            self.socket.close();
            self.on_disconnected(1, err.raw_os_error().unwrap_or(0));
            return Err(err.into());
        }
        Ok(())
    }

    /// Socket connected.
    pub fn on_connected(&mut self) {
        if self.state != ConnectionState::Connecting {
            trace!(state = ?self.state, "late connect notification ignored");
            return;
        }
        self.state = ConnectionState::Connected;
        self.connection_token = next_connection_token();
        self.failed_connection_count = 0;
        self.was_connected = true;
        self.last_activity = Instant::now();

        debug!(
            conn_type = ?self.connection_type,
            num = self.connection_num,
            token = self.connection_token,
            "connected"
        );
        self.events.push_back(ConnectionEvent::Connected {
            connection_token: self.connection_token,
        });
    }

    /// Socket closed or failed with `reason` and OS `error` code.
    ///
    /// Schedules a reconnect when the budget allows and there is work for
    /// this connection; otherwise settles in `Idle`.
    pub fn on_disconnected(&mut self, reason: i32, error: i32) {
        if !self.state.is_live() || self.wait_for_reconnect_timer {
            trace!(state = ?self.state, reason, error, "disconnect ignored");
            return;
        }

        let reason = DisconnectReason::from(reason);
        let budget_left = self.has_reconnect_budget();
        let network = self.delegate.is_network_available();
        let had_data = self.has_some_data_since_last_connect;

        self.failed_connection_count = self.failed_connection_count.saturating_add(1);
        if (!had_data && self.failed_connection_count >= NEXT_PORT_AFTER_FAILURES)
            || error == ERROR_NETWORK_UNREACHABLE
            || error == ERROR_HOST_UNREACHABLE
        {
            self.force_next_port = true;
        }

        self.reset_attempt_state();
        self.connection_token = 0;

        let will_reconnect = budget_left
            && network
            && (self.connection_type.keeps_alive() || self.has_pending_requests());

        debug!(
            conn_type = ?self.connection_type,
            num = self.connection_num,
            %reason,
            error,
            failed = self.failed_connection_count,
            will_reconnect,
            "disconnected"
        );
        self.events.push_back(ConnectionEvent::Closed {
            reason,
            error,
            will_reconnect,
        });

        if will_reconnect {
            self.state = ConnectionState::Reconnecting;
            self.retry_with_backoff();
            return;
        }

        self.state = ConnectionState::Idle;
        if !budget_left {
            warn!(
                conn_type = ?self.connection_type,
                num = self.connection_num,
                "{}",
                TransportError::ReconnectBudgetExhausted(self.failed_connection_count)
            );
            self.events.push_back(ConnectionEvent::ReconnectBudgetExhausted {
                failed_attempts: self.failed_connection_count,
            });
        }
    }

    /// Bytes arrived from the socket.
    pub fn on_received_data(&mut self, data: &[u8]) {
        if !self.state.is_live() {
            trace!(state = ?self.state, len = data.len(), "data for dead link dropped");
            return;
        }
        self.has_some_data_since_last_connect = true;

        let mut plain = data.to_vec();
        if self.mode.is_obfuscated() {
            match self.stream.as_mut() {
                Some(stream) => stream.decrypt(&mut plain),
                None => {
                    // Nothing was sent, so no keys exist to read this with
                    self.drop_desynchronized(TransportError::InvalidFrameLength(0));
                    return;
                }
            }
        }

        let items = match self.decoder.push(&plain) {
            Ok(items) => items,
            Err(err) => {
                self.drop_desynchronized(err);
                return;
            }
        };

        for item in items {
            if item.is_useful() {
                self.on_useful_frame();
            }
            match item {
                InboundItem::Frame(payload) => {
                    trace!(len = payload.len(), token = self.connection_token, "frame received");
                    self.events.push_back(ConnectionEvent::Frame {
                        connection_token: self.connection_token,
                        payload,
                    });
                }
                InboundItem::QuickAck(ack_id) => {
                    trace!(ack_id, "quick ack");
                    self.events.push_back(ConnectionEvent::QuickAck { ack_id });
                }
                InboundItem::TransportFailure(code) => {
                    warn!(
                        conn_type = ?self.connection_type,
                        num = self.connection_num,
                        code,
                        "transport error from peer"
                    );
                    self.events.push_back(ConnectionEvent::TransportFailure { code });
                }
            }
        }
    }

    /// Reconnect timer fired for the arming identified by `token`.
    pub fn on_reconnect_timer(&mut self, token: TimerToken) {
        if !self.wait_for_reconnect_timer || token != self.timer_token {
            trace!(token = token.0, current = self.timer_token.0, "stale reconnect timer");
            return;
        }
        self.wait_for_reconnect_timer = false;
        if self.state == ConnectionState::Reconnecting {
            self.reconnect();
        }
    }

    /// Suspend a media or file connection that has been quiet for longer
    /// than the idle timeout with nothing pending. Returns whether it did.
    pub fn check_idle(&mut self, now: Instant) -> bool {
        let discardable = matches!(
            self.connection_type,
            ConnectionType::GenericMedia | ConnectionType::Download | ConnectionType::Upload
        );
        if !discardable || !self.state.is_live() || self.has_pending_requests() {
            return false;
        }
        let quiet = now.saturating_duration_since(self.last_activity);
        if quiet < self.config.idle_suspend_timeout {
            return false;
        }
        debug!(
            conn_type = ?self.connection_type,
            num = self.connection_num,
            ?quiet,
            "idle connection discarded"
        );
        self.suspend_connection_idle(true);
        true
    }

    /// Next queued notification.
    pub fn poll_event(&mut self) -> Option<ConnectionEvent> {
        self.events.pop_front()
    }

    /// Whether a message arrived on the current attempt.
    pub fn has_useful_data(&self) -> bool {
        self.useful_data
    }

    /// Mark the current attempt as having carried a message.
    pub fn set_has_useful_data(&mut self) {
        let now = Instant::now();
        self.useful_data = true;
        self.useful_data_receive_time = Some(now);
        self.last_activity = now;
    }

    /// When the last message arrived on the current attempt.
    pub fn useful_data_receive_time(&self) -> Option<Instant> {
        self.useful_data_receive_time
    }

    /// Token of the current link, 0 while not connected.
    pub fn connection_token(&self) -> u32 {
        self.connection_token
    }

    /// Traffic kind.
    pub fn connection_type(&self) -> ConnectionType {
        self.connection_type
    }

    /// Index among connections of the same type.
    pub fn connection_num(&self) -> u32 {
        self.connection_num
    }

    /// Datacenter this connection points at.
    pub fn datacenter(&self) -> &Rc<dyn Datacenter> {
        &self.datacenter
    }

    /// Current state.
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Mode of the current attempt.
    pub fn obfuscation_mode(&self) -> ObfuscationMode {
        self.mode
    }

    /// Whether the connection was suspended explicitly.
    pub fn is_suspended(&self) -> bool {
        self.state == ConnectionState::Suspended
    }

    /// Whether the socket ever connected.
    pub fn was_connected(&self) -> bool {
        self.was_connected
    }

    /// Whether another automatic reconnect would be attempted.
    pub fn can_reconnect(&self) -> bool {
        self.has_reconnect_budget() && self.delegate.is_network_available()
    }

    /// Whether connections of type `ty` are served from the media address.
    pub fn is_media_connection_type(ty: ConnectionType) -> bool {
        ty.is_media()
    }

    /// Whether the framing tolerates padding chosen by the layer above.
    pub fn allows_custom_padding(&self) -> bool {
        matches!(
            self.mode,
            ObfuscationMode::Abridged | ObfuscationMode::PaddedIntermediate | ObfuscationMode::Tls
        )
    }

    /// Whether the orchestrator still routes requests to this type.
    pub fn has_pending_requests(&self) -> bool {
        self.delegate.has_pending_requests(self.connection_type)
    }

    /// Privileged view for the orchestrator.
    pub fn internals(&mut self) -> ConnectionInternals<'_> {
        ConnectionInternals { conn: self }
    }

    fn has_reconnect_budget(&self) -> bool {
        !self.explicitly_suspended
            && self.failed_connection_count < self.config.will_retry_connect_count
    }

    fn retry_with_backoff(&mut self) {
        self.current_timeout = self.backoff.delay_ms(self.retry_reconnect_attempt);
        self.retry_reconnect_attempt = self.retry_reconnect_attempt.saturating_add(1);
        self.timer_token = self.timer_token.next();
        self.timer
            .arm(Duration::from_millis(self.current_timeout), self.timer_token);
        self.wait_for_reconnect_timer = true;
        debug!(
            conn_type = ?self.connection_type,
            num = self.connection_num,
            delay_ms = self.current_timeout,
            attempt = self.retry_reconnect_attempt,
            "reconnect scheduled"
        );
    }

    fn reset_all_retries(&mut self) {
        self.failed_connection_count = 0;
        self.retry_reconnect_attempt = 0;
        self.current_timeout = 0;
    }

    fn cancel_reconnect_timer(&mut self) {
        self.timer.cancel();
        // Invalidate a firing that may already be queued
        self.timer_token = self.timer_token.next();
        self.wait_for_reconnect_timer = false;
    }

    fn reset_attempt_state(&mut self) {
        self.stream = None;
        self.decoder.reset(self.mode);
        self.first_packet_sent = false;
        self.has_some_data_since_last_connect = false;
        self.useful_data = false;
        self.useful_data_receive_time = None;
    }

    fn on_useful_frame(&mut self) {
        if !self.useful_data {
            self.reset_all_retries();
            if self.is_trying_next_port {
                debug!(dc = self.datacenter.id(), "next address works, storing it");
                self.datacenter.store_current_address_and_port();
                self.is_trying_next_port = false;
            }
        }
        self.set_has_useful_data();
    }

    fn drop_desynchronized(&mut self, err: TransportError) {
        warn!(
            conn_type = ?self.connection_type,
            num = self.connection_num,
            buffered = self.decoder.buffered(),
            "stream desynchronized: {err}"
        );
        self.socket.close();
        self.on_disconnected(1, 0);
    }

    fn active_secret(&self) -> Option<Secret> {
        let raw = SecretType::PRECEDENCE
            .iter()
            .find_map(|kind| self.datacenter.secret(*kind))?;
        match Secret::parse(&raw) {
            Ok(secret) => Some(secret),
            Err(err) => {
                warn!(dc = self.datacenter.id(), "ignoring secret: {err}");
                None
            }
        }
    }

    fn address_flags(&self) -> AddressFlags {
        let mut flags = AddressFlags::NONE;
        if self.connection_type.is_media() {
            flags |= AddressFlags::DOWNLOAD;
        }
        if self.connection_type == ConnectionType::Temp {
            flags |= AddressFlags::TEMP;
        }
        if self.config.prefer_ipv6 {
            flags |= AddressFlags::IPV6;
        }
        flags
    }

    fn preamble_dc_id(&self) -> i16 {
        let mut id = self.datacenter.id() as i16;
        if self.datacenter.is_test_backend() {
            id = id.wrapping_add(TEST_BACKEND_DC_OFFSET);
        }
        if self.connection_type.is_media() {
            id = id.wrapping_neg();
        }
        id
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("dc", &self.datacenter.id())
            .field("connection_type", &self.connection_type)
            .field("connection_num", &self.connection_num)
            .field("state", &self.state)
            .field("mode", &self.mode)
            .field("connection_token", &self.connection_token)
            .field("failed_connection_count", &self.failed_connection_count)
            .field("retry_reconnect_attempt", &self.retry_reconnect_attempt)
            .finish_non_exhaustive()
    }
}

impl TimerEventHandler for Connection {
    fn on_timer_event(&mut self, token: TimerToken) {
        self.on_reconnect_timer(token);
    }
}

impl SocketEventHandler for Connection {
    fn on_socket_event(&mut self, mask: EventMask) {
        if mask.contains(EventMask::ERROR) || mask.contains(EventMask::HANGUP) {
            debug!(
                conn_type = ?self.connection_type,
                num = self.connection_num,
                ?mask,
                "socket hung up"
            );
            self.socket.close();
            self.on_disconnected(1, 0);
        } else {
            trace!(?mask, "socket readiness");
        }
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.timer.cancel();
        if self.state.is_live() {
            self.socket.close();
        }
    }
}

/// Orchestrator-only access to a connection's bookkeeping.
#[derive(Debug)]
pub struct ConnectionInternals<'a> {
    conn: &'a mut Connection,
}

impl ConnectionInternals<'_> {
    /// Consecutive failed attempts.
    pub fn failed_connection_count(&self) -> u32 {
        self.conn.failed_connection_count
    }

    /// Index into the backoff curve for the next retry.
    pub fn retry_reconnect_attempt(&self) -> u32 {
        self.conn.retry_reconnect_attempt
    }

    /// Delay of the last scheduled retry, in milliseconds.
    pub fn current_timeout_ms(&self) -> u64 {
        self.conn.current_timeout
    }

    /// Whether a reconnect timer is pending.
    pub fn is_waiting_for_reconnect_timer(&self) -> bool {
        self.conn.wait_for_reconnect_timer
    }

    /// Token of the latest timer arming.
    pub fn timer_token(&self) -> TimerToken {
        self.conn.timer_token
    }

    /// Whether the current attempt probes a different address or port.
    pub fn is_trying_next_port(&self) -> bool {
        self.conn.is_trying_next_port
    }

    /// Whether the next attempt will move to a different address or port.
    pub fn force_next_port(&self) -> bool {
        self.conn.force_next_port
    }

    /// Request (or cancel) an address/port switch on the next attempt.
    pub fn set_force_next_port(&mut self, force: bool) {
        self.conn.force_next_port = force;
    }

    /// Bytes buffered towards an incomplete frame.
    pub fn rest_of_the_data_len(&self) -> usize {
        self.conn.decoder.buffered()
    }

    /// Zero the retry counters.
    pub fn reset_all_retries(&mut self) {
        self.conn.reset_all_retries();
    }

    /// Close the socket and handle it as a failure of the current attempt.
    pub fn force_disconnect(&mut self, reason: i32, error: i32) {
        if self.conn.state.is_live() {
            self.conn.socket.close();
        }
        self.conn.on_disconnected(reason, error);
    }
}

/// Assembles a [`Connection`] from its collaborators.
pub struct ConnectionBuilder {
    connection_type: ConnectionType,
    connection_num: u32,
    datacenter: Option<Rc<dyn Datacenter>>,
    socket: Option<Box<dyn Socket>>,
    timer: Option<Box<dyn Timer>>,
    delegate: Option<Rc<dyn ConnectionDelegate>>,
    config: ConnectionConfig,
    seed: Option<u64>,
}

impl ConnectionBuilder {
    /// Create a builder for a connection of `connection_type`.
    pub fn new(connection_type: ConnectionType, connection_num: u32) -> Self {
        Self {
            connection_type,
            connection_num,
            datacenter: None,
            socket: None,
            timer: None,
            delegate: None,
            config: ConnectionConfig::default(),
            seed: None,
        }
    }

    /// Set the datacenter.
    pub fn datacenter(mut self, datacenter: Rc<dyn Datacenter>) -> Self {
        self.datacenter = Some(datacenter);
        self
    }

    /// Set the socket.
    pub fn socket(mut self, socket: Box<dyn Socket>) -> Self {
        self.socket = Some(socket);
        self
    }

    /// Set the reconnect timer.
    pub fn timer(mut self, timer: Box<dyn Timer>) -> Self {
        self.timer = Some(timer);
        self
    }

    /// Set the orchestrator delegate.
    pub fn delegate(mut self, delegate: Rc<dyn ConnectionDelegate>) -> Self {
        self.delegate = Some(delegate);
        self
    }

    /// Set the configuration.
    pub fn config(mut self, config: ConnectionConfig) -> Self {
        self.config = config;
        self
    }

    /// Seed the preamble and jitter generators for reproducible runs.
    pub fn rng_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Build the connection in `Idle`.
    pub fn build(self) -> Result<Connection, ConfigError> {
        self.config.validate()?;
        let datacenter = self.datacenter.ok_or(ConfigError::Missing("datacenter"))?;
        let socket = self.socket.ok_or(ConfigError::Missing("socket"))?;
        let timer = self.timer.ok_or(ConfigError::Missing("timer"))?;
        let delegate = self.delegate.ok_or(ConfigError::Missing("delegate"))?;

        let backoff_config = &self.config.backoff;
        let (rng, jitter) = match self.seed {
            Some(seed) => (
                StdRng::seed_from_u64(seed),
                JitterSource::with_seed(backoff_config.max_jitter_ms, seed.wrapping_add(1)),
            ),
            None => (
                StdRng::from_entropy(),
                JitterSource::new(backoff_config.max_jitter_ms),
            ),
        };
        let backoff = ExponentialBackoffStrategy::with_jitter(
            backoff_config.initial_delay_ms,
            backoff_config.multiplier,
            backoff_config.max_delay_ms,
            jitter,
        );
        let mode = ObfuscationMode::Intermediate;

        Ok(Connection {
            datacenter,
            connection_type: self.connection_type,
            connection_num: self.connection_num,
            socket,
            timer,
            delegate,
            decoder: FrameDecoder::with_limit(mode, self.config.max_frame_length),
            config: self.config,
            backoff,
            rng,
            state: ConnectionState::Idle,
            explicitly_suspended: false,
            mode,
            secret: None,
            stream: None,
            first_packet_sent: false,
            has_some_data_since_last_connect: false,
            failed_connection_count: 0,
            retry_reconnect_attempt: 0,
            current_timeout: 0,
            timer_token: TimerToken::default(),
            wait_for_reconnect_timer: false,
            is_trying_next_port: false,
            force_next_port: false,
            connection_token: 0,
            was_connected: false,
            useful_data: false,
            useful_data_receive_time: None,
            last_activity: Instant::now(),
            events: VecDeque::new(),
        })
    }
}

impl fmt::Debug for ConnectionBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionBuilder")
            .field("connection_type", &self.connection_type)
            .field("connection_num", &self.connection_num)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
