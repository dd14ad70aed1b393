//! Socket lifecycle: connect, pump frames, report status, reconnect.
//!
//! ## Design
//! - One [`ConnectionManager`] task per page session owns the socket. It is
//!   the only place a connection attempt starts, so at most one is live or
//!   pending at any time.
//! - Inbound text frames and status changes flow out through an
//!   `mpsc` channel of [`ConnectionEvent`]s, consumed by the client's
//!   dispatch loop in delivery order.
//! - Outbound frames flow in through a [`ConnectionHandle`], which also
//!   exposes the current [`ConnectionState`] via a `watch` channel.
//! - Reconnect timing lives in the pure [`ConnectionTracker`] so the policy is
//!   testable without a socket.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{debug, error, info, warn};

use crate::error::{ClientError, Result};
use crate::view::{Severity, Status};

// ---------------------------------------------------------------------------
// State and policy
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Open,
    Closed,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionState::Connecting => write!(f, "connecting"),
            ConnectionState::Open => write!(f, "open"),
            ConnectionState::Closed => write!(f, "closed"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectPolicy {
    /// Retry forever after the same delay.
    Fixed { delay: Duration },
    /// `min(base * 2^attempt, max_delay)`, abandoned after `max_attempts`.
    Exponential {
        base: Duration,
        max_delay: Duration,
        max_attempts: u32,
    },
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        ReconnectPolicy::Fixed {
            delay: Duration::from_secs(5),
        }
    }
}

impl ReconnectPolicy {
    /// Delay before reconnect attempt `attempt` (0-based), or `None` once the
    /// policy has given up.
    pub fn delay_for(&self, attempt: u32) -> Option<Duration> {
        match *self {
            ReconnectPolicy::Fixed { delay } => Some(delay),
            ReconnectPolicy::Exponential {
                base,
                max_delay,
                max_attempts,
            } => {
                if attempt >= max_attempts {
                    return None;
                }
                let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
                Some(base.saturating_mul(factor).min(max_delay))
            }
        }
    }
}

/// What to do after the socket closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconnect {
    After(Duration),
    GiveUp,
}

/// Pure connection bookkeeping: state, attempt counter, policy.
#[derive(Debug, Clone)]
pub struct ConnectionTracker {
    policy: ReconnectPolicy,
    state: ConnectionState,
    attempt: u32,
    gave_up: bool,
}

impl ConnectionTracker {
    pub fn new(policy: ReconnectPolicy) -> Self {
        Self {
            policy,
            state: ConnectionState::Closed,
            attempt: 0,
            gave_up: false,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn gave_up(&self) -> bool {
        self.gave_up
    }

    /// Start a connection attempt. Refused while one is pending or open, and
    /// after the policy gave up.
    pub fn begin_connect(&mut self) -> bool {
        if self.gave_up || self.state != ConnectionState::Closed {
            return false;
        }
        self.state = ConnectionState::Connecting;
        true
    }

    pub fn on_open(&mut self) {
        self.state = ConnectionState::Open;
        self.attempt = 0;
    }

    /// Record a close (or failed attempt) and decide on the next attempt.
    pub fn on_close(&mut self) -> Reconnect {
        self.state = ConnectionState::Closed;
        match self.policy.delay_for(self.attempt) {
            Some(delay) => {
                self.attempt = self.attempt.saturating_add(1);
                Reconnect::After(delay)
            }
            None => {
                self.gave_up = true;
                Reconnect::GiveUp
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Events and handle
// ---------------------------------------------------------------------------

/// Output of the connection task, in socket delivery order.
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionEvent {
    Status(Status),
    Opened,
    Frame(String),
    Closed,
    /// Reconnection abandoned; the session needs a reload.
    GaveUp,
}

pub const STATUS_CONNECTING: &str = "connecting...";
pub const STATUS_CONNECTED: &str = "connected";
pub const STATUS_RECONNECTING: &str = "Disconnected from the server. Reconnecting...";
pub const STATUS_SOCKET_ERROR: &str = "WebSocket Error";
pub const STATUS_GAVE_UP: &str = "Unable to reconnect to the server. Reload to try again.";

/// Where outbound frames go.
pub trait FrameSink {
    fn state(&self) -> ConnectionState;

    /// Queue one text frame.
    ///
    /// # Errors
    /// `NotConnected` unless the state is `Open`.
    fn send_frame(&self, frame: String) -> Result<()>;
}

/// Cloneable sender side of a running [`ConnectionManager`].
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    state: watch::Receiver<ConnectionState>,
    outbound: mpsc::UnboundedSender<String>,
}

impl FrameSink for ConnectionHandle {
    fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    fn send_frame(&self, frame: String) -> Result<()> {
        let state = self.state();
        if state != ConnectionState::Open {
            return Err(ClientError::NotConnected { state });
        }
        self.outbound
            .send(frame)
            .map_err(|_| ClientError::ChannelClosed("outbound"))
    }
}

// ---------------------------------------------------------------------------
// Manager task
// ---------------------------------------------------------------------------

enum PumpEnd {
    Closed,
    Shutdown,
}

pub struct ConnectionManager {
    endpoint: String,
    tracker: ConnectionTracker,
    state_tx: watch::Sender<ConnectionState>,
    outbound_rx: mpsc::UnboundedReceiver<String>,
    events: mpsc::UnboundedSender<ConnectionEvent>,
    shutdown: watch::Receiver<bool>,
}

impl ConnectionManager {
    /// Build a manager and its handle. Nothing connects until [`run`](Self::run).
    pub fn new(
        endpoint: impl Into<String>,
        policy: ReconnectPolicy,
        events: mpsc::UnboundedSender<ConnectionEvent>,
        shutdown: watch::Receiver<bool>,
    ) -> (Self, ConnectionHandle) {
        let (state_tx, state_rx) = watch::channel(ConnectionState::Closed);
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let manager = Self {
            endpoint: endpoint.into(),
            tracker: ConnectionTracker::new(policy),
            state_tx,
            outbound_rx,
            events,
            shutdown,
        };
        let handle = ConnectionHandle {
            state: state_rx,
            outbound: outbound_tx,
        };
        (manager, handle)
    }

    /// Spawn [`run`](Self::run) on the current runtime.
    pub fn spawn(
        endpoint: impl Into<String>,
        policy: ReconnectPolicy,
        events: mpsc::UnboundedSender<ConnectionEvent>,
        shutdown: watch::Receiver<bool>,
    ) -> (ConnectionHandle, tokio::task::JoinHandle<()>) {
        let (manager, handle) = Self::new(endpoint, policy, events, shutdown);
        (handle, tokio::spawn(manager.run()))
    }

    fn publish(&mut self, state: ConnectionState) {
        self.state_tx.send_replace(state);
    }

    /// Emit an event; `false` once the consumer is gone.
    fn emit(&self, event: ConnectionEvent) -> bool {
        self.events.send(event).is_ok()
    }

    fn status(&self, message: &str, severity: Severity) -> bool {
        self.emit(ConnectionEvent::Status(Status::new(message, severity)))
    }

    fn is_shutdown(&self) -> bool {
        *self.shutdown.borrow() || self.shutdown.has_changed().is_err()
    }

    /// Connect, pump, and reconnect until shutdown or the policy gives up.
    pub async fn run(mut self) {
        info!(endpoint = %self.endpoint, "connection manager started");
        loop {
            if self.is_shutdown() || !self.tracker.begin_connect() {
                break;
            }
            self.publish(ConnectionState::Connecting);
            if !self.status(STATUS_CONNECTING, Severity::Progress) {
                break;
            }

            let attempt = tokio::select! {
                result = tokio_tungstenite::connect_async(self.endpoint.as_str()) => result,
                _ = self.shutdown.changed() => break,
            };

            match attempt {
                Ok((ws, _response)) => {
                    self.tracker.on_open();
                    self.publish(ConnectionState::Open);
                    info!(endpoint = %self.endpoint, "socket open");
                    if !self.status(STATUS_CONNECTED, Severity::Success)
                        || !self.emit(ConnectionEvent::Opened)
                    {
                        break;
                    }
                    if let PumpEnd::Shutdown = self.pump(ws).await {
                        break;
                    }
                }
                Err(e) => {
                    warn!(endpoint = %self.endpoint, error = %e, "connect failed");
                    if !self.status(STATUS_SOCKET_ERROR, Severity::Danger) {
                        break;
                    }
                }
            }

            let next = self.tracker.on_close();
            self.publish(ConnectionState::Closed);
            if !self.emit(ConnectionEvent::Closed) {
                break;
            }
            match next {
                Reconnect::After(delay) => {
                    info!(
                        attempt = self.tracker.attempt(),
                        delay_ms = delay.as_millis() as u64,
                        "reconnect scheduled"
                    );
                    if !self.status(STATUS_RECONNECTING, Severity::Danger) {
                        break;
                    }
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = self.shutdown.changed() => break,
                    }
                }
                Reconnect::GiveUp => {
                    error!(
                        endpoint = %self.endpoint,
                        attempts = self.tracker.attempt(),
                        "reconnect attempts exhausted"
                    );
                    self.status(STATUS_GAVE_UP, Severity::Danger);
                    self.emit(ConnectionEvent::GaveUp);
                    break;
                }
            }
        }
        self.publish(ConnectionState::Closed);
        debug!("connection manager stopped");
    }

    async fn pump(
        &mut self,
        ws: tokio_tungstenite::WebSocketStream<
            tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
        >,
    ) -> PumpEnd {
        let (mut sink, mut stream) = ws.split();
        loop {
            tokio::select! {
                frame = self.outbound_rx.recv() => match frame {
                    Some(text) => {
                        debug!(bytes = text.len(), "frame out");
                        if let Err(e) = sink.send(WsMessage::Text(text)).await {
                            warn!(error = %e, "send failed");
                            self.status(STATUS_SOCKET_ERROR, Severity::Danger);
                            return PumpEnd::Closed;
                        }
                    }
                    None => {
                        let _ = sink.send(WsMessage::Close(None)).await;
                        return PumpEnd::Shutdown;
                    }
                },
                msg = stream.next() => match msg {
                    Some(Ok(WsMessage::Text(text))) => {
                        if !self.emit(ConnectionEvent::Frame(text)) {
                            return PumpEnd::Shutdown;
                        }
                    }
                    Some(Ok(WsMessage::Close(frame))) => {
                        info!(?frame, "server closed socket");
                        return PumpEnd::Closed;
                    }
                    Some(Ok(_)) => {} // binary / ping / pong
                    Some(Err(e)) => {
                        warn!(error = %e, "socket error");
                        self.status(STATUS_SOCKET_ERROR, Severity::Danger);
                        return PumpEnd::Closed;
                    }
                    None => return PumpEnd::Closed,
                },
                _ = self.shutdown.changed() => {
                    let _ = sink.send(WsMessage::Close(None)).await;
                    return PumpEnd::Shutdown;
                }
            }
        }
    }
}
