//! Connection Manager
//!
//! Owns the single transport session to the streamer and its lifecycle:
//!
//! ```text
//! Closed --connect()--> Connecting --[transport ready]--> Open
//! Open --AuthOk--> Authenticated
//! Open --AuthFailed--> Failed
//! any --[transport closed | close()]--> Closed
//! ```
//!
//! Each `connect()` that actually opens a transport starts a new attempt.
//! Frames are decoded and dispatched by one reader task per attempt; a task
//! whose attempt has been superseded stops dispatching. `close` is emitted
//! exactly once per attempt.
//!
//! Requests sent while the transport is not writable are queued and flushed
//! in FIFO order at the transition to `Open`, under the same lock that flips
//! the state.
//!
//! Dispatch and `close` emission are serialized by a re-entrant guard: once
//! `close()` has emitted, no frame from the closed attempt reaches a
//! listener. Listeners may call back into the manager, `close()` included.

use std::collections::VecDeque;
use std::sync::Arc;

use chrono::Utc;
use parking_lot::{Mutex, ReentrantMutex};
use tokio::sync::mpsc;

use super::auth::{AuthError, CredentialStore, authenticated_url};
use super::codec::{CodecError, StreamCodec};
use crate::application::ports::{
    InboundFrame, OutboundFrame, RequestSink, StreamConnector, TransportError,
};
use crate::domain::streaming::{
    ConnectionState, ConnectionStats, OutboundRequest, ProtocolEvent, RateLimitKind,
    SubscriptionErrorKind,
};
use crate::infrastructure::broadcast::SharedEventBus;
use crate::infrastructure::metrics::{self, RequestOutcome};

// =============================================================================
// Error Type
// =============================================================================

/// Errors returned by the connection manager.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    /// The streamer URL could not be built.
    #[error(transparent)]
    Endpoint(#[from] AuthError),

    /// The transport could not be opened.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The request could not be serialized.
    #[error(transparent)]
    Codec(#[from] CodecError),
}

/// What happened to a request passed to [`ConnectionManager::send`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// Written to the live transport.
    Sent,
    /// Buffered until the next transport open.
    Queued,
    /// The transport went away mid-write. The request was not delivered.
    Dropped,
}

// =============================================================================
// Shared State
// =============================================================================

#[derive(Debug, Default)]
struct Inner {
    state: ConnectionState,
    attempt: u64,
    session: Option<mpsc::UnboundedSender<OutboundFrame>>,
    pending: VecDeque<String>,
    initialized: bool,
    close_emitted: bool,
    stats: ConnectionStats,
}

impl Inner {
    fn transition(&mut self, next: ConnectionState) {
        if self.state != next {
            tracing::debug!(
                from = self.state.as_str(),
                to = next.as_str(),
                attempt = self.attempt,
                "Connection state changed"
            );
            self.state = next;
            metrics::set_connection_state(next);
        }
    }

    /// Close the current session, if any. Returns `true` when the caller
    /// must emit `close` for the current attempt.
    fn shut_session(&mut self) -> bool {
        if let Some(tx) = self.session.take() {
            let _ = tx.send(OutboundFrame::Close);
        }
        let was_closed = self.state == ConnectionState::Closed;
        self.transition(ConnectionState::Closed);
        let emit = !self.close_emitted && !was_closed;
        self.close_emitted = true;
        emit
    }
}

#[derive(Debug)]
struct Shared {
    inner: Mutex<Inner>,
    /// Held across the attempt check and listener delivery, and across
    /// `close` emission. Always taken before `inner`.
    dispatch: ReentrantMutex<()>,
    codec: StreamCodec,
    bus: SharedEventBus,
}

// =============================================================================
// Connection Manager
// =============================================================================

/// Streamer connection manager.
pub struct ConnectionManager {
    connector: Arc<dyn StreamConnector>,
    credentials: CredentialStore,
    endpoint: String,
    shared: Arc<Shared>,
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("endpoint", &self.endpoint)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl ConnectionManager {
    /// Create a manager. Nothing is opened until [`connect`](Self::connect).
    #[must_use]
    pub fn new(
        connector: Arc<dyn StreamConnector>,
        credentials: CredentialStore,
        endpoint: impl Into<String>,
        bus: SharedEventBus,
    ) -> Self {
        Self {
            connector,
            credentials,
            endpoint: endpoint.into(),
            shared: Arc::new(Shared {
                inner: Mutex::new(Inner::default()),
                dispatch: ReentrantMutex::new(()),
                codec: StreamCodec::new(),
                bus,
            }),
        }
    }

    /// Open a transport session using the current credential.
    ///
    /// A no-op while `Connecting`, `Open` or `Authenticated`. From `Failed`
    /// the rejected session is torn down first. Queued requests survive and
    /// are flushed once the new transport opens.
    ///
    /// `Ok` means the attempt did not fail. If [`close`](Self::close) lands
    /// while the transport is opening, the new session is shut and the
    /// manager stays `Closed`.
    ///
    /// # Errors
    ///
    /// Returns an error if the endpoint URL is invalid (no attempt is
    /// started) or the transport fails to open (the attempt is closed and
    /// `close` is emitted).
    pub async fn connect(&self) -> Result<(), ConnectionError> {
        let (attempt, url) = {
            let _dispatch = self.shared.dispatch.lock();
            let mut inner = self.shared.inner.lock();
            inner.initialized = true;

            if inner.state.is_live() {
                tracing::debug!(
                    state = inner.state.as_str(),
                    "connect() ignored, connection already in progress"
                );
                return Ok(());
            }

            let url = match authenticated_url(&self.endpoint, &self.credentials.get()) {
                Ok(url) => url,
                Err(e) => {
                    tracing::error!(endpoint = %self.endpoint, error = %e, "Invalid streamer endpoint");
                    inner.stats.last_error = Some(e.to_string());
                    return Err(e.into());
                }
            };

            let closed_previous = inner.state == ConnectionState::Failed && inner.shut_session();

            inner.attempt += 1;
            inner.close_emitted = false;
            inner.stats.connect_attempts += 1;
            inner.transition(ConnectionState::Connecting);
            tracing::info!(
                endpoint = %self.endpoint,
                attempt = inner.attempt,
                queued = inner.pending.len(),
                "Connecting to streamer"
            );
            let attempt = inner.attempt;
            drop(inner);

            if closed_previous {
                self.shared.bus.emit_close();
            }
            (attempt, url)
        };

        match self.connector.open(url.as_str()).await {
            Ok(session) => {
                let flushed = {
                    let mut inner = self.shared.inner.lock();
                    if inner.attempt != attempt {
                        tracing::debug!(
                            attempt,
                            state = inner.state.as_str(),
                            "Transport opened after close(), session discarded"
                        );
                        let _ = session.outbound.send(OutboundFrame::Close);
                        return Ok(());
                    }

                    inner.transition(ConnectionState::Open);
                    let flushed = flush_pending(&mut inner, &session.outbound);
                    inner.session = Some(session.outbound);
                    flushed
                };

                tracing::info!(attempt, flushed, "Transport open");
                tokio::spawn(read_loop(Arc::clone(&self.shared), attempt, session.inbound));
                Ok(())
            }
            Err(e) => {
                tracing::error!(attempt, error = %e, "Transport open failed");

                let _dispatch = self.shared.dispatch.lock();
                let emit = {
                    let mut inner = self.shared.inner.lock();
                    if inner.attempt == attempt {
                        inner.stats.last_error = Some(e.to_string());
                        inner.shut_session()
                    } else {
                        false
                    }
                };
                if emit {
                    self.shared.bus.emit_close();
                }
                Err(e.into())
            }
        }
    }

    /// Serialize and send `request`, or queue it until the transport opens.
    ///
    /// # Errors
    ///
    /// Returns an error if the request cannot be serialized.
    pub fn send(&self, request: &OutboundRequest) -> Result<SendOutcome, ConnectionError> {
        let text = self.shared.codec.serialize(request)?;
        let mut guard = self.shared.inner.lock();
        let inner = &mut *guard;

        if inner.state.is_writable() {
            if let Some(tx) = &inner.session {
                return Ok(if tx.send(OutboundFrame::Text(text)).is_ok() {
                    inner.stats.requests_sent += 1;
                    metrics::record_requests(RequestOutcome::Sent, 1);
                    tracing::debug!(action = request.action(), subs = ?request.subs(), "Request sent");
                    SendOutcome::Sent
                } else {
                    metrics::record_requests(RequestOutcome::Dropped, 1);
                    tracing::warn!(action = request.action(), "Transport gone, request dropped");
                    SendOutcome::Dropped
                });
            }
        }

        inner.pending.push_back(text);
        metrics::record_requests(RequestOutcome::Queued, 1);
        tracing::debug!(
            action = request.action(),
            subs = ?request.subs(),
            queued = inner.pending.len(),
            "Request queued until transport opens"
        );
        Ok(SendOutcome::Queued)
    }

    /// Tear down the session.
    ///
    /// Emits `close` unless this attempt already did, stops dispatching
    /// frames from the session and discards queued requests.
    pub fn close(&self) {
        let _dispatch = self.shared.dispatch.lock();
        let (emit, dropped) = {
            let mut inner = self.shared.inner.lock();
            let emit = inner.shut_session();
            inner.attempt += 1;
            let dropped = inner.pending.len();
            inner.pending.clear();
            (emit, dropped)
        };

        if dropped > 0 {
            metrics::record_requests(RequestOutcome::Dropped, dropped as u64);
            tracing::warn!(dropped, "Queued requests discarded on close");
        }
        tracing::info!("Connection closed by client");
        if emit {
            self.shared.bus.emit_close();
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.shared.inner.lock().state
    }

    /// Snapshot of counters.
    #[must_use]
    pub fn stats(&self) -> ConnectionStats {
        let inner = self.shared.inner.lock();
        ConnectionStats {
            state: inner.state,
            requests_queued: inner.pending.len(),
            ..inner.stats.clone()
        }
    }

    /// Whether `connect()` has been called at least once.
    #[must_use]
    pub fn has_initialized(&self) -> bool {
        self.shared.inner.lock().initialized
    }
}

impl RequestSink for ConnectionManager {
    fn has_initialized(&self) -> bool {
        Self::has_initialized(self)
    }

    fn submit(&self, request: OutboundRequest) {
        if let Err(e) = self.send(&request) {
            tracing::error!(action = request.action(), error = %e, "Request could not be sent");
        }
    }
}

/// Write every queued request to `tx`, each exactly once.
fn flush_pending(inner: &mut Inner, tx: &mpsc::UnboundedSender<OutboundFrame>) -> usize {
    let mut sent = 0_usize;
    let mut dropped = 0_usize;
    for text in inner.pending.drain(..) {
        if tx.send(OutboundFrame::Text(text)).is_ok() {
            sent += 1;
        } else {
            dropped += 1;
        }
    }
    inner.stats.requests_sent += sent as u64;
    metrics::record_requests(RequestOutcome::Sent, sent as u64);
    if dropped > 0 {
        metrics::record_requests(RequestOutcome::Dropped, dropped as u64);
        tracing::warn!(dropped, "Transport closed during flush");
    }
    sent
}

// =============================================================================
// Reader Task
// =============================================================================

async fn read_loop(shared: Arc<Shared>, attempt: u64, mut inbound: mpsc::Receiver<InboundFrame>) {
    let mut reason = None;
    while let Some(frame) = inbound.recv().await {
        match frame {
            InboundFrame::Text(text) => {
                if !shared.handle_text(attempt, &text) {
                    return;
                }
            }
            InboundFrame::Closed { reason: r } => {
                reason = r;
                break;
            }
        }
    }
    shared.finish_attempt(attempt, reason);
}

impl Shared {
    /// Decode and dispatch one frame. Returns `false` once `attempt` is
    /// superseded.
    fn handle_text(&self, attempt: u64, text: &str) -> bool {
        let event = self.codec.decode(text);
        metrics::record_frame(event.kind());

        let _dispatch = self.dispatch.lock();
        {
            let mut inner = self.inner.lock();
            if inner.attempt != attempt {
                return false;
            }
            inner.stats.frames_received += 1;
            inner.stats.last_frame_at = Some(Utc::now());

            match &event {
                ProtocolEvent::AuthOk if inner.state == ConnectionState::Open => {
                    inner.transition(ConnectionState::Authenticated);
                }
                ProtocolEvent::AuthFailed { reason } => {
                    inner.stats.last_error = reason.clone();
                    inner.transition(ConnectionState::Failed);
                }
                ProtocolEvent::PriceUpdate(_) => inner.stats.prices_relayed += 1,
                _ => {}
            }
        }

        self.dispatch(event);
        true
    }

    fn dispatch(&self, event: ProtocolEvent) {
        match event {
            ProtocolEvent::AuthOk => {
                tracing::info!("Streamer accepted credential");
                self.bus.emit_connection(true);
            }
            ProtocolEvent::AuthFailed { reason } => {
                tracing::warn!(reason = reason.as_deref(), "Streamer rejected credential");
                self.bus.emit_connection(false);
            }
            ProtocolEvent::RateLimited {
                kind: RateLimitKind::TooManySockets,
                reason,
                ..
            } => {
                tracing::info!(
                    reason = reason.as_deref(),
                    "Another socket is open for this credential"
                );
            }
            ProtocolEvent::RateLimited {
                kind: RateLimitKind::Generic,
                reason,
                raw,
            } => {
                tracing::warn!(reason = reason.as_deref(), raw = %raw, "Rate limited by streamer");
            }
            ProtocolEvent::SubscriptionError {
                kind: SubscriptionErrorKind::InvalidSubscription,
                reason,
                parameter,
                ..
            } => {
                tracing::warn!(
                    reason = reason.as_deref(),
                    parameter = parameter.as_deref(),
                    "Subscription rejected"
                );
            }
            ProtocolEvent::SubscriptionError {
                kind: SubscriptionErrorKind::Other,
                reason,
                raw,
                ..
            } => {
                tracing::error!(reason = reason.as_deref(), raw = %raw, "Streamer error");
            }
            ProtocolEvent::PriceUpdate(tick) => {
                tracing::trace!(symbol = %tick.symbol, price = %tick.price, "Price update");
                metrics::record_price_relayed();
                self.bus.emit_price(&tick);
            }
            ProtocolEvent::Unchanged { symbol } => {
                tracing::trace!(symbol = symbol.as_deref(), "Tick without price");
            }
            ProtocolEvent::Unrecognized { raw } => {
                tracing::debug!(raw = %raw, "Unrecognized frame");
            }
        }
    }

    fn finish_attempt(&self, attempt: u64, reason: Option<String>) {
        let _dispatch = self.dispatch.lock();
        let emit = {
            let mut inner = self.inner.lock();
            if inner.attempt != attempt {
                return;
            }
            if reason.is_some() {
                inner.stats.last_error.clone_from(&reason);
            }
            inner.shut_session()
        };

        tracing::info!(attempt, reason = reason.as_deref(), "Transport closed");
        if emit {
            self.bus.emit_close();
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
