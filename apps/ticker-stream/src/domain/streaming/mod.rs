//! Market Data Streaming Types
//!
//! Codec-agnostic types that flow between the connection manager, the
//! protocol codec and event consumers.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

// =============================================================================
// Connection State
// =============================================================================

/// Lifecycle state of the streaming connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// No transport session.
    #[default]
    Closed,
    /// Transport open requested, not yet writable.
    Connecting,
    /// Transport writable, server has not acknowledged the credential yet.
    Open,
    /// Server accepted the credential.
    Authenticated,
    /// Server rejected the credential. The session stays open until closed.
    Failed,
}

impl ConnectionState {
    /// Whether a `connect()` call in this state should be ignored.
    #[must_use]
    pub const fn is_live(self) -> bool {
        matches!(self, Self::Connecting | Self::Open | Self::Authenticated)
    }

    /// Whether outbound requests can be written immediately.
    #[must_use]
    pub const fn is_writable(self) -> bool {
        matches!(self, Self::Open | Self::Authenticated | Self::Failed)
    }

    /// State name for logs and metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::Authenticated => "authenticated",
            Self::Failed => "failed",
        }
    }
}

/// Point-in-time view of a connection manager's counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionStats {
    /// Current lifecycle state.
    pub state: ConnectionState,
    /// `connect()` calls that started a transport open.
    pub connect_attempts: u64,
    /// Inbound frames decoded on the current and past sessions.
    pub frames_received: u64,
    /// Price updates handed to the event bus.
    pub prices_relayed: u64,
    /// Requests written to a transport.
    pub requests_sent: u64,
    /// Requests currently waiting for the transport to open.
    pub requests_queued: usize,
    /// Most recent transport or authentication error.
    pub last_error: Option<String>,
    /// Arrival time of the most recent frame.
    pub last_frame_at: Option<DateTime<Utc>>,
}

// =============================================================================
// Price Data
// =============================================================================

/// A relayed price update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceTick {
    /// Base symbol, e.g. `BTC`.
    pub symbol: String,
    /// Latest aggregate price in the quote currency.
    pub price: Decimal,
}

/// Notification delivered to event consumers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// Authentication outcome for the current session.
    Connection {
        /// `true` when the credential was accepted.
        authenticated: bool,
    },
    /// New price for a subscribed ticker.
    Price(PriceTick),
    /// The transport session ended.
    Close,
}

// =============================================================================
// Protocol Events
// =============================================================================

/// Flavour of a rate-limit frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitKind {
    /// Another socket is already open for this credential. Informational.
    TooManySockets,
    /// Any other rate limit.
    Generic,
}

/// Flavour of a subscription error frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionErrorKind {
    /// The subscription identifier was rejected (`INVALID_SUB`,
    /// `SUBSCRIPTION_UNRECOGNIZED`).
    InvalidSubscription,
    /// Any other server error, reported with the raw frame.
    Other,
}

/// A typed event decoded from one inbound frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtocolEvent {
    /// Welcome / login acknowledgement.
    AuthOk,
    /// Credential rejected.
    AuthFailed {
        /// Server supplied reason.
        reason: Option<String>,
    },
    /// The server is throttling this client.
    RateLimited {
        /// Which rate limit was hit.
        kind: RateLimitKind,
        /// Server supplied reason.
        reason: Option<String>,
        /// Raw frame text.
        raw: String,
    },
    /// A subscription request was refused.
    SubscriptionError {
        /// Which error was reported.
        kind: SubscriptionErrorKind,
        /// Server supplied reason.
        reason: Option<String>,
        /// Offending subscription parameter.
        parameter: Option<String>,
        /// Raw frame text.
        raw: String,
    },
    /// Aggregate ticker frame carrying a price.
    PriceUpdate(PriceTick),
    /// Aggregate ticker frame with no new price. Dropped silently.
    Unchanged {
        /// Symbol from the frame, if any.
        symbol: Option<String>,
    },
    /// Anything else.
    Unrecognized {
        /// Raw frame text.
        raw: String,
    },
}

impl ProtocolEvent {
    /// Short label used for metrics and logs.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::AuthOk => "auth_ok",
            Self::AuthFailed { .. } => "auth_failed",
            Self::RateLimited { .. } => "rate_limited",
            Self::SubscriptionError { .. } => "subscription_error",
            Self::PriceUpdate(_) => "price_update",
            Self::Unchanged { .. } => "unchanged",
            Self::Unrecognized { .. } => "unrecognized",
        }
    }
}

// =============================================================================
// Outbound Requests
// =============================================================================

/// Request written to the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundRequest {
    /// Start receiving the listed subscription identifiers.
    SubscribeAdd {
        /// Wire subscription identifiers.
        subs: Vec<String>,
    },
    /// Stop receiving the listed subscription identifiers.
    SubscribeRemove {
        /// Wire subscription identifiers.
        subs: Vec<String>,
    },
}

impl OutboundRequest {
    /// Wire `action` value.
    #[must_use]
    pub const fn action(&self) -> &'static str {
        match self {
            Self::SubscribeAdd { .. } => "SubAdd",
            Self::SubscribeRemove { .. } => "SubRemove",
        }
    }

    /// Subscription identifiers carried by the request.
    #[must_use]
    pub fn subs(&self) -> &[String] {
        match self {
            Self::SubscribeAdd { subs } | Self::SubscribeRemove { subs } => subs,
        }
    }
}
