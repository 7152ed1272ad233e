//! Prometheus Metrics Module
//!
//! Recording goes through the `metrics` facade and is a no-op until a
//! recorder is installed, so library users pay nothing unless the binary
//! calls [`install_exporter`].
//!
//! # Metrics
//!
//! - `ticker_stream_frames_received_total{kind}`
//! - `ticker_stream_prices_relayed_total`
//! - `ticker_stream_requests_total{outcome}` (sent, queued, dropped)
//! - `ticker_stream_listener_failures_total{channel}`
//! - `ticker_stream_connection_state` (gauge, see [`state_code`])
//! - `ticker_stream_subscriptions` (gauge)

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::OnceLock;

use metrics::{counter, describe_counter, describe_gauge, gauge};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

use crate::domain::streaming::ConnectionState;

static INSTALLED: OnceLock<SocketAddr> = OnceLock::new();

// =============================================================================
// Exporter
// =============================================================================

/// Install the Prometheus recorder with an HTTP listener on `port`.
///
/// Must be called from within a Tokio runtime. Calling it again is a no-op
/// that returns the address of the first listener.
///
/// # Errors
///
/// Returns an error if the recorder or listener cannot be installed.
pub fn install_exporter(port: u16) -> Result<SocketAddr, BuildError> {
    if let Some(addr) = INSTALLED.get() {
        return Ok(*addr);
    }

    let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, port));
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;
    register_metrics();

    Ok(*INSTALLED.get_or_init(|| addr))
}

fn register_metrics() {
    describe_counter!(
        "ticker_stream_frames_received_total",
        "Inbound frames by decoded kind"
    );
    describe_counter!(
        "ticker_stream_prices_relayed_total",
        "Price updates delivered to the event bus"
    );
    describe_counter!(
        "ticker_stream_requests_total",
        "Outbound subscription requests by outcome"
    );
    describe_counter!(
        "ticker_stream_listener_failures_total",
        "Event listeners that returned an error or panicked"
    );
    describe_gauge!(
        "ticker_stream_connection_state",
        "0=closed 1=connecting 2=open 3=authenticated 4=failed"
    );
    describe_gauge!(
        "ticker_stream_subscriptions",
        "Active ticker subscriptions"
    );
}

// =============================================================================
// Recording
// =============================================================================

/// Outcome label for outbound requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestOutcome {
    /// Written to the transport.
    Sent,
    /// Buffered until the transport opens.
    Queued,
    /// Discarded by `close()` or a failed write.
    Dropped,
}

impl RequestOutcome {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Sent => "sent",
            Self::Queued => "queued",
            Self::Dropped => "dropped",
        }
    }
}

/// Numeric gauge value for a connection state.
#[must_use]
pub const fn state_code(state: ConnectionState) -> u8 {
    match state {
        ConnectionState::Closed => 0,
        ConnectionState::Connecting => 1,
        ConnectionState::Open => 2,
        ConnectionState::Authenticated => 3,
        ConnectionState::Failed => 4,
    }
}

/// Record an inbound frame.
pub fn record_frame(kind: &'static str) {
    counter!("ticker_stream_frames_received_total", "kind" => kind).increment(1);
}

/// Record a price update handed to the bus.
pub fn record_price_relayed() {
    counter!("ticker_stream_prices_relayed_total").increment(1);
}

/// Record `count` outbound requests with the given outcome.
pub fn record_requests(outcome: RequestOutcome, count: u64) {
    counter!("ticker_stream_requests_total", "outcome" => outcome.as_str()).increment(count);
}

/// Record a listener failure on `channel`.
pub fn record_listener_failure(channel: &'static str) {
    counter!("ticker_stream_listener_failures_total", "channel" => channel).increment(1);
}

/// Update the connection state gauge.
pub fn set_connection_state(state: ConnectionState) {
    gauge!("ticker_stream_connection_state").set(f64::from(state_code(state)));
}

/// Update the active subscription gauge.
#[allow(clippy::cast_precision_loss)]
pub fn set_subscriptions(count: usize) {
    gauge!("ticker_stream_subscriptions").set(count as f64);
}
