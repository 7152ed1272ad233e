//! Port Interfaces
//!
//! Contracts between the application and the outside world. Infrastructure
//! adapters implement these; tests substitute in-memory versions.
//!
//! ## Driven Ports (Outbound)
//!
//! - `StreamConnector`: opens a bidirectional text transport
//! - `RequestSink`: accepts outbound subscription requests
//! - `SymbolCatalog`: one-shot lookup of tradable symbols

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::domain::catalog::CatalogEntry;
use crate::domain::streaming::OutboundRequest;

// =============================================================================
// Transport Port
// =============================================================================

/// Frame delivered by the transport to the connection manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundFrame {
    /// One complete text message.
    Text(String),
    /// The session ended. Sent at most once, always last.
    Closed {
        /// Close reason, when the peer supplied one.
        reason: Option<String>,
    },
}

/// Frame written by the connection manager to the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundFrame {
    /// One text message.
    Text(String),
    /// Close the session.
    Close,
}

/// An open transport session.
///
/// Dropping `outbound` also closes the session.
#[derive(Debug)]
pub struct TransportSession {
    /// Writer half.
    pub outbound: mpsc::UnboundedSender<OutboundFrame>,
    /// Reader half, in delivery order.
    pub inbound: mpsc::Receiver<InboundFrame>,
}

/// Transport failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    /// The session could not be opened.
    #[error("transport open failed: {0}")]
    Open(String),
}

/// Opens transport sessions.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StreamConnector: Send + Sync + 'static {
    /// Open a session to `url`. Resolves once the transport is writable.
    async fn open(&self, url: &str) -> Result<TransportSession, TransportError>;
}

// =============================================================================
// Request Port
// =============================================================================

/// Destination for outbound subscription requests.
///
/// Implementations send immediately when the transport is writable and queue
/// otherwise; submission itself never fails from the caller's view.
#[cfg_attr(test, mockall::automock)]
pub trait RequestSink: Send + Sync {
    /// Whether a connection has been requested at least once.
    fn has_initialized(&self) -> bool;

    /// Send or queue `request`.
    fn submit(&self, request: OutboundRequest);
}

// =============================================================================
// Catalog Port
// =============================================================================

/// Symbol catalog fetch failures.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    /// Request could not be sent or the body could not be read.
    #[error("catalog request failed: {0}")]
    Network(String),
    /// Non-success HTTP status.
    #[error("catalog endpoint returned {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body.
        body: String,
    },
    /// Body was not the expected JSON.
    #[error("catalog response malformed: {0}")]
    Parse(String),
}

/// Source of tradable symbols.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SymbolCatalog: Send + Sync {
    /// Fetch the full catalog once. No retry, no caching.
    async fn fetch_symbol_catalog(&self) -> Result<Vec<CatalogEntry>, CatalogError>;
}
