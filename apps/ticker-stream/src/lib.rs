#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::needless_pass_by_value,
        clippy::items_after_statements,
        clippy::cmp_owned
    )
)]

//! Ticker Stream - Live Crypto Price Client
//!
//! Keeps one WebSocket session to the CryptoCompare streamer, tracks the
//! tickers the caller wants, and turns the streamer's compact JSON frames
//! into typed events for in-process listeners.
//!
//! # Layers (inside → outside)
//!
//! - **Domain**: Core streaming logic and data types
//!   - `streaming`: connection state, protocol events, price ticks
//!   - `subscription`: subscription identity and registry
//!   - `catalog`: symbol catalog records
//!
//! - **Application**: Use cases and port definitions
//!   - `ports`: transport, request sink and catalog interfaces
//!   - `services`: subscription management
//!
//! - **Infrastructure**: Adapters and external integrations
//!   - `cryptocompare`: codec, connection manager, WebSocket and REST clients
//!   - `broadcast`: event bus
//!   - `config`, `metrics`, `telemetry`
//!
//! # Data Flow
//!
//! ```text
//!  subscribe()/unsubscribe()           connection / price / close
//!          │                                     ▲
//!          ▼                                     │
//!  SubscriptionService ──► ConnectionManager ──► EventBus ──► listeners
//!                              │      ▲                  └──► broadcast receivers
//!                         SubAdd/Remove  frames
//!                              ▼      │
//!                         CryptoCompare streamer
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Domain layer - Core streaming types with no I/O.
pub mod domain;

/// Application layer - Use cases and port definitions.
pub mod application;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

/// Client facade wiring every component together.
pub mod client;

// =============================================================================
// Re-exports
// =============================================================================

pub use client::StreamClient;

// Domain types
pub use domain::catalog::CatalogEntry;
pub use domain::streaming::{
    ConnectionState, ConnectionStats, OutboundRequest, PriceTick, ProtocolEvent, RateLimitKind,
    StreamEvent, SubscriptionErrorKind,
};
pub use domain::subscription::{Subscription, SubscriptionError};

// Ports (for custom transports and tests)
pub use application::ports::{
    CatalogError, InboundFrame, OutboundFrame, StreamConnector, SymbolCatalog, TransportError,
    TransportSession,
};

// Infrastructure
pub use infrastructure::broadcast::{DeliveryReport, EventBus, EventBusConfig, ListenerId};
pub use infrastructure::config::{ClientConfig, ConfigError};
pub use infrastructure::cryptocompare::{ApiKey, ConnectionError, StreamCodec};

// Metrics
pub use infrastructure::metrics::install_exporter as install_metrics_exporter;

// Telemetry
pub use infrastructure::telemetry::{TelemetryConfig, TelemetryGuard, init as init_telemetry};
