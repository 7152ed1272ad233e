//! Infrastructure Layer - Adapters and external integrations.
//!
//! This layer contains the concrete implementations of the port interfaces
//! defined in the application layer.

/// CryptoCompare adapters (streamer WebSocket, codec, coin list).
pub mod cryptocompare;

/// Event bus for connection and price notifications.
pub mod broadcast;

/// Environment-driven configuration.
pub mod config;

/// Prometheus metrics instrumentation.
pub mod metrics;

/// Logging and OpenTelemetry tracing integration.
pub mod telemetry;
