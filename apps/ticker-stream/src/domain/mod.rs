//! Domain Layer - Core streaming types.
//!
//! Pure types with no I/O: connection states, protocol events, outbound
//! requests and the subscription registry.

/// Symbol catalog records.
pub mod catalog;

/// Streaming types (connection state, protocol events, price ticks).
pub mod streaming;

/// Subscription identity and registry.
pub mod subscription;
