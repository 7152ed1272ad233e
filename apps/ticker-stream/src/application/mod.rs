//! Application Layer - Use cases and port definitions.
//!
//! This layer contains the application services and port interfaces
//! that define how the domain interacts with external systems.

/// Port interfaces for external systems (transport, request sink, catalog).
pub mod ports;

/// Application services for subscription management.
pub mod services;
