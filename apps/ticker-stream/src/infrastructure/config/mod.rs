//! Configuration Module
//!
//! Environment-driven settings for the streaming client and binary.

mod settings;

pub use settings::{ClientConfig, ConfigError, DEFAULT_SYMBOLS};
