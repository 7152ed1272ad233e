//! Client Configuration Settings
//!
//! Loaded from environment variables. Everything has a default, including
//! the API key: an empty key still connects and the streamer answers with
//! an unauthorized frame.

use std::time::Duration;

use reqwest::Url;

use crate::domain::subscription::{DEFAULT_QUOTE, normalize_symbol};
use crate::infrastructure::broadcast::EventBusConfig;
use crate::infrastructure::cryptocompare::{ApiKey, DEFAULT_CATALOG_URL, DEFAULT_STREAM_URL};

/// Symbols the binary subscribes to when none are configured.
pub const DEFAULT_SYMBOLS: &[&str] = &["BTC", "ETH"];

const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Complete client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Streamer API key. `Debug` is redacted.
    pub api_key: ApiKey,
    /// Streamer base URL, without the key.
    pub stream_url: String,
    /// Coin list URL.
    pub catalog_url: String,
    /// Quote currency for subscriptions.
    pub quote: String,
    /// Base symbols the binary subscribes to on start-up.
    pub symbols: Vec<String>,
    /// Event bus settings.
    pub events: EventBusConfig,
    /// Catalog request timeout.
    pub http_timeout: Duration,
    /// Prometheus listener port (0 = disabled).
    pub metrics_port: u16,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_key: ApiKey::default(),
            stream_url: DEFAULT_STREAM_URL.to_string(),
            catalog_url: DEFAULT_CATALOG_URL.to_string(),
            quote: DEFAULT_QUOTE.to_string(),
            symbols: DEFAULT_SYMBOLS.iter().map(|s| (*s).to_string()).collect(),
            events: EventBusConfig::default(),
            http_timeout: DEFAULT_HTTP_TIMEOUT,
            metrics_port: 0,
        }
    }
}

impl ClientConfig {
    /// Create configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a URL or the quote currency is set but empty, or
    /// a URL does not parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create configuration from an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// See [`ClientConfig::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let api_key = lookup("CRYPTOCOMPARE_API_KEY")
            .map(|k| ApiKey::new(k.trim()))
            .unwrap_or_default();

        let stream_url = parse_env_url(&lookup, "TICKER_STREAM_URL", &defaults.stream_url)?;
        let catalog_url =
            parse_env_url(&lookup, "TICKER_STREAM_CATALOG_URL", &defaults.catalog_url)?;

        let quote = match lookup("TICKER_STREAM_QUOTE") {
            Some(q) if q.trim().is_empty() => {
                return Err(ConfigError::EmptyValue("TICKER_STREAM_QUOTE".to_string()));
            }
            Some(q) => normalize_symbol(&q),
            None => defaults.quote,
        };

        let symbols = lookup("TICKER_STREAM_SYMBOLS").map_or(defaults.symbols, |raw| {
            raw.split(',')
                .map(normalize_symbol)
                .filter(|s| !s.is_empty())
                .collect()
        });

        Ok(Self {
            api_key,
            stream_url,
            catalog_url,
            quote,
            symbols,
            events: EventBusConfig {
                capacity: parse_env_usize(
                    &lookup,
                    "TICKER_STREAM_EVENT_CAPACITY",
                    defaults.events.capacity,
                ),
            },
            http_timeout: parse_env_duration_secs(
                &lookup,
                "TICKER_STREAM_HTTP_TIMEOUT_SECS",
                defaults.http_timeout,
            ),
            metrics_port: parse_env_u16(&lookup, "TICKER_STREAM_METRICS_PORT", defaults.metrics_port),
        })
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Environment variable is set but empty.
    #[error("environment variable {0} cannot be empty")]
    EmptyValue(String),
    /// Environment variable does not hold a valid URL.
    #[error("environment variable {var} is not a valid URL: {reason}")]
    InvalidUrl {
        /// Variable name.
        var: String,
        /// Parser message.
        reason: String,
    },
}

fn parse_env_url<F>(lookup: &F, key: &str, default: &str) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(key) else {
        return Ok(default.to_string());
    };
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(ConfigError::EmptyValue(key.to_string()));
    }
    Url::parse(raw).map_err(|e| ConfigError::InvalidUrl {
        var: key.to_string(),
        reason: e.to_string(),
    })?;
    Ok(raw.to_string())
}

fn parse_env_u16<F>(lookup: &F, key: &str, default: u16) -> u16
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn parse_env_usize<F>(lookup: &F, key: &str, default: usize) -> usize
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn parse_env_duration_secs<F>(lookup: &F, key: &str, default: Duration) -> Duration
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map_or(default, Duration::from_secs)
}
