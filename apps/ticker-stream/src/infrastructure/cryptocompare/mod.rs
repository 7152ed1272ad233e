//! CryptoCompare Streamer Adapters
//!
//! - **Streamer v2**: WebSocket price feed (JSON codec, API key in the URL)
//! - **Coin list**: REST catalog of tradable symbols

pub mod auth;
pub mod catalog;
pub mod codec;
pub mod connection;
pub mod messages;
pub mod websocket;

pub use auth::{ApiKey, AuthError, CredentialStore, authenticated_url};
pub use catalog::{CatalogClient, DEFAULT_CATALOG_URL};
pub use codec::{CodecError, StreamCodec};
pub use connection::{ConnectionError, ConnectionManager, SendOutcome};
pub use websocket::{DEFAULT_INBOUND_CAPACITY, WebSocketConnector};

/// Default streamer endpoint, without credentials.
pub const DEFAULT_STREAM_URL: &str = "wss://streamer.cryptocompare.com/v2";
