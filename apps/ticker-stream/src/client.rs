//! Stream Client
//!
//! Single entry point wiring the credential store, event bus, connection
//! manager, subscription service and catalog client together. Every public
//! operation of the crate is reachable from here.
//!
//! # Example
//!
//! ```rust,no_run
//! use ticker_stream::{ClientConfig, StreamClient};
//!
//! # async fn run() -> anyhow::Result<()> {
//! let client = StreamClient::from_config(&ClientConfig::from_env()?)?;
//! client.on_price(|tick| {
//!     println!("{} {}", tick.symbol, tick.price);
//!     Ok(())
//! });
//! client.connect().await?;
//! client.subscribe("BTC")?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use tokio::sync::broadcast;

use crate::application::ports::{CatalogError, RequestSink, StreamConnector, SymbolCatalog};
use crate::application::services::SubscriptionService;
use crate::domain::catalog::CatalogEntry;
use crate::domain::streaming::{ConnectionState, ConnectionStats, PriceTick, StreamEvent};
use crate::domain::subscription::{Subscription, SubscriptionError};
use crate::infrastructure::broadcast::{EventBus, ListenerId, SharedEventBus};
use crate::infrastructure::config::ClientConfig;
use crate::infrastructure::cryptocompare::{
    ApiKey, CatalogClient, ConnectionError, ConnectionManager, CredentialStore, StreamCodec,
    WebSocketConnector,
};

/// Live ticker client.
pub struct StreamClient {
    credentials: CredentialStore,
    bus: SharedEventBus,
    connection: Arc<ConnectionManager>,
    subscriptions: SubscriptionService,
    catalog: Arc<dyn SymbolCatalog>,
}

impl std::fmt::Debug for StreamClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamClient")
            .field("connection", &self.connection)
            .field("subscriptions", &self.subscriptions)
            .field("bus", &self.bus)
            .finish_non_exhaustive()
    }
}

impl StreamClient {
    /// Build a client with the WebSocket transport and HTTP catalog.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn from_config(config: &ClientConfig) -> Result<Self, CatalogError> {
        let catalog = CatalogClient::new(config.catalog_url.clone(), config.http_timeout)?;
        Ok(Self::with_parts(
            config,
            Arc::new(WebSocketConnector::default()),
            Arc::new(catalog),
        ))
    }

    /// Build a client over caller supplied transport and catalog.
    #[must_use]
    pub fn with_parts(
        config: &ClientConfig,
        connector: Arc<dyn StreamConnector>,
        catalog: Arc<dyn SymbolCatalog>,
    ) -> Self {
        let credentials = CredentialStore::new(config.api_key.clone());
        let bus: SharedEventBus = Arc::new(EventBus::new(config.events));
        let connection = Arc::new(ConnectionManager::new(
            connector,
            credentials.clone(),
            config.stream_url.clone(),
            Arc::clone(&bus),
        ));
        let sink = Arc::clone(&connection) as Arc<dyn RequestSink>;
        let subscriptions = SubscriptionService::new(sink, &config.quote);

        Self {
            credentials,
            bus,
            connection,
            subscriptions,
            catalog,
        }
    }

    // =========================================================================
    // Connection
    // =========================================================================

    /// Open the streamer session. See [`ConnectionManager::connect`].
    ///
    /// # Errors
    ///
    /// Returns an error if the endpoint is invalid or the transport fails
    /// to open.
    pub async fn connect(&self) -> Result<(), ConnectionError> {
        self.connection.connect().await
    }

    /// Tear the session down, discarding queued requests.
    pub fn close(&self) {
        self.connection.close();
    }

    /// Current connection state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.connection.state()
    }

    /// Connection counters.
    #[must_use]
    pub fn stats(&self) -> ConnectionStats {
        self.connection.stats()
    }

    // =========================================================================
    // Subscriptions
    // =========================================================================

    /// Subscribe to the aggregate ticker for `name`.
    ///
    /// # Errors
    ///
    /// Returns an error for a blank name.
    pub fn subscribe(&self, name: &str) -> Result<bool, SubscriptionError> {
        self.subscriptions.subscribe(name)
    }

    /// Unsubscribe from `name`. Always forwarded upstream.
    ///
    /// # Errors
    ///
    /// Returns an error for a blank name.
    pub fn unsubscribe(&self, name: &str) -> Result<bool, SubscriptionError> {
        self.subscriptions.unsubscribe(name)
    }

    /// Active subscriptions.
    #[must_use]
    pub fn active_subscriptions(&self) -> Vec<Subscription> {
        self.subscriptions.active()
    }

    /// Whether `name` is subscribed.
    #[must_use]
    pub fn is_subscribed(&self, name: &str) -> bool {
        self.subscriptions.contains(name)
    }

    /// Quote currency used by this client.
    #[must_use]
    pub fn quote(&self) -> &str {
        self.subscriptions.quote()
    }

    /// Protocol default quote currency (`USD`).
    #[must_use]
    pub const fn default_quote() -> &'static str {
        StreamCodec::default_quote()
    }

    // =========================================================================
    // Credential
    // =========================================================================

    /// Current API key.
    #[must_use]
    pub fn api_key(&self) -> ApiKey {
        self.credentials.get()
    }

    /// Replace the API key. Used from the next `connect()`.
    pub fn set_api_key(&self, key: ApiKey) {
        self.credentials.set(key);
    }

    // =========================================================================
    // Catalog
    // =========================================================================

    /// Fetch the tradable symbol catalog.
    ///
    /// # Errors
    ///
    /// Returns the network, status or parse failure of the single request.
    pub async fn fetch_symbol_catalog(&self) -> Result<Vec<CatalogEntry>, CatalogError> {
        self.catalog.fetch_symbol_catalog().await
    }

    // =========================================================================
    // Events
    // =========================================================================

    /// Register a `connection(authenticated)` listener.
    pub fn on_connection<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(bool) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.bus.on_connection(listener)
    }

    /// Register a `price(tick)` listener.
    pub fn on_price<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&PriceTick) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.bus.on_price(listener)
    }

    /// Register a `close()` listener.
    pub fn on_close<F>(&self, listener: F) -> ListenerId
    where
        F: Fn() -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.bus.on_close(listener)
    }

    /// Remove a listener.
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.bus.remove_listener(id)
    }

    /// Async stream of every event.
    #[must_use]
    pub fn events(&self) -> broadcast::Receiver<StreamEvent> {
        self.bus.subscribe()
    }
}
