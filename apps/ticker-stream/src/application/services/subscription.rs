//! Subscription Service
//!
//! Applies subscribe/unsubscribe requests to the registry and forwards them
//! upstream:
//!
//! - `subscribe` records the ticker and forwards `SubAdd` only once a
//!   connection has been requested. Before that it is a silent no-op upstream.
//! - `unsubscribe` always removes and always forwards `SubRemove`.
//!
//! Nothing is replayed after a reconnect.

use std::sync::Arc;

use crate::application::ports::RequestSink;
use crate::domain::subscription::{
    Subscription, SubscriptionError, SubscriptionRegistry, normalize_symbol,
};
use crate::infrastructure::cryptocompare::StreamCodec;
use crate::infrastructure::metrics;

/// Coordinates the registry and the request sink.
pub struct SubscriptionService {
    registry: SubscriptionRegistry,
    sink: Arc<dyn RequestSink>,
    codec: StreamCodec,
    quote: String,
}

impl std::fmt::Debug for SubscriptionService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionService")
            .field("registry", &self.registry)
            .field("quote", &self.quote)
            .finish_non_exhaustive()
    }
}

impl SubscriptionService {
    /// Create a service quoting every subscription in `quote`.
    #[must_use]
    pub fn new(sink: Arc<dyn RequestSink>, quote: &str) -> Self {
        Self {
            registry: SubscriptionRegistry::new(),
            sink,
            codec: StreamCodec::new(),
            quote: normalize_symbol(quote),
        }
    }

    /// Quote currency applied to every subscription.
    #[must_use]
    pub fn quote(&self) -> &str {
        &self.quote
    }

    /// Subscribe to `name`.
    ///
    /// Returns `true` if the ticker was not already active.
    ///
    /// # Errors
    ///
    /// Returns [`SubscriptionError::EmptySymbol`] for a blank name.
    pub fn subscribe(&self, name: &str) -> Result<bool, SubscriptionError> {
        let subscription = self.resolve(name)?;
        let identifier = subscription.identifier();
        let added = self.registry.insert(subscription);
        metrics::set_subscriptions(self.registry.len());

        if self.sink.has_initialized() {
            self.sink
                .submit(self.codec.encode_subscribe([name], &self.quote));
        } else {
            tracing::debug!(
                subscription = %identifier,
                "subscribe() before connect(), not forwarded"
            );
        }

        Ok(added)
    }

    /// Unsubscribe from `name`.
    ///
    /// Returns `true` if the ticker was active. `SubRemove` is forwarded
    /// either way.
    ///
    /// # Errors
    ///
    /// Returns [`SubscriptionError::EmptySymbol`] for a blank name.
    pub fn unsubscribe(&self, name: &str) -> Result<bool, SubscriptionError> {
        let subscription = self.resolve(name)?;
        let removed = self.registry.remove(&subscription);
        metrics::set_subscriptions(self.registry.len());

        self.sink
            .submit(self.codec.encode_unsubscribe([name], &self.quote));

        Ok(removed)
    }

    /// Active subscriptions, ordered by identifier.
    #[must_use]
    pub fn active(&self) -> Vec<Subscription> {
        self.registry.snapshot()
    }

    /// Whether `name` is currently subscribed.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.resolve(name)
            .is_ok_and(|subscription| self.registry.contains(&subscription))
    }

    /// Number of active subscriptions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.registry.len()
    }

    /// Whether nothing is subscribed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.registry.is_empty()
    }

    fn resolve(&self, name: &str) -> Result<Subscription, SubscriptionError> {
        if name.trim().is_empty() {
            return Err(SubscriptionError::EmptySymbol);
        }
        Ok(Subscription::ticker(name, &self.quote))
    }
}
