//! Subscription Types
//!
//! Domain types for tracking which tickers the client is subscribed to.
//!
//! # Design
//!
//! A subscription is a (base, quote, channel) triple. The registry only
//! tracks membership; it never talks to the transport. Callers decide what
//! to forward upstream based on the registry's answers.

use std::collections::HashSet;
use std::fmt;

use parking_lot::RwLock;

// =============================================================================
// Constants
// =============================================================================

/// Quote currency used when the caller does not pick one.
pub const DEFAULT_QUOTE: &str = "USD";

/// Exchange identifier for the cross-exchange aggregate index.
pub const EXCHANGE_AGGREGATE: &str = "CCCAGG";

// =============================================================================
// Types
// =============================================================================

/// Protocol-level subscription category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Channel {
    /// Aggregate ticker across exchanges.
    #[default]
    AggregateTicker,
}

impl Channel {
    /// Leading numeric code of the channel in a subscription identifier.
    #[must_use]
    pub const fn code(self) -> u16 {
        match self {
            Self::AggregateTicker => 5,
        }
    }
}

/// A single ticker subscription.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Subscription {
    /// Base symbol, e.g. `BTC`.
    pub base: String,
    /// Quote symbol, e.g. `USD`.
    pub quote: String,
    /// Channel the subscription belongs to.
    pub channel: Channel,
}

impl Subscription {
    /// Create an aggregate ticker subscription.
    ///
    /// Symbols are trimmed and upper-cased.
    #[must_use]
    pub fn ticker(base: &str, quote: &str) -> Self {
        Self {
            base: normalize_symbol(base),
            quote: normalize_symbol(quote),
            channel: Channel::AggregateTicker,
        }
    }

    /// Wire identifier: `<channel>~<exchange>~<BASE>~<QUOTE>`.
    #[must_use]
    pub fn identifier(&self) -> String {
        format!(
            "{}~{}~{}~{}",
            self.channel.code(),
            EXCHANGE_AGGREGATE,
            self.base,
            self.quote
        )
    }
}

impl fmt::Display for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.identifier())
    }
}

/// Normalize a user supplied symbol.
#[must_use]
pub fn normalize_symbol(symbol: &str) -> String {
    symbol.trim().to_uppercase()
}

/// Errors raised when shaping a subscription request.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SubscriptionError {
    /// The symbol was empty after trimming.
    #[error("symbol cannot be empty")]
    EmptySymbol,
}

// =============================================================================
// Subscription Registry
// =============================================================================

/// Set of currently active subscriptions.
///
/// Thread-safe; all methods take `&self`.
///
/// # Example
///
/// ```rust
/// use ticker_stream::domain::subscription::{Subscription, SubscriptionRegistry};
///
/// let registry = SubscriptionRegistry::new();
/// assert!(registry.insert(Subscription::ticker("btc", "USD")));
/// assert!(!registry.insert(Subscription::ticker("BTC", "USD")));
/// assert_eq!(registry.len(), 1);
/// ```
#[derive(Debug, Default)]
pub struct SubscriptionRegistry {
    active: RwLock<HashSet<Subscription>>,
}

impl SubscriptionRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a subscription. Returns `true` if it was not already present.
    pub fn insert(&self, subscription: Subscription) -> bool {
        self.active.write().insert(subscription)
    }

    /// Remove a subscription. Returns `true` if it was present.
    pub fn remove(&self, subscription: &Subscription) -> bool {
        self.active.write().remove(subscription)
    }

    /// Check membership.
    #[must_use]
    pub fn contains(&self, subscription: &Subscription) -> bool {
        self.active.read().contains(subscription)
    }

    /// Snapshot of active subscriptions, sorted by identifier.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Subscription> {
        let mut subs: Vec<_> = self.active.read().iter().cloned().collect();
        subs.sort_by_key(Subscription::identifier);
        subs
    }

    /// Number of active subscriptions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.active.read().len()
    }

    /// Whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.active.read().is_empty()
    }

    /// Drop every subscription.
    pub fn clear(&self) {
        self.active.write().clear();
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifier_format() {
        let sub = Subscription::ticker("BTC", "USD");
        assert_eq!(sub.identifier(), "5~CCCAGG~BTC~USD");
        assert_eq!(sub.to_string(), "5~CCCAGG~BTC~USD");
    }

    #[test]
    fn ticker_normalizes_symbols() {
        let sub = Subscription::ticker("  eth ", "eur");
        assert_eq!(sub.base, "ETH");
        assert_eq!(sub.quote, "EUR");
        assert_eq!(sub.channel, Channel::AggregateTicker);
    }

    #[test]
    fn channel_code() {
        assert_eq!(Channel::AggregateTicker.code(), 5);
    }

    #[test]
    fn registry_deduplicates() {
        let registry = SubscriptionRegistry::new();
        assert!(registry.insert(Subscription::ticker("BTC", "USD")));
        assert!(!registry.insert(Subscription::ticker("btc", "usd")));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn registry_distinguishes_quotes() {
        let registry = SubscriptionRegistry::new();
        registry.insert(Subscription::ticker("BTC", "USD"));
        registry.insert(Subscription::ticker("BTC", "EUR"));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn registry_remove_missing_is_noop() {
        let registry = SubscriptionRegistry::new();
        assert!(!registry.remove(&Subscription::ticker("BTC", "USD")));
        assert!(registry.is_empty());
    }

    #[test]
    fn registry_snapshot_sorted() {
        let registry = SubscriptionRegistry::new();
        registry.insert(Subscription::ticker("XRP", "USD"));
        registry.insert(Subscription::ticker("BTC", "USD"));
        registry.insert(Subscription::ticker("ETH", "USD"));

        let ids: Vec<_> = registry
            .snapshot()
            .iter()
            .map(Subscription::identifier)
            .collect();
        assert_eq!(
            ids,
            vec!["5~CCCAGG~BTC~USD", "5~CCCAGG~ETH~USD", "5~CCCAGG~XRP~USD"]
        );
    }

    #[test]
    fn registry_clear() {
        let registry = SubscriptionRegistry::new();
        registry.insert(Subscription::ticker("BTC", "USD"));
        registry.clear();
        assert!(registry.is_empty());
        assert!(!registry.contains(&Subscription::ticker("BTC", "USD")));
    }
}
