//! Event Bus
//!
//! Typed publish/subscribe surface between the connection manager and
//! consumers.
//!
//! # Channels
//!
//! - `connection(authenticated: bool)`
//! - `price(tick: PriceTick)`
//! - `close()`
//!
//! # Delivery
//!
//! Listeners run synchronously, in registration order, on the task that
//! emits. A listener that returns `Err` or panics is logged and counted; the
//! remaining listeners still run.
//!
//! Async consumers can also take a `tokio::sync::broadcast` receiver of
//! `StreamEvent` via [`EventBus::subscribe`]. That channel is fed after the
//! synchronous listeners and drops the oldest events for lagging receivers.

use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use tokio::sync::broadcast;

use crate::domain::streaming::{PriceTick, StreamEvent};
use crate::infrastructure::metrics;

// =============================================================================
// Listener Types
// =============================================================================

/// Synchronous listener for payloads of type `T`.
pub type Listener<T> = Arc<dyn Fn(&T) -> anyhow::Result<()> + Send + Sync>;

/// Handle returned on registration, used to remove a listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

struct Registered<T> {
    id: ListenerId,
    listener: Listener<T>,
}

/// Outcome of one emit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    /// Listeners that returned `Ok`.
    pub delivered: usize,
    /// Listeners that returned `Err` or panicked.
    pub failed: usize,
}

// =============================================================================
// Configuration
// =============================================================================

/// Event bus settings.
#[derive(Debug, Clone, Copy)]
pub struct EventBusConfig {
    /// Capacity of the async broadcast channel.
    pub capacity: usize,
}

impl Default for EventBusConfig {
    fn default() -> Self {
        Self { capacity: 1_024 }
    }
}

// =============================================================================
// Event Bus
// =============================================================================

/// Shared event bus handle.
pub type SharedEventBus = Arc<EventBus>;

/// Multi-consumer notification hub.
///
/// # Example
///
/// ```rust
/// use ticker_stream::infrastructure::broadcast::EventBus;
///
/// let bus = EventBus::with_defaults();
/// bus.on_connection(|ok| {
///     println!("authenticated: {ok}");
///     Ok(())
/// });
/// let report = bus.emit_connection(true);
/// assert_eq!(report.delivered, 1);
/// ```
pub struct EventBus {
    next_id: AtomicU64,
    connection: RwLock<Vec<Registered<bool>>>,
    price: RwLock<Vec<Registered<PriceTick>>>,
    close: RwLock<Vec<Registered<()>>>,
    events_tx: broadcast::Sender<StreamEvent>,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("connection_listeners", &self.connection.read().len())
            .field("price_listeners", &self.price.read().len())
            .field("close_listeners", &self.close.read().len())
            .field("receivers", &self.events_tx.receiver_count())
            .finish()
    }
}

impl EventBus {
    /// Create a bus with the given configuration.
    #[must_use]
    pub fn new(config: EventBusConfig) -> Self {
        Self {
            next_id: AtomicU64::new(1),
            connection: RwLock::new(Vec::new()),
            price: RwLock::new(Vec::new()),
            close: RwLock::new(Vec::new()),
            events_tx: broadcast::channel(config.capacity.max(1)).0,
        }
    }

    /// Create a bus with default configuration.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(EventBusConfig::default())
    }

    fn next_listener_id(&self) -> ListenerId {
        ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    // =========================================================================
    // Registration
    // =========================================================================

    /// Register a `connection` listener.
    pub fn on_connection<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(bool) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let id = self.next_listener_id();
        self.connection.write().push(Registered {
            id,
            listener: Arc::new(move |ok: &bool| listener(*ok)),
        });
        id
    }

    /// Register a `price` listener.
    pub fn on_price<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&PriceTick) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let id = self.next_listener_id();
        self.price.write().push(Registered {
            id,
            listener: Arc::new(listener),
        });
        id
    }

    /// Register a `close` listener.
    pub fn on_close<F>(&self, listener: F) -> ListenerId
    where
        F: Fn() -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let id = self.next_listener_id();
        self.close.write().push(Registered {
            id,
            listener: Arc::new(move |(): &()| listener()),
        });
        id
    }

    /// Remove a listener from whichever channel holds it.
    ///
    /// Returns `true` if a listener was removed.
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        remove_from(&self.connection, id)
            || remove_from(&self.price, id)
            || remove_from(&self.close, id)
    }

    /// Total registered synchronous listeners.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.connection.read().len() + self.price.read().len() + self.close.read().len()
    }

    /// Get a new async receiver for every event.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<StreamEvent> {
        self.events_tx.subscribe()
    }

    /// Number of live async receivers.
    #[must_use]
    pub fn receiver_count(&self) -> usize {
        self.events_tx.receiver_count()
    }

    // =========================================================================
    // Emission
    // =========================================================================

    /// Emit `connection(authenticated)`.
    pub fn emit_connection(&self, authenticated: bool) -> DeliveryReport {
        let report = deliver("connection", &self.connection, &authenticated);
        let _ = self
            .events_tx
            .send(StreamEvent::Connection { authenticated });
        report
    }

    /// Emit `price(tick)`.
    pub fn emit_price(&self, tick: &PriceTick) -> DeliveryReport {
        let report = deliver("price", &self.price, tick);
        let _ = self.events_tx.send(StreamEvent::Price(tick.clone()));
        report
    }

    /// Emit `close()`.
    pub fn emit_close(&self) -> DeliveryReport {
        let report = deliver("close", &self.close, &());
        let _ = self.events_tx.send(StreamEvent::Close);
        report
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::with_defaults()
    }
}

fn remove_from<T>(listeners: &RwLock<Vec<Registered<T>>>, id: ListenerId) -> bool {
    let mut guard = listeners.write();
    let before = guard.len();
    guard.retain(|r| r.id != id);
    guard.len() != before
}

/// Run every listener against `payload`, isolating failures.
///
/// The listener list is snapshotted first so listeners may register or
/// remove listeners without deadlocking.
fn deliver<T>(
    channel: &'static str,
    listeners: &RwLock<Vec<Registered<T>>>,
    payload: &T,
) -> DeliveryReport {
    let snapshot: Vec<(ListenerId, Listener<T>)> = listeners
        .read()
        .iter()
        .map(|r| (r.id, Arc::clone(&r.listener)))
        .collect();

    let mut report = DeliveryReport::default();

    for (id, listener) in snapshot {
        match catch_unwind(AssertUnwindSafe(|| listener(payload))) {
            Ok(Ok(())) => report.delivered += 1,
            Ok(Err(e)) => {
                report.failed += 1;
                metrics::record_listener_failure(channel);
                tracing::warn!(channel, listener = id.0, error = %e, "Event listener failed");
            }
            Err(panic) => {
                report.failed += 1;
                metrics::record_listener_failure(channel);
                tracing::error!(
                    channel,
                    listener = id.0,
                    panic = %panic_message(panic.as_ref()),
                    "Event listener panicked"
                );
            }
        }
    }

    report
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    panic
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use parking_lot::Mutex;
    use rust_decimal::Decimal;

    use super::*;

    fn tick(symbol: &str, price: &str) -> PriceTick {
        PriceTick {
            symbol: symbol.to_string(),
            price: Decimal::from_str(price).unwrap(),
        }
    }

    #[test]
    fn delivers_in_registration_order() {
        let bus = EventBus::with_defaults();
        let seen = Arc::new(Mutex::new(Vec::new()));

        for n in 0..3 {
            let seen = Arc::clone(&seen);
            bus.on_price(move |t| {
                seen.lock().push((n, t.symbol.clone()));
                Ok(())
            });
        }

        let report = bus.emit_price(&tick("BTC", "1"));
        assert_eq!(report, DeliveryReport { delivered: 3, failed: 0 });
        assert_eq!(
            *seen.lock(),
            vec![
                (0, "BTC".to_string()),
                (1, "BTC".to_string()),
                (2, "BTC".to_string())
            ]
        );
    }

    #[test]
    fn failing_listener_does_not_block_others() {
        let bus = EventBus::with_defaults();
        let calls = Arc::new(AtomicU64::new(0));

        bus.on_connection(|_| anyhow::bail!("consumer broke"));
        bus.on_connection(|_| panic!("consumer panicked"));
        let counter = Arc::clone(&calls);
        bus.on_connection(move |ok| {
            assert!(ok);
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        let report = bus.emit_connection(true);
        assert_eq!(report, DeliveryReport { delivered: 1, failed: 2 });
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn channels_are_independent() {
        let bus = EventBus::with_defaults();
        let closes = Arc::new(AtomicU64::new(0));
        let counter = Arc::clone(&closes);
        bus.on_close(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        assert_eq!(bus.emit_connection(false).delivered, 0);
        assert_eq!(bus.emit_price(&tick("ETH", "2")).delivered, 0);
        assert_eq!(closes.load(Ordering::SeqCst), 0);

        assert_eq!(bus.emit_close().delivered, 1);
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn remove_listener() {
        let bus = EventBus::with_defaults();
        let id = bus.on_price(|_| Ok(()));
        bus.on_close(|| Ok(()));
        assert_eq!(bus.listener_count(), 2);

        assert!(bus.remove_listener(id));
        assert!(!bus.remove_listener(id));
        assert_eq!(bus.listener_count(), 1);
        assert_eq!(bus.emit_price(&tick("BTC", "1")).delivered, 0);
    }

    #[test]
    fn listener_can_register_during_delivery() {
        let bus = Arc::new(EventBus::with_defaults());
        let inner = Arc::clone(&bus);
        bus.on_close(move || {
            inner.on_close(|| Ok(()));
            Ok(())
        });

        assert_eq!(bus.emit_close().delivered, 1);
        assert_eq!(bus.emit_close().delivered, 2);
    }

    #[tokio::test]
    async fn async_receivers_get_every_event() {
        let bus = EventBus::with_defaults();
        let mut rx = bus.subscribe();
        assert_eq!(bus.receiver_count(), 1);

        bus.emit_connection(true);
        bus.emit_price(&tick("BTC", "42.5"));
        bus.emit_close();

        assert_eq!(
            rx.recv().await.unwrap(),
            StreamEvent::Connection {
                authenticated: true
            }
        );
        assert_eq!(
            rx.recv().await.unwrap(),
            StreamEvent::Price(tick("BTC", "42.5"))
        );
        assert_eq!(rx.recv().await.unwrap(), StreamEvent::Close);
    }

    #[test]
    fn emit_without_receivers_is_fine() {
        let bus = EventBus::new(EventBusConfig { capacity: 0 });
        assert_eq!(bus.emit_close(), DeliveryReport::default());
    }
}
