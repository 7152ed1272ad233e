//! Application Services
//!
//! Services that orchestrate domain logic and coordinate between ports.
//!
//! - `SubscriptionService`: applies subscribe/unsubscribe and forwards them

mod subscription;

pub use subscription::SubscriptionService;
