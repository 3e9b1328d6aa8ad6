//! Record dispatch to registered subscribers.

pub mod registry;

pub use registry::{Callback, SubscriptionId, SubscriptionRegistry};
