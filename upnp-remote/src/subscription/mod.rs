//! GENA subscriptions and event delivery.

mod listener;
mod manager;
mod renewal;
mod server;

pub use listener::{Listener, ListenerId};
pub use renewal::renewal_delay;

pub(crate) use manager::SubscriptionManager;
