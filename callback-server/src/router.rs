//! Event routing for HTTP callback notifications.
//!
//! This module provides the `EventRouter` which maps active subscription IDs
//! to the service that owns them and forwards incoming UPnP event
//! notifications to a channel.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};

/// Notification received on the callback listener.
///
/// Carries the subscription ID from the `SID` header, the owner registered
/// for that ID, and the raw XML body. Parsing is left to the consumer.
#[derive(Debug, Clone)]
pub struct NotificationPayload {
    /// The subscription ID from the UPnP SID header
    pub subscription_id: String,
    /// Owner tag given at registration (the subscribed service)
    pub owner: String,
    /// The raw XML event body
    pub event_xml: String,
}

/// Routes events from HTTP callbacks to a channel.
///
/// The `EventRouter` keeps a table of active subscription IDs and their
/// owners. When an event is received via HTTP callback, the router looks up
/// the owner and sends the notification payload to the configured channel.
/// Unknown subscription IDs are dropped.
#[derive(Clone)]
pub struct EventRouter {
    /// Active subscription IDs mapped to their owner
    subscriptions: Arc<RwLock<HashMap<String, String>>>,
    /// Channel for sending notification payloads
    event_sender: mpsc::UnboundedSender<NotificationPayload>,
}

impl EventRouter {
    /// Create a new event router.
    ///
    /// # Example
    ///
    /// ```
    /// use tokio::sync::mpsc;
    /// use callback_server::router::{EventRouter, NotificationPayload};
    ///
    /// let (tx, mut rx) = mpsc::unbounded_channel::<NotificationPayload>();
    /// let router = EventRouter::new(tx);
    /// ```
    pub fn new(event_sender: mpsc::UnboundedSender<NotificationPayload>) -> Self {
        Self {
            subscriptions: Arc::new(RwLock::new(HashMap::new())),
            event_sender,
        }
    }

    /// Register a subscription ID and the owner its events belong to.
    ///
    /// Registering an ID that is already known replaces its owner.
    ///
    /// # Example
    ///
    /// ```
    /// # use tokio::sync::mpsc;
    /// # use callback_server::router::{EventRouter, NotificationPayload};
    /// # #[tokio::main]
    /// # async fn main() {
    /// # let (tx, _rx) = mpsc::unbounded_channel::<NotificationPayload>();
    /// # let router = EventRouter::new(tx);
    /// router
    ///     .register("uuid:subscription-123".to_string(), "urn:upnp-org:serviceId:AVTransport".to_string())
    ///     .await;
    /// # }
    /// ```
    pub async fn register(&self, subscription_id: String, owner: String) {
        let mut subs = self.subscriptions.write().await;
        subs.insert(subscription_id, owner);
    }

    /// Unregister a subscription ID.
    ///
    /// Future events for this subscription are dropped.
    pub async fn unregister(&self, subscription_id: &str) {
        let mut subs = self.subscriptions.write().await;
        subs.remove(subscription_id);
    }

    /// Returns the owner currently holding `subscription_id`, if any.
    pub async fn owner_of(&self, subscription_id: &str) -> Option<String> {
        self.subscriptions.read().await.get(subscription_id).cloned()
    }

    /// Number of registered subscription IDs.
    pub async fn len(&self) -> usize {
        self.subscriptions.read().await.len()
    }

    /// Whether no subscription ID is registered.
    pub async fn is_empty(&self) -> bool {
        self.subscriptions.read().await.is_empty()
    }

    /// Route an incoming event to the channel.
    ///
    /// Returns `true` if the subscription ID was registered and the payload
    /// was handed to the channel, `false` if the event was dropped.
    ///
    /// # Example
    ///
    /// ```
    /// # use tokio::sync::mpsc;
    /// # use callback_server::router::{EventRouter, NotificationPayload};
    /// # #[tokio::main]
    /// # async fn main() {
    /// # let (tx, mut rx) = mpsc::unbounded_channel::<NotificationPayload>();
    /// # let router = EventRouter::new(tx);
    /// # router.register("uuid:subscription-123".to_string(), "owner".to_string()).await;
    /// let routed = router.route_event(
    ///     "uuid:subscription-123".to_string(),
    ///     "<e:propertyset/>".to_string()
    /// ).await;
    /// assert!(routed);
    /// # }
    /// ```
    pub async fn route_event(&self, subscription_id: String, event_xml: String) -> bool {
        let owner = {
            let subs = self.subscriptions.read().await;
            subs.get(&subscription_id).cloned()
        };

        match owner {
            Some(owner) => {
                let payload = NotificationPayload {
                    subscription_id,
                    owner,
                    event_xml,
                };

                // Receiver may already be gone during teardown
                self.event_sender.send(payload).is_ok()
            }
            None => false,
        }
    }
}
