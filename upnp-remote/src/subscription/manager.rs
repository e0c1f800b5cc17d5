//! Subscription lifecycle: SUBSCRIBE, renewal, UNSUBSCRIBE and event fan-out.
//!
//! One [`Subscription`] exists per service. Every mutation of a service's
//! entry happens while holding that service's step lock, so at most one
//! SUBSCRIBE, renewal or UNSUBSCRIBE is in flight per service. Different
//! services proceed concurrently.

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use callback_server::NotificationPayload;
use dashmap::DashMap;
use futures::FutureExt;
use soap_client::SoapClient;
use tokio::sync::{mpsc, Mutex, RwLock};
use tracing::{debug, error, info, warn};
use url::Url;

use super::listener::{Listener, ListenerId, ListenerSet};
use super::renewal::{renewal_delay, RenewalTimer};
use super::server::EventsServer;
use crate::config::ClientConfig;
use crate::description::DescriptionFetcher;
use crate::error::{ClientError, Result};
use crate::events::{parse_property_set, Event, EventTransforms};
use crate::service_id::ServiceId;

/// A live GENA subscription for one service.
struct Subscription {
    sid: String,
    /// URL the subscription was created on; renewals and UNSUBSCRIBE go here
    url: Url,
    listeners: ListenerSet,
    renewal: RenewalTimer,
}

struct Inner {
    soap: SoapClient,
    descriptions: Arc<DescriptionFetcher>,
    transforms: EventTransforms,
    subscription_timeout: u32,
    renewal_margin: Duration,
    renewal_floor: Duration,
    subscriptions: RwLock<HashMap<ServiceId, Subscription>>,
    steps: DashMap<ServiceId, Arc<Mutex<()>>>,
    server: Mutex<EventsServer>,
    next_listener: AtomicU64,
}

pub(crate) struct SubscriptionManager {
    inner: Arc<Inner>,
}

impl SubscriptionManager {
    pub fn new(
        soap: SoapClient,
        descriptions: Arc<DescriptionFetcher>,
        transforms: EventTransforms,
        config: &ClientConfig,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                soap,
                descriptions,
                transforms,
                subscription_timeout: config.subscription_timeout_secs(),
                renewal_margin: config.renewal_margin,
                renewal_floor: config.renewal_floor,
                subscriptions: RwLock::new(HashMap::new()),
                steps: DashMap::new(),
                server: Mutex::new(EventsServer::new(config.callback_address)),
                next_listener: AtomicU64::new(1),
            }),
        }
    }

    /// Register `listener` for events of `service_id`, subscribing first if
    /// the service has no subscription yet.
    ///
    /// Registering the same `Arc` again returns its existing id.
    pub async fn subscribe(&self, service_id: &ServiceId, listener: Listener) -> Result<ListenerId> {
        let inner = &self.inner;
        let step = inner.step(service_id);
        let _step = step.lock().await;

        if let Some(subscription) = inner.subscriptions.write().await.get_mut(service_id) {
            let id = match subscription.listeners.find(&listener) {
                Some(id) => id,
                None => {
                    let id = inner.next_listener_id();
                    subscription.listeners.insert(id, listener);
                    debug!(%service_id, listeners = subscription.listeners.len(), "Listener added");
                    id
                }
            };
            return Ok(id);
        }

        let service = inner.descriptions.service_ref(service_id).await?;
        let callback_url = Inner::acquire_server(inner).await?;

        let response = match inner
            .soap
            .subscribe(&service.event_sub_url, &callback_url, inner.subscription_timeout)
            .await
        {
            Ok(response) => response,
            Err(e) => {
                inner.server.lock().await.release().await;
                warn!(%service_id, error = %e, "SUBSCRIBE failed");
                return Err(ClientError::subscribe_failed(service_id, e));
            }
        };

        let id = inner.next_listener_id();
        let mut listeners = ListenerSet::default();
        listeners.insert(id, listener);

        let renewal = Inner::schedule_renewal(
            inner,
            service_id.clone(),
            response.sid.clone(),
            Duration::from_secs(response.timeout_seconds.into()),
        );

        // Devices send the initial event right after replying. Holding the
        // map while the SID is registered makes delivery wait for the entry.
        let mut subscriptions = inner.subscriptions.write().await;
        let router = inner.server.lock().await.router();
        if let Some(router) = router {
            router.register(response.sid.clone(), service_id.to_string()).await;
        }
        subscriptions.insert(
            service_id.clone(),
            Subscription {
                sid: response.sid.clone(),
                url: service.event_sub_url,
                listeners,
                renewal,
            },
        );
        drop(subscriptions);

        info!(
            %service_id,
            sid = %response.sid,
            timeout = response.timeout_seconds,
            "Subscribed"
        );
        Ok(id)
    }

    /// Remove a listener. The last listener out tears the subscription down.
    ///
    /// Unknown services and ids are ignored. A rejected UNSUBSCRIBE is
    /// reported, but the subscription is removed locally regardless.
    pub async fn unsubscribe(&self, service_id: &ServiceId, listener: ListenerId) -> Result<()> {
        let inner = &self.inner;
        let step = inner.step(service_id);
        let _step = step.lock().await;

        let mut subscription = {
            let mut subscriptions = inner.subscriptions.write().await;
            let Some(existing) = subscriptions.get_mut(service_id) else {
                return Ok(());
            };
            if !existing.listeners.remove(listener) {
                return Ok(());
            }
            if !existing.listeners.is_empty() {
                debug!(%service_id, listeners = existing.listeners.len(), "Listener removed");
                return Ok(());
            }
            match subscriptions.remove(service_id) {
                Some(subscription) => subscription,
                None => return Ok(()),
            }
        };

        subscription.renewal.cancel();
        inner.forget_sid(&subscription.sid).await;

        let result = inner.soap.unsubscribe(&subscription.url, &subscription.sid).await;
        inner.server.lock().await.release().await;

        match result {
            Ok(()) => {
                info!(%service_id, sid = %subscription.sid, "Unsubscribed");
                Ok(())
            }
            Err(e) => {
                warn!(%service_id, error = %e, "UNSUBSCRIBE failed; subscription dropped locally");
                Err(ClientError::unsubscribe_failed(service_id, e))
            }
        }
    }

    /// Drop every subscription and stop the callback server.
    ///
    /// Pending renewals are cancelled and each subscription gets a
    /// best-effort UNSUBSCRIBE whose failure is only logged.
    pub async fn cleanup(&self) {
        let inner = &self.inner;
        let service_ids: Vec<ServiceId> = inner.steps.iter().map(|entry| entry.key().clone()).collect();

        for service_id in service_ids {
            let step = inner.step(&service_id);
            let _step = step.lock().await;

            let Some(mut subscription) = inner.subscriptions.write().await.remove(&service_id) else {
                continue;
            };

            subscription.renewal.cancel();
            inner.forget_sid(&subscription.sid).await;

            if let Err(e) = inner.soap.unsubscribe(&subscription.url, &subscription.sid).await {
                warn!(%service_id, error = %e, "UNSUBSCRIBE failed during cleanup");
            }
        }

        inner.server.lock().await.stop().await;
    }

    pub async fn has_subscriptions(&self) -> bool {
        !self.inner.subscriptions.read().await.is_empty()
    }

    pub async fn has_subscription(&self, service_id: &ServiceId) -> bool {
        self.inner.subscriptions.read().await.contains_key(service_id)
    }

    pub async fn subscription_sid(&self, service_id: &ServiceId) -> Option<String> {
        self.inner
            .subscriptions
            .read()
            .await
            .get(service_id)
            .map(|subscription| subscription.sid.clone())
    }

    pub async fn listener_count(&self, service_id: &ServiceId) -> usize {
        self.inner
            .subscriptions
            .read()
            .await
            .get(service_id)
            .map_or(0, |subscription| subscription.listeners.len())
    }

    pub async fn has_events_server(&self) -> bool {
        self.inner.server.lock().await.is_running()
    }

    pub async fn events_server_url(&self) -> Option<String> {
        self.inner.server.lock().await.callback_url().map(str::to_string)
    }
}

impl Inner {
    fn step(&self, service_id: &ServiceId) -> Arc<Mutex<()>> {
        self.steps.entry(service_id.clone()).or_default().clone()
    }

    fn next_listener_id(&self) -> ListenerId {
        ListenerId(self.next_listener.fetch_add(1, Ordering::Relaxed))
    }

    /// Take a server reference and return the callback URL.
    async fn acquire_server(inner: &Arc<Inner>) -> Result<String> {
        let acquired = inner.server.lock().await.acquire().await?;

        if let Some(notifications) = acquired.notifications {
            tokio::spawn(dispatch(Arc::downgrade(inner), notifications));
        }

        Ok(acquired.callback_url)
    }

    async fn forget_sid(&self, sid: &str) {
        let router = self.server.lock().await.router();
        if let Some(router) = router {
            router.unregister(sid).await;
        }
    }

    fn schedule_renewal(inner: &Arc<Inner>, service_id: ServiceId, sid: String, granted: Duration) -> RenewalTimer {
        let delay = renewal_delay(granted, inner.renewal_margin, inner.renewal_floor);
        debug!(%service_id, delay_secs = delay.as_secs(), "Renewal scheduled");

        let weak = Arc::downgrade(inner);
        RenewalTimer::schedule(delay, move || async move {
            let Some(inner) = weak.upgrade() else {
                return;
            };
            if let Err(e) = Inner::renew(&inner, &service_id, &sid).await {
                error!(
                    %service_id,
                    error = %e,
                    "Subscription renewal failed; no further events until resubscribed"
                );
            }
        })
    }

    /// Renew against the original subscription URL.
    ///
    /// Failure removes the subscription; it is not retried.
    async fn renew(inner: &Arc<Inner>, service_id: &ServiceId, sid: &str) -> Result<()> {
        let step = inner.step(service_id);
        let _step = step.lock().await;

        let url = match inner.subscriptions.read().await.get(service_id) {
            Some(subscription) if subscription.sid == sid => subscription.url.clone(),
            _ => return Ok(()),
        };

        match inner.soap.renew_subscription(&url, sid, inner.subscription_timeout).await {
            Ok(granted) => {
                let renewal = Inner::schedule_renewal(
                    inner,
                    service_id.clone(),
                    sid.to_string(),
                    Duration::from_secs(granted.into()),
                );
                if let Some(subscription) = inner.subscriptions.write().await.get_mut(service_id) {
                    subscription.renewal = renewal;
                }
                debug!(%service_id, granted, "Subscription renewed");
                Ok(())
            }
            Err(source) => {
                inner.subscriptions.write().await.remove(service_id);
                inner.forget_sid(sid).await;
                inner.server.lock().await.release().await;
                Err(ClientError::RenewalFailed {
                    service_id: service_id.clone(),
                    source,
                })
            }
        }
    }

    /// Fan a notification out to the listeners of the owning subscription.
    async fn deliver(&self, notification: NotificationPayload) {
        let service_id = ServiceId::from(notification.owner);

        let listeners = match self.subscriptions.read().await.get(&service_id) {
            Some(subscription) if subscription.sid == notification.subscription_id => {
                subscription.listeners.snapshot()
            }
            _ => {
                debug!(%service_id, sid = %notification.subscription_id, "Dropping event for stale subscription");
                return;
            }
        };

        let events: Vec<Event> = parse_property_set(&notification.event_xml)
            .into_iter()
            .map(|change| self.transforms.apply(change))
            .collect();

        debug!(
            %service_id,
            events = events.len(),
            listeners = listeners.len(),
            "Delivering events"
        );

        for listener in &listeners {
            for event in &events {
                if panic::catch_unwind(AssertUnwindSafe(|| listener(event))).is_err() {
                    error!(%service_id, event = %event.name, "Listener panicked; skipping");
                }
            }
        }
    }
}

/// Drain one callback server's notifications until it shuts down.
async fn dispatch(inner: Weak<Inner>, mut notifications: mpsc::UnboundedReceiver<NotificationPayload>) {
    while let Some(notification) = notifications.recv().await {
        let Some(inner) = inner.upgrade() else {
            break;
        };
        let sid = notification.subscription_id.clone();
        if AssertUnwindSafe(inner.deliver(notification)).catch_unwind().await.is_err() {
            error!(%sid, "Event delivery panicked; notification dropped");
        }
    }
}
