//! The client facade.

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::join_all;
use soap_client::SoapClient;
use thiserror::Error;
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, error, info};

use crate::config::ClientConfig;
use crate::description::{DescriptionFetcher, DeviceDescription, ServiceDescription};
use crate::endpoint::{Endpoint, EndpointSource};
use crate::error::Result;
use crate::events::{Event, EventName, EventTransforms, EventValue, TrackMetadata};
use crate::invoker::{ActionArgs, ActionInvoker, ActionResponse};
use crate::service_id::ServiceId;
use crate::subscription::{Listener, ListenerId, SubscriptionManager};

/// A normalized state change, as emitted on [`UpnpClient::updates`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Update {
    /// Track metadata parsed from a DIDL-Lite payload
    Metadata(TrackMetadata),
    /// Any other variable; `name` is lowercased
    Property { name: String, value: EventValue },
}

impl Update {
    /// Normalize an event for consumers.
    ///
    /// Metadata events become [`Update::Metadata`], which is all `None`
    /// when the payload cannot be parsed.
    pub fn from_event(event: &Event) -> Self {
        if event.name.is_metadata() {
            let metadata = match &event.value {
                EventValue::Text(xml) => TrackMetadata::parse(xml),
                _ => TrackMetadata::default(),
            };
            return Update::Metadata(metadata);
        }

        Update::Property {
            name: event.name.as_str().to_lowercase(),
            value: event.value.clone(),
        }
    }
}

/// Why [`UpnpClient::health_check`] failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum HealthError {
    #[error("Callback server is not running")]
    NoEventsServer,
    #[error("No active subscriptions")]
    NoSubscriptions,
}

/// Control-point client for one UPnP device.
///
/// Descriptions are fetched on first use and cached until
/// [`cleanup`](Self::cleanup). Event subscriptions share one callback
/// server, which runs only while at least one subscription exists.
///
/// # Example
///
/// ```no_run
/// use upnp_remote::{ActionArgs, Endpoint, UpnpClient};
///
/// # async fn run() -> upnp_remote::Result<()> {
/// let client = UpnpClient::with_endpoint(Endpoint::new("192.168.1.40", 1400))?;
///
/// let volume = client
///     .call("RenderingControl", "GetVolume", &ActionArgs::new().arg("InstanceID", 0).arg("Channel", "Master"))
///     .await?;
/// println!("volume: {:?}", volume.get("CurrentVolume"));
///
/// let mut updates = client.updates();
/// client.connect().await;
/// while let Ok(update) = updates.recv().await {
///     println!("{update:?}");
/// }
/// # Ok(())
/// # }
/// ```
pub struct UpnpClient {
    config: ClientConfig,
    descriptions: Arc<DescriptionFetcher>,
    invoker: ActionInvoker,
    subscriptions: SubscriptionManager,
    updates: broadcast::Sender<Update>,
    state_listener: Listener,
    connected: Mutex<HashMap<ServiceId, ListenerId>>,
}

impl UpnpClient {
    /// Create a client with the default configuration and event transforms.
    pub fn with_endpoint(endpoint: impl EndpointSource + 'static) -> Result<Self> {
        Self::new(endpoint, ClientConfig::default())
    }

    /// Shorthand for a client at `address:port` with default settings.
    pub fn connect_to(address: impl Into<String>, port: u16) -> Result<Self> {
        Self::with_endpoint(Endpoint::new(address, port))
    }

    pub fn new(endpoint: impl EndpointSource + 'static, config: ClientConfig) -> Result<Self> {
        Self::with_transforms(endpoint, config, EventTransforms::default())
    }

    /// Create a client with a custom event transform table.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Configuration` if `config` is invalid.
    pub fn with_transforms(
        endpoint: impl EndpointSource + 'static,
        config: ClientConfig,
        transforms: EventTransforms,
    ) -> Result<Self> {
        config.validate()?;

        let soap = SoapClient::new(config.request_timeout)?;
        let endpoint: Arc<dyn EndpointSource> = Arc::new(endpoint);
        let descriptions = Arc::new(DescriptionFetcher::new(
            soap.clone(),
            endpoint,
            config.description_path.clone(),
        ));
        let invoker = ActionInvoker::new(soap.clone(), descriptions.clone());
        let subscriptions = SubscriptionManager::new(soap, descriptions.clone(), transforms, &config);

        let (updates, _) = broadcast::channel(config.update_buffer);
        let sender = updates.clone();
        let state_listener: Listener = Arc::new(move |event: &Event| {
            // No receivers is fine.
            let _ = sender.send(Update::from_event(event));
        });

        Ok(Self {
            config,
            descriptions,
            invoker,
            subscriptions,
            updates,
            state_listener,
            connected: Mutex::new(HashMap::new()),
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Invoke `action` on `service`.
    ///
    /// Returns the action's declared outputs in declared order.
    ///
    /// # Errors
    ///
    /// `UnknownService`/`UnknownAction` when the descriptions lack them,
    /// `ProtocolFault` for a device fault, `Timeout` or `Transport` when the
    /// exchange fails.
    pub async fn call(
        &self,
        service: impl Into<ServiceId>,
        action: &str,
        args: &ActionArgs,
    ) -> Result<ActionResponse> {
        let service_id = service.into();
        self.invoker.invoke(&service_id, action, args).await
    }

    pub async fn subscribe(&self, service: impl Into<ServiceId>, listener: Listener) -> Result<ListenerId> {
        self.subscriptions.subscribe(&service.into(), listener).await
    }

    pub async fn unsubscribe(&self, service: impl Into<ServiceId>, listener: ListenerId) -> Result<()> {
        self.subscriptions.unsubscribe(&service.into(), listener).await
    }

    /// Subscribe the configured services with the update forwarder.
    ///
    /// Failures are logged per service and do not abort the others.
    pub async fn connect(&self) {
        info!(services = self.config.auto_services.len(), "Connecting");

        let attempts = self.config.auto_services.iter().map(|service_id| async move {
            let result = self
                .subscriptions
                .subscribe(service_id, self.state_listener.clone())
                .await;
            (service_id, result)
        });

        for (service_id, result) in join_all(attempts).await {
            match result {
                Ok(id) => {
                    self.connected.lock().await.insert(service_id.clone(), id);
                }
                Err(e) => error!(%service_id, error = %e, "Failed to subscribe"),
            }
        }
    }

    /// Tear everything down: renewals, subscriptions, the callback server
    /// and both description caches. Never fails.
    pub async fn cleanup(&self) {
        info!("Cleanup");

        self.connected.lock().await.clear();
        self.subscriptions.cleanup().await;
        self.descriptions.reset().await;
    }

    pub async fn has_subscriptions(&self) -> bool {
        self.subscriptions.has_subscriptions().await
    }

    pub async fn has_subscription(&self, service: impl Into<ServiceId>) -> bool {
        self.subscriptions.has_subscription(&service.into()).await
    }

    /// SID of the live subscription for `service`.
    pub async fn subscription_sid(&self, service: impl Into<ServiceId>) -> Option<String> {
        self.subscriptions.subscription_sid(&service.into()).await
    }

    pub async fn listener_count(&self, service: impl Into<ServiceId>) -> usize {
        self.subscriptions.listener_count(&service.into()).await
    }

    pub async fn has_events_server(&self) -> bool {
        self.subscriptions.has_events_server().await
    }

    /// Callback URL advertised to the device, while the server runs.
    pub async fn events_server_url(&self) -> Option<String> {
        self.subscriptions.events_server_url().await
    }

    /// Fails when the client is not receiving events.
    ///
    /// A host polling this should tear the client down and reconnect on
    /// error; a failed renewal is only observable this way.
    pub async fn health_check(&self) -> std::result::Result<(), HealthError> {
        if !self.has_events_server().await {
            return Err(HealthError::NoEventsServer);
        }

        let connected = self.connected.lock().await.clone();
        for service_id in connected.keys() {
            if !self.subscriptions.has_subscription(service_id).await {
                return Err(HealthError::NoSubscriptions);
            }
        }

        if !self.has_subscriptions().await {
            return Err(HealthError::NoSubscriptions);
        }

        Ok(())
    }

    /// Subscribe to normalized updates from the services joined by
    /// [`connect`](Self::connect).
    pub fn updates(&self) -> broadcast::Receiver<Update> {
        self.updates.subscribe()
    }

    /// Normalize `event` and emit it on the update stream.
    pub fn handle_state_update(&self, event: &Event) {
        (self.state_listener)(event);
    }

    pub async fn device_description(&self) -> Result<Arc<DeviceDescription>> {
        self.descriptions.device_description().await
    }

    pub async fn service_description(&self, service: impl Into<ServiceId>) -> Result<Arc<ServiceDescription>> {
        self.descriptions.service_description(&service.into()).await
    }

    pub async fn has_service(&self, service: impl Into<ServiceId>) -> Result<bool> {
        self.descriptions.has_service(&service.into()).await
    }

    /// `AVTransport#GetMediaInfo` for instance 0.
    pub async fn media_info(&self) -> Result<ActionResponse> {
        self.call("AVTransport", "GetMediaInfo", &ActionArgs::new().arg("InstanceID", 0))
            .await
    }

    /// Push the current media's metadata through the update stream, so
    /// consumers start with the track that is already playing.
    pub async fn sync_media_info(&self) -> Result<()> {
        let info = self.media_info().await?;
        let metadata = info.get("CurrentURIMetaData").unwrap_or_default();
        debug!(bytes = metadata.len(), "Syncing media info");

        self.handle_state_update(&Event::new(
            EventName::CurrentTrackMetaData,
            EventValue::Text(metadata.to_string()),
        ));
        Ok(())
    }
}
