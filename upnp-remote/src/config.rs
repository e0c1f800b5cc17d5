//! Configuration for the UPnP client
//!
//! Timeouts, renewal scheduling and callback binding are all tunable here;
//! the defaults match what media renderers in the field expect.

use std::net::IpAddr;
use std::time::Duration;

use crate::error::{ClientError, Result};
use crate::service_id::ServiceId;

/// Configuration for [`UpnpClient`](crate::UpnpClient)
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Timeout applied to every outbound HTTP exchange
    pub request_timeout: Duration,

    /// Subscription lifetime requested on SUBSCRIBE and renewal
    pub subscription_timeout: Duration,

    /// How long before expiry a subscription is renewed
    pub renewal_margin: Duration,

    /// Lower bound for the renewal delay
    pub renewal_floor: Duration,

    /// Path of the device description on the device's HTTP server
    pub description_path: String,

    /// Address the callback listener binds to.
    /// `None` detects the network-facing local address.
    pub callback_address: Option<IpAddr>,

    /// Services subscribed by `connect()`
    pub auto_services: Vec<ServiceId>,

    /// Capacity of the update broadcast channel
    pub update_buffer: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(2),
            subscription_timeout: Duration::from_secs(300),
            renewal_margin: Duration::from_secs(30),
            renewal_floor: Duration::from_secs(30),
            description_path: "/description.xml".to_string(),
            callback_address: None,
            auto_services: vec![
                ServiceId::resolve("AVTransport"),
                ServiceId::resolve("RenderingControl"),
            ],
            update_buffer: 64,
        }
    }
}

impl ClientConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Preset for devices on a slow or congested network
    pub fn slow_network() -> Self {
        Self {
            request_timeout: Duration::from_secs(10),
            ..Self::default()
        }
    }

    /// Preset that only talks to the device, never subscribing on `connect()`
    pub fn control_only() -> Self {
        Self {
            auto_services: Vec::new(),
            ..Self::default()
        }
    }

    /// Validate the configuration and return any issues
    pub fn validate(&self) -> Result<()> {
        if self.request_timeout.is_zero() {
            return Err(ClientError::Configuration(
                "request_timeout must be greater than 0".to_string(),
            ));
        }

        if self.subscription_timeout.as_secs() == 0 {
            return Err(ClientError::Configuration(
                "subscription_timeout must be at least one second".to_string(),
            ));
        }

        if self.subscription_timeout.as_secs() > u64::from(u32::MAX) {
            return Err(ClientError::Configuration(
                "subscription_timeout does not fit a TIMEOUT header".to_string(),
            ));
        }

        if self.renewal_floor.is_zero() {
            return Err(ClientError::Configuration(
                "renewal_floor must be greater than 0".to_string(),
            ));
        }

        if !self.description_path.starts_with('/') {
            return Err(ClientError::Configuration(
                "description_path must be an absolute path".to_string(),
            ));
        }

        if self.update_buffer == 0 {
            return Err(ClientError::Configuration(
                "update_buffer must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Requested subscription lifetime in whole seconds.
    pub(crate) fn subscription_timeout_secs(&self) -> u32 {
        u32::try_from(self.subscription_timeout.as_secs()).unwrap_or(u32::MAX)
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_subscription_timeout(mut self, timeout: Duration) -> Self {
        self.subscription_timeout = timeout;
        self
    }

    pub fn with_renewal(mut self, margin: Duration, floor: Duration) -> Self {
        self.renewal_margin = margin;
        self.renewal_floor = floor;
        self
    }

    pub fn with_description_path(mut self, path: impl Into<String>) -> Self {
        self.description_path = path.into();
        self
    }

    pub fn with_callback_address(mut self, address: IpAddr) -> Self {
        self.callback_address = Some(address);
        self
    }

    pub fn with_auto_services<I, S>(mut self, services: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<ServiceId>,
    {
        self.auto_services = services.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_update_buffer(mut self, capacity: usize) -> Self {
        self.update_buffer = capacity;
        self
    }
}
