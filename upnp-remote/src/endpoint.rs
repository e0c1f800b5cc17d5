//! Where the device lives.
//!
//! The host framework owns the device's address and port; the client only
//! reads them, when the device description is first needed.

use std::sync::Arc;

/// Network location of the device's HTTP server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub address: String,
    pub port: u16,
}

impl Endpoint {
    pub fn new(address: impl Into<String>, port: u16) -> Self {
        Self {
            address: address.into(),
            port,
        }
    }

    /// `http://{address}:{port}{path}`
    pub fn url(&self, path: &str) -> String {
        format!("http://{}:{}{}", self.address, self.port, path)
    }
}

/// Supplies the current endpoint of the device.
///
/// Returning `None` means the host does not know the device's address yet.
pub trait EndpointSource: Send + Sync {
    fn endpoint(&self) -> Option<Endpoint>;
}

impl EndpointSource for Endpoint {
    fn endpoint(&self) -> Option<Endpoint> {
        Some(self.clone())
    }
}

impl<T: EndpointSource + ?Sized> EndpointSource for Arc<T> {
    fn endpoint(&self) -> Option<Endpoint> {
        (**self).endpoint()
    }
}
