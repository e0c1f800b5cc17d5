//! Fully qualified UPnP service identifiers.

use std::fmt;

/// Prefix added to bare service names such as `AVTransport`.
pub const SERVICE_ID_PREFIX: &str = "urn:upnp-org:serviceId:";

/// A service identifier, always in fully qualified form.
///
/// Bare names (no colon) are prefixed with [`SERVICE_ID_PREFIX`]; anything
/// containing a colon is taken as already qualified.
///
/// ```
/// use upnp_remote::ServiceId;
///
/// assert_eq!(ServiceId::resolve("AVTransport").as_str(), "urn:upnp-org:serviceId:AVTransport");
/// assert_eq!(ServiceId::resolve("urn:x:serviceId:Y").as_str(), "urn:x:serviceId:Y");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ServiceId(String);

impl ServiceId {
    /// Normalize `id` to its fully qualified form.
    pub fn resolve(id: &str) -> Self {
        if id.contains(':') {
            Self(id.to_string())
        } else {
            Self(format!("{SERVICE_ID_PREFIX}{id}"))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Last colon-separated segment, e.g. `AVTransport`.
    pub fn short_name(&self) -> &str {
        self.0.rsplit(':').next().unwrap_or(&self.0)
    }
}

impl fmt::Display for ServiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ServiceId {
    fn from(id: &str) -> Self {
        Self::resolve(id)
    }
}

impl From<String> for ServiceId {
    fn from(id: String) -> Self {
        if id.contains(':') {
            Self(id)
        } else {
            Self::resolve(&id)
        }
    }
}

impl From<&ServiceId> for ServiceId {
    fn from(id: &ServiceId) -> Self {
        id.clone()
    }
}
