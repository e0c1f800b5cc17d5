//! Error types for the UPnP client

use callback_server::CallbackServerError;
use soap_client::SoapError;
use thiserror::Error;

use crate::service_id::ServiceId;

/// Errors surfaced by [`UpnpClient`](crate::UpnpClient) operations
#[derive(Debug, Error)]
pub enum ClientError {
    /// The HTTP exchange could not complete
    #[error("Network/HTTP error: {0}")]
    Transport(String),

    /// The device did not answer within the request timeout
    #[error("Request timed out")]
    Timeout,

    /// The device answered with a UPnP fault envelope
    #[error("UPnP fault {error_code} (HTTP {http_status}): {error_description}")]
    ProtocolFault {
        http_status: u16,
        error_code: u32,
        error_description: String,
    },

    /// Non-success status without a parsable fault
    #[error("Unexpected HTTP status {0}")]
    HttpStatus(u16),

    /// A success response that could not be understood
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// The device description does not list the service
    #[error("Unknown service: {0}")]
    UnknownService(ServiceId),

    /// The service description does not declare the action
    #[error("Unknown action {action} on {service_id}")]
    UnknownAction { service_id: ServiceId, action: String },

    /// The device refused a SUBSCRIBE
    #[error("Subscription to {service_id} rejected with HTTP {status}")]
    Subscription { service_id: ServiceId, status: u16 },

    /// The device refused an UNSUBSCRIBE; local state was still cleared
    #[error("Unsubscribe from {service_id} rejected with HTTP {status}")]
    Unsubscribe { service_id: ServiceId, status: u16 },

    /// A renewal SUBSCRIBE failed and the subscription was dropped
    #[error("Renewal of {service_id} failed: {source}")]
    RenewalFailed {
        service_id: ServiceId,
        source: SoapError,
    },

    /// The device or service description could not be fetched or parsed
    #[error("Failed to fetch description from {url}: {reason}")]
    DescriptionFetch { url: String, reason: String },

    #[error("Callback server error: {0}")]
    CallbackServer(#[from] CallbackServerError),

    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The endpoint source has no address for the device yet
    #[error("Device endpoint is not available")]
    MissingEndpoint,
}

impl ClientError {
    /// Map a failed SUBSCRIBE, keeping the service in rejection errors.
    pub(crate) fn subscribe_failed(service_id: &ServiceId, err: SoapError) -> Self {
        match err {
            SoapError::HttpStatus { status } | SoapError::Fault { http_status: status, .. } => {
                ClientError::Subscription {
                    service_id: service_id.clone(),
                    status,
                }
            }
            other => other.into(),
        }
    }

    /// Map a failed UNSUBSCRIBE, keeping the service in rejection errors.
    pub(crate) fn unsubscribe_failed(service_id: &ServiceId, err: SoapError) -> Self {
        match err {
            SoapError::HttpStatus { status } | SoapError::Fault { http_status: status, .. } => {
                ClientError::Unsubscribe {
                    service_id: service_id.clone(),
                    status,
                }
            }
            other => other.into(),
        }
    }

    /// Errors raised before anything was sent to the device.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            ClientError::UnknownService(_)
                | ClientError::UnknownAction { .. }
                | ClientError::Configuration(_)
                | ClientError::MissingEndpoint
        )
    }

    pub fn is_timeout(&self) -> bool {
        match self {
            ClientError::Timeout => true,
            ClientError::RenewalFailed { source, .. } => matches!(source, SoapError::Timeout),
            _ => false,
        }
    }

    /// HTTP status the device answered with, if any.
    pub fn http_status(&self) -> Option<u16> {
        match self {
            ClientError::ProtocolFault { http_status, .. } => Some(*http_status),
            ClientError::HttpStatus(status)
            | ClientError::Subscription { status, .. }
            | ClientError::Unsubscribe { status, .. } => Some(*status),
            ClientError::RenewalFailed { source, .. } => source.http_status(),
            _ => None,
        }
    }
}

impl From<SoapError> for ClientError {
    fn from(err: SoapError) -> Self {
        match err {
            SoapError::Transport(msg) => ClientError::Transport(msg),
            SoapError::Timeout => ClientError::Timeout,
            SoapError::Fault {
                http_status,
                error_code,
                error_description,
            } => ClientError::ProtocolFault {
                http_status,
                error_code,
                error_description,
            },
            SoapError::HttpStatus { status } => ClientError::HttpStatus(status),
            SoapError::Parse(msg) => ClientError::InvalidResponse(msg),
            missing @ SoapError::MissingSid => ClientError::InvalidResponse(missing.to_string()),
        }
    }
}

/// Result type for client operations
pub type Result<T> = std::result::Result<T, ClientError>;
