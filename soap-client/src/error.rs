//! Error types for the SOAP client

use thiserror::Error;

/// Errors that can occur during SOAP and GENA communication
#[derive(Debug, Error)]
pub enum SoapError {
    /// The HTTP exchange could not complete (connection refused, reset, DNS)
    #[error("Network/HTTP error: {0}")]
    Transport(String),

    /// The request was aborted after the configured timeout
    #[error("Request timed out")]
    Timeout,

    /// The device answered with a UPnP fault envelope
    #[error("UPnP fault {error_code} (HTTP {http_status}): {error_description}")]
    Fault {
        /// HTTP status of the response carrying the fault
        http_status: u16,
        /// Device supplied `errorCode`
        error_code: u32,
        /// Device supplied `errorDescription`
        error_description: String,
    },

    /// Non-success status without a parsable fault envelope
    #[error("Unexpected HTTP status {status}")]
    HttpStatus {
        /// The HTTP status code
        status: u16,
    },

    /// XML parsing error
    #[error("XML parsing error: {0}")]
    Parse(String),

    /// SUBSCRIBE succeeded but the device sent no SID header
    #[error("Missing SID header in SUBSCRIBE response")]
    MissingSid,
}

impl SoapError {
    /// HTTP status attached to this error, if the device answered at all.
    pub fn http_status(&self) -> Option<u16> {
        match self {
            SoapError::Fault { http_status, .. } => Some(*http_status),
            SoapError::HttpStatus { status } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for SoapError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            SoapError::Timeout
        } else {
            SoapError::Transport(err.to_string())
        }
    }
}
