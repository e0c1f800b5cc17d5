//! Private SOAP client for UPnP device communication
//!
//! This crate provides a minimal async SOAP client for talking to UPnP
//! renderers: fetching description documents, invoking actions, and the
//! GENA SUBSCRIBE/UNSUBSCRIBE exchanges used for eventing.

pub mod envelope;
mod error;
mod gena;

pub use envelope::UpnpFault;
pub use error::SoapError;
pub use gena::{parse_timeout_header, SubscriptionResponse};

use std::time::Duration;
use tracing::debug;
use xmltree::Element;

/// Content type sent with every action request.
pub const SOAP_CONTENT_TYPE: &str = "text/xml; charset=\"utf-8\"";

/// A minimal async SOAP client for UPnP device communication
#[derive(Debug, Clone)]
pub struct SoapClient {
    http: reqwest::Client,
}

impl SoapClient {
    /// Create a client whose every request is aborted after `timeout`.
    ///
    /// # Errors
    ///
    /// Returns `SoapError::Transport` if the HTTP client cannot be built.
    pub fn new(timeout: Duration) -> Result<Self, SoapError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { http })
    }

    /// GET a document and return its body.
    ///
    /// Non-success statuses are reported as `SoapError::HttpStatus`.
    pub async fn get_text(&self, url: &str) -> Result<String, SoapError> {
        debug!(url, "GET");

        let response = self.http.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(SoapError::HttpStatus {
                status: status.as_u16(),
            });
        }

        Ok(response.text().await?)
    }

    /// Invoke `action` and return the parsed `<{action}Response>` element.
    ///
    /// # Arguments
    /// * `control_url` - The service's absolute `controlURL`
    /// * `service_type` - Service type URN, used as the action namespace
    /// * `action` - The SOAP action name
    /// * `args` - Arguments in order; `None` is sent as an empty element
    ///
    /// # Errors
    ///
    /// A non-success status yields `SoapError::Fault` when the body is a fault
    /// envelope and `SoapError::HttpStatus` otherwise.
    pub async fn call(
        &self,
        control_url: &str,
        service_type: &str,
        action: &str,
        args: &[(&str, Option<&str>)],
    ) -> Result<Element, SoapError> {
        let body = envelope::build_envelope(service_type, action, args);
        let soap_action = format!("\"{service_type}#{action}\"");

        debug!(control_url, %soap_action, bytes = body.len(), "SOAP request");

        let response = self
            .http
            .post(control_url)
            .header("Content-Type", SOAP_CONTENT_TYPE)
            .header("Content-Length", body.len())
            .header("Connection", "close")
            .header("SOAPACTION", soap_action)
            .body(body)
            .send()
            .await?;

        let status = response.status();
        let xml_text = response.text().await?;

        if !status.is_success() {
            return Err(match envelope::parse_fault(&xml_text) {
                Some(fault) => SoapError::Fault {
                    http_status: status.as_u16(),
                    error_code: fault.error_code,
                    error_description: fault.error_description,
                },
                None => SoapError::HttpStatus {
                    status: status.as_u16(),
                },
            });
        }

        envelope::parse_action_response(&xml_text, action, status.as_u16())
    }
}
