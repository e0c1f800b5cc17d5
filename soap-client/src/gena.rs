//! GENA subscription exchanges: SUBSCRIBE, renewal and UNSUBSCRIBE.

use reqwest::Method;
use tracing::debug;
use url::Url;

use crate::error::SoapError;
use crate::SoapClient;

/// Response from a UPnP subscription request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionResponse {
    /// Subscription ID returned by the device
    pub sid: String,
    /// Actual timeout granted by the device (in seconds)
    pub timeout_seconds: u32,
}

/// Parse a `TIMEOUT` header of the form `Second-<n>`.
///
/// Returns `None` for `Second-infinite` or anything unparsable.
pub fn parse_timeout_header(value: &str) -> Option<u32> {
    let value = value.trim();
    let prefix = value.get(..7)?;
    if !prefix.eq_ignore_ascii_case("Second-") {
        return None;
    }
    value[7..].trim().parse::<u32>().ok()
}

/// `HOST` header value (`host[:port]`) for an event URL.
fn host_header(url: &Url) -> String {
    let host = url.host_str().unwrap_or_default();
    match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    }
}

fn extension_method(name: &'static str) -> Result<Method, SoapError> {
    Method::from_bytes(name.as_bytes()).map_err(|e| SoapError::Transport(e.to_string()))
}

fn granted_timeout(response: &reqwest::Response, requested: u32) -> u32 {
    response
        .headers()
        .get("TIMEOUT")
        .and_then(|v| v.to_str().ok())
        .and_then(parse_timeout_header)
        .unwrap_or(requested)
}

impl SoapClient {
    /// Subscribe to events of the service at `event_url`.
    ///
    /// # Arguments
    /// * `event_url` - The service's `eventSubURL`
    /// * `callback_url` - URL where events should be sent, without angle brackets
    /// * `timeout_seconds` - Requested subscription timeout in seconds
    ///
    /// # Returns
    /// The SID and the timeout the device granted (the requested value when
    /// the device sent none).
    pub async fn subscribe(
        &self,
        event_url: &Url,
        callback_url: &str,
        timeout_seconds: u32,
    ) -> Result<SubscriptionResponse, SoapError> {
        debug!(%event_url, callback_url, "SUBSCRIBE");

        let response = self
            .http
            .request(extension_method("SUBSCRIBE")?, event_url.clone())
            .header("HOST", host_header(event_url))
            .header("CALLBACK", format!("<{callback_url}>"))
            .header("NT", "upnp:event")
            .header("TIMEOUT", format!("Second-{timeout_seconds}"))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(SoapError::HttpStatus {
                status: status.as_u16(),
            });
        }

        let sid = response
            .headers()
            .get("SID")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or(SoapError::MissingSid)?;

        Ok(SubscriptionResponse {
            sid,
            timeout_seconds: granted_timeout(&response, timeout_seconds),
        })
    }

    /// Renew an existing subscription against the URL it was created on.
    ///
    /// # Returns
    /// The timeout granted by the device
    pub async fn renew_subscription(
        &self,
        event_url: &Url,
        sid: &str,
        timeout_seconds: u32,
    ) -> Result<u32, SoapError> {
        debug!(%event_url, sid, "SUBSCRIBE (renew)");

        let response = self
            .http
            .request(extension_method("SUBSCRIBE")?, event_url.clone())
            .header("HOST", host_header(event_url))
            .header("SID", sid)
            .header("TIMEOUT", format!("Second-{timeout_seconds}"))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(SoapError::HttpStatus {
                status: status.as_u16(),
            });
        }

        Ok(granted_timeout(&response, timeout_seconds))
    }

    /// Cancel a subscription.
    pub async fn unsubscribe(&self, event_url: &Url, sid: &str) -> Result<(), SoapError> {
        debug!(%event_url, sid, "UNSUBSCRIBE");

        let response = self
            .http
            .request(extension_method("UNSUBSCRIBE")?, event_url.clone())
            .header("HOST", host_header(event_url))
            .header("SID", sid)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(SoapError::HttpStatus {
                status: status.as_u16(),
            });
        }

        Ok(())
    }
}
