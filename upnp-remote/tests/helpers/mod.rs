//! Shared helpers: a mock renderer built on mockito, recording listeners and
//! NOTIFY delivery.

#![allow(dead_code)]

use std::fs;
use std::io::{Read, Write};
use std::net::TcpStream;
use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use mockito::{Matcher, Mock, Server, ServerGuard};
use tokio::sync::mpsc;
use tokio::time::timeout;
use upnp_remote::{ClientConfig, Endpoint, Event, Listener, UpnpClient};

pub const AV_TRANSPORT_CONTROL: &str = "/upnp/control/AVTransport1";
pub const AV_TRANSPORT_EVENTS: &str = "/upnp/event/AVTransport1";
pub const RENDERING_CONTROL: &str = "/upnp/control/RenderingControl1";
pub const RENDERING_EVENTS: &str = "/upnp/event/RenderingControl1";

pub fn fixture(name: &str) -> String {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests/fixtures");
    path.push(name);

    fs::read_to_string(&path).unwrap_or_else(|e| panic!("Failed to load fixture {name}: {e}"))
}

/// A renderer simulated by a mockito server.
pub struct MockDevice {
    pub server: ServerGuard,
}

impl MockDevice {
    /// Start a device that serves its description and both SCPDs.
    pub async fn start() -> Self {
        let mut device = Self::bare().await;
        device.serve_description().await;
        device.serve_scpds().await;
        device
    }

    /// Start a device with no mocks mounted.
    pub async fn bare() -> Self {
        Self {
            server: Server::new_async().await,
        }
    }

    pub async fn serve_description(&mut self) -> Mock {
        self.description_mock().create_async().await
    }

    /// Serve the description, expecting exactly `hits` fetches.
    pub async fn serve_description_times(&mut self, hits: usize) -> Mock {
        self.description_mock().expect(hits).create_async().await
    }

    fn description_mock(&mut self) -> Mock {
        self.server
            .mock("GET", "/description.xml")
            .with_status(200)
            .with_header("content-type", "text/xml")
            .with_body(fixture("description.xml"))
    }

    pub async fn serve_scpds(&mut self) {
        for name in ["AVTransport.xml", "RenderingControl.xml"] {
            self.server
                .mock("GET", format!("/{name}").as_str())
                .with_status(200)
                .with_header("content-type", "text/xml")
                .with_body(fixture(name))
                .create_async()
                .await;
        }
    }

    pub fn endpoint(&self) -> Endpoint {
        let url = url::Url::parse(&self.server.url()).expect("mockito URL");
        Endpoint::new(
            url.host_str().expect("mockito host"),
            url.port().expect("mockito port"),
        )
    }

    pub fn client(&self) -> UpnpClient {
        self.client_with(test_config())
    }

    pub fn client_with(&self, config: ClientConfig) -> UpnpClient {
        UpnpClient::new(self.endpoint(), config).expect("client should build")
    }

    /// Accept an initial SUBSCRIBE on `path`, granting `granted` seconds.
    pub async fn accept_subscribe(&mut self, path: &str, sid: &str, granted: u32) -> Mock {
        self.subscribe_mock(path, sid, granted).create_async().await
    }

    /// Initial SUBSCRIBE mock, not yet mounted.
    pub fn subscribe_mock(&mut self, path: &str, sid: &str, granted: u32) -> Mock {
        self.server
            .mock("SUBSCRIBE", path)
            .match_header("nt", "upnp:event")
            .match_header("callback", Matcher::Regex(r"^<http://127\.0\.0\.1:\d+/>$".to_string()))
            .match_header("timeout", "Second-300")
            .match_header("sid", Matcher::Missing)
            .with_status(200)
            .with_header("SID", sid)
            .with_header("TIMEOUT", &format!("Second-{granted}"))
    }

    /// Renewal of `sid` on `path`, answered with `status`. Not yet mounted.
    pub fn renewal_mock(&mut self, path: &str, sid: &str, status: usize, granted: u32) -> Mock {
        self.server
            .mock("SUBSCRIBE", path)
            .match_header("sid", sid)
            .match_header("nt", Matcher::Missing)
            .match_header("callback", Matcher::Missing)
            .with_status(status)
            .with_header("SID", sid)
            .with_header("TIMEOUT", &format!("Second-{granted}"))
    }

    pub fn unsubscribe_mock(&mut self, path: &str, sid: &str, status: usize) -> Mock {
        self.server
            .mock("UNSUBSCRIBE", path)
            .match_header("sid", sid)
            .with_status(status)
    }

    pub async fn answer_unsubscribe(&mut self, path: &str, sid: &str, status: usize) -> Mock {
        self.unsubscribe_mock(path, sid, status).create_async().await
    }

    pub async fn answer_action(&mut self, path: &str, action: &str, status: usize, body: &str) -> Mock {
        self.server
            .mock("POST", path)
            .match_header("soapaction", Matcher::Regex(format!("#{action}\"$")))
            .with_status(status)
            .with_body(body)
            .create_async()
            .await
    }
}

/// Loopback callback address, short timeouts.
pub fn test_config() -> ClientConfig {
    ClientConfig::default()
        .with_callback_address(IpAddr::V4(Ipv4Addr::LOCALHOST))
        .with_request_timeout(Duration::from_secs(2))
}

/// A listener that forwards every event to a channel.
pub fn recording_listener() -> (Listener, mpsc::UnboundedReceiver<Event>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let listener: Listener = Arc::new(move |event: &Event| {
        let _ = tx.send(event.clone());
    });
    (listener, rx)
}

pub async fn next_event(rx: &mut mpsc::UnboundedReceiver<Event>) -> Event {
    timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("Timeout waiting for event")
        .expect("Listener channel closed")
}

pub async fn assert_no_event(rx: &mut mpsc::UnboundedReceiver<Event>) {
    let result = timeout(Duration::from_millis(200), rx.recv()).await;
    assert!(result.is_err(), "unexpected event: {result:?}");
}

/// Wrap `(name, value)` pairs into a property set, escaping values.
pub fn property_set(properties: &[(&str, &str)]) -> String {
    let mut xml = String::from(r#"<?xml version="1.0"?><e:propertyset xmlns:e="urn:schemas-upnp-org:event-1-0">"#);
    for (name, value) in properties {
        xml.push_str(&format!(
            "<e:property><{name}>{}</{name}></e:property>",
            quick_xml::escape::escape(*value)
        ));
    }
    xml.push_str("</e:propertyset>");
    xml
}

/// Send a NOTIFY the way a device would.
pub async fn notify(callback_url: &str, sid: &str, body: String) -> reqwest::Response {
    reqwest::Client::new()
        .request(reqwest::Method::from_bytes(b"NOTIFY").unwrap(), callback_url)
        .header("CONTENT-TYPE", "text/xml; charset=\"utf-8\"")
        .header("NT", "upnp:event")
        .header("NTS", "upnp:propchange")
        .header("SID", sid)
        .header("SEQ", "0")
        .body(body)
        .send()
        .await
        .expect("NOTIFY should be delivered")
}

pub fn soap_response(action: &str, service_type: &str, body: &str) -> String {
    format!(
        r#"<?xml version="1.0"?><s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/" s:encodingStyle="http://schemas.xmlsoap.org/soap/encoding/"><s:Body><u:{action}Response xmlns:u="{service_type}">{body}</u:{action}Response></s:Body></s:Envelope>"#
    )
}

pub fn soap_fault(code: u32, description: &str) -> String {
    format!(
        r#"<?xml version="1.0"?><s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/"><s:Body><s:Fault><faultcode>s:Client</faultcode><faultstring>UPnPError</faultstring><detail><UPnPError xmlns="urn:schemas-upnp-org:control-1-0"><errorCode>{code}</errorCode><errorDescription>{description}</errorDescription></UPnPError></detail></s:Fault></s:Body></s:Envelope>"#
    )
}

/// Blocking NOTIFY over a raw socket, for use from mock response callbacks.
pub fn send_raw_notify(callback_url: &str, sid: &str, body: &str) {
    let url = url::Url::parse(callback_url).expect("callback URL");
    let host = url.host_str().expect("callback host");
    let port = url.port().expect("callback port");

    let mut stream = TcpStream::connect((host, port)).expect("callback server reachable");
    let request = format!(
        "NOTIFY {} HTTP/1.1\r\nHOST: {host}:{port}\r\nCONTENT-TYPE: text/xml\r\nNT: upnp:event\r\nNTS: upnp:propchange\r\nSID: {sid}\r\nSEQ: 0\r\nCONTENT-LENGTH: {}\r\nCONNECTION: close\r\n\r\n{body}",
        url.path(),
        body.len()
    );
    stream.write_all(request.as_bytes()).expect("NOTIFY written");

    let mut response = String::new();
    let _ = stream.read_to_string(&mut response);
}
