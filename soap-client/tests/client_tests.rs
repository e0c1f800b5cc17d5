//! HTTP-level tests for the SOAP client against a mock device.

use mockito::{Matcher, Server};
use soap_client::{SoapClient, SoapError, SubscriptionResponse};
use std::time::Duration;
use url::Url;

const AV_TRANSPORT: &str = "urn:schemas-upnp-org:service:AVTransport:1";

fn client() -> SoapClient {
    SoapClient::new(Duration::from_secs(2)).expect("client should build")
}

#[tokio::test]
async fn test_call_sends_required_headers_and_parses_response() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/upnp/control/rendertransport1")
        .match_header("content-type", "text/xml; charset=\"utf-8\"")
        .match_header("soapaction", "\"urn:schemas-upnp-org:service:AVTransport:1#GetMediaInfo\"")
        .match_header("connection", "close")
        .match_header("content-length", Matcher::Regex(r"^\d+$".to_string()))
        .match_body(Matcher::Regex("<InstanceID>0</InstanceID>".to_string()))
        .with_status(200)
        .with_body(
            r#"<s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/"><s:Body>
               <u:GetMediaInfoResponse xmlns:u="urn:schemas-upnp-org:service:AVTransport:1">
               <NrTracks>1</NrTracks><CurrentURI>http://radio/stream</CurrentURI>
               </u:GetMediaInfoResponse></s:Body></s:Envelope>"#,
        )
        .create_async()
        .await;

    let url = format!("{}/upnp/control/rendertransport1", server.url());
    let response = client()
        .call(&url, AV_TRANSPORT, "GetMediaInfo", &[("InstanceID", Some("0"))])
        .await
        .expect("call should succeed");

    assert_eq!(response.name, "GetMediaInfoResponse");
    mock.assert_async().await;
}

#[tokio::test]
async fn test_call_maps_fault_envelope() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/ctl")
        .with_status(500)
        .with_body(
            r#"<s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/"><s:Body><s:Fault>
               <faultcode>s:Client</faultcode><faultstring>UPnPError</faultstring>
               <detail><UPnPError xmlns="urn:schemas-upnp-org:control-1-0">
               <errorCode>402</errorCode><errorDescription>Invalid Args</errorDescription>
               </UPnPError></detail></s:Fault></s:Body></s:Envelope>"#,
        )
        .create_async()
        .await;

    let url = format!("{}/ctl", server.url());
    let err = client().call(&url, AV_TRANSPORT, "Play", &[]).await.unwrap_err();

    match err {
        SoapError::Fault {
            http_status,
            error_code,
            error_description,
        } => {
            assert_eq!(http_status, 500);
            assert_eq!(error_code, 402);
            assert_eq!(error_description, "Invalid Args");
        }
        other => panic!("expected fault, got {other:?}"),
    }
}

#[tokio::test]
async fn test_call_malformed_fault_is_still_an_error() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/ctl")
        .with_status(500)
        .with_body("<html>Internal Server Error")
        .create_async()
        .await;

    let url = format!("{}/ctl", server.url());
    let err = client().call(&url, AV_TRANSPORT, "Play", &[]).await.unwrap_err();
    assert!(matches!(err, SoapError::HttpStatus { status: 500 }));
}

#[tokio::test]
async fn test_subscribe_renew_unsubscribe_headers() {
    let mut server = Server::new_async().await;
    let host = server.host_with_port();

    let subscribe = server
        .mock("SUBSCRIBE", "/event/avt")
        .match_header("host", host.as_str())
        .match_header("callback", "<http://192.168.1.5:40000/>")
        .match_header("nt", "upnp:event")
        .match_header("timeout", "Second-300")
        .match_header("sid", Matcher::Missing)
        .with_status(200)
        .with_header("SID", "uuid:sub-1")
        .with_header("TIMEOUT", "Second-1800")
        .expect(1)
        .create_async()
        .await;

    let renew = server
        .mock("SUBSCRIBE", "/event/avt")
        .match_header("sid", "uuid:sub-1")
        .match_header("callback", Matcher::Missing)
        .match_header("nt", Matcher::Missing)
        .match_header("timeout", "Second-300")
        .with_status(200)
        .with_header("TIMEOUT", "Second-120")
        .expect(1)
        .create_async()
        .await;

    let unsubscribe = server
        .mock("UNSUBSCRIBE", "/event/avt")
        .match_header("sid", "uuid:sub-1")
        .with_status(200)
        .expect(1)
        .create_async()
        .await;

    let url = Url::parse(&format!("{}/event/avt", server.url())).unwrap();
    let client = client();

    let response = client
        .subscribe(&url, "http://192.168.1.5:40000/", 300)
        .await
        .unwrap();
    assert_eq!(
        response,
        SubscriptionResponse {
            sid: "uuid:sub-1".to_string(),
            timeout_seconds: 1800
        }
    );

    assert_eq!(client.renew_subscription(&url, "uuid:sub-1", 300).await.unwrap(), 120);
    client.unsubscribe(&url, "uuid:sub-1").await.unwrap();

    subscribe.assert_async().await;
    renew.assert_async().await;
    unsubscribe.assert_async().await;
}

#[tokio::test]
async fn test_subscribe_rejected_and_missing_sid() {
    let mut server = Server::new_async().await;
    server
        .mock("SUBSCRIBE", "/rejected")
        .with_status(412)
        .create_async()
        .await;
    server
        .mock("SUBSCRIBE", "/no-sid")
        .with_status(200)
        .create_async()
        .await;

    let client = client();

    let rejected = Url::parse(&format!("{}/rejected", server.url())).unwrap();
    let err = client.subscribe(&rejected, "http://h/", 300).await.unwrap_err();
    assert!(matches!(err, SoapError::HttpStatus { status: 412 }));

    let no_sid = Url::parse(&format!("{}/no-sid", server.url())).unwrap();
    let err = client.subscribe(&no_sid, "http://h/", 300).await.unwrap_err();
    assert!(matches!(err, SoapError::MissingSid));
}

#[tokio::test]
async fn test_get_text_non_success() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/description.xml")
        .with_status(404)
        .create_async()
        .await;

    let err = client()
        .get_text(&format!("{}/description.xml", server.url()))
        .await
        .unwrap_err();
    assert!(matches!(err, SoapError::HttpStatus { status: 404 }));
}

/// A device that accepts the connection but never answers must surface as a
/// timeout, not as a generic transport failure.
#[tokio::test]
async fn test_unresponsive_device_times_out() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let _hold = tokio::spawn(async move {
        let mut open = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            open.push(socket);
        }
    });

    let client = SoapClient::new(Duration::from_millis(200)).unwrap();
    let err = client
        .call(&format!("http://{addr}/ctl"), AV_TRANSPORT, "Play", &[])
        .await
        .unwrap_err();

    assert!(matches!(err, SoapError::Timeout), "got {err:?}");
}

#[tokio::test]
async fn test_connection_refused_is_transport_error() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let err = client()
        .get_text(&format!("http://{addr}/description.xml"))
        .await
        .unwrap_err();
    assert!(matches!(err, SoapError::Transport(_)), "got {err:?}");
}
