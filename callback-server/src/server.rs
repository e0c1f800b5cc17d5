//! HTTP server for receiving UPnP event notifications.

use std::convert::Infallible;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};
use warp::Filter;

use crate::error::CallbackServerError;
use crate::router::{EventRouter, NotificationPayload};

/// Body sent back for every notification, matched or not.
const ACK_BODY: &str = "OK";

/// HTTP callback server for receiving UPnP event notifications.
///
/// The `CallbackServer` binds to an ephemeral port on a network-facing
/// address and accepts event notifications on any path. Each request is
/// acknowledged with `200 OK`; its body is routed through an `EventRouter`
/// to a channel when the `SID` header names a registered subscription.
///
/// # Example
///
/// ```no_run
/// use tokio::sync::mpsc;
/// use callback_server::{CallbackServer, NotificationPayload};
///
/// #[tokio::main]
/// async fn main() {
///     let (tx, mut rx) = mpsc::unbounded_channel::<NotificationPayload>();
///
///     let server = CallbackServer::start(None, tx)
///         .await
///         .expect("Failed to create callback server");
///
///     println!("Server listening at: {}", server.base_url());
///
///     while let Some(notification) = rx.recv().await {
///         println!("Received event for {}", notification.owner);
///     }
/// }
/// ```
pub struct CallbackServer {
    /// Address the listener is bound to
    local_addr: SocketAddr,
    /// The base URL for callback registration
    base_url: String,
    /// Event router for handling incoming events
    event_router: Arc<EventRouter>,
    /// Shutdown signal sender
    shutdown_tx: Option<mpsc::Sender<()>>,
    /// Server task handle
    server_handle: Option<tokio::task::JoinHandle<()>>,
}

impl CallbackServer {
    /// Bind and start a callback server.
    ///
    /// When `bind_ip` is `None` the network-facing local address is detected;
    /// the port is always chosen by the OS. The returned server is already
    /// accepting connections.
    ///
    /// # Errors
    ///
    /// Returns `CallbackServerError::NoLocalAddress` if no usable address could
    /// be detected, or `CallbackServerError::Bind` if the listener could not be
    /// bound.
    pub async fn start(
        bind_ip: Option<IpAddr>,
        event_sender: mpsc::UnboundedSender<NotificationPayload>,
    ) -> Result<Self, CallbackServerError> {
        let ip = match bind_ip {
            Some(ip) => ip,
            None => detect_local_ip().ok_or(CallbackServerError::NoLocalAddress)?,
        };

        let event_router = Arc::new(EventRouter::new(event_sender));
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);

        let routes = Self::notify_route(event_router.clone());

        let (local_addr, server) = warp::serve(routes)
            .try_bind_with_graceful_shutdown(SocketAddr::new(ip, 0), async move {
                shutdown_rx.recv().await;
            })
            .map_err(|e| CallbackServerError::Bind(e.to_string()))?;

        let server_handle = tokio::spawn(server);
        let base_url = format!("http://{}:{}/", local_addr.ip(), local_addr.port());

        info!(%local_addr, "Callback server listening");

        Ok(Self {
            local_addr,
            base_url,
            event_router,
            shutdown_tx: Some(shutdown_tx),
            server_handle: Some(server_handle),
        })
    }

    /// Callback URL to advertise in `CALLBACK` headers, with a trailing slash.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Socket address the listener is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Get the port the server is bound to.
    pub fn port(&self) -> u16 {
        self.local_addr.port()
    }

    /// Get a reference to the event router.
    ///
    /// The router is used to register and unregister subscription IDs.
    pub fn router(&self) -> &Arc<EventRouter> {
        &self.event_router
    }

    /// Whether the server task is still running.
    pub fn is_listening(&self) -> bool {
        self.server_handle
            .as_ref()
            .map(|handle| !handle.is_finished())
            .unwrap_or(false)
    }

    /// Stop the callback server.
    ///
    /// Sends the shutdown signal and waits for in-flight requests to finish.
    /// Calling it again, or on a server whose task already ended, does
    /// nothing.
    pub async fn shutdown(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(()).await;
        }

        if let Some(handle) = self.server_handle.take() {
            let _ = handle.await;
            info!(local_addr = %self.local_addr, "Callback server stopped");
        }
    }

    /// Route accepting any method on any path.
    fn notify_route(
        router: Arc<EventRouter>,
    ) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
        warp::method()
            .and(warp::path::full())
            .and(warp::header::optional::<String>("sid"))
            .and(warp::header::optional::<String>("nts"))
            .and(warp::body::bytes())
            .and_then(
                move |method: warp::http::Method,
                      path: warp::path::FullPath,
                      sid: Option<String>,
                      nts: Option<String>,
                      body: bytes::Bytes| {
                    let router = router.clone();
                    async move {
                        debug!(
                            %method,
                            path = path.as_str(),
                            bytes = body.len(),
                            "Incoming event notification"
                        );

                        if let Some(nts) = nts.as_deref() {
                            if nts != "upnp:propchange" {
                                warn!(nts, "Unexpected NTS header on notification");
                            }
                        }

                        match sid {
                            Some(sid) => {
                                let event_xml = String::from_utf8_lossy(&body).into_owned();
                                trace!(%sid, %event_xml, "Notification body");
                                if !router.route_event(sid.clone(), event_xml).await {
                                    debug!(%sid, "Dropping notification for unknown subscription");
                                }
                            }
                            None => debug!("Dropping notification without SID header"),
                        }

                        Ok::<_, Infallible>(warp::reply::with_status(
                            ACK_BODY,
                            warp::http::StatusCode::OK,
                        ))
                    }
                },
            )
    }
}

impl Drop for CallbackServer {
    fn drop(&mut self) {
        // Dropping the sender resolves the graceful shutdown future.
        self.shutdown_tx.take();
    }
}

/// Detect the local IP address the device should call back on.
///
/// This uses a UDP socket connection to determine the local IPv4 address
/// that would be used for outbound connections. No data is actually sent.
/// Loopback results are rejected since a remote device cannot reach them.
pub fn detect_local_ip() -> Option<IpAddr> {
    let socket = std::net::UdpSocket::bind("0.0.0.0:0").ok()?;
    socket.connect("8.8.8.8:80").ok()?;
    let ip = socket.local_addr().ok()?.ip();

    (!ip.is_loopback() && !ip.is_unspecified()).then_some(ip)
}
