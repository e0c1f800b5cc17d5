//! Reference-counted ownership of the callback server.

use std::net::IpAddr;
use std::sync::Arc;

use callback_server::{CallbackServer, EventRouter, NotificationPayload};
use tokio::sync::mpsc;
use tracing::debug;

use crate::error::Result;

/// Result of [`EventsServer::acquire`].
pub(crate) struct Acquired {
    pub callback_url: String,
    /// Set when this call started a new server; the caller must drain it.
    pub notifications: Option<mpsc::UnboundedReceiver<NotificationPayload>>,
}

/// The callback server, running exactly while at least one subscription
/// holds it.
pub(crate) struct EventsServer {
    bind_ip: Option<IpAddr>,
    server: Option<CallbackServer>,
    users: usize,
}

impl EventsServer {
    pub fn new(bind_ip: Option<IpAddr>) -> Self {
        Self {
            bind_ip,
            server: None,
            users: 0,
        }
    }

    /// Take a reference, starting the server for the first one.
    pub async fn acquire(&mut self) -> Result<Acquired> {
        let (server, notifications) = match self.server.take() {
            Some(server) => (server, None),
            None => {
                let (tx, rx) = mpsc::unbounded_channel();
                (CallbackServer::start(self.bind_ip, tx).await?, Some(rx))
            }
        };

        let callback_url = server.base_url().to_string();
        self.server = Some(server);
        self.users += 1;
        debug!(users = self.users, "Callback server acquired");

        Ok(Acquired {
            callback_url,
            notifications,
        })
    }

    /// Drop a reference, stopping the server with the last one.
    pub async fn release(&mut self) {
        self.users = self.users.saturating_sub(1);
        debug!(users = self.users, "Callback server released");

        if self.users == 0 {
            self.stop().await;
        }
    }

    /// Stop regardless of outstanding references. Idempotent.
    pub async fn stop(&mut self) {
        self.users = 0;
        if let Some(mut server) = self.server.take() {
            server.shutdown().await;
        }
    }

    pub fn is_running(&self) -> bool {
        self.server.is_some()
    }

    #[cfg(test)]
    pub fn users(&self) -> usize {
        self.users
    }

    /// Callback URL for `CALLBACK` headers, while running.
    pub fn callback_url(&self) -> Option<&str> {
        self.server.as_ref().map(CallbackServer::base_url)
    }

    pub fn router(&self) -> Option<Arc<EventRouter>> {
        self.server.as_ref().map(|server| server.router().clone())
    }
}
