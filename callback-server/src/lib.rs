//! Generic UPnP callback server for receiving event notifications.
//!
//! This crate provides a lightweight HTTP listener for UPnP event
//! notifications. It has no knowledge of services or event contents.
//!
//! # Overview
//!
//! - [`CallbackServer`]: HTTP server bound to an ephemeral port on a
//!   network-facing address. Every request is acknowledged with `200 OK`.
//! - [`EventRouter`]: Maps subscription IDs to their owner and forwards
//!   matching notifications to a channel. Unknown IDs are dropped.
//! - [`NotificationPayload`]: Subscription ID, owner and raw XML body.
//!
//! # Example
//!
//! ```no_run
//! use callback_server::{CallbackServer, NotificationPayload};
//! use tokio::sync::mpsc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), callback_server::CallbackServerError> {
//!     let (tx, mut rx) = mpsc::unbounded_channel::<NotificationPayload>();
//!
//!     let mut server = CallbackServer::start(None, tx).await?;
//!     println!("CALLBACK: <{}>", server.base_url());
//!
//!     server
//!         .router()
//!         .register("uuid:subscription-123".to_string(), "AVTransport".to_string())
//!         .await;
//!
//!     tokio::spawn(async move {
//!         while let Some(notification) = rx.recv().await {
//!             println!("{} -> {}", notification.owner, notification.event_xml);
//!         }
//!     });
//!
//!     server.shutdown().await;
//!     Ok(())
//! }
//! ```

mod error;
pub mod router;
mod server;

pub use error::CallbackServerError;
pub use router::{EventRouter, NotificationPayload};
pub use server::{detect_local_ip, CallbackServer};
