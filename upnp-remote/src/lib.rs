//! # upnp-remote
//!
//! An async control-point client for UPnP media renderers.
//!
//! [`UpnpClient`] talks to one device at an address and port supplied by the
//! host. It fetches and caches the device and service descriptions, invokes
//! SOAP actions, and keeps GENA event subscriptions alive, renewing them
//! before they expire. Pushed events arrive at a callback server that runs
//! only while subscriptions exist, and are fanned out to every listener of
//! the owning service.
//!
//! ```no_run
//! use std::sync::Arc;
//! use upnp_remote::{ActionArgs, Event, UpnpClient};
//!
//! #[tokio::main]
//! async fn main() -> upnp_remote::Result<()> {
//!     let client = UpnpClient::connect_to("192.168.1.40", 1400)?;
//!
//!     client.call("AVTransport", "Play", &ActionArgs::new().arg("InstanceID", 0).arg("Speed", 1)).await?;
//!
//!     let id = client
//!         .subscribe("AVTransport", Arc::new(|event: &Event| println!("{} = {}", event.name, event.value)))
//!         .await?;
//!
//!     tokio::time::sleep(std::time::Duration::from_secs(60)).await;
//!     client.unsubscribe("AVTransport", id).await?;
//!     client.cleanup().await;
//!     Ok(())
//! }
//! ```
//!
//! Logging goes through `tracing`; see [`logging`] for a ready-made
//! subscriber.

mod client;
mod config;
mod description;
mod endpoint;
mod error;
pub mod events;
mod invoker;
pub mod logging;
mod service_id;
mod subscription;

pub use client::{HealthError, UpnpClient, Update};
pub use config::ClientConfig;
pub use description::{ActionSpec, DeviceDescription, ServiceDescription, ServiceRef};
pub use endpoint::{Endpoint, EndpointSource};
pub use error::{ClientError, Result};
pub use events::{Event, EventName, EventTransforms, EventValue, TrackMetadata};
pub use invoker::{ActionArgs, ActionResponse};
pub use service_id::{ServiceId, SERVICE_ID_PREFIX};
pub use subscription::{renewal_delay, Listener, ListenerId};

pub use soap_client::SoapError;
