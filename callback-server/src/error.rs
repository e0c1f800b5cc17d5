//! Error types for the callback server.

use thiserror::Error;

/// Errors that can occur while starting the callback listener.
#[derive(Debug, Error)]
pub enum CallbackServerError {
    /// No network-facing address could be detected for the listener
    #[error("Failed to detect local IP address")]
    NoLocalAddress,

    /// The listener could not be bound
    #[error("Failed to bind callback listener: {0}")]
    Bind(String),
}
