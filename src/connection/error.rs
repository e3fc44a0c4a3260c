//! Connection error types

use thiserror::Error;

/// Errors returned to callers of the connection manager
#[derive(Error, Debug)]
pub enum ConnectionError {
    /// The socket is not open
    #[error("Not connected")]
    NotConnected,

    /// A connection to a different endpoint is already active
    #[error("Already connected to {0}")]
    AlreadyConnected(String),

    /// The endpoint URL could not be parsed
    #[error("Invalid websocket URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    /// Outbound data could not be serialized
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for ConnectionError {
    fn from(err: serde_json::Error) -> Self {
        ConnectionError::Serialization(err.to_string())
    }
}

/// Result type alias for connection operations
pub type ConnectionResult<T> = Result<T, ConnectionError>;
