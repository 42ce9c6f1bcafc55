//! Error types for the streamwatch core
//!
//! Failures of external collaborators (lookup, notification, watch-list)
//! are recovered locally by the detector and dispatcher; they only surface
//! through this type at the trait boundary.

use thiserror::Error;

/// Result type alias for streamwatch operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the streamwatch system
#[derive(Error, Debug)]
pub enum Error {
    /// Provider lookup failed (network, provider API, bad response)
    #[error("Provider lookup error: {0}")]
    Lookup(String),

    /// Notification sink rejected or failed the request
    #[error("Notification error: {0}")]
    Notification(String),

    /// Snapshot or watch-list store errors
    #[error("Store error: {0}")]
    Store(String),

    /// Event bus errors (unknown topic, partition out of range)
    #[error("Event bus error: {0}")]
    Bus(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP client errors
    #[error("HTTP error: {0}")]
    Http(String),

    /// Missing, malformed, or rejected credentials
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// A bounded external call did not finish in time
    #[error("Timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// Invalid input (bad event payload, out-of-range rating)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a provider lookup error
    pub fn lookup(msg: impl Into<String>) -> Self {
        Self::Lookup(msg.into())
    }

    /// Create a notification error
    pub fn notification(msg: impl Into<String>) -> Self {
        Self::Notification(msg.into())
    }

    /// Create a store error
    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store(msg.into())
    }

    /// Create an event bus error
    pub fn bus(msg: impl Into<String>) -> Self {
        Self::Bus(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an HTTP error
    pub fn http(msg: impl Into<String>) -> Self {
        Self::Http(msg.into())
    }

    /// Create an authentication error
    pub fn auth(msg: impl Into<String>) -> Self {
        Self::Authentication(msg.into())
    }

    /// Create an invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Whether the failure came from a collaborator call that may succeed
    /// on a later attempt (next sweep, redelivery)
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Lookup(_) | Self::Notification(_) | Self::Http(_) | Self::Timeout(_)
        )
    }
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}
