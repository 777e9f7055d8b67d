//! Error types for rrwatch
//!
//! This module defines all error types used throughout the workspace.

use thiserror::Error;

/// Result type alias for rrwatch operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for rrwatch
#[derive(Error, Debug)]
pub enum Error {
    /// The store file exists but could not be read
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    /// The store file content is not a valid history mapping
    #[error("Store corrupt: {0}")]
    StoreCorrupt(String),

    /// The store could not be persisted
    #[error("Store write failed: {0}")]
    StoreWrite(String),

    /// The resolver produced no usable output this cycle
    #[error("Resolution unavailable: {0}")]
    ResolutionUnavailable(String),

    /// Alert delivery failed
    #[error("Notification failed: {0}")]
    Notify(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// I/O errors not attributed to a specific component
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a store-unavailable error
    pub fn store_unavailable(msg: impl Into<String>) -> Self {
        Self::StoreUnavailable(msg.into())
    }

    /// Create a store-corrupt error
    pub fn store_corrupt(msg: impl Into<String>) -> Self {
        Self::StoreCorrupt(msg.into())
    }

    /// Create a store-write error
    pub fn store_write(msg: impl Into<String>) -> Self {
        Self::StoreWrite(msg.into())
    }

    /// Create a resolution-unavailable error
    pub fn resolution(msg: impl Into<String>) -> Self {
        Self::ResolutionUnavailable(msg.into())
    }

    /// Create a notification error
    pub fn notify(msg: impl Into<String>) -> Self {
        Self::Notify(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Whether the store could not be loaded (unreadable or corrupt)
    pub fn is_store_load_failure(&self) -> bool {
        matches!(self, Self::StoreUnavailable(_) | Self::StoreCorrupt(_))
    }
}

/// Helper for converting anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}
