//! Error types for the Tollbooth components.

use thiserror::Error;

/// Main error type for Tollbooth operations.
#[derive(Error, Debug)]
pub enum TollboothError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Counter store errors
    #[error("Store error: {0}")]
    Store(#[from] crate::store::StoreError),

    /// Event publication errors
    #[error("Publish error: {0}")]
    Publish(#[from] crate::events::PublishError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for Tollbooth operations.
pub type Result<T> = std::result::Result<T, TollboothError>;
