//! Error types for the notification service.

use thiserror::Error;

use crate::http_client::HttpClientPoolError;

/// Defines the possible errors that can occur within the notification service.
#[derive(Debug, Error)]
pub enum NotificationError {
    /// An error related to invalid or missing configuration.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// An error originating from the HTTP client pool.
    #[error("HTTP client error: {0}")]
    HttpClientError(#[from] HttpClientPoolError),
}

/// A single transport attempt's failure, classified for the retry machinery.
///
/// Transient failures are worth retrying (connection trouble, timeouts,
/// server-side errors); permanent ones will fail the same way every time
/// (rejected recipient, malformed request) and exhaust the record immediately.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The attempt failed in a way a later retry may succeed at.
    #[error("Transient transport failure: {0}")]
    Transient(String),

    /// The attempt was rejected and retrying cannot help.
    #[error("Permanent transport failure: {0}")]
    Permanent(String),
}

impl TransportError {
    /// Whether a later retry of the same request could succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, TransportError::Transient(_))
    }
}
