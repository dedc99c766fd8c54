//! Error types for portal access.

use thiserror::Error;

/// Result type for portal operations.
pub type PortalResult<T> = Result<T, PortalError>;

/// Errors that can occur while talking to a portal or feature service.
#[derive(Debug, Error)]
pub enum PortalError {
    /// Transport-level failure (connect, timeout, TLS).
    #[error("network error: {0}")]
    Network(String),

    /// HTTP client construction or request error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The REST API answered with an error object or a non-success status.
    #[error("API error {code}: {message}")]
    Api { code: i64, message: String },

    /// Token generation or credential problem.
    #[error("authentication error: {0}")]
    Auth(String),

    /// The requested item, group or layer does not exist (or is not visible).
    #[error("not found: {0}")]
    NotFound(String),

    /// A URL did not have the expected shape.
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    /// A response body could not be decoded.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A response was well-formed JSON but not the expected structure.
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),
}

impl PortalError {
    /// Returns true if the error means "does not exist or not accessible".
    pub fn is_not_found(&self) -> bool {
        match self {
            PortalError::NotFound(_) => true,
            PortalError::Api { code, .. } => matches!(code, 400 | 403 | 404),
            PortalError::Http(e) => e.status().is_some_and(|s| s.as_u16() == 404),
            _ => false,
        }
    }
}
