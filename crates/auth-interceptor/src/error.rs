//! Errors seen by domain callers.

use thiserror::Error;

/// Error type for requests made through the session layer.
#[derive(Error, Debug)]
pub enum ClientError {
    /// The session ended and could not be refreshed; route the user to login
    #[error("Session expired, please log in again")]
    SessionExpired,

    /// Request was rejected as unauthenticated but the session is still alive
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Any other non-success response
    #[error("Request failed with status {status}: {message}")]
    Status { status: u16, message: String },

    /// HTTP transport error
    #[error("HTTP error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Connection-level failure reported by a non-reqwest transport
    #[error("Connection failed: {0}")]
    Connection(String),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// URL parse error
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Credential could not be encoded as a header value
    #[error("Invalid header: {0}")]
    InvalidHeader(String),
}

impl ClientError {
    /// Returns true if the caller must log in again.
    pub fn is_session_expired(&self) -> bool {
        matches!(self, ClientError::SessionExpired)
    }
}

/// Result type alias using ClientError.
pub type ClientResult<T> = Result<T, ClientError>;
