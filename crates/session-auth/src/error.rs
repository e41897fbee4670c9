//! Authentication error types.

use client_storage::StorageError;
use thiserror::Error;

/// Authentication error type.
#[derive(Error, Debug)]
pub enum AuthError {
    /// Server refused the supplied email/password
    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),

    /// Server refused the refresh token (expired or revoked)
    #[error("Refresh token rejected: {0}")]
    ExpiredRefreshToken(String),

    /// Network failure or server-side error, safe to retry later
    #[error("Network unavailable: {0}")]
    TransientNetwork(String),

    /// Secure storage could not be read or written
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(#[from] StorageError),

    /// Non-success response that has not been classified yet
    #[error("Unexpected status {status}: {message}")]
    Status { status: u16, message: String },

    /// Invalid state transition in the session FSM
    #[error("Invalid session state transition: {0}")]
    InvalidStateTransition(String),

    /// Token response could not be turned into a session token
    #[error("Invalid token payload: {0}")]
    InvalidTokenPayload(String),

    /// HTTP request error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// URL parse error
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Timeout error
    #[error("Operation timed out")]
    Timeout,

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl AuthError {
    /// Returns true if this error is transient and the operation can be retried.
    ///
    /// Transient errors include:
    /// - Network unavailable
    /// - HTTP errors with 5xx status codes, 408 and 429
    /// - Connection timeouts
    pub fn is_transient(&self) -> bool {
        match self {
            AuthError::TransientNetwork(_) => true,
            AuthError::Timeout => true,
            AuthError::Status { status, .. } => is_transient_status(*status),
            AuthError::Http(e) => {
                if e.is_connect() || e.is_timeout() || e.is_request() {
                    return true;
                }
                if let Some(status) = e.status() {
                    return is_transient_status(status.as_u16());
                }
                false
            }
            _ => false,
        }
    }

    /// HTTP status attached to this error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            AuthError::Status { status, .. } => Some(*status),
            AuthError::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

fn is_transient_status(status: u16) -> bool {
    (500..600).contains(&status) || status == 408 || status == 429
}

/// Result type alias using AuthError.
pub type AuthResult<T> = Result<T, AuthError>;
