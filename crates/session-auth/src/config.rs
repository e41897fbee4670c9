//! Session tuning and failure classification.

use crate::AuthError;
use std::time::Duration;

/// How a failed auth call maps onto session outcomes.
///
/// Statuses listed here are terminal; every other failure (connect errors,
/// timeouts, unlisted statuses, undecodable bodies) is treated as transient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailurePolicy {
    /// Refresh statuses that mean the refresh token is dead.
    pub terminal_refresh_statuses: Vec<u16>,
    /// Login/register statuses that mean the credentials were refused.
    pub invalid_credential_statuses: Vec<u16>,
}

impl Default for FailurePolicy {
    fn default() -> Self {
        Self {
            terminal_refresh_statuses: vec![400, 401, 403],
            invalid_credential_statuses: vec![400, 401],
        }
    }
}

impl FailurePolicy {
    /// Classify a failed refresh call.
    pub fn classify_refresh(&self, err: AuthError) -> AuthError {
        match err {
            AuthError::Status { status, message }
                if self.terminal_refresh_statuses.contains(&status) =>
            {
                AuthError::ExpiredRefreshToken(message)
            }
            other => into_transient(other),
        }
    }

    /// Classify a failed login or register call.
    pub fn classify_credentials(&self, err: AuthError) -> AuthError {
        match err {
            AuthError::Status { status, message }
                if self.invalid_credential_statuses.contains(&status) =>
            {
                AuthError::InvalidCredentials(message)
            }
            other => into_transient(other),
        }
    }
}

fn into_transient(err: AuthError) -> AuthError {
    match err {
        AuthError::Timeout => AuthError::Timeout,
        AuthError::TransientNetwork(msg) => AuthError::TransientNetwork(msg),
        AuthError::Status { status, message } => {
            AuthError::TransientNetwork(format!("status {}: {}", status, message))
        }
        AuthError::Http(e) if e.is_timeout() => AuthError::Timeout,
        AuthError::Http(e) => AuthError::TransientNetwork(e.to_string()),
        AuthError::Json(e) => AuthError::TransientNetwork(format!("undecodable response: {}", e)),
        AuthError::InvalidTokenPayload(msg) => {
            AuthError::TransientNetwork(format!("unusable token response: {}", msg))
        }
        other => other,
    }
}

/// Session manager settings.
///
/// `default_access_ttl` and `failure_policy` are handed to the repository by
/// [`crate::SessionManager::new`].
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Upper bound on a single refresh call.
    pub refresh_timeout: Duration,
    /// Tokens this close to expiry count as expired.
    pub expiry_skew: Duration,
    /// Access-token lifetime assumed when the server gives no expiry.
    pub default_access_ttl: Duration,
    /// Failure classification.
    pub failure_policy: FailurePolicy,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            refresh_timeout: Duration::from_secs(30),
            expiry_skew: Duration::from_secs(60),
            default_access_ttl: Duration::from_secs(300),
            failure_policy: FailurePolicy::default(),
        }
    }
}

impl SessionConfig {
    pub(crate) fn skew(&self) -> chrono::Duration {
        chrono::Duration::from_std(self.expiry_skew).unwrap_or_else(|_| chrono::Duration::zero())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(code: u16) -> AuthError {
        AuthError::Status {
            status: code,
            message: "nope".to_string(),
        }
    }

    #[test]
    fn test_refresh_terminal_statuses() {
        let policy = FailurePolicy::default();
        for code in [400, 401, 403] {
            assert!(matches!(
                policy.classify_refresh(status(code)),
                AuthError::ExpiredRefreshToken(_)
            ));
        }
    }

    #[test]
    fn test_refresh_other_failures_are_transient() {
        let policy = FailurePolicy::default();
        assert!(matches!(
            policy.classify_refresh(status(502)),
            AuthError::TransientNetwork(_)
        ));
        assert!(matches!(
            policy.classify_refresh(status(404)),
            AuthError::TransientNetwork(_)
        ));
        assert!(matches!(
            policy.classify_refresh(AuthError::Timeout),
            AuthError::Timeout
        ));
        assert!(matches!(
            policy.classify_refresh(AuthError::InvalidTokenPayload("empty".into())),
            AuthError::TransientNetwork(_)
        ));
    }

    #[test]
    fn test_credentials_classification() {
        let policy = FailurePolicy::default();
        assert!(matches!(
            policy.classify_credentials(status(401)),
            AuthError::InvalidCredentials(_)
        ));
        assert!(matches!(
            policy.classify_credentials(status(403)),
            AuthError::TransientNetwork(_)
        ));
    }

    #[test]
    fn test_custom_policy() {
        let policy = FailurePolicy {
            terminal_refresh_statuses: vec![401],
            invalid_credential_statuses: vec![401],
        };
        assert!(matches!(
            policy.classify_refresh(status(400)),
            AuthError::TransientNetwork(_)
        ));
    }
}
