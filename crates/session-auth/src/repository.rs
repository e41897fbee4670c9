//! Auth network calls combined with token persistence.

use crate::config::FailurePolicy;
use crate::transport::AuthTransport;
use crate::wire::{LoginRequest, LogoutRequest, RefreshRequest, RegisterRequest};
use crate::{AuthError, AuthResult};
use chrono::Duration;
use client_storage::{Token, TokenStore};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Owns the [`AuthTransport`] and the [`TokenStore`].
///
/// The `request_*` methods only talk to the network and classify failures.
/// The plain `login`/`refresh`/`logout` methods also persist the outcome.
/// [`crate::SessionManager`] uses the `request_*` methods and persists under
/// its own lock so a result from an older session generation is never saved.
pub struct SessionRepository {
    transport: Arc<dyn AuthTransport>,
    store: TokenStore,
    policy: FailurePolicy,
    default_ttl: Duration,
}

impl SessionRepository {
    pub fn new(transport: Arc<dyn AuthTransport>, store: TokenStore) -> Self {
        Self {
            transport,
            store,
            policy: FailurePolicy::default(),
            default_ttl: Duration::seconds(300),
        }
    }

    pub fn with_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_default_ttl(mut self, ttl: std::time::Duration) -> Self {
        self.default_ttl = Duration::from_std(ttl).unwrap_or(self.default_ttl);
        self
    }

    /// Exchange credentials for a token without persisting it.
    pub async fn request_login(&self, email: &str, password: &str) -> AuthResult<Token> {
        let request = LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        };
        let payload = self
            .transport
            .login(&request)
            .await
            .map_err(|e| self.policy.classify_credentials(e))?;
        payload
            .into_token(None, self.default_ttl)
            .map_err(|e| self.policy.classify_credentials(e))
    }

    /// Create an account and return its first token without persisting it.
    pub async fn request_register(
        &self,
        email: &str,
        password: &str,
        username: Option<&str>,
    ) -> AuthResult<Token> {
        let request = RegisterRequest {
            email: email.to_string(),
            password: password.to_string(),
            username: username.map(str::to_string),
        };
        let payload = self
            .transport
            .register(&request)
            .await
            .map_err(|e| self.policy.classify_credentials(e))?;
        payload
            .into_token(None, self.default_ttl)
            .map_err(|e| self.policy.classify_credentials(e))
    }

    /// Exchange a refresh token for a new token without persisting it.
    ///
    /// Exactly one network call is made.
    pub async fn request_refresh(&self, refresh_token: &str) -> AuthResult<Token> {
        let request = RefreshRequest {
            refresh: refresh_token.to_string(),
        };
        let payload = self
            .transport
            .refresh(&request)
            .await
            .map_err(|e| self.policy.classify_refresh(e))?;
        payload
            .into_token(Some(refresh_token), self.default_ttl)
            .map_err(|e| self.policy.classify_refresh(e))
    }

    /// Best-effort server-side revocation. Failures are logged and swallowed.
    pub async fn revoke(&self, token: &Token) {
        let request = LogoutRequest {
            refresh: token.refresh_token.clone(),
        };
        match self.transport.logout(&request, &token.access_token).await {
            Ok(()) => debug!("Refresh token revoked server-side"),
            Err(e) => warn!(error = %e, "Server-side logout failed, ignoring"),
        }
    }

    pub fn save(&self, token: &Token) -> AuthResult<()> {
        Ok(self.store.save(token)?)
    }

    pub fn load(&self) -> AuthResult<Option<Token>> {
        Ok(self.store.load()?)
    }

    pub fn clear(&self) -> AuthResult<()> {
        Ok(self.store.clear()?)
    }

    /// Log in and persist the new token.
    ///
    /// Refused credentials clear whatever was stored before; a transient
    /// failure leaves the store untouched.
    pub async fn login(&self, email: &str, password: &str) -> AuthResult<Token> {
        match self.request_login(email, password).await {
            Ok(token) => {
                self.save(&token)?;
                info!("Logged in");
                Ok(token)
            }
            Err(AuthError::InvalidCredentials(msg)) => {
                self.clear()?;
                Err(AuthError::InvalidCredentials(msg))
            }
            Err(e) => Err(e),
        }
    }

    /// Refresh and persist the new token.
    ///
    /// A rejected refresh token clears the store; a transient failure
    /// leaves it untouched.
    pub async fn refresh(&self, refresh_token: &str) -> AuthResult<Token> {
        match self.request_refresh(refresh_token).await {
            Ok(token) => {
                self.save(&token)?;
                Ok(token)
            }
            Err(AuthError::ExpiredRefreshToken(msg)) => {
                self.clear()?;
                Err(AuthError::ExpiredRefreshToken(msg))
            }
            Err(e) => Err(e),
        }
    }

    /// Revoke `token` server-side if given, then clear the store.
    pub async fn logout(&self, token: Option<&Token>) -> AuthResult<()> {
        if let Some(token) = token {
            self.revoke(token).await;
        }
        self.clear()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeAuthTransport, FakeReply};
    use client_storage::MemoryStorage;

    fn repository(transport: Arc<FakeAuthTransport>) -> (SessionRepository, Arc<MemoryStorage>) {
        let storage = Arc::new(MemoryStorage::new());
        let store = TokenStore::new(Box::new(storage.clone()));
        (SessionRepository::new(transport, store), storage)
    }

    #[tokio::test]
    async fn test_login_persists_token() {
        let transport = Arc::new(FakeAuthTransport::new());
        transport.push_login(FakeReply::tokens("a1", "r1"));
        let (repo, _) = repository(transport.clone());

        let token = repo.login("x@y.z", "pw").await.unwrap();
        assert_eq!(repo.load().unwrap(), Some(token));
    }

    #[tokio::test]
    async fn test_login_rejected_persists_nothing() {
        let transport = Arc::new(FakeAuthTransport::new());
        transport.push_login(FakeReply::status(401));
        let (repo, _) = repository(transport.clone());

        let err = repo.login("x@y.z", "bad").await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials(_)));
        assert_eq!(repo.load().unwrap(), None);
    }

    #[tokio::test]
    async fn test_refresh_rejected_clears_store() {
        let transport = Arc::new(FakeAuthTransport::new());
        transport.push_login(FakeReply::tokens("a1", "r1"));
        transport.push_refresh(FakeReply::status(401));
        let (repo, _) = repository(transport.clone());

        repo.login("x@y.z", "pw").await.unwrap();
        let err = repo.refresh("r1").await.unwrap_err();
        assert!(matches!(err, AuthError::ExpiredRefreshToken(_)));
        assert_eq!(repo.load().unwrap(), None);
    }

    #[tokio::test]
    async fn test_refresh_transient_keeps_store() {
        let transport = Arc::new(FakeAuthTransport::new());
        transport.push_login(FakeReply::tokens("a1", "r1"));
        transport.push_refresh(FakeReply::status(503));
        let (repo, _) = repository(transport.clone());

        let token = repo.login("x@y.z", "pw").await.unwrap();
        let err = repo.refresh("r1").await.unwrap_err();
        assert!(err.is_transient());
        assert_eq!(repo.load().unwrap(), Some(token));
    }

    #[tokio::test]
    async fn test_logout_clears_even_if_server_fails() {
        let transport = Arc::new(FakeAuthTransport::new());
        transport.push_login(FakeReply::tokens("a1", "r1"));
        transport.push_logout(FakeReply::status(500));
        let (repo, _) = repository(transport.clone());

        let token = repo.login("x@y.z", "pw").await.unwrap();
        repo.logout(Some(&token)).await.unwrap();
        assert_eq!(repo.load().unwrap(), None);
        assert_eq!(transport.logout_calls(), 1);
    }
}
