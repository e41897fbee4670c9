//! Credential stamping and one-shot replay.

use crate::{ApiRequest, ApiResponse, ClientError, ClientResult, HttpTransport};
use client_storage::Token;
use reqwest::header::{HeaderName, HeaderValue, AUTHORIZATION};
use reqwest::StatusCode;
use session_auth::{RefreshOutcome, RequestToken, SessionManager};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Interceptor settings.
#[derive(Debug, Clone)]
pub struct InterceptorConfig {
    /// Status that signals a rejected access token.
    pub unauthenticated_status: StatusCode,
    /// Header that carries the credential.
    pub header_name: HeaderName,
    /// Credential scheme, e.g. `Bearer`.
    pub scheme: String,
    /// Path prefixes sent as-is, without credentials or rejection handling.
    pub public_paths: Vec<String>,
    /// Refresh an expiring token before sending rather than after a rejection.
    pub proactive_refresh: bool,
}

impl Default for InterceptorConfig {
    fn default() -> Self {
        Self {
            unauthenticated_status: StatusCode::UNAUTHORIZED,
            header_name: AUTHORIZATION,
            scheme: "Bearer".to_string(),
            public_paths: vec![
                "/api/auth/login".to_string(),
                "/api/auth/register".to_string(),
                "/api/auth/refresh".to_string(),
                "/api/billing/pricing".to_string(),
                "/health".to_string(),
            ],
            proactive_refresh: true,
        }
    }
}

/// Wraps an [`HttpTransport`] with session handling.
///
/// Holds no session state of its own; every decision about tokens goes
/// through the [`SessionManager`].
#[derive(Clone)]
pub struct AuthInterceptor {
    session: SessionManager,
    transport: Arc<dyn HttpTransport>,
    config: Arc<InterceptorConfig>,
}

impl AuthInterceptor {
    pub fn new(
        session: SessionManager,
        transport: Arc<dyn HttpTransport>,
        config: InterceptorConfig,
    ) -> Self {
        Self {
            session,
            transport,
            config: Arc::new(config),
        }
    }

    pub fn session(&self) -> &SessionManager {
        &self.session
    }

    pub fn config(&self) -> &InterceptorConfig {
        &self.config
    }

    fn is_public(&self, path: &str) -> bool {
        let path = path.split('?').next().unwrap_or(path);
        self.config
            .public_paths
            .iter()
            .any(|prefix| path.starts_with(prefix.as_str()))
    }

    async fn token_for_request(&self) -> RequestToken {
        if self.config.proactive_refresh {
            return self.session.valid_token().await;
        }
        match self.session.current_token() {
            Some(token) => RequestToken::Valid(token),
            None => RequestToken::Anonymous,
        }
    }

    /// Copy of `request` carrying `token`. The caller's request is untouched.
    fn authorize(&self, request: &ApiRequest, token: &Token) -> ClientResult<ApiRequest> {
        let mut value =
            HeaderValue::from_str(&format!("{} {}", self.config.scheme, token.access_token))
                .map_err(|e| ClientError::InvalidHeader(e.to_string()))?;
        value.set_sensitive(true);

        let mut authorized = request.clone();
        authorized
            .headers
            .insert(self.config.header_name.clone(), value);
        Ok(authorized)
    }

    /// Send `request`, replaying it once with a fresh token if it is rejected.
    ///
    /// Without a session the request goes out unauthenticated. A request whose
    /// session cannot be recovered comes back with
    /// [`ApiResponse::session_expired`] set: the original rejection, or an
    /// unsent empty response carrying `unauthenticated_status` when the session
    /// ended while refreshing before the send.
    pub async fn execute(&self, request: ApiRequest) -> ClientResult<ApiResponse> {
        if self.is_public(&request.path) {
            return self.transport.send(request).await;
        }

        let token = match self.token_for_request().await {
            RequestToken::Valid(token) => token,
            RequestToken::Anonymous => {
                debug!(path = %request.path, "No session, sending unauthenticated");
                return self.transport.send(request).await;
            }
            RequestToken::Expired => {
                info!(path = %request.path, "Session expired before send");
                return Ok(ApiResponse::expired_without_send(
                    self.config.unauthenticated_status,
                ));
            }
        };

        let response = self
            .transport
            .send(self.authorize(&request, &token)?)
            .await?;
        if response.status != self.config.unauthenticated_status {
            return Ok(response);
        }

        debug!(path = %request.path, status = %response.status, "Request rejected, consulting session");
        match self.session.report_rejection(&token).await {
            RefreshOutcome::Retry(fresh) => {
                debug!(path = %request.path, "Replaying request with refreshed token");
                // Second response is final, whatever it is
                self.transport.send(self.authorize(&request, &fresh)?).await
            }
            RefreshOutcome::SessionExpired => {
                info!(path = %request.path, "Session expired");
                Ok(response.mark_session_expired())
            }
            RefreshOutcome::RetryLater(reason) => {
                warn!(path = %request.path, reason = %reason, "Token refresh unavailable, not replaying");
                Ok(response)
            }
        }
    }
}
