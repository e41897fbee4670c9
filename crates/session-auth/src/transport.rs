//! Network calls to the auth endpoints.

use crate::wire::{error_message, LoginRequest, LogoutRequest, RefreshRequest, RegisterRequest, TokenPayload};
use crate::{AuthError, AuthResult};
use async_trait::async_trait;
use serde::Serialize;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::time::Duration;
use url::Url;

fn summarize_response_body(body: &str) -> String {
    let mut hasher = DefaultHasher::new();
    body.hash(&mut hasher);
    format!("len={},digest={:016x}", body.len(), hasher.finish())
}

/// Raw auth calls. Implementations report non-success responses as
/// [`AuthError::Status`]; classification happens in the repository.
#[async_trait]
pub trait AuthTransport: Send + Sync {
    async fn login(&self, request: &LoginRequest) -> AuthResult<TokenPayload>;

    async fn register(&self, request: &RegisterRequest) -> AuthResult<TokenPayload>;

    async fn refresh(&self, request: &RefreshRequest) -> AuthResult<TokenPayload>;

    /// Revoke the refresh token server-side.
    async fn logout(&self, request: &LogoutRequest, access_token: &str) -> AuthResult<()>;
}

/// Paths of the auth endpoints, relative to the server base URL.
#[derive(Debug, Clone)]
pub struct AuthEndpoints {
    pub login: String,
    pub register: String,
    pub refresh: String,
    pub logout: String,
}

impl Default for AuthEndpoints {
    fn default() -> Self {
        Self {
            login: "api/auth/login/".to_string(),
            register: "api/auth/register/".to_string(),
            refresh: "api/auth/refresh/".to_string(),
            logout: "api/auth/logout/".to_string(),
        }
    }
}

/// [`AuthTransport`] over reqwest.
#[derive(Clone)]
pub struct HttpAuthTransport {
    http_client: reqwest::Client,
    base_url: Url,
    endpoints: AuthEndpoints,
}

impl HttpAuthTransport {
    /// Create a transport for the server at `base_url`.
    pub fn new(base_url: &str, connect_timeout: Duration, request_timeout: Duration) -> AuthResult<Self> {
        let http_client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(request_timeout)
            .build()?;
        Self::with_client(http_client, base_url)
    }

    /// Create a transport that shares an existing client.
    pub fn with_client(http_client: reqwest::Client, base_url: &str) -> AuthResult<Self> {
        Ok(Self {
            http_client,
            base_url: normalize_base_url(base_url)?,
            endpoints: AuthEndpoints::default(),
        })
    }

    pub fn with_endpoints(mut self, endpoints: AuthEndpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    fn url(&self, path: &str) -> AuthResult<Url> {
        Ok(self.base_url.join(path.trim_start_matches('/'))?)
    }

    async fn post<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
        bearer: Option<&str>,
    ) -> AuthResult<reqwest::Response> {
        let url = self.url(path)?;
        tracing::debug!(url = %url, "Posting auth request");

        let mut request = self
            .http_client
            .post(url)
            .header("Accept", "application/json")
            .json(body);
        if let Some(token) = bearer {
            request = request.header("Authorization", format!("Bearer {}", token));
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let body_summary = summarize_response_body(&body);
            tracing::warn!(status = %status, body_summary = %body_summary, path = %path, "Auth request failed");
            return Err(AuthError::Status {
                status: status.as_u16(),
                message: error_message(&body).unwrap_or(body_summary),
            });
        }
        Ok(response)
    }

    async fn post_for_token<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> AuthResult<TokenPayload> {
        let response = self.post(path, body, None).await?;
        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

/// Parse a base URL, making sure relative joins append to its path.
pub fn normalize_base_url(base_url: &str) -> AuthResult<Url> {
    let mut url = Url::parse(base_url)?;
    if url.cannot_be_a_base() {
        return Err(AuthError::Config(format!("not a base URL: {}", base_url)));
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

#[async_trait]
impl AuthTransport for HttpAuthTransport {
    async fn login(&self, request: &LoginRequest) -> AuthResult<TokenPayload> {
        self.post_for_token(&self.endpoints.login, request).await
    }

    async fn register(&self, request: &RegisterRequest) -> AuthResult<TokenPayload> {
        self.post_for_token(&self.endpoints.register, request).await
    }

    async fn refresh(&self, request: &RefreshRequest) -> AuthResult<TokenPayload> {
        self.post_for_token(&self.endpoints.refresh, request).await
    }

    async fn logout(&self, request: &LogoutRequest, access_token: &str) -> AuthResult<()> {
        self.post(&self.endpoints.logout, request, Some(access_token))
            .await?;
        Ok(())
    }
}
