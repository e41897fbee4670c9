//! Test harness for interceptor scenarios.

use crate::{
    ApiClient, ApiRequest, ApiResponse, AuthInterceptor, ClientResult, HttpTransport,
    InterceptorConfig,
};
use async_trait::async_trait;
use client_storage::{MemoryStorage, Token, TokenStore};
use parking_lot::Mutex;
use reqwest::header::AUTHORIZATION;
use reqwest::StatusCode;
use session_auth::testing::{FakeAuthTransport, FakeReply};
use session_auth::{SessionConfig, SessionManager, SessionRepository};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Barrier;

type Responder = Box<dyn Fn(&ApiRequest) -> ApiResponse + Send + Sync>;

/// Credential carried by a request, without the scheme.
pub fn bearer(request: &ApiRequest) -> Option<String> {
    request
        .headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::to_string)
}

/// Responder that accepts only the listed access tokens.
pub fn accepts(tokens: &'static [&'static str]) -> impl Fn(&ApiRequest) -> ApiResponse + Send + Sync {
    move |request| match bearer(request) {
        Some(token) if tokens.contains(&token.as_str()) => ok(),
        _ => rejected(),
    }
}

pub fn ok() -> ApiResponse {
    ApiResponse::new(StatusCode::OK, r#"{"ok":true}"#)
}

pub fn rejected() -> ApiResponse {
    ApiResponse::new(
        StatusCode::UNAUTHORIZED,
        r#"{"detail":"Given token not valid for any token type"}"#,
    )
}

/// Scripted HTTP server.
pub struct FakeHttp {
    responder: Responder,
    sent: Mutex<Vec<ApiRequest>>,
    send_count: AtomicUsize,
    hold: Option<(usize, Arc<Barrier>)>,
}

impl FakeHttp {
    pub fn new(responder: impl Fn(&ApiRequest) -> ApiResponse + Send + Sync + 'static) -> Self {
        Self {
            responder: Box::new(responder),
            sent: Mutex::new(Vec::new()),
            send_count: AtomicUsize::new(0),
            hold: None,
        }
    }

    /// Hold the first `n` requests until all `n` have arrived.
    pub fn hold_first(mut self, n: usize) -> Self {
        self.hold = Some((n, Arc::new(Barrier::new(n))));
        self
    }

    pub fn sent(&self) -> Vec<ApiRequest> {
        self.sent.lock().clone()
    }

    /// Number of requests sent with `token` as their credential.
    pub fn sent_with(&self, token: &str) -> usize {
        self.sent
            .lock()
            .iter()
            .filter(|r| bearer(r).as_deref() == Some(token))
            .count()
    }
}

#[async_trait]
impl HttpTransport for FakeHttp {
    async fn send(&self, request: ApiRequest) -> ClientResult<ApiResponse> {
        let index = self.send_count.fetch_add(1, Ordering::SeqCst);
        self.sent.lock().push(request.clone());

        if let Some((n, barrier)) = &self.hold {
            if index < *n {
                barrier.wait().await;
            }
        }
        Ok((self.responder)(&request))
    }
}

/// Client wired to fakes on both sides of the session layer.
pub struct TestHarness {
    pub client: ApiClient,
    pub interceptor: AuthInterceptor,
    pub http: Arc<FakeHttp>,
    pub auth: Arc<FakeAuthTransport>,
    pub storage: Arc<MemoryStorage>,
}

impl TestHarness {
    pub fn new(http: FakeHttp) -> Self {
        Self::with_config(http, InterceptorConfig::default())
    }

    pub fn with_config(http: FakeHttp, config: InterceptorConfig) -> Self {
        let http = Arc::new(http);
        let auth = Arc::new(FakeAuthTransport::new());
        let storage = Arc::new(MemoryStorage::new());

        let repository = SessionRepository::new(
            auth.clone(),
            TokenStore::new(Box::new(storage.clone())),
        );
        let session = SessionManager::new(repository, SessionConfig::default());
        let interceptor = AuthInterceptor::new(session, http.clone(), config);

        Self {
            client: ApiClient::new(interceptor.clone()),
            interceptor,
            http,
            auth,
            storage,
        }
    }

    pub fn session(&self) -> &SessionManager {
        self.interceptor.session()
    }

    /// Log in as `access-1`/`refresh-1`, valid for an hour.
    pub async fn login(&self) -> Token {
        self.login_with(FakeReply::tokens("access-1", "refresh-1"))
            .await
    }

    pub async fn login_with(&self, reply: FakeReply) -> Token {
        self.auth.push_login(reply);
        self.session()
            .login("user@example.com", "pw")
            .await
            .expect("scripted login succeeds")
    }

    pub fn stored(&self) -> Option<Token> {
        TokenStore::new(Box::new(self.storage.clone()))
            .load()
            .expect("memory storage never fails")
    }
}
