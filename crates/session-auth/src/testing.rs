//! Scripted [`AuthTransport`] for tests.
//!
//! Replies are queued per endpoint and consumed in order. An empty login,
//! register or refresh queue answers with a transient network error; an
//! empty logout queue succeeds.

use crate::transport::AuthTransport;
use crate::wire::{LoginRequest, LogoutRequest, RefreshRequest, RegisterRequest, TokenPayload};
use crate::{AuthError, AuthResult};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// One scripted reply.
#[derive(Debug, Clone)]
pub enum FakeReply {
    Tokens {
        access: String,
        refresh: Option<String>,
        expires_in: Option<i64>,
    },
    Status(u16),
    Network(String),
    /// Never completes.
    Hang,
}

impl FakeReply {
    /// Full token pair valid for an hour.
    pub fn tokens(access: &str, refresh: &str) -> Self {
        FakeReply::Tokens {
            access: access.to_string(),
            refresh: Some(refresh.to_string()),
            expires_in: Some(3600),
        }
    }

    /// Token pair with an explicit lifetime in seconds.
    pub fn tokens_expiring(access: &str, refresh: &str, expires_in: i64) -> Self {
        FakeReply::Tokens {
            access: access.to_string(),
            refresh: Some(refresh.to_string()),
            expires_in: Some(expires_in),
        }
    }

    /// Access token only, as a rotating-less refresh endpoint answers.
    pub fn access_only(access: &str) -> Self {
        FakeReply::Tokens {
            access: access.to_string(),
            refresh: None,
            expires_in: Some(3600),
        }
    }

    pub fn status(status: u16) -> Self {
        FakeReply::Status(status)
    }

    pub fn network(message: &str) -> Self {
        FakeReply::Network(message.to_string())
    }

    async fn resolve(self) -> AuthResult<TokenPayload> {
        match self {
            FakeReply::Tokens {
                access,
                refresh,
                expires_in,
            } => Ok(TokenPayload {
                access,
                refresh,
                expires_at: None,
                expires_in,
                user: None,
            }),
            FakeReply::Status(status) => Err(AuthError::Status {
                status,
                message: format!("scripted {}", status),
            }),
            FakeReply::Network(message) => Err(AuthError::TransientNetwork(message)),
            FakeReply::Hang => std::future::pending().await,
        }
    }
}

#[derive(Default)]
struct Script {
    login: VecDeque<FakeReply>,
    register: VecDeque<FakeReply>,
    refresh: VecDeque<FakeReply>,
    logout: VecDeque<FakeReply>,
    refresh_tokens_seen: Vec<String>,
}

/// In-memory auth server.
#[derive(Default)]
pub struct FakeAuthTransport {
    script: Mutex<Script>,
    refresh_delay: Mutex<Option<Duration>>,
    login_calls: AtomicUsize,
    register_calls: AtomicUsize,
    refresh_calls: AtomicUsize,
    logout_calls: AtomicUsize,
}

impl FakeAuthTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_login(&self, reply: FakeReply) {
        self.script.lock().login.push_back(reply);
    }

    pub fn push_register(&self, reply: FakeReply) {
        self.script.lock().register.push_back(reply);
    }

    pub fn push_refresh(&self, reply: FakeReply) {
        self.script.lock().refresh.push_back(reply);
    }

    pub fn push_logout(&self, reply: FakeReply) {
        self.script.lock().logout.push_back(reply);
    }

    /// Delay every refresh reply, widening the window for concurrent callers.
    pub fn set_refresh_delay(&self, delay: Duration) {
        *self.refresh_delay.lock() = Some(delay);
    }

    pub fn login_calls(&self) -> usize {
        self.login_calls.load(Ordering::SeqCst)
    }

    pub fn register_calls(&self) -> usize {
        self.register_calls.load(Ordering::SeqCst)
    }

    pub fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    pub fn logout_calls(&self) -> usize {
        self.logout_calls.load(Ordering::SeqCst)
    }

    /// Refresh tokens presented to the refresh endpoint, in call order.
    pub fn refresh_tokens_seen(&self) -> Vec<String> {
        self.script.lock().refresh_tokens_seen.clone()
    }

    fn next(queue: &mut VecDeque<FakeReply>, endpoint: &str) -> FakeReply {
        queue
            .pop_front()
            .unwrap_or_else(|| FakeReply::Network(format!("no scripted {} reply", endpoint)))
    }
}

#[async_trait]
impl AuthTransport for FakeAuthTransport {
    async fn login(&self, _request: &LoginRequest) -> AuthResult<TokenPayload> {
        self.login_calls.fetch_add(1, Ordering::SeqCst);
        let reply = Self::next(&mut self.script.lock().login, "login");
        reply.resolve().await
    }

    async fn register(&self, _request: &RegisterRequest) -> AuthResult<TokenPayload> {
        self.register_calls.fetch_add(1, Ordering::SeqCst);
        let reply = Self::next(&mut self.script.lock().register, "register");
        reply.resolve().await
    }

    async fn refresh(&self, request: &RefreshRequest) -> AuthResult<TokenPayload> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        let reply = {
            let mut script = self.script.lock();
            script.refresh_tokens_seen.push(request.refresh.clone());
            Self::next(&mut script.refresh, "refresh")
        };
        let delay = *self.refresh_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        reply.resolve().await
    }

    async fn logout(&self, _request: &LogoutRequest, _access_token: &str) -> AuthResult<()> {
        self.logout_calls.fetch_add(1, Ordering::SeqCst);
        let reply = self.script.lock().logout.pop_front();
        match reply {
            None => Ok(()),
            Some(reply) => reply.resolve().await.map(|_| ()),
        }
    }
}
