//! Session management with single-flight token refresh.
//!
//! [`SessionManager`] owns the in-memory token, the session FSM and the
//! session generation. All three change together under one lock, and the
//! lock is never held across an `.await`.
//!
//! A rejected token starts at most one refresh per generation, and a new
//! generation waits out any refresh still outstanding from an older one.
//! The refresh runs on its own task and publishes its outcome through a
//! `watch` channel, so a waiter that gives up does not cancel it for the
//! others.

use crate::config::SessionConfig;
use crate::repository::SessionRepository;
use crate::session_fsm::{
    SessionMachine, SessionMachineInput, SessionState, SessionStateChanged,
};
use crate::{AuthError, AuthResult};
use client_storage::Token;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Callback type for session state change notifications.
///
/// Called without any manager lock held, so it may call back into the
/// manager.
pub type SessionStateCallback = Box<dyn Fn(SessionStateChanged) + Send + Sync>;

type SharedCallback = Arc<dyn Fn(SessionStateChanged) + Send + Sync>;

/// What a caller whose token was rejected should do next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// Replay the request once with this token.
    Retry(Token),
    /// The session is gone; the user must log in again.
    SessionExpired,
    /// Refresh failed for a transient reason; do not replay now.
    RetryLater(String),
}

/// Credential to send with an outgoing request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestToken {
    /// Send with this token.
    Valid(Token),
    /// No session; send unauthenticated.
    Anonymous,
    /// The session ended while obtaining a token; the user must log in again.
    Expired,
}

/// The outstanding refresh call. Stays set until its result is applied or
/// discarded, even after the session has moved to a newer generation.
struct InFlight {
    generation: u64,
    outcome: watch::Receiver<Option<RefreshOutcome>>,
}

enum Pending {
    Join(
        watch::Receiver<Option<RefreshOutcome>>,
        u64,
        Option<SessionStateChanged>,
    ),
    Superseded(watch::Receiver<Option<RefreshOutcome>>, u64),
}

struct Inner {
    fsm: SessionMachine,
    token: Option<Token>,
    generation: u64,
    in_flight: Option<InFlight>,
}

struct Shared {
    repository: SessionRepository,
    config: SessionConfig,
    inner: Mutex<Inner>,
    state_callback: Mutex<Option<SharedCallback>>,
}

/// Explicitly owned session layer. Clones share the same session.
#[derive(Clone)]
pub struct SessionManager {
    shared: Arc<Shared>,
}

impl SessionManager {
    /// Create an anonymous session. Call [`SessionManager::restore`] to pick
    /// up a persisted token.
    pub fn new(repository: SessionRepository, config: SessionConfig) -> Self {
        let repository = repository
            .with_policy(config.failure_policy.clone())
            .with_default_ttl(config.default_access_ttl);
        Self {
            shared: Arc::new(Shared {
                repository,
                config,
                inner: Mutex::new(Inner {
                    fsm: SessionMachine::new(),
                    token: None,
                    generation: 0,
                    in_flight: None,
                }),
                state_callback: Mutex::new(None),
            }),
        }
    }

    /// Set a callback to be notified of session state changes.
    pub fn set_state_callback(&self, callback: SessionStateCallback) {
        *self.shared.state_callback.lock() = Some(Arc::from(callback));
    }

    /// Latest known token. Never blocks on a refresh.
    pub fn current_token(&self) -> Option<Token> {
        self.shared.inner.lock().token.clone()
    }

    pub fn state(&self) -> SessionState {
        SessionState::from(self.shared.inner.lock().fsm.state())
    }

    /// Current session generation. Bumped whenever the active token changes.
    pub fn generation(&self) -> u64 {
        self.shared.inner.lock().generation
    }

    pub fn config(&self) -> &SessionConfig {
        &self.shared.config
    }

    /// Load the persisted token, if any, and become authenticated with it.
    ///
    /// Unreadable storage is treated as no session.
    pub fn restore(&self) -> Option<Token> {
        let (token, change) = {
            let mut inner = self.shared.inner.lock();
            if inner.token.is_some() {
                return inner.token.clone();
            }

            let token = match self.shared.repository.load() {
                Ok(Some(token)) => token,
                Ok(None) => {
                    debug!("No persisted session");
                    return None;
                }
                Err(e) => {
                    warn!(error = %e, "Token storage unavailable, starting anonymous");
                    return None;
                }
            };

            inner.token = Some(token.clone());
            inner.generation += 1;
            let change = advance(&mut inner, &SessionMachineInput::SessionRestored);
            info!(
                generation = inner.generation,
                expires_at = %token.expires_at,
                "Session restored"
            );
            (token, change)
        };

        self.notify(change);
        Some(token)
    }

    /// Log in with email and password.
    ///
    /// Refused credentials end any existing session.
    pub async fn login(&self, email: &str, password: &str) -> AuthResult<Token> {
        let result = self.shared.repository.request_login(email, password).await;
        self.finish_sign_in(result, "Logged in")
    }

    /// Create an account and sign in with it.
    pub async fn register(
        &self,
        email: &str,
        password: &str,
        username: Option<&str>,
    ) -> AuthResult<Token> {
        let result = self
            .shared
            .repository
            .request_register(email, password, username)
            .await;
        self.finish_sign_in(result, "Registered")
    }

    fn finish_sign_in(&self, result: AuthResult<Token>, message: &str) -> AuthResult<Token> {
        let token = match result {
            Ok(token) => token,
            Err(AuthError::InvalidCredentials(msg)) => {
                self.invalidate("credentials refused");
                return Err(AuthError::InvalidCredentials(msg));
            }
            Err(e) => return Err(e),
        };

        let change = {
            let mut inner = self.shared.inner.lock();
            self.shared.repository.save(&token)?;
            inner.token = Some(token.clone());
            inner.generation += 1;
            let change = advance(&mut inner, &SessionMachineInput::LoginSucceeded);
            info!(generation = inner.generation, "{}", message);
            change
        };

        self.notify(change);
        Ok(token)
    }

    /// End the session locally, then revoke it server-side (best effort).
    ///
    /// Idempotent: logging out while anonymous clears the store again and
    /// succeeds.
    pub async fn logout(&self) -> AuthResult<()> {
        let (previous, cleared, change) = {
            let mut inner = self.shared.inner.lock();
            let previous = inner.token.take();
            inner.generation += 1;
            let cleared = self.shared.repository.clear();
            let change = advance(&mut inner, &SessionMachineInput::LogoutRequested);
            (previous, cleared, change)
        };

        self.notify(change);
        if let Some(token) = previous {
            info!("Logged out");
            self.shared.repository.revoke(&token).await;
        }
        cleared
    }

    /// Handle a request rejected as unauthenticated while carrying `token_used`.
    ///
    /// A rejection for a token that is no longer current returns the current
    /// token without refreshing. Otherwise the caller starts or joins the one
    /// refresh for the current generation and receives its outcome. A refresh
    /// still outstanding from an earlier generation is waited out first, so
    /// at most one refresh call is ever in flight.
    pub async fn report_rejection(&self, token_used: &Token) -> RefreshOutcome {
        loop {
            let pending = {
                let mut inner = self.shared.inner.lock();
                match inner.token.as_ref() {
                    None => {
                        debug!("Rejection reported with no active session");
                        return RefreshOutcome::SessionExpired;
                    }
                    Some(current) if current != token_used => {
                        debug!(
                            generation = inner.generation,
                            "Rejected token already replaced, retrying with current"
                        );
                        return RefreshOutcome::Retry(current.clone());
                    }
                    Some(_) => {}
                }

                let generation = inner.generation;
                let outstanding = inner
                    .in_flight
                    .as_ref()
                    .map(|flight| (flight.generation, flight.outcome.clone()));
                match outstanding {
                    Some((dispatched, rx)) if dispatched == generation => {
                        debug!(generation, "Joining in-flight refresh");
                        Pending::Join(rx, generation, None)
                    }
                    Some((dispatched, rx)) => Pending::Superseded(rx, dispatched),
                    None => {
                        let (rx, change) = self.start_refresh(&mut inner);
                        Pending::Join(rx, generation, change)
                    }
                }
            };

            match pending {
                Pending::Superseded(mut rx, dispatched) => {
                    debug!(dispatched, "Waiting for superseded refresh to finish");
                    if rx.wait_for(Option::is_some).await.is_err() {
                        self.complete_refresh(
                            dispatched,
                            Err(AuthError::TransientNetwork(
                                "refresh task ended unexpectedly".to_string(),
                            )),
                        );
                    }
                }
                Pending::Join(rx, generation, change) => {
                    self.notify(change);
                    return self.await_outcome(rx, generation).await;
                }
            }
        }
    }

    async fn await_outcome(
        &self,
        mut outcome_rx: watch::Receiver<Option<RefreshOutcome>>,
        generation: u64,
    ) -> RefreshOutcome {
        let outcome = outcome_rx
            .wait_for(Option::is_some)
            .await
            .ok()
            .and_then(|published| published.clone());

        match outcome {
            Some(outcome) => outcome,
            None => {
                warn!(generation, "Refresh task ended without publishing a result");
                self.complete_refresh(
                    generation,
                    Err(AuthError::TransientNetwork(
                        "refresh task ended unexpectedly".to_string(),
                    )),
                )
            }
        }
    }

    /// Token to attach to an outgoing request, refreshed first if it is
    /// expired or about to be.
    ///
    /// Shares the single-flight refresh with [`SessionManager::report_rejection`].
    /// A refresh that fails transiently falls back to whatever token is still
    /// current; one that ends the session yields [`RequestToken::Expired`].
    pub async fn valid_token(&self) -> RequestToken {
        let Some(token) = self.current_token() else {
            return RequestToken::Anonymous;
        };
        if !token.is_expired(self.shared.config.skew()) {
            return RequestToken::Valid(token);
        }

        debug!(expires_at = %token.expires_at, "Access token expiring, refreshing before use");
        match self.report_rejection(&token).await {
            RefreshOutcome::Retry(token) => RequestToken::Valid(token),
            RefreshOutcome::SessionExpired => RequestToken::Expired,
            RefreshOutcome::RetryLater(_) => match self.current_token() {
                Some(token) => RequestToken::Valid(token),
                None => RequestToken::Anonymous,
            },
        }
    }

    fn start_refresh(
        &self,
        inner: &mut Inner,
    ) -> (
        watch::Receiver<Option<RefreshOutcome>>,
        Option<SessionStateChanged>,
    ) {
        let generation = inner.generation;
        let refresh_token = inner
            .token
            .as_ref()
            .map(|t| t.refresh_token.clone())
            .unwrap_or_default();
        let change = advance(inner, &SessionMachineInput::TokenRejected);

        let (tx, rx) = watch::channel(None);
        inner.in_flight = Some(InFlight {
            generation,
            outcome: rx.clone(),
        });

        info!(generation, "Starting token refresh");
        let manager = self.clone();
        tokio::spawn(async move {
            let outcome = manager.run_refresh(generation, &refresh_token).await;
            let _ = tx.send(Some(outcome));
        });

        (rx, change)
    }

    async fn run_refresh(&self, generation: u64, refresh_token: &str) -> RefreshOutcome {
        let timeout = self.shared.config.refresh_timeout;
        let result = match tokio::time::timeout(
            timeout,
            self.shared.repository.request_refresh(refresh_token),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => {
                warn!(generation, timeout_ms = timeout.as_millis() as u64, "Token refresh timed out");
                Err(AuthError::Timeout)
            }
        };
        self.complete_refresh(generation, result)
    }

    /// Apply a refresh result dispatched for `generation`.
    ///
    /// Only the result for the refresh currently in flight is applied and
    /// persisted; anything else is discarded and answered with the current
    /// session.
    pub(crate) fn complete_refresh(
        &self,
        generation: u64,
        result: AuthResult<Token>,
    ) -> RefreshOutcome {
        let (outcome, change) = {
            let mut inner = self.shared.inner.lock();
            let dispatched = inner.in_flight.as_ref().map(|f| f.generation);
            if dispatched != Some(generation) || inner.generation != generation {
                if dispatched == Some(generation) {
                    inner.in_flight = None;
                }
                debug!(
                    generation,
                    current_generation = inner.generation,
                    "Discarding refresh result for a superseded generation"
                );
                return match inner.token.as_ref() {
                    Some(token) => RefreshOutcome::Retry(token.clone()),
                    None => RefreshOutcome::SessionExpired,
                };
            }
            inner.in_flight = None;

            match result {
                Ok(token) => match self.shared.repository.save(&token) {
                    Ok(()) => {
                        inner.token = Some(token.clone());
                        inner.generation += 1;
                        let change = advance(&mut inner, &SessionMachineInput::RefreshSucceeded);
                        info!(generation = inner.generation, "Token refreshed");
                        (RefreshOutcome::Retry(token), change)
                    }
                    Err(e) => {
                        warn!(error = %e, "Could not persist refreshed token, ending session");
                        inner.token = None;
                        inner.generation += 1;
                        let change = advance(&mut inner, &SessionMachineInput::SessionInvalidated);
                        (RefreshOutcome::SessionExpired, change)
                    }
                },
                Err(AuthError::ExpiredRefreshToken(msg)) => {
                    info!(generation, reason = %msg, "Refresh token rejected, ending session");
                    if let Err(e) = self.shared.repository.clear() {
                        warn!(error = %e, "Failed to clear token store");
                    }
                    inner.token = None;
                    inner.generation += 1;
                    let change = advance(&mut inner, &SessionMachineInput::RefreshRejected);
                    (RefreshOutcome::SessionExpired, change)
                }
                Err(e) => {
                    let skew = self.shared.config.skew();
                    let still_valid = inner
                        .token
                        .as_ref()
                        .is_some_and(|t| !t.is_expired(skew));
                    let change = if still_valid {
                        warn!(generation, error = %e, "Token refresh failed, keeping current token");
                        advance(&mut inner, &SessionMachineInput::TransientFailureWithValidToken)
                    } else {
                        warn!(generation, error = %e, "Token refresh failed and token has expired");
                        inner.token = None;
                        inner.generation += 1;
                        advance(&mut inner, &SessionMachineInput::TransientFailureWithoutValidToken)
                    };
                    (RefreshOutcome::RetryLater(e.to_string()), change)
                }
            }
        };

        self.notify(change);
        outcome
    }

    /// Drop the session without contacting the server.
    fn invalidate(&self, reason: &str) {
        let change = {
            let mut inner = self.shared.inner.lock();
            if let Err(e) = self.shared.repository.clear() {
                warn!(error = %e, "Failed to clear token store");
            }
            if inner.token.take().is_some() {
                info!(reason, "Session invalidated");
            }
            inner.generation += 1;
            advance(&mut inner, &SessionMachineInput::SessionInvalidated)
        };
        self.notify(change);
    }

    fn notify(&self, change: Option<SessionStateChanged>) {
        let Some(change) = change else {
            return;
        };
        let callback = self.shared.state_callback.lock().clone();
        if let Some(callback) = callback {
            callback(change);
        }
    }

    #[cfg(test)]
    pub(crate) fn begin_refresh_for_test(&self) -> Option<u64> {
        let mut inner = self.shared.inner.lock();
        inner.token.as_ref()?;
        let generation = inner.generation;
        let (tx, rx) = watch::channel(None);
        drop(tx);
        advance(&mut inner, &SessionMachineInput::TokenRejected);
        inner.in_flight = Some(InFlight {
            generation,
            outcome: rx,
        });
        Some(generation)
    }
}

/// Transition the FSM, reporting the new state if it changed.
fn transition(
    inner: &mut Inner,
    input: &SessionMachineInput,
) -> AuthResult<Option<SessionStateChanged>> {
    let old_state = SessionState::from(inner.fsm.state());

    inner.fsm.consume(input).map_err(|_| {
        AuthError::InvalidStateTransition(format!(
            "Cannot apply {:?} in state {:?}",
            input, old_state
        ))
    })?;

    let new_state = SessionState::from(inner.fsm.state());
    if old_state == new_state {
        return Ok(None);
    }

    debug!(
        old_state = ?old_state,
        new_state = ?new_state,
        generation = inner.generation,
        "Session state transition"
    );
    Ok(Some(SessionStateChanged {
        state: new_state,
        generation: inner.generation,
    }))
}

fn advance(inner: &mut Inner, input: &SessionMachineInput) -> Option<SessionStateChanged> {
    transition(inner, input).unwrap_or_else(|e| {
        warn!(error = %e, "Ignoring session state transition");
        None
    })
}
