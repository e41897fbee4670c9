//! Session state machine using rust-fsm.
//!
//! The machine is the single authority on whether the client is anonymous,
//! authenticated, or waiting on a refresh. [`crate::SessionManager`] owns the
//! only instance and drives it under its state lock.
//!
//! ## State Diagram
//!
//! ```text
//!                 LoginSucceeded / SessionRestored
//! ┌─────────────┐ ─────────────────────────────────► ┌─────────────────┐
//! │  Anonymous  │                                     │  Authenticated  │
//! └─────────────┘ ◄───────────────────────────────── └────────┬────────┘
//!        ▲          LogoutRequested / SessionInvalidated        │ TokenRejected
//!        │                                                      ▼
//!        │  RefreshRejected                            ┌─────────────────┐
//!        │  TransientFailureWithoutValidToken          │   Refreshing    │
//!        └──────────────────────────────────────────── └────────┬────────┘
//!                                                               │ RefreshSucceeded
//!                                                               │ TransientFailureWithValidToken
//!                                                               ▼
//!                                                         Authenticated
//! ```

use rust_fsm::*;
use serde::{Deserialize, Serialize};

state_machine! {
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub session_machine(Anonymous)

    Anonymous => {
        LoginSucceeded => Authenticated,
        SessionRestored => Authenticated,
        LogoutRequested => Anonymous,
        SessionInvalidated => Anonymous
    },
    Authenticated => {
        // Re-login replaces the token in place
        LoginSucceeded => Authenticated,
        TokenRejected => Refreshing,
        LogoutRequested => Anonymous,
        SessionInvalidated => Anonymous
    },
    Refreshing => {
        RefreshSucceeded => Authenticated,
        // Refresh token expired or revoked
        RefreshRejected => Anonymous,
        // Network failure, the previous access token is still within its lifetime
        TransientFailureWithValidToken => Authenticated,
        // Network failure and the previous access token has lapsed too
        TransientFailureWithoutValidToken => Anonymous,
        LoginSucceeded => Authenticated,
        LogoutRequested => Anonymous,
        SessionInvalidated => Anonymous
    }
}

pub use session_machine::Input as SessionMachineInput;
pub use session_machine::State as SessionMachineState;
pub use session_machine::StateMachine as SessionMachine;

/// Public view of the session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// No token.
    Anonymous,
    /// A token is installed and no refresh is pending.
    Authenticated,
    /// A refresh call is in flight; rejected callers wait on it.
    Refreshing,
}

impl SessionState {
    /// Returns true if requests can currently be stamped with a token.
    pub fn has_token(&self) -> bool {
        matches!(self, SessionState::Authenticated | SessionState::Refreshing)
    }
}

impl From<&SessionMachineState> for SessionState {
    fn from(state: &SessionMachineState) -> Self {
        match state {
            SessionMachineState::Anonymous => SessionState::Anonymous,
            SessionMachineState::Authenticated => SessionState::Authenticated,
            SessionMachineState::Refreshing => SessionState::Refreshing,
        }
    }
}

/// Payload delivered to state observers on every state change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStateChanged {
    /// New session state.
    pub state: SessionState,
    /// Session generation after the change.
    pub generation: u64,
}
