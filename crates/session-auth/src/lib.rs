//! Authenticated session layer for the OpenPatent client.
//!
//! This crate provides:
//! - Explicit FSM-based session state (anonymous, authenticated, refreshing)
//! - Single-flight token refresh shared by every rejected request
//! - The session repository, sole caller of the auth endpoints
//! - Integration with secure storage for token persistence

mod config;
mod error;
mod repository;
mod session;
mod session_fsm;
pub mod transport;
pub mod wire;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

#[cfg(test)]
mod tests;

pub use config::{FailurePolicy, SessionConfig};
pub use error::{AuthError, AuthResult};
pub use repository::SessionRepository;
pub use session::{RefreshOutcome, RequestToken, SessionManager, SessionStateCallback};
pub use session_fsm::session_machine;
pub use session_fsm::{
    SessionMachine, SessionMachineInput, SessionMachineState, SessionState, SessionStateChanged,
};
pub use transport::{AuthEndpoints, AuthTransport, HttpAuthTransport};
