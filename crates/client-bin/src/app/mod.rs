//! Client wiring and command handlers.

mod commands;
mod state;

pub use commands::{get, login, logout, register, status, whoami};
pub use state::ClientState;
