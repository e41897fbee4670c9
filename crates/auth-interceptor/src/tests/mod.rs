//! Scenario tests for the interceptor.
//!
//! - `harness.rs`   - Scripted HTTP server, scripted auth server, memory storage
//! - `replay.rs`    - Rejection, single refresh, one-shot replay
//! - `public.rs`    - Public and unauthenticated requests
//! - `proactive.rs` - Refresh before send for expiring tokens
//! - `client.rs`    - Response to error mapping for domain callers

pub(crate) mod harness;
mod public;
