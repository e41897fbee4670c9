//! Scenario tests for the session layer.
//!
//! - `harness.rs`      - Manager wired to a scripted auth server and memory storage
//! - `single_flight.rs` - One refresh per generation under concurrent rejection
//! - `stale.rs`        - Stale rejections and superseded refresh results
//! - `failures.rs`     - Terminal and transient refresh failures, storage faults
//! - `lifecycle.rs`    - Login, register, restore, logout, state observation
