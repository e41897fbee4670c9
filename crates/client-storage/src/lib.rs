//! Secure token storage for the OpenPatent client.
//!
//! This crate provides:
//! - The [`Token`] value persisted for a session
//! - The [`SecureStorage`] backend trait (platform keychains plug in here)
//! - [`MemoryStorage`] and [`FileStorage`] backends
//! - [`TokenStore`], the save/load/clear contract used by the session layer

mod file;
mod keys;
mod memory;
mod token;
mod token_store;
mod traits;

pub use file::FileStorage;
pub use keys::StorageKeys;
pub use memory::MemoryStorage;
pub use token::Token;
pub use token_store::TokenStore;
pub use traits::SecureStorage;

use thiserror::Error;

/// Error type for storage operations.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Backend-specific storage error
    #[error("Platform storage error: {0}")]
    Platform(String),

    /// Encoding/decoding error
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;
