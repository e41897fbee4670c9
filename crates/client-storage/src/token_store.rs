//! Durable persistence of the session token.

use crate::{SecureStorage, StorageKeys, StorageResult, Token};
use tracing::{debug, warn};

/// Persists exactly one [`Token`] on top of a [`SecureStorage`] backend.
///
/// The whole token is written under a single key so a `save` replaces the
/// previous token in one backend write.
pub struct TokenStore {
    storage: Box<dyn SecureStorage>,
}

impl TokenStore {
    /// Create a new token store with the given storage backend
    pub fn new(storage: Box<dyn SecureStorage>) -> Self {
        Self { storage }
    }

    /// Replace the persisted token.
    pub fn save(&self, token: &Token) -> StorageResult<()> {
        let json = serde_json::to_string(token)
            .map_err(|e| crate::StorageError::Encoding(e.to_string()))?;
        self.storage.set(StorageKeys::SESSION_TOKEN, &json)?;
        debug!(expires_at = %token.expires_at, "Session token saved");
        Ok(())
    }

    /// Load the persisted token.
    ///
    /// Anything that does not decode into a complete token (corrupt JSON,
    /// standalone entries from older app versions) is cleared and reported
    /// as absent.
    pub fn load(&self) -> StorageResult<Option<Token>> {
        let Some(json) = self.storage.get(StorageKeys::SESSION_TOKEN)? else {
            if self.has_legacy_entries()? {
                warn!("Found standalone token entries without expiry, clearing");
                self.clear()?;
            }
            return Ok(None);
        };

        match serde_json::from_str::<Token>(&json) {
            Ok(token) if !token.access_token.is_empty() && !token.refresh_token.is_empty() => {
                Ok(Some(token))
            }
            Ok(_) => {
                warn!("Persisted session token is incomplete, clearing");
                self.clear()?;
                Ok(None)
            }
            Err(e) => {
                warn!(error = %e, "Persisted session token is unreadable, clearing");
                self.clear()?;
                Ok(None)
            }
        }
    }

    /// Remove the persisted token. Clearing an empty store is not an error.
    pub fn clear(&self) -> StorageResult<()> {
        self.storage.delete(StorageKeys::SESSION_TOKEN)?;
        self.storage.delete(StorageKeys::LEGACY_ACCESS_TOKEN)?;
        self.storage.delete(StorageKeys::LEGACY_REFRESH_TOKEN)?;
        debug!("Session token cleared");
        Ok(())
    }

    fn has_legacy_entries(&self) -> StorageResult<bool> {
        Ok(self.storage.has(StorageKeys::LEGACY_ACCESS_TOKEN)?
            || self.storage.has(StorageKeys::LEGACY_REFRESH_TOKEN)?)
    }
}
