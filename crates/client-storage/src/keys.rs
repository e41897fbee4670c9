//! Storage key constants.

/// Storage keys used by the client
pub struct StorageKeys;

impl StorageKeys {
    /// Complete session token (JSON: access, refresh, expiry).
    pub const SESSION_TOKEN: &'static str = "session_token";

    /// Access token written by older app versions as a standalone entry.
    pub const LEGACY_ACCESS_TOKEN: &'static str = "access_token";

    /// Refresh token written by older app versions as a standalone entry.
    pub const LEGACY_REFRESH_TOKEN: &'static str = "refresh_token";
}
