//! Configuration management for the client.

use crate::{CoreError, CoreResult, Paths};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use url::Url;

/// Default server URL (can be overridden at compile time via OPENPATENT_DEFAULT_SERVER_URL).
pub const DEFAULT_SERVER_URL: &str = match option_env!("OPENPATENT_DEFAULT_SERVER_URL") {
    Some(url) => url,
    None => "http://localhost:8000",
};

/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Main client configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Base URL of the API server.
    #[serde(default = "default_server_url")]
    pub server_url: String,
    /// HTTP client timeouts.
    #[serde(default)]
    pub http: HttpSettings,
    /// Session layer tuning.
    #[serde(default)]
    pub session: SessionSettings,
}

/// HTTP client timeouts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpSettings {
    pub connect_timeout_secs: u64,
    pub request_timeout_secs: u64,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 30,
            request_timeout_secs: 60,
        }
    }
}

/// Session layer tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    /// Upper bound on one refresh call.
    pub refresh_timeout_secs: u64,
    /// Tokens this close to expiry are refreshed before use.
    pub expiry_skew_secs: u64,
    /// Access-token lifetime assumed when the server does not say.
    pub default_access_ttl_secs: u64,
    /// Refresh expiring tokens before sending instead of waiting for a 401.
    pub proactive_refresh: bool,
    /// Status code that signals a rejected access token.
    pub unauthenticated_status: u16,
    /// Refresh statuses that end the session.
    pub terminal_refresh_statuses: Vec<u16>,
    /// Login statuses that mean the credentials were refused.
    pub invalid_credential_statuses: Vec<u16>,
    /// Path prefixes sent without credentials.
    pub public_paths: Vec<String>,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            refresh_timeout_secs: 30,
            expiry_skew_secs: 60,
            default_access_ttl_secs: 300,
            proactive_refresh: true,
            unauthenticated_status: 401,
            terminal_refresh_statuses: vec![400, 401, 403],
            invalid_credential_statuses: vec![400, 401],
            public_paths: vec![
                "/api/auth/login".to_string(),
                "/api/auth/register".to_string(),
                "/api/auth/refresh".to_string(),
                "/api/billing/pricing".to_string(),
                "/health".to_string(),
            ],
        }
    }
}

impl SessionSettings {
    pub fn refresh_timeout(&self) -> Duration {
        Duration::from_secs(self.refresh_timeout_secs)
    }

    pub fn expiry_skew(&self) -> Duration {
        Duration::from_secs(self.expiry_skew_secs)
    }

    pub fn default_access_ttl(&self) -> Duration {
        Duration::from_secs(self.default_access_ttl_secs)
    }
}

impl HttpSettings {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_server_url() -> String {
    DEFAULT_SERVER_URL.to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            server_url: default_server_url(),
            http: HttpSettings::default(),
            session: SessionSettings::default(),
        }
    }
}

impl Config {
    /// Create a new Config with default values, then override from environment.
    pub fn new() -> Self {
        let mut config = Self::default();
        config.load_from_env();
        config
    }

    /// Load configuration from the config file, falling back to defaults,
    /// then apply environment overrides and validate.
    pub fn load(paths: &Paths) -> CoreResult<Self> {
        let config_path = paths.config_file();

        let mut config = if config_path.exists() {
            Self::load_from_file(&config_path)?
        } else {
            Self::default()
        };

        config.load_from_env();
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: &Path) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|source| CoreError::ConfigFile {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Save configuration to a file.
    pub fn save(&self, paths: &Paths) -> CoreResult<()> {
        paths.ensure_dirs()?;
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(paths.config_file(), content)?;
        Ok(())
    }

    /// Override configuration from environment variables.
    fn load_from_env(&mut self) {
        self.apply_env(|name| std::env::var(name).ok());
    }

    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(log_level) = lookup("OPENPATENT_LOG_LEVEL").filter(|v| !v.trim().is_empty()) {
            self.log_level = log_level;
        }
        if let Some(server_url) = lookup("OPENPATENT_SERVER_URL").filter(|v| !v.trim().is_empty()) {
            self.server_url = server_url.trim().to_string();
        }
    }

    /// Reject settings the session layer cannot run with.
    pub fn validate(&self) -> CoreResult<()> {
        self.server_url()?;
        if self.http.connect_timeout_secs == 0 || self.http.request_timeout_secs == 0 {
            return Err(CoreError::Config("HTTP timeouts must be positive".to_string()));
        }
        if self.session.refresh_timeout_secs == 0 {
            return Err(CoreError::Config(
                "session.refresh_timeout_secs must be positive".to_string(),
            ));
        }
        if !(100..600).contains(&self.session.unauthenticated_status) {
            return Err(CoreError::Config(format!(
                "session.unauthenticated_status {} is not an HTTP status",
                self.session.unauthenticated_status
            )));
        }
        Ok(())
    }

    /// Get the server URL as a parsed URL.
    pub fn server_url(&self) -> CoreResult<Url> {
        let url = Url::parse(&self.server_url)?;
        if url.cannot_be_a_base() {
            return Err(CoreError::Config(format!(
                "server_url is not a base URL: {}",
                self.server_url
            )));
        }
        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.log_level, DEFAULT_LOG_LEVEL);
        assert_eq!(config.server_url, DEFAULT_SERVER_URL);
        assert_eq!(config.http.request_timeout(), Duration::from_secs(60));
        assert_eq!(config.session.refresh_timeout(), Duration::from_secs(30));
        assert_eq!(config.session.unauthenticated_status, 401);
        assert!(config.session.proactive_refresh);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_load_partial_file() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("config.json");

        let config_json = r#"{
            "log_level": "debug",
            "session": { "expiry_skew_secs": 10 }
        }"#;
        std::fs::write(&config_path, config_json).unwrap();

        let config = Config::load_from_file(&config_path).unwrap();
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.session.expiry_skew_secs, 10);
        assert_eq!(config.session.refresh_timeout_secs, 30);
        assert_eq!(config.server_url, DEFAULT_SERVER_URL);
    }

    #[test]
    fn test_config_save_and_load_roundtrip() {
        let dir = tempdir().unwrap();
        let paths = Paths::with_base_dir(dir.path().to_path_buf());

        let mut config = Config::default();
        config.log_level = "trace".to_string();
        config.session.public_paths.push("/api/status".to_string());
        config.save(&paths).unwrap();

        let loaded = Config::load_from_file(&paths.config_file()).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_config_malformed_file_names_path() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("config.json");
        std::fs::write(&config_path, "{ not json").unwrap();

        match Config::load_from_file(&config_path) {
            Err(CoreError::ConfigFile { path, .. }) => assert_eq!(path, config_path),
            other => panic!("expected ConfigFile error, got {:?}", other),
        }
    }

    #[test]
    fn test_config_load_nonexistent_uses_defaults() {
        let dir = tempdir().unwrap();
        let paths = Paths::with_base_dir(dir.path().to_path_buf());

        let config = Config::load(&paths).unwrap();
        assert_eq!(config.http, HttpSettings::default());
        assert_eq!(config.session, SessionSettings::default());
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::default();
        config.apply_env(|name| match name {
            "OPENPATENT_SERVER_URL" => Some(" https://api.openpatent.ai ".to_string()),
            "OPENPATENT_LOG_LEVEL" => Some("warn".to_string()),
            _ => None,
        });

        assert_eq!(config.server_url, "https://api.openpatent.ai");
        assert_eq!(config.log_level, "warn");
    }

    #[test]
    fn test_empty_env_values_are_ignored() {
        let mut config = Config::default();
        config.apply_env(|_| Some("  ".to_string()));
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_config_invalid_url() {
        let mut config = Config::default();
        config.server_url = "not a valid url".to_string();
        assert!(config.server_url().is_err());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_status() {
        let mut config = Config::default();
        config.session.unauthenticated_status = 42;
        assert!(matches!(config.validate(), Err(CoreError::Config(_))));
    }

    #[test]
    fn test_validate_rejects_zero_timeout() {
        let mut config = Config::default();
        config.session.refresh_timeout_secs = 0;
        assert!(config.validate().is_err());
    }
}
