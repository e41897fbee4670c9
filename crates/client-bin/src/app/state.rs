//! Builds the session layer from configuration.

use auth_interceptor::{ApiClient, AuthInterceptor, InterceptorConfig, ReqwestTransport};
use client_config_and_utils::{Config, Paths};
use client_storage::{FileStorage, TokenStore};
use reqwest::StatusCode;
use session_auth::{
    FailurePolicy, HttpAuthTransport, SessionConfig, SessionManager, SessionRepository,
};
use std::sync::Arc;
use tracing::{debug, info};

/// Everything a command needs.
pub struct ClientState {
    pub paths: Paths,
    pub config: Config,
    pub session: SessionManager,
    pub client: ApiClient,
}

impl ClientState {
    /// Wire storage, transports and the session manager, then restore any
    /// persisted session.
    pub fn build(config: Config, paths: Paths) -> Result<Self, Box<dyn std::error::Error>> {
        let http = &config.http;
        let settings = &config.session;
        let server_url = config.server_url()?;

        let storage = FileStorage::new(paths.credentials_file())?;
        let auth_transport = HttpAuthTransport::new(
            server_url.as_str(),
            http.connect_timeout(),
            http.request_timeout(),
        )?;

        let session_config = SessionConfig {
            refresh_timeout: settings.refresh_timeout(),
            expiry_skew: settings.expiry_skew(),
            default_access_ttl: settings.default_access_ttl(),
            failure_policy: FailurePolicy {
                terminal_refresh_statuses: settings.terminal_refresh_statuses.clone(),
                invalid_credential_statuses: settings.invalid_credential_statuses.clone(),
            },
        };
        let repository = SessionRepository::new(
            Arc::new(auth_transport),
            TokenStore::new(Box::new(storage)),
        );

        let session = SessionManager::new(repository, session_config);
        session.set_state_callback(Box::new(|change| {
            debug!(state = ?change.state, generation = change.generation, "Session state changed");
        }));
        if session.restore().is_some() {
            info!("Using stored session");
        }

        let api_transport = ReqwestTransport::new(
            server_url,
            http.connect_timeout(),
            http.request_timeout(),
        )?;
        let interceptor = AuthInterceptor::new(
            session.clone(),
            Arc::new(api_transport),
            InterceptorConfig {
                unauthenticated_status: StatusCode::from_u16(settings.unauthenticated_status)?,
                public_paths: settings.public_paths.clone(),
                proactive_refresh: settings.proactive_refresh,
                ..InterceptorConfig::default()
            },
        );

        Ok(Self {
            client: ApiClient::new(interceptor),
            session,
            config,
            paths,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use client_storage::Token;
    use session_auth::SessionState;
    use tempfile::tempdir;

    #[test]
    fn test_build_starts_anonymous() {
        let dir = tempdir().unwrap();
        let paths = Paths::with_base_dir(dir.path().to_path_buf());

        let state = ClientState::build(Config::default(), paths).unwrap();
        assert_eq!(state.session.state(), SessionState::Anonymous);
    }

    #[test]
    fn test_build_restores_stored_session() {
        let dir = tempdir().unwrap();
        let paths = Paths::with_base_dir(dir.path().to_path_buf());
        let token = Token::new(
            "access-1",
            "refresh-1",
            chrono::Utc::now() + chrono::Duration::hours(1),
        );
        TokenStore::new(Box::new(FileStorage::new(paths.credentials_file()).unwrap()))
            .save(&token)
            .unwrap();

        let state = ClientState::build(Config::default(), paths).unwrap();
        assert_eq!(state.session.state(), SessionState::Authenticated);
        assert_eq!(state.session.current_token().unwrap(), token);
    }

    #[test]
    fn test_build_rejects_bad_status() {
        let dir = tempdir().unwrap();
        let paths = Paths::with_base_dir(dir.path().to_path_buf());
        let mut config = Config::default();
        config.session.unauthenticated_status = 1000;

        assert!(ClientState::build(config, paths).is_err());
    }
}
