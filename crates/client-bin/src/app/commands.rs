//! Command handlers.

use super::ClientState;
use auth_interceptor::{ApiRequest, ClientError};
use session_auth::{AuthError, SessionState};
use tracing::info;

type CommandResult = Result<(), Box<dyn std::error::Error>>;

const RELOGIN_HINT: &str = "Session expired. Run `openpatent-client login` to sign in again.";

fn exit_with(message: &str) -> ! {
    eprintln!("Error: {}", message);
    std::process::exit(1);
}

fn report_auth_error(error: AuthError) -> Box<dyn std::error::Error> {
    match error {
        AuthError::InvalidCredentials(_) => exit_with("Invalid email or password"),
        e if e.is_transient() => {
            exit_with(&format!("Could not reach the server, try again later ({})", e))
        }
        e => e.into(),
    }
}

fn report_client_error(error: ClientError) -> Box<dyn std::error::Error> {
    match error {
        ClientError::SessionExpired => exit_with(RELOGIN_HINT),
        ClientError::Unauthorized(message) => exit_with(&format!(
            "Request was not authorized and the session could not be refreshed: {}",
            message
        )),
        e => e.into(),
    }
}

pub async fn login(state: &ClientState, email: &str, password: &str) -> CommandResult {
    let token = state
        .session
        .login(email, password)
        .await
        .map_err(report_auth_error)?;
    info!("Login command completed");
    println!("Logged in as {}", email);
    println!("Access token valid until {}", token.expires_at);
    Ok(())
}

pub async fn register(
    state: &ClientState,
    email: &str,
    password: &str,
    username: Option<&str>,
) -> CommandResult {
    state
        .session
        .register(email, password, username)
        .await
        .map_err(report_auth_error)?;
    println!("Account created, logged in as {}", email);
    Ok(())
}

pub async fn logout(state: &ClientState) -> CommandResult {
    if state.session.current_token().is_none() {
        println!("Not logged in");
        return Ok(());
    }
    state.session.logout().await?;
    println!("Logged out");
    Ok(())
}

pub fn status(state: &ClientState) {
    println!("Server:  {}", state.config.server_url);
    println!("Storage: {}", state.paths.credentials_file().display());
    match state.session.state() {
        SessionState::Anonymous => println!("Session: not logged in"),
        session_state => {
            println!("Session: {:?}", session_state);
            if let Some(token) = state.session.current_token() {
                let skew_secs = state.config.session.expiry_skew_secs as i64;
                let expired = token.remaining().num_seconds() <= skew_secs;
                println!(
                    "Access token expires {}{}",
                    token.expires_at,
                    if expired { " (refresh due)" } else { "" }
                );
            }
        }
    }
}

pub async fn whoami(state: &ClientState) -> CommandResult {
    if state.session.current_token().is_none() {
        exit_with("Not logged in. Run `openpatent-client login` first.");
    }
    let me: serde_json::Value = state
        .client
        .get_json("/api/auth/me/")
        .await
        .map_err(report_client_error)?;
    println!("{}", serde_json::to_string_pretty(&me)?);
    Ok(())
}

pub async fn get(state: &ClientState, path: &str) -> CommandResult {
    let response = state
        .client
        .send(ApiRequest::get(path))
        .await
        .map_err(report_client_error)?;
    if response.session_expired {
        exit_with(RELOGIN_HINT);
    }

    println!("HTTP {}", response.status);
    let body = response.text();
    match serde_json::from_str::<serde_json::Value>(&body) {
        Ok(value) => println!("{}", serde_json::to_string_pretty(&value)?),
        Err(_) => println!("{}", body),
    }
    Ok(())
}
