//! Request and response bodies of the auth endpoints.

use crate::{AuthError, AuthResult};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use client_storage::Token;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Email/password login request.
#[derive(Clone, Serialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

impl fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginRequest")
            .field("email", &self.email)
            .finish_non_exhaustive()
    }
}

/// Account registration request.
#[derive(Clone, Serialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

impl fmt::Debug for RegisterRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisterRequest")
            .field("email", &self.email)
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

/// Refresh-token exchange request.
#[derive(Clone, Serialize)]
pub struct RefreshRequest {
    pub refresh: String,
}

/// Server-side logout request.
#[derive(Clone, Serialize)]
pub struct LogoutRequest {
    pub refresh: String,
}

/// Token response shared by login, register and refresh.
///
/// Refresh responses may omit the refresh token, in which case the caller's
/// current one stays in use.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenPayload {
    #[serde(alias = "access_token", alias = "accessToken")]
    pub access: String,
    #[serde(default, alias = "refresh_token", alias = "refreshToken")]
    pub refresh: Option<String>,
    #[serde(default, alias = "expiresAt")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default, alias = "expiresIn")]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub user: Option<serde_json::Value>,
}

impl TokenPayload {
    /// Build the session token this payload describes.
    ///
    /// Expiry is taken from, in order: `expires_at`, `expires_in`, the
    /// access token's JWT `exp` claim, and finally `now + default_ttl`.
    pub fn into_token(self, previous_refresh: Option<&str>, default_ttl: Duration) -> AuthResult<Token> {
        self.into_token_at(Utc::now(), previous_refresh, default_ttl)
    }

    pub(crate) fn into_token_at(
        self,
        now: DateTime<Utc>,
        previous_refresh: Option<&str>,
        default_ttl: Duration,
    ) -> AuthResult<Token> {
        if self.access.is_empty() {
            return Err(AuthError::InvalidTokenPayload(
                "missing access token".to_string(),
            ));
        }

        let refresh = match self.refresh.filter(|r| !r.is_empty()) {
            Some(refresh) => refresh,
            None => previous_refresh
                .filter(|r| !r.is_empty())
                .map(str::to_string)
                .ok_or_else(|| {
                    AuthError::InvalidTokenPayload("missing refresh token".to_string())
                })?,
        };

        let expires_at = match (self.expires_at, self.expires_in) {
            (Some(at), _) => at,
            (None, Some(secs)) => expires_in_from(now, secs)?,
            (None, None) => match jwt_exp_claim(&self.access) {
                Some(exp) => DateTime::from_timestamp(exp, 0).ok_or_else(|| {
                    AuthError::InvalidTokenPayload(format!("exp claim {} out of range", exp))
                })?,
                None => now.checked_add_signed(default_ttl).ok_or_else(|| {
                    AuthError::InvalidTokenPayload("default lifetime out of range".to_string())
                })?,
            },
        };

        Ok(Token::new(self.access, refresh, expires_at))
    }
}

/// `now + secs`, rejecting lifetimes that are negative or overflow.
fn expires_in_from(now: DateTime<Utc>, secs: i64) -> AuthResult<DateTime<Utc>> {
    if secs < 0 {
        return Err(AuthError::InvalidTokenPayload(format!(
            "negative expires_in {}",
            secs
        )));
    }
    Duration::try_seconds(secs)
        .and_then(|lifetime| now.checked_add_signed(lifetime))
        .ok_or_else(|| AuthError::InvalidTokenPayload(format!("expires_in {} out of range", secs)))
}

fn jwt_exp_claim(jwt: &str) -> Option<i64> {
    let payload = jwt.split('.').nth(1)?;
    let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
    let claims: serde_json::Value = serde_json::from_slice(&bytes).ok()?;
    claims.get("exp")?.as_i64()
}

/// Read the `exp` claim of a JWT without verifying it.
///
/// `None` when there is no readable claim or it is not a representable time.
pub fn jwt_expiry(jwt: &str) -> Option<DateTime<Utc>> {
    jwt_exp_claim(jwt).and_then(|exp| DateTime::from_timestamp(exp, 0))
}

/// Pull a human-readable message out of an error body.
pub fn error_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    ["detail", "error", "message"]
        .iter()
        .find_map(|key| value.get(*key).and_then(|v| v.as_str()))
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jwt_with_exp(exp: i64) -> String {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
        let claims = URL_SAFE_NO_PAD.encode(format!(r#"{{"exp":{},"user_id":7}}"#, exp));
        format!("{}.{}.sig", header, claims)
    }

    fn now() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    #[test]
    fn test_parse_simplejwt_response() {
        let payload: TokenPayload = serde_json::from_str(
            r#"{"access":"a1","refresh":"r1","user":{"id":1,"email":"x@y.z"}}"#,
        )
        .unwrap();
        assert_eq!(payload.access, "a1");
        assert_eq!(payload.refresh.as_deref(), Some("r1"));
        assert!(payload.user.is_some());
    }

    #[test]
    fn test_parse_aliased_fields() {
        let payload: TokenPayload = serde_json::from_str(
            r#"{"accessToken":"a1","refreshToken":"r1","expiresIn":120}"#,
        )
        .unwrap();
        let token = payload
            .into_token_at(now(), None, Duration::seconds(300))
            .unwrap();
        assert_eq!(token.access_token, "a1");
        assert_eq!(token.refresh_token, "r1");
        assert_eq!(token.expires_at, now() + Duration::seconds(120));
    }

    #[test]
    fn test_refresh_response_keeps_previous_refresh_token() {
        let payload: TokenPayload = serde_json::from_str(r#"{"access":"a2"}"#).unwrap();
        let token = payload
            .into_token_at(now(), Some("r1"), Duration::seconds(300))
            .unwrap();
        assert_eq!(token.refresh_token, "r1");
    }

    #[test]
    fn test_missing_refresh_without_previous_is_error() {
        let payload: TokenPayload = serde_json::from_str(r#"{"access":"a2"}"#).unwrap();
        assert!(matches!(
            payload.into_token_at(now(), None, Duration::seconds(300)),
            Err(AuthError::InvalidTokenPayload(_))
        ));
    }

    #[test]
    fn test_empty_access_is_error() {
        let payload: TokenPayload =
            serde_json::from_str(r#"{"access":"","refresh":"r"}"#).unwrap();
        assert!(payload
            .into_token_at(now(), None, Duration::seconds(300))
            .is_err());
    }

    #[test]
    fn test_expiry_from_jwt_claim() {
        let access = jwt_with_exp(1_700_000_900);
        let payload = TokenPayload {
            access,
            refresh: Some("r".to_string()),
            expires_at: None,
            expires_in: None,
            user: None,
        };
        let token = payload
            .into_token_at(now(), None, Duration::seconds(300))
            .unwrap();
        assert_eq!(token.expires_at.timestamp(), 1_700_000_900);
    }

    #[test]
    fn test_expiry_falls_back_to_default_ttl() {
        let payload: TokenPayload =
            serde_json::from_str(r#"{"access":"opaque","refresh":"r"}"#).unwrap();
        let token = payload
            .into_token_at(now(), None, Duration::seconds(300))
            .unwrap();
        assert_eq!(token.expires_at, now() + Duration::seconds(300));
    }

    fn with_expires_in(secs: i64) -> TokenPayload {
        TokenPayload {
            access: "a1".to_string(),
            refresh: Some("r1".to_string()),
            expires_at: None,
            expires_in: Some(secs),
            user: None,
        }
    }

    #[test]
    fn test_huge_expires_in_is_invalid_payload() {
        for secs in [i64::MAX, i64::MAX / 1000, 400_000 * 365 * 86_400] {
            let result = with_expires_in(secs).into_token_at(now(), None, Duration::seconds(300));
            assert!(
                matches!(result, Err(AuthError::InvalidTokenPayload(_))),
                "expires_in {} accepted",
                secs
            );
        }
    }

    #[test]
    fn test_negative_expires_in_is_invalid_payload() {
        for secs in [-1, i64::MIN] {
            let result = with_expires_in(secs).into_token_at(now(), None, Duration::seconds(300));
            assert!(matches!(result, Err(AuthError::InvalidTokenPayload(_))));
        }
    }

    #[test]
    fn test_zero_expires_in_expires_now() {
        let token = with_expires_in(0)
            .into_token_at(now(), None, Duration::seconds(300))
            .unwrap();
        assert_eq!(token.expires_at, now());
    }

    #[test]
    fn test_out_of_range_jwt_exp_is_invalid_payload() {
        let payload = TokenPayload {
            access: jwt_with_exp(i64::MAX),
            refresh: Some("r".to_string()),
            expires_at: None,
            expires_in: None,
            user: None,
        };
        assert_eq!(jwt_expiry(&payload.access), None);
        assert!(matches!(
            payload.into_token_at(now(), None, Duration::seconds(300)),
            Err(AuthError::InvalidTokenPayload(_))
        ));
    }

    #[test]
    fn test_error_message_extraction() {
        assert_eq!(
            error_message(r#"{"detail":"No active account found"}"#).as_deref(),
            Some("No active account found")
        );
        assert_eq!(
            error_message(r#"{"error":"bad"}"#).as_deref(),
            Some("bad")
        );
        assert_eq!(error_message("<html>"), None);
    }
}
