//! JSON client for domain repositories.

use crate::{ApiRequest, ApiResponse, AuthInterceptor, ClientError, ClientResult};
use serde::de::DeserializeOwned;
use serde::Serialize;
use session_auth::wire::error_message;
use session_auth::SessionManager;

/// Domain-facing API client. Every request goes through the interceptor.
#[derive(Clone)]
pub struct ApiClient {
    interceptor: AuthInterceptor,
}

impl ApiClient {
    pub fn new(interceptor: AuthInterceptor) -> Self {
        Self { interceptor }
    }

    pub fn session(&self) -> &SessionManager {
        self.interceptor.session()
    }

    /// Send a request and return the raw response, whatever its status.
    pub async fn send(&self, request: ApiRequest) -> ClientResult<ApiResponse> {
        self.interceptor.execute(request).await
    }

    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> ClientResult<T> {
        let response = self.send(ApiRequest::get(path)).await?;
        self.decode(response)
    }

    pub async fn post_json<B, T>(&self, path: &str, body: &B) -> ClientResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self.send(ApiRequest::post(path).json(body)?).await?;
        self.decode(response)
    }

    /// Turn a non-success response into a typed error.
    pub fn check_status(&self, response: &ApiResponse) -> ClientResult<()> {
        if response.session_expired {
            return Err(ClientError::SessionExpired);
        }
        if response.is_success() {
            return Ok(());
        }

        let text = response.text();
        let message = error_message(&text).unwrap_or_else(|| {
            response
                .status
                .canonical_reason()
                .unwrap_or("unknown error")
                .to_string()
        });
        if response.status == self.interceptor.config().unauthenticated_status {
            return Err(ClientError::Unauthorized(message));
        }
        Err(ClientError::Status {
            status: response.status.as_u16(),
            message,
        })
    }

    fn decode<T: DeserializeOwned>(&self, response: ApiResponse) -> ClientResult<T> {
        self.check_status(&response)?;
        response.json()
    }
}
