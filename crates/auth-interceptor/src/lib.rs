//! Request-side half of the OpenPatent session layer.
//!
//! [`AuthInterceptor`] stamps outgoing requests with the current access
//! token, reports rejections to the [`session_auth::SessionManager`] and
//! replays a rejected request at most once. [`ApiClient`] is the surface
//! domain repositories call.

mod client;
mod error;
mod interceptor;
mod request;
mod transport;

#[cfg(test)]
mod tests;

pub use client::ApiClient;
pub use error::{ClientError, ClientResult};
pub use interceptor::{AuthInterceptor, InterceptorConfig};
pub use request::{ApiRequest, ApiResponse};
pub use transport::{HttpTransport, ReqwestTransport};
