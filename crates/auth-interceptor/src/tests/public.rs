use super::harness::{accepts, bearer, rejected, FakeHttp, TestHarness};
use crate::{ApiRequest, InterceptorConfig};
use reqwest::StatusCode;

#[tokio::test]
async fn public_path_sent_without_credentials() {
    let h = TestHarness::new(FakeHttp::new(|_| rejected()));
    h.login().await;

    let response = h
        .interceptor
        .execute(ApiRequest::post("/api/auth/login/"))
        .await
        .unwrap();

    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert!(!response.session_expired);
    let sent = h.http.sent();
    assert_eq!(sent.len(), 1);
    assert!(bearer(&sent[0]).is_none());
    assert_eq!(h.auth.refresh_calls(), 0);
    assert_eq!(h.session().current_token().unwrap().access_token, "access-1");
}

#[tokio::test]
async fn anonymous_request_passes_through() {
    let h = TestHarness::new(FakeHttp::new(accepts(&["access-1"])));

    let response = h
        .interceptor
        .execute(ApiRequest::get("/api/patents/"))
        .await
        .unwrap();

    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert!(!response.session_expired);
    assert!(bearer(&h.http.sent()[0]).is_none());
    assert_eq!(h.auth.refresh_calls(), 0);
}

#[tokio::test]
async fn configured_public_paths() {
    let config = InterceptorConfig {
        public_paths: vec!["/api/status".to_string()],
        ..InterceptorConfig::default()
    };
    let h = TestHarness::with_config(FakeHttp::new(accepts(&["access-1"])), config);
    h.login().await;

    h.interceptor
        .execute(ApiRequest::get("/api/status/"))
        .await
        .unwrap();
    h.interceptor
        .execute(ApiRequest::get("/api/auth/login/"))
        .await
        .unwrap();

    let sent = h.http.sent();
    assert!(bearer(&sent[0]).is_none());
    assert_eq!(bearer(&sent[1]).as_deref(), Some("access-1"));
}

#[tokio::test]
async fn custom_unauthenticated_status() {
    let config = InterceptorConfig {
        unauthenticated_status: StatusCode::FORBIDDEN,
        ..InterceptorConfig::default()
    };
    let h = TestHarness::with_config(FakeHttp::new(|_| rejected()), config);
    h.login().await;

    // 401 is not the configured rejection status, so it is returned untouched
    let response = h
        .interceptor
        .execute(ApiRequest::get("/api/auth/me/"))
        .await
        .unwrap();

    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(h.http.sent().len(), 1);
    assert_eq!(h.auth.refresh_calls(), 0);
}
