// =========================
// tests/unit/error_tests.rs
// =========================
//! Unit tests for error responses
use axum::{body::to_bytes, http::StatusCode, response::IntoResponse};
use serde_json::Value;
use sessiongate_backend::{auth::TokenError, error::AppError};

async fn body_of(err: AppError) -> (StatusCode, Value) {
    let response = err.into_response();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn test_auth_errors_share_a_generic_message() {
    for err in [
        AppError::InvalidToken,
        AppError::InvalidPassword,
        AppError::InvalidSession,
    ] {
        let code = err.error_code();
        assert_eq!(err.sanitized_message(), "Authentication failed");
        let (status, json) = body_of(err).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(json["error"]["code"], code);
        assert!(json["error"]["message"].is_string());
    }
}

#[tokio::test]
async fn test_rate_limited_response() {
    let (status, json) = body_of(AppError::AuthRateLimited).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(json["error"]["code"], "AUTH_005");
}

#[test]
fn test_token_errors_map_to_invalid_token() {
    for err in [
        TokenError::Malformed,
        TokenError::BadSignature,
        TokenError::Expired,
        TokenError::WrongClass,
    ] {
        assert!(matches!(AppError::from(err), AppError::InvalidToken));
    }
}

#[test]
fn test_store_failures_are_server_errors() {
    let err = AppError::Store("disk full".to_string());
    assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(err.error_code(), "STORE_001");
    assert!(!err.sanitized_message().contains("disk"));
}
