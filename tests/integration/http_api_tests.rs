//! HTTP surface: refresh, logout, identity and session administration
use axum::http::StatusCode;
use serde_json::json;
use sessiongate_backend::auth::{AuthService, Identity};

use crate::test_utils::{memory_env, request, send};

#[tokio::test]
async fn test_health() {
    let env = memory_env();
    let (status, body) = send(&env.router(), request("GET", "/health", None, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_refresh_over_http_rotates() {
    let env = memory_env();
    let app = env.router();
    let pair = env
        .state
        .auth
        .issue(&Identity::new("u1", "alice@example.com"))
        .await
        .unwrap();

    let (status, body) = send(
        &app,
        request(
            "POST",
            "/auth/refresh",
            None,
            Some(json!({ "refreshToken": pair.refresh_token })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["expiresIn"], 900);
    let rotated = body["refreshToken"].as_str().unwrap().to_string();
    assert_ne!(rotated, pair.refresh_token);

    let (status, body) = send(
        &app,
        request(
            "POST",
            "/auth/refresh",
            None,
            Some(json!({ "refreshToken": pair.refresh_token })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "AUTH_006");
}

#[tokio::test]
async fn test_refresh_with_access_token_is_rejected() {
    let env = memory_env();
    let pair = env
        .state
        .auth
        .issue(&Identity::new("u1", "alice@example.com"))
        .await
        .unwrap();

    let (status, body) = send(
        &env.router(),
        request(
            "POST",
            "/auth/refresh",
            None,
            Some(json!({ "refreshToken": pair.access_token })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "AUTH_002");
}

#[tokio::test]
async fn test_me_is_optional() {
    let env = memory_env();
    let app = env.router();

    let (status, body) = send(&app, request("GET", "/auth/me", None, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["anonymous"], true);

    let pair = env
        .state
        .auth
        .issue(&Identity::new("u1", "alice@example.com").admin(true))
        .await
        .unwrap();
    let (status, body) = send(
        &app,
        request("GET", "/auth/me", Some(&pair.access_token), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user_id"], "u1");
    assert_eq!(body["is_admin"], true);
}

#[tokio::test]
async fn test_logout_ends_session() {
    let env = memory_env();
    let app = env.router();
    let pair = env
        .state
        .auth
        .issue(&Identity::new("u1", "alice@example.com"))
        .await
        .unwrap();

    let (status, _) = send(&app, request("POST", "/auth/logout", None, None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = send(
        &app,
        request("POST", "/auth/logout", Some(&pair.access_token), None),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(body.is_null());

    let (status, _) = send(
        &app,
        request(
            "POST",
            "/auth/refresh",
            None,
            Some(json!({ "refreshToken": pair.refresh_token })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_session_listing_is_admin_or_self() {
    let env = memory_env();
    let app = env.router();
    let alice = env
        .state
        .auth
        .issue(&Identity::new("u1", "alice@example.com"))
        .await
        .unwrap();
    let root = env
        .state
        .auth
        .issue(&Identity::new("root", "root@example.com").admin(true))
        .await
        .unwrap();

    let (status, body) = send(
        &app,
        request("GET", "/users/u1/sessions", Some(&alice.access_token), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let sessions = body.as_array().unwrap();
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0]["userId"], "u1");
    assert_eq!(sessions[0]["legacy"], false);
    assert!(sessions[0].get("refreshTokenHash").is_none());

    let (status, body) = send(
        &app,
        request("GET", "/users/root/sessions", Some(&alice.access_token), None),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], "AUTH_004");

    let (status, _) = send(
        &app,
        request("GET", "/users/u1/sessions", Some(&root.access_token), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&app, request("GET", "/users/u1/sessions", None, None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_cleanup_requires_admin() {
    let env = memory_env();
    let app = env.router();
    let alice = env
        .state
        .auth
        .issue(&Identity::new("u1", "alice@example.com"))
        .await
        .unwrap();
    let root = env
        .state
        .auth
        .issue(&Identity::new("root", "root@example.com").admin(true))
        .await
        .unwrap();

    let (status, _) = send(
        &app,
        request("DELETE", "/admin/sessions/u1/expired", Some(&alice.access_token), None),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(
        &app,
        request("DELETE", "/admin/sessions/u1/expired", Some(&root.access_token), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["purged"], 0);
    assert!(env.state.sessions.get("u1").await.unwrap().is_some());
}
