//! End-to-end flows through the auth service
use sessiongate_backend::auth::{AuthService, Identity, PairOptions, TokenError};
use sessiongate_backend::error::AppError;

use crate::test_utils::{memory_env, memory_env_with, test_settings};

#[tokio::test]
async fn test_access_token_expires_with_clock() {
    let env = memory_env();
    let pair = env
        .state
        .tokens
        .create_token_pair(
            "u1",
            "alice@example.com",
            &PairOptions {
                access_ttl_secs: Some(900),
                ..PairOptions::default()
            },
        )
        .unwrap();

    let claims = env.state.tokens.verify_access_token(&pair.access_token).unwrap();
    assert_eq!(claims.user_id, "u1");
    assert_eq!(claims.email, "alice@example.com");

    env.clock.advance_secs(901);
    assert_eq!(
        env.state.tokens.verify_access_token(&pair.access_token),
        Err(TokenError::Expired)
    );
}

#[tokio::test]
async fn test_login_refresh_logout() {
    let env = memory_env();
    let auth = &env.state.auth;
    let identity = Identity::new("u1", "alice@example.com");
    let hash = auth.hash_password("Sup3rSecret!").await.unwrap();

    let first = auth.login(&identity, "Sup3rSecret!", &hash).await.unwrap();
    assert!(env.state.sessions.validate("u1", &first.refresh_token).await.unwrap());

    let second = auth.refresh(&first.refresh_token).await.unwrap();
    assert_ne!(first.refresh_token, second.refresh_token);
    assert!(matches!(
        auth.refresh(&first.refresh_token).await,
        Err(AppError::InvalidSession)
    ));

    auth.logout("u1").await.unwrap();
    assert!(matches!(
        auth.refresh(&second.refresh_token).await,
        Err(AppError::InvalidSession)
    ));
    assert!(env.state.sessions.get("u1").await.unwrap().is_none());
}

#[tokio::test]
async fn test_new_login_replaces_previous_session() {
    let env = memory_env();
    let auth = &env.state.auth;
    let identity = Identity::new("u1", "alice@example.com");

    let laptop = auth.issue(&identity).await.unwrap();
    let phone = auth.issue(&identity).await.unwrap();

    assert!(matches!(
        auth.refresh(&laptop.refresh_token).await,
        Err(AppError::InvalidSession)
    ));
    assert!(auth.refresh(&phone.refresh_token).await.is_ok());
}

#[tokio::test]
async fn test_login_lockout_uses_configured_limit() {
    let mut settings = test_settings();
    settings.rate_limit.max_attempts = 2;
    let env = memory_env_with(settings);
    let auth = &env.state.auth;
    let identity = Identity::new("u1", "alice@example.com");
    let hash = auth.hash_password("Sup3rSecret!").await.unwrap();

    for _ in 0..2 {
        assert!(matches!(
            auth.login(&identity, "wrong", &hash).await,
            Err(AppError::InvalidPassword)
        ));
    }
    assert!(matches!(
        auth.login(&identity, "Sup3rSecret!", &hash).await,
        Err(AppError::AuthRateLimited)
    ));
}

#[tokio::test]
async fn test_refresh_token_rejected_after_session_expiry() {
    let mut settings = test_settings();
    settings.auth.refresh_ttl_secs = 120;
    settings.auth.access_ttl_secs = 60;
    let env = memory_env_with(settings);
    let pair = env
        .state
        .auth
        .issue(&Identity::new("u1", "alice@example.com"))
        .await
        .unwrap();

    env.clock.advance_secs(121);
    assert!(matches!(
        env.state.auth.refresh(&pair.refresh_token).await,
        Err(AppError::InvalidToken)
    ));
    assert!(env.state.sessions.get("u1").await.unwrap().is_none());
}
