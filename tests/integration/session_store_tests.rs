//! Session store behaviour over the flat-file backend
use std::time::Duration;

use serde_json::json;
use sessiongate_backend::auth::{hash_refresh_token, AuthService, Identity, RefreshCredential};
use sessiongate_backend::clock::Clock;
use sessiongate_backend::storage::{FlatFileKvStore, KvStore};

use crate::test_utils::{file_env, file_env_with, test_settings, TestEnv};

async fn put_legacy(env: &TestEnv, user_id: &str, token: &str) {
    let now = env.clock.now_millis();
    let record = json!({
        "userId": user_id,
        "email": format!("{user_id}@example.com"),
        "refreshToken": token,
        "createdAt": now,
        "expiresAt": now + 3_600_000,
    });
    env.kv
        .set_ex(
            &format!("session:{user_id}"),
            &record.to_string(),
            Duration::from_secs(3600),
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn test_legacy_plaintext_session_validates() {
    let env = file_env();
    put_legacy(&env, "u2", "abc").await;

    let sessions = &env.state.sessions;
    assert!(sessions.validate("u2", "abc").await.unwrap());
    assert!(!sessions.validate("u2", "xyz").await.unwrap());

    let session = sessions.get("u2").await.unwrap().unwrap();
    assert!(session.is_legacy());
    let raw = env.kv.get("session:u2").await.unwrap().unwrap();
    assert!(raw.contains("\"refreshToken\":\"abc\""));
}

#[tokio::test]
async fn test_legacy_session_migrates_when_enabled() {
    let mut settings = test_settings();
    settings.sessions.migrate_legacy_on_read = true;
    let env = file_env_with(settings);
    put_legacy(&env, "u2", "abc").await;

    assert!(env.state.sessions.validate("u2", "abc").await.unwrap());

    let session = env.state.sessions.get("u2").await.unwrap().unwrap();
    assert_eq!(
        session.credential,
        RefreshCredential::Hashed(hash_refresh_token("abc"))
    );
    let raw = env.kv.get("session:u2").await.unwrap().unwrap();
    assert!(!raw.contains("\"refreshToken\""));
    assert!(env.state.sessions.validate("u2", "abc").await.unwrap());
}

#[tokio::test]
async fn test_sessions_survive_restart() {
    let env = file_env();
    let pair = env
        .state
        .auth
        .issue(&Identity::new("u1", "alice@example.com"))
        .await
        .unwrap();

    let dir = env.dir.as_ref().unwrap().path();
    let reopened = FlatFileKvStore::new(dir).unwrap();
    let raw = reopened.get("session:u1").await.unwrap().unwrap();
    assert!(raw.contains(&hash_refresh_token(&pair.refresh_token)));
    assert!(!raw.contains(&pair.refresh_token));
}

#[tokio::test]
async fn test_corrupt_file_record_is_dropped() {
    let env = file_env();
    env.kv
        .set_ex("session:u3", "{not json", Duration::from_secs(60))
        .await
        .unwrap();

    assert!(env.state.sessions.get("u3").await.unwrap().is_none());
    assert!(env.kv.get("session:u3").await.unwrap().is_none());
}

#[tokio::test]
async fn test_cleanup_expired_over_file_store() {
    let env = file_env();
    env.state
        .sessions
        .store("u4", "d@example.com", "tok", Some(60))
        .await
        .unwrap();

    assert_eq!(env.state.sessions.cleanup_expired("u4").await.unwrap(), 0);
    env.clock.advance_secs(61);
    assert_eq!(env.state.sessions.cleanup_expired("u4").await.unwrap(), 1);
    assert!(env.kv.get("session:u4").await.unwrap().is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_refreshes_over_file_store() {
    let env = file_env();
    let first = env
        .state
        .auth
        .issue(&Identity::new("u1", "alice@example.com"))
        .await
        .unwrap();
    let tokens: Vec<String> = (0..4)
        .map(|i| format!("concurrent-{i}"))
        .collect();

    let rotations: Vec<_> = tokens
        .iter()
        .cloned()
        .map(|token| {
            let sessions = env.state.sessions.clone();
            tokio::spawn(async move { sessions.rotate("u1", &token, None).await })
        })
        .collect();
    for rotation in rotations {
        assert!(rotation.await.unwrap().unwrap());
    }

    let mut valid = 0;
    for token in &tokens {
        if env.state.sessions.validate("u1", token).await.unwrap() {
            valid += 1;
        }
    }
    assert_eq!(valid, 1);
    assert!(!env.state.sessions.validate("u1", &first.refresh_token).await.unwrap());
}
