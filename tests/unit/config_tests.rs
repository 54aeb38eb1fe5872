// ==========================
// tests/unit/config_tests.rs
// ==========================
//! Unit tests for configuration loading
use figment::Jail;
use sessiongate_backend::config::{Settings, StoreBackend};
use sessiongate_backend::error::AppError;
use std::path::PathBuf;

#[test]
fn test_load_from_json_file() {
    Jail::expect_with(|jail| {
        jail.create_file(
            "gate.json",
            r#"{
                "auth": { "jwt_secret": "json-secret-json-secret-json-secret" },
                "store": { "backend": "file", "path": "sessions-kv" },
                "sessions": { "migrate_legacy_on_read": true }
            }"#,
        )?;

        let settings = Settings::load_from("gate.json").expect("settings load");
        assert_eq!(settings.store.backend, StoreBackend::File);
        assert_eq!(settings.store.path, PathBuf::from("sessions-kv"));
        assert!(settings.sessions.migrate_legacy_on_read);
        Ok(())
    });
}

#[test]
fn test_missing_file_falls_back_to_defaults_and_env() {
    Jail::expect_with(|jail| {
        jail.set_env("SESSIONGATE_AUTH__JWT_SECRET", "prefixed-secret-prefixed-secret-xx");
        jail.set_env("SESSIONGATE_RATE_LIMIT__MAX_ATTEMPTS", "9");

        let settings = Settings::load_from("does-not-exist.toml").expect("settings load");
        assert_eq!(settings.rate_limit.max_attempts, 9);
        assert_eq!(settings.auth.access_ttl_secs, 900);
        Ok(())
    });
}

#[test]
fn test_prefixed_env_wins_over_shorthand() {
    Jail::expect_with(|jail| {
        jail.set_env("JWT_SECRET", "shorthand-secret-shorthand-secret");
        jail.set_env("SESSIONGATE_AUTH__JWT_SECRET", "prefixed-secret-prefixed-secret-xx");

        let settings = Settings::load().expect("settings load");
        assert_eq!(
            settings.auth.jwt_secret.as_deref(),
            Some("prefixed-secret-prefixed-secret-xx")
        );
        Ok(())
    });
}

#[test]
fn test_invalid_file_values_are_rejected() {
    Jail::expect_with(|jail| {
        jail.create_file(
            "sessiongate.toml",
            r#"
            [auth]
            jwt_secret = "file-secret-file-secret-file-secret"
            cookie_name = "  "
            "#,
        )?;

        assert!(matches!(Settings::load(), Err(AppError::Config(_))));
        Ok(())
    });
}
