// ============================
// tests/unit/password_tests.rs
// ============================
//! Unit tests for credential hashing through the public API
use sessiongate_backend::auth::{
    hash_password, validate_password_strength, verify_password, AuthService,
    PasswordRequirements,
};

use crate::test_utils::memory_env;

#[test]
fn test_password_hashing_and_verification() {
    let hash = hash_password("SecureP@ssw0rd");
    assert_ne!(hash, "SecureP@ssw0rd");
    assert!(verify_password("SecureP@ssw0rd", &hash));
    assert!(!verify_password("SecureP@ssw0rd!", &hash));
    assert!(!verify_password("", &hash));
}

#[test]
fn test_hash_is_salt_colon_key() {
    let hash = hash_password("pw");
    let parts: Vec<&str> = hash.split(':').collect();
    assert_eq!(parts.len(), 2);
    assert!(parts.iter().all(|p| !p.is_empty()));
}

#[test]
fn test_unicode_passwords() {
    let hash = hash_password("pässwörd-密码");
    assert!(verify_password("pässwörd-密码", &hash));
    assert!(!verify_password("passwörd-密码", &hash));
}

#[test]
fn test_password_strength_validation() {
    let requirements = PasswordRequirements::default();

    assert!(validate_password_strength("SecureP@ssw0rd", &requirements));
    assert!(!validate_password_strength("Short1", &requirements));
    assert!(!validate_password_strength("nouppercase1!", &requirements));
}

#[tokio::test]
async fn test_service_hash_verifies() {
    let env = memory_env();
    let hash = env.state.auth.hash_password("Sup3rSecret!").await.unwrap();
    assert!(verify_password("Sup3rSecret!", &hash));
}
