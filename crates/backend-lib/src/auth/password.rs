// ============================
// sessiongate-backend/src/auth/password.rs
// ============================
//! Password hashing and verification.
//!
//! Stored form is `base64(salt):base64(key)` where the key is
//! PBKDF2-HMAC-SHA256 over the password with a fresh 16-byte salt.
use base64::{engine::general_purpose::STANDARD, Engine as _};
use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use zeroize::{Zeroize, Zeroizing};

/// Minimum password length
pub const MIN_PASSWORD_LENGTH: usize = 10;

/// PBKDF2 iteration count
pub const PBKDF2_ITERATIONS: u32 = 100_000;

/// Salt length in bytes
pub const SALT_LEN: usize = 16;

/// Derived key length in bytes
pub const KEY_LEN: usize = 32;

/// Password complexity requirements
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PasswordRequirements {
    pub min_length: usize,
    pub require_uppercase: bool,
    pub require_lowercase: bool,
    pub require_digit: bool,
    pub require_special: bool,
}

impl Default for PasswordRequirements {
    fn default() -> Self {
        Self {
            min_length: MIN_PASSWORD_LENGTH,
            require_uppercase: true,
            require_lowercase: true,
            require_digit: true,
            require_special: true,
        }
    }
}

fn derive_key(plain: &[u8], salt: &[u8]) -> Zeroizing<[u8; KEY_LEN]> {
    let mut key = Zeroizing::new([0u8; KEY_LEN]);
    pbkdf2_hmac::<Sha256>(plain, salt, PBKDF2_ITERATIONS, &mut key[..]);
    key
}

/// Hash a password with a fresh random salt
pub fn hash_password(plain: &str) -> String {
    let mut salt = [0u8; SALT_LEN];
    rand::rng().fill_bytes(&mut salt);
    let key = derive_key(plain.as_bytes(), &salt);
    format!("{}:{}", STANDARD.encode(salt), STANDARD.encode(&key[..]))
}

/// Verify a password against a stored hash.
///
/// Any parse failure yields `false`.
pub fn verify_password(plain: &str, stored: &str) -> bool {
    let Some((salt_b64, key_b64)) = stored.split_once(':') else {
        return false;
    };
    let (Ok(salt), Ok(expected)) = (STANDARD.decode(salt_b64), STANDARD.decode(key_b64)) else {
        return false;
    };
    if salt.is_empty() || expected.len() != KEY_LEN {
        return false;
    }

    let candidate = derive_key(plain.as_bytes(), &salt);
    constant_time_eq(&candidate[..], &expected)
}

/// Compare two byte strings without short-circuiting on the first mismatch.
///
/// Length is not secret: differing lengths return early.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

/// Check if a password meets the complexity requirements
pub fn validate_password_strength(password: &str, requirements: &PasswordRequirements) -> bool {
    if password.chars().count() < requirements.min_length {
        return false;
    }

    if requirements.require_uppercase && !password.chars().any(|c| c.is_uppercase()) {
        return false;
    }

    if requirements.require_lowercase && !password.chars().any(|c| c.is_lowercase()) {
        return false;
    }

    if requirements.require_digit && !password.chars().any(|c| c.is_ascii_digit()) {
        return false;
    }

    if requirements.require_special && !password.chars().any(|c| !c.is_alphanumeric()) {
        return false;
    }

    true
}

/// Hash a password and zeroize the original
pub fn hash_password_secure(plain: &mut String) -> String {
    let hash = hash_password(plain);
    plain.zeroize();
    hash
}
