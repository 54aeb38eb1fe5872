// ============================
// sessiongate-backend/src/auth/session.rs
// ============================
//! Refresh-token session store.
//!
//! One record per user under `<prefix><user_id>`. Only a SHA-256 digest of
//! the refresh token is written; records from older deployments that kept
//! the token in plaintext are still readable.
use std::{sync::Arc, time::Duration};

use metrics::counter;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use sessiongate_common::SessionView;

use super::password::constant_time_eq;
use crate::clock::SharedClock;
use crate::error::AppError;
use crate::metrics::{
    SESSION_CORRUPT_PURGED, SESSION_EXPIRED_PURGED, SESSION_INVALIDATED,
    SESSION_LEGACY_MIGRATED, SESSION_LEGACY_VALIDATED, SESSION_ROTATED, SESSION_STORED,
};
use crate::storage::KvStore;

/// Default session key prefix
pub const DEFAULT_KEY_PREFIX: &str = "session:";

/// Session store settings
#[derive(Debug, Clone)]
pub struct SessionStoreSettings {
    pub key_prefix: String,
    /// Lifetime applied when the caller does not pass one
    pub refresh_ttl_secs: u64,
    pub migrate_legacy_on_read: bool,
}

impl Default for SessionStoreSettings {
    fn default() -> Self {
        Self {
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
            refresh_ttl_secs: super::token::DEFAULT_REFRESH_TTL_SECS,
            migrate_legacy_on_read: false,
        }
    }
}

/// The refresh credential held by a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshCredential {
    /// Hex SHA-256 of the refresh token
    Hashed(String),
    /// Plaintext token from a legacy record
    LegacyPlaintext(String),
}

/// A loaded session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub user_id: String,
    pub email: String,
    pub credential: RefreshCredential,
    /// Unix milliseconds
    pub created_at: i64,
    /// Unix milliseconds
    pub expires_at: i64,
}

impl Session {
    pub fn is_legacy(&self) -> bool {
        matches!(self.credential, RefreshCredential::LegacyPlaintext(_))
    }

    /// Public view without the credential
    pub fn view(&self) -> SessionView {
        SessionView {
            user_id: self.user_id.clone(),
            email: self.email.clone(),
            created_at: self.created_at,
            expires_at: self.expires_at,
            legacy: self.is_legacy(),
        }
    }
}

/// Persisted record, current format
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    pub user_id: String,
    pub email: String,
    pub refresh_token_hash: String,
    pub created_at: i64,
    pub expires_at: i64,
}

/// Persisted record, legacy plaintext format. Read-only.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LegacySessionRecord {
    user_id: String,
    email: String,
    refresh_token: String,
    created_at: i64,
    expires_at: i64,
}

/// Field whose presence marks a record as the current format
const HASH_FIELD: &str = "refreshTokenHash";

impl From<SessionRecord> for Session {
    fn from(r: SessionRecord) -> Self {
        Session {
            user_id: r.user_id,
            email: r.email,
            credential: RefreshCredential::Hashed(r.refresh_token_hash),
            created_at: r.created_at,
            expires_at: r.expires_at,
        }
    }
}

impl From<LegacySessionRecord> for Session {
    fn from(r: LegacySessionRecord) -> Self {
        Session {
            user_id: r.user_id,
            email: r.email,
            credential: RefreshCredential::LegacyPlaintext(r.refresh_token),
            created_at: r.created_at,
            expires_at: r.expires_at,
        }
    }
}

/// Classify a raw record. A record that names the hash field is the
/// current format or nothing; only records without it may be legacy.
fn parse_record(raw: &str) -> Result<Session, serde_json::Error> {
    let value: serde_json::Value = serde_json::from_str(raw)?;
    let has_hash = value
        .as_object()
        .is_some_and(|fields| fields.contains_key(HASH_FIELD));
    if has_hash {
        serde_json::from_value::<SessionRecord>(value).map(Session::from)
    } else {
        serde_json::from_value::<LegacySessionRecord>(value).map(Session::from)
    }
}

/// Outcome of reading a raw record
enum Loaded {
    Absent,
    Corrupt,
    Present(Session),
}

/// Hex SHA-256 of a refresh token.
///
/// Refresh tokens are already high-entropy, so a fast digest suffices.
pub fn hash_refresh_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

/// Session store over a [`KvStore`]
#[derive(Clone)]
pub struct SessionStore {
    kv: Arc<dyn KvStore>,
    settings: SessionStoreSettings,
    clock: SharedClock,
}

impl SessionStore {
    pub fn new(kv: Arc<dyn KvStore>, settings: SessionStoreSettings, clock: SharedClock) -> Self {
        Self { kv, settings, clock }
    }

    fn key(&self, user_id: &str) -> String {
        format!("{}{}", self.settings.key_prefix, user_id)
    }

    async fn load(&self, key: &str) -> Result<Loaded, AppError> {
        let Some(raw) = self.kv.get(key).await? else {
            return Ok(Loaded::Absent);
        };
        match parse_record(&raw) {
            Ok(session) => Ok(Loaded::Present(session)),
            Err(err) => {
                tracing::warn!(key, error = %err, "unreadable session record");
                Ok(Loaded::Corrupt)
            },
        }
    }

    async fn write(
        &self,
        user_id: &str,
        email: &str,
        refresh_token_hash: String,
        created_at: i64,
        expires_at: i64,
        ttl: Duration,
    ) -> Result<(), AppError> {
        let record = SessionRecord {
            user_id: user_id.to_string(),
            email: email.to_string(),
            refresh_token_hash,
            created_at,
            expires_at,
        };
        let json = serde_json::to_string(&record)?;
        self.kv.set_ex(&self.key(user_id), &json, ttl).await
    }

    /// Persist the hashed refresh token for a user, replacing any existing session
    pub async fn store(
        &self,
        user_id: &str,
        email: &str,
        refresh_token: &str,
        ttl_secs: Option<u64>,
    ) -> Result<(), AppError> {
        let ttl_secs = ttl_secs.unwrap_or(self.settings.refresh_ttl_secs);
        let now = self.clock.now_millis();
        let ttl_ms = i64::try_from(ttl_secs.saturating_mul(1000)).unwrap_or(i64::MAX);

        self.write(
            user_id,
            email,
            hash_refresh_token(refresh_token),
            now,
            now.saturating_add(ttl_ms),
            Duration::from_secs(ttl_secs),
        )
        .await?;

        counter!(SESSION_STORED).increment(1);
        tracing::info!(user_id, ttl_secs, "session stored");
        Ok(())
    }

    /// Load a user's session.
    ///
    /// Expired or unreadable records are deleted and reported as absent.
    pub async fn get(&self, user_id: &str) -> Result<Option<Session>, AppError> {
        let key = self.key(user_id);
        match self.load(&key).await? {
            Loaded::Absent => Ok(None),
            Loaded::Corrupt => {
                self.kv.delete(&key).await?;
                counter!(SESSION_CORRUPT_PURGED).increment(1);
                Ok(None)
            },
            Loaded::Present(session) if session.expires_at < self.clock.now_millis() => {
                self.kv.delete(&key).await?;
                counter!(SESSION_EXPIRED_PURGED).increment(1);
                tracing::debug!(user_id, "expired session purged on read");
                Ok(None)
            },
            Loaded::Present(session) => Ok(Some(session)),
        }
    }

    /// Check a presented refresh token against the user's session
    pub async fn validate(&self, user_id: &str, candidate: &str) -> Result<bool, AppError> {
        let Some(session) = self.get(user_id).await? else {
            return Ok(false);
        };

        match &session.credential {
            RefreshCredential::Hashed(stored) => {
                let candidate_hash = hash_refresh_token(candidate);
                Ok(constant_time_eq(candidate_hash.as_bytes(), stored.as_bytes()))
            },
            RefreshCredential::LegacyPlaintext(stored) => {
                let valid = constant_time_eq(candidate.as_bytes(), stored.as_bytes());
                if valid {
                    counter!(SESSION_LEGACY_VALIDATED).increment(1);
                    tracing::warn!(user_id, "validated legacy plaintext session");
                    if self.settings.migrate_legacy_on_read {
                        self.migrate_legacy(&session, candidate).await?;
                    }
                }
                Ok(valid)
            },
        }
    }

    /// Re-write a legacy record in hashed form, keeping its original expiry
    async fn migrate_legacy(&self, session: &Session, token: &str) -> Result<(), AppError> {
        let remaining_ms = session.expires_at - self.clock.now_millis();
        if remaining_ms <= 0 {
            return Ok(());
        }
        self.write(
            &session.user_id,
            &session.email,
            hash_refresh_token(token),
            session.created_at,
            session.expires_at,
            Duration::from_millis(remaining_ms as u64),
        )
        .await?;
        counter!(SESSION_LEGACY_MIGRATED).increment(1);
        tracing::info!(user_id = %session.user_id, "legacy session migrated");
        Ok(())
    }

    /// Replace the session's refresh token. Returns `false` when there is
    /// no session to rotate.
    pub async fn rotate(
        &self,
        user_id: &str,
        new_refresh_token: &str,
        ttl_secs: Option<u64>,
    ) -> Result<bool, AppError> {
        let Some(existing) = self.get(user_id).await? else {
            return Ok(false);
        };
        self.store(user_id, &existing.email, new_refresh_token, ttl_secs)
            .await?;
        counter!(SESSION_ROTATED).increment(1);
        Ok(true)
    }

    /// Delete the user's session
    pub async fn invalidate(&self, user_id: &str) -> Result<(), AppError> {
        self.kv.delete(&self.key(user_id)).await?;
        counter!(SESSION_INVALIDATED).increment(1);
        tracing::info!(user_id, "session invalidated");
        Ok(())
    }

    /// All sessions for a user: zero or one
    pub async fn list_sessions(&self, user_id: &str) -> Result<Vec<Session>, AppError> {
        Ok(self.get(user_id).await?.into_iter().collect())
    }

    /// Purge the user's record if it is past its absolute expiry or unreadable.
    /// Returns the number of records removed.
    pub async fn cleanup_expired(&self, user_id: &str) -> Result<u32, AppError> {
        let key = self.key(user_id);
        let purge = match self.load(&key).await? {
            Loaded::Absent => false,
            Loaded::Corrupt => true,
            Loaded::Present(session) => session.expires_at < self.clock.now_millis(),
        };
        if !purge {
            return Ok(0);
        }
        self.kv.delete(&key).await?;
        counter!(SESSION_EXPIRED_PURGED).increment(1);
        tracing::info!(user_id, "expired session cleaned up");
        Ok(1)
    }
}
