// ============================
// sessiongate-backend/src/config.rs
// ============================
//! Configuration management.
use std::fmt;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use figment::{
    providers::{Env, Format, Json, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::auth::{validate_password_strength, PasswordRequirements};
use crate::error::AppError;

/// Default configuration file looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "sessiongate.toml";

/// Prefix for environment overrides, e.g. `SESSIONGATE_AUTH__ACCESS_TTL_SECS`
pub const ENV_PREFIX: &str = "SESSIONGATE_";

/// Upper bound for any configured lifetime (ten years)
pub const MAX_TTL_SECS: u64 = 10 * 365 * 24 * 60 * 60;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Server bind address
    pub bind_addr: SocketAddr,
    /// Log level
    pub log_level: String,
    /// Emit logs as JSON lines
    pub log_json: bool,
    /// Token signing and lifetime settings
    pub auth: AuthSettings,
    /// Session store settings
    pub sessions: SessionSettings,
    /// Key-value backend settings
    pub store: StoreSettings,
    /// Password requirements
    pub password_requirements: PasswordRequirements,
    /// Login throttling
    pub rate_limit: RateLimitSettings,
}

/// Token signing and lifetime settings
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthSettings {
    /// Shared HMAC secret. Required.
    pub jwt_secret: Option<String>,
    /// Access token lifetime in seconds
    pub access_ttl_secs: u64,
    /// Refresh token lifetime in seconds
    pub refresh_ttl_secs: u64,
    /// Cookie consulted when no `Authorization` header is present
    pub cookie_name: String,
}

impl fmt::Debug for AuthSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthSettings")
            .field("jwt_secret", &self.jwt_secret.as_ref().map(|_| "<redacted>"))
            .field("access_ttl_secs", &self.access_ttl_secs)
            .field("refresh_ttl_secs", &self.refresh_ttl_secs)
            .field("cookie_name", &self.cookie_name)
            .finish()
    }
}

/// Session store settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    /// Key prefix in the key-value store
    pub key_prefix: String,
    /// Re-write legacy plaintext records in hashed form after a successful validation
    pub migrate_legacy_on_read: bool,
}

/// Which key-value backend holds session records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Memory,
    File,
}

/// Key-value backend settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    pub backend: StoreBackend,
    /// Root directory for the file backend
    pub path: PathBuf,
    /// How often the memory backend sweeps expired keys
    pub sweep_interval_secs: u64,
}

/// Login throttling settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitSettings {
    /// Failed attempts before lockout
    pub max_attempts: u32,
    /// Lockout duration in seconds
    pub lockout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 3000)),
            log_level: "info".to_string(),
            log_json: false,
            auth: AuthSettings::default(),
            sessions: SessionSettings::default(),
            store: StoreSettings::default(),
            password_requirements: PasswordRequirements::default(),
            rate_limit: RateLimitSettings::default(),
        }
    }
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            jwt_secret: None,
            access_ttl_secs: 15 * 60,
            refresh_ttl_secs: 7 * 24 * 60 * 60,
            cookie_name: "access_token".to_string(),
        }
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            key_prefix: "session:".to_string(),
            migrate_legacy_on_read: false,
        }
    }
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Memory,
            path: PathBuf::from("data/kv"),
            sweep_interval_secs: 60,
        }
    }
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            lockout_secs: 5 * 60,
        }
    }
}

impl Settings {
    /// Load settings from `sessiongate.toml` and the environment
    pub fn load() -> Result<Self, AppError> {
        Self::load_from(DEFAULT_CONFIG_FILE)
    }

    /// Load settings from a specific file, then the environment.
    ///
    /// A `.json` extension selects the JSON provider, anything else is read as TOML.
    /// Missing files are skipped. `JWT_SECRET` is honoured as a shorthand
    /// for `SESSIONGATE_AUTH__JWT_SECRET`.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, AppError> {
        let settings = Self::extract_from(path)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Merge the same sources as [`Settings::load_from`] without validating.
    ///
    /// For offline tooling that needs e.g. the password rules but no secret.
    pub fn extract_from<P: AsRef<Path>>(path: P) -> Result<Self, AppError> {
        let path = path.as_ref();
        let mut figment = Figment::from(Serialized::defaults(Settings::default()));
        figment = match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => figment.merge(Json::file(path)),
            _ => figment.merge(Toml::file(path)),
        };
        let settings: Settings = figment
            .merge(Env::raw().only(&["JWT_SECRET"]).map(|_| "auth.jwt_secret".into()))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()?;
        Ok(settings)
    }

    /// Check a candidate password against the configured requirements
    pub fn check_password_strength(&self, password: &str) -> Result<(), AppError> {
        if validate_password_strength(password, &self.password_requirements) {
            Ok(())
        } else {
            Err(AppError::InvalidInput(format!(
                "password does not meet the configured requirements (minimum length {})",
                self.password_requirements.min_length
            )))
        }
    }

    /// Check settings for values that would make the service unsafe to run
    pub fn validate(&self) -> Result<(), AppError> {
        self.signing_secret()?;

        if !LOG_LEVELS.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(AppError::Config(format!(
                "unknown log level '{}'",
                self.log_level
            )));
        }
        if self.auth.access_ttl_secs == 0 || self.auth.refresh_ttl_secs == 0 {
            return Err(AppError::Config("token lifetimes must be positive".to_string()));
        }
        if self.auth.access_ttl_secs > MAX_TTL_SECS || self.auth.refresh_ttl_secs > MAX_TTL_SECS {
            return Err(AppError::Config(format!(
                "token lifetimes must not exceed {MAX_TTL_SECS}s"
            )));
        }
        if self.auth.access_ttl_secs > self.auth.refresh_ttl_secs {
            tracing::warn!(
                access_ttl_secs = self.auth.access_ttl_secs,
                refresh_ttl_secs = self.auth.refresh_ttl_secs,
                "access tokens outlive refresh tokens"
            );
        }
        if self.auth.cookie_name.trim().is_empty() {
            return Err(AppError::Config("cookie name must not be empty".to_string()));
        }
        if self.sessions.key_prefix.is_empty() {
            return Err(AppError::Config("session key prefix must not be empty".to_string()));
        }
        if self.password_requirements.min_length < 8 {
            return Err(AppError::Config(
                "minimum password length must be at least 8".to_string(),
            ));
        }
        if self.rate_limit.max_attempts == 0 {
            return Err(AppError::Config("rate limit max_attempts must be positive".to_string()));
        }
        if self.store.backend == StoreBackend::Memory && self.store.sweep_interval_secs == 0 {
            return Err(AppError::Config("sweep interval must be positive".to_string()));
        }
        Ok(())
    }

    /// The configured signing secret.
    ///
    /// Absence is an operator error, never something a caller can work around.
    pub fn signing_secret(&self) -> Result<&str, AppError> {
        match self.auth.jwt_secret.as_deref() {
            Some(secret) if !secret.is_empty() => {
                if secret.len() < 32 {
                    tracing::warn!("signing secret is shorter than 32 bytes");
                }
                Ok(secret)
            },
            _ => Err(AppError::Config("signing secret is not configured".to_string())),
        }
    }
}
