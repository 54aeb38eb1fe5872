// ============================
// sessiongate-backend/src/lib.rs
// ============================
//! Authentication and session-lifecycle core for `sessiongate`.

pub mod auth;
pub mod clock;
pub mod config;
pub mod error;
pub mod metrics;
pub mod middleware;
pub mod router;
pub mod storage;

use std::sync::Arc;
use std::time::Duration;

use crate::auth::{
    AuthRateLimiter, AuthService, DefaultAuth, SessionStore, SessionStoreSettings, TokenService,
    TokenSettings,
};
use crate::clock::{SharedClock, SystemClock};
use crate::config::Settings;
use crate::error::AppError;
use crate::middleware::AuthGate;
use crate::storage::KvStore;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    /// Login, refresh and logout flows
    pub auth: Arc<dyn AuthService>,
    /// Token issuance and verification
    pub tokens: Arc<TokenService>,
    /// Refresh-token sessions
    pub sessions: Arc<SessionStore>,
    /// Login throttling, shared with `auth`
    pub limiter: AuthRateLimiter,
    /// Middleware state for the auth layers
    pub gate: AuthGate,
    /// Loaded settings
    pub settings: Arc<Settings>,
}

impl AppState {
    /// Build state over the given key-value store using the system clock
    pub fn new(kv: Arc<dyn KvStore>, settings: Settings) -> Result<Self, AppError> {
        Self::with_clock(kv, settings, Arc::new(SystemClock))
    }

    /// Build state with the key-value backend selected in `settings`
    pub fn from_settings(settings: Settings) -> Result<Self, AppError> {
        let kv = storage::from_settings(&settings.store)?;
        Self::new(kv, settings)
    }

    /// Build state with an explicit clock
    pub fn with_clock(
        kv: Arc<dyn KvStore>,
        settings: Settings,
        clock: SharedClock,
    ) -> Result<Self, AppError> {
        let secret = settings.signing_secret()?;
        let tokens = Arc::new(TokenService::new(
            secret.as_bytes(),
            TokenSettings {
                access_ttl_secs: settings.auth.access_ttl_secs,
                refresh_ttl_secs: settings.auth.refresh_ttl_secs,
            },
            clock.clone(),
        )?);
        let sessions = Arc::new(SessionStore::new(
            kv,
            SessionStoreSettings {
                key_prefix: settings.sessions.key_prefix.clone(),
                refresh_ttl_secs: settings.auth.refresh_ttl_secs,
                migrate_legacy_on_read: settings.sessions.migrate_legacy_on_read,
            },
            clock,
        ));
        let limiter = AuthRateLimiter::new(
            settings.rate_limit.max_attempts,
            Duration::from_secs(settings.rate_limit.lockout_secs),
        );
        let auth = Arc::new(DefaultAuth::new(
            tokens.clone(),
            sessions.clone(),
            limiter.clone(),
        ));
        let gate = AuthGate::new(tokens.clone()).with_cookie_name(&settings.auth.cookie_name);

        Ok(Self {
            auth,
            tokens,
            sessions,
            limiter,
            gate,
            settings: Arc::new(settings),
        })
    }
}
