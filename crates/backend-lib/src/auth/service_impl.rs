use std::sync::Arc;

use async_trait::async_trait;
use metrics::counter;
use sessiongate_common::TokenPair;

use super::{
    hash_password, verify_password, AuthRateLimiter, AuthService, Identity, PairOptions,
    SessionStore, TokenService,
};
use crate::error::AppError;
use crate::metrics::LOGIN_FAILED;

pub struct DefaultAuth {
    tokens: Arc<TokenService>,
    sessions: Arc<SessionStore>,
    limiter: AuthRateLimiter,
}

impl DefaultAuth {
    pub fn new(
        tokens: Arc<TokenService>,
        sessions: Arc<SessionStore>,
        limiter: AuthRateLimiter,
    ) -> Self {
        Self {
            tokens,
            sessions,
            limiter,
        }
    }

    pub fn tokens(&self) -> &Arc<TokenService> {
        &self.tokens
    }

    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    pub fn limiter(&self) -> &AuthRateLimiter {
        &self.limiter
    }
}

async fn blocking<T, F>(f: F) -> Result<T, AppError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| AppError::Internal(format!("password task failed: {e}")))
}

#[async_trait]
impl AuthService for DefaultAuth {
    async fn hash_password(&self, plain: &str) -> Result<String, AppError> {
        let plain = plain.to_string();
        blocking(move || hash_password(&plain)).await
    }

    async fn login(
        &self,
        identity: &Identity,
        password: &str,
        stored_hash: &str,
    ) -> Result<TokenPair, AppError> {
        if !self.limiter.check(&identity.email) {
            return Err(AppError::AuthRateLimited);
        }

        let (password, stored_hash) = (password.to_string(), stored_hash.to_string());
        let verified = blocking(move || verify_password(&password, &stored_hash)).await?;
        if !verified {
            self.limiter.record_failed_attempt(&identity.email);
            counter!(LOGIN_FAILED).increment(1);
            tracing::debug!(user_id = %identity.user_id, "password rejected");
            return Err(AppError::InvalidPassword);
        }

        self.limiter.record_success(&identity.email);
        self.issue(identity).await
    }

    async fn issue(&self, identity: &Identity) -> Result<TokenPair, AppError> {
        let options = PairOptions {
            is_admin: identity.is_admin,
            ..PairOptions::default()
        };
        let pair = self
            .tokens
            .create_token_pair(&identity.user_id, &identity.email, &options)?;
        self.sessions
            .store(&identity.user_id, &identity.email, &pair.refresh_token, None)
            .await?;
        Ok(pair)
    }

    async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, AppError> {
        let claims = self.tokens.verify_refresh_token(refresh_token)?;

        if !self.sessions.validate(&claims.user_id, refresh_token).await? {
            tracing::warn!(user_id = %claims.user_id, "refresh token does not match stored session");
            return Err(AppError::InvalidSession);
        }

        let options = PairOptions {
            is_admin: claims.is_admin,
            ..PairOptions::default()
        };
        let pair = self
            .tokens
            .create_token_pair(&claims.user_id, &claims.email, &options)?;

        // The session may have been invalidated between validate and rotate.
        if !self
            .sessions
            .rotate(&claims.user_id, &pair.refresh_token, None)
            .await?
        {
            return Err(AppError::InvalidSession);
        }
        Ok(pair)
    }

    async fn logout(&self, user_id: &str) -> Result<(), AppError> {
        self.sessions.invalidate(user_id).await
    }
}
