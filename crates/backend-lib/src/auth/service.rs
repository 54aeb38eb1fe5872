use async_trait::async_trait;
use sessiongate_common::TokenPair;

use crate::error::AppError;

/// Who a token pair is issued to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: String,
    pub email: String,
    pub is_admin: bool,
}

impl Identity {
    pub fn new(user_id: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            email: email.into(),
            is_admin: false,
        }
    }

    pub fn admin(mut self, is_admin: bool) -> Self {
        self.is_admin = is_admin;
        self
    }
}

/// Login, refresh and logout flows
#[async_trait]
pub trait AuthService: Send + Sync {
    /// Hash a password off the async executor
    async fn hash_password(&self, plain: &str) -> Result<String, AppError>;

    /// Check a password against the stored hash and issue a session on success
    async fn login(
        &self,
        identity: &Identity,
        password: &str,
        stored_hash: &str,
    ) -> Result<TokenPair, AppError>;

    /// Issue a token pair and persist its refresh token without a password check
    async fn issue(&self, identity: &Identity) -> Result<TokenPair, AppError>;

    /// Exchange a refresh token for a new pair, rotating the stored session
    async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, AppError>;

    /// End the user's session
    async fn logout(&self, user_id: &str) -> Result<(), AppError>;
}
