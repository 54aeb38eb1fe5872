// ============================
// sessiongate-backend/src/auth/mod.rs
// ============================
//! Authentication module.

pub mod password;
pub mod rate_limit;
pub mod session;
mod service;
mod service_impl;
pub mod token;

pub use password::{
    hash_password, hash_password_secure, validate_password_strength, verify_password,
    PasswordRequirements, MIN_PASSWORD_LENGTH,
};
pub use rate_limit::AuthRateLimiter;
pub use service::{AuthService, Identity};
pub use service_impl::DefaultAuth;
pub use session::{
    hash_refresh_token, RefreshCredential, Session, SessionRecord, SessionStore,
    SessionStoreSettings,
};
pub use token::{PairOptions, TokenClass, TokenError, TokenService, TokenSettings};
