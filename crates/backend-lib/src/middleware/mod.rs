// crates/backend-lib/src/middleware/mod.rs

//! Middleware for the `sessiongate` HTTP surface.

pub mod auth;

pub use auth::{
    extract_token, optional_auth, require_admin, require_admin_or_self, require_auth, AuthGate,
    CurrentUser, DEFAULT_ACCESS_COOKIE,
};
