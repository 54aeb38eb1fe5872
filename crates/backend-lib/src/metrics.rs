// ==============
// crates/backend-lib/src/metrics.rs

//! Central place for metric keys
pub const TOKEN_ISSUED: &str = "token.issued";
pub const TOKEN_REJECTED: &str = "token.rejected";
pub const SESSION_STORED: &str = "session.stored";
pub const SESSION_ROTATED: &str = "session.rotated";
pub const SESSION_INVALIDATED: &str = "session.invalidated";
pub const SESSION_EXPIRED_PURGED: &str = "session.expired_purged";
pub const SESSION_CORRUPT_PURGED: &str = "session.corrupt_purged";
pub const SESSION_LEGACY_VALIDATED: &str = "session.legacy_validated";
pub const SESSION_LEGACY_MIGRATED: &str = "session.legacy_migrated";
pub const LOGIN_FAILED: &str = "auth.login_failed";
pub const KV_SWEPT: &str = "kv.swept";
