// ================
// common/src/lib.rs
// ================
//! Common types and structures
//! exchanged between `sessiongate` and its callers.
//! This module defines the identity claims carried in bearer tokens and the
//! payloads handed back by the session endpoints.

use serde::{Deserialize, Serialize};

/// Identity claims embedded in every signed token.
///
/// Only caller-visible fields live here. Markers that distinguish token
/// classes stay inside the signed envelope and are stripped on verification.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Claims {
    /// Opaque user identifier
    pub user_id: String,
    /// Email address at time of issuance
    pub email: String,
    /// Administrator flag
    #[serde(default)]
    pub is_admin: bool,
    /// Issued-at, unix seconds
    pub iat: i64,
    /// Expiry, unix seconds
    pub exp: i64,
    /// Per-token uniqueness value
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jti: Option<String>,
}

/// Access and refresh token issued together
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    /// Access token lifetime in seconds
    pub expires_in: u64,
}

/// Request body for a refresh call
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Public view of a stored session.
///
/// Never carries the refresh token or its hash.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub user_id: String,
    pub email: String,
    /// Creation time, unix milliseconds
    pub created_at: i64,
    /// Absolute expiry, unix milliseconds
    pub expires_at: i64,
    /// Whether the record is still in the plaintext legacy format
    pub legacy: bool,
}
