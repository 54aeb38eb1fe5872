// ============================
// sessiongate-backend/src/auth/token.rs
// ============================
//! Signed bearer tokens.
//!
//! Tokens are three URL-safe base64 segments: a header, the claims and an
//! HMAC-SHA256 signature over `header.claims`. Access and refresh tokens
//! share the construction and are told apart by a `refresh` marker that
//! only exists inside the signed envelope.
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use hmac::{Hmac, Mac};
use metrics::counter;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;

use sessiongate_common::{Claims, TokenPair};

use crate::clock::SharedClock;
use crate::error::AppError;
use crate::metrics::{TOKEN_ISSUED, TOKEN_REJECTED};

type HmacSha256 = Hmac<Sha256>;

/// Only algorithm ever emitted or accepted
pub const ALGORITHM: &str = "HS256";

/// Default access token lifetime (15 minutes)
pub const DEFAULT_ACCESS_TTL_SECS: u64 = 15 * 60;

/// Default refresh token lifetime (7 days)
pub const DEFAULT_REFRESH_TTL_SECS: u64 = 7 * 24 * 60 * 60;

/// Why a token was rejected
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenError {
    #[error("token is malformed")]
    Malformed,
    #[error("token signature does not match")]
    BadSignature,
    #[error("token has expired")]
    Expired,
    #[error("token is of the wrong class")]
    WrongClass,
}

impl TokenError {
    fn label(self) -> &'static str {
        match self {
            TokenError::Malformed => "malformed",
            TokenError::BadSignature => "signature",
            TokenError::Expired => "expired",
            TokenError::WrongClass => "class",
        }
    }
}

impl From<TokenError> for AppError {
    fn from(_: TokenError) -> Self {
        AppError::InvalidToken
    }
}

/// Access or refresh
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenClass {
    Access,
    Refresh,
}

impl TokenClass {
    fn as_str(self) -> &'static str {
        match self {
            TokenClass::Access => "access",
            TokenClass::Refresh => "refresh",
        }
    }
}

/// Lifetimes applied when the caller does not override them
#[derive(Debug, Clone, Copy)]
pub struct TokenSettings {
    pub access_ttl_secs: u64,
    pub refresh_ttl_secs: u64,
}

impl Default for TokenSettings {
    fn default() -> Self {
        Self {
            access_ttl_secs: DEFAULT_ACCESS_TTL_SECS,
            refresh_ttl_secs: DEFAULT_REFRESH_TTL_SECS,
        }
    }
}

/// Per-call overrides for [`TokenService::create_token_pair`]
#[derive(Debug, Clone, Copy, Default)]
pub struct PairOptions {
    pub access_ttl_secs: Option<u64>,
    pub refresh_ttl_secs: Option<u64>,
    pub is_admin: bool,
}

#[derive(Serialize, Deserialize)]
struct Header {
    alg: String,
    typ: String,
}

/// What actually gets signed. `refresh` never leaves this module.
#[derive(Serialize, Deserialize)]
struct Envelope {
    #[serde(flatten)]
    claims: Claims,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    refresh: bool,
}

/// Issues and verifies signed tokens with a shared secret
#[derive(Clone)]
pub struct TokenService {
    mac: HmacSha256,
    settings: TokenSettings,
    clock: SharedClock,
}

impl std::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenService")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl TokenService {
    /// Create a token service. An empty secret is a configuration error.
    pub fn new(secret: &[u8], settings: TokenSettings, clock: SharedClock) -> Result<Self, AppError> {
        if secret.is_empty() {
            return Err(AppError::Config("signing secret is empty".to_string()));
        }
        let mac = HmacSha256::new_from_slice(secret)
            .map_err(|e| AppError::Config(format!("unusable signing secret: {e}")))?;
        Ok(Self { mac, settings, clock })
    }

    pub fn settings(&self) -> TokenSettings {
        self.settings
    }

    /// Issue a short-lived access token
    pub fn create_access_token(
        &self,
        user_id: &str,
        email: &str,
        ttl_override: Option<u64>,
        is_admin: bool,
    ) -> Result<String, AppError> {
        let ttl = ttl_override.unwrap_or(self.settings.access_ttl_secs);
        self.issue(TokenClass::Access, user_id, email, ttl, is_admin)
    }

    /// Issue a long-lived refresh token
    pub fn create_refresh_token(
        &self,
        user_id: &str,
        email: &str,
        ttl_override: Option<u64>,
        is_admin: bool,
    ) -> Result<String, AppError> {
        let ttl = ttl_override.unwrap_or(self.settings.refresh_ttl_secs);
        self.issue(TokenClass::Refresh, user_id, email, ttl, is_admin)
    }

    /// Issue an access token and a refresh token together
    pub fn create_token_pair(
        &self,
        user_id: &str,
        email: &str,
        options: &PairOptions,
    ) -> Result<TokenPair, AppError> {
        let expires_in = options.access_ttl_secs.unwrap_or(self.settings.access_ttl_secs);
        let access_token =
            self.create_access_token(user_id, email, Some(expires_in), options.is_admin)?;
        let refresh_token =
            self.create_refresh_token(user_id, email, options.refresh_ttl_secs, options.is_admin)?;
        Ok(TokenPair {
            access_token,
            refresh_token,
            expires_in,
        })
    }

    /// Verify a token presented as an access token
    pub fn verify_access_token(&self, token: &str) -> Result<Claims, TokenError> {
        self.verify(token, TokenClass::Access)
    }

    /// Verify a token presented as a refresh token
    pub fn verify_refresh_token(&self, token: &str) -> Result<Claims, TokenError> {
        self.verify(token, TokenClass::Refresh)
    }

    /// Decode claims without checking the signature or expiry.
    ///
    /// **Unsafe for authorization.** Anyone can forge the output; use it
    /// for inspection and debugging only.
    pub fn decode_token(token: &str) -> Option<Claims> {
        let mut segments = token.split('.');
        let (_, Some(claims), _) = (segments.next(), segments.next(), segments.next()) else {
            return None;
        };
        let bytes = URL_SAFE_NO_PAD.decode(claims).ok()?;
        serde_json::from_slice::<Envelope>(&bytes).ok().map(|e| e.claims)
    }

    fn issue(
        &self,
        class: TokenClass,
        user_id: &str,
        email: &str,
        ttl_secs: u64,
        is_admin: bool,
    ) -> Result<String, AppError> {
        let iat = self.clock.now_secs();
        let ttl = i64::try_from(ttl_secs)
            .map_err(|_| AppError::InvalidInput(format!("token lifetime {ttl_secs}s is too large")))?;
        let envelope = Envelope {
            claims: Claims {
                user_id: user_id.to_string(),
                email: email.to_string(),
                is_admin,
                iat,
                exp: iat.saturating_add(ttl),
                jti: Some(uuid::Uuid::new_v4().to_string()),
            },
            refresh: class == TokenClass::Refresh,
        };
        let header = Header {
            alg: ALGORITHM.to_string(),
            typ: "JWT".to_string(),
        };

        let mut signing_input = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&header)?);
        signing_input.push('.');
        signing_input.push_str(&URL_SAFE_NO_PAD.encode(serde_json::to_vec(&envelope)?));

        let mut mac = self.mac.clone();
        mac.update(signing_input.as_bytes());
        let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

        counter!(TOKEN_ISSUED, "class" => class.as_str()).increment(1);
        Ok(format!("{signing_input}.{signature}"))
    }

    fn verify(&self, token: &str, expected: TokenClass) -> Result<Claims, TokenError> {
        let result = self.check(token, expected);
        if let Err(err) = result {
            counter!(TOKEN_REJECTED, "reason" => err.label()).increment(1);
            tracing::debug!(reason = %err, class = expected.as_str(), "token rejected");
        }
        result
    }

    fn check(&self, token: &str, expected: TokenClass) -> Result<Claims, TokenError> {
        let segments: Vec<&str> = token.split('.').collect();
        let [header_b64, claims_b64, signature_b64] = segments[..] else {
            return Err(TokenError::Malformed);
        };

        let signature = URL_SAFE_NO_PAD
            .decode(signature_b64)
            .map_err(|_| TokenError::Malformed)?;
        let mut mac = self.mac.clone();
        mac.update(header_b64.as_bytes());
        mac.update(b".");
        mac.update(claims_b64.as_bytes());
        // verify_slice compares in constant time
        mac.verify_slice(&signature)
            .map_err(|_| TokenError::BadSignature)?;

        let header: Header = URL_SAFE_NO_PAD
            .decode(header_b64)
            .ok()
            .and_then(|bytes| serde_json::from_slice(&bytes).ok())
            .ok_or(TokenError::Malformed)?;
        if header.alg != ALGORITHM {
            return Err(TokenError::Malformed);
        }

        let envelope: Envelope = URL_SAFE_NO_PAD
            .decode(claims_b64)
            .ok()
            .and_then(|bytes| serde_json::from_slice(&bytes).ok())
            .ok_or(TokenError::Malformed)?;

        if envelope.claims.exp < self.clock.now_secs() {
            return Err(TokenError::Expired);
        }

        let class = if envelope.refresh {
            TokenClass::Refresh
        } else {
            TokenClass::Access
        };
        if class != expected {
            return Err(TokenError::WrongClass);
        }

        Ok(envelope.claims)
    }
}
