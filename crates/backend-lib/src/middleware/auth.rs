// crates/backend-lib/src/middleware/auth.rs

//! Bearer-token gate and access policies.
//!
//! `require_auth` and `optional_auth` take an [`AuthGate`] as middleware
//! state and leave verified [`Claims`] in the request extensions. The
//! policy layers (`require_admin`, `require_admin_or_self`) read those
//! claims and must be layered inside `require_auth`.
use std::{collections::HashMap, convert::Infallible, sync::Arc};

use axum::{
    extract::{FromRequestParts, OptionalFromRequestParts, Path, Request, State},
    http::{
        header::{AUTHORIZATION, COOKIE},
        request::Parts,
        HeaderMap,
    },
    middleware::Next,
    response::{IntoResponse, Response},
};
use futures_util::future::BoxFuture;
use sessiongate_common::Claims;

use crate::auth::TokenService;
use crate::error::AppError;

/// Default cookie holding the access token for browser callers
pub const DEFAULT_ACCESS_COOKIE: &str = "access_token";

/// Middleware state for the authentication layers
#[derive(Clone, Debug)]
pub struct AuthGate {
    tokens: Option<Arc<TokenService>>,
    cookie_name: Arc<str>,
}

impl AuthGate {
    pub fn new(tokens: Arc<TokenService>) -> Self {
        Self {
            tokens: Some(tokens),
            cookie_name: Arc::from(DEFAULT_ACCESS_COOKIE),
        }
    }

    /// A gate with no signing secret. Every authenticated request fails
    /// with a configuration error.
    pub fn unconfigured() -> Self {
        Self {
            tokens: None,
            cookie_name: Arc::from(DEFAULT_ACCESS_COOKIE),
        }
    }

    pub fn with_cookie_name(mut self, name: &str) -> Self {
        self.cookie_name = Arc::from(name);
        self
    }

    fn verify(&self, token: &str) -> Result<Claims, AppError> {
        let tokens = self
            .tokens
            .as_ref()
            .ok_or_else(|| AppError::Config("signing secret is not configured".to_string()))?;
        tokens
            .verify_access_token(token)
            .map_err(|_| AppError::InvalidToken)
    }
}

/// Pull a bearer token from `Authorization`, falling back to the named cookie
pub fn extract_token(headers: &HeaderMap, cookie_name: &str) -> Option<String> {
    extract_bearer_token(headers).or_else(|| extract_cookie(headers, cookie_name))
}

fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?.trim();
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then(|| token.to_string())
}

fn extract_cookie(headers: &HeaderMap, cookie_name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| key.trim() == cookie_name)
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Reject requests without a valid access token
pub async fn require_auth(
    State(gate): State<AuthGate>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = extract_token(request.headers(), &gate.cookie_name)
        .ok_or(AppError::MissingCredentials)?;
    let claims = gate.verify(&token)?;

    tracing::trace!(user_id = %claims.user_id, "request authenticated");
    request.extensions_mut().insert(claims);
    Ok(next.run(request).await)
}

/// Attach claims when a valid access token is present, otherwise continue anonymously
pub async fn optional_auth(
    State(gate): State<AuthGate>,
    mut request: Request,
    next: Next,
) -> Response {
    if let Some(token) = extract_token(request.headers(), &gate.cookie_name) {
        match gate.verify(&token) {
            Ok(claims) => {
                request.extensions_mut().insert(claims);
            },
            Err(err) => tracing::debug!(error = %err, "continuing anonymously"),
        }
    }
    next.run(request).await
}

/// Only administrators pass
pub async fn require_admin(request: Request, next: Next) -> Result<Response, AppError> {
    let claims = request
        .extensions()
        .get::<Claims>()
        .ok_or(AppError::MissingCredentials)?;
    if !claims.is_admin {
        tracing::debug!(user_id = %claims.user_id, "admin access denied");
        return Err(AppError::Forbidden);
    }
    Ok(next.run(request).await)
}

/// Administrators, or the user named by path parameter `param`, pass.
///
/// Use with `axum::middleware::from_fn` on a route layer so path
/// parameters are available.
pub fn require_admin_or_self(
    param: &'static str,
) -> impl Fn(Request, Next) -> BoxFuture<'static, Response> + Clone + Send + Sync + 'static {
    move |request: Request, next: Next| -> BoxFuture<'static, Response> {
        Box::pin(async move {
            match admin_or_self(param, request, next).await {
                Ok(response) => response,
                Err(err) => err.into_response(),
            }
        })
    }
}

async fn admin_or_self(param: &str, request: Request, next: Next) -> Result<Response, AppError> {
    let (mut parts, body) = request.into_parts();
    let claims = parts
        .extensions
        .get::<Claims>()
        .cloned()
        .ok_or(AppError::MissingCredentials)?;

    if !claims.is_admin {
        let target =
            <Path<HashMap<String, String>> as FromRequestParts<()>>::from_request_parts(
                &mut parts,
                &(),
            )
            .await
            .ok()
            .and_then(|Path(mut params)| params.remove(param));
        if target.as_deref() != Some(claims.user_id.as_str()) {
            tracing::debug!(user_id = %claims.user_id, param, "admin-or-self access denied");
            return Err(AppError::Forbidden);
        }
    }

    Ok(next.run(Request::from_parts(parts, body)).await)
}

/// Claims of the authenticated caller, for handlers behind `require_auth`
#[derive(Debug, Clone)]
pub struct CurrentUser(pub Claims);

impl<S: Send + Sync> FromRequestParts<S> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Claims>()
            .cloned()
            .map(CurrentUser)
            .ok_or(AppError::MissingCredentials)
    }
}

impl<S: Send + Sync> OptionalFromRequestParts<S> for CurrentUser {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> Result<Option<Self>, Self::Rejection> {
        Ok(parts.extensions.get::<Claims>().cloned().map(CurrentUser))
    }
}
