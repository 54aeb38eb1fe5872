// ============================
// sessiongate-backend/src/router.rs
// ============================
//! HTTP routes around the session core.
use axum::{
    extract::{Path, State},
    http::StatusCode,
    middleware::{from_fn, from_fn_with_state},
    routing::{delete, get, post},
    Json, Router,
};
use serde_json::{json, Value};
use sessiongate_common::{RefreshRequest, SessionView, TokenPair};
use tower_http::trace::TraceLayer;

use crate::error::AppError;
use crate::middleware::{
    optional_auth, require_admin, require_admin_or_self, require_auth, CurrentUser,
};
use crate::AppState;

/// Create the router
pub fn create_router(state: AppState) -> Router {
    let gate = state.gate.clone();

    let protected = Router::new()
        .route("/auth/logout", post(logout))
        .route(
            "/users/{user_id}/sessions",
            get(list_sessions).route_layer(from_fn(require_admin_or_self("user_id"))),
        )
        .route(
            "/admin/sessions/{user_id}/expired",
            delete(cleanup_sessions).route_layer(from_fn(require_admin)),
        )
        .route_layer(from_fn_with_state(gate.clone(), require_auth));

    Router::new()
        .route("/health", get(health))
        .route("/auth/refresh", post(refresh))
        .route(
            "/auth/me",
            get(me).route_layer(from_fn_with_state(gate, optional_auth)),
        )
        .merge(protected)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn refresh(
    State(state): State<AppState>,
    Json(body): Json<RefreshRequest>,
) -> Result<Json<TokenPair>, AppError> {
    let pair = state.auth.refresh(&body.refresh_token).await?;
    Ok(Json(pair))
}

async fn logout(
    State(state): State<AppState>,
    CurrentUser(claims): CurrentUser,
) -> Result<StatusCode, AppError> {
    state.auth.logout(&claims.user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn me(user: Option<CurrentUser>) -> Json<Value> {
    match user {
        Some(CurrentUser(claims)) => Json(json!(claims)),
        None => Json(json!({ "anonymous": true })),
    }
}

async fn list_sessions(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<Vec<SessionView>>, AppError> {
    let sessions = state.sessions.list_sessions(&user_id).await?;
    Ok(Json(sessions.iter().map(|s| s.view()).collect()))
}

async fn cleanup_sessions(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let purged = state.sessions.cleanup_expired(&user_id).await?;
    Ok(Json(json!({ "purged": purged })))
}
