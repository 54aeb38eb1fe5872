// crates/backend-lib/src/error.rs

//! Central error type + Axum integration.
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

/// Application error types with error codes and context
#[derive(Error, Debug)]
pub enum AppError {
    #[error("No credentials presented")]
    MissingCredentials,

    #[error("Invalid or expired token")]
    InvalidToken,

    #[error("Invalid password")]
    InvalidPassword,

    #[error("Insufficient privileges")]
    Forbidden,

    #[error("Authentication rate limit exceeded")]
    AuthRateLimited,

    #[error("Session is not valid")]
    InvalidSession,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Session store error: {0}")]
    Store(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl AppError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::MissingCredentials
            | AppError::InvalidToken
            | AppError::InvalidPassword
            | AppError::InvalidSession => StatusCode::UNAUTHORIZED,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::AuthRateLimited => StatusCode::TOO_MANY_REQUESTS,
            AppError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            AppError::Config(_)
            | AppError::Store(_)
            | AppError::Internal(_)
            | AppError::Io(_)
            | AppError::Json(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the error code for this error
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::MissingCredentials => "AUTH_001",
            AppError::InvalidToken => "AUTH_002",
            AppError::InvalidPassword => "AUTH_003",
            AppError::Forbidden => "AUTH_004",
            AppError::AuthRateLimited => "AUTH_005",
            AppError::InvalidSession => "AUTH_006",
            AppError::Config(_) => "CFG_001",
            AppError::Store(_) => "STORE_001",
            AppError::Internal(_) => "INT_001",
            AppError::Io(_) => "IO_001",
            AppError::Json(_) => "JSON_001",
            AppError::InvalidInput(_) => "VAL_001",
        }
    }

    /// Get a sanitized message suitable for production use
    pub fn sanitized_message(&self) -> String {
        match self {
            AppError::MissingCredentials => "Authentication required".to_string(),
            AppError::InvalidToken
            | AppError::InvalidPassword
            | AppError::InvalidSession => "Authentication failed".to_string(),
            AppError::Forbidden => "Access denied".to_string(),
            AppError::AuthRateLimited => {
                "Too many authentication attempts, please try again later".to_string()
            },
            AppError::Config(_) => "Server is misconfigured".to_string(),
            AppError::Store(_) | AppError::Io(_) | AppError::Internal(_) => {
                "An internal server error occurred".to_string()
            },
            AppError::Json(_) => "Invalid request format".to_string(),
            AppError::InvalidInput(_) => "Invalid input provided".to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_code = self.error_code();

        if status.is_server_error() {
            tracing::error!(code = error_code, error = %self, "request failed");
        }

        // Use detailed messages in development, sanitized in production
        let message = if cfg!(debug_assertions) {
            self.to_string()
        } else {
            self.sanitized_message()
        };

        let body = serde_json::json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        });

        (status, axum::Json(body)).into_response()
    }
}

impl From<figment::Error> for AppError {
    fn from(err: figment::Error) -> Self {
        AppError::Config(err.to_string())
    }
}

impl From<String> for AppError {
    fn from(msg: String) -> Self {
        AppError::Internal(msg)
    }
}

impl From<&str> for AppError {
    fn from(msg: &str) -> Self {
        AppError::Internal(msg.to_string())
    }
}
