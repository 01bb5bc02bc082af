use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("discovery failed for {endpoint}: {reason}")]
    Discovery { endpoint: String, reason: String },

    #[error("database error: {0}")]
    Persistence(#[from] sqlx::Error),

    #[error("{0} not found")]
    NotFound(String),

    #[error("couldn't refresh token for cnsi {cnsi_guid} (user {user_guid}): {reason}")]
    Refresh {
        cnsi_guid: Uuid,
        user_guid: String,
        reason: String,
    },

    #[error("auth server rejected grant: {0}")]
    AuthServer(String),

    #[error("failed to authorize against cnsi {cnsi_guid} for user {user_guid}")]
    Authorization { cnsi_guid: Uuid, user_guid: String },

    #[error("malformed token: {0}")]
    MalformedToken(String),

    #[error("request failed: {0}")]
    Transport(String),

    #[error("encryption error: {0}")]
    Encryption(String),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn discovery(endpoint: &str, reason: impl Into<String>) -> Self {
        AppError::Discovery {
            endpoint: endpoint.to_string(),
            reason: reason.into(),
        }
    }

    /// Wraps a reqwest failure without its URL, which may carry query-string secrets.
    pub fn transport(err: reqwest::Error) -> Self {
        AppError::Transport(err.without_url().to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_type, code, msg) = match &self {
            AppError::Validation(reason) => (
                StatusCode::BAD_REQUEST,
                "invalid_request_error",
                "validation_failed",
                reason.clone(),
            ),
            AppError::Discovery { .. } => (
                StatusCode::BAD_REQUEST,
                "invalid_request_error",
                "discovery_failed",
                self.to_string(),
            ),
            AppError::NotFound(what) => (
                StatusCode::NOT_FOUND,
                "not_found_error",
                "not_found",
                format!("{} not found", what),
            ),
            AppError::Refresh { .. } | AppError::AuthServer(_) => (
                StatusCode::UNAUTHORIZED,
                "authentication_error",
                "token_refresh_failed",
                self.to_string(),
            ),
            AppError::Authorization { .. } => (
                StatusCode::FORBIDDEN,
                "permission_error",
                "authorization_failed",
                self.to_string(),
            ),
            AppError::MalformedToken(_) => (
                StatusCode::BAD_GATEWAY,
                "upstream_error",
                "malformed_token",
                self.to_string(),
            ),
            AppError::Transport(e) => (
                StatusCode::BAD_GATEWAY,
                "upstream_error",
                "upstream_failed",
                e.clone(),
            ),
            AppError::Persistence(e) => {
                tracing::error!("Database error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "internal_server_error",
                    "internal server error".to_string(),
                )
            }
            AppError::Encryption(e) => {
                tracing::error!("Encryption error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "internal_server_error",
                    "internal server error".to_string(),
                )
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "internal_server_error",
                    "internal server error".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "message": msg,
                "type": error_type,
                "code": code,
            }
        }));

        (status, body).into_response()
    }
}
