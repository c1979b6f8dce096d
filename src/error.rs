// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application error types with consistent API responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Application error type that converts to HTTP responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("No token record for athlete {0}")]
    MissingToken(u64),

    #[error("Token refresh rejected for athlete {0}: {1}")]
    TokenRefresh(u64, String),

    #[error("Strava API error: {0}")]
    StravaApi(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Warehouse error: {0}")]
    Warehouse(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// JSON error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, details) = match &self {
            AppError::MissingToken(athlete_id) => (
                StatusCode::NOT_FOUND,
                "missing_token",
                Some(format!("athlete {}", athlete_id)),
            ),
            AppError::TokenRefresh(athlete_id, msg) => {
                tracing::error!(athlete_id, error = %msg, "Token refresh rejected");
                (StatusCode::UNAUTHORIZED, "token_refresh_failed", None)
            }
            AppError::StravaApi(msg) => {
                (StatusCode::BAD_GATEWAY, "strava_error", Some(msg.clone()))
            }
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", Some(msg.clone())),
            AppError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, "bad_request", Some(msg.clone()))
            }
            AppError::Storage(msg) => {
                tracing::error!(error = %msg, "Storage error");
                (StatusCode::INTERNAL_SERVER_ERROR, "storage_error", None)
            }
            AppError::Warehouse(msg) => {
                tracing::error!(error = %msg, "Warehouse error");
                (StatusCode::INTERNAL_SERVER_ERROR, "warehouse_error", None)
            }
            AppError::Internal(err) => {
                tracing::error!(error = %err, "Internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", None)
            }
        };

        let body = ErrorResponse {
            error: error.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}

impl AppError {
    /// True if the error indicates the upstream rejected our credentials
    /// (expired access token or revoked refresh token).
    pub fn is_token_error(&self) -> bool {
        matches!(self, AppError::TokenRefresh(..))
            || matches!(self, AppError::StravaApi(msg) if msg.contains("401"))
    }
}

/// Result type alias for handlers
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upstream_401_is_a_token_error() {
        let err = AppError::StravaApi("HTTP 401 Unauthorized: token expired".to_string());
        assert!(err.is_token_error());
    }

    #[test]
    fn refresh_rejection_is_a_token_error() {
        let err = AppError::TokenRefresh(42, "invalid_grant".to_string());
        assert!(err.is_token_error());
    }

    #[test]
    fn other_upstream_failures_are_not_token_errors() {
        assert!(!AppError::StravaApi("HTTP 500 Internal Server Error".to_string())
            .is_token_error());
        assert!(!AppError::StravaApi("HTTP 429 Too Many Requests".to_string()).is_token_error());
        assert!(!AppError::NotFound("activity".to_string()).is_token_error());
    }
}
