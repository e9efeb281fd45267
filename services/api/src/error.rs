//! services/api/src/error.rs
//!
//! Defines the error types of the API service: `ApiError` for startup failures
//! and `AppError` for everything a request handler can return.

use crate::config::ConfigError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use library_core::ports::PortError;
use serde_json::json;
use tracing::error;

/// Errors that abort server startup.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Represents an error that occurred during configuration loading.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Represents an error from the underlying database library.
    #[error("Database Error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration Error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Represents a standard Input/Output error (e.g., binding to a network socket).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Request-level failures. Each variant maps to one HTTP status and a JSON
/// `{message}` body.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    /// A unique constraint was violated.
    #[error("{0}")]
    DuplicateResource(String),

    #[error("User not found")]
    UserNotFound,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("No token provided")]
    NoToken,

    /// Malformed, mis-signed and expired tokens all end up here.
    #[error("Invalid token")]
    TokenInvalid,

    #[error("{0}")]
    Forbidden(&'static str),

    #[error("{0}")]
    NotFound(String),

    /// The book exists but the file it references does not.
    #[error("File not found")]
    AssetMissing,

    #[error("Storage failure: {0}")]
    StorageFailure(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::DuplicateResource(_) | AppError::UserNotFound => {
                StatusCode::BAD_REQUEST
            }
            AppError::InvalidCredentials | AppError::NoToken | AppError::TokenInvalid => {
                StatusCode::UNAUTHORIZED
            }
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) | AppError::AssetMissing => StatusCode::NOT_FOUND,
            AppError::StorageFailure(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<PortError> for AppError {
    fn from(err: PortError) -> Self {
        match err {
            PortError::NotFound(what) => AppError::NotFound(what),
            PortError::Conflict(what) => AppError::DuplicateResource(what),
            PortError::Unavailable(msg) | PortError::Unexpected(msg) => {
                AppError::StorageFailure(msg)
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            AppError::StorageFailure(details) => {
                // Do not leak persistence details to clients.
                error!("Storage failure: {}", details);
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };

        (status, Json(json!({ "message": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body_of(err: AppError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn auth_failures_are_unauthorized() {
        assert_eq!(AppError::NoToken.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(AppError::TokenInvalid.status(), StatusCode::UNAUTHORIZED);

        let (status, body) = body_of(AppError::TokenInvalid).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["message"], "Invalid token");
    }

    #[tokio::test]
    async fn storage_failures_are_redacted() {
        let (status, body) =
            body_of(AppError::StorageFailure("relation \"books\" does not exist".into())).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["message"], "Internal server error");
    }

    #[test]
    fn port_errors_map_to_app_errors() {
        assert!(matches!(
            AppError::from(PortError::Conflict("User already exists".into())),
            AppError::DuplicateResource(_)
        ));
        assert_eq!(
            AppError::from(PortError::NotFound("Book not found".into())).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::from(PortError::Unavailable("pool closed".into())).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn missing_assets_are_not_found() {
        assert_eq!(AppError::AssetMissing.status(), StatusCode::NOT_FOUND);
        assert_eq!(AppError::Forbidden("Admins only").to_string(), "Admins only");
    }
}
