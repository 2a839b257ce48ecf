use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::error;

/// Failure taxonomy of the engine. Business rejections (admission refused,
/// no qualifying worker) are *not* errors — they are success-shaped outcomes
/// carried by the operation results themselves.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// A run_id or (location, servername) pair that does not exist or is
    /// not in the expected state.
    #[error("{0}")]
    NotFound(String),

    /// Attempted creation of a duplicate uniquely-keyed resource.
    #[error("{0}")]
    Conflict(String),

    /// Request failed validation at the boundary.
    #[error("{0}")]
    Invalid(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A stored record that no longer decodes (bad uuid, status, workers).
    #[error("corrupt record: {0}")]
    Corrupt(String),
}

impl IntoResponse for RegistryError {
    fn into_response(self) -> Response {
        let (status, detail) = match &self {
            RegistryError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            RegistryError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            RegistryError::Invalid(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            RegistryError::Database(_) | RegistryError::Corrupt(_) => {
                error!("internal error: {self}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_string(),
                )
            }
        };
        (status, Json(json!({ "detail": detail }))).into_response()
    }
}
