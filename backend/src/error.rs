use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0}")]
    Validation(String),

    #[error("Todo not found: {0}")]
    NotFound(Uuid),

    #[error("Storage error: {0}")]
    Storage(#[from] sqlx::Error),
}

impl StoreError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            StoreError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            StoreError::NotFound(_) => StatusCode::NOT_FOUND,
            StoreError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_type(&self) -> &'static str {
        match self {
            StoreError::Validation(_) => "validation_error",
            StoreError::NotFound(_) => "not_found",
            StoreError::Storage(_) => "storage_error",
        }
    }
}

/// JSON error body for the API surface.
impl IntoResponse for StoreError {
    fn into_response(self) -> Response {
        if let StoreError::Storage(err) = &self {
            tracing::error!(error = %err, "storage failure");
        }
        let body = json!({
            "error": {
                "message": self.to_string(),
                "type": self.error_type(),
            }
        });
        (self.status_code(), Json(body)).into_response()
    }
}
