//! Unified error handling for the server.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Application error type.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// The batch was refused; nothing was applied
    #[error("Validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),

    #[error("Unauthorized: {0}")]
    Unauthorized(&'static str),
}

/// Error response body, in the shape clients already parse.
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    detalhes: Vec<Detail>,
}

#[derive(Serialize)]
struct Detail {
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message, details) = match self {
            AppError::Validation(messages) => {
                tracing::warn!(?messages, "Batch rejected");
                (
                    StatusCode::BAD_REQUEST,
                    "Validation failed".to_string(),
                    messages,
                )
            }
            AppError::Unauthorized(reason) => {
                (StatusCode::UNAUTHORIZED, "Unauthorized".to_string(), vec![reason.to_string()])
            }
        };

        let body = Json(ErrorResponse {
            error: error_message,
            detalhes: details
                .into_iter()
                .map(|message| Detail { message })
                .collect(),
        });

        (status, body).into_response()
    }
}

/// Result type alias for handlers.
pub type Result<T> = std::result::Result<T, AppError>;
