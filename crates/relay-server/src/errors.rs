//! Server error type and HTTP mapping.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use relay_core::errors::ChatError;
use relay_executor::ExecutorError;
use relay_store::StoreError;
use thiserror::Error;
use tracing::error;

/// Request-handling errors.
///
/// These are transport-level failures only. In-band upstream errors never
/// reach this type; they travel inside a successful response body.
#[derive(Debug, Error)]
pub enum ServerError {
    /// A chat orchestration failure.
    #[error(transparent)]
    Chat(#[from] ChatError),
}

impl From<StoreError> for ServerError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::IdExhausted { table, attempts } => {
                Self::Chat(ChatError::IdExhausted { table, attempts })
            }
            other => Self::Chat(ChatError::Storage {
                message: other.to_string(),
            }),
        }
    }
}

impl From<ExecutorError> for ServerError {
    fn from(err: ExecutorError) -> Self {
        Self::Chat(ChatError::UpstreamUnavailable {
            message: err.to_string(),
        })
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let Self::Chat(err) = &self;
        let status = if err.is_upstream() {
            StatusCode::SERVICE_UNAVAILABLE
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };
        error!(%err, status = status.as_u16(), "request failed");
        let body = Json(serde_json::json!({ "error": err.to_string() }));
        (status, body).into_response()
    }
}
