//! Error types for the inference gateway.

use axum::extract::rejection::BytesRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use gateway_common::ErrorPayload;

/// Error types for gateway operations.
///
/// Every variant is reported to the caller as `{"error": message}`; the
/// message never carries more than the error's display text.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Missing Content-Length header")]
    MissingContentLength,

    #[error("Failed to read request body: {0}")]
    UnreadableBody(#[from] BytesRejection),

    #[error("Invalid request body: {0}")]
    InvalidBody(#[from] serde_json::Error),

    #[error("Model not loaded")]
    ModelNotLoaded,

    #[error("Inference failed: {0}")]
    InferenceFailed(String),

    #[error("Load failed: {0}")]
    LoadFailed(String),

    #[error("Generation worker unavailable")]
    WorkerUnavailable,
}

impl Error {
    fn status(&self) -> StatusCode {
        match self {
            Error::ModelNotLoaded => StatusCode::SERVICE_UNAVAILABLE,
            Error::MissingContentLength
            | Error::UnreadableBody(_)
            | Error::InvalidBody(_)
            | Error::InferenceFailed(_)
            | Error::LoadFailed(_)
            | Error::WorkerUnavailable => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status();
        tracing::error!(status = %status.as_u16(), "Request failed: {}", self);

        (status, Json(ErrorPayload::new(self.to_string()))).into_response()
    }
}

pub type Result<T> = std::result::Result<T, Error>;
