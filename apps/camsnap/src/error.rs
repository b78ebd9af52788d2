//! Application error types

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use capture::CaptureError;
use encoder::EncoderError;
use scratch_space::ScratchError;
use thiserror::Error;
use tracing::error;

/// Application errors
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Unknown camera: {0}")]
    UnknownCamera(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Capture failed: {0}")]
    Capture(CaptureError),

    #[error("Encoding failed: {0}")]
    Encode(#[from] EncoderError),

    #[error("Scratch space unavailable: {0}")]
    Scratch(#[from] ScratchError),

    #[error("Worker failed: {0}")]
    Worker(String),
}

impl From<CaptureError> for AppError {
    fn from(e: CaptureError) -> Self {
        match e {
            CaptureError::CameraNotFound(name) => Self::UnknownCamera(name),
            other => Self::Capture(other),
        }
    }
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::UnknownCamera(_) => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Scratch(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Capture(_) | Self::Encode(_) | Self::Worker(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("{}", self);
        }
        let body = Json(serde_json::json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}

/// Result type for application operations
pub type AppResult<T> = Result<T, AppError>;
