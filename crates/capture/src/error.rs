//! Capture error types

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("Invalid backend: {0}")]
    InvalidBackend(String),

    #[error("Backend not compiled in: {0}")]
    UnsupportedBackend(String),

    #[error("Camera not found: {0}")]
    CameraNotFound(String),

    #[error("Failed to open camera {index}: {reason}")]
    OpenFailed { index: u32, reason: String },

    #[error("Frame capture failed on {camera}: {reason}")]
    CaptureFailed { camera: String, reason: String },

    #[error("Unsupported resolution: {width}x{height}")]
    UnsupportedResolution { width: u32, height: u32 },

    #[error("Invalid camera config {path}: {reason}")]
    InvalidConfig { path: String, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type CaptureResult<T> = Result<T, CaptureError>;
