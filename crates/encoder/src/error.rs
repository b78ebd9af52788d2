//! Encoder error types

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EncoderError {
    #[error("Encoder initialization failed: {0}")]
    InitFailed(String),

    #[error("Encoding failed: {0}")]
    EncodingFailed(String),

    #[error("Unsupported resolution: {width}x{height}")]
    UnsupportedResolution { width: u32, height: u32 },

    #[error("Unsupported output format: {0}")]
    UnsupportedFormat(String),

    #[error("Frame buffer does not match {width}x{height}")]
    BufferTooSmall { width: u32, height: u32 },

    #[error("Encoder not initialized")]
    NotInitialized,

    #[error("No SPS/PPS in the encoded stream")]
    MissingParameterSets,

    #[error("MP4 muxing failed: {0}")]
    Mux(#[from] mp4::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type EncoderResult<T> = Result<T, EncoderError>;
