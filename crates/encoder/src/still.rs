//! Still image output

use capture::CapturedFrame;
use image::{ImageFormat, RgbImage};
use std::path::Path;
use tracing::debug;

use crate::{EncoderError, EncoderResult};

/// Image format implied by the path's extension, if it is one we write
pub fn still_format(path: &Path) -> EncoderResult<ImageFormat> {
    match ImageFormat::from_path(path) {
        Ok(format @ (ImageFormat::Jpeg | ImageFormat::Png)) => Ok(format),
        _ => Err(EncoderError::UnsupportedFormat(path.display().to_string())),
    }
}

/// Encode `frame` to `path` as JPEG or PNG, chosen by extension
pub fn write_still(frame: &CapturedFrame, path: &Path) -> EncoderResult<()> {
    let format = still_format(path)?;

    let image = RgbImage::from_raw(frame.width, frame.height, frame.to_rgb8()).ok_or(
        EncoderError::BufferTooSmall {
            width: frame.width,
            height: frame.height,
        },
    )?;
    image.save_with_format(path, format)?;

    debug!("Wrote {:?} still to {}", format, path.display());
    Ok(())
}
