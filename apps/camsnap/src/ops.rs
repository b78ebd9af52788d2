//! Still and video capture operations

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use capture::{discover_cameras, resolve_camera, CameraInfo, CapturedFrame};
use encoder::{add_watermark, write_still, EncoderConfig, VideoSummary, VideoWriter};
use tracing::{debug, info};

use crate::config::CameraOptions;
use crate::error::AppResult;

/// Resolve a camera key or device index given on the command line.
///
/// Bare indices are probed directly; anything else needs discovery.
pub fn select_camera(input: &str, options: &CameraOptions) -> AppResult<CameraInfo> {
    let entries = if input.trim().parse::<u32>().is_ok() {
        Vec::new()
    } else {
        discover_cameras(
            options.max_cameras,
            options.backend(),
            Some(&options.camera_config),
        )?
    };
    Ok(resolve_camera(input, &entries, options.backend())?)
}

fn stamp(frame: CapturedFrame, watermark: bool) -> CapturedFrame {
    if watermark {
        add_watermark(&frame)
    } else {
        frame
    }
}

/// Grab one frame from `camera` and save it to `output` (.jpg or .png)
pub fn capture_image(output: &Path, camera: &CameraInfo, watermark: bool) -> AppResult<PathBuf> {
    let mut source = camera.open()?;
    info!(
        "Begin capture {} x {} image",
        source.info().frame_width,
        source.info().frame_height
    );

    let frame = source.read_frame()?;
    drop(source);
    debug!("Camera {} released", camera.label());

    write_still(&stamp(frame, watermark), output)?;
    info!("Image saved to {}", output.display());
    Ok(output.to_path_buf())
}

/// Record `length` of video from `camera` into `output`.
///
/// The encoder is sized from the resolution and rate the device actually
/// delivers, which may differ from what was requested.
pub fn capture_video(
    output: &Path,
    camera: &CameraInfo,
    length: Duration,
    watermark: bool,
) -> AppResult<VideoSummary> {
    let mut source = camera.open()?;
    let negotiated = source.info().clone();
    info!(
        "Begin capture {} x {} video for {:?}",
        negotiated.frame_width, negotiated.frame_height, length
    );

    let config = EncoderConfig::for_stream(
        negotiated.frame_width,
        negotiated.frame_height,
        negotiated.fps,
    );
    let mut writer = VideoWriter::create(output, config)?;

    let start = Instant::now();
    while start.elapsed() < length {
        let frame = source.read_frame()?;
        writer.write(&stamp(frame, watermark))?;
    }
    debug!("Captured {} frames from {}", source.frames_read(), camera.label());
    drop(source);

    Ok(writer.finish()?)
}
