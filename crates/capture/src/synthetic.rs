//! Synthetic camera producing a moving test pattern
//!
//! Always available, so the rest of the pipeline can run on machines
//! without a camera and in tests.

use std::time::{Duration, Instant};
use tracing::{info, warn};

use crate::{
    Backend, CameraInfo, CaptureError, CaptureResult, CapturedFrame, FrameSource, PixelFormat,
};

/// Number of synthetic devices (indices `0..SYNTHETIC_DEVICE_COUNT`)
pub const SYNTHETIC_DEVICE_COUNT: u32 = 1;

const DEFAULT_WIDTH: u32 = 1280;
const DEFAULT_HEIGHT: u32 = 720;
const DEFAULT_FPS: f64 = 30.0;

/// Test-pattern frame source
pub struct SyntheticCamera {
    info: CameraInfo,
    frame_interval: Duration,
    last_frame_time: Option<Instant>,
    frame_count: u64,
}

impl SyntheticCamera {
    pub(crate) fn probe(index: u32) -> Option<CameraInfo> {
        (index < SYNTHETIC_DEVICE_COUNT).then(|| CameraInfo {
            index,
            backend: Backend::Synthetic,
            frame_width: DEFAULT_WIDTH,
            frame_height: DEFAULT_HEIGHT,
            fps: DEFAULT_FPS,
        })
    }

    /// Open a synthetic device at the requested resolution and rate
    pub fn open(requested: &CameraInfo) -> CaptureResult<Self> {
        if requested.index >= SYNTHETIC_DEVICE_COUNT {
            return Err(CaptureError::OpenFailed {
                index: requested.index,
                reason: "no such synthetic device".to_string(),
            });
        }

        if requested.frame_width == 0 || requested.frame_height == 0 {
            return Err(CaptureError::UnsupportedResolution {
                width: requested.frame_width,
                height: requested.frame_height,
            });
        }

        let mut info = requested.clone();
        if !(info.fps.is_finite() && info.fps > 0.0) {
            warn!("Invalid fps {} requested, using {}", info.fps, DEFAULT_FPS);
            info.fps = DEFAULT_FPS;
        }

        info!(
            "Synthetic camera {} opened: {}x{} @ {} fps",
            info.index, info.frame_width, info.frame_height, info.fps
        );

        Ok(Self {
            frame_interval: Duration::from_secs_f64(1.0 / info.fps),
            info,
            last_frame_time: None,
            frame_count: 0,
        })
    }

    fn render(&self) -> Vec<u8> {
        let width = self.info.frame_width as usize;
        let height = self.info.frame_height as usize;
        let shift = (self.frame_count * 4) as usize;

        let mut data = Vec::with_capacity(width * height * 3);
        for y in 0..height {
            for x in 0..width {
                data.push(((x + shift) * 255 / width.max(1)) as u8);
                data.push((y * 255 / height.max(1)) as u8);
                data.push(((x + y + shift) % 256) as u8);
            }
        }
        data
    }
}

impl FrameSource for SyntheticCamera {
    fn info(&self) -> &CameraInfo {
        &self.info
    }

    fn read_frame(&mut self) -> CaptureResult<CapturedFrame> {
        // Throttle to the negotiated frame rate
        if let Some(last) = self.last_frame_time {
            let elapsed = last.elapsed();
            if elapsed < self.frame_interval {
                std::thread::sleep(self.frame_interval - elapsed);
            }
        }
        self.last_frame_time = Some(Instant::now());

        let frame = CapturedFrame::from_packed(
            self.render(),
            self.info.frame_width,
            self.info.frame_height,
            PixelFormat::Rgb8,
            self.frame_count,
            self.info.index,
        );
        self.frame_count += 1;

        Ok(frame)
    }

    fn frames_read(&self) -> u64 {
        self.frame_count
    }
}
