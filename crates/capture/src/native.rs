//! Physical cameras through nokhwa

use nokhwa::Camera;
use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{
    CameraFormat, CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType, Resolution,
};
use tracing::{debug, info, warn};

use crate::{
    Backend, CameraInfo, CaptureError, CaptureResult, CapturedFrame, FrameSource, PixelFormat,
};

/// nokhwa-backed frame source
pub struct NativeCamera {
    camera: Camera,
    info: CameraInfo,
    frame_count: u64,
}

impl NativeCamera {
    pub(crate) fn probe(index: u32) -> Option<CameraInfo> {
        let requested = RequestedFormat::new::<RgbFormat>(RequestedFormatType::None);
        let camera = match Camera::new(CameraIndex::Index(index), requested) {
            Ok(camera) => camera,
            Err(e) => {
                debug!("No native camera at {}: {}", index, e);
                return None;
            }
        };

        let format = camera.camera_format();
        Some(CameraInfo {
            index,
            backend: Backend::Native,
            frame_width: format.resolution().width(),
            frame_height: format.resolution().height(),
            fps: format.frame_rate() as f64,
        })
    }

    /// Open at the closest format the device supports to the request
    pub fn open(requested: &CameraInfo) -> CaptureResult<Self> {
        let index = requested.index;
        let open_failed = |e: nokhwa::NokhwaError| CaptureError::OpenFailed {
            index,
            reason: e.to_string(),
        };

        let format = CameraFormat::new(
            Resolution::new(requested.frame_width, requested.frame_height),
            FrameFormat::MJPEG,
            requested.fps.round().max(1.0) as u32,
        );
        let closest = RequestedFormat::new::<RgbFormat>(RequestedFormatType::Closest(format));

        let mut camera = match Camera::new(CameraIndex::Index(index), closest) {
            Ok(camera) => camera,
            Err(e) => {
                warn!(
                    "Preferred format failed on camera {} ({}), letting the driver pick",
                    index, e
                );
                let any = RequestedFormat::new::<RgbFormat>(RequestedFormatType::None);
                Camera::new(CameraIndex::Index(index), any).map_err(open_failed)?
            }
        };
        camera.open_stream().map_err(open_failed)?;

        let negotiated = camera.camera_format();
        let info = CameraInfo {
            frame_width: negotiated.resolution().width(),
            frame_height: negotiated.resolution().height(),
            fps: negotiated.frame_rate() as f64,
            ..requested.clone()
        };

        info!(
            "Native camera {} opened: {}x{} @ {} fps",
            index, info.frame_width, info.frame_height, info.fps
        );

        Ok(Self {
            camera,
            info,
            frame_count: 0,
        })
    }
}

impl FrameSource for NativeCamera {
    fn info(&self) -> &CameraInfo {
        &self.info
    }

    fn read_frame(&mut self) -> CaptureResult<CapturedFrame> {
        let capture_failed = |e: nokhwa::NokhwaError| CaptureError::CaptureFailed {
            camera: self.info.to_string(),
            reason: e.to_string(),
        };

        let buffer = self.camera.frame().map_err(capture_failed)?;
        let decoded = buffer.decode_image::<RgbFormat>().map_err(capture_failed)?;
        let (width, height) = decoded.dimensions();

        let frame = CapturedFrame::from_packed(
            decoded.into_raw(),
            width,
            height,
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

impl Drop for NativeCamera {
    fn drop(&mut self) {
        if let Err(e) = self.camera.stop_stream() {
            warn!("Failed to stop camera {}: {}", self.info.index, e);
        }
        debug!("Camera {} released", self.info.index);
    }
}
