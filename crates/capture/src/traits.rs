//! Frame source trait abstraction

use crate::{CameraInfo, CaptureResult, CapturedFrame};

/// An opened camera delivering frames at its negotiated resolution and rate.
///
/// The device is released when the source is dropped.
pub trait FrameSource {
    /// Negotiated camera parameters (may differ from what was requested)
    fn info(&self) -> &CameraInfo;

    /// Read the next frame (blocking)
    fn read_frame(&mut self) -> CaptureResult<CapturedFrame>;

    /// Frames delivered so far
    fn frames_read(&self) -> u64;
}
