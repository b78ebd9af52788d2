//! Video encoder trait abstraction

use bytes::Bytes;
use capture::CapturedFrame;

use crate::EncoderResult;

/// Bits spent per pixel per frame when sizing the target bitrate
const BITS_PER_PIXEL: f64 = 0.1;
const MIN_BITRATE_KBPS: u32 = 200;

/// Encoder configuration
#[derive(Debug, Clone, PartialEq)]
pub struct EncoderConfig {
    /// Frame width
    pub width: u32,
    /// Frame height
    pub height: u32,
    /// Frame rate used for timestamps and rate control
    pub fps: f64,
    /// Target bitrate in kbps
    pub bitrate_kbps: u32,
    /// Keyframe interval (GOP size)
    pub keyframe_interval: u32,
}

impl EncoderConfig {
    /// Configuration for frames of the given size and rate.
    ///
    /// Bitrate scales with the pixel rate; a keyframe every two seconds.
    pub fn for_stream(width: u32, height: u32, fps: f64) -> Self {
        let pixel_rate = width as f64 * height as f64 * fps.max(1.0);
        let bitrate_kbps = ((pixel_rate * BITS_PER_PIXEL / 1000.0) as u32).max(MIN_BITRATE_KBPS);

        Self {
            width,
            height,
            fps,
            bitrate_kbps,
            keyframe_interval: ((fps * 2.0).round() as u32).max(1),
        }
    }
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self::for_stream(1280, 720, 30.0)
    }
}

/// Encoded frame type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodedFrameType {
    /// Keyframe (I-frame)
    Key,
    /// Predicted frame (P-frame)
    Predicted,
}

/// Encoded frame output
#[derive(Debug, Clone)]
pub struct EncodedFrame {
    /// NAL units with Annex-B start codes
    pub data: Bytes,
    /// Frame type
    pub frame_type: EncodedFrameType,
    /// Presentation timestamp in microseconds
    pub pts_us: u64,
    /// Frame sequence number
    pub sequence: u64,
}

/// Video encoder trait
pub trait VideoEncoder: Send {
    /// Initialize the encoder with configuration
    fn init(&mut self, config: EncoderConfig) -> EncoderResult<()>;

    /// Encode a captured frame. `None` when rate control skipped it.
    fn encode(&mut self, frame: &CapturedFrame) -> EncoderResult<Option<EncodedFrame>>;

    /// Get current configuration
    fn config(&self) -> &EncoderConfig;

    /// Get encoder statistics
    fn stats(&self) -> EncoderStats;

    /// Flush the encoder and get any remaining frames
    fn flush(&mut self) -> EncoderResult<Vec<EncodedFrame>>;
}

/// Encoder statistics
#[derive(Debug, Clone, Default)]
pub struct EncoderStats {
    /// Total frames encoded
    pub frames_encoded: u64,
    /// Frames the encoder dropped
    pub frames_skipped: u64,
    /// Total bytes output
    pub bytes_output: u64,
    /// Average encoding time in microseconds
    pub avg_encode_time_us: u64,
    /// Keyframes generated
    pub keyframes: u64,
}
