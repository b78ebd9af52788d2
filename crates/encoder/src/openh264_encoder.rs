//! OpenH264 encoder implementation

use bytes::Bytes;
use capture::CapturedFrame;
use openh264::encoder::{Encoder, EncoderConfig as OpenH264Config, UsageType};
use openh264::formats::YUVBuffer;
use openh264::{Error as OpenH264Error, OpenH264API};
use std::time::Instant;
use tracing::{debug, info};

use crate::{
    EncodedFrame, EncodedFrameType, EncoderConfig, EncoderError, EncoderResult, EncoderStats,
    VideoEncoder,
};

/// OpenH264-based software encoder
pub struct OpenH264Encoder {
    encoder: Option<Encoder>,
    config: EncoderConfig,
    stats: EncoderStats,
    /// Next frame must be an IDR (set when a scheduled keyframe was skipped)
    force_keyframe: bool,
    frame_counter: u64,
    encode_time_total_us: u64,
    yuv_buffer: Vec<u8>,
}

impl OpenH264Encoder {
    /// Create a new OpenH264 encoder
    pub fn new() -> Self {
        Self {
            encoder: None,
            config: EncoderConfig::default(),
            stats: EncoderStats::default(),
            force_keyframe: false,
            frame_counter: 0,
            encode_time_total_us: 0,
            yuv_buffer: Vec::new(),
        }
    }

    /// Convert packed RGB(A)/BGRA to I420 (YUV planar)
    fn rgb_to_yuv(&mut self, frame: &CapturedFrame) -> &[u8] {
        let width = frame.width as usize;
        let height = frame.height as usize;

        // I420 size: Y plane + U plane (1/4) + V plane (1/4) = 1.5 * width * height
        let y_size = width * height;
        let uv_size = (width / 2) * (height / 2);
        self.yuv_buffer.resize(y_size + 2 * uv_size, 0);

        let (y_plane, uv_planes) = self.yuv_buffer.split_at_mut(y_size);
        let (u_plane, v_plane) = uv_planes.split_at_mut(uv_size);

        let bpp = frame.format.bytes_per_pixel();
        let [ro, go, bo] = frame.format.rgb_offsets();

        for y in 0..height {
            for x in 0..width {
                let pixel_offset = y * frame.stride as usize + x * bpp;
                let r = frame.data[pixel_offset + ro] as i32;
                let g = frame.data[pixel_offset + go] as i32;
                let b = frame.data[pixel_offset + bo] as i32;

                // BT.601 conversion
                let y_val = ((66 * r + 129 * g + 25 * b + 128) >> 8) + 16;
                y_plane[y * width + x] = y_val.clamp(0, 255) as u8;

                // Subsample for U and V (every 2x2 block)
                if (x % 2 == 0) && (y % 2 == 0) {
                    let u_val = ((-38 * r - 74 * g + 112 * b + 128) >> 8) + 128;
                    let v_val = ((112 * r - 94 * g - 18 * b + 128) >> 8) + 128;

                    let uv_idx = (y / 2) * (width / 2) + (x / 2);
                    u_plane[uv_idx] = u_val.clamp(0, 255) as u8;
                    v_plane[uv_idx] = v_val.clamp(0, 255) as u8;
                }
            }
        }

        &self.yuv_buffer
    }
}

impl Default for OpenH264Encoder {
    fn default() -> Self {
        Self::new()
    }
}

impl VideoEncoder for OpenH264Encoder {
    fn init(&mut self, config: EncoderConfig) -> EncoderResult<()> {
        let odd = config.width % 2 != 0 || config.height % 2 != 0;
        if config.width == 0 || config.height == 0 || odd {
            return Err(EncoderError::UnsupportedResolution {
                width: config.width,
                height: config.height,
            });
        }

        info!(
            "Initializing OpenH264 encoder: {}x{} @ {} kbps, {} fps, keyframe every {} frames",
            config.width,
            config.height,
            config.bitrate_kbps,
            config.fps,
            config.keyframe_interval
        );

        // Frame skipping off: every captured frame must reach the file
        let openh264_config = OpenH264Config::new()
            .set_bitrate_bps(config.bitrate_kbps * 1000)
            .max_frame_rate(config.fps as f32)
            .usage_type(UsageType::CameraVideoRealTime)
            .enable_skip_frame(false);

        let encoder = Encoder::with_api_config(OpenH264API::from_source(), openh264_config)
            .map_err(|e: OpenH264Error| EncoderError::InitFailed(e.to_string()))?;

        self.encoder = Some(encoder);
        self.config = config;
        self.stats = EncoderStats::default();
        self.frame_counter = 0;
        self.encode_time_total_us = 0;
        self.force_keyframe = false;

        Ok(())
    }

    fn encode(&mut self, frame: &CapturedFrame) -> EncoderResult<Option<EncodedFrame>> {
        if self.encoder.is_none() {
            return Err(EncoderError::NotInitialized);
        }

        if frame.width != self.config.width || frame.height != self.config.height {
            return Err(EncoderError::UnsupportedResolution {
                width: frame.width,
                height: frame.height,
            });
        }

        let start = Instant::now();

        // Convert to YUV and clone to release the borrow on self
        let yuv_data = self.rgb_to_yuv(frame).to_vec();
        let yuv_source = YUVBuffer::from_vec(
            yuv_data,
            self.config.width as usize,
            self.config.height as usize,
        );

        let is_keyframe = self.force_keyframe
            || self.frame_counter % self.config.keyframe_interval.max(1) as u64 == 0;

        self.force_keyframe = false;

        let Some(encoder) = self.encoder.as_mut() else {
            return Err(EncoderError::NotInitialized);
        };

        if is_keyframe {
            encoder.force_intra_frame();
        }

        let bitstream = encoder
            .encode(&yuv_source)
            .map_err(|e| EncoderError::EncodingFailed(e.to_string()))?;

        // Collect NAL units with Annex-B start codes
        let mut nal_data = Vec::new();
        for l in 0..bitstream.num_layers() {
            if let Some(layer) = bitstream.layer(l) {
                for n in 0..layer.nal_count() {
                    if let Some(nal) = layer.nal_unit(n) {
                        let has_start_code =
                            nal.starts_with(&[0, 0, 0, 1]) || nal.starts_with(&[0, 0, 1]);
                        if !has_start_code {
                            nal_data.extend_from_slice(&[0, 0, 0, 1]);
                        }
                        nal_data.extend_from_slice(nal);
                    }
                }
            }
        }

        if nal_data.is_empty() {
            debug!("Encoder skipped frame {}", self.frame_counter);
            self.frame_counter += 1;
            self.stats.frames_skipped += 1;
            // Keep the keyframe schedule when the skipped frame was due one
            self.force_keyframe = is_keyframe;
            return Ok(None);
        }

        let encode_time = start.elapsed().as_micros() as u64;
        let frame_type = if is_keyframe {
            EncodedFrameType::Key
        } else {
            EncodedFrameType::Predicted
        };
        let pts_us = (self.frame_counter as f64 / self.config.fps * 1_000_000.0) as u64;

        let encoded = EncodedFrame {
            data: Bytes::from(nal_data),
            frame_type,
            pts_us,
            sequence: self.frame_counter,
        };

        // Update stats
        self.frame_counter += 1;
        self.encode_time_total_us += encode_time;
        self.stats.frames_encoded += 1;
        self.stats.bytes_output += encoded.data.len() as u64;
        self.stats.avg_encode_time_us = self.encode_time_total_us / self.stats.frames_encoded;
        if is_keyframe {
            self.stats.keyframes += 1;
        }

        Ok(Some(encoded))
    }

    fn config(&self) -> &EncoderConfig {
        &self.config
    }

    fn stats(&self) -> EncoderStats {
        self.stats.clone()
    }

    fn flush(&mut self) -> EncoderResult<Vec<EncodedFrame>> {
        // OpenH264 doesn't buffer frames in real-time mode
        Ok(Vec::new())
    }
}
