//! MP4 file writer for H.264 streams
//!
//! The encoder emits Annex-B NAL units. MP4 wants SPS/PPS in the `avcC`
//! box and length-prefixed NAL units in each sample, so the writer
//! re-frames every access unit before handing it to the muxer.

use bytes::Bytes;
use capture::CapturedFrame;
use mp4::{AvcConfig, FourCC, MediaConfig, Mp4Config, Mp4Sample, Mp4Writer, TrackConfig, TrackType};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::{
    EncodedFrame, EncoderConfig, EncoderError, EncoderResult, OpenH264Encoder, VideoEncoder,
};

/// Media timescale of the video track (ticks per second)
const TIMESCALE: u32 = 90_000;
const MOVIE_TIMESCALE: u32 = 1000;
const VIDEO_TRACK_ID: u32 = 1;

const NAL_IDR: u8 = 5;
const NAL_SPS: u8 = 7;
const NAL_PPS: u8 = 8;
const NAL_AUD: u8 = 9;

/// Totals reported when a video file is finished
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VideoSummary {
    /// Samples written to the file
    pub frames: u64,
    /// Final file size
    pub bytes: u64,
    pub keyframes: u64,
    /// Frames dropped by rate control or before the first keyframe
    pub skipped: u64,
}

struct PendingSample {
    start: u64,
    is_sync: bool,
    bytes: Bytes,
}

/// Encodes frames and muxes them into an `.mp4` file
pub struct VideoWriter<E: VideoEncoder = OpenH264Encoder> {
    encoder: E,
    mp4: Mp4Writer<BufWriter<File>>,
    path: PathBuf,
    track_added: bool,
    /// Held back until the next sample's start gives its duration
    pending: Option<PendingSample>,
    frame_duration: u32,
    samples: u64,
    keyframes: u64,
    dropped: u64,
}

impl VideoWriter<OpenH264Encoder> {
    /// Create `path` (truncating it) and an OpenH264 encoder for `config`
    pub fn create(path: &Path, config: EncoderConfig) -> EncoderResult<Self> {
        let mut encoder = OpenH264Encoder::new();
        encoder.init(config)?;
        Self::with_encoder(path, encoder)
    }
}

impl<E: VideoEncoder> VideoWriter<E> {
    /// Write through an already initialized encoder
    pub fn with_encoder(path: &Path, encoder: E) -> EncoderResult<Self> {
        let fps = encoder.config().fps;
        let frame_duration = if fps.is_finite() && fps > 0.0 {
            ((TIMESCALE as f64 / fps).round() as u32).max(1)
        } else {
            TIMESCALE / 30
        };

        let brand = |value: &[u8; 4]| FourCC { value: *value };
        let mp4_config = Mp4Config {
            major_brand: brand(b"isom"),
            minor_version: 512,
            compatible_brands: [b"isom", b"iso2", b"avc1", b"mp41"].map(brand).to_vec(),
            timescale: MOVIE_TIMESCALE,
        };
        let mp4 = Mp4Writer::write_start(BufWriter::new(File::create(path)?), &mp4_config)?;
        debug!("Video output opened at {}", path.display());

        Ok(Self {
            encoder,
            mp4,
            path: path.to_path_buf(),
            track_added: false,
            pending: None,
            frame_duration,
            samples: 0,
            keyframes: 0,
            dropped: 0,
        })
    }

    /// Encode one frame and queue it for the file
    pub fn write(&mut self, frame: &CapturedFrame) -> EncoderResult<()> {
        match self.encoder.encode(frame)? {
            Some(encoded) => self.push(&encoded),
            None => Ok(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn push(&mut self, encoded: &EncodedFrame) -> EncoderResult<()> {
        let units = annex_b_units(&encoded.data);

        if !self.track_added {
            let sps = units.iter().find(|u| nal_type(u) == NAL_SPS);
            let pps = units.iter().find(|u| nal_type(u) == NAL_PPS);
            let (Some(sps), Some(pps)) = (sps, pps) else {
                debug!("Dropping frame {} ahead of parameter sets", encoded.sequence);
                self.dropped += 1;
                return Ok(());
            };
            self.add_track(sps, pps)?;
        }

        let is_sync = units.iter().any(|u| nal_type(u) == NAL_IDR);
        let bytes = length_prefixed(
            units
                .iter()
                .filter(|u| !matches!(nal_type(u), NAL_SPS | NAL_PPS | NAL_AUD)),
        );
        if bytes.is_empty() {
            return Ok(());
        }

        let start = encoded.pts_us * TIMESCALE as u64 / 1_000_000;
        self.write_pending(Some(start))?;
        self.pending = Some(PendingSample {
            start,
            is_sync,
            bytes: Bytes::from(bytes),
        });
        Ok(())
    }

    fn add_track(&mut self, sps: &[u8], pps: &[u8]) -> EncoderResult<()> {
        let config = self.encoder.config();
        let unsupported = || EncoderError::UnsupportedResolution {
            width: config.width,
            height: config.height,
        };
        let width = u16::try_from(config.width).map_err(|_| unsupported())?;
        let height = u16::try_from(config.height).map_err(|_| unsupported())?;

        self.mp4.add_track(&TrackConfig {
            track_type: TrackType::Video,
            timescale: TIMESCALE,
            language: "und".to_string(),
            media_conf: MediaConfig::AvcConfig(AvcConfig {
                width,
                height,
                seq_param_set: sps.to_vec(),
                pic_param_set: pps.to_vec(),
            }),
        })?;
        self.track_added = true;
        debug!("H.264 track added: {}x{}", width, height);
        Ok(())
    }

    fn write_pending(&mut self, next_start: Option<u64>) -> EncoderResult<()> {
        let Some(sample) = self.pending.take() else {
            return Ok(());
        };

        let duration = match next_start {
            Some(next) if next > sample.start => {
                u32::try_from(next - sample.start).unwrap_or(self.frame_duration)
            }
            _ => self.frame_duration,
        };

        self.mp4.write_sample(
            VIDEO_TRACK_ID,
            &Mp4Sample {
                start_time: sample.start,
                duration,
                rendering_offset: 0,
                is_sync: sample.is_sync,
                bytes: sample.bytes,
            },
        )?;

        self.samples += 1;
        if sample.is_sync {
            self.keyframes += 1;
        }
        Ok(())
    }

    /// Drain the encoder, finalize the container and report totals
    pub fn finish(mut self) -> EncoderResult<VideoSummary> {
        for encoded in self.encoder.flush()? {
            self.push(&encoded)?;
        }
        self.write_pending(None)?;

        if !self.track_added {
            return Err(EncoderError::MissingParameterSets);
        }

        self.mp4.write_end()?;
        self.mp4.into_writer().flush()?;

        let summary = VideoSummary {
            frames: self.samples,
            bytes: fs::metadata(&self.path)?.len(),
            keyframes: self.keyframes,
            skipped: self.encoder.stats().frames_skipped + self.dropped,
        };

        info!(
            "Video written to {}: {} frames, {} bytes",
            self.path.display(),
            summary.frames,
            summary.bytes
        );
        Ok(summary)
    }
}

fn nal_type(unit: &[u8]) -> u8 {
    unit.first().map_or(0, |header| header & 0x1F)
}

/// Split an Annex-B byte stream into NAL units without start codes
fn annex_b_units(data: &[u8]) -> Vec<&[u8]> {
    let mut units = Vec::new();
    let mut unit_start: Option<usize> = None;
    let mut i = 0;

    while i + 3 <= data.len() {
        if data[i] == 0 && data[i + 1] == 0 && data[i + 2] == 1 {
            if let Some(start) = unit_start {
                units.push(trim_trailing_zeros(&data[start..i]));
            }
            i += 3;
            unit_start = Some(i);
        } else {
            i += 1;
        }
    }
    if let Some(start) = unit_start {
        units.push(&data[start..]);
    }

    units.retain(|u| !u.is_empty());
    units
}

fn trim_trailing_zeros(unit: &[u8]) -> &[u8] {
    let end = unit.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
    &unit[..end]
}

/// AVCC framing: each unit preceded by its 4-byte big-endian length
fn length_prefixed<U: AsRef<[u8]>>(units: impl IntoIterator<Item = U>) -> Vec<u8> {
    let mut out = Vec::new();
    for unit in units {
        let unit = unit.as_ref();
        out.extend_from_slice(&(unit.len() as u32).to_be_bytes());
        out.extend_from_slice(unit);
    }
    out
}
