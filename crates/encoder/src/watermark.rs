//! Timestamp overlay

use bytes::Bytes;
use capture::CapturedFrame;
use chrono::{DateTime, Local, TimeZone};
use std::fmt::Display;

use crate::font::{self, ADVANCE, GLYPH_HEIGHT, GLYPH_WIDTH};

const TEXT_COLOR: [u8; 3] = [255, 255, 255];
const SHADOW_COLOR: [u8; 3] = [0, 0, 0];

/// Format a time as `YYYY-MM-DD HH:MM:SS.mmm`
pub fn timestamp_text<Tz: TimeZone>(time: &DateTime<Tz>) -> String
where
    Tz::Offset: Display,
{
    time.format("%Y-%m-%d %H:%M:%S%.3f").to_string()
}

/// Glyph scale for a frame: one font pixel per 240 rows, at least 1
pub fn text_scale(frame_height: u32) -> u32 {
    (frame_height / 240).max(1)
}

/// Rendered size of `text` at `scale`
pub fn text_size(text: &str, scale: u32) -> (u32, u32) {
    let chars = text.chars().count() as u32;
    let width = if chars == 0 {
        0
    } else {
        (chars * ADVANCE - 1) * scale
    };
    (width, GLYPH_HEIGHT * scale)
}

/// Bottom-right anchor: 95% across, 97.5% down, minus the text size
pub fn default_position(frame_width: u32, frame_height: u32, text_size: (u32, u32)) -> (u32, u32) {
    let x = (frame_width as f64 * 0.95) as i64 - text_size.0 as i64;
    let y = (frame_height as f64 * 0.975) as i64 - text_size.1 as i64;
    (x.max(0) as u32, y.max(0) as u32)
}

/// Copy of `frame` with the current local time stamped in the bottom-right corner
pub fn add_watermark(frame: &CapturedFrame) -> CapturedFrame {
    add_watermark_at(frame, &Local::now())
}

/// Copy of `frame` with `time` stamped in the bottom-right corner
pub fn add_watermark_at<Tz: TimeZone>(frame: &CapturedFrame, time: &DateTime<Tz>) -> CapturedFrame
where
    Tz::Offset: Display,
{
    draw_text(frame, &timestamp_text(time), None)
}

/// Copy of `frame` with `text` drawn in white over a dark shadow.
///
/// `position` is the top-left corner of the text; `None` anchors it bottom
/// right. Pixels falling outside the frame are clipped.
pub fn draw_text(frame: &CapturedFrame, text: &str, position: Option<(u32, u32)>) -> CapturedFrame {
    let scale = text_scale(frame.height);
    let (x, y) = position
        .unwrap_or_else(|| default_position(frame.width, frame.height, text_size(text, scale)));

    let mut data = frame.data.to_vec();
    let mut canvas = Canvas {
        data: &mut data,
        frame,
    };
    canvas.text(text, x + scale, y + scale, scale, SHADOW_COLOR);
    canvas.text(text, x, y, scale, TEXT_COLOR);

    CapturedFrame {
        data: Bytes::from(data),
        ..frame.clone()
    }
}

struct Canvas<'a> {
    data: &'a mut [u8],
    frame: &'a CapturedFrame,
}

impl Canvas<'_> {
    fn text(&mut self, text: &str, x: u32, y: u32, scale: u32, color: [u8; 3]) {
        for (i, c) in text.chars().enumerate() {
            let rows = font::glyph(c);
            let origin_x = x + i as u32 * ADVANCE * scale;
            for row in 0..GLYPH_HEIGHT {
                for col in 0..GLYPH_WIDTH {
                    if font::is_set(&rows, col, row) {
                        self.fill(origin_x + col * scale, y + row * scale, scale, color);
                    }
                }
            }
        }
    }

    fn fill(&mut self, x: u32, y: u32, size: u32, color: [u8; 3]) {
        let [ro, go, bo] = self.frame.format.rgb_offsets();
        for py in y..(y + size).min(self.frame.height) {
            for px in x..(x + size).min(self.frame.width) {
                let offset = self.frame.pixel_offset(px, py);
                self.data[offset + ro] = color[0];
                self.data[offset + go] = color[1];
                self.data[offset + bo] = color[2];
            }
        }
    }
}
