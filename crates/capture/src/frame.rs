//! Captured frame data structures

use bytes::Bytes;
use std::time::Instant;

/// Pixel format of the captured frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// RGB 8-bit per channel, packed
    Rgb8,
    /// RGBA 8-bit per channel
    Rgba8,
    /// BGRA 8-bit per channel
    Bgra8,
}

impl PixelFormat {
    pub fn bytes_per_pixel(&self) -> usize {
        match self {
            PixelFormat::Rgb8 => 3,
            PixelFormat::Rgba8 | PixelFormat::Bgra8 => 4,
        }
    }

    /// Byte offsets of the red, green and blue channels within a pixel
    pub fn rgb_offsets(&self) -> [usize; 3] {
        match self {
            PixelFormat::Rgb8 | PixelFormat::Rgba8 => [0, 1, 2],
            PixelFormat::Bgra8 => [2, 1, 0],
        }
    }
}

/// Captured frame data
#[derive(Debug, Clone)]
pub struct CapturedFrame {
    /// Raw pixel data
    pub data: Bytes,
    /// Frame width
    pub width: u32,
    /// Frame height
    pub height: u32,
    /// Stride (bytes per row, may include padding)
    pub stride: u32,
    /// Pixel format
    pub format: PixelFormat,
    /// Capture timestamp
    pub timestamp: Instant,
    /// Frame sequence number
    pub sequence: u64,
    /// Index of the camera this frame was captured from
    pub camera_index: u32,
}

impl CapturedFrame {
    /// Wrap tightly packed pixel data
    pub fn from_packed(
        data: Vec<u8>,
        width: u32,
        height: u32,
        format: PixelFormat,
        sequence: u64,
        camera_index: u32,
    ) -> Self {
        Self {
            data: Bytes::from(data),
            width,
            height,
            stride: width * format.bytes_per_pixel() as u32,
            format,
            timestamp: Instant::now(),
            sequence,
            camera_index,
        }
    }

    /// Byte offset of pixel (x, y)
    pub fn pixel_offset(&self, x: u32, y: u32) -> usize {
        y as usize * self.stride as usize + x as usize * self.format.bytes_per_pixel()
    }

    /// Red, green and blue of pixel (x, y)
    pub fn rgb_at(&self, x: u32, y: u32) -> [u8; 3] {
        let offset = self.pixel_offset(x, y);
        let [r, g, b] = self.format.rgb_offsets();
        [
            self.data[offset + r],
            self.data[offset + g],
            self.data[offset + b],
        ]
    }

    /// Tightly packed RGB8 copy of the frame, dropping alpha and row padding
    pub fn to_rgb8(&self) -> Vec<u8> {
        if self.format == PixelFormat::Rgb8 && self.stride == self.width * 3 {
            return self.data.to_vec();
        }

        let mut out = Vec::with_capacity(self.width as usize * self.height as usize * 3);
        for y in 0..self.height {
            for x in 0..self.width {
                out.extend_from_slice(&self.rgb_at(x, y));
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bgra_to_rgb8_swaps_channels_and_drops_alpha() {
        let frame = CapturedFrame::from_packed(
            vec![10, 20, 30, 255, 40, 50, 60, 255],
            2,
            1,
            PixelFormat::Bgra8,
            0,
            0,
        );

        assert_eq!(frame.stride, 8);
        assert_eq!(frame.to_rgb8(), vec![30, 20, 10, 60, 50, 40]);
    }

    #[test]
    fn test_rgb8_with_row_padding() {
        // 1x2 RGB frame with 2 bytes of padding per row
        let frame = CapturedFrame {
            data: Bytes::from(vec![1, 2, 3, 0, 0, 4, 5, 6, 0, 0]),
            width: 1,
            height: 2,
            stride: 5,
            format: PixelFormat::Rgb8,
            timestamp: Instant::now(),
            sequence: 0,
            camera_index: 0,
        };

        assert_eq!(frame.rgb_at(0, 1), [4, 5, 6]);
        assert_eq!(frame.to_rgb8(), vec![1, 2, 3, 4, 5, 6]);
    }
}
