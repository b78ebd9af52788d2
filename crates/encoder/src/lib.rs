//! Media Encoder - stills, video and timestamp overlay for camsnap
//!
//! - Watermark: local timestamp drawn into the frame
//! - Stills: JPEG / PNG via `image`
//! - Video: H.264 Annex-B stream via OpenH264

mod error;
mod font;
mod openh264_encoder;
mod still;
mod traits;
mod watermark;
mod writer;

pub use error::*;
pub use openh264_encoder::*;
pub use still::*;
pub use traits::*;
pub use watermark::*;
pub use writer::*;
