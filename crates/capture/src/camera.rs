//! Camera descriptors and backend dispatch

use serde::Deserialize;
use std::fmt;
use std::str::FromStr;
use tracing::debug;

use crate::synthetic::SyntheticCamera;
use crate::{CaptureError, CaptureResult, FrameSource};

/// Frame source backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(try_from = "String")]
pub enum Backend {
    /// Built-in moving test pattern
    Synthetic,
    /// Attached devices through the platform camera API
    Native,
}

impl Backend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Backend::Synthetic => "synthetic",
            Backend::Native => "native",
        }
    }

    /// Whether this backend was compiled in
    pub fn is_available(&self) -> bool {
        match self {
            Backend::Synthetic => true,
            Backend::Native => cfg!(feature = "native"),
        }
    }
}

impl Default for Backend {
    fn default() -> Self {
        if cfg!(feature = "native") {
            Backend::Native
        } else {
            Backend::Synthetic
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Backend {
    type Err = CaptureError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "synthetic" => Ok(Backend::Synthetic),
            "native" => Ok(Backend::Native),
            _ => Err(CaptureError::InvalidBackend(s.to_string())),
        }
    }
}

impl TryFrom<String> for Backend {
    type Error = CaptureError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// A camera and the capture parameters to open it with
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CameraInfo {
    /// Device index within the backend
    pub index: u32,
    /// Backend used to open the device
    pub backend: Backend,
    /// Requested or negotiated frame width
    pub frame_width: u32,
    /// Requested or negotiated frame height
    pub frame_height: u32,
    /// Requested or negotiated frame rate
    pub fps: f64,
}

impl fmt::Display for CameraInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} Camera {} - {} x {} - {:?} fps",
            self.backend, self.index, self.frame_width, self.frame_height, self.fps
        )
    }
}

impl CameraInfo {
    /// Open device `index` and report its default parameters.
    ///
    /// Returns `Ok(None)` when no device answers at that index.
    pub fn probe(index: u32, backend: Backend) -> CaptureResult<Option<CameraInfo>> {
        let found = match backend {
            Backend::Synthetic => SyntheticCamera::probe(index),
            Backend::Native => native_probe(index)?,
        };

        match &found {
            Some(camera) => debug!("Probe {} {}: {}", backend, index, camera),
            None => debug!("Probe {} {}: nothing", backend, index),
        }

        Ok(found)
    }

    /// Whether the device can be opened
    pub fn check(&self) -> bool {
        match Self::probe(self.index, self.backend) {
            Ok(found) => found.is_some(),
            Err(e) => {
                debug!("Check failed for {}: {}", self, e);
                false
            }
        }
    }

    /// Open the device at the requested parameters and discard one warm-up frame
    pub fn open(&self) -> CaptureResult<Box<dyn FrameSource>> {
        debug!("Opening {}", self);

        let mut source: Box<dyn FrameSource> = match self.backend {
            Backend::Synthetic => Box::new(SyntheticCamera::open(self)?),
            Backend::Native => native_open(self)?,
        };

        source.read_frame()?;
        Ok(source)
    }

    /// Short label used in logs and error messages
    pub fn label(&self) -> String {
        format!("{} Camera {}", self.backend, self.index)
    }
}

#[cfg(feature = "native")]
fn native_probe(index: u32) -> CaptureResult<Option<CameraInfo>> {
    Ok(crate::native::NativeCamera::probe(index))
}

#[cfg(not(feature = "native"))]
fn native_probe(_index: u32) -> CaptureResult<Option<CameraInfo>> {
    Err(CaptureError::UnsupportedBackend(Backend::Native.to_string()))
}

#[cfg(feature = "native")]
fn native_open(info: &CameraInfo) -> CaptureResult<Box<dyn FrameSource>> {
    Ok(Box::new(crate::native::NativeCamera::open(info)?))
}

#[cfg(not(feature = "native"))]
fn native_open(_info: &CameraInfo) -> CaptureResult<Box<dyn FrameSource>> {
    Err(CaptureError::UnsupportedBackend(Backend::Native.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_parsing() {
        assert_eq!("synthetic".parse::<Backend>().unwrap(), Backend::Synthetic);
        assert_eq!(" Native ".parse::<Backend>().unwrap(), Backend::Native);
        assert!(matches!(
            "CAP_DSHOW".parse::<Backend>(),
            Err(CaptureError::InvalidBackend(_))
        ));
    }

    #[test]
    fn test_display_format() {
        let camera = CameraInfo {
            index: 2,
            backend: Backend::Synthetic,
            frame_width: 1920,
            frame_height: 1080,
            fps: 29.97,
        };
        assert_eq!(
            camera.to_string(),
            "synthetic Camera 2 - 1920 x 1080 - 29.97 fps"
        );
        assert_eq!(camera.label(), "synthetic Camera 2");
    }

    #[test]
    fn test_display_keeps_fraction_on_whole_fps() {
        let camera = CameraInfo {
            index: 0,
            backend: Backend::Synthetic,
            frame_width: 1280,
            frame_height: 720,
            fps: 30.0,
        };
        assert_eq!(
            camera.to_string(),
            "synthetic Camera 0 - 1280 x 720 - 30.0 fps"
        );
    }

    #[test]
    fn test_probe_synthetic() {
        let camera = CameraInfo::probe(0, Backend::Synthetic).unwrap().unwrap();
        assert_eq!(camera.index, 0);
        assert!(camera.check());

        assert!(CameraInfo::probe(5, Backend::Synthetic).unwrap().is_none());
    }

    #[cfg(not(feature = "native"))]
    #[test]
    fn test_native_unavailable_without_feature() {
        assert!(!Backend::Native.is_available());
        assert!(matches!(
            CameraInfo::probe(0, Backend::Native),
            Err(CaptureError::UnsupportedBackend(_))
        ));
    }

    #[test]
    fn test_open_negotiates_requested_resolution() {
        let requested = CameraInfo {
            index: 0,
            backend: Backend::Synthetic,
            frame_width: 160,
            frame_height: 120,
            fps: 120.0,
        };

        let mut source = requested.open().unwrap();
        assert_eq!(source.info(), &requested);
        assert_eq!(source.frames_read(), 1);

        let frame = source.read_frame().unwrap();
        assert_eq!((frame.width, frame.height), (160, 120));
        assert_eq!(frame.sequence, 1);
    }

    #[test]
    fn test_deserialize_rejects_unknown_backend() {
        let yaml = "index: 0\nbackend: CAP_ANY\nframe_width: 640\nframe_height: 480\nfps: 30\n";
        assert!(serde_yaml::from_str::<CameraInfo>(yaml).is_err());
    }
}
