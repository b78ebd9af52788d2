//! Camera discovery from a YAML list and by scanning device indices

use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::{Backend, CameraInfo, CaptureError, CaptureResult};

/// Default number of device indices scanned
pub const DEFAULT_MAX_CAMERAS: u32 = 8;

/// A discovered camera keyed by the label shown to users
#[derive(Debug, Clone, PartialEq)]
pub struct CameraEntry {
    /// Display key; configured cameras carry a leading `*`
    pub key: String,
    pub camera: CameraInfo,
    /// Whether the camera came from the YAML list
    pub configured: bool,
}

/// Load the camera list from a YAML file
pub fn load_camera_config(path: &Path) -> CaptureResult<Vec<CameraInfo>> {
    let text = fs::read_to_string(path)?;
    serde_yaml::from_str(&text).map_err(|e| CaptureError::InvalidConfig {
        path: path.display().to_string(),
        reason: e.to_string(),
    })
}

/// Collect cameras from the optional YAML list, then scan `0..max_cameras`.
///
/// Order is preserved. An entry whose key is already present replaces the
/// earlier one in place.
pub fn discover_cameras(
    max_cameras: u32,
    backend: Backend,
    config_path: Option<&Path>,
) -> CaptureResult<Vec<CameraEntry>> {
    let mut entries: Vec<CameraEntry> = Vec::new();

    if let Some(path) = config_path.filter(|p| p.exists()) {
        info!("Check my cameras from {}", path.display());

        for camera in load_camera_config(path)? {
            let key = format!("*{}", camera);
            debug!("Add {} to cameras", key);
            if camera.check() {
                info!("Check passed: {}", key);
            } else {
                warn!("Check failed: {}", key);
            }
            insert(&mut entries, key, camera, true);
        }
    }

    info!("Scan cameras with {} backend", backend);
    for index in 0..max_cameras {
        if let Some(camera) = CameraInfo::probe(index, backend)? {
            let key = camera.to_string();
            debug!("Add {} to cameras", key);
            insert(&mut entries, key, camera, false);
        }
    }

    Ok(entries)
}

fn insert(entries: &mut Vec<CameraEntry>, key: String, camera: CameraInfo, configured: bool) {
    let entry = CameraEntry {
        key,
        camera,
        configured,
    };
    match entries.iter_mut().find(|e| e.key == entry.key) {
        Some(existing) => *existing = entry,
        None => entries.push(entry),
    }
}

/// Resolve user input to a camera: a discovered key, or a bare device index
/// probed with `backend`.
pub fn resolve_camera(
    input: &str,
    entries: &[CameraEntry],
    backend: Backend,
) -> CaptureResult<CameraInfo> {
    if let Some(entry) = entries.iter().find(|e| e.key == input) {
        return Ok(entry.camera.clone());
    }

    let index: u32 = input
        .trim()
        .parse()
        .map_err(|_| CaptureError::CameraNotFound(input.to_string()))?;

    CameraInfo::probe(index, backend)?
        .ok_or_else(|| CaptureError::CameraNotFound(input.to_string()))
}
