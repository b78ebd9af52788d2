//! Web interface: camera picker, capture API and scratch file serving

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::{
    extract::State,
    response::Html,
    routing::{get, post},
    Json, Router,
};
use capture::{discover_cameras, resolve_camera, Backend, CameraEntry};
use scratch_space::ScratchSpace;
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tower_http::validate_request::ValidateRequestHeaderLayer;
use tracing::{debug, info, warn};

use crate::config::{AppArgs, CameraOptions, Credentials};
use crate::error::{AppError, AppResult};
use crate::ops;

/// Accepted clip length range in seconds
pub const VIDEO_LENGTH_RANGE: std::ops::RangeInclusive<u64> = 1..=60;
const DEFAULT_VIDEO_LENGTH: u64 = 15;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    /// Cameras offered in the picker
    pub cameras: Arc<Vec<CameraEntry>>,
    /// Backend for cameras typed in by index
    pub backend: Backend,
    pub scratch: ScratchSpace,
    pub watermark: bool,
}

impl AppState {
    fn camera(&self, input: &str) -> AppResult<capture::CameraInfo> {
        Ok(resolve_camera(input, &self.cameras, self.backend)?)
    }
}

#[derive(Debug, Deserialize)]
pub struct ImageRequest {
    pub camera: String,
}

#[derive(Debug, Deserialize)]
pub struct VideoRequest {
    pub camera: String,
    #[serde(default = "default_video_length")]
    pub video_length: u64,
}

fn default_video_length() -> u64 {
    DEFAULT_VIDEO_LENGTH
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CaptureResponse {
    /// Where the captured file can be fetched
    pub url: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CameraView {
    pub key: String,
    pub index: u32,
    pub backend: String,
    pub frame_width: u32,
    pub frame_height: u32,
    pub fps: f64,
    pub configured: bool,
}

impl From<&CameraEntry> for CameraView {
    fn from(entry: &CameraEntry) -> Self {
        Self {
            key: entry.key.clone(),
            index: entry.camera.index,
            backend: entry.camera.backend.to_string(),
            frame_width: entry.camera.frame_width,
            frame_height: entry.camera.frame_height,
            fps: entry.camera.fps,
            configured: entry.configured,
        }
    }
}

/// Build the router. `files_dir` is served under `/files`.
pub fn router(state: AppState, files_dir: &Path, auth: Option<&Credentials>) -> Router {
    let app = Router::new()
        .route("/", get(index_handler))
        .route("/health", get(health_handler))
        .route("/api/cameras", get(cameras_handler))
        .route("/api/capture/image", post(capture_image_handler))
        .route("/api/capture/video", post(capture_video_handler))
        .nest_service("/files", ServeDir::new(files_dir))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state);

    match auth {
        #[allow(deprecated)]
        Some(credentials) => app.layer(ValidateRequestHeaderLayer::basic(
            &credentials.username,
            &credentials.password,
        )),
        None => app,
    }
}

/// Discover cameras, activate the scratch space and serve until shutdown.
///
/// The scratch directory lives exactly as long as the server.
pub async fn serve(options: &CameraOptions, args: AppArgs) -> anyhow::Result<()> {
    let cameras = discover_cameras(
        options.max_cameras,
        options.backend(),
        Some(&options.camera_config),
    )?;
    if cameras.is_empty() {
        anyhow::bail!("No cameras found with {} backend", options.backend());
    }
    info!("{} camera(s) available", cameras.len());

    let scratch = ScratchSpace::new(args.scratch_config());
    let guard = scratch
        .enter()
        .context("Failed to activate scratch space")?;
    let files_dir = guard
        .dir()
        .context("Scratch directory missing after activation")?;

    let state = AppState {
        cameras: Arc::new(cameras),
        backend: options.backend(),
        scratch: scratch.clone(),
        watermark: args.watermark.watermark,
    };
    if args.auth.is_some() {
        info!("Basic auth enabled");
    }
    let app = router(state, &files_dir, args.auth.as_ref());

    let listener = tokio::net::TcpListener::bind((args.host.as_str(), args.port)).await?;
    info!("Listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    drop(guard);
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}

/// Health check handler
async fn health_handler() -> &'static str {
    "OK"
}

async fn cameras_handler(State(state): State<AppState>) -> Json<Vec<CameraView>> {
    Json(state.cameras.iter().map(CameraView::from).collect())
}

async fn index_handler(State(state): State<AppState>) -> Html<String> {
    Html(render_index(&state.cameras))
}

async fn capture_image_handler(
    State(state): State<AppState>,
    Json(request): Json<ImageRequest>,
) -> AppResult<Json<CaptureResponse>> {
    let camera = state.camera(&request.camera)?;
    let path = state.scratch.request_file(None, Some(".jpg"))?;
    debug!("Image capture from {} into {}", camera.label(), path.display());

    let watermark = state.watermark;
    let output = path.clone();
    tokio::task::spawn_blocking(move || ops::capture_image(&output, &camera, watermark))
        .await
        .map_err(|e| AppError::Worker(e.to_string()))??;

    Ok(Json(file_response(&path)?))
}

async fn capture_video_handler(
    State(state): State<AppState>,
    Json(request): Json<VideoRequest>,
) -> AppResult<Json<CaptureResponse>> {
    if !VIDEO_LENGTH_RANGE.contains(&request.video_length) {
        return Err(AppError::BadRequest(format!(
            "video_length must be between {} and {} seconds",
            VIDEO_LENGTH_RANGE.start(),
            VIDEO_LENGTH_RANGE.end()
        )));
    }

    let camera = state.camera(&request.camera)?;
    let path = state.scratch.request_file(None, Some(".mp4"))?;
    debug!("Video capture from {} into {}", camera.label(), path.display());

    let watermark = state.watermark;
    let length = Duration::from_secs(request.video_length);
    let output = path.clone();
    tokio::task::spawn_blocking(move || ops::capture_video(&output, &camera, length, watermark))
        .await
        .map_err(|e| AppError::Worker(e.to_string()))??;

    Ok(Json(file_response(&path)?))
}

fn file_response(path: &Path) -> AppResult<CaptureResponse> {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| AppError::Worker(format!("Unservable path {}", path.display())))?;
    Ok(CaptureResponse {
        url: format!("/files/{}", name),
    })
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn render_index(cameras: &[CameraEntry]) -> String {
    let options: String = cameras
        .iter()
        .map(|entry| {
            let key = escape_html(&entry.key);
            format!("<option value=\"{key}\">{key}</option>")
        })
        .collect();

    INDEX_TEMPLATE
        .replace("{{options}}", &options)
        .replace("{{min_length}}", &VIDEO_LENGTH_RANGE.start().to_string())
        .replace("{{max_length}}", &VIDEO_LENGTH_RANGE.end().to_string())
        .replace("{{default_length}}", &DEFAULT_VIDEO_LENGTH.to_string())
}

const INDEX_TEMPLATE: &str = r#"<!doctype html>
<html>
<head>
<meta charset="utf-8">
<title>camsnap</title>
<style>
body { font-family: sans-serif; max-width: 960px; margin: 2em auto; }
section { margin-bottom: 2em; }
img, video { max-width: 100%; display: block; margin-top: 1em; }
#status { color: #a00; }
</style>
</head>
<body>
<h1>camsnap</h1>
<label>Camera
<input id="camera" list="cameras" placeholder="key or device index">
<datalist id="cameras">{{options}}</datalist>
</label>
<p id="status"></p>
<section>
<h2>Image</h2>
<button id="snap">Capture Image</button>
<img id="image" alt="">
</section>
<section>
<h2>Video</h2>
<label>Length (s)
<input id="length" type="number"
  min="{{min_length}}" max="{{max_length}}" value="{{default_length}}">
</label>
<button id="record">Capture Video</button>
<video id="video" autoplay muted controls playsinline></video>
</section>
<script>
const cameraInput = document.getElementById('camera');
const firstOption = document.querySelector('#cameras option');
if (firstOption) cameraInput.value = firstOption.value;
const status = document.getElementById('status');

async function capture(path, body) {
  status.textContent = '';
  const response = await fetch(path, {
    method: 'POST',
    headers: { 'Content-Type': 'application/json' },
    body: JSON.stringify(body),
  });
  const data = await response.json();
  if (!response.ok) {
    status.textContent = data.error || response.statusText;
    return null;
  }
  return data.url;
}

document.getElementById('snap').onclick = async () => {
  const url = await capture('/api/capture/image', { camera: cameraInput.value });
  if (url) document.getElementById('image').src = url;
};

document.getElementById('record').onclick = async () => {
  const length = parseInt(document.getElementById('length').value, 10);
  status.textContent = 'Recording...';
  const url = await capture('/api/capture/video', {
    camera: cameraInput.value,
    video_length: length,
  });
  if (url) {
    const video = document.getElementById('video');
    video.src = url;
    video.play();
  }
};
</script>
</body>
</html>
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use capture::CameraInfo;
    use scratch_space::ScratchConfig;
    use tower::ServiceExt;

    fn entries() -> Vec<CameraEntry> {
        let camera = CameraInfo {
            index: 0,
            backend: Backend::Synthetic,
            frame_width: 160,
            frame_height: 120,
            fps: 30.0,
        };
        vec![CameraEntry {
            key: "*front <door>".to_string(),
            camera,
            configured: true,
        }]
    }

    fn app(scratch: &ScratchSpace, auth: Option<&Credentials>) -> Router {
        let state = AppState {
            cameras: Arc::new(entries()),
            backend: Backend::Synthetic,
            scratch: scratch.clone(),
            watermark: true,
        };
        let files_dir = scratch.dir().unwrap_or_else(std::env::temp_dir);
        router(state, &files_dir, auth)
    }

    fn active_scratch() -> ScratchSpace {
        let scratch = ScratchSpace::new(ScratchConfig::default());
        scratch.activate().unwrap();
        scratch
    }

    fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::post(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_bytes(response: axum::response::Response) -> Vec<u8> {
        axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap()
            .to_vec()
    }

    #[tokio::test]
    async fn test_health() {
        let scratch = active_scratch();
        let response = app(&scratch, None)
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_bytes(response).await, b"OK");
    }

    #[tokio::test]
    async fn test_index_lists_escaped_camera_keys() {
        let scratch = active_scratch();
        let response = app(&scratch, None)
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let html = String::from_utf8(body_bytes(response).await).unwrap();
        assert!(html.contains("<option value=\"*front &lt;door&gt;\">"));
        assert!(html.contains("max=\"60\""));
        assert!(html.contains("<video id=\"video\" autoplay"));
    }

    #[tokio::test]
    async fn test_cameras_endpoint() {
        let scratch = active_scratch();
        let response = app(&scratch, None)
            .oneshot(Request::get("/api/cameras").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let cameras: Vec<CameraView> = serde_json::from_slice(&body_bytes(response).await).unwrap();
        assert_eq!(cameras.len(), 1);
        assert_eq!(cameras[0].key, "*front <door>");
        assert_eq!(cameras[0].backend, "synthetic");
        assert!(cameras[0].configured);
    }

    #[tokio::test]
    async fn test_capture_image_served_from_scratch() {
        let scratch = active_scratch();
        let app = app(&scratch, None);

        let response = app
            .clone()
            .oneshot(post_json(
                "/api/capture/image",
                serde_json::json!({ "camera": "*front <door>" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let captured: CaptureResponse =
            serde_json::from_slice(&body_bytes(response).await).unwrap();
        assert!(captured.url.starts_with("/files/tmp"));
        assert!(captured.url.ends_with(".jpg"));

        let response = app
            .oneshot(Request::get(captured.url.as_str()).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_bytes(response).await.starts_with(&[0xFF, 0xD8]));
    }

    #[tokio::test]
    async fn test_capture_by_device_index() {
        let scratch = active_scratch();
        let response = app(&scratch, None)
            .oneshot(post_json(
                "/api/capture/image",
                serde_json::json!({ "camera": "0" }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_unknown_camera_is_not_found() {
        let scratch = active_scratch();
        let response = app(&scratch, None)
            .oneshot(post_json(
                "/api/capture/image",
                serde_json::json!({ "camera": "back yard" }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body: serde_json::Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
        assert!(body["error"].as_str().unwrap().contains("back yard"));
    }

    #[tokio::test]
    async fn test_video_length_out_of_range() {
        let scratch = active_scratch();
        let app = app(&scratch, None);

        for length in [0, 61] {
            let response = app
                .clone()
                .oneshot(post_json(
                    "/api/capture/video",
                    serde_json::json!({ "camera": "*front <door>", "video_length": length }),
                ))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        }

        // Rejected before any scratch file is issued
        let dir = scratch.dir().unwrap();
        assert_eq!(std::fs::read_dir(dir).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_capture_video() {
        let scratch = active_scratch();
        let response = app(&scratch, None)
            .oneshot(post_json(
                "/api/capture/video",
                serde_json::json!({ "camera": "*front <door>", "video_length": 1 }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let captured: CaptureResponse =
            serde_json::from_slice(&body_bytes(response).await).unwrap();
        assert!(captured.url.ends_with(".mp4"));

        let response = app(&scratch, None)
            .oneshot(Request::get(captured.url.as_str()).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "video/mp4");
        let bytes = body_bytes(response).await;
        assert_eq!(&bytes[4..8], b"ftyp");
    }

    #[tokio::test]
    async fn test_inactive_scratch_is_unavailable() {
        let scratch = active_scratch();
        let app = app(&scratch, None);
        scratch.teardown();

        let response = app
            .oneshot(post_json(
                "/api/capture/image",
                serde_json::json!({ "camera": "*front <door>" }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_basic_auth_required_when_configured() {
        let scratch = active_scratch();
        let credentials: Credentials = "admin:secret".parse().unwrap();
        let app = app(&scratch, Some(&credentials));

        let response = app
            .clone()
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        // "admin:secret"
        let response = app
            .oneshot(
                Request::get("/health")
                    .header(header::AUTHORIZATION, "Basic YWRtaW46c2VjcmV0")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
