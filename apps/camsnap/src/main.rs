//! camsnap
//!
//! Snap stills and record clips from local cameras, from the command line or
//! through a small web app whose captures live in a self-cleaning scratch
//! directory.

mod config;
mod error;
mod ops;
mod web;

use std::time::Duration;

use capture::discover_cameras;
use clap::Parser;
use tracing::{info, warn};

use crate::config::{Cli, Command};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("camsnap=debug".parse()?)
                .add_directive("scratch_space=info".parse()?)
                .add_directive("tower_http=debug".parse()?),
        )
        .init();

    let cli = Cli::parse();
    let options = cli.cameras;
    if let Some(warning) = options.fallback_warning() {
        warn!("{}", warning);
    }

    match cli.command {
        Command::Cameras => {
            let entries = discover_cameras(
                options.max_cameras,
                options.backend(),
                Some(&options.camera_config),
            )?;
            if entries.is_empty() {
                info!("No cameras found with {} backend", options.backend());
            }
            for entry in entries {
                println!("{}", entry.key);
            }
        }
        Command::Image {
            output,
            camera,
            watermark,
        } => {
            let camera = ops::select_camera(&camera, &options)?;
            let path = tokio::task::spawn_blocking(move || {
                ops::capture_image(&output, &camera, watermark.watermark)
            })
            .await??;
            println!("{}", path.display());
        }
        Command::Video {
            output,
            camera,
            length,
            watermark,
        } => {
            let camera = ops::select_camera(&camera, &options)?;
            let length = Duration::from_secs(length);
            let summary = tokio::task::spawn_blocking(move || {
                ops::capture_video(&output, &camera, length, watermark.watermark)
            })
            .await??;
            info!(
                "Recorded {} frames ({} keyframes, {} skipped, {} bytes)",
                summary.frames, summary.keyframes, summary.skipped, summary.bytes
            );
        }
        Command::App(args) => {
            info!("Starting camsnap web app");
            web::serve(&options, args).await?;
        }
    }

    Ok(())
}
