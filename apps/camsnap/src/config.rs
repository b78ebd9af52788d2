//! Command-line and environment configuration

use std::path::PathBuf;
use std::str::FromStr;

use capture::{Backend, DEFAULT_MAX_CAMERAS};
use clap::builder::BoolishValueParser;
use clap::{Args, Parser, Subcommand};
use scratch_space::ScratchConfig;

#[derive(Debug, Parser)]
#[command(name = "camsnap", version, about = "Snap stills and record clips from local cameras")]
pub struct Cli {
    #[command(flatten)]
    pub cameras: CameraOptions,

    #[command(subcommand)]
    pub command: Command,
}

/// Where cameras come from
#[derive(Debug, Clone, Args)]
pub struct CameraOptions {
    /// Backend used to scan and probe devices [default: native when built
    /// with it, synthetic otherwise]
    #[arg(long, env = "CAMSNAP_BACKEND", global = true)]
    pub backend: Option<Backend>,

    /// YAML list of preconfigured cameras
    #[arg(
        long,
        env = "CAMSNAP_CAMERA_CONFIG",
        global = true,
        default_value = "camsnap_cameras.yaml"
    )]
    pub camera_config: PathBuf,

    /// Number of device indices to scan
    #[arg(long, global = true, default_value_t = DEFAULT_MAX_CAMERAS)]
    pub max_cameras: u32,
}

impl CameraOptions {
    pub fn backend(&self) -> Backend {
        self.backend.unwrap_or_default()
    }

    /// Warning for when the test pattern stands in for real cameras
    /// without anyone asking for it
    pub fn fallback_warning(&self) -> Option<&'static str> {
        match (self.backend, self.backend()) {
            (None, Backend::Synthetic) => Some(
                "No camera backend selected and native support is not compiled in; \
                 serving the synthetic test pattern. Rebuild with `--features native` \
                 for real cameras or pass `--backend synthetic` to silence this",
            ),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Args)]
pub struct WatermarkArgs {
    /// Stamp the capture time into each frame
    #[arg(
        long,
        env = "CAMSNAP_WATERMARK",
        default_value = "true",
        action = clap::ArgAction::Set,
        value_parser = BoolishValueParser::new()
    )]
    pub watermark: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List available cameras
    Cameras,

    /// Capture a single still image (.jpg or .png)
    Image {
        /// Output file
        output: PathBuf,

        /// Camera key or device index
        #[arg(long, default_value = "0")]
        camera: String,

        #[command(flatten)]
        watermark: WatermarkArgs,
    },

    /// Record a video clip (.mp4)
    Video {
        /// Output file
        output: PathBuf,

        /// Camera key or device index
        #[arg(long, default_value = "0")]
        camera: String,

        /// Clip length in seconds
        #[arg(long, default_value_t = 15)]
        length: u64,

        #[command(flatten)]
        watermark: WatermarkArgs,
    },

    /// Serve the web interface
    App(AppArgs),
}

#[derive(Debug, Clone, Args)]
pub struct AppArgs {
    /// Address to bind
    #[arg(long, env = "CAMSNAP_HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Port to bind
    #[arg(long, env = "CAMSNAP_PORT", default_value_t = 7860)]
    pub port: u16,

    /// Require HTTP basic auth, given as user:password
    #[arg(long, env = "CAMSNAP_AUTH")]
    pub auth: Option<Credentials>,

    /// Seconds between scratch sweeps
    #[arg(long, env = "CAMSNAP_SWEEP_INTERVAL", default_value_t = 60)]
    pub sweep_interval: u64,

    /// Seconds a scratch file is kept before it may be reaped
    #[arg(long, env = "CAMSNAP_RETENTION", default_value_t = 600)]
    pub retention: u64,

    #[command(flatten)]
    pub watermark: WatermarkArgs,
}

impl AppArgs {
    pub fn scratch_config(&self) -> ScratchConfig {
        ScratchConfig::from_secs(self.sweep_interval, self.retention)
    }
}

/// Basic auth credentials
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl FromStr for Credentials {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once(':') {
            Some((username, password)) if !username.is_empty() => Ok(Self {
                username: username.to_string(),
                password: password.to_string(),
            }),
            _ => Err("expected user:password".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_app_defaults() {
        let cli = Cli::try_parse_from(["camsnap", "app"]).unwrap();
        let Command::App(args) = cli.command else {
            panic!("expected app subcommand");
        };

        assert_eq!(args.host, "127.0.0.1");
        assert_eq!(args.port, 7860);
        assert!(args.auth.is_none());
        assert_eq!(args.scratch_config(), ScratchConfig::default());
    }

    #[test]
    fn test_video_arguments() {
        let cli = Cli::try_parse_from([
            "camsnap",
            "video",
            "clip.mp4",
            "--camera",
            "1",
            "--length",
            "3",
            "--watermark",
            "no",
            "--backend",
            "synthetic",
        ])
        .unwrap();

        assert_eq!(cli.cameras.backend(), Backend::Synthetic);
        assert!(cli.cameras.fallback_warning().is_none());
        let Command::Video {
            output,
            camera,
            length,
            watermark,
        } = cli.command
        else {
            panic!("expected video subcommand");
        };
        assert_eq!(output, PathBuf::from("clip.mp4"));
        assert_eq!(camera, "1");
        assert_eq!(length, 3);
        assert!(!watermark.watermark);
    }

    #[test]
    fn test_implicit_synthetic_backend_warns() {
        let cli = Cli::try_parse_from(["camsnap", "cameras"]).unwrap();

        assert!(cli.cameras.backend.is_none());
        assert_eq!(cli.cameras.backend(), Backend::default());
        assert_eq!(
            cli.cameras.fallback_warning().is_some(),
            !cfg!(feature = "native")
        );
    }

    #[test]
    fn test_unknown_backend_rejected() {
        assert!(Cli::try_parse_from(["camsnap", "--backend", "CAP_ANY", "cameras"]).is_err());
    }

    #[test]
    fn test_credentials_parsing() {
        let creds: Credentials = "admin:s3cr:et".parse().unwrap();
        assert_eq!(creds.username, "admin");
        assert_eq!(creds.password, "s3cr:et");

        assert!("nocolon".parse::<Credentials>().is_err());
        assert!(":pw".parse::<Credentials>().is_err());
    }
}
