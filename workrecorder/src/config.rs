use anyhow::{Context, Result};
use clap::Parser;
use derivative::Derivative;
use recorder::RecorderConfig;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};
use video_encoder::FfmpegConfig;

/// Periodic per-output screen recorder for X11.
#[derive(Parser, Debug, Default)]
#[command(version, about)]
pub struct Cli {
    /// TOML configuration file. Command line flags override its values.
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[arg(long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Directory for per-window scratch files, preferably memory backed
    #[arg(long, value_name = "DIR")]
    pub scratch_dir: Option<PathBuf>,

    /// Segment length in minutes, must divide an hour
    #[arg(long)]
    pub period_minutes: Option<u32>,

    #[arg(long)]
    pub interval_secs: Option<u64>,

    #[arg(long)]
    pub fps: Option<u32>,

    /// VAAPI render node, detected under /dev/dri when omitted
    #[arg(long, value_name = "PATH")]
    pub vaapi_device: Option<PathBuf>,

    /// Encode in software
    #[arg(long)]
    pub no_hwaccel: bool,

    /// X display, defaults to $DISPLAY
    #[arg(long)]
    pub display: Option<String>,

    /// Only record the named output. Can be repeated.
    #[arg(long = "only", value_name = "NAME")]
    pub only: Vec<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub recorder: Recorder,
    pub encoder: Encoder,
    pub capture: Capture,
}

#[derive(Serialize, Deserialize, Debug, Clone, Derivative)]
#[derivative(Default)]
#[serde(default)]
pub struct Recorder {
    #[derivative(Default(value = "PathBuf::from(\"/output\")"))]
    pub output_dir: PathBuf,

    #[derivative(Default(value = "PathBuf::from(\"/dev/shm\")"))]
    pub scratch_dir: PathBuf,

    #[derivative(Default(value = "15"))]
    pub period_minutes: u32,

    #[derivative(Default(value = "5"))]
    pub interval_secs: u64,

    #[derivative(Default(value = "2"))]
    pub fps: u32,

    #[derivative(Default(value = "\"mkv\".to_string()"))]
    pub video_ext: String,

    #[derivative(Default(value = "\"%H:%M:%S\".to_string()"))]
    pub caption_format: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, Derivative)]
#[derivative(Default)]
#[serde(default)]
pub struct Encoder {
    #[derivative(Default(value = "PathBuf::from(\"ffmpeg\")"))]
    pub ffmpeg_path: PathBuf,

    #[derivative(Default(value = "true"))]
    pub hwaccel: bool,

    pub vaapi_device: Option<PathBuf>,
    pub codec: Option<String>,

    #[derivative(Default(value = "24"))]
    pub qp: u32,

    #[derivative(Default(value = "\"error\".to_string()"))]
    pub log_level: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct Capture {
    pub display: Option<String>,
    pub only: Vec<String>,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("read config {} failed", path.display()))?;

        toml::from_str(&text).with_context(|| format!("parse config {} failed", path.display()))
    }

    /// The config file named by `cli` (or the defaults) with the flags applied on top.
    pub fn from_cli(cli: Cli) -> Result<Self> {
        let mut config = match &cli.config {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };
        config.merge(cli);
        Ok(config)
    }

    pub fn merge(&mut self, cli: Cli) {
        let recorder = &mut self.recorder;
        if let Some(dir) = cli.output_dir {
            recorder.output_dir = dir;
        }
        if let Some(dir) = cli.scratch_dir {
            recorder.scratch_dir = dir;
        }
        if let Some(minutes) = cli.period_minutes {
            recorder.period_minutes = minutes;
        }
        if let Some(secs) = cli.interval_secs {
            recorder.interval_secs = secs;
        }
        if let Some(fps) = cli.fps {
            recorder.fps = fps;
        }

        if cli.no_hwaccel {
            self.encoder.hwaccel = false;
        }
        if cli.vaapi_device.is_some() {
            self.encoder.vaapi_device = cli.vaapi_device;
        }

        if cli.display.is_some() {
            self.capture.display = cli.display;
        }
        if !cli.only.is_empty() {
            self.capture.only = cli.only;
        }
    }

    pub fn recorder_config(&self) -> RecorderConfig {
        RecorderConfig::default()
            .with_output_dir(self.recorder.output_dir.clone())
            .with_scratch_dir(self.recorder.scratch_dir.clone())
            .with_period_minutes(self.recorder.period_minutes)
            .with_interval(Duration::from_secs(self.recorder.interval_secs))
            .with_fps(self.recorder.fps)
            .with_video_ext(self.recorder.video_ext.clone())
            .with_caption_format(self.recorder.caption_format.clone())
    }

    pub fn ffmpeg_config(&self, vaapi_device: Option<PathBuf>) -> FfmpegConfig {
        let mut config = FfmpegConfig::default()
            .with_ffmpeg_path(self.encoder.ffmpeg_path.clone())
            .with_qp(self.encoder.qp)
            .with_log_level(self.encoder.log_level.clone());

        if let Some(device) = vaapi_device {
            config = config.with_vaapi_device(device);
        }
        if let Some(codec) = &self.encoder.codec {
            config = config.with_codec(codec.clone());
        }

        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_recorder() {
        let config = Config::default().recorder_config();
        let defaults = RecorderConfig::default();

        assert_eq!(config.output_dir, defaults.output_dir);
        assert_eq!(config.scratch_dir, defaults.scratch_dir);
        assert_eq!(config.period_minutes, defaults.period_minutes);
        assert_eq!(config.interval, defaults.interval);
        assert_eq!(config.fps, defaults.fps);
        assert_eq!(config.video_ext, defaults.video_ext);
        assert!(Config::default().encoder.hwaccel);
    }

    #[test]
    fn test_partial_toml() {
        let config: Config = toml::from_str(
            r#"
            [recorder]
            period_minutes = 5
            output_dir = "/srv/recordings"

            [encoder]
            hwaccel = false
            codec = "libx264"

            [capture]
            only = ["DP-1"]
            "#,
        )
        .unwrap();

        assert_eq!(config.recorder.period_minutes, 5);
        assert_eq!(config.recorder.output_dir, PathBuf::from("/srv/recordings"));
        assert_eq!(config.recorder.interval_secs, 5);
        assert!(!config.encoder.hwaccel);
        assert_eq!(config.encoder.qp, 24);
        assert_eq!(config.capture.only, vec!["DP-1".to_string()]);
    }

    #[test]
    fn test_cli_overrides_file() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("workrecorder.toml");
        fs::write(&path, "[recorder]\nfps = 4\nperiod_minutes = 10\n")?;

        let cli = Cli::parse_from([
            "workrecorder",
            "--config",
            path.to_str().unwrap(),
            "--period-minutes",
            "30",
            "--no-hwaccel",
            "--only",
            "DP-1",
            "--only",
            "HDMI-1",
        ]);
        let config = Config::from_cli(cli)?;

        assert_eq!(config.recorder.fps, 4);
        assert_eq!(config.recorder.period_minutes, 30);
        assert!(!config.encoder.hwaccel);
        assert_eq!(config.capture.only, vec!["DP-1", "HDMI-1"]);
        Ok(())
    }

    #[test]
    fn test_missing_config_file() {
        assert!(Config::load(&PathBuf::from("/nonexistent/workrecorder.toml")).is_err());
    }

    #[test]
    fn test_ffmpeg_config() {
        let mut config = Config::default();
        config.encoder.codec = Some("h264_vaapi".to_string());

        let ffmpeg = config.ffmpeg_config(Some(PathBuf::from("/dev/dri/renderD128")));
        assert_eq!(ffmpeg.vaapi_device, Some(PathBuf::from("/dev/dri/renderD128")));
        assert_eq!(ffmpeg.codec.as_deref(), Some("h264_vaapi"));
        assert!(config.ffmpeg_config(None).vaapi_device.is_none());
    }
}
