use crate::{ConsumerStop, EncoderError, Result, SegmentEncoder, SegmentJob};
use derive_setters::Setters;
use std::{
    ffi::{OsStr, OsString},
    fs,
    path::{Path, PathBuf},
    thread,
    time::Duration,
};

const POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Clone, Debug, Setters)]
#[setters(prefix = "with_")]
pub struct FfmpegConfig {
    pub ffmpeg_path: PathBuf,

    /// VAAPI render node (e.g. "/dev/dri/renderD128"). Software encoding is used when unset.
    #[setters(strip_option)]
    pub vaapi_device: Option<PathBuf>,

    /// Overrides the mode's default codec (`hevc_vaapi` or `libx265`)
    #[setters(strip_option)]
    pub codec: Option<String>,

    /// `-qp` for hardware encoding, `-crf` for software encoding
    pub qp: u32,

    pub log_level: String,
}

impl Default for FfmpegConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: PathBuf::from("ffmpeg"),
            vaapi_device: None,
            codec: None,
            qp: 24,
            log_level: "error".to_string(),
        }
    }
}

/// Runs one `ffmpeg` process per segment, reading frames through the concat demuxer.
#[derive(Clone, Debug)]
pub struct FfmpegEncoder {
    config: FfmpegConfig,
}

impl FfmpegEncoder {
    pub fn new(config: FfmpegConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &FfmpegConfig {
        &self.config
    }

    pub fn args(&self, job: &SegmentJob) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "-hide_banner".into(),
            "-loglevel".into(),
            self.config.log_level.clone().into(),
            "-y".into(),
        ];

        if let Some(device) = &self.config.vaapi_device {
            args.extend(["-vaapi_device".into(), device.clone().into_os_string()]);
        }

        args.extend([
            "-r".into(),
            format!("{}/1", job.fps).into(),
            "-f".into(),
            "concat".into(),
            // absolute paths in the manifest
            "-safe".into(),
            "0".into(),
            "-i".into(),
            job.manifest.clone().into_os_string(),
            "-i".into(),
            job.subtitles.clone().into_os_string(),
        ]);

        let qp = self.config.qp.to_string();
        match self.config.vaapi_device {
            Some(_) => args.extend([
                "-vf".into(),
                "format=nv12,hwupload,scale_vaapi=".into(),
                "-c:v".into(),
                self.codec_or("hevc_vaapi"),
                "-qp".into(),
                qp.into(),
            ]),
            None => args.extend([
                "-vf".into(),
                "format=yuv420p".into(),
                "-c:v".into(),
                self.codec_or("libx265"),
                "-crf".into(),
                qp.into(),
            ]),
        }

        args.push(job.output.clone().into_os_string());
        args
    }

    fn codec_or(&self, default: &str) -> OsString {
        self.config
            .codec
            .clone()
            .unwrap_or_else(|| default.to_string())
            .into()
    }
}

impl SegmentEncoder for FfmpegEncoder {
    fn encode(&self, job: &SegmentJob, stop: &ConsumerStop) -> Result<()> {
        let args = self.args(job);
        log::debug!("{} {:?}", self.config.ffmpeg_path.display(), args);

        let handle = duct::cmd(self.config.ffmpeg_path.clone(), args)
            .stdout_null()
            .stderr_capture()
            .unchecked()
            .start()
            .map_err(|e| {
                EncoderError::Consumer(format!(
                    "start {} failed: {e}",
                    self.config.ffmpeg_path.display()
                ))
            })?;

        loop {
            if stop.is_stopped() {
                if let Err(e) = handle.kill() {
                    log::warn!("kill ffmpeg failed: {e}");
                }
                return Err(EncoderError::ConsumerStopped);
            }

            if let Some(output) = handle.try_wait()? {
                if output.status.success() {
                    return Ok(());
                }

                return Err(EncoderError::Consumer(format!(
                    "ffmpeg {}: {}",
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                )));
            }

            thread::sleep(POLL_INTERVAL);
        }
    }
}

pub fn is_ffmpeg_installed(ffmpeg_path: impl AsRef<OsStr>) -> bool {
    which::which(ffmpeg_path).is_ok()
}

/// The single DRM render node under `dir` (normally "/dev/dri").
///
/// More than one node is an error since there is no way to tell which GPU to use.
pub fn find_render_node(dir: impl AsRef<Path>) -> Result<PathBuf> {
    let dir = dir.as_ref();
    let entries = fs::read_dir(dir)
        .map_err(|e| EncoderError::NoRenderNode(format!("read {} failed: {e}", dir.display())))?;

    let mut nodes = entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_name().to_string_lossy().starts_with("renderD"))
        .map(|entry| entry.path())
        .collect::<Vec<_>>();

    match nodes.len() {
        1 => Ok(nodes.remove(0)),
        n => Err(EncoderError::NoRenderNode(format!(
            "expected exactly one render node in {}, found {n}",
            dir.display()
        ))),
    }
}
