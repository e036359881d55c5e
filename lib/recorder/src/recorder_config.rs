use crate::RecorderError;
use chrono::{
    DateTime, TimeDelta, Utc,
    format::{Item, StrftimeItems},
};
use derive_setters::Setters;
use std::{
    path::{Path, PathBuf},
    time::Duration,
};

#[derive(Debug, Clone, Setters)]
#[setters(prefix = "with_")]
pub struct RecorderConfig {
    /// Root of the permanent `{output}/{date}/{time}.{ext}` tree
    pub output_dir: PathBuf,

    /// Where per-window scratch directories live. Should be memory backed.
    pub scratch_dir: PathBuf,

    /// Segment length. Must divide an hour so segments align to it.
    pub period_minutes: u32,

    /// Wall time between two captures
    pub interval: Duration,

    /// Playback rate of the segment; one capture is one frame
    pub fps: u32,

    /// Container extension, also picks the muxer
    pub video_ext: String,

    /// `strftime` format of the per-frame caption (UTC)
    pub caption_format: String,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("/output"),
            scratch_dir: PathBuf::from("/dev/shm"),
            period_minutes: 15,
            interval: Duration::from_secs(5),
            fps: 2,
            video_ext: "mkv".to_string(),
            caption_format: "%H:%M:%S".to_string(),
        }
    }
}

impl RecorderConfig {
    pub fn validate(&self) -> Result<(), RecorderError> {
        if self.period_minutes == 0 || self.period_minutes > 60 || 60 % self.period_minutes != 0 {
            return Err(RecorderError::InvalidConfig(format!(
                "period of {} minutes does not divide an hour",
                self.period_minutes
            )));
        }

        if self.interval < Duration::from_secs(1) {
            return Err(RecorderError::InvalidConfig(format!(
                "capture interval {:?} is shorter than a second",
                self.interval
            )));
        }

        if self.interval > Duration::from_secs(self.period_minutes as u64 * 60) {
            return Err(RecorderError::InvalidConfig(format!(
                "capture interval {:?} is longer than the {} minute period",
                self.interval, self.period_minutes
            )));
        }

        if self.fps == 0 {
            return Err(RecorderError::InvalidConfig("fps must be at least 1".to_string()));
        }

        if self.video_ext.is_empty() || self.video_ext.contains(['/', '.']) {
            return Err(RecorderError::InvalidConfig(format!(
                "invalid video extension `{}`",
                self.video_ext
            )));
        }

        if StrftimeItems::new(&self.caption_format).any(|item| matches!(item, Item::Error)) {
            return Err(RecorderError::InvalidConfig(format!(
                "invalid caption format `{}`",
                self.caption_format
            )));
        }

        Ok(())
    }

    pub fn interval_delta(&self) -> Result<TimeDelta, RecorderError> {
        TimeDelta::from_std(self.interval)
            .map_err(|e| RecorderError::InvalidConfig(format!("capture interval: {e}")))
    }

    /// `{output_dir}/{output_id}/{YYYY-MM-DD}/{HH-MM-SS}.{ext}` for a segment starting at `first_tick`.
    pub fn segment_path(&self, output_id: &str, first_tick: DateTime<Utc>) -> PathBuf {
        self.output_dir
            .join(output_id)
            .join(first_tick.format("%Y-%m-%d").to_string())
            .join(format!("{}.{}", first_tick.format("%H-%M-%S"), self.video_ext))
    }

    pub fn scratch_output(&self, scratch: &Path) -> PathBuf {
        scratch.join(format!("capture.{}", self.video_ext))
    }
}
