mod fifo_bridge;
mod ve_ffmpeg;

pub use fifo_bridge::*;
pub use ve_ffmpeg::*;

use std::path::PathBuf;

#[derive(thiserror::Error, Debug)]
pub enum EncoderError {
    #[error("Pipe setup failed: {0}")]
    PipeSetup(String),

    #[error("No frames to encode")]
    NoFrames,

    #[error("Encoder failed: {0}")]
    Consumer(String),

    #[error("Encoder was stopped before it finished")]
    ConsumerStopped,

    #[error("Encoder exited with {remaining} frames still unfed")]
    ConsumerExitedEarly { remaining: usize },

    #[error("Encoding was cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Render node lookup failed: {0}")]
    NoRenderNode(String),

    #[error("ffmpeg executable `{0}` was not found")]
    FfmpegNotFound(String),

    #[error("Image encoding failed: {0}")]
    ImageEncode(String),
}

pub type Result<T> = std::result::Result<T, EncoderError>;

/// Everything an encoder needs to turn one window of frames into a segment file.
#[derive(Debug, Clone)]
pub struct SegmentJob {
    /// Concat manifest listing the frame sources in playback order
    pub manifest: PathBuf,

    /// SRT file muxed as a subtitle stream
    pub subtitles: PathBuf,

    pub output: PathBuf,
    pub fps: u32,
}

/// The consuming side of a [`FifoBridge`] run.
///
/// `encode` blocks until the segment is written. Implementations must poll
/// `stop` and give up promptly once it is set.
pub trait SegmentEncoder {
    fn encode(&self, job: &SegmentJob, stop: &ConsumerStop) -> Result<()>;
}
