use thiserror::Error;

/// Error types for recording operations.
///
/// Every variant ends the recording loop of the output it happened on. The
/// supervisor then cancels the remaining outputs.
#[derive(Error, Debug)]
pub enum RecorderError {
    #[error("Setup failed: {0}")]
    Setup(String),

    #[error("Framebuffer decoding failed: {0}")]
    Decode(#[from] screen_capture::DecodeError),

    #[error("Screenshot capture failed: {0}")]
    Capture(#[from] screen_capture::ScreenCaptureError),

    #[error("Screen info failed: {0}")]
    ScreenInfo(#[from] screen_capture::ScreenInfoError),

    #[error("Video encoding failed: {0}")]
    Encoder(#[from] video_encoder::EncoderError),

    #[error("Subtitle writing failed: {0}")]
    Subtitle(#[from] video_utils::Error),

    #[error("Finalizing segment failed: {0}")]
    Finalize(String),

    #[error("Invalid configuration parameters: {0}")]
    InvalidConfig(String),

    #[error("No outputs to record")]
    NoOutputs,

    #[error("Recording was cancelled")]
    Cancelled,
}

impl RecorderError {
    /// Whether the error only reports that a stop was requested.
    pub fn is_cancellation(&self) -> bool {
        matches!(
            self,
            RecorderError::Cancelled
                | RecorderError::Encoder(video_encoder::EncoderError::Cancelled)
                | RecorderError::Encoder(video_encoder::EncoderError::ConsumerStopped)
        )
    }
}
