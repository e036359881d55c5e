mod error;
mod screen_info;
mod xwd;

pub use error::*;
pub use screen_info::*;
pub use xwd::*;

use screen_capture::{
    OutputRegion, RawFramebufferReply, Rectangle, ScreenCaptureError, ScreenInfoError,
};

/// X11 backend. Every call shells out to `xrandr` or `xwd`, so cloning is free
/// and clones never share a connection.
#[derive(Debug, Clone, Default)]
pub struct ScreenCaptureX11 {
    display: Option<String>,
}

impl ScreenCaptureX11 {
    /// `display` overrides `$DISPLAY` when set (e.g., ":0").
    pub fn new(display: Option<String>) -> Self {
        Self { display }
    }
}

impl screen_capture::ScreenCapture for ScreenCaptureX11 {
    fn available_outputs(&mut self) -> Result<Vec<OutputRegion>, ScreenInfoError> {
        screen_info::available_outputs(self.display.as_deref())
    }

    fn capture_region(
        &mut self,
        region: &Rectangle,
    ) -> Result<RawFramebufferReply, ScreenCaptureError> {
        xwd::capture_region(self.display.as_deref(), region).map_err(|e| match e {
            Error::Unsupported(msg) => ScreenCaptureError::Unsupported(msg),
            Error::CommandNotFound(_) | Error::Command { .. } => {
                ScreenCaptureError::Command(e.to_string())
            }
            _ => ScreenCaptureError::Capture(e.to_string()),
        })
    }
}
