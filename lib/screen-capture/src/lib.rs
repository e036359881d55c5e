mod capture;
mod framebuffer;
mod pixel_buffer;
mod screen_info;

pub use capture::*;
pub use framebuffer::*;
pub use pixel_buffer::*;
pub use screen_info::*;

#[derive(thiserror::Error, Debug)]
pub enum ScreenCaptureError {
    #[error("{0}")]
    Capture(String),

    #[error("{0}")]
    Command(String),

    #[error("unsupported capture: {0}")]
    Unsupported(String),
}

/// Display-server collaborator used by the recorder.
///
/// One implementation is cloned per recorded output, so every recording
/// thread owns its own connection state.
pub trait ScreenCapture {
    /// Connected outputs with their capture rectangles inside the root surface.
    fn available_outputs(&mut self) -> Result<Vec<OutputRegion>, ScreenInfoError>;

    /// Grab the current contents of `region` as an undecoded framebuffer reply.
    fn capture_region(
        &mut self,
        region: &Rectangle,
    ) -> Result<RawFramebufferReply, ScreenCaptureError>;
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rectangle {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Rectangle {
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Whether `self` lies completely inside a `width`x`height` surface anchored at the origin.
    pub fn fits_within(&self, width: u32, height: u32) -> bool {
        self.x >= 0
            && self.y >= 0
            && self.x as u64 + self.width as u64 <= width as u64
            && self.y as u64 + self.height as u64 <= height as u64
    }
}

impl std::fmt::Display for Rectangle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}+{}+{}", self.width, self.height, self.x, self.y)
    }
}
