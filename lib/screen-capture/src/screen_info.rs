use crate::Rectangle;

#[derive(thiserror::Error, Debug)]
pub enum ScreenInfoError {
    #[error("{0}")]
    Command(String),

    #[error("{0}")]
    Other(String),
}

/// One connected display output and where it lives inside the root surface.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutputRegion {
    /// Name of the output (e.g., "eDP-1", "HDMI-1"). Used as the output directory name.
    pub name: String,

    /// Capture rectangle in root surface coordinates
    pub region: Rectangle,
}

impl OutputRegion {
    pub fn new(name: impl Into<String>, region: Rectangle) -> Self {
        Self {
            name: name.into(),
            region,
        }
    }
}
