#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("`{0}` was not found in PATH")]
    CommandNotFound(String),

    #[error("run `{cmd}` failed: {msg}")]
    Command { cmd: String, msg: String },

    #[error("malformed xwd dump: {0}")]
    Malformed(String),

    #[error("region {region} lies outside the {width}x{height} root window")]
    OutOfBounds {
        region: screen_capture::Rectangle,
        width: u32,
        height: u32,
    },

    #[error("{0}")]
    Unsupported(String),

    #[error("IO error: {0}")]
    IO(#[from] std::io::Error),
}
