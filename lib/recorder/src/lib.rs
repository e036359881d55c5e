//! # Workrecorder Recorder Library
//!
//! Periodic screenshot recording. Every output gets its own thread that wakes
//! on fixed wall-clock ticks, captures the output, and streams the frames
//! through two alternating FIFOs into an encoder. When a period ends, the
//! segment (with a subtitle track carrying each frame's capture time) is moved
//! into `{output_dir}/{output}/{date}/{time}.{ext}`.
//!
//! ## Modules
//!
//! - [`schedule`]: Tick computation and cancellable sleeping
//! - [`recorder`]: Per-output recording loop
//! - [`supervisor`]: Runs all outputs and stops them on the first failure
//! - [`recorder_config`]: Configuration and output paths
//! - [`recorder_error`]: Error types

pub mod recorder;
pub mod recorder_config;
pub mod recorder_error;
pub mod schedule;
pub mod supervisor;

pub use recorder::*;
pub use recorder_config::*;
pub use recorder_error::*;
pub use schedule::*;
pub use supervisor::*;
