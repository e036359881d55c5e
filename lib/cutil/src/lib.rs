//! # CUtil - Common Utilities Library
//!
//! Small helpers shared by the workspace crates.
//!
//! ## Features
//!
//! - `fs`: File system utilities (moving finished files into place)
//! - `time`: Time formatting utilities

#[cfg(feature = "fs")]
pub mod fs;

#[cfg(feature = "time")]
pub mod time;
