//! Download module.
//!
//! This module provides:
//! - The download pipeline turning posts into saved images
//! - Per-URL outcomes and run counters

pub mod pipeline;
pub mod state;

pub use pipeline::{Downloader, SizeLimits};
pub use state::{DownloadCounts, ImageOutcome};
