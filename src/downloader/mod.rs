//! Download engine module

pub mod engine;
pub mod merger;
pub mod progress;

// Re-export for convenience
pub use engine::DownloadEngine;
pub use merger::{cleanup_files, FfmpegMuxer, Muxer};
pub use progress::{DownloadProgress, Payload};
