//! Bililoader library

pub mod client;
pub mod downloader;
pub mod extractor;
pub mod queue;
pub mod utils;

// Re-export main types for easier use
pub use client::HttpClient;
pub use downloader::{DownloadEngine, DownloadProgress, FfmpegMuxer, Muxer};
pub use extractor::{BiliApi, MediaDescriptor, PageResolver, StreamSelector, UrlKind};
pub use queue::{DownloadTask, TaskEvent, TaskOrchestrator, TaskStatus};
pub use utils::{AppSettings, BiliError};
