//! Utility modules for error handling, configuration and file layout

pub mod config;
pub mod error;
pub mod format;
pub mod paths;

// Re-export for convenience
pub use config::AppSettings;
pub use error::{BiliError, Result};
pub use format::format_duration;
pub use paths::{sanitize_filename, TaskPaths};
