//! Error handling for bililoader

use thiserror::Error;

/// Main error type for bililoader
#[derive(Debug, Error)]
pub enum BiliError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("HTTP {0}")]
    HttpStatus(u16),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Unsupported URL: {0}")]
    UnsupportedUrl(String),

    #[error("No stream data: {0}")]
    NoStreamData(String),

    #[error("Too many redirects starting at {0}")]
    TooManyRedirects(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Invalid header: {0}")]
    InvalidHeader(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Mux failed: {0}")]
    Mux(String),

    #[error("ffmpeg not found. Please install ffmpeg or set its path")]
    MuxerNotFound,

    #[error("Task not found: {0}")]
    TaskNotFound(String),
}

impl From<url::ParseError> for BiliError {
    fn from(e: url::ParseError) -> Self {
        BiliError::InvalidUrl(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, BiliError>;
