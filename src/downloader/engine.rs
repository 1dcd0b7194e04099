//! Streaming download engine

use crate::client::HttpClient;
use crate::downloader::progress::DownloadProgress;
use crate::utils::error::{BiliError, Result};
use futures::{Stream, StreamExt};
use reqwest::StatusCode;
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::Path;
use std::time::Instant;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tokio::sync::watch;
use tracing::{debug, warn};

/// The CDN rejects requests without a Bilibili referer
pub const DEFAULT_REFERER: &str = "https://www.bilibili.com";

/// Downloads one resource to one file
#[derive(Debug, Clone)]
pub struct DownloadEngine {
    client: HttpClient,
}

impl DownloadEngine {
    pub fn new(client: HttpClient) -> Self {
        Self { client }
    }

    /// Download `url` to `dest`, publishing progress after every chunk.
    ///
    /// Returns the number of bytes written. On failure the partial file is
    /// removed before the error is returned.
    pub async fn download(
        &self,
        url: &str,
        headers: &HashMap<String, String>,
        dest: &Path,
        progress: &watch::Sender<DownloadProgress>,
    ) -> Result<u64> {
        if let Some(dir) = dest.parent() {
            if !dir.as_os_str().is_empty() {
                tokio::fs::create_dir_all(dir).await?;
            }
        }

        let headers = merge_headers(headers);
        let (response, redirects) = self.client.open(url, &headers).await?;
        if !redirects.is_empty() {
            debug!("Download followed {} redirect(s)", redirects.len());
        }

        if response.status() != StatusCode::OK {
            return Err(BiliError::HttpStatus(response.status().as_u16()));
        }

        let total = response.content_length().unwrap_or(0);
        debug!("Downloading {} bytes to {}", total, dest.display());
        write_stream(response.bytes_stream(), dest, total, progress).await
    }
}

/// Referer default overlaid with the caller's headers (keys compared case-insensitively)
fn merge_headers(headers: &HashMap<String, String>) -> HashMap<String, String> {
    let mut merged = HashMap::new();
    merged.insert("referer".to_string(), DEFAULT_REFERER.to_string());
    for (name, value) in headers {
        merged.insert(name.to_ascii_lowercase(), value.clone());
    }
    merged
}

/// Drain `stream` into `dest`; the file is removed if anything goes wrong
pub async fn write_stream<S, B, E>(
    stream: S,
    dest: &Path,
    total: u64,
    progress: &watch::Sender<DownloadProgress>,
) -> Result<u64>
where
    S: Stream<Item = std::result::Result<B, E>>,
    B: AsRef<[u8]>,
    E: Into<BiliError>,
{
    let result = copy_to_file(stream, dest, total, progress).await;
    if let Err(e) = &result {
        warn!("Download to {} failed: {}", dest.display(), e);
        match tokio::fs::remove_file(dest).await {
            Ok(()) => debug!("Removed partial file {}", dest.display()),
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) => warn!("Failed to remove partial file {}: {}", dest.display(), err),
        }
    }
    result
}

async fn copy_to_file<S, B, E>(
    stream: S,
    dest: &Path,
    total: u64,
    progress: &watch::Sender<DownloadProgress>,
) -> Result<u64>
where
    S: Stream<Item = std::result::Result<B, E>>,
    B: AsRef<[u8]>,
    E: Into<BiliError>,
{
    let mut file = File::create(dest).await?;
    let mut state = DownloadProgress::new(total);
    progress.send_replace(state.clone());

    let start = Instant::now();
    let mut downloaded = 0u64;

    tokio::pin!(stream);
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| -> BiliError { e.into() })?;
        let bytes = chunk.as_ref();
        file.write_all(bytes).await?;
        downloaded += bytes.len() as u64;

        let elapsed = start.elapsed().as_secs_f64();
        let speed = if elapsed > 0.0 {
            downloaded as f64 / elapsed
        } else {
            0.0
        };
        state.update(downloaded, speed);
        progress.send_replace(state.clone());
    }

    file.flush().await?;
    Ok(downloaded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;
    use std::io;
    use tempfile::TempDir;

    #[test]
    fn test_referer_default_and_override() {
        let merged = merge_headers(&HashMap::new());
        assert_eq!(merged.get("referer").unwrap(), DEFAULT_REFERER);

        let mut custom = HashMap::new();
        custom.insert("Referer".to_string(), "https://example.com".to_string());
        let merged = merge_headers(&custom);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged.get("referer").unwrap(), "https://example.com");
    }

    #[tokio::test]
    async fn test_write_stream_reports_progress() {
        let temp_dir = TempDir::new().unwrap();
        let dest = temp_dir.path().join("payload.m4s");
        let (tx, rx) = watch::channel(DownloadProgress::default());

        let chunks: Vec<io::Result<Vec<u8>>> = vec![Ok(vec![1; 400]), Ok(vec![2; 600])];
        let written = write_stream(stream::iter(chunks), &dest, 1000, &tx)
            .await
            .unwrap();

        assert_eq!(written, 1000);
        assert_eq!(std::fs::read(&dest).unwrap().len(), 1000);
        let last = rx.borrow().clone();
        assert_eq!(last.downloaded_bytes, 1000);
        assert_eq!(last.percent(), 100);
    }

    #[tokio::test]
    async fn test_stream_error_removes_partial_file() {
        let temp_dir = TempDir::new().unwrap();
        let dest = temp_dir.path().join("partial.m4s");
        let (tx, _rx) = watch::channel(DownloadProgress::default());

        let chunks: Vec<io::Result<Vec<u8>>> = vec![
            Ok(vec![0xAB; 4096]),
            Err(io::Error::new(io::ErrorKind::ConnectionReset, "reset mid-transfer")),
            Ok(vec![0xCD; 4096]),
        ];
        let result = write_stream(stream::iter(chunks), &dest, 8192, &tx).await;

        assert!(matches!(result, Err(BiliError::Io(_))));
        assert!(!dest.exists(), "Partial file must be removed");
    }

    #[tokio::test]
    async fn test_unwritable_destination_fails_cleanly() {
        let temp_dir = TempDir::new().unwrap();
        // A directory where the file should go makes File::create fail
        let dest = temp_dir.path().join("occupied");
        std::fs::create_dir(&dest).unwrap();
        let (tx, _rx) = watch::channel(DownloadProgress::default());

        let chunks: Vec<io::Result<Vec<u8>>> = vec![Ok(vec![1, 2, 3])];
        let result = write_stream(stream::iter(chunks), &dest, 3, &tx).await;
        assert!(result.is_err());
        assert!(dest.is_dir(), "Existing directory must be left alone");
    }
}
