//! Muxing of separately downloaded audio and video, and temp file cleanup

use crate::utils::error::{BiliError, Result};
use async_trait::async_trait;
use std::ffi::OsString;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Combines one video and one audio file into a single container
#[async_trait]
pub trait Muxer: Send + Sync {
    async fn mux(&self, video: &Path, audio: &Path, output: &Path) -> Result<()>;
}

/// Stream-copy mux through an `ffmpeg` binary
#[derive(Debug, Clone, Default)]
pub struct FfmpegMuxer {
    configured: Option<PathBuf>,
}

impl FfmpegMuxer {
    /// Use `configured` when given, otherwise look `ffmpeg` up on PATH at mux time
    pub fn new(configured: Option<PathBuf>) -> Self {
        Self { configured }
    }

    pub fn binary(&self) -> Result<PathBuf> {
        if let Some(path) = &self.configured {
            return Ok(path.clone());
        }
        which::which("ffmpeg").map_err(|_| BiliError::MuxerNotFound)
    }

    /// `-i video -i audio -c copy -y output`
    pub fn args(video: &Path, audio: &Path, output: &Path) -> Vec<OsString> {
        vec![
            "-i".into(),
            video.into(),
            "-i".into(),
            audio.into(),
            "-c".into(),
            "copy".into(),
            "-y".into(),
            output.into(),
        ]
    }
}

#[async_trait]
impl Muxer for FfmpegMuxer {
    async fn mux(&self, video: &Path, audio: &Path, output: &Path) -> Result<()> {
        let ffmpeg = self.binary()?;
        debug!("Muxing {} + {} with {}", video.display(), audio.display(), ffmpeg.display());

        let result = Command::new(&ffmpeg)
            .args(Self::args(video, audio, output))
            .stdin(Stdio::null())
            .output()
            .await;

        let out = match result {
            Ok(out) => out,
            Err(e) if e.kind() == ErrorKind::NotFound => return Err(BiliError::MuxerNotFound),
            Err(e) => return Err(e.into()),
        };

        if !out.status.success() {
            let stderr = String::from_utf8_lossy(&out.stderr);
            let tail: String = stderr
                .lines()
                .rev()
                .take(3)
                .collect::<Vec<_>>()
                .into_iter()
                .rev()
                .collect::<Vec<_>>()
                .join("\n");
            return Err(BiliError::Mux(format!(
                "ffmpeg exited with {}: {}",
                out.status, tail
            )));
        }

        info!("Muxed {}", output.display());
        Ok(())
    }
}

/// Remove temporary files; failures are logged and otherwise ignored
pub async fn cleanup_files(paths: &[PathBuf]) {
    for path in paths {
        match tokio::fs::remove_file(path).await {
            Ok(()) => debug!("Removed temp file: {}", path.display()),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove temp file {}: {}", path.display(), e),
        }
    }
}
