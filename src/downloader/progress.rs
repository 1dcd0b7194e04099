//! Progress tracking for downloads

use std::time::Duration;

/// Overall task progress once both payloads are on disk
pub const MERGE_PROGRESS: u8 = 90;
/// Overall task progress when finished
pub const DONE_PROGRESS: u8 = 100;

/// Byte-level progress of a single transfer
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DownloadProgress {
    /// 0 when the server did not send a content length
    pub total_bytes: u64,
    pub downloaded_bytes: u64,
    pub speed: f64, // bytes per second
    pub eta: Option<Duration>,
}

impl DownloadProgress {
    pub fn new(total_bytes: u64) -> Self {
        Self {
            total_bytes,
            ..Default::default()
        }
    }

    /// Update progress with new data
    pub fn update(&mut self, downloaded_bytes: u64, speed: f64) {
        self.downloaded_bytes = downloaded_bytes;
        self.speed = speed;

        if self.total_bytes == 0 {
            self.eta = None;
        } else if self.downloaded_bytes >= self.total_bytes {
            self.eta = Some(Duration::from_secs(0));
        } else if speed > 0.0 {
            let remaining = self.total_bytes - self.downloaded_bytes;
            self.eta = Some(Duration::from_secs_f64((remaining as f64) / speed));
        } else {
            self.eta = None;
        }
    }

    pub fn is_size_known(&self) -> bool {
        self.total_bytes > 0
    }

    /// Whole percent, 0 when the size is unknown
    pub fn percent(&self) -> u8 {
        if self.total_bytes == 0 {
            return 0;
        }
        let done = self.downloaded_bytes.min(self.total_bytes);
        (done * 100 / self.total_bytes) as u8
    }
}

/// Which of a task's two payloads a transfer carries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Payload {
    Video,
    Audio,
}

impl Payload {
    /// (start, width) of this payload's slice of overall task progress
    fn span(self) -> (u64, u64) {
        match self {
            Payload::Video => (0, 50),
            Payload::Audio => (50, 40),
        }
    }

    /// Rescale a transfer's progress into overall task progress.
    ///
    /// Video covers 0–50 and audio 50–90; merging owns the rest.
    pub fn overall(self, progress: &DownloadProgress) -> u8 {
        let (start, width) = self.span();
        if progress.total_bytes == 0 {
            return start as u8;
        }
        let done = progress.downloaded_bytes.min(progress.total_bytes);
        (start + done * width / progress.total_bytes) as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(downloaded: u64, total: u64) -> DownloadProgress {
        let mut p = DownloadProgress::new(total);
        p.update(downloaded, 0.0);
        p
    }

    #[test]
    fn test_progress_update_basic() {
        let mut progress = DownloadProgress::new(1000);
        progress.update(500, 100.0);

        assert_eq!(progress.downloaded_bytes, 500);
        assert_eq!(
            progress.eta.unwrap().as_secs(),
            5,
            "ETA should be 5 seconds (500 bytes remaining at 100 B/s)"
        );
    }

    #[test]
    fn test_progress_update_zero_speed() {
        let mut progress = DownloadProgress::new(1000);
        progress.update(100, 0.0);
        assert_eq!(progress.eta, None, "ETA should be None with zero speed");
    }

    #[test]
    fn test_unknown_size() {
        let mut progress = DownloadProgress::new(0);
        progress.update(4096, 1024.0);
        assert!(!progress.is_size_known());
        assert_eq!(progress.percent(), 0);
        assert_eq!(progress.eta, None);
    }

    #[test]
    fn test_percent_floors_and_clamps() {
        assert_eq!(at(999, 1000).percent(), 99);
        assert_eq!(at(1000, 1000).percent(), 100);
        assert_eq!(at(1500, 1000).percent(), 100);
    }

    #[test]
    fn test_video_maps_to_first_half() {
        assert_eq!(Payload::Video.overall(&at(0, 1000)), 0);
        assert_eq!(Payload::Video.overall(&at(500, 1000)), 25);
        assert_eq!(Payload::Video.overall(&at(1000, 1000)), 50);
    }

    #[test]
    fn test_audio_maps_to_fifty_through_ninety() {
        assert_eq!(Payload::Audio.overall(&at(0, 1000)), 50);
        assert_eq!(Payload::Audio.overall(&at(500, 1000)), 70);
        assert_eq!(Payload::Audio.overall(&at(1000, 1000)), MERGE_PROGRESS);
    }

    #[test]
    fn test_unknown_size_stays_at_slice_start() {
        assert_eq!(Payload::Video.overall(&at(12345, 0)), 0);
        assert_eq!(Payload::Audio.overall(&at(12345, 0)), 50);
    }
}
