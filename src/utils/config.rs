//! Application configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const DEFAULT_API_BASE: &str = "https://api.bilibili.com";
pub const DEFAULT_WEB_BASE: &str = "https://www.bilibili.com";

/// Application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppSettings {
    /// Where finished files are written
    pub download_path: PathBuf,

    /// Where raw audio/video payloads are staged before muxing
    pub temp_dir: PathBuf,

    /// SESSDATA cookie value, empty for anonymous access
    pub sessdata: String,

    /// Mux audio and video into one file after download
    pub merge: bool,

    /// Remove the raw payloads after a successful mux
    pub delete_temp: bool,

    /// Put every task into its own subfolder
    pub folder_per_task: bool,

    /// Quality tier used when the caller does not pick one
    pub default_quality: u32,

    /// Explicit ffmpeg binary, otherwise looked up on PATH
    pub ffmpeg_path: Option<PathBuf>,

    pub api_base: String,
    pub web_base: String,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            download_path: dirs::download_dir().unwrap_or_else(|| PathBuf::from("./downloads")),
            temp_dir: std::env::temp_dir(),
            sessdata: String::new(),
            merge: true,
            delete_temp: true,
            folder_per_task: false,
            default_quality: 80,
            ffmpeg_path: None,
            api_base: DEFAULT_API_BASE.to_string(),
            web_base: DEFAULT_WEB_BASE.to_string(),
        }
    }
}

impl AppSettings {
    /// Cookie header value for the configured session, if any
    pub fn cookie(&self) -> Option<String> {
        if self.sessdata.is_empty() {
            None
        } else {
            Some(format!("SESSDATA={}", self.sessdata))
        }
    }

    /// Temp files are only removed when they were actually muxed
    pub fn should_cleanup(&self) -> bool {
        self.merge && self.delete_temp
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppSettings::default();
        assert!(config.merge);
        assert!(config.delete_temp);
        assert!(!config.folder_per_task);
        assert_eq!(config.default_quality, 80);
        assert_eq!(config.api_base, DEFAULT_API_BASE);
    }

    #[test]
    fn test_cookie_only_when_sessdata_set() {
        let mut config = AppSettings::default();
        assert_eq!(config.cookie(), None);

        config.sessdata = "abc123".to_string();
        assert_eq!(config.cookie().as_deref(), Some("SESSDATA=abc123"));
    }

    #[test]
    fn test_cleanup_requires_merge_and_delete() {
        let mut config = AppSettings::default();
        assert!(config.should_cleanup());

        config.merge = false;
        assert!(!config.should_cleanup());

        config.merge = true;
        config.delete_temp = false;
        assert!(!config.should_cleanup());
    }

    #[test]
    fn test_settings_roundtrip_through_json() {
        let mut config = AppSettings::default();
        config.sessdata = "token".to_string();
        config.folder_per_task = true;

        let json = serde_json::to_string(&config).unwrap();
        let parsed: AppSettings = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.sessdata, "token");
        assert!(parsed.folder_per_task);
    }
}
