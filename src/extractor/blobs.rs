//! Typed views of the JSON blobs embedded in Bilibili pages and API replies
//!
//! Pages ship their state as `window.__INITIAL_STATE__=…` and, for viewers
//! with enough privilege, the stream manifest as `window.__playinfo__=…`.
//! Both are located by fixed delimiters and deserialized into the structs
//! below. Anything the pipeline relies on is a required field, so a layout
//! change surfaces as a parse error instead of empty data further down.

use crate::extractor::models::StreamEntry;
use crate::utils::error::{BiliError, Result};
use lazy_static::lazy_static;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::Deserialize;

lazy_static! {
    static ref VIDEO_STATE_RE: Regex =
        Regex::new(r"</script><script>window\.__INITIAL_STATE__=([\s\S]*?);\(function\(\)").unwrap();
    static ref EPISODE_STATE_RE: Regex =
        Regex::new(r"<script>window\.__INITIAL_STATE__=([\s\S]*?);\(function\(\)\{var s;").unwrap();
    static ref PLAY_INFO_RE: Regex = Regex::new(
        r"<script>window\.__playinfo__=([\s\S]*?)</script><script>window\.__INITIAL_STATE__="
    )
    .unwrap();
}

// ============================================================
// Page state: regular videos
// ============================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoPageState {
    pub video_data: VideoData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VideoData {
    pub bvid: String,
    pub cid: u64,
    pub title: String,
    #[serde(default)]
    pub pic: String,
    /// Seconds
    pub duration: u64,
    #[serde(default)]
    pub owner: Option<Person>,
    #[serde(default)]
    pub staff: Option<Vec<Person>>,
    #[serde(default)]
    pub pages: Vec<VideoPart>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Person {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub mid: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VideoPart {
    pub cid: u64,
    pub page: u32,
    #[serde(default)]
    pub part: String,
    /// Seconds
    pub duration: u64,
}

// ============================================================
// Page state: bangumi episodes and seasons
// ============================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EpisodePageState {
    pub h1_title: String,
    pub media_info: MediaInfo,
    pub ep_info: EpisodeInfo,
    #[serde(default)]
    pub ep_list: Vec<EpisodeItem>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaInfo {
    #[serde(default)]
    pub cover: String,
    #[serde(default)]
    pub up_info: Option<Person>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EpisodeInfo {
    pub cid: u64,
    pub bvid: String,
    /// Milliseconds
    #[serde(default)]
    pub duration: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EpisodeItem {
    #[serde(default)]
    pub share_copy: String,
    pub cid: u64,
    pub bvid: String,
    /// Milliseconds
    #[serde(default)]
    pub duration: u64,
    pub share_url: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeasonPageState {
    pub media_info: SeasonMediaInfo,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeasonMediaInfo {
    pub newest_ep: NewestEpisode,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewestEpisode {
    pub id: u64,
}

// ============================================================
// Stream manifests (inline __playinfo__ and x/player/playurl)
// ============================================================

/// Inline `__playinfo__`; `data` and its quality list are required
#[derive(Debug, Clone, Deserialize)]
pub struct PlayInfo {
    pub data: PlayData,
}

/// Reply of `x/player/playurl`; `data` is null on auth/session problems
#[derive(Debug, Clone, Deserialize)]
pub struct PlayUrlReply {
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub data: Option<PlayData>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlayData {
    pub accept_quality: Vec<u32>,
    #[serde(default)]
    pub dash: Option<Dash>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Dash {
    #[serde(default)]
    pub video: Option<Vec<DashStream>>,
    #[serde(default)]
    pub audio: Option<Vec<DashStream>>,
}

/// Replies carry the URL as `baseUrl`, `base_url`, or both
#[derive(Debug, Clone, Deserialize)]
pub struct DashStream {
    pub id: u32,
    #[serde(rename = "baseUrl", default)]
    pub base_url_camel: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
}

impl DashStream {
    pub fn url(&self) -> Option<&str> {
        self.base_url_camel
            .as_deref()
            .or(self.base_url.as_deref())
    }
}

/// Quality list plus stream entries, whatever their source
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AcceptQuality {
    pub accept_quality: Vec<u32>,
    pub video: Vec<StreamEntry>,
    pub audio: Vec<StreamEntry>,
}

impl Dash {
    pub fn video_streams(&self) -> &[DashStream] {
        self.video.as_deref().unwrap_or(&[])
    }

    pub fn audio_streams(&self) -> &[DashStream] {
        self.audio.as_deref().unwrap_or(&[])
    }
}

impl PlayData {
    /// Flatten into entries tagged with `cid`; a stream without a URL is a parse error
    pub fn into_accept_quality(self, cid: u64) -> Result<AcceptQuality> {
        let dash = self.dash.unwrap_or_default();
        Ok(AcceptQuality {
            accept_quality: self.accept_quality,
            video: stream_entries(dash.video_streams(), cid)?,
            audio: stream_entries(dash.audio_streams(), cid)?,
        })
    }
}

fn stream_entries(streams: &[DashStream], cid: u64) -> Result<Vec<StreamEntry>> {
    streams
        .iter()
        .map(|s| {
            let url = s
                .url()
                .ok_or_else(|| BiliError::Parse(format!("stream {} has no base URL", s.id)))?;
            Ok(StreamEntry {
                tier_code: s.id,
                internal_id: cid,
                stream_url: url.to_string(),
            })
        })
        .collect()
}

// ============================================================
// Extraction
// ============================================================

fn capture<'a>(re: &Regex, html: &'a str) -> Option<&'a str> {
    re.captures(html)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

fn parse_blob<T: DeserializeOwned>(raw: &str, what: &str) -> Result<T> {
    serde_json::from_str(raw).map_err(|e| BiliError::Parse(format!("{}: {}", what, e)))
}

pub fn extract_video_state(html: &str) -> Result<VideoPageState> {
    let raw = capture(&VIDEO_STATE_RE, html)
        .ok_or_else(|| BiliError::Parse("video page state not found".to_string()))?;
    parse_blob(raw, "video page state")
}

pub fn extract_episode_state(html: &str) -> Result<EpisodePageState> {
    let raw = capture(&EPISODE_STATE_RE, html)
        .ok_or_else(|| BiliError::Parse("episode page state not found".to_string()))?;
    parse_blob(raw, "episode page state")
}

pub fn extract_season_state(html: &str) -> Result<SeasonPageState> {
    let raw = capture(&EPISODE_STATE_RE, html)
        .ok_or_else(|| BiliError::Parse("season page state not found".to_string()))?;
    parse_blob(raw, "season page state")
}

/// Raw inline stream manifest, if the page carries one
pub fn find_play_info(html: &str) -> Option<&str> {
    capture(&PLAY_INFO_RE, html)
}

pub fn parse_play_info(raw: &str) -> Result<PlayInfo> {
    parse_blob(raw, "inline play info")
}

pub fn parse_play_url_reply(value: &serde_json::Value) -> Result<PlayUrlReply> {
    PlayUrlReply::deserialize(value).map_err(|e| BiliError::Parse(format!("playurl reply: {}", e)))
}
