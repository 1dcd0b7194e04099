//! Data structures for resolved media

use serde::{Deserialize, Serialize};

/// Human-readable label for a quality tier code
pub fn quality_label(tier: u32) -> String {
    let label = match tier {
        127 => "8K Ultra HD",
        126 => "Dolby Vision",
        125 => "HDR True Color",
        120 => "4K Ultra HD",
        116 => "1080P 60fps",
        112 => "1080P High Bitrate",
        80 => "1080P HD",
        74 => "720P 60fps",
        64 => "720P HD",
        32 => "480P",
        16 => "360P",
        other => return other.to_string(),
    };
    label.to_string()
}

/// Canonical description of a resolved URL
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaDescriptor {
    pub title: String,
    /// Resolved page URL (last redirect hop)
    pub url: String,
    pub cover_url: String,
    pub duration: String,
    /// bvid
    pub primary_id: String,
    /// cid
    pub internal_id: u64,
    pub contributors: Vec<Contributor>,
    /// Server order; the first entry is the suggested default
    pub quality_options: Vec<QualityOption>,
    /// Never empty
    pub pages: Vec<Page>,
    pub video_streams: Vec<StreamEntry>,
    pub audio_streams: Vec<StreamEntry>,
}

impl MediaDescriptor {
    pub fn page(&self, page_index: u32) -> Option<&Page> {
        self.pages.iter().find(|p| p.page_index == page_index)
    }

    /// Tier to preselect: first offered option, else `fallback`
    pub fn suggested_quality(&self, fallback: u32) -> u32 {
        self.quality_options
            .first()
            .map(|q| q.tier_code)
            .unwrap_or(fallback)
    }

    /// Stream URLs for `page` at `tier` when the descriptor already carries them.
    ///
    /// Requires a video entry with the exact tier for the page's cid and at
    /// least one audio entry; the best audio is always chosen.
    pub fn inline_streams(&self, page: &Page, tier: u32) -> Option<StreamUrls> {
        let video = self
            .video_streams
            .iter()
            .find(|v| v.tier_code == tier && v.internal_id == page.internal_id)?;
        let audio = self.audio_streams.iter().max_by_key(|a| a.tier_code)?;
        Some(StreamUrls {
            video: video.stream_url.clone(),
            audio: audio.stream_url.clone(),
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Contributor {
    pub name: String,
    pub account_id: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityOption {
    pub tier_code: u32,
    pub label: String,
}

impl QualityOption {
    pub fn new(tier_code: u32) -> Self {
        Self {
            tier_code,
            label: quality_label(tier_code),
        }
    }
}

/// One downloadable part of a resolved URL
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page {
    pub title: String,
    /// 1-based
    pub page_index: u32,
    pub duration: String,
    pub internal_id: u64,
    pub primary_id: String,
    pub source_url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamEntry {
    pub tier_code: u32,
    pub internal_id: u64,
    pub stream_url: String,
}

/// Concrete URLs for the two payloads of a task
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StreamUrls {
    pub video: String,
    pub audio: String,
}
