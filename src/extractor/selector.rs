//! Concrete stream selection for a chosen quality tier

use crate::extractor::api::BiliApi;
use crate::extractor::blobs::DashStream;
use crate::extractor::models::StreamUrls;
use crate::utils::error::{BiliError, Result};
use tracing::{debug, warn};

/// Video entry for `tier`: exact match, otherwise the first entry.
///
/// The first-entry fallback silently yields a different quality than the one
/// requested; it is kept because callers already rely on getting *something*.
pub fn select_video<T, F>(entries: &[T], tier: u32, tier_of: F) -> Option<&T>
where
    F: Fn(&T) -> u32,
{
    entries
        .iter()
        .find(|e| tier_of(e) == tier)
        .or_else(|| entries.first())
}

/// Audio entry with the highest tier, independent of the requested video tier
pub fn select_audio<T, F>(entries: &[T], tier_of: F) -> Option<&T>
where
    F: Fn(&T) -> u32,
{
    entries.iter().max_by_key(|e| tier_of(e))
}

/// Resolves stream URLs through `x/player/playurl`
#[derive(Debug, Clone)]
pub struct StreamSelector {
    api: BiliApi,
}

impl StreamSelector {
    pub fn new(api: BiliApi) -> Self {
        Self { api }
    }

    pub async fn resolve_streams(&self, cid: u64, bvid: &str, tier: u32) -> Result<StreamUrls> {
        let reply = self.api.play_url(cid, bvid, tier).await?;

        let Some(dash) = reply.data.and_then(|d| d.dash) else {
            warn!(
                "playurl returned no dash data for {} (code {}: {})",
                bvid,
                reply.code,
                reply.message.as_deref().unwrap_or("")
            );
            return Err(BiliError::NoStreamData(format!(
                "no dash data for {} (code {})",
                bvid, reply.code
            )));
        };

        let video = select_video(dash.video_streams(), tier, |s: &DashStream| s.id)
            .ok_or_else(|| BiliError::NoStreamData(format!("no video streams for {}", bvid)))?;
        let audio = select_audio(dash.audio_streams(), |s: &DashStream| s.id)
            .ok_or_else(|| BiliError::NoStreamData(format!("no audio streams for {}", bvid)))?;

        if video.id != tier {
            debug!("Tier {} not offered for {}, using {}", tier, bvid, video.id);
        }

        let stream_url = |s: &DashStream| {
            s.url()
                .map(str::to_string)
                .ok_or_else(|| BiliError::Parse(format!("stream {} has no base URL", s.id)))
        };

        Ok(StreamUrls {
            video: stream_url(video)?,
            audio: stream_url(audio)?,
        })
    }
}
