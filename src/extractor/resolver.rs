//! Page resolution: URL → `MediaDescriptor`

use crate::client::{FetchOptions, HttpClient};
use crate::extractor::api::BiliApi;
use crate::extractor::blobs::{
    extract_episode_state, extract_season_state, extract_video_state, AcceptQuality,
    EpisodePageState, Person, VideoData,
};
use crate::extractor::models::{Contributor, MediaDescriptor, Page, QualityOption};
use crate::extractor::strategy::{StreamContext, StreamInfoChain};
use crate::extractor::url_kind::{check_url, UrlKind};
use crate::utils::config::AppSettings;
use crate::utils::error::{BiliError, Result};
use crate::utils::format::{format_duration, format_duration_ms};
use tracing::{debug, info};

/// Fetches and normalizes Bilibili pages
#[derive(Clone)]
pub struct PageResolver {
    client: HttpClient,
    cookie: Option<String>,
    web_base: String,
    streams: StreamInfoChain,
}

impl PageResolver {
    pub fn new(api: BiliApi, settings: &AppSettings) -> Self {
        Self {
            client: api.client().clone(),
            cookie: api.cookie(),
            web_base: settings.web_base.trim_end_matches('/').to_string(),
            streams: StreamInfoChain::standard(api),
        }
    }

    /// Replace the stream-info strategies (inline → probe by default)
    pub fn with_stream_chain(mut self, streams: StreamInfoChain) -> Self {
        self.streams = streams;
        self
    }

    /// Classify, fetch and parse `url`
    pub async fn resolve(&self, url: &str) -> Result<MediaDescriptor> {
        let kind = check_url(url).ok_or_else(|| BiliError::UnsupportedUrl(url.to_string()))?;
        info!("Resolving {} page {}", kind.tag(), url);

        let (html, final_url) = self.fetch_page(url).await?;
        self.parse_html(&html, kind, &final_url).await
    }

    /// Parse an already fetched page of the given kind
    pub async fn parse_html(&self, html: &str, kind: UrlKind, url: &str) -> Result<MediaDescriptor> {
        match kind {
            UrlKind::Video => self.parse_video(html, url).await,
            UrlKind::Episode => self.parse_episode(html, url).await,
            UrlKind::Season => {
                let season = extract_season_state(html)?;
                let ep_url = format!(
                    "{}/bangumi/play/ep{}",
                    self.web_base, season.media_info.newest_ep.id
                );
                debug!("Season {} resolves to {}", url, ep_url);
                let (ep_html, _) = self.fetch_page(&ep_url).await?;
                self.parse_episode(&ep_html, &ep_url).await
            }
        }
    }

    async fn fetch_page(&self, url: &str) -> Result<(String, String)> {
        let response = self
            .client
            .fetch(url, FetchOptions::new().cookie(self.cookie.clone()))
            .await?;
        if !(200..300).contains(&response.status_code) {
            return Err(BiliError::HttpStatus(response.status_code));
        }
        let final_url = response.final_url(url).to_string();
        let html = response.body.as_text().unwrap_or_default().to_string();
        Ok((html, final_url))
    }

    async fn parse_video(&self, html: &str, url: &str) -> Result<MediaDescriptor> {
        let data = extract_video_state(html)?.video_data;
        let streams = self
            .streams
            .load(&StreamContext {
                html,
                cid: data.cid,
                bvid: &data.bvid,
            })
            .await?;
        Ok(video_descriptor(data, streams.info, url))
    }

    async fn parse_episode(&self, html: &str, url: &str) -> Result<MediaDescriptor> {
        let state = extract_episode_state(html)?;
        let streams = self
            .streams
            .load(&StreamContext {
                html,
                cid: state.ep_info.cid,
                bvid: &state.ep_info.bvid,
            })
            .await?;
        Ok(episode_descriptor(state, streams.info, url))
    }
}

fn contributor(p: &Person) -> Contributor {
    Contributor {
        name: p.name.clone(),
        account_id: p.mid,
    }
}

fn absolute_url(url: &str) -> String {
    if url.is_empty() || url.starts_with("http") {
        url.to_string()
    } else {
        format!("https:{}", url)
    }
}

/// `url` with a `p=` page parameter appended
pub fn page_url(url: &str, page: u32) -> String {
    let sep = if url.contains('?') { '&' } else { '?' };
    format!("{}{}p={}", url, sep, page)
}

fn quality_options(aq: &AcceptQuality) -> Vec<QualityOption> {
    aq.accept_quality
        .iter()
        .map(|&q| QualityOption::new(q))
        .collect()
}

/// Pages of a regular video; single-part videos keep `url` untouched
pub fn video_pages(data: &VideoData, url: &str) -> Vec<Page> {
    match data.pages.as_slice() {
        [] => vec![Page {
            title: data.title.clone(),
            page_index: 1,
            duration: format_duration(data.duration),
            internal_id: data.cid,
            primary_id: data.bvid.clone(),
            source_url: url.to_string(),
        }],
        [only] => vec![Page {
            title: data.title.clone(),
            page_index: only.page,
            duration: format_duration(only.duration),
            internal_id: only.cid,
            primary_id: data.bvid.clone(),
            source_url: url.to_string(),
        }],
        parts => parts
            .iter()
            .map(|part| Page {
                title: part.part.clone(),
                page_index: part.page,
                duration: format_duration(part.duration),
                internal_id: part.cid,
                primary_id: data.bvid.clone(),
                source_url: page_url(url, part.page),
            })
            .collect(),
    }
}

/// Pages of a bangumi episode page, one per listed episode
pub fn episode_pages(state: &EpisodePageState, url: &str) -> Vec<Page> {
    if state.ep_list.is_empty() {
        return vec![Page {
            title: state.h1_title.clone(),
            page_index: 1,
            duration: format_duration_ms(state.ep_info.duration),
            internal_id: state.ep_info.cid,
            primary_id: state.ep_info.bvid.clone(),
            source_url: url.to_string(),
        }];
    }
    state
        .ep_list
        .iter()
        .enumerate()
        .map(|(i, ep)| Page {
            title: ep.share_copy.clone(),
            page_index: i as u32 + 1,
            duration: format_duration_ms(ep.duration),
            internal_id: ep.cid,
            primary_id: ep.bvid.clone(),
            source_url: ep.share_url.clone(),
        })
        .collect()
}

pub fn video_descriptor(data: VideoData, aq: AcceptQuality, url: &str) -> MediaDescriptor {
    let contributors = match (&data.staff, &data.owner) {
        (Some(staff), _) if !staff.is_empty() => staff.iter().map(contributor).collect(),
        (_, Some(owner)) => vec![contributor(owner)],
        _ => vec![Contributor::default()],
    };

    MediaDescriptor {
        title: data.title.clone(),
        url: url.to_string(),
        cover_url: absolute_url(&data.pic),
        duration: format_duration(data.duration),
        primary_id: data.bvid.clone(),
        internal_id: data.cid,
        contributors,
        quality_options: quality_options(&aq),
        pages: video_pages(&data, url),
        video_streams: aq.video,
        audio_streams: aq.audio,
    }
}

pub fn episode_descriptor(
    state: EpisodePageState,
    aq: AcceptQuality,
    url: &str,
) -> MediaDescriptor {
    let contributors = vec![state
        .media_info
        .up_info
        .as_ref()
        .map(contributor)
        .unwrap_or_default()];

    MediaDescriptor {
        title: state.h1_title.clone(),
        url: url.to_string(),
        cover_url: absolute_url(&state.media_info.cover),
        duration: format_duration_ms(state.ep_info.duration),
        primary_id: state.ep_info.bvid.clone(),
        internal_id: state.ep_info.cid,
        contributors,
        quality_options: quality_options(&aq),
        pages: episode_pages(&state, url),
        video_streams: aq.video,
        audio_streams: aq.audio,
    }
}
