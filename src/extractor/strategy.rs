//! Ordered sources for a page's quality list and stream entries
//!
//! | inline blob present | inline blob parses | source used   |
//! |---------------------|--------------------|---------------|
//! | no                  | -                  | playurl probe |
//! | yes                 | no                 | playurl probe |
//! | yes                 | yes                | inline        |
//!
//! A strategy returns `Ok(None)` to pass to the next one. Errors stop the
//! chain; the probe only errors on transport failures.

use crate::extractor::api::BiliApi;
use crate::extractor::blobs::{find_play_info, parse_play_info, AcceptQuality};
use crate::utils::error::{BiliError, Result};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};

/// Tier requested when probing; high enough that every offered tier is listed
pub const PROBE_QUALITY: u32 = 127;

/// What a strategy may look at
#[derive(Debug, Clone, Copy)]
pub struct StreamContext<'a> {
    pub html: &'a str,
    pub cid: u64,
    pub bvid: &'a str,
}

#[async_trait]
pub trait StreamInfoStrategy: Send + Sync {
    /// Identifier for logging (e.g. "inline-playinfo")
    fn id(&self) -> &'static str;

    async fn load(&self, ctx: &StreamContext<'_>) -> Result<Option<AcceptQuality>>;
}

/// Stream manifest embedded in the page
pub struct InlinePlayInfo;

#[async_trait]
impl StreamInfoStrategy for InlinePlayInfo {
    fn id(&self) -> &'static str {
        "inline-playinfo"
    }

    async fn load(&self, ctx: &StreamContext<'_>) -> Result<Option<AcceptQuality>> {
        let Some(raw) = find_play_info(ctx.html) else {
            debug!("No inline play info for {}", ctx.bvid);
            return Ok(None);
        };
        match parse_play_info(raw).and_then(|info| info.data.into_accept_quality(ctx.cid)) {
            Ok(aq) => Ok(Some(aq)),
            Err(e) => {
                debug!("Inline play info for {} unusable: {}", ctx.bvid, e);
                Ok(None)
            }
        }
    }
}

/// `x/player/playurl` at [`PROBE_QUALITY`], used to enumerate what is offered
pub struct PlayUrlProbe {
    api: BiliApi,
}

impl PlayUrlProbe {
    pub fn new(api: BiliApi) -> Self {
        Self { api }
    }
}

#[async_trait]
impl StreamInfoStrategy for PlayUrlProbe {
    fn id(&self) -> &'static str {
        "playurl-probe"
    }

    async fn load(&self, ctx: &StreamContext<'_>) -> Result<Option<AcceptQuality>> {
        let reply = match self.api.play_url(ctx.cid, ctx.bvid, PROBE_QUALITY).await {
            Ok(reply) => reply,
            Err(BiliError::Parse(msg)) => {
                warn!("Unreadable playurl probe for {}: {}", ctx.bvid, msg);
                return Ok(Some(AcceptQuality::default()));
            }
            Err(e) => return Err(e),
        };

        let aq = match reply.data {
            Some(data) => data.into_accept_quality(ctx.cid)?,
            None => {
                warn!(
                    "playurl probe for {} returned no data (code {})",
                    ctx.bvid, reply.code
                );
                AcceptQuality::default()
            }
        };
        Ok(Some(aq))
    }
}

/// Where the stream info came from, plus the info itself
#[derive(Debug, Clone, PartialEq)]
pub struct StreamInfo {
    pub source: &'static str,
    pub info: AcceptQuality,
}

/// Strategies tried in order until one yields
#[derive(Clone)]
pub struct StreamInfoChain {
    strategies: Vec<Arc<dyn StreamInfoStrategy>>,
}

impl StreamInfoChain {
    pub fn new(strategies: Vec<Arc<dyn StreamInfoStrategy>>) -> Self {
        Self { strategies }
    }

    /// Inline manifest first, then the playurl probe
    pub fn standard(api: BiliApi) -> Self {
        Self::new(vec![
            Arc::new(InlinePlayInfo),
            Arc::new(PlayUrlProbe::new(api)),
        ])
    }

    pub async fn load(&self, ctx: &StreamContext<'_>) -> Result<StreamInfo> {
        for strategy in &self.strategies {
            if let Some(info) = strategy.load(ctx).await? {
                debug!("Stream info for {} from {}", ctx.bvid, strategy.id());
                return Ok(StreamInfo {
                    source: strategy.id(),
                    info,
                });
            }
        }
        warn!("No stream info source produced data for {}", ctx.bvid);
        Ok(StreamInfo {
            source: "none",
            info: AcceptQuality::default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Stand-in for the network probe
    struct CountingProbe {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl StreamInfoStrategy for CountingProbe {
        fn id(&self) -> &'static str {
            "counting-probe"
        }

        async fn load(&self, _ctx: &StreamContext<'_>) -> Result<Option<AcceptQuality>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Some(AcceptQuality {
                accept_quality: vec![64],
                ..Default::default()
            }))
        }
    }

    struct FailingProbe;

    #[async_trait]
    impl StreamInfoStrategy for FailingProbe {
        fn id(&self) -> &'static str {
            "failing-probe"
        }

        async fn load(&self, _ctx: &StreamContext<'_>) -> Result<Option<AcceptQuality>> {
            Err(BiliError::HttpStatus(500))
        }
    }

    const WITH_INLINE: &str = r#"<script>window.__playinfo__={"data":{"accept_quality":[80],"dash":{"video":[{"id":80,"baseUrl":"v"}],"audio":[{"id":30280,"baseUrl":"a"}]}}}</script><script>window.__INITIAL_STATE__={}"#;
    const BROKEN_INLINE: &str = r#"<script>window.__playinfo__={"data":</script><script>window.__INITIAL_STATE__={}"#;
    const NO_INLINE: &str = r#"<script>window.__INITIAL_STATE__={}"#;

    fn chain(probe: Arc<CountingProbe>) -> StreamInfoChain {
        StreamInfoChain::new(vec![Arc::new(InlinePlayInfo), probe])
    }

    fn probe() -> Arc<CountingProbe> {
        Arc::new(CountingProbe {
            calls: AtomicUsize::new(0),
        })
    }

    fn ctx(html: &str) -> StreamContext<'_> {
        StreamContext {
            html,
            cid: 3,
            bvid: "BV1",
        }
    }

    #[tokio::test]
    async fn test_inline_used_without_probe() {
        let p = probe();
        let result = chain(p.clone()).load(&ctx(WITH_INLINE)).await.unwrap();
        assert_eq!(result.source, "inline-playinfo");
        assert_eq!(result.info.accept_quality, vec![80]);
        assert_eq!(result.info.video[0].internal_id, 3);
        assert_eq!(p.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_absent_inline_falls_through() {
        let p = probe();
        let result = chain(p.clone()).load(&ctx(NO_INLINE)).await.unwrap();
        assert_eq!(result.source, "counting-probe");
        assert_eq!(p.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unparseable_inline_falls_through() {
        let p = probe();
        let result = chain(p.clone()).load(&ctx(BROKEN_INLINE)).await.unwrap();
        assert_eq!(result.source, "counting-probe");
        assert_eq!(result.info.accept_quality, vec![64]);
        assert_eq!(p.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_strategy_error_stops_chain() {
        let chain = StreamInfoChain::new(vec![Arc::new(InlinePlayInfo), Arc::new(FailingProbe)]);
        let err = chain.load(&ctx(NO_INLINE)).await.unwrap_err();
        assert!(matches!(err, BiliError::HttpStatus(500)));
    }

    #[tokio::test]
    async fn test_empty_chain_yields_empty_info() {
        let chain = StreamInfoChain::new(Vec::new());
        let result = chain.load(&ctx(NO_INLINE)).await.unwrap();
        assert_eq!(result.source, "none");
        assert!(result.info.accept_quality.is_empty());
    }
}
