//! Bilibili JSON endpoints

use crate::client::{FetchOptions, HttpClient, ResponseBody};
use crate::extractor::blobs::{parse_play_url_reply, PlayUrlReply};
use crate::utils::config::AppSettings;
use crate::utils::error::{BiliError, Result};
use serde::Serialize;
use tracing::debug;

/// Account level of the configured session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LoginStatus {
    Visitor,
    Member,
    Vip,
}

/// Client for `api.bilibili.com`, carrying the session cookie
#[derive(Debug, Clone)]
pub struct BiliApi {
    client: HttpClient,
    api_base: String,
    cookie: Option<String>,
}

impl BiliApi {
    pub fn new(client: HttpClient, settings: &AppSettings) -> Self {
        Self {
            client,
            api_base: settings.api_base.trim_end_matches('/').to_string(),
            cookie: settings.cookie(),
        }
    }

    pub fn client(&self) -> &HttpClient {
        &self.client
    }

    pub fn cookie(&self) -> Option<String> {
        self.cookie.clone()
    }

    pub fn play_url_endpoint(&self, cid: u64, bvid: &str, quality: u32) -> String {
        format!(
            "{}/x/player/playurl?cid={}&bvid={}&qn={}&type=&otype=json&fourk=1&fnver=0&fnval=80",
            self.api_base, cid, bvid, quality
        )
    }

    /// Call `x/player/playurl` for one page at one tier
    pub async fn play_url(&self, cid: u64, bvid: &str, quality: u32) -> Result<PlayUrlReply> {
        let url = self.play_url_endpoint(cid, bvid, quality);
        debug!("playurl cid={} bvid={} qn={}", cid, bvid, quality);

        let response = self
            .client
            .fetch(&url, FetchOptions::new().cookie(self.cookie()).json())
            .await?;
        match response.body {
            ResponseBody::Json(value) => parse_play_url_reply(&value),
            ResponseBody::Text(_) => Err(BiliError::Parse(format!(
                "playurl returned non-JSON body (HTTP {})",
                response.status_code
            ))),
        }
    }

    /// Query `x/web-interface/nav` to learn whether the session is logged in
    pub async fn login_status(&self) -> Result<LoginStatus> {
        let url = format!("{}/x/web-interface/nav", self.api_base);
        let response = self
            .client
            .fetch(&url, FetchOptions::new().cookie(self.cookie()).json())
            .await?;

        let Some(data) = response.body.as_json().and_then(|v| v.get("data")) else {
            return Ok(LoginStatus::Visitor);
        };
        Ok(login_status_from(data))
    }
}

fn login_status_from(data: &serde_json::Value) -> LoginStatus {
    let is_login = data
        .get("isLogin")
        .and_then(|v| v.as_bool())
        .unwrap_or(false);
    let vip = data
        .get("vipStatus")
        .and_then(|v| v.as_i64())
        .unwrap_or(0)
        != 0;

    match (is_login, vip) {
        (true, true) => LoginStatus::Vip,
        (true, false) => LoginStatus::Member,
        _ => LoginStatus::Visitor,
    }
}
