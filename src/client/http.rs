//! Minimal HTTP client with manual redirect tracking
//!
//! `reqwest` is built with redirects disabled so every hop can be recorded.
//! The page resolver needs the final URL of a short link (b23.tv and friends),
//! and the download engine reuses the same walk before streaming.

use crate::utils::error::{BiliError, Result};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, LOCATION, USER_AGENT};
use reqwest::{redirect, Client, Method, Response, StatusCode};
use std::collections::HashMap;
use tracing::debug;
use url::Url;

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Hard stop for redirect loops
pub const MAX_REDIRECTS: usize = 20;

/// Per-request options
#[derive(Debug, Clone, Default)]
pub struct FetchOptions {
    /// Defaults to GET
    pub method: Option<Method>,
    /// Merged over the default header set; these win on conflict
    pub headers: HashMap<String, String>,
    pub body: Option<String>,
    /// Try to parse the body as JSON
    pub want_json: bool,
}

impl FetchOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Adds a `cookie` header when one is given
    pub fn cookie(self, cookie: Option<String>) -> Self {
        match cookie {
            Some(c) => self.header("cookie", c),
            None => self,
        }
    }

    pub fn json(mut self) -> Self {
        self.want_json = true;
        self
    }

    pub fn post(mut self, body: impl Into<String>) -> Self {
        self.method = Some(Method::POST);
        self.body = Some(body.into());
        self
    }
}

/// Buffered response body
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    Text(String),
    Json(serde_json::Value),
}

impl ResponseBody {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            ResponseBody::Text(t) => Some(t),
            ResponseBody::Json(_) => None,
        }
    }

    pub fn as_json(&self) -> Option<&serde_json::Value> {
        match self {
            ResponseBody::Json(v) => Some(v),
            ResponseBody::Text(_) => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FetchResponse {
    pub body: ResponseBody,
    pub headers: HeaderMap,
    pub status_code: u16,
    /// Every hop that was followed, in visitation order
    pub redirect_chain: Vec<String>,
}

impl FetchResponse {
    /// The URL the body was actually served from
    pub fn final_url<'a>(&'a self, requested: &'a str) -> &'a str {
        self.redirect_chain
            .last()
            .map(String::as_str)
            .unwrap_or(requested)
    }
}

/// Shared HTTP client; cheap to clone
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .redirect(redirect::Policy::none())
            .build()?;
        Ok(Self { client })
    }

    /// Issue a request, follow redirects and buffer the whole body
    pub async fn fetch(&self, url: &str, options: FetchOptions) -> Result<FetchResponse> {
        let (response, redirect_chain) = self.open_with(url, &options).await?;

        let status_code = response.status().as_u16();
        let headers = response.headers().clone();
        let bytes = response.bytes().await?;
        let text = String::from_utf8_lossy(&bytes).into_owned();

        let body = if options.want_json {
            match serde_json::from_str(&text) {
                Ok(value) => ResponseBody::Json(value),
                Err(e) => {
                    debug!("Response from {} is not JSON ({}), returning text", url, e);
                    ResponseBody::Text(text)
                }
            }
        } else {
            ResponseBody::Text(text)
        };

        Ok(FetchResponse {
            body,
            headers,
            status_code,
            redirect_chain,
        })
    }

    /// GET `url` following redirects, returning the unbuffered final response
    pub async fn open(
        &self,
        url: &str,
        headers: &HashMap<String, String>,
    ) -> Result<(Response, Vec<String>)> {
        let options = FetchOptions {
            headers: headers.clone(),
            ..Default::default()
        };
        self.open_with(url, &options).await
    }

    async fn open_with(
        &self,
        url: &str,
        options: &FetchOptions,
    ) -> Result<(Response, Vec<String>)> {
        let headers = build_headers(&options.headers)?;
        let mut method = options.method.clone().unwrap_or(Method::GET);
        let mut body = options.body.clone();
        let mut current = Url::parse(url)?;
        let mut chain = Vec::new();

        loop {
            let mut request = self
                .client
                .request(method.clone(), current.clone())
                .headers(headers.clone());
            if let Some(b) = &body {
                request = request.body(b.clone());
            }
            let response = request.send().await?;

            let Some(next) = redirect_target(&current, &response)? else {
                return Ok((response, chain));
            };

            if chain.len() >= MAX_REDIRECTS {
                return Err(BiliError::TooManyRedirects(url.to_string()));
            }
            debug!("{} {} -> {}", response.status().as_u16(), current, next);

            if response.status() == StatusCode::SEE_OTHER {
                method = Method::GET;
                body = None;
            }
            chain.push(next.to_string());
            current = next;
        }
    }
}

/// Where a 3xx response points, resolved against the URL that produced it
fn redirect_target(current: &Url, response: &Response) -> Result<Option<Url>> {
    if !response.status().is_redirection() {
        return Ok(None);
    }
    let Some(location) = response
        .headers()
        .get(LOCATION)
        .and_then(|v| v.to_str().ok())
    else {
        return Ok(None);
    };
    Ok(Some(current.join(location)?))
}

/// Default headers overlaid with the caller's
pub fn build_headers(extra: &HashMap<String, String>) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, HeaderValue::from_static(DEFAULT_USER_AGENT));

    for (name, value) in extra {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| BiliError::InvalidHeader(name.clone()))?;
        let value =
            HeaderValue::from_str(value).map_err(|_| BiliError::InvalidHeader(name.as_str().to_string()))?;
        headers.insert(name, value);
    }
    Ok(headers)
}
