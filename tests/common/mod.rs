//! In-process HTTP/1.1 responder for integration tests
//!
//! Routes are keyed by path (query ignored). Every connection serves one
//! request and is closed afterwards.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

#[derive(Debug, Clone)]
pub struct Route {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
    /// Advertised length when it differs from the body (truncated transfer)
    pub content_length: Option<usize>,
}

impl Route {
    pub fn ok(body: impl Into<Vec<u8>>) -> Self {
        Self {
            status: 200,
            headers: Vec::new(),
            body: body.into(),
            content_length: None,
        }
    }

    pub fn json(body: &serde_json::Value) -> Self {
        Self::ok(body.to_string()).header("Content-Type", "application/json")
    }

    pub fn status(status: u16) -> Self {
        Self {
            status,
            ..Self::ok(Vec::new())
        }
    }

    pub fn redirect(status: u16, location: &str) -> Self {
        Self::status(status).header("Location", location)
    }

    /// Send `body` but promise `advertised` bytes, then hang up
    pub fn truncated(body: impl Into<Vec<u8>>, advertised: usize) -> Self {
        Self {
            content_length: Some(advertised),
            ..Self::ok(body)
        }
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }
}

/// A recorded request: method, full target and lowercased headers
#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: String,
    pub target: String,
    pub headers: HashMap<String, String>,
}

#[derive(Clone)]
pub struct TestServer {
    pub base: String,
    routes: Arc<Mutex<HashMap<String, Route>>>,
    requests: Arc<Mutex<Vec<Recorded>>>,
}

impl TestServer {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = Self {
            base: format!("http://{}", addr),
            routes: Arc::new(Mutex::new(HashMap::new())),
            requests: Arc::new(Mutex::new(Vec::new())),
        };

        let routes = server.routes.clone();
        let requests = server.requests.clone();
        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    break;
                };
                let routes = routes.clone();
                let requests = requests.clone();
                tokio::spawn(async move {
                    let Some(recorded) = read_request(&mut socket).await else {
                        return;
                    };
                    let path = recorded.target.split('?').next().unwrap_or("").to_string();
                    requests.lock().unwrap().push(recorded);

                    let route = routes
                        .lock()
                        .unwrap()
                        .get(&path)
                        .cloned()
                        .unwrap_or_else(|| Route::status(404));
                    let _ = socket.write_all(&render(&route)).await;
                    let _ = socket.shutdown().await;
                });
            }
        });

        server
    }

    pub fn route(&self, path: &str, route: Route) -> &Self {
        self.routes.lock().unwrap().insert(path.to_string(), route);
        self
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().unwrap().clone()
    }

    pub fn hits(&self, path: &str) -> usize {
        self.requests()
            .iter()
            .filter(|r| r.target.split('?').next() == Some(path))
            .count()
    }
}

async fn read_request(socket: &mut tokio::net::TcpStream) -> Option<Recorded> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    let head_end = loop {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos;
        }
    };

    let head = String::from_utf8_lossy(&buf[..head_end]).to_string();
    let mut lines = head.lines();
    let mut request_line = lines.next()?.split_whitespace();
    let method = request_line.next()?.to_string();
    let target = request_line.next()?.to_string();
    let headers = lines
        .filter_map(|l| l.split_once(':'))
        .map(|(k, v)| (k.trim().to_ascii_lowercase(), v.trim().to_string()))
        .collect::<HashMap<_, _>>();

    // Drain a request body so the client never sees a reset
    let expected: usize = headers
        .get("content-length")
        .and_then(|v| v.parse().ok())
        .unwrap_or(0);
    let mut have = buf.len() - head_end - 4;
    while have < expected {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            break;
        }
        have += n;
    }

    Some(Recorded {
        method,
        target,
        headers,
    })
}

fn render(route: &Route) -> Vec<u8> {
    let length = route.content_length.unwrap_or(route.body.len());
    let mut out = format!("HTTP/1.1 {} Test\r\nContent-Length: {}\r\nConnection: close\r\n", route.status, length);
    for (name, value) in &route.headers {
        out.push_str(&format!("{}: {}\r\n", name, value));
    }
    out.push_str("\r\n");
    let mut bytes = out.into_bytes();
    bytes.extend_from_slice(&route.body);
    bytes
}

// ============================================================
// Page fixtures
// ============================================================

pub fn play_info(cid_streams: &[(u32, &str)], audio: &[(u32, &str)]) -> serde_json::Value {
    let accept: Vec<u32> = cid_streams.iter().map(|(id, _)| *id).collect();
    serde_json::json!({
        "code": 0,
        "data": {
            "accept_quality": accept,
            "dash": {
                "video": cid_streams
                    .iter()
                    .map(|(id, url)| serde_json::json!({"id": id, "baseUrl": url}))
                    .collect::<Vec<_>>(),
                "audio": audio
                    .iter()
                    .map(|(id, url)| serde_json::json!({"id": id, "base_url": url}))
                    .collect::<Vec<_>>(),
            }
        }
    })
}

pub fn video_state(bvid: &str, cid: u64, title: &str) -> serde_json::Value {
    serde_json::json!({
        "videoData": {
            "bvid": bvid,
            "cid": cid,
            "title": title,
            "pic": "//i0.hdslb.com/bfs/archive/cover.jpg",
            "duration": 185,
            "owner": {"name": "uploader", "mid": 42},
            "pages": [{"cid": cid, "page": 1, "part": title, "duration": 185}]
        }
    })
}

/// A video page, optionally carrying an inline `__playinfo__`
pub fn video_page(state: &serde_json::Value, play_info: Option<&serde_json::Value>) -> String {
    let inline = play_info
        .map(|p| format!("<script>window.__playinfo__={}", p))
        .unwrap_or_else(|| "<script>var x=1;".to_string());
    format!(
        "<html><head>{}</script><script>window.__INITIAL_STATE__={};(function(){{var s;}})();</script></head></html>",
        inline, state
    )
}

pub fn episode_page(state: &serde_json::Value) -> String {
    format!(
        "<html><script>window.__INITIAL_STATE__={};(function(){{var s;(document.scripts)}})();</script></html>",
        state
    )
}
