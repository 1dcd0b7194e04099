//! Bililoader - Bilibili video downloader
//!
//! Resolves a video, season or episode page, downloads the DASH audio and
//! video payloads and muxes them with ffmpeg.

use anyhow::{Context, Result};
use bililoader::downloader::FfmpegMuxer;
use bililoader::extractor::{BiliApi, LoginStatus, PageResolver, StreamSelector};
use bililoader::queue::{TaskEvent, TaskOrchestrator, TaskStatus};
use bililoader::{AppSettings, DownloadEngine, HttpClient};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "bililoader", version, about = "Download Bilibili videos")]
struct Args {
    /// Video (BV/av), season (ss) or episode (ep) URL
    url: Option<String>,

    /// Quality tier code, e.g. 80 for 1080P
    #[arg(short, long)]
    quality: Option<u32>,

    /// Comma separated 1-based page indices, all pages when omitted
    #[arg(short, long, value_delimiter = ',')]
    pages: Vec<u32>,

    /// Output directory
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// SESSDATA cookie value
    #[arg(long, env = "BILIBILI_SESSDATA", hide_env_values = true)]
    sessdata: Option<String>,

    /// Keep audio and video as separate files
    #[arg(long)]
    no_merge: bool,

    /// Keep the raw payloads after muxing
    #[arg(long)]
    keep_temp: bool,

    /// Put every task into its own folder
    #[arg(long)]
    folder: bool,

    /// Print the resolved media as JSON and exit
    #[arg(long)]
    info: bool,

    /// Report whether the session cookie is logged in and exit
    #[arg(long)]
    check_login: bool,

    /// Path to the ffmpeg binary
    #[arg(long)]
    ffmpeg: Option<PathBuf>,
}

impl Args {
    fn settings(&self) -> AppSettings {
        let mut settings = AppSettings::default();
        if let Some(dir) = &self.output {
            settings.download_path = dir.clone();
        }
        if let Some(sessdata) = &self.sessdata {
            settings.sessdata = sessdata.clone();
        }
        settings.merge = !self.no_merge;
        settings.delete_temp = !self.keep_temp;
        settings.folder_per_task = self.folder;
        settings.ffmpeg_path = self.ffmpeg.clone();
        settings
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let settings = args.settings();
    let client = HttpClient::new().context("failed to build HTTP client")?;
    let api = BiliApi::new(client.clone(), &settings);

    if args.check_login {
        let status = api.login_status().await?;
        match status {
            LoginStatus::Visitor => println!("Not logged in"),
            LoginStatus::Member => println!("Logged in"),
            LoginStatus::Vip => println!("Logged in (VIP)"),
        }
        return Ok(());
    }

    let Some(url) = args.url.as_deref() else {
        anyhow::bail!("a URL is required unless --check-login is given");
    };

    let resolver = PageResolver::new(api.clone(), &settings);
    let descriptor = resolver
        .resolve(url)
        .await
        .with_context(|| format!("failed to resolve {}", url))?;

    if args.info {
        println!("{}", serde_json::to_string_pretty(&descriptor)?);
        return Ok(());
    }

    let quality = args
        .quality
        .unwrap_or_else(|| descriptor.suggested_quality(settings.default_quality));
    let pages: Vec<u32> = if args.pages.is_empty() {
        descriptor.pages.iter().map(|p| p.page_index).collect()
    } else {
        args.pages.clone()
    };

    let orchestrator = TaskOrchestrator::new(
        settings.clone(),
        StreamSelector::new(api),
        DownloadEngine::new(client),
        Arc::new(FfmpegMuxer::new(settings.ffmpeg_path.clone())),
    );

    let mut events = orchestrator.subscribe();
    let printer = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => print_event(&event),
                Err(RecvError::Lagged(n)) => warn!("Skipped {} progress events", n),
                Err(RecvError::Closed) => break,
            }
        }
    });

    info!("Downloading {} page(s) of {} at quality {}", pages.len(), descriptor.title, quality);
    let ids = orchestrator.start_download(&descriptor, quality, &pages).await;
    orchestrator.wait_all().await;

    let mut failed = 0;
    for id in &ids {
        if let Some(task) = orchestrator.task(id).await {
            match task.status {
                TaskStatus::Done => println!("Saved {}", task.output_path.display()),
                _ => {
                    failed += 1;
                    eprintln!(
                        "Failed {}: {}",
                        task.title,
                        task.error.as_deref().unwrap_or("unknown error")
                    );
                }
            }
        }
    }

    drop(orchestrator);
    printer.abort();

    if ids.is_empty() || failed > 0 {
        std::process::exit(1);
    }
    Ok(())
}

fn print_event(event: &TaskEvent) {
    match event {
        TaskEvent::TaskAdded { task, .. } => {
            println!("[{}] {} ({})", short_id(&task.id), task.title, task.quality_label)
        }
        TaskEvent::StatusChanged { task_id, status, progress, .. } => {
            println!("[{}] {:?} {}%", short_id(task_id), status, progress)
        }
        TaskEvent::Progress { task_id, progress, .. } => {
            println!("[{}] {}%", short_id(task_id), progress)
        }
        TaskEvent::TaskFailed { task_id, error, .. } => {
            eprintln!("[{}] error: {}", short_id(task_id), error)
        }
        TaskEvent::TaskRemoved { .. } => {}
    }
}

fn short_id(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}
