//! Download task orchestration
//!
//! Every task runs as its own spawned future: video download, audio download,
//! mux, optional cleanup. The collection is only touched through the methods
//! below, and drivers look their task up by id after every await because the
//! caller may have removed it in the meantime.

use crate::downloader::progress::{DONE_PROGRESS, MERGE_PROGRESS};
use crate::downloader::{cleanup_files, DownloadEngine, DownloadProgress, Muxer, Payload};
use crate::extractor::models::{quality_label, MediaDescriptor, Page, StreamUrls};
use crate::extractor::StreamSelector;
use crate::queue::events::TaskEvent;
use crate::utils::config::AppSettings;
use crate::utils::error::{BiliError, Result};
use crate::utils::paths::TaskPaths;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{broadcast, watch, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

const EVENT_CAPACITY: usize = 256;

/// Task status; only ever moves forward
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
pub enum TaskStatus {
    #[default]
    Pending,
    Downloading,
    Merging,
    Done,
    Error,
}

impl TaskStatus {
    fn rank(self) -> u8 {
        match self {
            TaskStatus::Pending => 0,
            TaskStatus::Downloading => 1,
            TaskStatus::Merging => 2,
            TaskStatus::Done | TaskStatus::Error => 3,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Done | TaskStatus::Error)
    }

    /// Forward moves only; `Error` is reachable from any non-terminal state
    pub fn can_advance_to(self, next: TaskStatus) -> bool {
        !self.is_terminal() && (next == TaskStatus::Error || next.rank() > self.rank())
    }
}

/// Download task
#[derive(Debug, Clone, Serialize)]
pub struct DownloadTask {
    pub id: String,
    pub title: String,
    pub cover_url: String,
    pub primary_id: String,
    pub internal_id: u64,
    pub quality: u32,
    pub quality_label: String,
    pub stream_urls: StreamUrls,
    pub output_path: PathBuf,
    pub video_tmp_path: PathBuf,
    pub audio_tmp_path: PathBuf,
    pub status: TaskStatus,
    pub progress: u8,
    pub video_progress: u8,
    pub audio_progress: u8,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl DownloadTask {
    /// Create a pending task for one page of a descriptor
    pub fn new(
        id: String,
        descriptor: &MediaDescriptor,
        page: &Page,
        quality: u32,
        stream_urls: StreamUrls,
        paths: &TaskPaths,
    ) -> Self {
        Self {
            id,
            title: page.title.clone(),
            cover_url: descriptor.cover_url.clone(),
            primary_id: page.primary_id.clone(),
            internal_id: page.internal_id,
            quality,
            quality_label: quality_label(quality),
            stream_urls,
            output_path: paths.output_path.clone(),
            video_tmp_path: paths.video_tmp_path.clone(),
            audio_tmp_path: paths.audio_tmp_path.clone(),
            status: TaskStatus::Pending,
            progress: 0,
            video_progress: 0,
            audio_progress: 0,
            error: None,
            created_at: Utc::now(),
        }
    }
}

/// Owns the task collection and drives every task through its lifecycle
#[derive(Clone)]
pub struct TaskOrchestrator {
    tasks: Arc<Mutex<HashMap<String, DownloadTask>>>,
    running: Arc<Mutex<HashMap<String, JoinHandle<()>>>>,
    settings: Arc<RwLock<AppSettings>>,
    selector: StreamSelector,
    engine: DownloadEngine,
    muxer: Arc<dyn Muxer>,
    events: broadcast::Sender<TaskEvent>,
}

impl TaskOrchestrator {
    pub fn new(
        settings: AppSettings,
        selector: StreamSelector,
        engine: DownloadEngine,
        muxer: Arc<dyn Muxer>,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            tasks: Arc::new(Mutex::new(HashMap::new())),
            running: Arc::new(Mutex::new(HashMap::new())),
            settings: Arc::new(RwLock::new(settings)),
            selector,
            engine,
            muxer,
            events,
        }
    }

    /// Receive task events from now on
    pub fn subscribe(&self) -> broadcast::Receiver<TaskEvent> {
        self.events.subscribe()
    }

    pub async fn settings(&self) -> AppSettings {
        self.settings.read().await.clone()
    }

    /// Change settings; running tasks pick the change up at their next step
    pub async fn update_settings<F>(&self, f: F)
    where
        F: FnOnce(&mut AppSettings),
    {
        let mut settings = self.settings.write().await;
        f(&mut settings);
    }

    /// Create and start one task per selected page.
    ///
    /// Stream URLs come from the descriptor when it already has the tier for
    /// that page, otherwise from the playurl API. A task whose URLs cannot be
    /// resolved is added in `Error` so the failure is visible. Returns the ids
    /// of all created tasks.
    pub async fn start_download(
        &self,
        descriptor: &MediaDescriptor,
        quality: u32,
        pages: &[u32],
    ) -> Vec<String> {
        let mut ids = Vec::new();

        for &page_index in pages {
            let Some(page) = descriptor.page(page_index) else {
                warn!("Page {} not in {}, skipping", page_index, descriptor.primary_id);
                continue;
            };

            let id = uuid::Uuid::new_v4().to_string();
            let settings = self.settings().await;
            let paths = TaskPaths::new(
                &settings.download_path,
                &settings.temp_dir,
                settings.folder_per_task,
                &id,
                &page.title,
                &page.primary_id,
            );

            let prepared = self.prepare(descriptor, page, quality, &paths).await;
            let stream_urls = prepared.as_ref().cloned().unwrap_or_default();
            let mut task = DownloadTask::new(id.clone(), descriptor, page, quality, stream_urls, &paths);

            if let Err(e) = &prepared {
                error!("Could not prepare task for {} p{}: {}", page.primary_id, page_index, e);
                task.status = TaskStatus::Error;
                task.error = Some(e.to_string());
            }

            self.add_task(task).await;
            if prepared.is_ok() {
                self.spawn_driver(id.clone()).await;
            }
            ids.push(id);
        }

        ids
    }

    async fn prepare(
        &self,
        descriptor: &MediaDescriptor,
        page: &Page,
        quality: u32,
        paths: &TaskPaths,
    ) -> Result<StreamUrls> {
        tokio::fs::create_dir_all(&paths.output_dir).await?;

        if let Some(urls) = descriptor.inline_streams(page, quality) {
            debug!("Using inline streams for {} p{}", page.primary_id, page.page_index);
            return Ok(urls);
        }
        self.selector
            .resolve_streams(page.internal_id, &page.primary_id, quality)
            .await
    }

    async fn add_task(&self, task: DownloadTask) {
        info!("Added task {} ({})", task.id, task.title);
        let event = TaskEvent::TaskAdded {
            task: task.clone(),
            timestamp: Utc::now(),
        };
        self.tasks.lock().await.insert(task.id.clone(), task);
        self.emit(event);
    }

    async fn spawn_driver(&self, id: String) {
        let this = self.clone();
        let task_id = id.clone();
        let handle = tokio::spawn(async move {
            if let Err(e) = this.run(&task_id).await {
                this.fail(&task_id, &e).await;
            }
        });
        self.running.lock().await.insert(id, handle);
    }

    /// Snapshot of every task, newest first
    pub async fn tasks(&self) -> Vec<DownloadTask> {
        let mut tasks: Vec<_> = self.tasks.lock().await.values().cloned().collect();
        tasks.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        tasks
    }

    /// Tasks that have not finished yet, newest first
    pub async fn active_tasks(&self) -> Vec<DownloadTask> {
        let mut tasks = self.tasks().await;
        tasks.retain(|t| !t.status.is_terminal());
        tasks
    }

    /// Done or failed tasks, newest first
    pub async fn finished_tasks(&self) -> Vec<DownloadTask> {
        let mut tasks = self.tasks().await;
        tasks.retain(|t| t.status.is_terminal());
        tasks
    }

    pub async fn task(&self, id: &str) -> Option<DownloadTask> {
        self.tasks.lock().await.get(id).cloned()
    }

    /// Remove a task from the collection. Its I/O, if any, keeps running.
    pub async fn remove_task(&self, id: &str) -> Result<()> {
        if self.tasks.lock().await.remove(id).is_none() {
            return Err(BiliError::TaskNotFound(id.to_string()));
        }
        self.running.lock().await.remove(id);
        info!("Removed task {}", id);
        self.emit(TaskEvent::TaskRemoved {
            task_id: id.to_string(),
            timestamp: Utc::now(),
        });
        Ok(())
    }

    /// Wait until every driver still in the collection has finished
    pub async fn wait_all(&self) {
        loop {
            let handles: Vec<_> = self.running.lock().await.drain().collect();
            if handles.is_empty() {
                break;
            }
            for (id, handle) in handles {
                if let Err(e) = handle.await {
                    error!("Driver for task {} panicked: {}", id, e);
                }
            }
        }
    }

    // ============================================================
    // Driver
    // ============================================================

    async fn run(&self, id: &str) -> Result<()> {
        let Some(task) = self.task(id).await else {
            return Ok(());
        };
        self.transition(id, TaskStatus::Downloading, 0).await;

        let mut headers = HashMap::new();
        if let Some(cookie) = self.settings().await.cookie() {
            headers.insert("cookie".to_string(), cookie);
        }

        self.download_payload(id, Payload::Video, &task.stream_urls.video, &task.video_tmp_path, &headers)
            .await?;
        self.download_payload(id, Payload::Audio, &task.stream_urls.audio, &task.audio_tmp_path, &headers)
            .await?;

        self.transition(id, TaskStatus::Merging, MERGE_PROGRESS).await;

        let settings = self.settings().await;
        if settings.merge {
            self.muxer
                .mux(&task.video_tmp_path, &task.audio_tmp_path, &task.output_path)
                .await?;
        }

        let settings = self.settings().await;
        if settings.should_cleanup() {
            cleanup_files(&[task.video_tmp_path.clone(), task.audio_tmp_path.clone()]).await;
        }

        self.transition(id, TaskStatus::Done, DONE_PROGRESS).await;
        info!("Task {} completed successfully", id);
        Ok(())
    }

    async fn download_payload(
        &self,
        id: &str,
        payload: Payload,
        url: &str,
        dest: &std::path::Path,
        headers: &HashMap<String, String>,
    ) -> Result<()> {
        let (tx, mut rx) = watch::channel(DownloadProgress::default());

        let this = self.clone();
        let task_id = id.to_string();
        let forwarder = tokio::spawn(async move {
            while rx.changed().await.is_ok() {
                let progress = rx.borrow_and_update().clone();
                this.apply_progress(&task_id, payload, &progress).await;
            }
            let last = rx.borrow().clone();
            this.apply_progress(&task_id, payload, &last).await;
        });

        let result = self.engine.download(url, headers, dest, &tx).await;
        drop(tx);
        if let Err(e) = forwarder.await {
            warn!("Progress forwarder for task {} ended abnormally: {}", id, e);
        }

        result.map(|bytes| debug!("Task {} {:?} payload: {} bytes", id, payload, bytes))
    }

    async fn apply_progress(&self, id: &str, payload: Payload, progress: &DownloadProgress) {
        let event = {
            let mut tasks = self.tasks.lock().await;
            let Some(task) = tasks.get_mut(id) else {
                return;
            };
            if task.status != TaskStatus::Downloading {
                return;
            }

            let overall = payload.overall(progress).max(task.progress);
            let slot = match payload {
                Payload::Video => &mut task.video_progress,
                Payload::Audio => &mut task.audio_progress,
            };
            let sub = progress.percent().max(*slot);
            if sub == *slot && overall == task.progress {
                return;
            }
            *slot = sub;
            task.progress = overall;

            TaskEvent::Progress {
                task_id: id.to_string(),
                progress: task.progress,
                video_progress: task.video_progress,
                audio_progress: task.audio_progress,
            }
        };
        self.emit(event);
    }

    /// Move a task forward; returns false if the task is gone or the move is backwards
    async fn transition(&self, id: &str, status: TaskStatus, progress: u8) -> bool {
        let event = {
            let mut tasks = self.tasks.lock().await;
            let Some(task) = tasks.get_mut(id) else {
                debug!("Task {} removed, dropping {:?}", id, status);
                return false;
            };
            if !task.status.can_advance_to(status) {
                warn!("Refusing {:?} -> {:?} for task {}", task.status, status, id);
                return false;
            }
            task.status = status;
            task.progress = progress;
            TaskEvent::StatusChanged {
                task_id: id.to_string(),
                status,
                progress,
                timestamp: Utc::now(),
            }
        };
        self.emit(event);
        true
    }

    async fn fail(&self, id: &str, e: &BiliError) {
        error!("Task {} failed: {}", id, e);
        let message = e.to_string();
        let event = {
            let mut tasks = self.tasks.lock().await;
            let Some(task) = tasks.get_mut(id) else {
                return;
            };
            if !task.status.can_advance_to(TaskStatus::Error) {
                return;
            }
            task.status = TaskStatus::Error;
            task.error = Some(message.clone());
            TaskEvent::TaskFailed {
                task_id: id.to_string(),
                error: message,
                timestamp: Utc::now(),
            }
        };
        self.emit(event);
    }

    fn emit(&self, event: TaskEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }
}
