use crate::queue::manager::{DownloadTask, TaskStatus};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Changes in the task collection, broadcast to whoever renders it
#[derive(Debug, Clone, Serialize)]
pub enum TaskEvent {
    /// A new task was added (possibly already failed)
    TaskAdded {
        task: DownloadTask,
        timestamp: DateTime<Utc>,
    },
    /// A task moved to a new status
    StatusChanged {
        task_id: String,
        status: TaskStatus,
        progress: u8,
        timestamp: DateTime<Utc>,
    },
    /// Overall or per-payload progress moved
    Progress {
        task_id: String,
        progress: u8,
        video_progress: u8,
        audio_progress: u8,
    },
    /// A task failed
    TaskFailed {
        task_id: String,
        error: String,
        timestamp: DateTime<Utc>,
    },
    /// A task was removed from the collection
    TaskRemoved {
        task_id: String,
        timestamp: DateTime<Utc>,
    },
}

impl TaskEvent {
    pub fn task_id(&self) -> &str {
        match self {
            TaskEvent::TaskAdded { task, .. } => &task.id,
            TaskEvent::StatusChanged { task_id, .. }
            | TaskEvent::Progress { task_id, .. }
            | TaskEvent::TaskFailed { task_id, .. }
            | TaskEvent::TaskRemoved { task_id, .. } => task_id,
        }
    }
}
