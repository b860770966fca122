use std::{
    path::PathBuf,
    sync::mpsc,
};

use crate::{batch::BatchSummary, text::TransformationType};

/// Payload of a completed field transformation.
#[derive(Debug, Clone)]
pub enum LivePayload {
    Text(String),
    AudioFile(PathBuf),
}

/// Completion messages delivered from background tasks to the foreground.
/// Errors cross the channel as display strings.
#[derive(Debug, Clone)]
pub enum TaskResult {
    Progress { done: usize, total: usize },
    BatchCompleted(Result<BatchSummary, String>),

    LiveResult {
        note_id: u64,
        field_name: String,
        kind: TransformationType,
        result: Result<LivePayload, String>,
    },
}

impl TaskResult {
    pub fn task_type(&self) -> &'static str {
        match self {
            TaskResult::Progress { .. } => "progress",
            TaskResult::BatchCompleted(_) => "batch_completed",
            TaskResult::LiveResult { .. } => "live_result",
        }
    }
}

/// Receives progress ticks from a long-running operation. Work-unit totals
/// are known before the first tick.
pub trait ProgressSink {
    fn progress(&self, done: usize, total: usize);
}

/// Sink for callers that do not track progress.
pub struct NullProgress;

impl ProgressSink for NullProgress {
    fn progress(&self, _done: usize, _total: usize) {}
}

/// Forwards progress ticks into the completion channel, for operations
/// running behind the task manager.
pub struct ChannelProgress {
    sender: mpsc::Sender<TaskResult>,
}

impl ChannelProgress {
    pub fn new(sender: mpsc::Sender<TaskResult>) -> Self {
        Self { sender }
    }
}

impl ProgressSink for ChannelProgress {
    fn progress(&self, done: usize, total: usize) {
        let _ = self.sender.send(TaskResult::Progress { done, total });
    }
}
