//! Per-task status records and the store that holds them.
//!
//! Every pipeline writes only its own key; any number of readers may poll or
//! subscribe concurrently. Each key holds a `tokio::sync::watch` channel, so
//! a reader can either take a snapshot ([`StatusStore::get`]) or await the
//! next change ([`StatusStore::subscribe`]).
//!
//! ## State machine
//!
//! ```text
//! Processing(0) ─▶ Processing(25) ─▶ … ─▶ Processing(95) ─▶ Completed(100)
//!        │               │                      │
//!        └───────────────┴──────────┬───────────┘
//!                                   ▼
//!                       Failed("Error occurred")
//! ```
//!
//! Progress never decreases and a terminal record is never modified.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::RwLock;
use tokio::sync::watch;
use tracing::debug;

use crate::error::StatusError;

/// Step label frozen onto every failed record.
pub const ERROR_STEP: &str = "Error occurred";

/// Lifecycle state of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskStatus {
    Processing,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }
}

/// The pipeline's sub-steps, each with a fixed progress value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PipelineStep {
    Starting,
    ExtractingText,
    OrganizingFiles,
    UpdatingDatabase,
    CopyingToStorage,
    Complete,
}

impl PipelineStep {
    pub fn label(self) -> &'static str {
        match self {
            PipelineStep::Starting => "Starting scan",
            PipelineStep::ExtractingText => "Extracting text",
            PipelineStep::OrganizingFiles => "Organizing files",
            PipelineStep::UpdatingDatabase => "Updating database",
            PipelineStep::CopyingToStorage => "Copying file to storage",
            PipelineStep::Complete => "Process complete",
        }
    }

    pub fn progress(self) -> u8 {
        match self {
            PipelineStep::Starting => 0,
            PipelineStep::ExtractingText => 25,
            PipelineStep::OrganizingFiles => 75,
            PipelineStep::UpdatingDatabase => 85,
            PipelineStep::CopyingToStorage => 95,
            PipelineStep::Complete => 100,
        }
    }
}

/// Snapshot of one task, serialised as the streaming payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusRecord {
    pub status: TaskStatus,
    pub file_name: String,
    pub current_step: String,
    pub progress: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StatusRecord {
    fn started(file_name: &str) -> Self {
        Self {
            status: TaskStatus::Processing,
            file_name: file_name.to_string(),
            current_step: PipelineStep::Starting.label().to_string(),
            progress: PipelineStep::Starting.progress(),
            error: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

/// Concurrency-safe map of task id → status channel.
///
/// Records are kept after a task finishes so late readers still see the
/// outcome. Nothing evicts them automatically: long-running callers must
/// [`remove`](Self::remove) ids they are done with, or call
/// [`prune_finished`](Self::prune_finished) periodically.
#[derive(Debug, Default)]
pub struct StatusStore {
    tasks: RwLock<HashMap<String, watch::Sender<StatusRecord>>>,
}

impl StatusStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the `Processing(0)` record for a task.
    ///
    /// Calling it again for a task that is still processing leaves the
    /// existing record untouched; a finished task cannot be restarted.
    pub fn begin(&self, task_id: &str, file_name: &str) -> Result<StatusRecord, StatusError> {
        let mut tasks = self.write();
        if let Some(tx) = tasks.get(task_id) {
            let current = tx.borrow().clone();
            if current.is_terminal() {
                return Err(StatusError::AlreadyTerminal {
                    task_id: task_id.to_string(),
                    status: current.status,
                });
            }
            return Ok(current);
        }
        let record = StatusRecord::started(file_name);
        let (tx, _rx) = watch::channel(record.clone());
        tasks.insert(task_id.to_string(), tx);
        debug!("Task {}: status record created", task_id);
        Ok(record)
    }

    /// Move a processing task to `step`.
    pub fn advance(&self, task_id: &str, step: PipelineStep) -> Result<StatusRecord, StatusError> {
        if step == PipelineStep::Complete {
            return self.complete(task_id);
        }
        self.update(task_id, |r| {
            r.current_step = step.label().to_string();
            r.progress = step.progress();
        })
    }

    /// Terminal success.
    pub fn complete(&self, task_id: &str) -> Result<StatusRecord, StatusError> {
        self.update(task_id, |r| {
            r.status = TaskStatus::Completed;
            r.current_step = PipelineStep::Complete.label().to_string();
            r.progress = PipelineStep::Complete.progress();
        })
    }

    /// Terminal failure; progress stays where it was.
    pub fn fail(&self, task_id: &str, error: impl Into<String>) -> Result<StatusRecord, StatusError> {
        let error = error.into();
        self.update(task_id, move |r| {
            r.status = TaskStatus::Failed;
            r.current_step = ERROR_STEP.to_string();
            r.error = Some(error);
        })
    }

    pub fn get(&self, task_id: &str) -> Option<StatusRecord> {
        self.read().get(task_id).map(|tx| tx.borrow().clone())
    }

    /// Receiver that observes every later change to the task's record.
    pub fn subscribe(&self, task_id: &str) -> Option<watch::Receiver<StatusRecord>> {
        self.read().get(task_id).map(|tx| tx.subscribe())
    }

    /// Forget a task. Existing subscribers see their channel close.
    pub fn remove(&self, task_id: &str) -> Option<StatusRecord> {
        self.write()
            .remove(task_id)
            .map(|tx| tx.borrow().clone())
    }

    /// Drop every `Completed`/`Failed` record and return how many went.
    /// Open [`subscribe`](Self::subscribe) receivers keep their last value.
    pub fn prune_finished(&self) -> usize {
        let mut tasks = self.write();
        let before = tasks.len();
        tasks.retain(|_, tx| !tx.borrow().is_terminal());
        let pruned = before - tasks.len();
        if pruned > 0 {
            debug!("Pruned {} finished task(s)", pruned);
        }
        pruned
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    fn update(
        &self,
        task_id: &str,
        apply: impl FnOnce(&mut StatusRecord),
    ) -> Result<StatusRecord, StatusError> {
        let tasks = self.read();
        let tx = tasks
            .get(task_id)
            .ok_or_else(|| StatusError::UnknownTask(task_id.to_string()))?;

        let mut next = tx.borrow().clone();
        if next.is_terminal() {
            return Err(StatusError::AlreadyTerminal {
                task_id: task_id.to_string(),
                status: next.status,
            });
        }
        let from = next.progress;
        apply(&mut next);
        if next.progress < from {
            return Err(StatusError::ProgressRegression {
                task_id: task_id.to_string(),
                from,
                to: next.progress,
            });
        }
        debug!(
            "Task {}: {:?} {}%: {}",
            task_id, next.status, next.progress, next.current_step
        );
        tx.send_replace(next.clone());
        Ok(next)
    }

    // A poisoned lock only means another task panicked mid-update; the map
    // itself is still consistent because every write is a single insert,
    // remove or send.
    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, watch::Sender<StatusRecord>>> {
        self.tasks.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<String, watch::Sender<StatusRecord>>> {
        self.tasks.write().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn begin_creates_processing_zero() {
        let store = StatusStore::new();
        let r = store.begin("t1", "thesis.pdf").unwrap();
        assert_eq!(r.status, TaskStatus::Processing);
        assert_eq!(r.progress, 0);
        assert_eq!(r.current_step, "Starting scan");
        assert_eq!(r.file_name, "thesis.pdf");
        assert!(r.error.is_none());
    }

    #[test]
    fn prune_drops_only_finished_tasks() {
        let store = StatusStore::new();
        store.begin("done", "a.pdf").unwrap();
        store.complete("done").unwrap();
        store.begin("broken", "b.pdf").unwrap();
        store.fail("broken", "PDF file is empty").unwrap();
        store.begin("running", "c.pdf").unwrap();
        let rx = store.subscribe("done").unwrap();

        assert_eq!(store.prune_finished(), 2);
        assert_eq!(store.len(), 1);
        assert!(store.get("running").is_some());
        assert!(store.get("done").is_none());
        assert_eq!(rx.borrow().status, TaskStatus::Completed);
        assert_eq!(store.prune_finished(), 0);
    }

    #[test]
    fn begin_twice_keeps_progress() {
        let store = StatusStore::new();
        store.begin("t1", "a.pdf").unwrap();
        store.advance("t1", PipelineStep::ExtractingText).unwrap();
        let r = store.begin("t1", "a.pdf").unwrap();
        assert_eq!(r.progress, 25);
    }

    #[test]
    fn full_happy_path() {
        let store = StatusStore::new();
        store.begin("t1", "a.pdf").unwrap();
        for step in [
            PipelineStep::ExtractingText,
            PipelineStep::OrganizingFiles,
            PipelineStep::UpdatingDatabase,
            PipelineStep::CopyingToStorage,
        ] {
            let r = store.advance("t1", step).unwrap();
            assert_eq!(r.progress, step.progress());
            assert_eq!(r.current_step, step.label());
        }
        let done = store.complete("t1").unwrap();
        assert_eq!(done.status, TaskStatus::Completed);
        assert_eq!(done.progress, 100);
        assert_eq!(done.current_step, "Process complete");
    }

    #[test]
    fn fail_freezes_step_and_keeps_progress() {
        let store = StatusStore::new();
        store.begin("t1", "a.pdf").unwrap();
        store.advance("t1", PipelineStep::ExtractingText).unwrap();
        let r = store.fail("t1", "boom").unwrap();
        assert_eq!(r.status, TaskStatus::Failed);
        assert_eq!(r.current_step, ERROR_STEP);
        assert_eq!(r.progress, 25);
        assert_eq!(r.error.as_deref(), Some("boom"));
    }

    #[test]
    fn terminal_is_final() {
        let store = StatusStore::new();
        store.begin("t1", "a.pdf").unwrap();
        store.fail("t1", "boom").unwrap();
        assert!(matches!(
            store.complete("t1"),
            Err(StatusError::AlreadyTerminal { .. })
        ));
        assert!(matches!(
            store.fail("t1", "again"),
            Err(StatusError::AlreadyTerminal { .. })
        ));
        assert!(matches!(
            store.begin("t1", "a.pdf"),
            Err(StatusError::AlreadyTerminal { .. })
        ));
        assert_eq!(store.get("t1").unwrap().error.as_deref(), Some("boom"));
    }

    #[test]
    fn progress_cannot_regress() {
        let store = StatusStore::new();
        store.begin("t1", "a.pdf").unwrap();
        store.advance("t1", PipelineStep::OrganizingFiles).unwrap();
        let err = store
            .advance("t1", PipelineStep::ExtractingText)
            .unwrap_err();
        assert_eq!(
            err,
            StatusError::ProgressRegression {
                task_id: "t1".into(),
                from: 75,
                to: 25
            }
        );
        assert_eq!(store.get("t1").unwrap().progress, 75);
    }

    #[test]
    fn unknown_task() {
        let store = StatusStore::new();
        assert!(store.get("nope").is_none());
        assert!(store.subscribe("nope").is_none());
        assert_eq!(
            store.advance("nope", PipelineStep::ExtractingText),
            Err(StatusError::UnknownTask("nope".into()))
        );
    }

    #[test]
    fn serialises_snapshot_schema() {
        let store = StatusStore::new();
        store.begin("t1", "a.pdf").unwrap();
        let json = serde_json::to_value(store.get("t1").unwrap()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "status": "Processing",
                "file_name": "a.pdf",
                "current_step": "Starting scan",
                "progress": 0
            })
        );

        let failed = store.fail("t1", "PDF file is empty").unwrap();
        let json = serde_json::to_value(failed).unwrap();
        assert_eq!(json["status"], "Failed");
        assert_eq!(json["error"], "PDF file is empty");
    }

    #[tokio::test]
    async fn subscriber_sees_updates() {
        let store = StatusStore::new();
        store.begin("t1", "a.pdf").unwrap();
        let mut rx = store.subscribe("t1").unwrap();
        store.advance("t1", PipelineStep::ExtractingText).unwrap();
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow().progress, 25);
    }

    #[test]
    fn remove_forgets_task() {
        let store = StatusStore::new();
        store.begin("t1", "a.pdf").unwrap();
        assert_eq!(store.len(), 1);
        assert!(store.remove("t1").is_some());
        assert!(store.is_empty());
    }

    #[test]
    fn concurrent_writers_on_distinct_keys() {
        let store = std::sync::Arc::new(StatusStore::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = std::sync::Arc::clone(&store);
                std::thread::spawn(move || {
                    let id = format!("t{i}");
                    store.begin(&id, "a.pdf").unwrap();
                    store.advance(&id, PipelineStep::ExtractingText).unwrap();
                    store.complete(&id).unwrap();
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(store.len(), 8);
        for i in 0..8 {
            assert_eq!(
                store.get(&format!("t{i}")).unwrap().status,
                TaskStatus::Completed
            );
        }
    }
}
