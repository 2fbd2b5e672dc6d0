//! Status streaming: poll a task's record and emit server-sent-event frames.
//!
//! A reader calls [`status_events`] with a task id and gets a `Stream` that
//! yields one [`StatusFrame`] per poll interval. The stream ends on its own
//! after the first terminal frame (`Completed` / `Failed`) or after telling
//! the reader the id is unknown. It only reads the store; dropping it never
//! affects the pipeline it is watching.
//!
//! The wire format is plain SSE:
//!
//! ```text
//! data: {"status":"Processing","file_name":"a.pdf","current_step":"Extracting text","progress":25}
//!
//! data: {"status":"Completed","file_name":"a.pdf","current_step":"Process complete","progress":100}
//!
//! ```

use futures::stream;
use serde::Serialize;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio_stream::Stream;
use tracing::error;

use crate::status::{StatusRecord, StatusStore};

/// Message sent when the id has no record.
pub const UNKNOWN_TASK_MESSAGE: &str = "Unknown Task ID";

/// A boxed stream of status frames.
pub type StatusStream = Pin<Box<dyn Stream<Item = StatusFrame> + Send>>;

/// One event on the status stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusFrame {
    /// Current snapshot of the task.
    Status(StatusRecord),
    /// No record exists for the requested id; always the last frame.
    UnknownTask,
}

#[derive(Serialize)]
struct ErrorPayload<'a> {
    error: &'a str,
}

impl StatusFrame {
    /// Whether the stream ends after this frame.
    pub fn is_final(&self) -> bool {
        match self {
            StatusFrame::Status(r) => r.is_terminal(),
            StatusFrame::UnknownTask => true,
        }
    }

    /// JSON payload of the frame.
    pub fn to_json(&self) -> String {
        let encoded = match self {
            StatusFrame::Status(record) => serde_json::to_string(record),
            StatusFrame::UnknownTask => serde_json::to_string(&ErrorPayload {
                error: UNKNOWN_TASK_MESSAGE,
            }),
        };
        encoded.unwrap_or_else(|e| {
            error!("Error serialising status: {}", e);
            r#"{"error":"Status serialization failed"}"#.to_string()
        })
    }

    /// Render as an SSE frame: `data: <json>\n\n`.
    pub fn to_sse(&self) -> String {
        format!("data: {}\n\n", self.to_json())
    }
}

#[derive(Clone, Copy)]
enum PollState {
    First,
    Waiting,
    Done,
}

/// Poll `task_id` every `interval` until it reaches a terminal state.
///
/// The first frame is emitted immediately; subsequent frames follow each
/// `interval`.
pub fn status_events(
    store: Arc<StatusStore>,
    task_id: impl Into<String>,
    interval: Duration,
) -> StatusStream {
    let task_id = task_id.into();
    let s = stream::unfold(PollState::First, move |state| {
        let store = Arc::clone(&store);
        let task_id = task_id.clone();
        async move {
            match state {
                PollState::Done => None,
                PollState::First | PollState::Waiting => {
                    if matches!(state, PollState::Waiting) {
                        tokio::time::sleep(interval).await;
                    }
                    let frame = match store.get(&task_id) {
                        Some(record) => StatusFrame::Status(record),
                        None => StatusFrame::UnknownTask,
                    };
                    let next = if frame.is_final() {
                        PollState::Done
                    } else {
                        PollState::Waiting
                    };
                    Some((frame, next))
                }
            }
        }
    });
    Box::pin(s)
}

/// [`status_events`] rendered as SSE text frames.
pub fn sse_events(
    store: Arc<StatusStore>,
    task_id: impl Into<String>,
    interval: Duration,
) -> Pin<Box<dyn Stream<Item = String> + Send>> {
    use futures::StreamExt;
    Box::pin(status_events(store, task_id, interval).map(|f| f.to_sse()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::PipelineStep;
    use futures::StreamExt;

    #[tokio::test]
    async fn unknown_task_yields_single_error_frame() {
        let store = Arc::new(StatusStore::new());
        let frames: Vec<String> = sse_events(store, "missing", Duration::from_millis(1))
            .collect()
            .await;
        assert_eq!(frames, vec!["data: {\"error\":\"Unknown Task ID\"}\n\n".to_string()]);
    }

    #[tokio::test]
    async fn terminal_task_yields_one_frame_and_stops() {
        let store = Arc::new(StatusStore::new());
        store.begin("t1", "a.pdf").unwrap();
        store.complete("t1").unwrap();
        let frames: Vec<StatusFrame> = status_events(store, "t1", Duration::from_millis(1))
            .collect()
            .await;
        assert_eq!(frames.len(), 1);
        assert!(frames[0].is_final());
    }

    #[tokio::test]
    async fn streams_until_terminal() {
        let store = Arc::new(StatusStore::new());
        store.begin("t1", "a.pdf").unwrap();

        let writer = {
            let store = Arc::clone(&store);
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(20)).await;
                store.advance("t1", PipelineStep::ExtractingText).unwrap();
                tokio::time::sleep(Duration::from_millis(20)).await;
                store.fail("t1", "boom").unwrap();
            })
        };

        let frames: Vec<StatusFrame> =
            status_events(Arc::clone(&store), "t1", Duration::from_millis(5))
                .collect()
                .await;
        writer.await.unwrap();

        assert!(frames.len() >= 2);
        let last = frames.last().unwrap();
        match last {
            StatusFrame::Status(r) => {
                assert_eq!(r.error.as_deref(), Some("boom"));
                assert_eq!(r.current_step, "Error occurred");
            }
            other => panic!("unexpected final frame: {other:?}"),
        }
        // Only the last frame is terminal.
        assert!(frames[..frames.len() - 1].iter().all(|f| !f.is_final()));

        let mut last_progress = 0;
        for f in &frames {
            if let StatusFrame::Status(r) = f {
                assert!(r.progress >= last_progress);
                last_progress = r.progress;
            }
        }
    }

    #[test]
    fn sse_frame_format() {
        let frame = StatusFrame::Status(StatusRecord {
            status: crate::status::TaskStatus::Processing,
            file_name: "a.pdf".into(),
            current_step: "Extracting text".into(),
            progress: 25,
            error: None,
        });
        assert_eq!(
            frame.to_sse(),
            "data: {\"status\":\"Processing\",\"file_name\":\"a.pdf\",\"current_step\":\"Extracting text\",\"progress\":25}\n\n"
        );
    }
}
