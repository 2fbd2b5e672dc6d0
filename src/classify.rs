//! The classification runtime: drives one document through the pipeline.
//!
//! A [`Classifier`] owns everything a pipeline run needs (configuration,
//! oracle, extractor, status store, optional recorder and statistics log)
//! and is cheap to clone, so one instance can serve any number of
//! concurrent documents.
//!
//! ```text
//! begin ─▶ workspace ─▶ extract ─▶ select ─▶ classify ─▶ resolve ─▶ record ─▶ store ─▶ stats ─▶ release ─▶ complete
//!  0%                    25%                               75%        85%        95%                          100%
//! ```
//!
//! Any fatal error on the way ends the task as `Failed`, with the workspace
//! already removed by the time the status flips.

use crate::category::CategorySet;
use crate::config::ClassifierConfig;
use crate::error::ClassifyError;
use crate::output::ClassificationOutcome;
use crate::pipeline::extract::{extract_pages, OcrPageExtractor, PageExtractor};
use crate::pipeline::oracle::{classify_text, ClassificationOracle, LlmOracle};
use crate::pipeline::organize::{copy_to_storage, ClassificationRecord, ClassificationRecorder};
use crate::pipeline::select::select_pages;
use crate::pipeline::workspace::{validate_task_id, Workspace};
use crate::stats::{StatisticsLog, StatisticsRecord};
use crate::status::{PipelineStep, StatusStore};
use crate::stream::{self, StatusStream};
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// One document to classify.
#[derive(Debug, Clone)]
pub struct ClassificationRequest {
    pub task_id: String,
    pub file_name: String,
    pub bytes: Vec<u8>,
    /// Target categories, in the order the confidence vector follows.
    pub categories: Vec<String>,
}

impl ClassificationRequest {
    pub fn new<I, S>(
        task_id: impl Into<String>,
        file_name: impl Into<String>,
        bytes: Vec<u8>,
        categories: I,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            task_id: task_id.into(),
            file_name: file_name.into(),
            bytes,
            categories: categories.into_iter().map(Into::into).collect(),
        }
    }
}

/// Runs classification pipelines and tracks their status.
#[derive(Clone)]
pub struct Classifier {
    config: Arc<ClassifierConfig>,
    oracle: Arc<dyn ClassificationOracle>,
    extractor: Arc<dyn PageExtractor>,
    store: Arc<StatusStore>,
    recorder: Option<Arc<dyn ClassificationRecorder>>,
    statistics: Option<StatisticsLog>,
}

impl Classifier {
    /// A classifier using the given oracle and the pdfium/Tesseract extractor.
    pub fn new(config: ClassifierConfig, oracle: Arc<dyn ClassificationOracle>) -> Self {
        let extractor = Arc::new(OcrPageExtractor::from_config(&config));
        Self {
            config: Arc::new(config),
            oracle,
            extractor,
            store: Arc::new(StatusStore::new()),
            recorder: None,
            statistics: None,
        }
    }

    /// A classifier whose oracle is the LLM provider resolved from `config`.
    pub async fn from_config(config: ClassifierConfig) -> Result<Self, ClassifyError> {
        let oracle = LlmOracle::from_config(&config).await?;
        Ok(Self::new(config, Arc::new(oracle)))
    }

    pub fn with_extractor(mut self, extractor: Arc<dyn PageExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn with_recorder(mut self, recorder: Arc<dyn ClassificationRecorder>) -> Self {
        self.recorder = Some(recorder);
        self
    }

    pub fn with_statistics(mut self, log: StatisticsLog) -> Self {
        self.statistics = Some(log);
        self
    }

    /// Share a status store with other components (e.g. an HTTP layer).
    pub fn with_store(mut self, store: Arc<StatusStore>) -> Self {
        self.store = store;
        self
    }

    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<StatusStore> {
        &self.store
    }

    /// Poll `task_id` at the configured interval until it finishes.
    pub fn status_events(&self, task_id: impl Into<String>) -> StatusStream {
        stream::status_events(
            Arc::clone(&self.store),
            task_id,
            self.config.status_poll_interval,
        )
    }

    /// Generate a task id, start the pipeline in the background, and return
    /// the id.
    pub fn submit<I, S>(&self, bytes: Vec<u8>, file_name: impl Into<String>, categories: I) -> String
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let task_id = uuid::Uuid::new_v4().to_string();
        let request = ClassificationRequest::new(task_id.clone(), file_name, bytes, categories);
        drop(self.spawn(request));
        task_id
    }

    /// Start the pipeline on its own tokio task.
    ///
    /// The status record exists when this returns, so a reader attaching
    /// right away never sees an unknown id. The handle may be dropped; the
    /// outcome is reflected in the status store either way.
    pub fn spawn(
        &self,
        request: ClassificationRequest,
    ) -> JoinHandle<Result<ClassificationOutcome, ClassifyError>> {
        if let Err(e) = self.store.begin(&request.task_id, &request.file_name) {
            warn!("Task {}: {}", request.task_id, e);
        }
        let this = self.clone();
        tokio::spawn(async move { this.run(request).await })
    }

    /// Run the pipeline to completion on the current task.
    ///
    /// The outcome is also reflected in the status store: `Completed` on
    /// `Ok`, `Failed` with the error message on `Err`.
    pub async fn run(&self, request: ClassificationRequest) -> Result<ClassificationOutcome, ClassifyError> {
        let task_id = request.task_id.clone();
        self.store
            .begin(&task_id, &request.file_name)
            .map_err(|e| ClassifyError::Internal(e.to_string()))?;
        info!("Task {}: starting scan of '{}'", task_id, request.file_name);

        let result = AssertUnwindSafe(self.drive(&request))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| {
                Err(ClassifyError::Internal(format!(
                    "pipeline panicked: {}",
                    panic_message(panic.as_ref())
                )))
            });

        match &result {
            Ok(outcome) => {
                info!(
                    "Task {}: classified as '{}' in {}ms",
                    task_id, outcome.category, outcome.duration_ms
                );
                if let Err(e) = self.store.complete(&task_id) {
                    warn!("Task {}: {}", task_id, e);
                }
            }
            Err(e) => {
                error!("Task {}: {}", task_id, e);
                if let Err(se) = self.store.fail(&task_id, e.to_string()) {
                    warn!("Task {}: {}", task_id, se);
                }
            }
        }
        result
    }

    /// The pipeline proper. The workspace is released before returning on
    /// every path, including unwinding.
    async fn drive(&self, request: &ClassificationRequest) -> Result<ClassificationOutcome, ClassifyError> {
        let start = Instant::now();
        let task_id = request.task_id.as_str();
        let file_name = request.file_name.as_str();

        validate_task_id(task_id)?;
        let categories = CategorySet::new(request.categories.iter().cloned())?;
        if request.bytes.is_empty() {
            return Err(ClassifyError::EmptyInput);
        }

        let workspace = Workspace::acquire(&self.config.workspace_root, task_id).await?;
        let source = workspace.write_source(file_name, &request.bytes).await?;

        // ── Extract ──────────────────────────────────────────────────────
        self.advance(task_id, PipelineStep::ExtractingText);
        let pages = extract_pages(self.extractor.as_ref(), task_id, &source, workspace.path()).await;

        // ── Select ───────────────────────────────────────────────────────
        let selection = select_pages(&pages, &self.config.keywords);
        if selection.fell_back {
            debug!("Task {}: no keyword hits, forwarding all {} pages", task_id, pages.len());
        } else {
            debug!("Task {}: forwarding pages {:?}", task_id, selection.selected);
        }
        if selection.text.trim().is_empty() {
            return Err(ClassifyError::EmptyText { pages: pages.len() });
        }

        // ── Classify ─────────────────────────────────────────────────────
        let classification = classify_text(
            self.oracle.as_ref(),
            task_id,
            &selection.text,
            &categories,
            &self.config.retry,
            self.config.system_prompt.as_deref(),
        )
        .await?;

        // ── Organize ─────────────────────────────────────────────────────
        self.advance(task_id, PipelineStep::OrganizingFiles);
        let category = categories
            .resolve(&classification.label)
            .ok_or_else(|| ClassifyError::UnknownCategory {
                label: classification.label.clone(),
                expected: categories.names().join(", "),
            })?
            .to_string();

        self.advance(task_id, PipelineStep::UpdatingDatabase);
        if let Some(ref recorder) = self.recorder {
            let record = ClassificationRecord::new(file_name, &category, &classification.confidence);
            recorder.record(&record).await?;
        }

        self.advance(task_id, PipelineStep::CopyingToStorage);
        let stored_at = copy_to_storage(&source, &self.config.storage_root, &category, file_name).await?;

        // Only documents that made it into storage are counted.
        if let Some(ref log) = self.statistics {
            let row = StatisticsRecord::new(
                file_name,
                selection.hits.clone(),
                classification.confidence.clone(),
            );
            if let Err(e) = log.append(&row).await {
                warn!("Task {}: statistics not written: {}", task_id, e);
            }
        }

        workspace.release().await;

        Ok(ClassificationOutcome {
            task_id: task_id.to_string(),
            file_name: file_name.to_string(),
            category,
            classification,
            page_count: pages.len(),
            selection,
            stored_at,
            duration_ms: start.elapsed().as_millis() as u64,
        })
    }

    fn advance(&self, task_id: &str, step: PipelineStep) {
        debug!("Task {}: {} ({}%)", task_id, step.label(), step.progress());
        if let Err(e) = self.store.advance(task_id, step) {
            warn!("Task {}: {}", task_id, e);
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn panic_payloads_are_readable() {
        let p: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(p.as_ref()), "boom");
        let p: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(p.as_ref()), "bang");
        let p: Box<dyn Any + Send> = Box::new(42u8);
        assert_eq!(panic_message(p.as_ref()), "unknown panic");
    }

    #[test]
    fn request_collects_categories() {
        let r = ClassificationRequest::new("t", "a.pdf", vec![1], ["A", "B"]);
        assert_eq!(r.categories, vec!["A".to_string(), "B".to_string()]);
    }
}
