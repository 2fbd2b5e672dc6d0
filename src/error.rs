//! Error types for the edgequake-pdfclassify library.
//!
//! Failures are split by how far they are allowed to travel:
//!
//! * [`ClassifyError`]: **Fatal** for one task: the document cannot be
//!   classified (empty upload, no text, the oracle never answered in the
//!   expected grammar). The pipeline turns it into a `Failed` status record;
//!   it never escapes the task's unit of work.
//!
//! * [`ExtractionError`]: **Non-fatal**: rasterisation or OCR broke down.
//!   The extractor logs it and reports zero pages. It only becomes fatal
//!   indirectly, as [`ClassifyError::EmptyText`].
//!
//! * [`OracleError`]: the oracle transport failed (network, auth, quota).
//!
//! * [`StatusError`]: an illegal transition was requested from the
//!   [`crate::status::StatusStore`].

use std::path::PathBuf;
use thiserror::Error;

use crate::status::TaskStatus;

/// All fatal, per-task errors returned by the edgequake-pdfclassify library.
#[derive(Debug, Error)]
pub enum ClassifyError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// The uploaded document has zero bytes.
    #[error("PDF file is empty")]
    EmptyInput,

    /// The task id cannot be used as a workspace directory name.
    #[error("Invalid task id '{task_id}': must be non-empty and contain no path separators")]
    InvalidTaskId { task_id: String },

    /// The caller-supplied category list is unusable.
    #[error("Invalid categories: {0}")]
    InvalidCategories(String),

    // ── Workspace errors ──────────────────────────────────────────────────
    /// The per-task scratch directory could not be created or written.
    #[error("Workspace error at '{path}': {source}")]
    Workspace {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Extraction / selection errors ─────────────────────────────────────
    /// Nothing readable came out of extraction and page selection.
    #[error("No text could be extracted from the document ({pages} pages recognised)")]
    EmptyText { pages: usize },

    // ── Oracle errors ─────────────────────────────────────────────────────
    /// The configured provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// The oracle call itself failed; this is not retried.
    #[error("Classification oracle unavailable: {0}")]
    OracleUnavailable(#[from] OracleError),

    /// Every attempt produced a reply outside the `<label>,[v1,...,vN]` grammar.
    #[error("AI response format is incorrect after {attempts} attempts: {last_error}")]
    ClassificationFormat { attempts: u32, last_error: String },

    /// The oracle named a category that matches none of the supplied ones.
    #[error("Oracle returned unknown category '{label}' (expected one of: {expected})")]
    UnknownCategory { label: String, expected: String },

    // ── Organizing errors ─────────────────────────────────────────────────
    /// The external recorder rejected the classification.
    #[error("Failed to record classification: {0}")]
    RecorderFailed(String),

    /// Copying the source document into storage failed.
    #[error("Failed to copy document to '{path}': {source}")]
    StorageFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error, including a panic inside a pipeline.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal failure while turning the document into page text.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum ExtractionError {
    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\
Set PDFIUM_LIB_PATH=/path/to/libpdfium or install pdfium system-wide."
    )]
    PdfiumBindingFailed(String),

    /// The PDF could not be opened.
    #[error("PDF '{path}' could not be opened: {detail}")]
    CorruptPdf { path: PathBuf, detail: String },

    /// pdfium returned an error for a specific page.
    #[error("Page {page}: rasterisation failed: {detail}")]
    RenderFailed { page: usize, detail: String },

    /// The grayscale page image could not be written to the workspace.
    #[error("Page {page}: could not write page image: {detail}")]
    ArtifactFailed { page: usize, detail: String },

    /// Tesseract failed on a page.
    #[error("Page {page}: OCR failed: {detail}")]
    OcrFailed { page: usize, detail: String },

    /// The blocking extraction worker panicked or was cancelled.
    #[error("Extraction worker failed: {0}")]
    WorkerFailed(String),
}

/// The oracle could not be reached or refused the request.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct OracleError {
    pub message: String,
}

impl OracleError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// An illegal status transition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StatusError {
    #[error("Unknown Task ID '{0}'")]
    UnknownTask(String),

    #[error("Task '{task_id}' is already {status:?}; terminal states are final")]
    AlreadyTerminal { task_id: String, status: TaskStatus },

    #[error("Task '{task_id}' progress cannot go back from {from} to {to}")]
    ProgressRegression { task_id: String, from: u8, to: u8 },
}
