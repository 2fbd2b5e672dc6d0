//! # edgequake-pdfclassify
//!
//! Sort PDF documents into caller-defined categories with OCR and an LLM.
//!
//! ## Why this crate?
//!
//! Scanned theses and reports rarely carry usable metadata, and their text
//! layer is often missing or wrong. This crate OCRs the first few pages
//! (Thai and English), keeps only the pages that look like an abstract or
//! overview, and asks an LLM which category fits best, with a confidence
//! score per category. The answer must match a strict grammar; replies that
//! don't are retried rather than guessed at.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF bytes
//!  │
//!  ├─ 1. Workspace  per-task scratch directory (always cleaned up)
//!  ├─ 2. Render     pages 1–7 via pdfium (spawn_blocking)
//!  ├─ 3. OCR        grayscale → Tesseract eng+tha, whitespace removed
//!  ├─ 4. Select     pages mentioning บทคัดย่อ / abstract / overview
//!  ├─ 5. Classify   LLM reply `<label>,[v1,…,vN]`, up to 5 attempts
//!  └─ 6. Organize   record the result, copy to storage/<label>/
//! ```
//!
//! Each step is reported through a [`StatusStore`] that readers can poll or
//! stream as server-sent events.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_pdfclassify::{ClassificationRequest, Classifier, ClassifierConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from OPENAI_API_KEY / ANTHROPIC_API_KEY / GEMINI_API_KEY
//!     let classifier = Classifier::from_config(ClassifierConfig::default()).await?;
//!     let bytes = std::fs::read("thesis.pdf")?;
//!     let request = ClassificationRequest::new(
//!         "task-1",
//!         "thesis.pdf",
//!         bytes,
//!         ["MobileApp", "WebApp", "HardwareIOT"],
//!     );
//!     let outcome = classifier.run(request).await?;
//!     println!("{} {}", outcome.category, outcome.classification.confidence);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdfclassify` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! ## Native Dependencies
//!
//! Rendering needs a pdfium shared library (`PDFIUM_LIB_PATH` or a system
//! install); OCR needs Tesseract with the `eng` and `tha` language packs.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod category;
pub mod classify;
pub mod config;
pub mod error;
pub mod keywords;
pub mod output;
pub mod pipeline;
pub mod prompts;
pub mod retry;
pub mod stats;
pub mod status;
pub mod stream;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use category::CategorySet;
pub use classify::{ClassificationRequest, Classifier};
pub use config::{ClassifierConfig, ClassifierConfigBuilder, PageSelection};
pub use error::{ClassifyError, ExtractionError, OracleError, StatusError};
pub use keywords::KeywordSet;
pub use output::{Classification, ClassificationOutcome, Confidence, KeywordHits, KeywordSelection};
pub use pipeline::extract::{OcrPageExtractor, PageExtractor};
pub use pipeline::oracle::{ClassificationOracle, LlmOracle};
pub use pipeline::organize::{ClassificationRecord, ClassificationRecorder, JsonLinesRecorder};
pub use pipeline::reply::{parse_reply, ReplyError};
pub use retry::{Backoff, RetryPolicy};
pub use stats::{StatisticsLog, StatisticsRecord};
pub use status::{PipelineStep, StatusRecord, StatusStore, TaskStatus};
pub use stream::{sse_events, status_events, StatusFrame, StatusStream};
