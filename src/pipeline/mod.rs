//! Pipeline stages for document classification.
//!
//! Each submodule implements one step, so each can be tested alone and the
//! two external dependencies (the OCR stack and the LLM) sit behind traits
//! that tests replace.
//!
//! ## Data Flow
//!
//! ```text
//! workspace ──▶ render ──▶ ocr ──▶ select ──▶ oracle ⇄ reply ──▶ organize
//! (scratch dir) (pdfium)  (tesseract) (keywords) (LLM, retry)     (record, copy)
//! ```
//!
//! 1. [`workspace`]: per-task scratch directory, removed on every exit path
//! 2. [`render`]:  rasterise the leading pages; blocking, run off the runtime
//! 3. [`ocr`]:     Tesseract over each grayscale page image
//! 4. [`extract`]: glues 2 and 3 behind [`extract::PageExtractor`] and
//!    normalises whitespace
//! 5. [`select`]:  forward only pages mentioning an abstract/overview
//! 6. [`oracle`]:  ask the LLM, retrying replies that [`reply`] rejects
//! 7. [`organize`]: hand the result to a recorder and file the document

pub mod extract;
pub mod ocr;
pub mod oracle;
pub mod organize;
pub mod render;
pub mod reply;
pub mod select;
pub mod workspace;
