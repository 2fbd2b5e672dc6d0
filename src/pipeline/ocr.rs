//! Tesseract OCR over single page images.

use crate::error::ExtractionError;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

/// Shared Tesseract settings. A fresh `LepTess` handle is opened per page;
/// handles are not `Send` and must stay on the blocking thread.
#[derive(Clone)]
pub struct OcrEngine {
    inner: Arc<OcrEngineInner>,
}

struct OcrEngineInner {
    languages: String,
    page_seg_mode: u8,
    dpi: u32,
    tessdata: Option<PathBuf>,
}

impl OcrEngine {
    pub fn new(languages: &[String], page_seg_mode: u8, dpi: u32) -> Self {
        let lang_str = if languages.is_empty() {
            "eng".to_string()
        } else {
            languages.join("+")
        };

        Self {
            inner: Arc::new(OcrEngineInner {
                languages: lang_str,
                page_seg_mode,
                dpi,
                tessdata: None,
            }),
        }
    }

    /// Use a specific tessdata directory instead of Tesseract's default.
    pub fn with_tessdata(self, path: Option<PathBuf>) -> Self {
        let inner = &self.inner;
        Self {
            inner: Arc::new(OcrEngineInner {
                languages: inner.languages.clone(),
                page_seg_mode: inner.page_seg_mode,
                dpi: inner.dpi,
                tessdata: path,
            }),
        }
    }

    pub fn languages(&self) -> &str {
        &self.inner.languages
    }

    pub fn page_seg_mode(&self) -> u8 {
        self.inner.page_seg_mode
    }

    /// Recognise the text of one encoded page image (PNG).
    ///
    /// `page` is 1-indexed and only used for error reporting.
    pub fn recognize(&self, image_data: &[u8], page: usize) -> Result<String, ExtractionError> {
        let _span = tracing::info_span!("pipeline.ocr", page).entered();
        let fail = |detail: String| ExtractionError::OcrFailed { page, detail };

        if image_data.is_empty() {
            return Err(fail("empty image".into()));
        }

        let tessdata = self
            .inner
            .tessdata
            .as_ref()
            .and_then(|p| p.to_str());
        let mut lt = leptess::LepTess::new(tessdata, &self.inner.languages)
            .map_err(|e| fail(format!("Failed to initialize Tesseract: {}", e)))?;

        lt.set_variable(
            leptess::Variable::TesseditPagesegMode,
            &self.inner.page_seg_mode.to_string(),
        )
        .map_err(|e| fail(format!("Failed to set page segmentation mode: {:?}", e)))?;

        lt.set_image_from_mem(image_data)
            .map_err(|e| fail(format!("Failed to set image for OCR: {}", e)))?;
        lt.set_source_resolution(self.inner.dpi as i32);

        let text = lt
            .get_utf8_text()
            .map_err(|e| fail(format!("OCR failed: {}", e)))?;
        debug!("Page {}: {} chars recognised", page, text.chars().count());
        Ok(text)
    }
}
