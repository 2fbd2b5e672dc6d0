//! Page text extraction: render → grayscale → OCR.
//!
//! [`PageExtractor`] is the seam the pipeline talks to. The production
//! [`OcrPageExtractor`] renders with pdfium and recognises with Tesseract;
//! tests swap in an extractor that returns canned pages.
//!
//! Extraction failures are never fatal by themselves. [`extract_pages`]
//! logs them and hands back zero pages; the pipeline only fails later if
//! that leaves it with no text to classify.

use crate::config::{ClassifierConfig, PageSelection};
use crate::error::ExtractionError;
use crate::pipeline::ocr::OcrEngine;
use crate::pipeline::render::{bind_pdfium, render_pages_blocking};
use async_trait::async_trait;
use image::DynamicImage;
use once_cell::sync::Lazy;
use regex::Regex;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Turns a PDF on disk into one string per page, in page order.
#[async_trait]
pub trait PageExtractor: Send + Sync {
    /// `workspace_dir` may be used for intermediate files; it is deleted by
    /// the caller afterwards.
    async fn extract(&self, source: &Path, workspace_dir: &Path) -> Result<Vec<String>, ExtractionError>;
}

/// pdfium + Tesseract extractor.
#[derive(Clone)]
pub struct OcrPageExtractor {
    dpi: u32,
    max_rendered_pixels: u32,
    pages: PageSelection,
    pdfium_lib_path: Option<PathBuf>,
    ocr: OcrEngine,
}

impl OcrPageExtractor {
    pub fn from_config(config: &ClassifierConfig) -> Self {
        Self {
            dpi: config.dpi,
            max_rendered_pixels: config.max_rendered_pixels,
            pages: config.pages.clone(),
            pdfium_lib_path: config.pdfium_lib_path.clone(),
            ocr: OcrEngine::new(&config.ocr_languages, config.ocr_page_seg_mode, config.dpi)
                .with_tessdata(config.tessdata_path.clone()),
        }
    }

    fn extract_blocking(&self, source: &Path, workspace_dir: &Path) -> Result<Vec<String>, ExtractionError> {
        let pdfium = bind_pdfium(self.pdfium_lib_path.as_deref())?;
        let rendered = render_pages_blocking(
            &pdfium,
            source,
            self.dpi,
            self.max_rendered_pixels,
            &self.pages,
        )?;

        let mut texts = Vec::with_capacity(rendered.len());
        for (idx, image) in rendered {
            let page = idx + 1;
            let png = grayscale_png(&image, page)?;
            let artifact = workspace_dir.join(format!("page-{page:03}.png"));
            std::fs::write(&artifact, &png).map_err(|e| ExtractionError::ArtifactFailed {
                page,
                detail: format!("{}: {}", artifact.display(), e),
            })?;
            texts.push(self.ocr.recognize(&png, page)?);
        }
        Ok(texts)
    }
}

#[async_trait]
impl PageExtractor for OcrPageExtractor {
    async fn extract(&self, source: &Path, workspace_dir: &Path) -> Result<Vec<String>, ExtractionError> {
        let this = self.clone();
        let source = source.to_path_buf();
        let workspace_dir = workspace_dir.to_path_buf();
        tokio::task::spawn_blocking(move || this.extract_blocking(&source, &workspace_dir))
            .await
            .map_err(|e| ExtractionError::WorkerFailed(format!("Extraction task panicked: {}", e)))?
    }
}

/// Single-channel PNG encoding of a rendered page.
fn grayscale_png(image: &DynamicImage, page: usize) -> Result<Vec<u8>, ExtractionError> {
    let gray = DynamicImage::ImageLuma8(image.to_luma8());
    let mut buf = Vec::new();
    gray.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .map_err(|e| ExtractionError::ArtifactFailed {
            page,
            detail: format!("PNG encoding failed: {}", e),
        })?;
    Ok(buf)
}

static RE_WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Remove every whitespace run. Thai OCR output is littered with spurious
/// spaces and line breaks that split words, including the keywords.
pub fn collapse_whitespace(text: &str) -> String {
    RE_WHITESPACE.replace_all(text, "").into_owned()
}

/// Run `extractor`, normalise its pages, and swallow failures.
pub async fn extract_pages(
    extractor: &dyn PageExtractor,
    task_id: &str,
    source: &Path,
    workspace_dir: &Path,
) -> Vec<String> {
    match extractor.extract(source, workspace_dir).await {
        Ok(pages) => {
            info!("Task {}: extracted {} pages", task_id, pages.len());
            let pages: Vec<String> = pages.iter().map(|p| collapse_whitespace(p)).collect();
            for (i, p) in pages.iter().enumerate() {
                debug!("Task {}: page {} has {} chars", task_id, i + 1, p.chars().count());
            }
            pages
        }
        Err(e) => {
            warn!("Task {}: text extraction failed: {}", task_id, e);
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Failing;

    #[async_trait]
    impl PageExtractor for Failing {
        async fn extract(&self, _: &Path, _: &Path) -> Result<Vec<String>, ExtractionError> {
            Err(ExtractionError::CorruptPdf {
                path: PathBuf::from("x.pdf"),
                detail: "not a PDF".into(),
            })
        }
    }

    struct Fixed(Vec<&'static str>);

    #[async_trait]
    impl PageExtractor for Fixed {
        async fn extract(&self, _: &Path, _: &Path) -> Result<Vec<String>, ExtractionError> {
            Ok(self.0.iter().map(|s| s.to_string()).collect())
        }
    }

    #[test]
    fn whitespace_is_removed_not_trimmed() {
        assert_eq!(collapse_whitespace("  บท คัด\nย่อ \t abc  "), "บทคัดย่อabc");
        assert_eq!(collapse_whitespace("\n\n"), "");
    }

    #[tokio::test]
    async fn failures_become_zero_pages() {
        let dir = tempfile::tempdir().unwrap();
        let pages = extract_pages(&Failing, "t", &dir.path().join("x.pdf"), dir.path()).await;
        assert!(pages.is_empty());
    }

    #[tokio::test]
    async fn pages_are_normalised() {
        let dir = tempfile::tempdir().unwrap();
        let pages = extract_pages(
            &Fixed(vec!["a b", "\nAbs tract\n"]),
            "t",
            &dir.path().join("x.pdf"),
            dir.path(),
        )
        .await;
        assert_eq!(pages, vec!["ab".to_string(), "Abstract".to_string()]);
    }

    #[test]
    fn grayscale_png_is_single_channel() {
        let rgb = DynamicImage::ImageRgb8(image::RgbImage::from_pixel(4, 3, image::Rgb([200, 10, 10])));
        let png = grayscale_png(&rgb, 1).unwrap();
        let decoded = image::load_from_memory(&png).unwrap();
        assert_eq!(decoded.color(), image::ColorType::L8);
        assert_eq!((decoded.width(), decoded.height()), (4, 3));
    }
}
