//! Configuration types for document classification.
//!
//! Everything the pipeline can be tuned with lives in [`ClassifierConfig`],
//! built via [`ClassifierConfigBuilder`]. One struct keeps runs comparable:
//! two configs can be diffed, logged, or shared across spawned tasks.

use crate::error::ClassifyError;
use crate::keywords::KeywordSet;
use crate::retry::RetryPolicy;
use edgequake_llm::LLMProvider;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Configuration for classifying documents.
///
/// # Example
/// ```rust
/// use edgequake_pdfclassify::{ClassifierConfig, PageSelection};
///
/// let config = ClassifierConfig::builder()
///     .pages(PageSelection::Range(1, 5))
///     .ocr_languages(["eng"])
///     .model("gpt-4.1-nano")
///     .build()
///     .unwrap();
/// assert_eq!(config.pages.to_indices(10), vec![0, 1, 2, 3, 4]);
/// ```
#[derive(Clone)]
pub struct ClassifierConfig {
    /// Rendering DPI handed to Tesseract as the source resolution. Range: 72–600. Default: 300.
    ///
    /// Tesseract's models are trained on ~300 DPI scans; Thai diacritics in
    /// particular get lost much below that.
    pub dpi: u32,

    /// Longest edge of a rendered page in pixels. Default: 2500.
    ///
    /// Caps memory on oversized pages (posters, A0 drawings) independently
    /// of DPI.
    pub max_rendered_pixels: u32,

    /// Pages to extract. Default: pages 1–7.
    ///
    /// Abstracts and overviews sit near the front of theses and reports, so
    /// OCR-ing the whole document buys nothing but latency.
    pub pages: PageSelection,

    /// Tesseract language packs, joined with `+`. Default: `["eng", "tha"]`.
    pub ocr_languages: Vec<String>,

    /// Tesseract page segmentation mode. Default: 4 (single column of
    /// variable-size text).
    pub ocr_page_seg_mode: u8,

    /// Path to the tessdata directory. If None, Tesseract's default is used.
    pub tessdata_path: Option<PathBuf>,

    /// Explicit pdfium shared library. If None, `PDFIUM_LIB_PATH`, then the
    /// working directory, then the system library are tried.
    pub pdfium_lib_path: Option<PathBuf>,

    /// Terms that mark a page as worth forwarding to the oracle.
    pub keywords: KeywordSet,

    /// How often an unparseable oracle reply is retried. Default: 5 attempts, 1 s apart.
    pub retry: RetryPolicy,

    /// LLM model identifier. If None, uses provider default.
    pub model: Option<String>,

    /// LLM provider name (e.g. "openai", "gemini", "ollama").
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Sampling temperature. Default: 0.0.
    ///
    /// The answer is one label and a short list of integers; creativity only
    /// produces grammar violations.
    pub temperature: f32,

    /// Maximum tokens the oracle may generate. Default: 256.
    pub max_tokens: usize,

    /// Custom system prompt. If None, uses built-in default.
    pub system_prompt: Option<String>,

    /// Parent of the per-task scratch directories.
    /// Default: `$TMPDIR/pdfclassify`.
    pub workspace_root: PathBuf,

    /// Classified documents are copied to `<storage_root>/<category>/`.
    /// Default: `./storage`.
    pub storage_root: PathBuf,

    /// Poll interval for status streams. Default: 1 s.
    pub status_poll_interval: Duration,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            dpi: 300,
            max_rendered_pixels: 2500,
            pages: PageSelection::default(),
            ocr_languages: vec!["eng".to_string(), "tha".to_string()],
            ocr_page_seg_mode: 4,
            tessdata_path: None,
            pdfium_lib_path: None,
            keywords: KeywordSet::default(),
            retry: RetryPolicy::default(),
            model: None,
            provider_name: None,
            provider: None,
            temperature: 0.0,
            max_tokens: 256,
            system_prompt: None,
            workspace_root: std::env::temp_dir().join("pdfclassify"),
            storage_root: PathBuf::from("storage"),
            status_poll_interval: Duration::from_secs(1),
        }
    }
}

impl fmt::Debug for ClassifierConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassifierConfig")
            .field("dpi", &self.dpi)
            .field("max_rendered_pixels", &self.max_rendered_pixels)
            .field("pages", &self.pages)
            .field("ocr_languages", &self.ocr_languages)
            .field("ocr_page_seg_mode", &self.ocr_page_seg_mode)
            .field("keywords", &self.keywords.len())
            .field("retry", &self.retry)
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("workspace_root", &self.workspace_root)
            .field("storage_root", &self.storage_root)
            .finish()
    }
}

impl ClassifierConfig {
    /// Create a new builder for `ClassifierConfig`.
    pub fn builder() -> ClassifierConfigBuilder {
        ClassifierConfigBuilder {
            config: Self::default(),
        }
    }

    /// Tesseract language string, e.g. `eng+tha`.
    pub fn ocr_language_string(&self) -> String {
        if self.ocr_languages.is_empty() {
            "eng".to_string()
        } else {
            self.ocr_languages.join("+")
        }
    }
}

/// Builder for [`ClassifierConfig`].
#[derive(Debug)]
pub struct ClassifierConfigBuilder {
    config: ClassifierConfig,
}

impl ClassifierConfigBuilder {
    pub fn dpi(mut self, dpi: u32) -> Self {
        self.config.dpi = dpi.clamp(72, 600);
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px.max(100);
        self
    }

    pub fn pages(mut self, selection: PageSelection) -> Self {
        self.config.pages = selection;
        self
    }

    pub fn ocr_languages<I, S>(mut self, langs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.ocr_languages = langs.into_iter().map(Into::into).collect();
        self
    }

    pub fn ocr_page_seg_mode(mut self, mode: u8) -> Self {
        self.config.ocr_page_seg_mode = mode;
        self
    }

    pub fn tessdata_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.tessdata_path = Some(path.into());
        self
    }

    pub fn pdfium_lib_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pdfium_lib_path = Some(path.into());
        self
    }

    pub fn keywords(mut self, keywords: KeywordSet) -> Self {
        self.config.keywords = keywords;
        self
    }

    pub fn retry(mut self, policy: RetryPolicy) -> Self {
        self.config.retry = policy;
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = Some(prompt.into());
        self
    }

    pub fn workspace_root(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.workspace_root = path.into();
        self
    }

    pub fn storage_root(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.storage_root = path.into();
        self
    }

    pub fn status_poll_interval(mut self, interval: Duration) -> Self {
        self.config.status_poll_interval = interval;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ClassifierConfig, ClassifyError> {
        let c = &self.config;
        if c.ocr_page_seg_mode > 13 {
            return Err(ClassifyError::InvalidConfig(format!(
                "Tesseract page segmentation mode must be 0–13, got {}",
                c.ocr_page_seg_mode
            )));
        }
        if c.max_tokens == 0 {
            return Err(ClassifyError::InvalidConfig(
                "max_tokens must be ≥ 1".into(),
            ));
        }
        if c.ocr_languages.iter().any(|l| l.trim().is_empty()) {
            return Err(ClassifyError::InvalidConfig(
                "OCR language codes must not be blank".into(),
            ));
        }
        if c.status_poll_interval.is_zero() {
            return Err(ClassifyError::InvalidConfig(
                "status poll interval must be > 0".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Specifies which pages of the PDF to extract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PageSelection {
    /// Every page.
    All,
    /// A single page (1-indexed).
    Single(usize),
    /// A contiguous range of pages (1-indexed, inclusive).
    Range(usize, usize),
    /// Specific pages (1-indexed, deduplicated).
    Set(Vec<usize>),
}

impl Default for PageSelection {
    fn default() -> Self {
        PageSelection::Range(1, 7)
    }
}

impl PageSelection {
    /// Expand the selection into a sorted, deduplicated list of 0-indexed page numbers.
    pub fn to_indices(&self, total_pages: usize) -> Vec<usize> {
        let mut indices: Vec<usize> = match self {
            PageSelection::All => (0..total_pages).collect(),
            PageSelection::Single(p) => {
                if *p >= 1 && *p <= total_pages {
                    vec![p - 1]
                } else {
                    vec![]
                }
            }
            PageSelection::Range(start, end) => {
                let s = (*start).max(1) - 1;
                let e = (*end).min(total_pages);
                (s..e).collect()
            }
            PageSelection::Set(pages) => pages
                .iter()
                .filter(|&&p| p >= 1 && p <= total_pages)
                .map(|p| p - 1)
                .collect(),
        };
        indices.sort_unstable();
        indices.dedup();
        indices
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = ClassifierConfig::default();
        assert_eq!(c.pages, PageSelection::Range(1, 7));
        assert_eq!(c.ocr_language_string(), "eng+tha");
        assert_eq!(c.ocr_page_seg_mode, 4);
        assert_eq!(c.retry, RetryPolicy::default());
        assert_eq!(c.status_poll_interval, Duration::from_secs(1));
    }

    #[test]
    fn default_pages_clip_to_document() {
        let sel = PageSelection::default();
        assert_eq!(sel.to_indices(3), vec![0, 1, 2]);
        assert_eq!(sel.to_indices(20), vec![0, 1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn page_selection_to_indices() {
        assert_eq!(PageSelection::All.to_indices(5), vec![0, 1, 2, 3, 4]);
        assert_eq!(PageSelection::Single(3).to_indices(5), vec![2]);
        assert_eq!(PageSelection::Single(6).to_indices(5), Vec::<usize>::new());
        assert_eq!(PageSelection::Range(2, 4).to_indices(5), vec![1, 2, 3]);
        assert_eq!(
            PageSelection::Set(vec![3, 1, 3]).to_indices(5),
            vec![0, 2] // deduplicated and sorted
        );
    }

    #[test]
    fn builder_clamps_and_validates() {
        let c = ClassifierConfig::builder().dpi(10).build().unwrap();
        assert_eq!(c.dpi, 72);

        assert!(ClassifierConfig::builder()
            .ocr_page_seg_mode(42)
            .build()
            .is_err());
        assert!(ClassifierConfig::builder().max_tokens(0).build().is_err());
        assert!(ClassifierConfig::builder()
            .ocr_languages(["eng", ""])
            .build()
            .is_err());
        assert!(ClassifierConfig::builder()
            .status_poll_interval(Duration::ZERO)
            .build()
            .is_err());
    }

    #[test]
    fn empty_language_list_falls_back_to_english() {
        let c = ClassifierConfig::builder()
            .ocr_languages(Vec::<String>::new())
            .build()
            .unwrap();
        assert_eq!(c.ocr_language_string(), "eng");
    }
}
