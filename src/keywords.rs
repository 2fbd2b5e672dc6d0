//! Keyword lists used to pick the pages worth sending to the oracle.
//!
//! Tesseract's Thai model regularly garbles "บทคัดย่อ" (abstract) by swapping
//! look-alike consonants or dropping tone marks. Matching is a plain
//! substring test, so the known misreadings are listed explicitly rather than
//! approximated with fuzzy matching.

use serde::{Deserialize, Serialize};

use crate::error::ClassifyError;
use crate::pipeline::extract::collapse_whitespace;

/// Terms every document type is searched for.
pub const CANONICAL_KEYWORDS: &[&str] = &["บทคัดย่อ", "abstract", "overview"];

/// Observed OCR misreadings of "บทคัดย่อ".
pub const THAI_ABSTRACT_MISREADINGS: &[&str] = &[
    "บทดัดย่อ",
    "บทดัคย่อ",
    "บทตัดย่อ",
    "บทคัตย่อ",
    "บทคัดยอ",
    "บทคัดย่อะ",
    "บทคัดั่อ",
    "บทคักย่อ",
    "บทคัตยอ",
    "บทคัทย่อ",
    "บทคัทยอ",
    "บทคัดย๊อ",
    "บทคัดแย่อ",
];

/// An ordered, duplicate-free list of search terms.
///
/// Terms are stored without whitespace, the same shape page text has after
/// extraction, so `"executive summary"` matches `"ExecutiveSummary"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct KeywordSet {
    terms: Vec<String>,
}

impl Default for KeywordSet {
    /// Canonical terms followed by the Thai misreadings.
    fn default() -> Self {
        let terms = CANONICAL_KEYWORDS
            .iter()
            .chain(THAI_ABSTRACT_MISREADINGS)
            .map(|s| s.to_string());
        Self::dedup(terms)
    }
}

impl KeywordSet {
    /// Build a keyword set from arbitrary terms.
    ///
    /// Whitespace is removed from each term. Duplicates are dropped (first
    /// occurrence wins); blank terms are rejected because a blank substring
    /// would match every page.
    pub fn new<I, S>(terms: I) -> Result<Self, ClassifyError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let terms: Vec<String> = terms
            .into_iter()
            .map(|t| collapse_whitespace(&Into::<String>::into(t)))
            .collect();
        if terms.iter().any(String::is_empty) {
            return Err(ClassifyError::InvalidConfig(
                "keywords must not be blank".into(),
            ));
        }
        Ok(Self::dedup(terms))
    }

    /// Append extra terms (e.g. misreadings for another language).
    pub fn extend<I, S>(mut self, terms: I) -> Result<Self, ClassifyError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let extra = Self::new(terms)?;
        for t in extra.terms {
            if !self.terms.contains(&t) {
                self.terms.push(t);
            }
        }
        Ok(self)
    }

    pub fn terms(&self) -> &[String] {
        &self.terms
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    fn dedup(terms: impl IntoIterator<Item = String>) -> Self {
        let mut out: Vec<String> = Vec::new();
        for t in terms {
            if !out.contains(&t) {
                out.push(t);
            }
        }
        Self { terms: out }
    }
}

impl TryFrom<Vec<String>> for KeywordSet {
    type Error = ClassifyError;

    fn try_from(v: Vec<String>) -> Result<Self, Self::Error> {
        Self::new(v)
    }
}

impl From<KeywordSet> for Vec<String> {
    fn from(k: KeywordSet) -> Self {
        k.terms
    }
}
