//! Result types produced by the classification pipeline.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Keyword → 1-indexed page numbers on which it was found, in page order.
pub type KeywordHits = BTreeMap<String, Vec<usize>>;

/// Per-category scores in 0–100, aligned with the [`crate::CategorySet`]
/// order. Each score is independent; they are not expected to sum to 100.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Confidence(pub Vec<u8>);

impl Confidence {
    pub fn values(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Rendered as `[10, 80, 10]`, the form handed to the recorder and the
/// statistics log.
impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, v) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{v}")?;
        }
        f.write_str("]")
    }
}

/// The outcome of keyword page selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordSelection {
    /// Every keyword that matched at least once.
    pub hits: KeywordHits,
    /// Sorted, duplicate-free pages forwarded to the oracle (1-indexed).
    pub selected: Vec<usize>,
    /// `true` when no keyword matched and every page was forwarded.
    pub fell_back: bool,
    /// The text handed to the oracle.
    pub text: String,
}

/// A label and its confidence vector, as parsed from the oracle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    pub label: String,
    pub confidence: Confidence,
    /// 1-indexed attempt on which the reply parsed.
    pub attempts: u32,
}

/// Everything a successful pipeline run produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassificationOutcome {
    pub task_id: String,
    pub file_name: String,
    /// The label resolved onto one of the supplied category names.
    pub category: String,
    pub classification: Classification,
    /// Number of pages that came out of extraction.
    pub page_count: usize,
    pub selection: KeywordSelection,
    /// Where the document was copied to.
    pub stored_at: std::path::PathBuf,
    pub duration_ms: u64,
}
