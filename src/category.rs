//! The caller-supplied list of target categories.
//!
//! Order matters: the oracle's confidence vector is positionally aligned to
//! it. Category names double as storage directory names, so they are
//! validated up front.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ClassifyError;

/// An ordered, non-empty list of unique category names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct CategorySet {
    names: Vec<String>,
}

impl CategorySet {
    pub fn new<I, S>(names: I) -> Result<Self, ClassifyError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut out: Vec<String> = Vec::new();
        for name in names {
            let name = name.into().trim().to_string();
            if name.is_empty() {
                return Err(ClassifyError::InvalidCategories(
                    "category names must not be blank".into(),
                ));
            }
            if name == "." || name == ".." || name.contains(['/', '\\']) {
                return Err(ClassifyError::InvalidCategories(format!(
                    "'{name}' cannot be used as a folder name"
                )));
            }
            // The reply grammar splits the label off at the first comma.
            if name.contains(',') {
                return Err(ClassifyError::InvalidCategories(format!(
                    "'{name}' contains a comma and could never be returned as a label"
                )));
            }
            if out.contains(&name) {
                return Err(ClassifyError::InvalidCategories(format!(
                    "'{name}' is listed twice"
                )));
            }
            out.push(name);
        }
        if out.is_empty() {
            return Err(ClassifyError::InvalidCategories(
                "at least one category is required".into(),
            ));
        }
        Ok(Self { names: out })
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Map an oracle label onto a category name.
    ///
    /// Exact match first; otherwise compare with case and every
    /// non-alphanumeric character (quotes, backticks, spaces) ignored.
    pub fn resolve(&self, label: &str) -> Option<&str> {
        if let Some(exact) = self.names.iter().find(|n| n.as_str() == label) {
            return Some(exact.as_str());
        }
        let wanted = normalise(label);
        if wanted.is_empty() {
            return None;
        }
        self.names
            .iter()
            .find(|n| normalise(n) == wanted)
            .map(String::as_str)
    }
}

fn normalise(s: &str) -> String {
    s.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Rendered as a bracketed, quoted list for the prompt: `['A', 'B']`.
impl fmt::Display for CategorySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, name) in self.names.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "'{name}'")?;
        }
        f.write_str("]")
    }
}

impl TryFrom<Vec<String>> for CategorySet {
    type Error = ClassifyError;

    fn try_from(v: Vec<String>) -> Result<Self, Self::Error> {
        Self::new(v)
    }
}

impl From<CategorySet> for Vec<String> {
    fn from(c: CategorySet) -> Self {
        c.names
    }
}
