//! Hand-off of a finished classification: record it, then file the document.
//!
//! The recorder is whatever keeps track of classified documents (a database
//! in a web deployment, a JSON-lines file for the CLI). Storage is a plain
//! directory tree: `<storage_root>/<category>/<file_name>`.

use crate::error::ClassifyError;
use crate::output::Confidence;
use crate::pipeline::workspace::sanitise_file_name;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::debug;

/// What gets handed to a [`ClassificationRecorder`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationRecord {
    pub file_name: String,
    pub label: String,
    /// The confidence vector in list form, e.g. `[10, 80, 10]`.
    pub confidence: String,
    pub recorded_at: DateTime<Utc>,
}

impl ClassificationRecord {
    pub fn new(file_name: impl Into<String>, label: impl Into<String>, confidence: &Confidence) -> Self {
        Self {
            file_name: file_name.into(),
            label: label.into(),
            confidence: confidence.to_string(),
            recorded_at: Utc::now(),
        }
    }
}

/// External sink for classification results.
#[async_trait]
pub trait ClassificationRecorder: Send + Sync {
    async fn record(&self, record: &ClassificationRecord) -> Result<(), ClassifyError>;
}

/// Appends one JSON object per line to a file.
#[derive(Debug)]
pub struct JsonLinesRecorder {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonLinesRecorder {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl ClassificationRecorder for JsonLinesRecorder {
    async fn record(&self, record: &ClassificationRecord) -> Result<(), ClassifyError> {
        let mut line = serde_json::to_string(record)
            .map_err(|e| ClassifyError::RecorderFailed(e.to_string()))?;
        line.push('\n');

        let _guard = self.lock.lock().await;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| ClassifyError::RecorderFailed(format!("{}: {}", parent.display(), e)))?;
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| ClassifyError::RecorderFailed(format!("{}: {}", self.path.display(), e)))?;
        file.write_all(line.as_bytes())
            .await
            .map_err(|e| ClassifyError::RecorderFailed(format!("{}: {}", self.path.display(), e)))?;
        file.flush()
            .await
            .map_err(|e| ClassifyError::RecorderFailed(format!("{}: {}", self.path.display(), e)))?;
        Ok(())
    }
}

/// Copy `source` to `<storage_root>/<category>/<file_name>`.
///
/// An existing file with the same name is overwritten.
pub async fn copy_to_storage(
    source: &Path,
    storage_root: &Path,
    category: &str,
    file_name: &str,
) -> Result<PathBuf, ClassifyError> {
    let dir = storage_root.join(category);
    tokio::fs::create_dir_all(&dir)
        .await
        .map_err(|source| ClassifyError::StorageFailed {
            path: dir.clone(),
            source,
        })?;

    let dest = dir.join(sanitise_file_name(file_name));
    tokio::fs::copy(source, &dest)
        .await
        .map_err(|source| ClassifyError::StorageFailed {
            path: dest.clone(),
            source,
        })?;
    debug!("Copied {} → {}", source.display(), dest.display());
    Ok(dest)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn json_lines_append() {
        let dir = tempfile::tempdir().unwrap();
        let recorder = JsonLinesRecorder::new(dir.path().join("nested/records.jsonl"));
        let conf = Confidence(vec![10, 80, 10]);
        recorder
            .record(&ClassificationRecord::new("a.pdf", "WebApp", &conf))
            .await
            .unwrap();
        recorder
            .record(&ClassificationRecord::new("b.pdf", "MobileApp", &conf))
            .await
            .unwrap();

        let content = std::fs::read_to_string(recorder.path()).unwrap();
        let lines: Vec<ClassificationRecord> = content
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].file_name, "a.pdf");
        assert_eq!(lines[0].label, "WebApp");
        assert_eq!(lines[0].confidence, "[10, 80, 10]");
        assert_eq!(lines[1].label, "MobileApp");
    }

    #[tokio::test]
    async fn copies_into_category_folder() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("in.pdf");
        std::fs::write(&src, b"%PDF").unwrap();
        let storage = dir.path().join("storage");

        let dest = copy_to_storage(&src, &storage, "WebApp", "thesis.pdf").await.unwrap();
        assert_eq!(dest, storage.join("WebApp").join("thesis.pdf"));
        assert_eq!(std::fs::read(&dest).unwrap(), b"%PDF");
        assert!(src.exists());
    }

    #[tokio::test]
    async fn missing_source_is_a_storage_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = copy_to_storage(&dir.path().join("nope.pdf"), dir.path(), "WebApp", "x.pdf")
            .await
            .unwrap_err();
        assert!(matches!(err, ClassifyError::StorageFailed { .. }));
    }
}
