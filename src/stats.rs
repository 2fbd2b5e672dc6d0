//! Append-only statistics log, one CSV row per classified document.
//!
//! Rows have no header so the file can be appended to by successive runs:
//!
//! ```text
//! 2026-01-05T09:12:44.101+00:00,thesis.pdf,2,"{""abstract"":[2,5],""overview"":[3]}","[10, 80, 10]"
//! ```
//!
//! Columns: timestamp (RFC 3339), file name, number of distinct keywords
//! that matched, keyword → pages as JSON, confidence vector.

use crate::output::{Confidence, KeywordHits};
use chrono::{DateTime, Utc};
use csv::WriterBuilder;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;

/// One row of the statistics log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatisticsRecord {
    pub timestamp: DateTime<Utc>,
    pub file_name: String,
    pub hits: KeywordHits,
    pub confidence: Confidence,
}

impl StatisticsRecord {
    pub fn new(file_name: impl Into<String>, hits: KeywordHits, confidence: Confidence) -> Self {
        Self {
            timestamp: Utc::now(),
            file_name: file_name.into(),
            hits,
            confidence,
        }
    }

    fn to_row(&self) -> Result<[String; 5], serde_json::Error> {
        Ok([
            self.timestamp.to_rfc3339(),
            self.file_name.clone(),
            self.hits.len().to_string(),
            serde_json::to_string(&self.hits)?,
            self.confidence.to_string(),
        ])
    }
}

/// Errors from the statistics log. Never fatal to a task.
#[derive(Debug, thiserror::Error)]
pub enum StatisticsError {
    #[error("statistics I/O on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("statistics CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("statistics JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("statistics worker failed: {0}")]
    Worker(String),
}

/// Serialises appends from concurrent pipelines onto one file.
#[derive(Debug, Clone)]
pub struct StatisticsLog {
    path: PathBuf,
    lock: Arc<Mutex<()>>,
}

impl StatisticsLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append `record` as one row.
    pub async fn append(&self, record: &StatisticsRecord) -> Result<(), StatisticsError> {
        let row = record.to_row()?;
        let path = self.path.clone();
        let _guard = self.lock.lock().await;
        tokio::task::spawn_blocking(move || append_row(&path, &row))
            .await
            .map_err(|e| StatisticsError::Worker(e.to_string()))?
    }
}

fn append_row(path: &Path, row: &[String; 5]) -> Result<(), StatisticsError> {
    let io_err = |source| StatisticsError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(io_err)?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(io_err)?;
    let mut writer = WriterBuilder::new().has_headers(false).from_writer(file);
    writer.write_record(row)?;
    writer.flush().map_err(io_err)?;
    Ok(())
}
