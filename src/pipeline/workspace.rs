//! Per-task scratch directories.
//!
//! A [`Workspace`] owns `<root>/<task_id>/` for the lifetime of one pipeline
//! run. The directory is removed by [`Workspace::release`] or, failing that,
//! when the handle is dropped, so early returns and panics clean up too.
//! Removal errors are logged and swallowed: a leftover temp directory is not
//! worth failing a classification over.

use crate::error::ClassifyError;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Used when the caller's file name has no usable final component.
const FALLBACK_FILE_NAME: &str = "document.pdf";

/// Handle to a task's scratch directory. Deletes it on drop.
#[derive(Debug)]
pub struct Workspace {
    path: PathBuf,
    released: bool,
}

impl Workspace {
    /// Create `<root>/<task_id>/`, including missing parents.
    pub async fn acquire(root: &Path, task_id: &str) -> Result<Self, ClassifyError> {
        validate_task_id(task_id)?;
        let path = root.join(task_id);
        tokio::fs::create_dir_all(&path)
            .await
            .map_err(|source| ClassifyError::Workspace {
                path: path.clone(),
                source,
            })?;
        debug!("Task {}: workspace {}", task_id, path.display());
        Ok(Self {
            path,
            released: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write the uploaded bytes into the workspace and return their path.
    ///
    /// Only the final component of `file_name` is used.
    pub async fn write_source(&self, file_name: &str, bytes: &[u8]) -> Result<PathBuf, ClassifyError> {
        let target = self.path.join(sanitise_file_name(file_name));
        tokio::fs::write(&target, bytes)
            .await
            .map_err(|source| ClassifyError::Workspace {
                path: target.clone(),
                source,
            })?;
        Ok(target)
    }

    /// Path for a named intermediate file inside the workspace.
    pub fn artifact_path(&self, name: &str) -> PathBuf {
        self.path.join(sanitise_file_name(name))
    }

    /// Remove the directory now rather than at drop, without blocking the
    /// runtime.
    pub async fn release(mut self) {
        self.released = true;
        log_removal(&self.path, tokio::fs::remove_dir_all(&self.path).await);
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        if !self.released {
            self.released = true;
            log_removal(&self.path, std::fs::remove_dir_all(&self.path));
        }
    }
}

fn log_removal(path: &Path, result: std::io::Result<()>) {
    match result {
        Ok(()) => debug!("Removed workspace {}", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to remove workspace {}: {}", path.display(), e),
    }
}

/// Reject ids that would escape the workspace root.
pub fn validate_task_id(task_id: &str) -> Result<(), ClassifyError> {
    let bad = task_id.trim().is_empty()
        || task_id == "."
        || task_id == ".."
        || task_id.contains(['/', '\\'])
        || task_id.contains('\0');
    if bad {
        return Err(ClassifyError::InvalidTaskId {
            task_id: task_id.to_string(),
        });
    }
    Ok(())
}

/// Final path component of `name`, or a fixed fallback.
pub fn sanitise_file_name(name: &str) -> String {
    // Treat backslashes as separators too; uploads come from any OS.
    let last = name.rsplit(['/', '\\']).next().unwrap_or("");
    let last = last.trim();
    match Path::new(last).file_name().and_then(|s| s.to_str()) {
        Some(s) if !s.is_empty() && s != "." && s != ".." => s.to_string(),
        _ => FALLBACK_FILE_NAME.to_string(),
    }
}
