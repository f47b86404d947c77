//! Optional persistence of evidence documents for auditing.

use agrisearch_core::{AppError, AppResult};
use async_trait::async_trait;
use std::path::PathBuf;

/// Destination for a run's evidence document.
#[async_trait]
pub trait EvidenceSink: Send + Sync {
    /// Store the document and return a handle (path, URL, key) to it.
    async fn write(&self, run_id: &str, document: &str) -> AppResult<String>;
}

/// Writes `<dir>/<run_id>.md`.
#[derive(Debug, Clone)]
pub struct FileSink {
    dir: PathBuf,
}

impl FileSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

#[async_trait]
impl EvidenceSink for FileSink {
    async fn write(&self, run_id: &str, document: &str) -> AppResult<String> {
        if run_id.is_empty() || run_id.contains(['/', '\\']) || run_id.contains("..") {
            return Err(AppError::Other(format!("Invalid run id: {:?}", run_id)));
        }

        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.dir.join(format!("{}.md", run_id));
        tokio::fs::write(&path, document).await?;

        tracing::debug!(path = ?path, "Saved evidence document");
        Ok(path.display().to_string())
    }
}
