//! Filesystem adapters for chaosflow.
//!
//! Resolves the data directory and the workflows directory, locates workflow
//! files named on the command line, and writes converted documents.

use std::path::{Path, PathBuf};

use chaosflow_core::workflow::definition::{DecodedWorkflowFile, WorkflowError, discover_workflows};
use chaosflow_types::config::ChaosflowConfig;

/// Local filesystem access through `tokio::fs`.
#[derive(Debug, Clone)]
pub struct LocalFileSystem {
    workflows_dir: PathBuf,
}

impl LocalFileSystem {
    pub fn new(workflows_dir: impl Into<PathBuf>) -> Self {
        Self {
            workflows_dir: workflows_dir.into(),
        }
    }

    /// Build from configuration: `workflows_dir` when set (relative paths are
    /// taken relative to `data_dir`), otherwise `{data_dir}/workflows`.
    pub fn from_config(config: &ChaosflowConfig, data_dir: &Path) -> Self {
        let workflows_dir = match &config.workflows_dir {
            Some(dir) if dir.is_absolute() => dir.clone(),
            Some(dir) => data_dir.join(dir),
            None => data_dir.join("workflows"),
        };
        Self::new(workflows_dir)
    }

    pub fn workflows_dir(&self) -> &Path {
        &self.workflows_dir
    }

    /// Locate a workflow file.
    ///
    /// A path that exists as given wins; otherwise a relative path is looked up
    /// inside the workflows directory. Falls back to the path as given so the
    /// caller reports the original name.
    pub async fn resolve(&self, file: &Path) -> PathBuf {
        if file.is_absolute() || exists(file).await {
            return file.to_path_buf();
        }
        let candidate = self.workflows_dir.join(file);
        if exists(&candidate).await {
            tracing::debug!(path = %candidate.display(), "resolved workflow in workflows dir");
            return candidate;
        }
        file.to_path_buf()
    }

    pub async fn read_file(&self, path: &Path) -> Result<String, std::io::Error> {
        tokio::fs::read_to_string(path).await
    }

    /// Write `content`, creating parent directories as needed.
    pub async fn write_file(&self, path: &Path, content: &str) -> Result<(), std::io::Error> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, content).await
    }

    /// Every decodable workflow file under the workflows directory.
    pub async fn discover(&self) -> Result<Vec<DecodedWorkflowFile>, WorkflowError> {
        let dir = self.workflows_dir.clone();
        tokio::task::spawn_blocking(move || discover_workflows(&dir))
            .await
            .map_err(|e| WorkflowError::IoError(std::io::Error::other(e)))?
    }
}

async fn exists(path: &Path) -> bool {
    tokio::fs::try_exists(path).await.unwrap_or(false)
}

/// Resolve the data directory from environment or platform defaults.
///
/// Priority:
/// 1. `CHAOSFLOW_DATA_DIR` environment variable
/// 2. `~/.chaosflow`
pub fn resolve_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("CHAOSFLOW_DATA_DIR") {
        return PathBuf::from(dir);
    }

    if let Some(home) = dirs::home_dir() {
        return home.join(".chaosflow");
    }

    // Last resort: current directory
    PathBuf::from(".chaosflow")
}
