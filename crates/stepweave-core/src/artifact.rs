//! Run artifact persistence.
//!
//! The orchestrator writes the run record, the subtask checklist and
//! per-step results through an [`ArtifactStore`]. Paths are always relative
//! to the store root.

use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("artifact path '{0}' must be relative and stay inside the store root")]
    InvalidPath(String),
    #[error("artifact I/O failed for '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Persistence for run artifacts.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Create or replace the file at `path`, creating parent directories.
    async fn write_file(&self, path: &str, contents: &str) -> Result<(), ArtifactError>;

    async fn read_file(&self, path: &str) -> Result<String, ArtifactError>;
}

/// [`ArtifactStore`] backed by a directory on disk.
#[derive(Debug, Clone)]
pub struct FsArtifactStore {
    root: PathBuf,
}

impl FsArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> Result<PathBuf, ArtifactError> {
        let relative = Path::new(path);
        let escapes = path.is_empty()
            || relative
                .components()
                .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if escapes {
            return Err(ArtifactError::InvalidPath(path.to_string()));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl ArtifactStore for FsArtifactStore {
    async fn write_file(&self, path: &str, contents: &str) -> Result<(), ArtifactError> {
        let target = self.resolve(path)?;
        let io_err = |source| ArtifactError::Io {
            path: path.to_string(),
            source,
        };
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
        }
        tokio::fs::write(&target, contents).await.map_err(io_err)?;
        tracing::debug!(path = %target.display(), bytes = contents.len(), "Wrote artifact");
        Ok(())
    }

    async fn read_file(&self, path: &str) -> Result<String, ArtifactError> {
        let target = self.resolve(path)?;
        tokio::fs::read_to_string(&target)
            .await
            .map_err(|source| ArtifactError::Io {
                path: path.to_string(),
                source,
            })
    }
}
