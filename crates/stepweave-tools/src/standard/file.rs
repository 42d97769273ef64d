//! # File System Tool
//!
//! Reads, writes and lists files below a fixed root directory. Paths given
//! by the planner are always relative to that root.

use async_trait::async_trait;
use serde_json::json;
use std::path::{Component, Path, PathBuf};
use stepweave_core::{ExecutionResult, FailureReason, ParamKind, ParameterSchema, Tool, ValidatedArgs};

/// Sandboxed file access.
#[derive(Debug, Clone)]
pub struct FileTool {
    root: PathBuf,
}

impl FileTool {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> Result<PathBuf, FailureReason> {
        let relative = Path::new(path);
        let inside = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
        if !inside {
            return Err(FailureReason::PermissionDenied {
                message: format!("path '{path}' escapes the workspace root"),
            });
        }
        Ok(self.root.join(relative))
    }

    async fn read(&self, path: &str) -> Result<serde_json::Value, FailureReason> {
        let target = self.resolve(path)?;
        let content = tokio::fs::read_to_string(&target)
            .await
            .map_err(|e| FailureReason::io(&e))?;
        Ok(json!({
            "path": path,
            "content": content,
            "size": content.len(),
        }))
    }

    async fn write(&self, path: &str, content: &str) -> Result<serde_json::Value, FailureReason> {
        let target = self.resolve(path)?;
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| FailureReason::io(&e))?;
        }
        tokio::fs::write(&target, content)
            .await
            .map_err(|e| FailureReason::io(&e))?;
        Ok(json!({
            "path": path,
            "bytes_written": content.len(),
        }))
    }

    async fn list(&self, path: &str) -> Result<serde_json::Value, FailureReason> {
        let target = self.resolve(path)?;
        let mut dir = tokio::fs::read_dir(&target)
            .await
            .map_err(|e| FailureReason::io(&e))?;

        let mut entries = Vec::new();
        while let Some(entry) = dir.next_entry().await.map_err(|e| FailureReason::io(&e))? {
            let metadata = entry.metadata().await.map_err(|e| FailureReason::io(&e))?;
            entries.push(json!({
                "name": entry.file_name().to_string_lossy(),
                "is_dir": metadata.is_dir(),
                "size": metadata.len(),
            }));
        }
        entries.sort_by(|a, b| a["name"].as_str().cmp(&b["name"].as_str()));

        Ok(json!({
            "path": path,
            "entries": entries,
        }))
    }
}

#[async_trait]
impl Tool for FileTool {
    fn name(&self) -> &str {
        "file"
    }

    fn description(&self) -> &str {
        "Read, write or list files in the run workspace"
    }

    fn input_schema(&self) -> ParameterSchema {
        ParameterSchema::new()
            .one_of("operation", &["read", "write", "list"], "file operation")
            .required("path", ParamKind::String, "path relative to the workspace root")
            .optional("content", ParamKind::String, "text to write (write only)")
    }

    async fn call(&self, args: ValidatedArgs) -> ExecutionResult {
        let operation = args.get_str("operation").unwrap_or_default();
        let path = args.get_str("path").unwrap_or_default();

        let result = match operation {
            "read" => self.read(path).await,
            "write" => match args.str_arg("content") {
                Ok(content) => self.write(path, content).await,
                Err(_) => Err(FailureReason::invalid_input("write requires 'content'")),
            },
            "list" => self.list(path).await,
            other => Err(FailureReason::invalid_input(format!(
                "unsupported operation '{other}'"
            ))),
        };
        result.into()
    }
}
