//! # Code Execution Tool
//!
//! Writes the planner's script to a fresh temporary directory and runs it
//! with a configured interpreter. The process is killed when the timeout
//! elapses. A non-zero exit status is reported as a failure carrying the
//! captured stderr.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::process::Stdio;
use std::time::Duration;
use stepweave_core::{ExecutionResult, FailureReason, ParamKind, ParameterSchema, Tool, ValidatedArgs};
use tokio::process::Command;

const STDERR_PREVIEW_CHARS: usize = 500;

/// Interpreter settings for [`CodeTool`].
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CodeToolConfig {
    /// Program used to run the script, e.g. `python3`.
    pub interpreter: String,
    /// Extra arguments placed before the script path.
    #[serde(default)]
    pub args: Vec<String>,
    /// File extension given to the script.
    pub extension: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    60
}

impl Default for CodeToolConfig {
    fn default() -> Self {
        Self {
            interpreter: "python3".to_string(),
            args: Vec::new(),
            extension: "py".to_string(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Script runner capability.
#[derive(Debug, Clone, Default)]
pub struct CodeTool {
    config: CodeToolConfig,
}

impl CodeTool {
    pub fn new(config: CodeToolConfig) -> Self {
        Self { config }
    }

    async fn run(&self, code: &str) -> Result<serde_json::Value, FailureReason> {
        let workdir = tempfile::tempdir().map_err(|e| FailureReason::io(&e))?;
        let script = workdir.path().join(format!("script.{}", self.config.extension));
        tokio::fs::write(&script, code)
            .await
            .map_err(|e| FailureReason::io(&e))?;

        let child = Command::new(&self.config.interpreter)
            .args(&self.config.args)
            .arg(&script)
            .current_dir(workdir.path())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| FailureReason::InternalError {
                message: format!("failed to start '{}': {e}", self.config.interpreter),
            })?;

        let timeout = Duration::from_secs(self.config.timeout_secs);
        let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
            Ok(result) => result.map_err(|e| FailureReason::io(&e))?,
            Err(_) => {
                return Err(FailureReason::Timeout {
                    operation: format!(
                        "code execution exceeded {}",
                        humantime::format_duration(timeout)
                    ),
                });
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        let exit_code = output.status.code();
        tracing::debug!(?exit_code, stdout_bytes = stdout.len(), stderr_bytes = stderr.len(), "Script finished");

        if !output.status.success() {
            let preview: String = stderr.chars().take(STDERR_PREVIEW_CHARS).collect();
            return Err(FailureReason::Custom {
                category: "exit_status".to_string(),
                message: match exit_code {
                    Some(code) => format!("script exited with code {code}: {preview}"),
                    None => format!("script terminated by signal: {preview}"),
                },
            });
        }

        Ok(json!({
            "stdout": stdout,
            "stderr": stderr,
            "exit_code": exit_code,
        }))
    }
}

#[async_trait]
impl Tool for CodeTool {
    fn name(&self) -> &str {
        "code"
    }

    fn description(&self) -> &str {
        "Run a script and return its stdout, stderr and exit code"
    }

    fn input_schema(&self) -> ParameterSchema {
        ParameterSchema::new().required("code", ParamKind::String, "complete script source")
    }

    async fn call(&self, args: ValidatedArgs) -> ExecutionResult {
        match args.str_arg("code") {
            Ok(code) => self.run(code).await.into(),
            Err(reason) => ExecutionResult::failed(reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shell(timeout_secs: u64) -> CodeTool {
        CodeTool::new(CodeToolConfig {
            interpreter: "sh".into(),
            args: Vec::new(),
            extension: "sh".into(),
            timeout_secs,
        })
    }

    async fn run(tool: &CodeTool, code: &str) -> ExecutionResult {
        let args = tool.input_schema().validate(&json!({ "code": code })).unwrap();
        tool.call(args).await
    }

    #[tokio::test]
    async fn captures_stdout() {
        let result = run(&shell(10), "echo hello").await;
        let output = result.success_output().unwrap();
        assert_eq!(output["stdout"], "hello\n");
        assert_eq!(output["exit_code"], 0);
    }

    #[tokio::test]
    async fn non_zero_exit_is_failure() {
        let result = run(&shell(10), "echo oops >&2; exit 3").await;
        match result.failure_reason() {
            Some(FailureReason::Custom { category, message }) => {
                assert_eq!(category, "exit_status");
                assert!(message.contains("code 3"));
                assert!(message.contains("oops"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn slow_script_times_out() {
        let result = run(&shell(1), "sleep 5").await;
        assert!(matches!(
            result.failure_reason(),
            Some(FailureReason::Timeout { .. })
        ));
    }

    #[tokio::test]
    async fn missing_interpreter_is_reported() {
        let tool = CodeTool::new(CodeToolConfig {
            interpreter: "definitely-not-an-interpreter".into(),
            ..CodeToolConfig::default()
        });
        let result = run(&tool, "print(1)").await;
        assert!(matches!(
            result.failure_reason(),
            Some(FailureReason::InternalError { .. })
        ));
    }
}
