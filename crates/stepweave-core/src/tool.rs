//! # Tool Module
//!
//! Every capability the orchestrator can dispatch to (search, browser,
//! file, code) implements the [`Tool`] trait. The registry validates the
//! arguments against [`Tool::input_schema`] before calling the tool, so a
//! tool only ever sees [`ValidatedArgs`].
//!
//! Tools report problems as data: a failed call returns
//! [`ExecutionResult::Failure`] with a structured [`FailureReason`] rather
//! than panicking or returning an opaque error string.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::schema::{ParameterSchema, ValidatedArgs};

/// Categorized failure reasons for tool execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FailureReason {
    /// Invalid or malformed input provided to the tool
    InvalidInput { message: String },
    /// Required resource not found (file, URL, etc.)
    NotFound { resource: String },
    /// Permission denied or unauthorized access
    PermissionDenied { message: String },
    NetworkError { message: String },
    IoError { message: String },
    /// Timeout exceeded
    Timeout { operation: String },
    /// Internal tool error or unexpected state
    InternalError { message: String },
    /// Tool-specific failure
    Custom { category: String, message: String },
}

impl FailureReason {
    /// Get a human-readable error message
    pub fn message(&self) -> String {
        match self {
            FailureReason::InvalidInput { message } => format!("Invalid input: {}", message),
            FailureReason::NotFound { resource } => format!("Not found: {}", resource),
            FailureReason::PermissionDenied { message } => {
                format!("Permission denied: {}", message)
            }
            FailureReason::NetworkError { message } => format!("Network error: {}", message),
            FailureReason::IoError { message } => format!("I/O error: {}", message),
            FailureReason::Timeout { operation } => format!("Timeout: {}", operation),
            FailureReason::InternalError { message } => format!("Internal error: {}", message),
            FailureReason::Custom { category, message } => format!("{}: {}", category, message),
        }
    }

    /// Stable short code used in log fields.
    pub fn code(&self) -> &'static str {
        match self {
            FailureReason::InvalidInput { .. } => "invalid_input",
            FailureReason::NotFound { .. } => "not_found",
            FailureReason::PermissionDenied { .. } => "permission_denied",
            FailureReason::NetworkError { .. } => "network_error",
            FailureReason::IoError { .. } => "io_error",
            FailureReason::Timeout { .. } => "timeout",
            FailureReason::InternalError { .. } => "internal_error",
            FailureReason::Custom { .. } => "custom",
        }
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        FailureReason::InvalidInput {
            message: message.into(),
        }
    }

    pub fn io(err: &std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => FailureReason::NotFound {
                resource: err.to_string(),
            },
            std::io::ErrorKind::PermissionDenied => FailureReason::PermissionDenied {
                message: err.to_string(),
            },
            _ => FailureReason::IoError {
                message: err.to_string(),
            },
        }
    }
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

/// The result of executing a tool.
///
/// Either a JSON output or a structured failure; there is no state in which
/// a call both succeeded and carries an error.
#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionResult {
    Success { output: Value },
    Failure { reason: FailureReason },
}

impl ExecutionResult {
    pub fn success(output: Value) -> Self {
        ExecutionResult::Success { output }
    }

    pub fn failed(reason: FailureReason) -> Self {
        ExecutionResult::Failure { reason }
    }

    /// Failure wrapped in [`FailureReason::InternalError`].
    pub fn failure(error_message: impl Into<String>) -> Self {
        ExecutionResult::Failure {
            reason: FailureReason::InternalError {
                message: error_message.into(),
            },
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ExecutionResult::Success { .. })
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, ExecutionResult::Failure { .. })
    }

    pub fn success_output(&self) -> Option<&Value> {
        match self {
            ExecutionResult::Success { output } => Some(output),
            ExecutionResult::Failure { .. } => None,
        }
    }

    pub fn failure_reason(&self) -> Option<&FailureReason> {
        match self {
            ExecutionResult::Success { .. } => None,
            ExecutionResult::Failure { reason } => Some(reason),
        }
    }

    /// Convert to a `Result` for `?`-style handling.
    pub fn into_result(self) -> Result<Value, FailureReason> {
        match self {
            ExecutionResult::Success { output } => Ok(output),
            ExecutionResult::Failure { reason } => Err(reason),
        }
    }
}

impl From<Result<Value, FailureReason>> for ExecutionResult {
    fn from(result: Result<Value, FailureReason>) -> Self {
        match result {
            Ok(output) => ExecutionResult::Success { output },
            Err(reason) => ExecutionResult::Failure { reason },
        }
    }
}

/// A dispatchable capability.
///
/// Implementations must be cheap to share across the run (`Send + Sync`)
/// and must not rely on being called from a particular task.
///
/// # Example
///
/// ```rust
/// use async_trait::async_trait;
/// use serde_json::json;
/// use stepweave_core::schema::{ParamKind, ParameterSchema, ValidatedArgs};
/// use stepweave_core::tool::{ExecutionResult, Tool};
///
/// struct EchoTool;
///
/// #[async_trait]
/// impl Tool for EchoTool {
///     fn name(&self) -> &str {
///         "echo"
///     }
///
///     fn input_schema(&self) -> ParameterSchema {
///         ParameterSchema::new().required("text", ParamKind::String, "text to echo")
///     }
///
///     async fn call(&self, args: ValidatedArgs) -> ExecutionResult {
///         match args.str_arg("text") {
///             Ok(text) => ExecutionResult::success(json!({ "echo": text })),
///             Err(reason) => ExecutionResult::failed(reason),
///         }
///     }
/// }
/// ```
#[async_trait]
pub trait Tool: Send + Sync {
    /// Unique name used by the registry and by the planner prompt.
    fn name(&self) -> &str;

    /// Human-readable description shown to the planner.
    fn description(&self) -> &str {
        ""
    }

    /// Declared parameters. Arguments are validated against this before
    /// [`Tool::call`] runs.
    fn input_schema(&self) -> ParameterSchema {
        ParameterSchema::new()
    }

    async fn call(&self, args: ValidatedArgs) -> ExecutionResult;

    /// Release resources held across calls. Invoked once at run teardown.
    async fn shutdown(&self) {}
}
