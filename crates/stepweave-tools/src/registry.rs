use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use stepweave_core::error::{HandlerError, OrchestrationError};
use stepweave_core::validation::{IdentifierError, IdentifierRules};
use stepweave_core::{ExecutionResult, FailureReason, Tool, ValidationError};
use thiserror::Error;

/// Registration rejected by the registry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("invalid tool name '{name}': {source}")]
    InvalidName {
        name: String,
        #[source]
        source: IdentifierError,
    },
    #[error("tool '{0}' is already registered")]
    Duplicate(String),
}

/// Dispatch that did not produce a tool output.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    #[error("unknown tool '{name}'")]
    UnknownTool { name: String },
    #[error("invalid arguments for tool '{tool}': {source}")]
    Validation {
        tool: String,
        #[source]
        source: ValidationError,
    },
    #[error(transparent)]
    Handler(#[from] HandlerError),
}

impl DispatchError {
    pub fn error_code(&self) -> &'static str {
        match self {
            DispatchError::UnknownTool { .. } => "UNKNOWN_TOOL",
            DispatchError::Validation { .. } => "VALIDATION_ERROR",
            DispatchError::Handler(_) => "HANDLER_ERROR",
        }
    }
}

impl From<DispatchError> for OrchestrationError {
    fn from(err: DispatchError) -> Self {
        match err {
            DispatchError::UnknownTool { name } => OrchestrationError::Handler(HandlerError::new(
                name.clone(),
                FailureReason::NotFound {
                    resource: format!("tool '{name}'"),
                },
            )),
            DispatchError::Validation { tool, source } => {
                OrchestrationError::Validation { tool, source }
            }
            DispatchError::Handler(err) => OrchestrationError::Handler(err),
        }
    }
}

/// What the planner and the dispatch model see of a tool.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// Name-to-handler map with validated registration and dispatch.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use stepweave_tools::{FileTool, ToolRegistry};
///
/// let registry = ToolRegistry::new()
///     .try_with_tool(Arc::new(FileTool::new("./workspace")))
///     .unwrap();
/// assert_eq!(registry.tool_names(), vec!["file".to_string()]);
/// ```
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
    order: Vec<String>,
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.order)
            .finish()
    }
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `tool` under its own name.
    pub fn register(&mut self, tool: Arc<dyn Tool>) -> Result<(), RegistryError> {
        let raw = tool.name().to_string();
        let name = IdentifierRules::TOOL_NAME
            .validate(&raw)
            .map_err(|source| RegistryError::InvalidName {
                name: raw.clone(),
                source,
            })?;
        if self.tools.contains_key(&name) {
            return Err(RegistryError::Duplicate(name));
        }
        tracing::debug!(tool = %name, "Registered tool");
        self.order.push(name.clone());
        self.tools.insert(name, tool);
        Ok(())
    }

    /// Builder form of [`ToolRegistry::register`].
    pub fn try_with_tool(mut self, tool: Arc<dyn Tool>) -> Result<Self, RegistryError> {
        self.register(tool)?;
        Ok(self)
    }

    /// Registered names in registration order.
    pub fn tool_names(&self) -> Vec<String> {
        self.order.clone()
    }

    pub fn get_tool(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name.trim()).cloned()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Descriptors for every tool, in registration order.
    pub fn descriptors(&self) -> Vec<ToolDescriptor> {
        self.order
            .iter()
            .filter_map(|name| self.tools.get(name).map(|tool| (name, tool)))
            .map(|(name, tool)| ToolDescriptor {
                name: name.clone(),
                description: tool.description().to_string(),
                parameters: tool.input_schema().to_json_schema(),
            })
            .collect()
    }

    /// Validate `args` and run the named tool, returning its normalized
    /// output.
    pub async fn execute(&self, name: &str, args: &Value) -> Result<Value, DispatchError> {
        let key = name.trim();
        let tool = self
            .tools
            .get(key)
            .ok_or_else(|| DispatchError::UnknownTool {
                name: key.to_string(),
            })?;

        let validated =
            tool.input_schema()
                .validate(args)
                .map_err(|source| DispatchError::Validation {
                    tool: key.to_string(),
                    source,
                })?;

        tracing::debug!(tool = %key, "Dispatching tool call");
        match tool.call(validated).await {
            ExecutionResult::Success { output } => Ok(normalize_output(output)),
            ExecutionResult::Failure { reason } => {
                tracing::warn!(tool = %key, failure = reason.code(), error = %reason, "Tool call failed");
                Err(HandlerError::new(key, reason).into())
            }
        }
    }

    /// Give every tool a chance to release shared resources.
    pub async fn shutdown(&self) {
        let pending = self.order.iter().filter_map(|name| self.tools.get(name)).map(|tool| tool.shutdown());
        futures::future::join_all(pending).await;
        tracing::debug!(tools = self.order.len(), "Tool registry shut down");
    }
}

/// Tools may return JSON text instead of a JSON value; structured text is
/// decoded so downstream consumers always see a value.
fn normalize_output(output: Value) -> Value {
    if let Value::String(text) = &output {
        let trimmed = text.trim_start();
        if trimmed.starts_with('{') || trimmed.starts_with('[') {
            if let Ok(parsed) = serde_json::from_str::<Value>(text) {
                return parsed;
            }
        }
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use stepweave_core::{ParamKind, ParameterSchema, ValidatedArgs};

    struct UppercaseTool;

    #[async_trait]
    impl Tool for UppercaseTool {
        fn name(&self) -> &str {
            "uppercase"
        }

        fn description(&self) -> &str {
            "Uppercases text"
        }

        fn input_schema(&self) -> ParameterSchema {
            ParameterSchema::new().required("text", ParamKind::String, "input text")
        }

        async fn call(&self, args: ValidatedArgs) -> ExecutionResult {
            match args.str_arg("text") {
                Ok(text) => ExecutionResult::success(json!(text.to_uppercase())),
                Err(reason) => ExecutionResult::failed(reason),
            }
        }
    }

    struct JsonTextTool;

    #[async_trait]
    impl Tool for JsonTextTool {
        fn name(&self) -> &str {
            "json_text"
        }

        async fn call(&self, _args: ValidatedArgs) -> ExecutionResult {
            ExecutionResult::success(json!("{\"answer\": 42}"))
        }
    }

    struct BrokenTool {
        shutdowns: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Tool for BrokenTool {
        fn name(&self) -> &str {
            "broken"
        }

        async fn call(&self, _args: ValidatedArgs) -> ExecutionResult {
            ExecutionResult::failed(FailureReason::NetworkError {
                message: "connection reset".into(),
            })
        }

        async fn shutdown(&self) {
            self.shutdowns.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn registry() -> ToolRegistry {
        ToolRegistry::new()
            .try_with_tool(Arc::new(UppercaseTool))
            .unwrap()
            .try_with_tool(Arc::new(JsonTextTool))
            .unwrap()
    }

    #[tokio::test]
    async fn dispatches_to_correct_tool() {
        let output = registry()
            .execute("uppercase", &json!({"text": "stepweave"}))
            .await
            .unwrap();
        assert_eq!(output, json!("STEPWEAVE"));
    }

    #[tokio::test]
    async fn unknown_tool_is_typed_error() {
        let err = registry().execute("missing", &json!({})).await.unwrap_err();
        assert_eq!(
            err,
            DispatchError::UnknownTool {
                name: "missing".into()
            }
        );
        let orchestration: OrchestrationError = err.into();
        assert_eq!(orchestration.error_code(), "HANDLER_ERROR");
    }

    #[tokio::test]
    async fn arguments_are_validated_before_call() {
        let err = registry()
            .execute("uppercase", &json!({"text": 7}))
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::Validation { ref tool, .. } if tool == "uppercase"));
    }

    #[tokio::test]
    async fn json_text_output_is_normalized() {
        let output = registry().execute("json_text", &Value::Null).await.unwrap();
        assert_eq!(output, json!({"answer": 42}));
    }

    #[tokio::test]
    async fn handler_failure_keeps_reason() {
        let shutdowns = Arc::new(AtomicUsize::new(0));
        let registry = ToolRegistry::new()
            .try_with_tool(Arc::new(BrokenTool {
                shutdowns: shutdowns.clone(),
            }))
            .unwrap();

        let err = registry.execute("broken", &json!({})).await.unwrap_err();
        let DispatchError::Handler(handler) = err else {
            panic!("expected handler error");
        };
        assert_eq!(handler.tool, "broken");
        assert!(matches!(handler.reason, FailureReason::NetworkError { .. }));

        registry.shutdown().await;
        assert_eq!(shutdowns.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let err = registry()
            .try_with_tool(Arc::new(UppercaseTool))
            .unwrap_err();
        assert_eq!(err, RegistryError::Duplicate("uppercase".into()));
    }

    #[test]
    fn invalid_name_is_rejected() {
        struct Spaced;

        #[async_trait]
        impl Tool for Spaced {
            fn name(&self) -> &str {
                "web search"
            }

            async fn call(&self, _args: ValidatedArgs) -> ExecutionResult {
                ExecutionResult::success(Value::Null)
            }
        }

        let err = ToolRegistry::new()
            .try_with_tool(Arc::new(Spaced))
            .unwrap_err();
        assert!(matches!(err, RegistryError::InvalidName { .. }));
    }

    #[test]
    fn descriptors_follow_registration_order() {
        let registry = registry();
        let descriptors = registry.descriptors();
        assert_eq!(registry.len(), 2);
        assert_eq!(descriptors[0].name, "uppercase");
        assert_eq!(descriptors[0].description, "Uppercases text");
        assert_eq!(descriptors[0].parameters["required"], json!(["text"]));
        assert_eq!(descriptors[1].name, "json_text");
        assert!(registry.get_tool("json_text").is_some());
        assert!(ToolRegistry::new().is_empty());
    }
}
