//! # Mock Tools for Testing
//!
//! Tools that return predictable results, so orchestration can be tested
//! without real backends.

use async_trait::async_trait;
use serde_json::{Map, Value, json};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use stepweave_core::{ExecutionResult, FailureReason, ParameterSchema, Tool, ValidatedArgs};

#[derive(Debug, Default)]
struct Calls {
    scripted: VecDeque<ExecutionResult>,
    history: Vec<Map<String, Value>>,
    shutdowns: usize,
}

/// A mock tool answering from a script, then from a default.
///
/// The default schema accepts any arguments.
#[derive(Debug, Clone)]
pub struct MockTool {
    name: String,
    description: String,
    schema: ParameterSchema,
    default_response: Option<ExecutionResult>,
    calls: Arc<Mutex<Calls>>,
}

impl MockTool {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            schema: ParameterSchema::new().allow_additional(),
            default_response: None,
            calls: Arc::new(Mutex::new(Calls::default())),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_schema(mut self, schema: ParameterSchema) -> Self {
        self.schema = schema;
        self
    }

    /// Queue a successful result for the next unanswered call.
    pub fn with_response(self, output: Value) -> Self {
        self.lock().scripted.push_back(ExecutionResult::success(output));
        self
    }

    /// Queue a failure for the next unanswered call.
    pub fn with_failure(self, reason: FailureReason) -> Self {
        self.lock().scripted.push_back(ExecutionResult::failed(reason));
        self
    }

    pub fn with_default_response(mut self, output: Value) -> Self {
        self.default_response = Some(ExecutionResult::success(output));
        self
    }

    pub fn with_default_failure(mut self, reason: FailureReason) -> Self {
        self.default_response = Some(ExecutionResult::failed(reason));
        self
    }

    /// Get the number of times this tool has been called
    pub fn call_count(&self) -> usize {
        self.lock().history.len()
    }

    /// Arguments of every call, in order.
    pub fn call_history(&self) -> Vec<Map<String, Value>> {
        self.lock().history.clone()
    }

    pub fn was_called_with(&self, key: &str, value: &Value) -> bool {
        self.lock().history.iter().any(|args| args.get(key) == Some(value))
    }

    pub fn shutdown_count(&self) -> usize {
        self.lock().shutdowns
    }

    pub fn reset(&self) {
        let mut calls = self.lock();
        calls.history.clear();
        calls.shutdowns = 0;
    }

    fn lock(&self) -> MutexGuard<'_, Calls> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl Tool for MockTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn input_schema(&self) -> ParameterSchema {
        self.schema.clone()
    }

    async fn call(&self, args: ValidatedArgs) -> ExecutionResult {
        let mut calls = self.lock();
        let args = args.into_inner();
        let echo = Value::Object(args.clone());
        calls.history.push(args);

        if let Some(result) = calls.scripted.pop_front() {
            return result;
        }
        match &self.default_response {
            Some(result) => result.clone(),
            None => ExecutionResult::success(json!({ "tool": self.name, "args": echo })),
        }
    }

    async fn shutdown(&self) {
        self.lock().shutdowns += 1;
    }
}

/// A tool that always succeeds with `output`.
pub fn success_tool(name: &str, output: Value) -> MockTool {
    MockTool::new(name).with_default_response(output)
}

/// A tool that always fails with an internal error.
pub fn failing_tool(name: &str, message: &str) -> MockTool {
    MockTool::new(name).with_default_failure(FailureReason::InternalError {
        message: message.to_string(),
    })
}
