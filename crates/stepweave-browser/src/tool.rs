use async_trait::async_trait;
use std::sync::Arc;
use stepweave_core::{ExecutionResult, ParamKind, ParameterSchema, Tool, ValidatedArgs};

use crate::engine::BrowserEngine;
use crate::manager::SessionManager;

/// The `browser` capability: one nested browser loop per call.
pub struct BrowserTool {
    engine: Arc<BrowserEngine>,
    sessions: SessionManager,
}

impl BrowserTool {
    pub fn new(engine: Arc<BrowserEngine>, sessions: SessionManager) -> Self {
        Self { engine, sessions }
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }
}

#[async_trait]
impl Tool for BrowserTool {
    fn name(&self) -> &str {
        "browser"
    }

    fn description(&self) -> &str {
        "Browse the web step by step to accomplish a goal; optionally start from a URL"
    }

    fn input_schema(&self) -> ParameterSchema {
        ParameterSchema::new()
            .required("goal", ParamKind::String, "what to accomplish in the browser")
            .optional("url", ParamKind::String, "page to open first")
    }

    async fn call(&self, args: ValidatedArgs) -> ExecutionResult {
        let goal = match args.str_arg("goal") {
            Ok(goal) => goal,
            Err(reason) => return ExecutionResult::failed(reason),
        };
        let url = args.get_str("url");

        match self.engine.run(&self.sessions, goal, url).await {
            Ok(result) => match serde_json::to_value(&result) {
                Ok(value) => ExecutionResult::success(value),
                Err(e) => ExecutionResult::failure(format!("failed to serialize browser result: {e}")),
            },
            Err(err) => {
                tracing::warn!(code = err.error_code(), error = %err, "Browser dispatch failed");
                ExecutionResult::failed(err.into_failure_reason())
            }
        }
    }

    async fn shutdown(&self) {
        self.sessions.shutdown().await;
    }
}
