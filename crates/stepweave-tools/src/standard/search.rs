//! # Web Search Tool
//!
//! Queries an HTTP JSON search backend and normalizes its answer to
//! `{query, results: [{title, url, snippet}]}`. Backends differ in field
//! names, so the common spellings (`title`/`name`, `url`/`link`,
//! `snippet`/`description`/`content`) are all accepted.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::time::Duration;
use stepweave_core::{ExecutionResult, FailureReason, ParamKind, ParameterSchema, Tool, ValidatedArgs};

/// Search backend settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SearchConfig {
    pub endpoint: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_max_results")]
    pub max_results: u64,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_max_results() -> u64 {
    5
}

fn default_timeout_secs() -> u64 {
    30
}

impl SearchConfig {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_key: None,
            max_results: default_max_results(),
            timeout_secs: default_timeout_secs(),
        }
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn with_timeout(mut self, seconds: u64) -> Self {
        self.timeout_secs = seconds;
        self
    }
}

/// Web search capability.
pub struct SearchTool {
    client: Client,
    config: SearchConfig,
}

impl SearchTool {
    pub fn new(config: SearchConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    async fn search(&self, query: &str, max_results: u64) -> Result<Value, FailureReason> {
        let count = max_results.to_string();
        let mut request = self
            .client
            .get(&self.config.endpoint)
            .query(&[("q", query), ("count", count.as_str())])
            .timeout(Duration::from_secs(self.config.timeout_secs));
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                FailureReason::Timeout {
                    operation: format!("search for '{query}'"),
                }
            } else {
                FailureReason::NetworkError {
                    message: e.to_string(),
                }
            }
        })?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(FailureReason::PermissionDenied {
                message: format!("search backend returned {status}"),
            });
        }
        if !status.is_success() {
            return Err(FailureReason::NetworkError {
                message: format!("search backend returned {status}"),
            });
        }

        let body: Value = response.json().await.map_err(|e| FailureReason::InternalError {
            message: format!("search backend returned invalid JSON: {e}"),
        })?;

        let results: Vec<Value> = result_items(&body)
            .iter()
            .take(max_results as usize)
            .map(normalize_item)
            .collect();
        tracing::debug!(query, results = results.len(), "Search completed");

        Ok(json!({
            "query": query,
            "results": results,
        }))
    }
}

fn result_items(body: &Value) -> &[Value] {
    let candidates = [
        body.get("results"),
        body.get("items"),
        body.pointer("/web/results"),
        body.get("organic_results"),
    ];
    candidates
        .into_iter()
        .flatten()
        .find_map(Value::as_array)
        .or_else(|| body.as_array())
        .map(Vec::as_slice)
        .unwrap_or_default()
}

fn normalize_item(item: &Value) -> Value {
    let pick = |keys: &[&str]| {
        keys.iter()
            .find_map(|k| item.get(*k).and_then(Value::as_str))
            .unwrap_or_default()
            .to_string()
    };
    json!({
        "title": pick(&["title", "name"]),
        "url": pick(&["url", "link", "href"]),
        "snippet": pick(&["snippet", "description", "content", "body"]),
    })
}

#[async_trait]
impl Tool for SearchTool {
    fn name(&self) -> &str {
        "search"
    }

    fn description(&self) -> &str {
        "Search the web and return titles, URLs and snippets"
    }

    fn input_schema(&self) -> ParameterSchema {
        ParameterSchema::new()
            .required("query", ParamKind::String, "search query")
            .optional("max_results", ParamKind::Integer, "maximum number of results")
    }

    async fn call(&self, args: ValidatedArgs) -> ExecutionResult {
        let query = match args.str_arg("query") {
            Ok(q) if !q.trim().is_empty() => q.trim(),
            _ => return ExecutionResult::failed(FailureReason::invalid_input("query must not be empty")),
        };
        let max_results = args
            .get_u64("max_results")
            .filter(|n| *n > 0)
            .unwrap_or(self.config.max_results);
        self.search(query, max_results).await.into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn items_are_found_under_common_keys() {
        let brave = json!({"web": {"results": [{"title": "A", "url": "u", "description": "d"}]}});
        assert_eq!(result_items(&brave).len(), 1);

        let bare = json!([{"name": "B", "link": "l", "content": "c"}]);
        let item = normalize_item(&result_items(&bare)[0]);
        assert_eq!(item, json!({"title": "B", "url": "l", "snippet": "c"}));

        assert!(result_items(&json!({"other": 1})).is_empty());
    }
}
