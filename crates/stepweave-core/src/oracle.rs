//! # Oracle
//!
//! The oracle is the language-model completion service consulted for every
//! decision: which step comes next, which tool handles it, which browser
//! action to take. It offers free-text and schema-constrained structured
//! completion. Call sites never consume the raw JSON; they go through
//! [`complete_as`] into their own decision type.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

/// A single completion request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OracleRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    pub prompt: String,
    /// Base64-encoded PNG images attached to the prompt.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<String>,
    /// Model override; the oracle's default model is used when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

impl OracleRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Self::default()
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_image(mut self, base64_png: impl Into<String>) -> Self {
        self.images.push(base64_png.into());
        self
    }

    /// Set the model, ignoring empty names.
    pub fn with_model(mut self, model: Option<&str>) -> Self {
        self.model = model.filter(|m| !m.is_empty()).map(str::to_string);
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

/// Failure talking to the oracle. None of these are retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OracleError {
    #[error("oracle transport error: {0}")]
    Transport(String),
    #[error("oracle call timed out after {}s", .0.as_secs())]
    Timeout(Duration),
    #[error("oracle returned malformed output: {0}")]
    Malformed(String),
    #[error("oracle rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("oracle returned an empty response")]
    EmptyResponse,
}

impl OracleError {
    pub fn error_code(&self) -> &'static str {
        match self {
            OracleError::Transport(_) => "ORACLE_TRANSPORT",
            OracleError::Timeout(_) => "ORACLE_TIMEOUT",
            OracleError::Malformed(_) => "ORACLE_MALFORMED",
            OracleError::Rejected { .. } => "ORACLE_REJECTED",
            OracleError::EmptyResponse => "ORACLE_EMPTY",
        }
    }
}

/// Completion service.
#[async_trait]
pub trait Oracle: Send + Sync {
    /// Free-text completion.
    async fn complete_text(&self, request: OracleRequest) -> Result<String, OracleError>;

    /// Completion constrained to the JSON Schema `schema`. Implementations
    /// return a JSON value but are not required to enforce the schema.
    async fn complete_structured(
        &self,
        request: OracleRequest,
        schema: &Value,
    ) -> Result<Value, OracleError>;
}

/// Structured completion deserialized into `T`.
pub async fn complete_as<T: DeserializeOwned>(
    oracle: &dyn Oracle,
    request: OracleRequest,
    schema: &Value,
) -> Result<T, OracleError> {
    let value = oracle.complete_structured(request, schema).await?;
    serde_json::from_value(value).map_err(|e| OracleError::Malformed(e.to_string()))
}
