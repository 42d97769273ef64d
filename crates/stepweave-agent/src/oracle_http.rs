//! # HTTP Oracle
//!
//! [`Oracle`] over an OpenAI-compatible `/chat/completions` endpoint.
//! Structured calls ask for a JSON object, embed the schema in the system
//! prompt, and pull the first JSON object out of the reply.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::time::Duration;
use stepweave_core::{Oracle, OracleError, OracleRequest};

const ERROR_BODY_PREVIEW_CHARS: usize = 500;

#[derive(Debug, Clone, PartialEq)]
pub struct HttpOracleConfig {
    /// API base, e.g. `https://api.openai.com/v1`.
    pub base_url: String,
    pub api_key: Option<String>,
    /// Model used when a request names none.
    pub model: String,
    pub temperature: f32,
    pub timeout: Duration,
}

impl HttpOracleConfig {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: None,
            model: model.into(),
            temperature: 0.2,
            timeout: Duration::from_secs(60),
        }
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }
}

pub struct HttpOracle {
    client: Client,
    config: HttpOracleConfig,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: Value,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

impl HttpOracle {
    pub fn new(config: HttpOracleConfig) -> Result<Self, OracleError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| OracleError::Transport(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &HttpOracleConfig {
        &self.config
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'))
    }

    async fn chat(&self, request: OracleRequest, schema: Option<&Value>) -> Result<String, OracleError> {
        let mut messages = Vec::with_capacity(2);
        let system = match (request.system.as_deref(), schema) {
            (system, Some(schema)) => Some(format!(
                "{}Respond with a single JSON object that matches this JSON schema:\n{schema}",
                system.map(|s| format!("{s}\n\n")).unwrap_or_default()
            )),
            (Some(system), None) => Some(system.to_string()),
            (None, None) => None,
        };
        if let Some(system) = system {
            messages.push(ChatMessage {
                role: "system",
                content: Value::String(system),
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: user_content(&request),
        });

        let model = request.model.as_deref().unwrap_or(&self.config.model);
        let body = ChatRequest {
            model,
            messages,
            temperature: request.temperature.unwrap_or(self.config.temperature),
            response_format: schema.map(|_| json!({ "type": "json_object" })),
        };

        let mut call = self.client.post(self.endpoint()).json(&body);
        if let Some(key) = &self.config.api_key {
            call = call.bearer_auth(key);
        }
        tracing::debug!(
            model,
            images = request.images.len(),
            structured = schema.is_some(),
            "Oracle request"
        );

        let response = call.send().await.map_err(|e| self.transport_error(e))?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(OracleError::Rejected {
                status: status.as_u16(),
                message: text.chars().take(ERROR_BODY_PREVIEW_CHARS).collect(),
            });
        }

        let parsed: ChatResponse = response.json().await.map_err(|e| {
            if e.is_timeout() {
                self.transport_error(e)
            } else {
                OracleError::Malformed(e.to_string())
            }
        })?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or(OracleError::EmptyResponse)
    }

    fn transport_error(&self, err: reqwest::Error) -> OracleError {
        if err.is_timeout() {
            OracleError::Timeout(self.config.timeout)
        } else {
            OracleError::Transport(err.to_string())
        }
    }
}

fn user_content(request: &OracleRequest) -> Value {
    if request.images.is_empty() {
        return Value::String(request.prompt.clone());
    }
    let mut parts = vec![json!({ "type": "text", "text": request.prompt })];
    parts.extend(request.images.iter().map(|image| {
        json!({
            "type": "image_url",
            "image_url": { "url": format!("data:image/png;base64,{image}") }
        })
    }));
    Value::Array(parts)
}

/// First balanced JSON object in `raw`, skipping Markdown fences and prose.
fn extract_json_object(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (offset, ch) in raw[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&raw[start..=start + offset]);
                }
            }
            _ => {}
        }
    }
    None
}

#[async_trait]
impl Oracle for HttpOracle {
    async fn complete_text(&self, request: OracleRequest) -> Result<String, OracleError> {
        self.chat(request, None).await
    }

    async fn complete_structured(
        &self,
        request: OracleRequest,
        schema: &Value,
    ) -> Result<Value, OracleError> {
        let content = self.chat(request, Some(schema)).await?;
        let object = extract_json_object(&content)
            .ok_or_else(|| OracleError::Malformed("reply contains no JSON object".to_string()))?;
        serde_json::from_str(object).map_err(|e| OracleError::Malformed(e.to_string()))
    }
}
