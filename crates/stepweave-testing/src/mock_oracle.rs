//! # Mock Oracle
//!
//! A scripted [`Oracle`]: replies are consumed in call order, whichever of
//! `complete_text` or `complete_structured` is asked. Every request is
//! recorded for later inspection.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use stepweave_core::{Oracle, OracleError, OracleRequest};

/// One scripted oracle reply.
#[derive(Debug, Clone)]
pub enum MockReply {
    Structured(Value),
    Text(String),
    Error(OracleError),
}

/// Which entry point a recorded request came through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    Text,
    Structured,
}

#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub kind: CallKind,
    pub request: OracleRequest,
    pub schema: Option<Value>,
}

#[derive(Debug, Default)]
struct State {
    script: VecDeque<MockReply>,
    fallback: Option<MockReply>,
    calls: Vec<RecordedCall>,
}

/// Scripted oracle; clones share the script and the call log.
#[derive(Debug, Clone, Default)]
pub struct MockOracle {
    state: Arc<Mutex<State>>,
}

impl MockOracle {
    pub fn new() -> Self {
        Self::default()
    }

    /// An oracle that answers every structured call with `value`.
    pub fn constant(value: Value) -> Self {
        Self::new().with_fallback(MockReply::Structured(value))
    }

    pub fn with_structured(self, value: Value) -> Self {
        self.push(MockReply::Structured(value));
        self
    }

    pub fn with_text(self, text: impl Into<String>) -> Self {
        self.push(MockReply::Text(text.into()));
        self
    }

    pub fn with_error(self, error: OracleError) -> Self {
        self.push(MockReply::Error(error));
        self
    }

    /// Reply used once the script is exhausted. Without one, an exhausted
    /// script answers [`OracleError::EmptyResponse`].
    pub fn with_fallback(self, reply: MockReply) -> Self {
        self.lock().fallback = Some(reply);
        self
    }

    pub fn push(&self, reply: MockReply) {
        self.lock().script.push_back(reply);
    }

    pub fn call_count(&self) -> usize {
        self.lock().calls.len()
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.lock().calls.clone()
    }

    pub fn structured_calls(&self) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|c| c.kind == CallKind::Structured)
            .count()
    }

    pub fn text_calls(&self) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|c| c.kind == CallKind::Text)
            .count()
    }

    /// Prompt of the most recent request.
    pub fn last_prompt(&self) -> Option<String> {
        self.lock().calls.last().map(|c| c.request.prompt.clone())
    }

    /// Replies not yet consumed.
    pub fn remaining(&self) -> usize {
        self.lock().script.len()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn next(&self, kind: CallKind, request: OracleRequest, schema: Option<&Value>) -> Option<MockReply> {
        let mut state = self.lock();
        state.calls.push(RecordedCall {
            kind,
            request,
            schema: schema.cloned(),
        });
        state.script.pop_front().or_else(|| state.fallback.clone())
    }
}

#[async_trait]
impl Oracle for MockOracle {
    async fn complete_text(&self, request: OracleRequest) -> Result<String, OracleError> {
        match self.next(CallKind::Text, request, None) {
            Some(MockReply::Text(text)) => Ok(text),
            Some(MockReply::Structured(value)) => Ok(value.to_string()),
            Some(MockReply::Error(error)) => Err(error),
            None => Err(OracleError::EmptyResponse),
        }
    }

    async fn complete_structured(
        &self,
        request: OracleRequest,
        schema: &Value,
    ) -> Result<Value, OracleError> {
        match self.next(CallKind::Structured, request, Some(schema)) {
            Some(MockReply::Structured(value)) => Ok(value),
            Some(MockReply::Text(text)) => serde_json::from_str(&text)
                .map_err(|e| OracleError::Malformed(format!("scripted text is not JSON: {e}"))),
            Some(MockReply::Error(error)) => Err(error),
            None => Err(OracleError::EmptyResponse),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn replies_in_order_then_falls_back() {
        let oracle = MockOracle::new()
            .with_structured(json!({"n": 1}))
            .with_text("plain")
            .with_fallback(MockReply::Structured(json!({"n": 0})));

        let schema = json!({});
        let first = oracle
            .complete_structured(OracleRequest::new("a"), &schema)
            .await
            .unwrap();
        assert_eq!(first, json!({"n": 1}));
        assert_eq!(oracle.complete_text(OracleRequest::new("b")).await.unwrap(), "plain");
        let fallback = oracle
            .complete_structured(OracleRequest::new("c"), &schema)
            .await
            .unwrap();
        assert_eq!(fallback, json!({"n": 0}));

        assert_eq!(oracle.call_count(), 3);
        assert_eq!(oracle.structured_calls(), 2);
        assert_eq!(oracle.text_calls(), 1);
        assert_eq!(oracle.last_prompt().as_deref(), Some("c"));
    }

    #[tokio::test]
    async fn exhausted_script_is_an_empty_response() {
        let oracle = MockOracle::new();
        let err = oracle.complete_text(OracleRequest::new("x")).await.unwrap_err();
        assert_eq!(err, OracleError::EmptyResponse);
    }
}
