//! # Mock Browser
//!
//! [`MockBrowser`] is the shared handle tests keep: it configures canned
//! page behaviour and records every session method called, across all
//! sessions its factory creates.

use async_trait::async_trait;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use stepweave_browser::{BrowserSession, SessionFactory};
use stepweave_core::FailureReason;

/// Minimal PNG signature, enough to stand in for a screenshot.
pub const MOCK_PNG: &[u8] = &[0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a];

#[derive(Debug, Default)]
struct Shared {
    calls: Vec<String>,
    opened: usize,
    closed: usize,
    failures: HashMap<String, FailureReason>,
    extracts: HashMap<String, Value>,
    create_failure: Option<FailureReason>,
}

#[derive(Debug, Clone, Default)]
pub struct MockBrowser {
    shared: Arc<Mutex<Shared>>,
}

impl MockBrowser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every call of `method` (wire name, e.g. `"ACT"`) with `reason`.
    pub fn fail_on(self, method: &str, reason: FailureReason) -> Self {
        self.lock().failures.insert(method.to_ascii_uppercase(), reason);
        self
    }

    /// Result returned by `EXTRACT` for this exact instruction.
    pub fn with_extract(self, instruction: &str, value: Value) -> Self {
        self.lock().extracts.insert(instruction.to_string(), value);
        self
    }

    /// Make the factory refuse to create sessions.
    pub fn fail_create(self, reason: FailureReason) -> Self {
        self.lock().create_failure = Some(reason);
        self
    }

    pub fn session(&self) -> MockBrowserSession {
        self.lock().opened += 1;
        MockBrowserSession {
            shared: self.shared.clone(),
            url: None,
            history: Vec::new(),
        }
    }

    pub fn factory(&self) -> Arc<dyn SessionFactory> {
        Arc::new(MockSessionFactory {
            browser: self.clone(),
        })
    }

    /// Every session call as `"METHOD argument"`, in order.
    pub fn calls(&self) -> Vec<String> {
        self.lock().calls.clone()
    }

    pub fn calls_of(&self, method: &str) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|c| c.split_whitespace().next() == Some(method))
            .count()
    }

    pub fn opened(&self) -> usize {
        self.lock().opened
    }

    pub fn closed(&self) -> usize {
        self.lock().closed
    }

    fn lock(&self) -> MutexGuard<'_, Shared> {
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Creates [`MockBrowserSession`]s for a [`MockBrowser`].
pub struct MockSessionFactory {
    browser: MockBrowser,
}

#[async_trait]
impl SessionFactory for MockSessionFactory {
    async fn create(&self) -> Result<Box<dyn BrowserSession>, FailureReason> {
        if let Some(reason) = self.browser.lock().create_failure.clone() {
            return Err(reason);
        }
        Ok(Box::new(self.browser.session()))
    }
}

/// In-memory session; navigation only moves a URL pointer.
pub struct MockBrowserSession {
    shared: Arc<Mutex<Shared>>,
    url: Option<String>,
    history: Vec<String>,
}

impl MockBrowserSession {
    fn record(&self, method: &str, argument: Option<&str>) -> Result<(), FailureReason> {
        let mut shared = self.shared.lock().unwrap_or_else(PoisonError::into_inner);
        shared.calls.push(match argument {
            Some(arg) => format!("{method} {arg}"),
            None => method.to_string(),
        });
        match shared.failures.get(method) {
            Some(reason) => Err(reason.clone()),
            None => Ok(()),
        }
    }

    fn canned_extract(&self, instruction: &str) -> Option<Value> {
        let shared = self.shared.lock().unwrap_or_else(PoisonError::into_inner);
        shared.extracts.get(instruction).cloned()
    }
}

#[async_trait]
impl BrowserSession for MockBrowserSession {
    async fn goto(&mut self, url: &str) -> Result<Value, FailureReason> {
        self.record("GOTO", Some(url))?;
        if let Some(previous) = self.url.replace(url.to_string()) {
            self.history.push(previous);
        }
        Ok(json!({ "url": url, "status": 200 }))
    }

    async fn act(&mut self, instruction: &str) -> Result<Value, FailureReason> {
        self.record("ACT", Some(instruction))?;
        Ok(json!({ "performed": instruction }))
    }

    async fn extract(&mut self, instruction: &str) -> Result<Value, FailureReason> {
        self.record("EXTRACT", Some(instruction))?;
        let page = self.url.as_deref().unwrap_or("blank");
        Ok(self
            .canned_extract(instruction)
            .unwrap_or_else(|| json!({ "extraction": format!("{instruction} of {page}") })))
    }

    async fn observe(&mut self, instruction: Option<&str>) -> Result<Value, FailureReason> {
        self.record("OBSERVE", instruction)?;
        Ok(json!({ "observation": "a mock page with a heading and two links" }))
    }

    async fn html(&mut self) -> Result<Value, FailureReason> {
        self.record("HTML", None)?;
        Ok(Value::String("<html><body><h1>Mock</h1></body></html>".to_string()))
    }

    async fn screenshot(&mut self) -> Result<Vec<u8>, FailureReason> {
        self.record("SCREENSHOT", None)?;
        Ok(MOCK_PNG.to_vec())
    }

    async fn wait(&mut self, duration: Duration) -> Result<Value, FailureReason> {
        let label = format!("{}ms", duration.as_millis());
        self.record("WAIT", Some(label.as_str()))?;
        Ok(json!({ "waited_ms": duration.as_millis() as u64 }))
    }

    async fn nav_back(&mut self) -> Result<Value, FailureReason> {
        self.record("NAVBACK", None)?;
        let previous = self
            .history
            .pop()
            .ok_or_else(|| FailureReason::invalid_input("no previous page"))?;
        self.url = Some(previous.clone());
        Ok(json!({ "url": previous }))
    }

    fn current_url(&self) -> Option<String> {
        self.url.clone()
    }

    async fn close(&mut self) -> Result<(), FailureReason> {
        let mut shared = self.shared.lock().unwrap_or_else(PoisonError::into_inner);
        shared.calls.push("CLOSE".to_string());
        shared.closed += 1;
        Ok(())
    }
}
