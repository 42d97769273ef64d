//! The browser backend contract.
//!
//! A session is a single stateful page context. The engine drives it one
//! method at a time; every method reports failure with a structured
//! [`FailureReason`].

use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use stepweave_core::FailureReason;

#[async_trait]
pub trait BrowserSession: Send {
    async fn goto(&mut self, url: &str) -> Result<Value, FailureReason>;

    async fn act(&mut self, instruction: &str) -> Result<Value, FailureReason>;

    async fn extract(&mut self, instruction: &str) -> Result<Value, FailureReason>;

    async fn observe(&mut self, instruction: Option<&str>) -> Result<Value, FailureReason>;

    async fn html(&mut self) -> Result<Value, FailureReason>;

    /// PNG bytes of the current viewport.
    async fn screenshot(&mut self) -> Result<Vec<u8>, FailureReason>;

    async fn wait(&mut self, duration: Duration) -> Result<Value, FailureReason> {
        tokio::time::sleep(duration).await;
        Ok(serde_json::json!({ "waited_ms": duration.as_millis() as u64 }))
    }

    async fn nav_back(&mut self) -> Result<Value, FailureReason>;

    fn current_url(&self) -> Option<String>;

    async fn close(&mut self) -> Result<(), FailureReason>;
}

/// Creates sessions on demand for the [`SessionManager`](crate::SessionManager).
#[async_trait]
pub trait SessionFactory: Send + Sync {
    async fn create(&self) -> Result<Box<dyn BrowserSession>, FailureReason>;
}
