use stepweave_core::{FailureReason, OracleError};
use thiserror::Error;

use crate::method::BrowserMethod;

/// A browser dispatch that ended without a result.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BrowserError {
    #[error("browser oracle failed: {0}")]
    Oracle(#[from] OracleError),
    #[error("browser action {method} failed: {reason}")]
    Action {
        method: BrowserMethod,
        reason: FailureReason,
    },
    #[error("browser session unavailable: {0}")]
    Session(FailureReason),
}

impl BrowserError {
    pub fn error_code(&self) -> &'static str {
        match self {
            BrowserError::Oracle(_) => "BROWSER_ORACLE",
            BrowserError::Action { .. } => "BROWSER_ACTION",
            BrowserError::Session(_) => "BROWSER_SESSION",
        }
    }

    /// The structured reason reported to the outer loop.
    pub fn into_failure_reason(self) -> FailureReason {
        match self {
            BrowserError::Oracle(err) => FailureReason::Custom {
                category: "oracle".to_string(),
                message: err.to_string(),
            },
            BrowserError::Action { method, reason } => match reason {
                FailureReason::Custom { category, message } => FailureReason::Custom {
                    category,
                    message: format!("{method}: {message}"),
                },
                other => other,
            },
            BrowserError::Session(reason) => reason,
        }
    }
}
