//! Termination taxonomy shared by the outer and inner loops.
//!
//! Each error type names one way a loop can stop. [`OrchestrationError`]
//! collects them so callers can match on the reason a run or a browser
//! dispatch ended.

use thiserror::Error;

use crate::oracle::OracleError;
use crate::schema::ValidationError;
use crate::tool::FailureReason;

/// The oracle could not produce a usable planning decision.
#[derive(Debug, Error)]
pub enum PlannerError {
    #[error("planning oracle failed: {0}")]
    Oracle(#[from] OracleError),
    #[error("planner returned an unusable decision: {0}")]
    InvalidDecision(String),
}

/// A capability handler reported a failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("tool '{tool}' failed: {reason}")]
pub struct HandlerError {
    pub tool: String,
    pub reason: FailureReason,
}

impl HandlerError {
    pub fn new(tool: impl Into<String>, reason: FailureReason) -> Self {
        Self {
            tool: tool.into(),
            reason,
        }
    }
}

/// The step budget was spent before the goal was reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("maximum steps reached ({limit})")]
pub struct BudgetExceeded {
    pub limit: u32,
}

/// The same browser action was chosen repeatedly.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("repetitive action detected: {method} repeated {repeats} times")]
pub struct LoopDetected {
    pub method: String,
    pub instruction: Option<String>,
    pub repeats: u32,
}

/// Every way a loop can stop short of its goal.
#[derive(Debug, Error)]
pub enum OrchestrationError {
    #[error(transparent)]
    Planner(#[from] PlannerError),
    #[error("invalid arguments for tool '{tool}': {source}")]
    Validation {
        tool: String,
        #[source]
        source: ValidationError,
    },
    #[error(transparent)]
    Handler(#[from] HandlerError),
    #[error(transparent)]
    Budget(#[from] BudgetExceeded),
    #[error(transparent)]
    Loop(#[from] LoopDetected),
}

impl OrchestrationError {
    /// Stable code for structured logs.
    pub fn error_code(&self) -> &'static str {
        match self {
            OrchestrationError::Planner(_) => "PLANNER_ERROR",
            OrchestrationError::Validation { .. } => "VALIDATION_ERROR",
            OrchestrationError::Handler(_) => "HANDLER_ERROR",
            OrchestrationError::Budget(_) => "BUDGET_EXHAUSTED",
            OrchestrationError::Loop(_) => "LOOP_DETECTED",
        }
    }

    /// Budget and loop terminations still produce a usable partial result.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            OrchestrationError::Budget(_) | OrchestrationError::Loop(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_distinguish_cases() {
        let budget: OrchestrationError = BudgetExceeded { limit: 5 }.into();
        assert_eq!(budget.to_string(), "maximum steps reached (5)");
        assert!(!budget.is_fatal());

        let handler: OrchestrationError = HandlerError::new(
            "file",
            FailureReason::NotFound {
                resource: "x".into(),
            },
        )
        .into();
        assert_eq!(handler.to_string(), "tool 'file' failed: Not found: x");
        assert!(handler.is_fatal());
        assert_eq!(handler.error_code(), "HANDLER_ERROR");

        let looped: OrchestrationError = LoopDetected {
            method: "ACT".into(),
            instruction: Some("click".into()),
            repeats: 3,
        }
        .into();
        assert!(looped.to_string().starts_with("repetitive action detected"));
        assert!(!looped.is_fatal());
    }

    #[test]
    fn planner_error_wraps_oracle() {
        let err: OrchestrationError = PlannerError::from(OracleError::EmptyResponse).into();
        assert_eq!(err.error_code(), "PLANNER_ERROR");
        assert!(err.to_string().contains("planning oracle failed"));
    }
}
