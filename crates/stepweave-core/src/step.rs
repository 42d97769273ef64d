//! # Steps and Run Budget
//!
//! A [`Step`] is one unit of planned work. Steps are created by the planner in
//! [`StepStatus::Pending`], moved to `Running` by the orchestrator right before
//! dispatch and finally to `Completed` or `Failed`. Terminal states are never
//! left again; every transition goes through a method that checks it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use thiserror::Error;

use crate::error::BudgetExceeded;

/// Description substituted when the oracle proposes a step without one.
pub const MISSING_DESCRIPTION_MARKER: &str =
    "ERROR: planner response did not include a step description";

/// Identifier of a step, strictly increasing within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StepId(u64);

impl StepId {
    /// Wrap a raw step number.
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// The raw step number.
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for StepId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for StepId {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

/// Lifecycle state of a [`Step`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl StepStatus {
    /// Whether the status can no longer change.
    pub fn is_terminal(self) -> bool {
        matches!(self, StepStatus::Completed | StepStatus::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            StepStatus::Pending => "pending",
            StepStatus::Running => "running",
            StepStatus::Completed => "completed",
            StepStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rejected status change on a [`Step`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("step {step_id}: illegal transition from {from} to {to}")]
pub struct StepTransitionError {
    pub step_id: StepId,
    pub from: StepStatus,
    pub to: StepStatus,
}

/// A unit of planned work.
///
/// The capability (`tool`) and its `params` may be chosen by the planner
/// directly or filled in later by the dispatch model, but only while the
/// step is still pending.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    id: StepId,
    description: String,
    status: StepStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    params: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    created_at: DateTime<Utc>,
}

impl Step {
    /// Create a pending step.
    pub fn new(id: StepId, description: impl Into<String>) -> Self {
        Self {
            id,
            description: description.into(),
            status: StepStatus::Pending,
            tool: None,
            params: None,
            error: None,
            result: None,
            created_at: Utc::now(),
        }
    }

    /// Builder: capability the step should be dispatched to.
    pub fn with_tool(mut self, tool: impl Into<String>) -> Self {
        self.tool = Some(tool.into());
        self
    }

    /// Builder: arguments for the capability.
    pub fn with_params(mut self, params: Map<String, Value>) -> Self {
        self.params = Some(params);
        self
    }

    pub fn id(&self) -> StepId {
        self.id
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn status(&self) -> StepStatus {
        self.status
    }

    pub fn tool(&self) -> Option<&str> {
        self.tool.as_deref()
    }

    pub fn params(&self) -> Option<&Map<String, Value>> {
        self.params.as_ref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn result(&self) -> Option<&Value> {
        self.result.as_ref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Whether the planner failed to describe this step.
    pub fn is_error_marker(&self) -> bool {
        self.description == MISSING_DESCRIPTION_MARKER
    }

    /// Set the capability call while the step is still pending.
    pub fn assign_call(
        &mut self,
        tool: impl Into<String>,
        params: Map<String, Value>,
    ) -> Result<(), StepTransitionError> {
        if self.status != StepStatus::Pending {
            return Err(self.transition_error(StepStatus::Pending));
        }
        self.tool = Some(tool.into());
        self.params = Some(params);
        Ok(())
    }

    /// `Pending -> Running`.
    pub fn start(&mut self) -> Result<(), StepTransitionError> {
        if self.status != StepStatus::Pending {
            return Err(self.transition_error(StepStatus::Running));
        }
        self.status = StepStatus::Running;
        Ok(())
    }

    /// `Running -> Completed`, storing the normalized result.
    pub fn complete(&mut self, result: Value) -> Result<(), StepTransitionError> {
        if self.status != StepStatus::Running {
            return Err(self.transition_error(StepStatus::Completed));
        }
        self.status = StepStatus::Completed;
        self.result = Some(result);
        Ok(())
    }

    /// `Pending | Running -> Failed`, capturing the error text.
    pub fn fail(&mut self, error: impl Into<String>) -> Result<(), StepTransitionError> {
        if self.status.is_terminal() {
            return Err(self.transition_error(StepStatus::Failed));
        }
        self.status = StepStatus::Failed;
        self.error = Some(error.into());
        Ok(())
    }

    fn transition_error(&self, to: StepStatus) -> StepTransitionError {
        StepTransitionError {
            step_id: self.id,
            from: self.status,
            to,
        }
    }
}

/// Ceiling on outer-loop iterations.
///
/// `current_step <= max_steps` always holds; [`RunBudget::try_advance`]
/// refuses to move past the ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunBudget {
    max_steps: u32,
    current_step: u32,
}

impl RunBudget {
    pub fn new(max_steps: u32) -> Self {
        Self {
            max_steps,
            current_step: 0,
        }
    }

    pub fn max_steps(&self) -> u32 {
        self.max_steps
    }

    pub fn current_step(&self) -> u32 {
        self.current_step
    }

    pub fn remaining(&self) -> u32 {
        self.max_steps - self.current_step
    }

    pub fn is_exhausted(&self) -> bool {
        self.current_step >= self.max_steps
    }

    /// Consume one step of budget, returning the new step number.
    pub fn try_advance(&mut self) -> Result<u32, BudgetExceeded> {
        if self.is_exhausted() {
            return Err(BudgetExceeded {
                limit: self.max_steps,
            });
        }
        self.current_step += 1;
        Ok(self.current_step)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn step_follows_happy_path() {
        let mut step = Step::new(StepId::new(1), "search for rust");
        assert_eq!(step.status(), StepStatus::Pending);

        step.start().unwrap();
        assert_eq!(step.status(), StepStatus::Running);

        step.complete(json!({"ok": true})).unwrap();
        assert_eq!(step.status(), StepStatus::Completed);
        assert_eq!(step.result(), Some(&json!({"ok": true})));
        assert!(step.error().is_none());
    }

    #[test]
    fn terminal_step_is_never_reverted() {
        let mut step = Step::new(StepId::new(2), "write file");
        step.start().unwrap();
        step.fail("disk full").unwrap();

        assert!(step.start().is_err());
        assert!(step.complete(json!(null)).is_err());
        let err = step.fail("again").unwrap_err();
        assert_eq!(err.from, StepStatus::Failed);
        assert_eq!(step.error(), Some("disk full"));
    }

    #[test]
    fn complete_requires_running() {
        let mut step = Step::new(StepId::new(3), "noop");
        let err = step.complete(json!({})).unwrap_err();
        assert_eq!(err.from, StepStatus::Pending);
        assert_eq!(err.to, StepStatus::Completed);
    }

    #[test]
    fn call_can_only_be_assigned_while_pending() {
        let mut step = Step::new(StepId::new(4), "look things up");
        step.assign_call("search", Map::new()).unwrap();
        assert_eq!(step.tool(), Some("search"));

        step.start().unwrap();
        assert!(step.assign_call("file", Map::new()).is_err());
        assert_eq!(step.tool(), Some("search"));
    }

    #[test]
    fn error_marker_is_detected() {
        let step = Step::new(StepId::new(5), MISSING_DESCRIPTION_MARKER);
        assert!(step.is_error_marker());
        assert!(!Step::new(StepId::new(6), "real work").is_error_marker());
    }

    #[test]
    fn budget_stops_at_ceiling() {
        let mut budget = RunBudget::new(2);
        assert_eq!(budget.try_advance(), Ok(1));
        assert_eq!(budget.try_advance(), Ok(2));
        assert!(budget.is_exhausted());
        assert_eq!(budget.try_advance(), Err(BudgetExceeded { limit: 2 }));
        assert_eq!(budget.current_step(), 2);
        assert_eq!(budget.remaining(), 0);
    }

    #[test]
    fn zero_budget_is_exhausted_immediately() {
        let mut budget = RunBudget::new(0);
        assert!(budget.is_exhausted());
        assert!(budget.try_advance().is_err());
    }

    #[test]
    fn step_serializes_status_in_snake_case() {
        let step = Step::new(StepId::new(7), "x").with_tool("code");
        let value = serde_json::to_value(&step).unwrap();
        assert_eq!(value["status"], "pending");
        assert_eq!(value["id"], 7);
        assert_eq!(value["tool"], "code");
        assert!(value.get("error").is_none());
    }
}
