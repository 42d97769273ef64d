//! The record of one finished run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fmt::Write as _;
use stepweave_core::{OrchestrationError, Step, StepStatus};
use stepweave_memory::DataEntry;

/// Machine-readable reason a run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TerminationReason {
    GoalSatisfied,
    BudgetExhausted,
    HandlerError,
    PlannerError,
}

impl TerminationReason {
    pub fn as_str(self) -> &'static str {
        match self {
            TerminationReason::GoalSatisfied => "goal-satisfied",
            TerminationReason::BudgetExhausted => "budget-exhausted",
            TerminationReason::HandlerError => "handler-error",
            TerminationReason::PlannerError => "planner-error",
        }
    }

    /// Goal satisfied or budget spent: the run itself worked.
    pub fn is_success(self) -> bool {
        matches!(
            self,
            TerminationReason::GoalSatisfied | TerminationReason::BudgetExhausted
        )
    }
}

impl fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&OrchestrationError> for TerminationReason {
    fn from(err: &OrchestrationError) -> Self {
        match err {
            OrchestrationError::Planner(_) => TerminationReason::PlannerError,
            OrchestrationError::Budget(_) => TerminationReason::BudgetExhausted,
            OrchestrationError::Validation { .. }
            | OrchestrationError::Handler(_)
            | OrchestrationError::Loop(_) => TerminationReason::HandlerError,
        }
    }
}

/// Everything a run produced, as written to `run.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunOutcome {
    pub run_id: String,
    pub goal: String,
    pub termination: TerminationReason,
    /// One human-readable sentence on why the run stopped.
    pub message: String,
    /// Stable error code for failed runs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    pub steps: Vec<Step>,
    pub entries: Vec<DataEntry>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RunOutcome {
    pub fn is_success(&self) -> bool {
        self.termination.is_success()
    }

    pub fn completed_steps(&self) -> usize {
        self.steps
            .iter()
            .filter(|s| s.status() == StepStatus::Completed)
            .count()
    }

    /// Plain Markdown rendering written as `summary.md`.
    pub fn summary_markdown(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "# Run {}\n", self.run_id);
        let _ = writeln!(out, "**Goal:** {}\n", self.goal);
        let _ = writeln!(out, "**Termination:** {}\n", self.termination);
        let _ = writeln!(out, "{}\n", self.message);
        let elapsed = self.finished_at - self.started_at;
        let _ = writeln!(
            out,
            "{} of {} steps completed in {:.1}s.\n",
            self.completed_steps(),
            self.steps.len(),
            elapsed.num_milliseconds() as f64 / 1000.0
        );

        if !self.steps.is_empty() {
            out.push_str("## Steps\n\n");
            for step in &self.steps {
                let _ = write!(
                    out,
                    "{}. [{}] {}",
                    step.id(),
                    step.status(),
                    step.description()
                );
                if let Some(tool) = step.tool() {
                    let _ = write!(out, " (`{tool}`)");
                }
                if let Some(error) = step.error() {
                    let _ = write!(out, ": {error}");
                }
                out.push('\n');
            }
        }
        out
    }
}
