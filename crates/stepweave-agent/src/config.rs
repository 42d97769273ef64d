use serde::{Deserialize, Serialize};

/// Default outer step budget.
pub const DEFAULT_MAX_STEPS: u32 = 10;

/// Tuning for one [`Orchestrator`](crate::Orchestrator).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Steps that may be planned in one run.
    pub max_steps: u32,
    /// Model used by the step planner; the oracle default when unset.
    pub planner_model: Option<String>,
    /// Model used to pick a tool for steps the planner left untooled.
    pub dispatch_model: Option<String>,
    /// Keep a `todo.md` checklist of planned steps.
    pub enable_subtask_tracking: bool,
    /// Show the planner only the last N entries, summarizing large ones.
    /// The whole log is shown when unset.
    pub context_entries: Option<usize>,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_steps: DEFAULT_MAX_STEPS,
            planner_model: None,
            dispatch_model: None,
            enable_subtask_tracking: false,
            context_entries: None,
        }
    }
}

impl OrchestratorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_steps(mut self, max_steps: u32) -> Self {
        self.max_steps = max_steps;
        self
    }

    pub fn with_planner_model(mut self, model: impl Into<String>) -> Self {
        self.planner_model = Some(model.into());
        self
    }

    pub fn with_dispatch_model(mut self, model: impl Into<String>) -> Self {
        self.dispatch_model = Some(model.into());
        self
    }

    pub fn with_subtask_tracking(mut self, enabled: bool) -> Self {
        self.enable_subtask_tracking = enabled;
        self
    }

    pub fn with_context_entries(mut self, entries: usize) -> Self {
        self.context_entries = Some(entries);
        self
    }
}
