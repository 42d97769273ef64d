//! # Orchestrator
//!
//! The outer plan-act-observe loop:
//!
//! ```text
//! Planning ──► Dispatching ──► Recording ──► Planning …
//!    │              │
//!    ▼              ▼
//! Completed       Failed
//! ```
//!
//! The step budget is checked before every planning call. A completion
//! verdict ends the run as `goal-satisfied`; a planner failure as
//! `planner-error`; a dispatch failure marks the step failed and ends the
//! run as `handler-error`. Every path runs the same teardown, which shuts
//! the tool registry down.

use chrono::Utc;
use serde_json::{Map, Value};
use std::sync::Arc;
use stepweave_core::{
    ArtifactStore, BudgetExceeded, OrchestrationError, Oracle, RunBudget, Step, StepTransitionError,
};
use stepweave_memory::MemoryStore;
use stepweave_tools::ToolRegistry;
use tracing::{Instrument, debug, error, info, warn};

use crate::config::OrchestratorConfig;
use crate::outcome::{RunOutcome, TerminationReason};
use crate::planner::{PlannerDecision, StepPlanner};
use crate::selector::ToolSelector;
use crate::subtasks::SubtaskTracker;

/// Where the loop currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Planning,
    Dispatching,
    Recording,
    Completed,
    Failed,
}

/// Mutable state of one run.
struct RunState {
    phase: Phase,
    budget: RunBudget,
    memory: MemoryStore,
    steps: Vec<Step>,
    tracker: Option<SubtaskTracker>,
}

impl RunState {
    fn enter(&mut self, phase: Phase) {
        debug!(from = ?self.phase, to = ?phase, "Phase transition");
        self.phase = phase;
    }
}

pub struct Orchestrator {
    oracle: Arc<dyn Oracle>,
    registry: ToolRegistry,
    config: OrchestratorConfig,
    artifacts: Option<Arc<dyn ArtifactStore>>,
}

impl Orchestrator {
    pub fn new(oracle: Arc<dyn Oracle>, registry: ToolRegistry, config: OrchestratorConfig) -> Self {
        Self {
            oracle,
            registry,
            config,
            artifacts: None,
        }
    }

    /// Persist per-step results and the checklist through `store`.
    pub fn with_artifacts(mut self, store: Arc<dyn ArtifactStore>) -> Self {
        self.artifacts = Some(store);
        self
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Run `goal` to termination under a fresh run id.
    pub async fn run(&self, goal: &str) -> RunOutcome {
        self.run_with_id(uuid::Uuid::new_v4().to_string(), goal).await
    }

    pub async fn run_with_id(&self, run_id: impl Into<String>, goal: &str) -> RunOutcome {
        let run_id = run_id.into();
        let span = tracing::info_span!("run", run_id = %run_id);
        self.run_inner(run_id, goal).instrument(span).await
    }

    async fn run_inner(&self, run_id: String, goal: &str) -> RunOutcome {
        let started_at = Utc::now();
        info!(run_id = %run_id, goal, max_steps = self.config.max_steps, "Run started");

        let descriptors = self.registry.descriptors();
        let mut planner = StepPlanner::new(self.oracle.clone(), descriptors.clone())
            .with_model(self.config.planner_model.clone());
        let selector = ToolSelector::new(self.oracle.clone(), descriptors)
            .with_model(self.config.dispatch_model.clone());

        let mut state = RunState {
            phase: Phase::Planning,
            budget: RunBudget::new(self.config.max_steps),
            memory: MemoryStore::new(),
            steps: Vec::new(),
            tracker: self
                .config
                .enable_subtask_tracking
                .then(|| SubtaskTracker::new(goal)),
        };

        let (termination, message, error_code) =
            match self.drive(goal, &mut planner, &selector, &mut state).await {
                Ok(reason) => {
                    state.enter(Phase::Completed);
                    (TerminationReason::GoalSatisfied, reason, None)
                }
                Err(err) => {
                    let reason = TerminationReason::from(&err);
                    if err.is_fatal() {
                        state.enter(Phase::Failed);
                        error!(code = err.error_code(), error = %err, "Run failed");
                    } else {
                        state.enter(Phase::Completed);
                        warn!(error = %err, "Run stopped before the goal was reached");
                    }
                    let code = err.is_fatal().then(|| err.error_code().to_string());
                    (reason, err.to_string(), code)
                }
            };

        self.teardown(&state).await;

        info!(
            run_id = %run_id,
            termination = %termination,
            steps = state.steps.len(),
            entries = state.memory.len(),
            "Run finished"
        );
        RunOutcome {
            run_id,
            goal: goal.to_string(),
            termination,
            message,
            error_code,
            entries: state.memory.entries().to_vec(),
            steps: state.steps,
            started_at,
            finished_at: Utc::now(),
        }
    }

    /// The loop proper; `Ok` carries the completion reason.
    async fn drive(
        &self,
        goal: &str,
        planner: &mut StepPlanner,
        selector: &ToolSelector,
        state: &mut RunState,
    ) -> Result<String, OrchestrationError> {
        loop {
            state.enter(Phase::Planning);
            if state.budget.is_exhausted() {
                return Err(BudgetExceeded {
                    limit: state.budget.max_steps(),
                }
                .into());
            }

            let context = match self.config.context_entries {
                Some(n) => state.memory.get_concise_context(n),
                None => state.memory.get_formatted_context(),
            };
            let mut step = match planner.decide(goal, &context).await? {
                PlannerDecision::Complete { reason } => {
                    info!(reason = %reason, "Goal satisfied");
                    return Ok(reason);
                }
                PlannerDecision::Next(step) => step,
            };
            let iteration = state.budget.try_advance()?;
            info!(
                step_id = %step.id(),
                iteration,
                tool = step.tool(),
                description = step.description(),
                "Step planned"
            );
            if step.is_error_marker() {
                warn!(step_id = %step.id(), "Dispatching a step without a description");
            }

            state.enter(Phase::Dispatching);
            let (tool, params) = match self.resolve_call(goal, selector, &step).await {
                Ok(call) => call,
                Err(err) => {
                    log_transition(step.fail(err.to_string()));
                    self.track(state, &step).await;
                    state.steps.push(step);
                    return Err(err.into());
                }
            };
            log_transition(step.assign_call(tool.clone(), params.clone()));
            log_transition(step.start());
            self.track(state, &step).await;

            let dispatched = self.registry.execute(&tool, &Value::Object(params)).await;
            let data = match dispatched {
                Ok(data) => data,
                Err(err) => {
                    let err = OrchestrationError::from(err);
                    log_transition(step.fail(err.to_string()));
                    self.track(state, &step).await;
                    state.steps.push(step);
                    return Err(err);
                }
            };

            state.enter(Phase::Recording);
            state.memory.add_result(step.id(), tool.as_str(), data.clone());
            log_transition(step.complete(data));
            info!(step_id = %step.id(), tool = %tool, "Step completed");
            self.persist_step(&step).await;
            self.track(state, &step).await;
            state.steps.push(step);
        }
    }

    /// Tool and arguments for `step`: the planner's when it gave both,
    /// otherwise the dispatch model's. Tools the registry does not know are
    /// passed through so dispatch reports them.
    async fn resolve_call(
        &self,
        goal: &str,
        selector: &ToolSelector,
        step: &Step,
    ) -> Result<(String, Map<String, Value>), stepweave_core::PlannerError> {
        match (step.tool(), step.params()) {
            (Some(tool), Some(params)) => Ok((tool.to_string(), params.clone())),
            (Some(tool), None) if self.registry.get_tool(tool).is_none() => {
                Ok((tool.to_string(), Map::new()))
            }
            _ => {
                let choice = selector.choose(goal, step).await?;
                Ok((choice.tool, choice.params))
            }
        }
    }

    async fn track(&self, state: &mut RunState, step: &Step) {
        let Some(tracker) = state.tracker.as_mut() else {
            return;
        };
        tracker.update(step);
        let Some(store) = &self.artifacts else {
            return;
        };
        if let Err(err) = store.write_file("todo.md", &tracker.render_markdown()).await {
            warn!(error = %err, "Failed to write todo.md");
        }
    }

    async fn persist_step(&self, step: &Step) {
        let Some(store) = &self.artifacts else {
            return;
        };
        let path = format!("steps/step-{}.json", step.id());
        let written = match serde_json::to_string_pretty(step) {
            Ok(json) => store.write_file(&path, &json).await.map_err(|e| e.to_string()),
            Err(e) => Err(e.to_string()),
        };
        if let Err(err) = written {
            warn!(path = %path, error = %err, "Failed to persist step result");
        }
    }

    async fn teardown(&self, state: &RunState) {
        debug!(phase = ?state.phase, "Run teardown");
        self.registry.shutdown().await;
    }
}

fn log_transition(result: Result<(), StepTransitionError>) {
    if let Err(err) = result {
        error!(error = %err, "Step status transition rejected");
    }
}
