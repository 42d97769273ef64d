//! # Step Planner
//!
//! Asks the oracle, given the goal and the formatted results of earlier
//! steps, for either the next step or a verdict that the goal is satisfied.
//! The planner owns the step-id counter, so ids are strictly increasing for
//! as long as one planner lives (one run).

use serde::Deserialize;
use serde_json::{Map, Value, json};
use std::sync::Arc;
use stepweave_core::{
    MISSING_DESCRIPTION_MARKER, Oracle, OracleRequest, PlannerError, Step, StepId, complete_as,
};
use stepweave_tools::ToolDescriptor;

const PLANNER_SYSTEM_PROMPT: &str = "You plan a task one step at a time. \
Each step is a single action performed by exactly one of the available tools. \
Look at the results of the previous steps. If they already accomplish the goal, \
declare the task complete and give the reason. Otherwise describe the next step, \
name the tool that performs it and give that tool's parameters.";

/// The planner's verdict for one iteration.
#[derive(Debug, Clone, PartialEq)]
pub enum PlannerDecision {
    /// The goal is satisfied; `reason` is the oracle's wording.
    Complete { reason: String },
    /// The next step, in `pending`.
    Next(Step),
}

#[derive(Debug, Deserialize)]
struct PlannerReply {
    #[serde(default)]
    is_complete: bool,
    #[serde(default)]
    reason: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    tool: Option<String>,
    #[serde(default)]
    params: Option<Map<String, Value>>,
}

fn planner_schema(tool_names: &[String]) -> Value {
    let mut tools: Vec<Value> = tool_names.iter().cloned().map(Value::String).collect();
    tools.push(Value::Null);
    json!({
        "type": "object",
        "properties": {
            "is_complete": {"type": "boolean"},
            "reason": {"type": ["string", "null"], "description": "why the goal is satisfied"},
            "description": {"type": ["string", "null"], "description": "the next step"},
            "tool": {"type": ["string", "null"], "enum": tools},
            "params": {"type": ["object", "null"]}
        },
        "required": ["is_complete"]
    })
}

/// Render the capability list shown to planning and dispatch prompts.
pub(crate) fn render_tools(tools: &[ToolDescriptor]) -> String {
    if tools.is_empty() {
        return "(no tools registered)".to_string();
    }
    tools
        .iter()
        .map(|t| {
            format!(
                "- {}: {}\n  parameters: {}",
                t.name,
                if t.description.is_empty() { "-" } else { t.description.as_str() },
                t.parameters
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub struct StepPlanner {
    oracle: Arc<dyn Oracle>,
    tools: Vec<ToolDescriptor>,
    model: Option<String>,
    next_id: u64,
}

impl StepPlanner {
    pub fn new(oracle: Arc<dyn Oracle>, tools: Vec<ToolDescriptor>) -> Self {
        Self {
            oracle,
            tools,
            model: None,
            next_id: 1,
        }
    }

    pub fn with_model(mut self, model: Option<String>) -> Self {
        self.model = model;
        self
    }

    /// Id the next planned step will get.
    pub fn peek_id(&self) -> StepId {
        StepId::new(self.next_id)
    }

    pub async fn decide(&mut self, goal: &str, context: &str) -> Result<PlannerDecision, PlannerError> {
        let prompt = format!(
            "Goal: {goal}\n\nAvailable tools:\n{}\n\n{context}\n\nWhat is the next step?",
            render_tools(&self.tools)
        );
        tracing::debug!(prompt_chars = prompt.len(), "Planning next step");

        let names: Vec<String> = self.tools.iter().map(|t| t.name.clone()).collect();
        let request = OracleRequest::new(prompt)
            .with_system(PLANNER_SYSTEM_PROMPT)
            .with_model(self.model.as_deref());
        let reply: PlannerReply =
            complete_as(self.oracle.as_ref(), request, &planner_schema(&names)).await?;

        if reply.is_complete {
            let reason = reply
                .reason
                .map(|r| r.trim().to_string())
                .filter(|r| !r.is_empty())
                .unwrap_or_else(|| "The planner reported the goal as satisfied".to_string());
            return Ok(PlannerDecision::Complete { reason });
        }

        let description = match reply.description.map(|d| d.trim().to_string()) {
            Some(d) if !d.is_empty() => d,
            _ => {
                tracing::warn!(step_id = self.next_id, "Planner omitted the step description");
                MISSING_DESCRIPTION_MARKER.to_string()
            }
        };

        let mut step = Step::new(StepId::new(self.next_id), description);
        self.next_id += 1;
        if let Some(tool) = reply.tool.map(|t| t.trim().to_string()).filter(|t| !t.is_empty()) {
            step = step.with_tool(tool);
        }
        if let Some(params) = reply.params {
            step = step.with_params(params);
        }
        Ok(PlannerDecision::Next(step))
    }
}
