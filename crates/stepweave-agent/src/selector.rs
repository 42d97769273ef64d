//! Tool selection for steps the planner left without a tool or parameters.

use serde::Deserialize;
use serde_json::{Map, Value, json};
use std::sync::Arc;
use stepweave_core::{Oracle, OracleRequest, PlannerError, Step, complete_as};
use stepweave_tools::ToolDescriptor;

use crate::planner::render_tools;

const SELECTOR_SYSTEM_PROMPT: &str = "You route one task step to exactly one tool. \
Choose the tool that performs the step and give its parameters, following the tool's parameter schema.";

/// The dispatch model's choice for one step.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ToolChoice {
    pub tool: String,
    #[serde(default)]
    pub params: Map<String, Value>,
    #[serde(default)]
    pub reasoning: String,
}

pub struct ToolSelector {
    oracle: Arc<dyn Oracle>,
    tools: Vec<ToolDescriptor>,
    model: Option<String>,
}

impl ToolSelector {
    pub fn new(oracle: Arc<dyn Oracle>, tools: Vec<ToolDescriptor>) -> Self {
        Self {
            oracle,
            tools,
            model: None,
        }
    }

    pub fn with_model(mut self, model: Option<String>) -> Self {
        self.model = model;
        self
    }

    /// Choose one registered tool for `step`. A tool the planner already
    /// named is kept and only its parameters are filled in.
    pub async fn choose(&self, goal: &str, step: &Step) -> Result<ToolChoice, PlannerError> {
        let names: Vec<&str> = match step.tool() {
            Some(named) => vec![named],
            None => self.tools.iter().map(|t| t.name.as_str()).collect(),
        };
        let candidates: Vec<ToolDescriptor> = self
            .tools
            .iter()
            .filter(|t| names.contains(&t.name.as_str()))
            .cloned()
            .collect();
        if candidates.is_empty() {
            return Err(PlannerError::InvalidDecision(format!(
                "no registered tool can run step {}: {}",
                step.id(),
                names.join(", ")
            )));
        }

        let schema = json!({
            "type": "object",
            "properties": {
                "tool": {"type": "string", "enum": names},
                "params": {"type": "object"},
                "reasoning": {"type": "string"}
            },
            "required": ["tool", "params"]
        });
        let prompt = format!(
            "Overall goal: {goal}\n\nStep: {}\n\nTools:\n{}\n\nWhich tool performs this step, and with which parameters?",
            step.description(),
            render_tools(&candidates)
        );
        let request = OracleRequest::new(prompt)
            .with_system(SELECTOR_SYSTEM_PROMPT)
            .with_model(self.model.as_deref());

        let mut choice: ToolChoice = complete_as(self.oracle.as_ref(), request, &schema).await?;
        choice.tool = choice.tool.trim().to_string();
        if !candidates.iter().any(|t| t.name == choice.tool) {
            return Err(PlannerError::InvalidDecision(format!(
                "dispatch model chose unknown tool '{}'",
                choice.tool
            )));
        }
        tracing::debug!(step_id = %step.id(), tool = %choice.tool, reasoning = %choice.reasoning, "Tool selected");
        Ok(choice)
    }
}
