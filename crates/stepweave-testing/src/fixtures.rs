//! JSON builders for scripted oracle replies.

use serde_json::{Value, json};

/// Planner reply naming the next step and the tool to run it.
pub fn next_step(description: &str, tool: &str, params: Value) -> Value {
    json!({
        "is_complete": false,
        "description": description,
        "tool": tool,
        "params": params,
    })
}

/// Planner reply naming a step but leaving the tool to the selector.
pub fn untooled_step(description: &str) -> Value {
    json!({ "is_complete": false, "description": description })
}

/// Planner reply declaring the goal satisfied.
pub fn complete(reason: &str) -> Value {
    json!({ "is_complete": true, "reason": reason })
}

/// Tool selector reply.
pub fn tool_choice(tool: &str, params: Value) -> Value {
    json!({ "tool": tool, "params": params, "reasoning": format!("{tool} fits the step") })
}

/// Browser engine decision.
pub fn browser_decision(method: &str, instruction: Option<&str>) -> Value {
    let text = match instruction {
        Some(instruction) => format!("{method} {instruction}"),
        None => method.to_string(),
    };
    json!({
        "text": text,
        "reasoning": "scripted",
        "method": method,
        "instruction": instruction,
    })
}

/// Sufficiency check verdict.
pub fn verdict(sufficient: bool, reason: &str) -> Value {
    json!({ "sufficient": sufficient, "reason": reason })
}
