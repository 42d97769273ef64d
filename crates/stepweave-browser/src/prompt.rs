use serde_json::{Value, json};

use crate::method::BrowserMethod;
use crate::types::{BrowserStep, ExtractedData};

const RESULT_PREVIEW_CHARS: usize = 300;

pub(crate) const DECISION_SYSTEM_PROMPT: &str = "You control a web browser one atomic action at a time. \
Choose exactly one method per turn:\n\
- GOTO: navigate to the URL given as instruction\n\
- ACT: perform the interaction described by the instruction (click, type, scroll)\n\
- EXTRACT: extract the data described by the instruction from the current page\n\
- OBSERVE: describe the page or the elements relevant to the instruction\n\
- HTML: return the raw page markup\n\
- SCREENSHOT: capture the viewport\n\
- WAIT: pause for the duration given as instruction, e.g. \"2s\"\n\
- NAVBACK: go back to the previous page\n\
- AI_HANDLE: answer the instruction by reasoning alone, without touching the page\n\
- CLOSE: the goal is achieved or cannot be achieved; stop browsing\n\
Do not repeat an action that already produced its result.";

pub(crate) fn decision_schema() -> Value {
    let methods: Vec<&str> = BrowserMethod::ALL.iter().map(|m| m.as_str()).collect();
    json!({
        "type": "object",
        "properties": {
            "text": {"type": "string", "description": "what this step does"},
            "reasoning": {"type": "string"},
            "method": {"type": "string", "enum": methods},
            "instruction": {"type": ["string", "null"]}
        },
        "required": ["text", "reasoning", "method"],
        "additionalProperties": false
    })
}

pub(crate) fn decision_prompt(
    goal: &str,
    current_url: Option<&str>,
    recent: &[BrowserStep],
    step: u32,
    max_steps: u32,
) -> String {
    let mut prompt = format!(
        "Goal: {goal}\nCurrent URL: {}\nStep {step} of {max_steps}.\n",
        current_url.unwrap_or("(no page loaded)")
    );
    if recent.is_empty() {
        prompt.push_str("\nNo browser actions have been taken yet.\n");
    } else {
        prompt.push_str("\nRecent actions (oldest first):\n");
        for s in recent {
            prompt.push_str(&format!(
                "- {} {}: {}\n  result: {}\n",
                s.method,
                s.instruction.as_deref().unwrap_or("-"),
                s.text,
                preview(&s.result)
            ));
        }
    }
    prompt.push_str("\nDecide the next action.");
    prompt
}

pub(crate) fn sufficiency_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "sufficient": {"type": "boolean"},
            "reason": {"type": "string"}
        },
        "required": ["sufficient", "reason"],
        "additionalProperties": false
    })
}

pub(crate) fn sufficiency_prompt(goal: &str, results: &[ExtractedData]) -> String {
    format!(
        "Goal: {goal}\n\nData collected so far:\n{}\n\nIs this data sufficient to accomplish the goal?",
        render_results(results)
    )
}

pub(crate) fn ai_handle_prompt(goal: &str, instruction: &str, recent: &[BrowserStep]) -> String {
    let context: Vec<String> = recent
        .iter()
        .map(|s| format!("{} -> {}", s.method, preview(&s.result)))
        .collect();
    format!(
        "Overall goal: {goal}\nTask: {instruction}\n\nBrowsing context:\n{}",
        context.join("\n")
    )
}

pub(crate) fn summary_prompt(goal: &str, results: &[ExtractedData]) -> String {
    format!(
        "Summarize the following browsing results with respect to the goal.\n\nGoal: {goal}\n\n{}",
        render_results(results)
    )
}

fn render_results(results: &[ExtractedData]) -> String {
    results
        .iter()
        .map(|r| {
            format!(
                "[{:?} step {}] {}",
                r.data_type,
                r.metadata.step,
                serde_json::to_string(&r.content).unwrap_or_default()
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn preview(value: &Value) -> String {
    let text = match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    if text.chars().count() <= RESULT_PREVIEW_CHARS {
        return text;
    }
    let mut cut: String = text.chars().take(RESULT_PREVIEW_CHARS).collect();
    cut.push_str("...");
    cut
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn schema_lists_every_method() {
        let schema = decision_schema();
        assert_eq!(schema["properties"]["method"]["enum"].as_array().unwrap().len(), 10);
    }

    #[test]
    fn prompt_includes_window_with_previews() {
        let step = BrowserStep {
            text: "read page".into(),
            reasoning: String::new(),
            method: BrowserMethod::Html,
            instruction: None,
            result: Value::String("x".repeat(1_000)),
            timestamp: Utc::now(),
            url: None,
        };
        let prompt = decision_prompt("find price", Some("https://shop.test"), &[step], 2, 10);
        assert!(prompt.contains("Goal: find price"));
        assert!(prompt.contains("https://shop.test"));
        assert!(prompt.contains("Step 2 of 10"));
        assert!(prompt.contains("HTML -: read page"));
        assert!(prompt.len() < 1_000);
    }
}
