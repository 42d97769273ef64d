use serde_json::{Map, Value};

use crate::DataEntry;

/// Context returned when no step has run yet.
pub const EMPTY_CONTEXT: &str = "No previous steps have been executed yet.";

const MAX_STRING_CHARS: usize = 200;
const MAX_ARRAY_ITEMS: usize = 5;

pub(crate) fn format_entries(entries: &[DataEntry], summarize_above: Option<usize>) -> String {
    if entries.is_empty() {
        return EMPTY_CONTEXT.to_string();
    }

    let mut out = String::from("Results of previous steps:\n");
    for entry in entries {
        let compact = entry.data.to_string();
        let payload = match summarize_above {
            Some(limit) if compact.len() > limit => summarize_value(&entry.data),
            _ => entry.data.clone(),
        };
        let body = serde_json::to_string_pretty(&payload).unwrap_or(compact);
        out.push_str(&format!(
            "\nStep {} ({}) at {}:\n{}\n",
            entry.step_id,
            entry.entry_type,
            entry.timestamp.to_rfc3339(),
            body
        ));
    }
    out
}

/// Shrink a payload for prompts: long strings are cut, long arrays keep
/// their first items, object keys are all kept.
pub fn summarize_value(value: &Value) -> Value {
    match value {
        Value::String(s) => Value::String(truncate(s, MAX_STRING_CHARS)),
        Value::Array(items) => {
            let mut kept: Vec<Value> = items
                .iter()
                .take(MAX_ARRAY_ITEMS)
                .map(summarize_value)
                .collect();
            if items.len() > MAX_ARRAY_ITEMS {
                kept.push(Value::String(format!(
                    "... {} more items",
                    items.len() - MAX_ARRAY_ITEMS
                )));
            }
            Value::Array(kept)
        }
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), summarize_value(v)))
                .collect::<Map<String, Value>>(),
        ),
        other => other.clone(),
    }
}

fn truncate(input: &str, max_chars: usize) -> String {
    let char_count = input.chars().count();
    if char_count <= max_chars {
        return input.to_string();
    }
    let mut preview: String = input.chars().take(max_chars).collect();
    preview.push_str(&format!("... [truncated, total_chars={}]", char_count));
    preview
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn summarize_keeps_keys_and_cuts_strings() {
        let value = json!({
            "title": "short",
            "body": "é".repeat(300),
            "links": (0..8).collect::<Vec<_>>(),
        });
        let summary = summarize_value(&value);
        assert_eq!(summary["title"], "short");
        let body = summary["body"].as_str().unwrap();
        assert!(body.starts_with(&"é".repeat(200)));
        assert!(body.ends_with("total_chars=300]"));
        let links = summary["links"].as_array().unwrap();
        assert_eq!(links.len(), MAX_ARRAY_ITEMS + 1);
        assert_eq!(links[MAX_ARRAY_ITEMS], "... 3 more items");
    }

    #[test]
    fn scalars_pass_through() {
        assert_eq!(summarize_value(&json!(42)), json!(42));
        assert_eq!(summarize_value(&json!(null)), json!(null));
    }
}
