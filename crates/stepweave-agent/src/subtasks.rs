//! Checklist of planned steps, persisted as `todo.md`.

use stepweave_core::{Step, StepId, StepStatus};

#[derive(Debug, Clone, PartialEq)]
struct Subtask {
    id: StepId,
    description: String,
    tool: Option<String>,
    status: StepStatus,
    error: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct SubtaskTracker {
    goal: String,
    items: Vec<Subtask>,
}

impl SubtaskTracker {
    pub fn new(goal: impl Into<String>) -> Self {
        Self {
            goal: goal.into(),
            items: Vec::new(),
        }
    }

    /// Add the step or refresh its entry.
    pub fn update(&mut self, step: &Step) {
        let item = Subtask {
            id: step.id(),
            description: step.description().to_string(),
            tool: step.tool().map(str::to_string),
            status: step.status(),
            error: step.error().map(str::to_string),
        };
        match self.items.iter_mut().find(|i| i.id == item.id) {
            Some(existing) => *existing = item,
            None => self.items.push(item),
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn status_of(&self, id: StepId) -> Option<StepStatus> {
        self.items.iter().find(|i| i.id == id).map(|i| i.status)
    }

    pub fn render_markdown(&self) -> String {
        let mut out = format!("# Task checklist\n\nGoal: {}\n\n", self.goal);
        if self.items.is_empty() {
            out.push_str("_No steps planned yet._\n");
            return out;
        }
        for item in &self.items {
            let mark = match item.status {
                StepStatus::Completed => "x",
                StepStatus::Failed => "!",
                StepStatus::Running => "~",
                StepStatus::Pending => " ",
            };
            out.push_str(&format!("- [{mark}] {}. {}", item.id, item.description));
            if let Some(tool) = &item.tool {
                out.push_str(&format!(" ({tool})"));
            }
            if let Some(error) = &item.error {
                out.push_str(&format!(" - {error}"));
            }
            out.push('\n');
        }
        out
    }
}
