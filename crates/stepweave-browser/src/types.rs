//! Records produced by one browser dispatch.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::method::BrowserMethod;

/// One executed (or closing) browser action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrowserStep {
    /// What the oracle said it was doing.
    pub text: String,
    pub reasoning: String,
    pub method: BrowserMethod,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instruction: Option<String>,
    pub result: Value,
    pub timestamp: DateTime<Utc>,
    /// Page URL after the action ran.
    #[serde(default)]
    pub url: Option<String>,
}

/// Kind of data collected by a data-producing method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractedKind {
    Extract,
    Html,
    Observe,
}

impl ExtractedKind {
    pub fn from_method(method: BrowserMethod) -> Option<Self> {
        match method {
            BrowserMethod::Extract => Some(ExtractedKind::Extract),
            BrowserMethod::Html => Some(ExtractedKind::Html),
            BrowserMethod::Observe => Some(ExtractedKind::Observe),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedMetadata {
    pub url: Option<String>,
    pub instruction: Option<String>,
    /// Ordinal of the producing step within the dispatch, starting at 1.
    pub step: usize,
    pub timestamp: DateTime<Utc>,
}

/// Output of an `EXTRACT`, `HTML` or `OBSERVE` step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedData {
    pub data_type: ExtractedKind,
    pub content: Value,
    pub metadata: ExtractedMetadata,
}

/// Why the browser loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BrowserTermination {
    /// The oracle chose `CLOSE`.
    GoalCompleted,
    BudgetExhausted,
    /// The same action was chosen too many times in a row.
    LoopDetected,
    /// The sufficiency check judged the collected data enough.
    SufficientData,
}

impl BrowserTermination {
    pub fn as_str(self) -> &'static str {
        match self {
            BrowserTermination::GoalCompleted => "goal-completed",
            BrowserTermination::BudgetExhausted => "budget-exhausted",
            BrowserTermination::LoopDetected => "loop-detected",
            BrowserTermination::SufficientData => "sufficient-data",
        }
    }

    pub fn goal_completed(self) -> bool {
        matches!(
            self,
            BrowserTermination::GoalCompleted | BrowserTermination::SufficientData
        )
    }
}

impl fmt::Display for BrowserTermination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Aggregated result of one browser dispatch, returned to the outer loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrowserResult {
    pub message: String,
    pub steps: Vec<BrowserStep>,
    pub total_steps: usize,
    pub results: Vec<ExtractedData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    pub termination: BrowserTermination,
    pub goal_completed: bool,
}

impl BrowserResult {
    pub fn new(
        termination: BrowserTermination,
        message: impl Into<String>,
        steps: Vec<BrowserStep>,
        results: Vec<ExtractedData>,
    ) -> Self {
        Self {
            message: message.into(),
            total_steps: steps.len(),
            steps,
            results,
            summary: None,
            termination,
            goal_completed: termination.goal_completed(),
        }
    }

    /// Collected data of one kind.
    pub fn results_of(&self, kind: ExtractedKind) -> impl Iterator<Item = &ExtractedData> {
        self.results.iter().filter(move |r| r.data_type == kind)
    }
}

/// The oracle's choice of the next browser action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrowserDecision {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub reasoning: String,
    pub method: BrowserMethod,
    #[serde(default)]
    pub instruction: Option<String>,
}

impl BrowserDecision {
    /// Blank instructions count as absent.
    pub fn normalized(mut self) -> Self {
        self.instruction = self
            .instruction
            .map(|i| i.trim().to_string())
            .filter(|i| !i.is_empty());
        self
    }
}

/// The oracle's verdict on whether enough data has been collected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SufficiencyVerdict {
    pub sufficient: bool,
    #[serde(default)]
    pub reason: String,
}
