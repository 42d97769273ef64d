//! # Stepweave Memory
//!
//! The [`MemoryStore`] is the run's append-only log of capability outcomes.
//! Every completed dispatch appends one [`DataEntry`]; the planner reads the
//! log back as prose through [`MemoryStore::get_formatted_context`].
//!
//! Two indices (by entry type and by step id) point into the log. They are
//! rebuilt from the log whenever entries are removed, so both are always
//! consistent subsets of it.

mod render;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use stepweave_core::StepId;

pub use render::{EMPTY_CONTEXT, summarize_value};

/// Serialized size (in bytes of compact JSON) above which
/// [`MemoryStore::get_concise_context`] summarizes an entry.
pub const DEFAULT_SUMMARY_THRESHOLD: usize = 2_000;

/// Immutable record of one completed capability invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataEntry {
    pub step_id: StepId,
    /// Capability name that produced the entry.
    pub entry_type: String,
    pub data: Value,
    pub timestamp: DateTime<Utc>,
}

#[derive(Serialize, Deserialize)]
struct StoredLog {
    entries: Vec<DataEntry>,
    summary_threshold: usize,
}

/// Indexed, append-only log of step outcomes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "StoredLog", into = "StoredLog")]
pub struct MemoryStore {
    log: Vec<DataEntry>,
    by_type: HashMap<String, Vec<usize>>,
    by_step: HashMap<StepId, Vec<usize>>,
    summary_threshold: usize,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            log: Vec::new(),
            by_type: HashMap::new(),
            by_step: HashMap::new(),
            summary_threshold: DEFAULT_SUMMARY_THRESHOLD,
        }
    }

    /// Builder: entry size above which concise context summarizes.
    pub fn with_summary_threshold(mut self, bytes: usize) -> Self {
        self.summary_threshold = bytes;
        self
    }

    pub fn summary_threshold(&self) -> usize {
        self.summary_threshold
    }

    /// Append an outcome. No deduplication; repeated calls add repeated
    /// entries.
    pub fn add_result(&mut self, step_id: StepId, entry_type: impl Into<String>, data: Value) {
        let entry_type = entry_type.into();
        let now = Utc::now();
        // Never go backwards, even if the wall clock does.
        let timestamp = match self.log.last() {
            Some(last) if last.timestamp > now => last.timestamp,
            _ => now,
        };

        let index = self.log.len();
        self.by_type.entry(entry_type.clone()).or_default().push(index);
        self.by_step.entry(step_id).or_default().push(index);
        tracing::debug!(%step_id, entry_type = %entry_type, index, "Recorded step result");
        self.log.push(DataEntry {
            step_id,
            entry_type,
            data,
            timestamp,
        });
    }

    /// Entries produced by capability `entry_type`, in insertion order.
    pub fn get_results_by_type(&self, entry_type: &str) -> Vec<&DataEntry> {
        self.lookup(self.by_type.get(entry_type))
    }

    /// Entries recorded for `step_id`, in insertion order.
    pub fn get_results_by_step_id(&self, step_id: StepId) -> Vec<&DataEntry> {
        self.lookup(self.by_step.get(&step_id))
    }

    fn lookup(&self, indices: Option<&Vec<usize>>) -> Vec<&DataEntry> {
        indices
            .map(|idx| idx.iter().filter_map(|&i| self.log.get(i)).collect())
            .unwrap_or_default()
    }

    /// The whole log rendered for the planner.
    pub fn get_formatted_context(&self) -> String {
        render::format_entries(&self.log, None)
    }

    /// The last `max_entries` entries, with oversized payloads summarized.
    pub fn get_concise_context(&self, max_entries: usize) -> String {
        let start = self.log.len().saturating_sub(max_entries);
        render::format_entries(&self.log[start..], Some(self.summary_threshold))
    }

    /// Remove every entry recorded for `step_id`. Returns how many were
    /// removed.
    pub fn clear_step_data(&mut self, step_id: StepId) -> usize {
        let before = self.log.len();
        self.log.retain(|entry| entry.step_id != step_id);
        let removed = before - self.log.len();
        if removed > 0 {
            self.rebuild_indices();
        }
        removed
    }

    fn rebuild_indices(&mut self) {
        self.by_type.clear();
        self.by_step.clear();
        for (index, entry) in self.log.iter().enumerate() {
            self.by_type
                .entry(entry.entry_type.clone())
                .or_default()
                .push(index);
            self.by_step.entry(entry.step_id).or_default().push(index);
        }
    }

    pub fn entries(&self) -> &[DataEntry] {
        &self.log
    }

    pub fn len(&self) -> usize {
        self.log.len()
    }

    pub fn is_empty(&self) -> bool {
        self.log.is_empty()
    }
}

impl From<StoredLog> for MemoryStore {
    fn from(stored: StoredLog) -> Self {
        let mut store = Self {
            log: stored.entries,
            by_type: HashMap::new(),
            by_step: HashMap::new(),
            summary_threshold: stored.summary_threshold,
        };
        store.rebuild_indices();
        store
    }
}

impl From<MemoryStore> for StoredLog {
    fn from(store: MemoryStore) -> Self {
        Self {
            entries: store.log,
            summary_threshold: store.summary_threshold,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn id(n: u64) -> StepId {
        StepId::new(n)
    }

    #[test]
    fn empty_store_has_sentinel_context() {
        let store = MemoryStore::new();
        assert!(store.is_empty());
        assert_eq!(store.get_formatted_context(), EMPTY_CONTEXT);
        assert_eq!(store.get_concise_context(5), EMPTY_CONTEXT);
        assert!(store.get_results_by_type("search").is_empty());
        assert!(store.get_results_by_step_id(id(1)).is_empty());
    }

    #[test]
    fn indices_return_insertion_order() {
        let mut store = MemoryStore::new();
        store.add_result(id(1), "search", json!({"n": 1}));
        store.add_result(id(2), "file", json!({"n": 2}));
        store.add_result(id(1), "search", json!({"n": 3}));

        let by_type: Vec<_> = store
            .get_results_by_type("search")
            .iter()
            .map(|e| e.data["n"].clone())
            .collect();
        assert_eq!(by_type, vec![json!(1), json!(3)]);

        let by_step = store.get_results_by_step_id(id(2));
        assert_eq!(by_step.len(), 1);
        assert_eq!(by_step[0].entry_type, "file");
    }

    #[test]
    fn duplicates_are_kept() {
        let mut store = MemoryStore::new();
        store.add_result(id(1), "search", json!("same"));
        store.add_result(id(1), "search", json!("same"));
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn timestamps_never_decrease() {
        let mut store = MemoryStore::new();
        for i in 0..20 {
            store.add_result(id(i), "code", json!(i));
        }
        assert!(
            store
                .entries()
                .windows(2)
                .all(|w| w[0].timestamp <= w[1].timestamp)
        );
    }

    #[test]
    fn clear_step_data_keeps_indices_consistent() {
        let mut store = MemoryStore::new();
        store.add_result(id(1), "search", json!("a"));
        store.add_result(id(2), "search", json!("b"));
        store.add_result(id(3), "file", json!("c"));

        assert_eq!(store.clear_step_data(id(2)), 1);
        assert_eq!(store.clear_step_data(id(9)), 0);
        assert_eq!(store.len(), 2);
        assert!(store.get_results_by_step_id(id(2)).is_empty());

        let search = store.get_results_by_type("search");
        assert_eq!(search.len(), 1);
        assert_eq!(search[0].data, json!("a"));
        assert_eq!(store.get_results_by_step_id(id(3))[0].data, json!("c"));
    }

    #[test]
    fn formatted_context_is_idempotent() {
        let mut store = MemoryStore::new();
        store.add_result(id(1), "search", json!({"query": "rust", "results": []}));
        let first = store.get_formatted_context();
        assert_eq!(first, store.get_formatted_context());
        assert!(first.contains("Step 1"));
        assert!(first.contains("search"));
        assert!(first.contains("\"query\": \"rust\""));
    }

    #[test]
    fn concise_context_limits_and_summarizes() {
        let mut store = MemoryStore::new().with_summary_threshold(100);
        store.add_result(id(1), "search", json!("first"));
        store.add_result(id(2), "browser", json!({"page": "x".repeat(5_000)}));
        store.add_result(id(3), "file", json!({"path": "a.txt"}));

        let context = store.get_concise_context(2);
        assert!(!context.contains("first"));
        assert!(context.contains("Step 2"));
        assert!(context.contains("\"page\""));
        assert!(context.contains("truncated"));
        assert!(context.len() < 2_000);
        assert!(context.contains("a.txt"));
    }

    #[test]
    fn serde_roundtrip_rebuilds_indices() {
        let mut store = MemoryStore::new();
        store.add_result(id(1), "search", json!(1));
        store.add_result(id(2), "code", json!(2));

        let json = serde_json::to_string(&store).unwrap();
        let restored: MemoryStore = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, store);
        assert_eq!(restored.get_results_by_type("code").len(), 1);
    }
}
