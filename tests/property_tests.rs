//! Property tests for the results log, the step budget and step numbering.

use proptest::prelude::*;
use serde_json::json;
use std::sync::Arc;
use stepweave::core::{RunBudget, StepId};
use stepweave::memory::{EMPTY_CONTEXT, MemoryStore};
use stepweave::{Orchestrator, OrchestratorConfig, ToolRegistry};
use stepweave_testing::fixtures::next_step;
use stepweave_testing::{MockOracle, MockTool};

const STEP_RANGE: std::ops::Range<u64> = 1..6;

/// (step id, entry type, payload) in insertion order.
fn entries_strategy() -> impl Strategy<Value = Vec<(u64, String, i64)>> {
    prop::collection::vec(
        (
            STEP_RANGE,
            prop::sample::select(vec!["search", "file", "code", "browser"]).prop_map(String::from),
            any::<i64>(),
        ),
        0..40,
    )
}

fn fill(entries: &[(u64, String, i64)]) -> MemoryStore {
    let mut store = MemoryStore::new();
    for (seq, (step, kind, value)) in entries.iter().enumerate() {
        store.add_result(StepId::new(*step), kind.clone(), json!({"seq": seq, "value": value}));
    }
    store
}

fn sequence_numbers(store: &MemoryStore, step: u64) -> Vec<u64> {
    store
        .get_results_by_step_id(StepId::new(step))
        .iter()
        .filter_map(|entry| entry.data["seq"].as_u64())
        .collect()
}

proptest! {
    #[test]
    fn results_by_step_are_exact_and_ordered(entries in entries_strategy()) {
        let store = fill(&entries);
        prop_assert_eq!(store.len(), entries.len());

        for step in STEP_RANGE {
            let expected: Vec<u64> = entries
                .iter()
                .enumerate()
                .filter(|(_, (s, _, _))| *s == step)
                .map(|(seq, _)| seq as u64)
                .collect();
            prop_assert_eq!(sequence_numbers(&store, step), expected);
        }
    }

    #[test]
    fn formatted_context_is_idempotent(entries in entries_strategy()) {
        let store = fill(&entries);
        let first = store.get_formatted_context();
        let second = store.get_formatted_context();
        prop_assert_eq!(&first, &second);

        if entries.is_empty() {
            prop_assert_eq!(first.as_str(), EMPTY_CONTEXT);
        } else {
            prop_assert!(first.starts_with("Results of previous steps:"));
        }
    }

    #[test]
    fn clearing_a_step_leaves_the_rest(entries in entries_strategy(), victim in STEP_RANGE) {
        let mut store = fill(&entries);
        let before: Vec<Vec<u64>> = STEP_RANGE.map(|step| sequence_numbers(&store, step)).collect();

        let removed = store.clear_step_data(StepId::new(victim));
        prop_assert_eq!(removed, before[(victim - 1) as usize].len());
        prop_assert!(store.get_results_by_step_id(StepId::new(victim)).is_empty());

        for step in STEP_RANGE.filter(|s| *s != victim) {
            prop_assert_eq!(&sequence_numbers(&store, step), &before[(step - 1) as usize]);
        }
        let by_type: usize = ["search", "file", "code", "browser"]
            .iter()
            .map(|kind| store.get_results_by_type(kind).len())
            .sum();
        prop_assert_eq!(by_type, store.len());
    }

    #[test]
    fn budget_grants_at_most_its_limit(max in 0u32..50, attempts in 0u32..80) {
        let mut budget = RunBudget::new(max);
        let granted = (0..attempts).filter(|_| budget.try_advance().is_ok()).count() as u32;
        prop_assert_eq!(granted, attempts.min(max));
        prop_assert_eq!(budget.is_exhausted(), attempts >= max);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn step_ids_increase_within_the_budget(max_steps in 1u32..8) {
        let tool = MockTool::new("file");
        let oracle = MockOracle::constant(next_step("list", "file", json!({"path": "."})));
        let registry = ToolRegistry::new().try_with_tool(Arc::new(tool.clone())).unwrap();

        let outcome = tokio_test::block_on(
            Orchestrator::new(
                Arc::new(oracle),
                registry,
                OrchestratorConfig::new().with_max_steps(max_steps),
            )
            .run("never finishes"),
        );

        let ids: Vec<u64> = outcome.steps.iter().map(|s| s.id().get()).collect();
        let expected: Vec<u64> = (1..=u64::from(max_steps)).collect();
        prop_assert_eq!(ids, expected);
        prop_assert_eq!(tool.call_count(), max_steps as usize);
    }
}
