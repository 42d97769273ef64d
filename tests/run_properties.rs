//! End-to-end runs across the planner, the registry and the browser engine.

use rstest::rstest;
use serde_json::json;
use std::sync::Arc;
use stepweave::browser::{BrowserEngine, BrowserEngineConfig, BrowserTool, SessionManager};
use stepweave::core::{FailureReason, Tool};
use stepweave::{Orchestrator, OrchestratorConfig, RunOutcome, TerminationReason, ToolRegistry};
use stepweave_testing::fixtures::{browser_decision, complete, next_step};
use stepweave_testing::{MockBrowser, MockOracle, MockReply, MockTool};

fn browser_tool(oracle: &MockOracle, browser: &MockBrowser) -> Arc<dyn Tool> {
    let engine = BrowserEngine::new(Arc::new(oracle.clone()), BrowserEngineConfig::default());
    Arc::new(BrowserTool::new(
        Arc::new(engine),
        SessionManager::new(browser.factory()),
    ))
}

async fn run(oracle: &MockOracle, tools: Vec<Arc<dyn Tool>>, max_steps: u32) -> RunOutcome {
    let registry = tools.into_iter().fold(ToolRegistry::new(), |registry, tool| {
        registry.try_with_tool(tool).unwrap()
    });
    Orchestrator::new(
        Arc::new(oracle.clone()),
        registry,
        OrchestratorConfig::new().with_max_steps(max_steps),
    )
    .run("integration goal")
    .await
}

#[tokio::test]
async fn one_search_then_goal_satisfied() {
    let search = MockTool::new("search").with_default_response(json!({"results": [{"title": "X"}]}));
    let oracle = MockOracle::new()
        .with_structured(next_step("search for X", "search", json!({"query": "X"})))
        .with_structured(complete("X was found"));

    let outcome = run(&oracle, vec![Arc::new(search.clone())], 10).await;

    assert_eq!(outcome.termination, TerminationReason::GoalSatisfied);
    assert_eq!(search.call_count(), 1);
    assert_eq!(outcome.entries.len(), 1);
    assert_eq!(outcome.entries[0].entry_type, "search");
    assert_eq!(outcome.completed_steps(), 1);
}

#[rstest]
#[case(1)]
#[case(3)]
#[case(6)]
#[tokio::test]
async fn never_complete_dispatches_exactly_the_budget(#[case] max_steps: u32) {
    let file = MockTool::new("file");
    let oracle = MockOracle::constant(next_step("list", "file", json!({"path": "."})));

    let outcome = run(&oracle, vec![Arc::new(file.clone())], max_steps).await;

    assert_eq!(outcome.termination, TerminationReason::BudgetExhausted);
    assert_eq!(file.call_count(), max_steps as usize);
    assert_eq!(outcome.entries.len(), max_steps as usize);
    assert_eq!(outcome.message, format!("maximum steps reached ({max_steps})"));
}

#[tokio::test]
async fn first_handler_failure_ends_planning() {
    let code = MockTool::new("code").with_default_failure(FailureReason::Custom {
        category: "interpreter".into(),
        message: "exit status 1".into(),
    });
    let oracle = MockOracle::new()
        .with_structured(next_step("run the script", "code", json!({"code": "exit 1"})))
        .with_fallback(MockReply::Structured(next_step("again", "code", json!({}))));

    let outcome = run(&oracle, vec![Arc::new(code.clone())], 10).await;

    assert_eq!(outcome.termination, TerminationReason::HandlerError);
    assert!(!outcome.is_success());
    assert_eq!(code.call_count(), 1);
    assert_eq!(oracle.call_count(), 1);
}

#[tokio::test]
async fn browser_dispatch_extracts_title_then_closes() {
    let browser = MockBrowser::new().with_extract("title", json!({"title": "Example Domain"}));
    let oracle = MockOracle::new()
        .with_structured(next_step(
            "read the page title",
            "browser",
            json!({"goal": "read the title", "url": "https://example.com"}),
        ))
        .with_structured(browser_decision("EXTRACT", Some("title")))
        .with_structured(browser_decision("CLOSE", None))
        .with_structured(complete("the title is Example Domain"));

    let outcome = run(&oracle, vec![browser_tool(&oracle, &browser)], 10).await;

    assert_eq!(outcome.termination, TerminationReason::GoalSatisfied);
    assert_eq!(outcome.entries.len(), 1);
    let data = &outcome.entries[0].data;
    assert_eq!(data["total_steps"], 3);
    assert_eq!(data["goal_completed"], true);
    let extracts: Vec<&serde_json::Value> = data["results"]
        .as_array()
        .unwrap()
        .iter()
        .filter(|r| r["data_type"] == "extract")
        .collect();
    assert_eq!(extracts.len(), 1);
    assert_eq!(extracts[0]["content"]["title"], "Example Domain");

    assert_eq!(browser.opened(), 1);
    assert_eq!(browser.closed(), 1);
}

#[tokio::test]
async fn repeated_browser_action_is_cut_off() {
    let browser = MockBrowser::new();
    let oracle = MockOracle::new().with_structured(next_step(
        "page through results",
        "browser",
        json!({"goal": "see every page"}),
    ));
    for _ in 0..4 {
        oracle.push(MockReply::Structured(browser_decision("ACT", Some("click next"))));
    }
    oracle.push(MockReply::Structured(complete("seen enough")));

    let outcome = run(&oracle, vec![browser_tool(&oracle, &browser)], 10).await;

    assert_eq!(outcome.termination, TerminationReason::GoalSatisfied);
    let data = &outcome.entries[0].data;
    assert_eq!(data["termination"], "loop-detected");
    assert_eq!(data["total_steps"], 3);
    assert_eq!(browser.calls_of("ACT"), 3);
    assert_eq!(browser.closed(), 1);
}
