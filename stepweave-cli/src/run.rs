//! Wiring from [`AppConfig`] to a finished, persisted run.

use std::sync::Arc;
use stepweave_agent::{HttpOracle, Orchestrator, RunOutcome};
use stepweave_browser::{BrowserEngine, BrowserTool, FetchSessionFactory, SessionManager};
use stepweave_core::{ArtifactStore, FsArtifactStore, Oracle};
use stepweave_tools::{CodeTool, FileTool, SearchTool, ToolRegistry};

use crate::config::{AppConfig, ConfigError};

pub fn build_oracle(config: &AppConfig) -> Result<Arc<dyn Oracle>, ConfigError> {
    let oracle = HttpOracle::new(config.oracle.to_http_config())
        .map_err(|e| ConfigError::setup("oracle", e))?;
    Ok(Arc::new(oracle))
}

/// Register every enabled capability, in a fixed order.
pub fn build_registry(config: &AppConfig, oracle: Arc<dyn Oracle>) -> Result<ToolRegistry, ConfigError> {
    let mut registry = ToolRegistry::new();
    let register = |registry: ToolRegistry, tool: Arc<dyn stepweave_core::Tool>| {
        registry
            .try_with_tool(tool)
            .map_err(|e| ConfigError::setup("tool registry", e))
    };

    if config.files.enabled {
        registry = register(registry, Arc::new(FileTool::new(&config.files.root)))?;
    }
    if let Some(search) = &config.search {
        registry = register(registry, Arc::new(SearchTool::new(search.clone())))?;
    }
    if config.code.enabled {
        registry = register(registry, Arc::new(CodeTool::new(config.code.to_tool_config())))?;
    }
    if config.browser.enabled {
        let factory = FetchSessionFactory::new(oracle.clone(), config.browser.page_timeout)
            .map_err(|e| ConfigError::setup("browser", e))?
            .with_model(config.browser.browser_model.clone());
        let sessions = SessionManager::new(Arc::new(factory)).keep_warm(config.browser.keep_warm);
        let engine = BrowserEngine::new(oracle, config.browser.to_engine_config());
        registry = register(registry, Arc::new(BrowserTool::new(Arc::new(engine), sessions)))?;
    }

    tracing::info!(tools = registry.len(), "Tool registry ready");
    Ok(registry)
}

/// Run `goal` to completion and write `run.json` and `summary.md` into
/// `<output.dir>/<run-id>/`. Failing to persist the record is logged, the
/// outcome is still returned.
pub async fn execute(
    config: &AppConfig,
    oracle: Arc<dyn Oracle>,
    goal: &str,
) -> Result<RunOutcome, ConfigError> {
    let registry = build_registry(config, oracle.clone())?;
    let run_id = uuid::Uuid::new_v4().to_string();
    let store = Arc::new(FsArtifactStore::new(config.output.dir.join(&run_id)));

    let outcome = Orchestrator::new(oracle, registry, config.orchestrator.clone())
        .with_artifacts(store.clone())
        .run_with_id(run_id, goal)
        .await;

    persist(store.as_ref(), &outcome).await;
    Ok(outcome)
}

async fn persist(store: &dyn ArtifactStore, outcome: &RunOutcome) {
    match serde_json::to_string_pretty(outcome) {
        Ok(record) => {
            if let Err(e) = store.write_file("run.json", &record).await {
                tracing::error!(error = %e, "Failed to write run record");
            }
        }
        Err(e) => tracing::error!(error = %e, "Failed to serialize run record"),
    }
    if let Err(e) = store.write_file("summary.md", &outcome.summary_markdown()).await {
        tracing::error!(error = %e, "Failed to write run summary");
    }
}
