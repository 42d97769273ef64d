//! # Stepweave
//!
//! Bounded plan-act-observe orchestration. A planner oracle proposes one step
//! at a time, the step is dispatched to exactly one registered tool, and the
//! result is appended to the run's memory until the goal is satisfied or the
//! step budget runs out. Browser work runs in its own inner loop of atomic
//! page actions with repeat detection.
//!
//! This crate re-exports the workspace crates:
//!
//! - [`core`]: steps, budgets, the oracle and tool contracts, error taxonomy
//! - [`memory`]: the append-only results log
//! - [`tools`]: tool registry and standard capabilities
//! - [`browser`]: the atomic-action engine and session management
//! - [`agent`]: the orchestrator, planner and HTTP oracle

pub use stepweave_agent as agent;
pub use stepweave_browser as browser;
pub use stepweave_core as core;
pub use stepweave_memory as memory;
pub use stepweave_tools as tools;

pub use stepweave_agent::{Orchestrator, OrchestratorConfig, RunOutcome, TerminationReason};
pub use stepweave_browser::{BrowserEngine, BrowserTool, SessionManager};
pub use stepweave_core::{Oracle, OracleRequest, Step, StepId, Tool};
pub use stepweave_memory::{DataEntry, MemoryStore};
pub use stepweave_tools::ToolRegistry;
