//! # Stepweave Agent
//!
//! The outer plan-act-observe loop. An [`Orchestrator`] asks the
//! [`StepPlanner`] for the next step, dispatches it through the tool
//! registry, records the result in the memory store and repeats until the
//! goal is satisfied, the step budget is spent, or something fails. The
//! finished run is described by a [`RunOutcome`].
//!
//! ```rust
//! use std::sync::Arc;
//! use stepweave_agent::{Orchestrator, OrchestratorConfig, TerminationReason};
//! use stepweave_testing::{MockOracle, fixtures};
//! use stepweave_tools::ToolRegistry;
//!
//! # tokio_test::block_on(async {
//! let oracle = MockOracle::new().with_structured(fixtures::complete("nothing to do"));
//! let orchestrator = Orchestrator::new(
//!     Arc::new(oracle),
//!     ToolRegistry::new(),
//!     OrchestratorConfig::default(),
//! );
//! let outcome = orchestrator.run("say hello").await;
//! assert_eq!(outcome.termination, TerminationReason::GoalSatisfied);
//! assert_eq!(outcome.message, "nothing to do");
//! # });
//! ```

pub mod config;
#[cfg(feature = "http")]
pub mod oracle_http;
pub mod orchestrator;
pub mod outcome;
pub mod planner;
pub mod selector;
pub mod subtasks;

pub use config::{DEFAULT_MAX_STEPS, OrchestratorConfig};
#[cfg(feature = "http")]
pub use oracle_http::{HttpOracle, HttpOracleConfig};
pub use orchestrator::{Orchestrator, Phase};
pub use outcome::{RunOutcome, TerminationReason};
pub use planner::{PlannerDecision, StepPlanner};
pub use selector::{ToolChoice, ToolSelector};
pub use subtasks::SubtaskTracker;
