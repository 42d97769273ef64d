//! # Stepweave Core
//!
//! Core traits and types for the Stepweave orchestration runtime.
//! This crate provides the building blocks shared by the outer
//! plan-act-observe loop and the browser atomic-action loop:
//!
//! - **[Step]** and **[RunBudget]**: the unit of planned work and the ceiling on iterations
//! - **[Tool]**: the uniform capability contract, with a declared [ParameterSchema]
//! - **[Oracle]**: the planning/completion service consulted for every decision
//! - **[ArtifactStore]**: persistence used for run artifacts
//! - **[error]**: the termination taxonomy shared by every crate

pub mod artifact;
pub mod error;
pub mod oracle;
pub mod schema;
pub mod step;
pub mod tool;
pub mod validation;

pub use artifact::{ArtifactError, ArtifactStore, FsArtifactStore};
pub use error::{BudgetExceeded, HandlerError, LoopDetected, OrchestrationError, PlannerError};
pub use oracle::{Oracle, OracleError, OracleRequest, complete_as};
pub use schema::{ParamKind, ParamSpec, ParameterSchema, ValidatedArgs, ValidationError};
pub use step::{MISSING_DESCRIPTION_MARKER, RunBudget, Step, StepId, StepStatus, StepTransitionError};
pub use tool::{ExecutionResult, FailureReason, Tool};
pub use validation::{IdentifierError, IdentifierRules};
