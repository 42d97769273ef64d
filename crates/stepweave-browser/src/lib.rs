//! # Stepweave Browser
//!
//! The browser atomic-action loop. A single `browser` dispatch from the outer
//! orchestrator runs a nested plan-act loop here, one [`BrowserMethod`] at a
//! time, with loop detection and a step budget, and returns one aggregated
//! [`BrowserResult`].
//!
//! - [`BrowserEngine`]: the loop itself
//! - [`SessionManager`]: leases on the shared [`BrowserSession`]
//! - [`BrowserTool`]: the engine exposed as a [`Tool`](stepweave_core::Tool)
//! - [`FetchSession`]: an HTTP-fetch session (feature `fetch`)

pub mod engine;
pub mod error;
#[cfg(feature = "fetch")]
pub mod fetch;
pub mod manager;
pub mod method;
mod prompt;
pub mod session;
pub mod tool;
pub mod types;

pub use engine::{BrowserEngine, BrowserEngineConfig};
pub use error::BrowserError;
#[cfg(feature = "fetch")]
pub use fetch::{FetchSession, FetchSessionFactory};
pub use manager::{SessionLease, SessionManager};
pub use method::{BrowserMethod, UnknownMethod};
pub use session::{BrowserSession, SessionFactory};
pub use tool::BrowserTool;
pub use types::{
    BrowserDecision, BrowserResult, BrowserStep, BrowserTermination, ExtractedData, ExtractedKind,
    ExtractedMetadata, SufficiencyVerdict,
};
