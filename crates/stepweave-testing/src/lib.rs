//! # Stepweave Testing
//!
//! Test doubles for the orchestration runtime.
//!
//! - **[`MockOracle`]**: scripted oracle replies with call recording
//! - **[`MockTool`]**: predictable capability handler
//! - **[`MockBrowser`]**: canned browser sessions and their factory
//! - **[`fixtures`]**: JSON builders for common oracle replies
//!
//! ```rust
//! use serde_json::json;
//! use stepweave_core::{Oracle, OracleRequest};
//! use stepweave_testing::MockOracle;
//!
//! # tokio_test::block_on(async {
//! let oracle = MockOracle::new().with_text("hello");
//! let reply = oracle.complete_text(OracleRequest::new("hi")).await.unwrap();
//! assert_eq!(reply, "hello");
//! assert_eq!(oracle.call_count(), 1);
//! # });
//! ```

pub mod fixtures;
pub mod mock_browser;
pub mod mock_oracle;
pub mod mock_tools;

pub use mock_browser::{MOCK_PNG, MockBrowser, MockBrowserSession, MockSessionFactory};
pub use mock_oracle::{CallKind, MockOracle, MockReply, RecordedCall};
pub use mock_tools::{MockTool, failing_tool, success_tool};
