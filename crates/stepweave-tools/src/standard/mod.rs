//! # Standard Tool Library
//!
//! Default capabilities registered by the CLI. Each can be swapped for a
//! different [`Tool`](stepweave_core::Tool) implementation with the same
//! name.
//!
//! ## Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use stepweave_tools::{CodeTool, FileTool, ToolRegistry};
//!
//! let registry = ToolRegistry::new()
//!     .try_with_tool(Arc::new(FileTool::new("./workspace")))
//!     .and_then(|r| r.try_with_tool(Arc::new(CodeTool::default())))
//!     .unwrap();
//! assert_eq!(registry.len(), 2);
//! ```

#[cfg(feature = "code")]
pub mod code;
#[cfg(feature = "io")]
pub mod file;
#[cfg(feature = "network")]
pub mod search;

#[cfg(feature = "code")]
pub use code::{CodeTool, CodeToolConfig};
#[cfg(feature = "io")]
pub use file::FileTool;
#[cfg(feature = "network")]
pub use search::{SearchConfig, SearchTool};
