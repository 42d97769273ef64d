//! # Stepweave Tools
//!
//! The [`ToolRegistry`] maps capability names to [`Tool`] implementations and
//! is the only path from a planned step to a handler. It validates names when
//! tools are registered and arguments before every call.
//!
//! ## Features
//!
//! - **I/O** (`io`): [`FileTool`], sandboxed to a root directory
//! - **Network** (`network`): [`SearchTool`] over an HTTP JSON search backend
//! - **Code** (`code`): [`CodeTool`], runs a script through a configured interpreter

/// Tool registry and dispatcher.
pub mod registry;
/// Standard capability implementations.
pub mod standard;

pub use registry::{DispatchError, RegistryError, ToolDescriptor, ToolRegistry};
pub use standard::*;
pub use stepweave_core::{ExecutionResult, FailureReason, Tool};
