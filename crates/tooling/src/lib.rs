//! Ambient scaffolding for the orchestration kernel: the tool registry
//! (C3), environment-driven configuration (A1), and logging setup (A3).

pub mod builtin;
pub mod config;
pub mod error;
pub mod logging;
pub mod registry;

pub use builtin::{mark_step_tool, terminate_tool, SharedPlan};
pub use config::Config;
pub use error::{Result, ToolingError};
pub use registry::{Tool, ToolFuture, ToolHandler, ToolRegistry};
