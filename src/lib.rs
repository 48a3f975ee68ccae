//! # `tasktree`
//!
//! Personal task tracking with hierarchical subtasks and completion that
//! propagates along the hierarchy, persisted to a single JSON file.

#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod error;
pub mod paths;
pub mod storage;
pub mod tasks;

pub use config::Config;
pub use error::{Error, ErrorKind, Result};
pub use storage::{LoadPolicy, SharedTaskStore};
pub use tasks::{Task, TaskStore};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
