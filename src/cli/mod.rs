//! Command-line interface for tasktree.
//!
//! Each command performs one logical operation against the shared task
//! store and prints the result as JSON on stdout.

mod run;


pub use run::{exit_code_for, read_input, run, CliOutput};

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Tasktree - hierarchical personal task tracking.
///
/// Completing a task completes all of its subtasks, and completes a parent
/// once every one of its subtasks is complete. Reopening a task reopens
/// its parents.
#[derive(Parser, Debug)]
#[command(name = "tasktree")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Configuration file (default: ~/.tasktree/config.yaml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Task file, overriding the configuration
    #[arg(long, global = true)]
    pub data_file: Option<PathBuf>,

    /// The command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Top-level commands.
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// List root tasks, or every task with --all.
    List {
        /// Include subtasks
        #[arg(long)]
        all: bool,
    },

    /// Create a task.
    New {
        /// Task name
        #[arg(short, long)]
        name: String,

        /// Parent task ID (repeatable)
        #[arg(short, long = "parent")]
        parents: Vec<String>,

        /// Due date (RFC 3339)
        #[arg(long)]
        due: Option<DateTime<Utc>>,

        /// Category tag (repeatable)
        #[arg(short, long = "category")]
        categories: Vec<String>,
    },

    /// Show a single task.
    Show {
        /// Task ID
        id: String,
    },

    /// Update a task.
    ///
    /// Only specified fields are changed. Completion is applied last.
    Update {
        /// Task ID
        id: String,

        /// New name
        #[arg(short, long)]
        name: Option<String>,

        /// Mark the task (and its subtasks) complete
        #[arg(long, conflicts_with = "incomplete")]
        complete: bool,

        /// Mark the task (and its parents) incomplete
        #[arg(long)]
        incomplete: bool,

        /// Attach a subtask (repeatable)
        #[arg(long = "subtask")]
        subtasks: Vec<String>,

        /// Attach a parent (repeatable)
        #[arg(long = "parent")]
        parents: Vec<String>,

        /// Detach a subtask (repeatable)
        #[arg(long = "remove-subtask")]
        remove_subtasks: Vec<String>,

        /// Detach a parent (repeatable)
        #[arg(long = "remove-parent")]
        remove_parents: Vec<String>,

        /// Due date (RFC 3339)
        #[arg(long)]
        due: Option<DateTime<Utc>>,

        /// Replace categories (repeatable)
        #[arg(long = "category")]
        categories: Vec<String>,
    },

    /// Delete a task and its whole subtree.
    Delete {
        /// Task ID
        id: String,
    },

    /// Create a task from a JSON request on stdin.
    #[command(name = "apply-new")]
    ApplyNew,

    /// Update a task from a JSON request on stdin.
    #[command(name = "apply-update")]
    ApplyUpdate {
        /// Task ID
        id: String,
    },
}

impl Command {
    /// Whether this command reads a request body from stdin.
    #[must_use]
    pub const fn needs_stdin(&self) -> bool {
        matches!(self, Self::ApplyNew | Self::ApplyUpdate { .. })
    }
}
