//! Task hierarchy and completion tracking.
//!
//! This module provides:
//! - Tasks with a name, completion flag, timestamps and categories
//! - Parent/subtask edges forming a DAG (a task may have several parents)
//! - Completion propagation: completing a task completes its subtree and
//!   any parent whose subtasks are then all complete; reopening a task
//!   reopens its ancestors
//! - Flat JSON persistence with atomic file replacement
//!
//! # Example
//!
//! ```no_run
//! use tasktree::tasks::TaskStore;
//!
//! let mut store = TaskStore::new();
//! let trip = store.create_task("Plan trip", &[] as &[&str]).unwrap();
//! let hotel = store.create_task("Book hotel", &[trip.id()]).unwrap();
//!
//! store.mark_complete(hotel.id()).unwrap();
//! assert!(store.get(trip.id()).unwrap().is_complete());
//!
//! store.store(std::path::Path::new("/tmp/tasks.json")).unwrap();
//! ```

pub mod id;
pub mod models;
pub mod requests;
pub mod store;

pub use models::{Task, TaskRecord};
pub use requests::{NewTaskRequest, UpdateTaskRequest};
pub use store::TaskStore;
