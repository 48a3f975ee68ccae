//! Task model types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A task or subtask.
///
/// Tasks are owned by a [`TaskStore`](crate::tasks::TaskStore) and refer to
/// their parents and subtasks by identifier. All state changes go through
/// the store so that the hierarchy invariants hold; this type only exposes
/// read access to callers outside the crate. Its JSON form, on disk and in
/// command output alike, is [`TaskRecord`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    pub(crate) id: String,
    pub(crate) name: String,
    pub(crate) complete: bool,
    pub(crate) created_at: DateTime<Utc>,
    pub(crate) modified_at: DateTime<Utc>,
    pub(crate) due_at: Option<DateTime<Utc>>,
    pub(crate) categories: Vec<String>,
    pub(crate) parents: BTreeSet<String>,
    pub(crate) subtasks: BTreeSet<String>,
}

impl Task {
    /// Create a detached, incomplete task with no edges.
    pub(crate) fn new(id: String, name: &str, now: DateTime<Utc>) -> Self {
        Self {
            id,
            name: name.to_string(),
            complete: false,
            created_at: now,
            modified_at: now,
            due_at: None,
            categories: Vec::new(),
            parents: BTreeSet::new(),
            subtasks: BTreeSet::new(),
        }
    }

    /// Unique identifier.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Display name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the task is complete.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.complete
    }

    /// When the task was created.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// When the task was last changed.
    #[must_use]
    pub const fn modified_at(&self) -> DateTime<Utc> {
        self.modified_at
    }

    /// Optional due date.
    #[must_use]
    pub const fn due_at(&self) -> Option<DateTime<Utc>> {
        self.due_at
    }

    /// Free-form category tags, in the order they were given.
    #[must_use]
    pub fn categories(&self) -> &[String] {
        &self.categories
    }

    /// Identifiers of the tasks this task is a subtask of.
    #[must_use]
    pub const fn parents(&self) -> &BTreeSet<String> {
        &self.parents
    }

    /// Identifiers of this task's subtasks.
    #[must_use]
    pub const fn subtasks(&self) -> &BTreeSet<String> {
        &self.subtasks
    }

    /// A root task has no parents.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.parents.is_empty()
    }

    /// Convert to the flat persisted representation.
    #[must_use]
    pub fn to_record(&self) -> TaskRecord {
        TaskRecord {
            id: self.id.clone(),
            name: self.name.clone(),
            complete: self.complete,
            created_date: self.created_at,
            modified_date: self.modified_at,
            due_date: self.due_at,
            categories: self.categories.clone(),
            parent_ids: self.parents.iter().cloned().collect(),
            subtask_ids: self.subtasks.iter().cloned().collect(),
        }
    }
}

/// Flat representation of a task, referencing related tasks by identifier.
///
/// This is the on-disk format. Timestamps are Unix seconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskRecord {
    /// Unique identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Completion flag.
    #[serde(default)]
    pub complete: bool,
    /// Creation time.
    #[serde(with = "chrono::serde::ts_seconds")]
    pub created_date: DateTime<Utc>,
    /// Last modification time.
    #[serde(with = "chrono::serde::ts_seconds")]
    pub modified_date: DateTime<Utc>,
    /// Optional due date.
    #[serde(default, with = "chrono::serde::ts_seconds_option")]
    pub due_date: Option<DateTime<Utc>>,
    /// Category tags.
    #[serde(default)]
    pub categories: Vec<String>,
    /// Parent identifiers.
    #[serde(rename = "parentIDs", default)]
    pub parent_ids: Vec<String>,
    /// Subtask identifiers.
    #[serde(rename = "subtaskIDs", default)]
    pub subtask_ids: Vec<String>,
}

impl TaskRecord {
    /// Build a task from this record with empty edge sets.
    ///
    /// Edges are resolved in a second pass once every task exists.
    pub(crate) fn to_detached_task(&self) -> Task {
        Task {
            id: self.id.clone(),
            name: self.name.clone(),
            complete: self.complete,
            created_at: self.created_date,
            modified_at: self.modified_date,
            due_at: self.due_date,
            categories: self.categories.clone(),
            parents: BTreeSet::new(),
            subtasks: BTreeSet::new(),
        }
    }
}
