//! Request bodies for creating and updating tasks.
//!
//! These are the JSON shapes accepted by the outer interfaces:
//!
//! ```json
//! {"name": "Paint fence", "parentIDs": ["house-1a2b3c4d"],
//!  "dueDate": "2026-05-01T00:00:00Z", "categories": ["home"]}
//! ```
//!
//! ```json
//! {"name": "Paint fence twice", "complete": true,
//!  "subtaskIDs": [], "parentIDs": [], "categories": ["home", "weekend"]}
//! ```
//!
//! Every field of an update is optional; absent fields are left unchanged.
//! Referenced identifiers are all checked before anything is modified.

use crate::error::{Error, Result};
use crate::tasks::models::Task;
use crate::tasks::store::TaskStore;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Body of a create request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTaskRequest {
    /// Display name.
    pub name: String,
    /// Parents of the new task. Empty creates a root task.
    #[serde(rename = "parentIDs", default)]
    pub parent_ids: Vec<String>,
    /// Optional due date (RFC 3339).
    #[serde(default)]
    pub due_date: Option<DateTime<Utc>>,
    /// Category tags.
    #[serde(default)]
    pub categories: Vec<String>,
}

/// Body of an update request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTaskRequest {
    /// New name; ignored when empty.
    #[serde(default)]
    pub name: Option<String>,
    /// Requested completion state.
    #[serde(default)]
    pub complete: Option<bool>,
    /// Tasks to attach as subtasks.
    #[serde(rename = "subtaskIDs", default)]
    pub subtask_ids: Vec<String>,
    /// Tasks to attach as parents.
    #[serde(rename = "parentIDs", default)]
    pub parent_ids: Vec<String>,
    /// Subtasks to detach.
    #[serde(rename = "removeSubtaskIDs", default)]
    pub remove_subtask_ids: Vec<String>,
    /// Parents to detach.
    #[serde(rename = "removeParentIDs", default)]
    pub remove_parent_ids: Vec<String>,
    /// New due date (RFC 3339).
    #[serde(default)]
    pub due_date: Option<DateTime<Utc>>,
    /// Replacement categories.
    #[serde(default)]
    pub categories: Option<Vec<String>>,
}

impl UpdateTaskRequest {
    fn referenced_ids(&self) -> impl Iterator<Item = &String> {
        self.subtask_ids
            .iter()
            .chain(&self.parent_ids)
            .chain(&self.remove_subtask_ids)
            .chain(&self.remove_parent_ids)
    }
}

/// Parse a create request from JSON.
///
/// # Errors
///
/// Returns [`Error::InvalidRequest`] if the JSON is malformed.
pub fn parse_new_task(json: &str) -> Result<NewTaskRequest> {
    serde_json::from_str(json).map_err(Error::InvalidRequest)
}

/// Parse an update request from JSON.
///
/// # Errors
///
/// Returns [`Error::InvalidRequest`] if the JSON is malformed.
pub fn parse_update_task(json: &str) -> Result<UpdateTaskRequest> {
    serde_json::from_str(json).map_err(Error::InvalidRequest)
}

/// Create a task from a request.
///
/// # Errors
///
/// Returns [`Error::UnableToCreate`] if a parent does not exist.
pub fn create_task(store: &mut TaskStore, request: &NewTaskRequest) -> Result<Task> {
    let task = store.create_task(&request.name, &request.parent_ids)?;
    if request.due_date.is_some() {
        store.set_due(task.id(), request.due_date)?;
    }
    if !request.categories.is_empty() {
        store.set_categories(task.id(), request.categories.clone())?;
    }
    store.get_required(task.id()).cloned()
}

/// Apply an update request to task `id`.
///
/// Fields are applied first, then edge removals, then edge additions, and
/// the requested completion state last so that it is what the caller sees.
///
/// # Errors
///
/// Returns [`Error::NotFound`] if `id` does not exist,
/// [`Error::InvalidReference`] if the request names an unknown task, and
/// [`Error::Cycle`] if an added edge would create a cycle.
pub fn update_task(store: &mut TaskStore, id: &str, request: &UpdateTaskRequest) -> Result<Task> {
    store.get_required(id)?;
    if let Some(unknown) = request.referenced_ids().find(|r| store.get(r).is_none()) {
        return Err(Error::InvalidReference { id: unknown.clone() });
    }

    if let Some(name) = request.name.as_deref().filter(|n| !n.is_empty()) {
        store.rename(id, name)?;
    }
    if request.due_date.is_some() {
        store.set_due(id, request.due_date)?;
    }
    if let Some(categories) = &request.categories {
        store.set_categories(id, categories.clone())?;
    }

    for subtask_id in &request.remove_subtask_ids {
        store.remove_subtask(id, subtask_id)?;
    }
    for parent_id in &request.remove_parent_ids {
        store.remove_parent(id, parent_id)?;
    }
    for subtask_id in &request.subtask_ids {
        store.add_subtask(id, subtask_id)?;
    }
    for parent_id in &request.parent_ids {
        store.add_parent(id, parent_id)?;
    }

    if let Some(complete) = request.complete {
        store.set_complete(id, complete)?;
    }
    store.get_required(id).cloned()
}

/// Root tasks, or every task sorted by creation time when `all` is set.
#[must_use]
pub fn list_tasks(store: &TaskStore, all: bool) -> Vec<Task> {
    if !all {
        return store.root_tasks().into_iter().cloned().collect();
    }
    let mut tasks: Vec<Task> = store.tasks().cloned().collect();
    tasks.sort_by(|a, b| a.created_at().cmp(&b.created_at()).then_with(|| a.id().cmp(b.id())));
    tasks
}
