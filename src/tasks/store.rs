//! Task registry, hierarchy maintenance and completion propagation.

use crate::error::{Error, Result};
use crate::storage::write_atomic;
use crate::tasks::id::generate_task_id;
use crate::tasks::models::{Task, TaskRecord};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::path::Path;

/// In-memory collection of every task, keyed by identifier.
///
/// The registry is the sole owner of all tasks; tasks refer to each other by
/// identifier. The root index is derived from the registry and rebuilt after
/// every structural change.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskStore {
    registry: HashMap<String, Task>,
    root_tasks: Vec<String>,
}

/// Current time truncated to whole seconds, the resolution of the file format.
fn now() -> DateTime<Utc> {
    DateTime::from_timestamp(Utc::now().timestamp(), 0).unwrap_or_else(Utc::now)
}

impl TaskStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of tasks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.registry.len()
    }

    /// Whether the store holds no tasks.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.registry.is_empty()
    }

    /// Look up a task by identifier.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Task> {
        self.registry.get(id)
    }

    /// Look up a task by identifier, failing with [`Error::NotFound`].
    ///
    /// # Errors
    ///
    /// Returns an error if no task has this identifier.
    pub fn get_required(&self, id: &str) -> Result<&Task> {
        self.registry.get(id).ok_or_else(|| Error::not_found(id))
    }

    /// Iterate over every task in no particular order.
    pub fn tasks(&self) -> impl Iterator<Item = &Task> {
        self.registry.values()
    }

    /// Tasks without parents, oldest first.
    #[must_use]
    pub fn root_tasks(&self) -> Vec<&Task> {
        self.root_tasks.iter().filter_map(|id| self.registry.get(id)).collect()
    }

    /// Insert or replace a task's own fields.
    ///
    /// Edges and completion belong to the store: when replacing, the stored
    /// task keeps its current parents, subtasks and completion flag. A new
    /// task is inserted as a detached root. Use
    /// [`add_subtask`](Self::add_subtask) and friends to link it.
    pub fn put(&mut self, mut task: Task) {
        if let Some(existing) = self.registry.get(&task.id) {
            task.complete = existing.complete;
            task.parents.clone_from(&existing.parents);
            task.subtasks.clone_from(&existing.subtasks);
        } else {
            task.parents.clear();
            task.subtasks.clear();
        }
        self.registry.insert(task.id.clone(), task);
        self.rebuild_root_index();
    }

    /// Create a new incomplete task under the given parents.
    ///
    /// An empty parent list creates a root task. Attaching the new task to a
    /// complete parent reopens that parent's chain.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnableToCreate`] if any parent does not exist. The
    /// store is unchanged in that case.
    pub fn create_task<S: AsRef<str>>(&mut self, name: &str, parents: &[S]) -> Result<Task> {
        if let Some(missing) = parents.iter().find(|p| !self.registry.contains_key(p.as_ref())) {
            return Err(Error::UnableToCreate { parent_id: missing.as_ref().to_string() });
        }

        let mut rng = rand::thread_rng();
        let mut id = generate_task_id(name, &mut rng);
        while self.registry.contains_key(&id) {
            id = generate_task_id(name, &mut rng);
        }

        let now = now();
        self.registry.insert(id.clone(), Task::new(id.clone(), name, now));
        for parent in parents {
            self.link(parent.as_ref(), &id, now)?;
        }
        self.rebuild_root_index();

        tracing::info!(task_id = %id, parents = parents.len(), "created task");
        self.get_required(&id).cloned()
    }

    /// Rename a task.
    ///
    /// # Errors
    ///
    /// Returns an error if the task does not exist.
    pub fn rename(&mut self, id: &str, name: &str) -> Result<()> {
        let task = self.task_mut(id)?;
        name.clone_into(&mut task.name);
        task.modified_at = now();
        Ok(())
    }

    /// Set or clear a task's due date.
    ///
    /// # Errors
    ///
    /// Returns an error if the task does not exist.
    pub fn set_due(&mut self, id: &str, due: Option<DateTime<Utc>>) -> Result<()> {
        let task = self.task_mut(id)?;
        task.due_at = due;
        task.modified_at = now();
        Ok(())
    }

    /// Replace a task's categories.
    ///
    /// # Errors
    ///
    /// Returns an error if the task does not exist.
    pub fn set_categories(&mut self, id: &str, categories: Vec<String>) -> Result<()> {
        let task = self.task_mut(id)?;
        task.categories = categories;
        task.modified_at = now();
        Ok(())
    }

    /// Mark a task and its whole subtree complete.
    ///
    /// Each parent whose subtasks are then all complete is completed as
    /// well, recursively. No-op if the task is already complete.
    ///
    /// # Errors
    ///
    /// Returns an error if the task, or any task reached while
    /// propagating, does not exist.
    pub fn mark_complete(&mut self, id: &str) -> Result<()> {
        self.get_required(id)?;
        self.complete_from(id, now())
    }

    /// Mark a task incomplete, reopening every ancestor.
    ///
    /// Subtasks are left untouched. No-op if the task is already incomplete.
    ///
    /// # Errors
    ///
    /// Returns an error if the task, or any ancestor, does not exist.
    pub fn mark_incomplete(&mut self, id: &str) -> Result<()> {
        self.reopen_from(id, now())
    }

    /// Dispatch to [`mark_complete`](Self::mark_complete) or
    /// [`mark_incomplete`](Self::mark_incomplete).
    ///
    /// # Errors
    ///
    /// Returns an error if the task does not exist.
    pub fn set_complete(&mut self, id: &str, complete: bool) -> Result<()> {
        if complete {
            self.mark_complete(id)
        } else {
            self.mark_incomplete(id)
        }
    }

    /// Make `subtask_id` a subtask of `id`.
    ///
    /// Returns `false` if the edge already existed. If the parent is complete
    /// and the subtask is not, the parent chain is reopened.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if either task is missing and
    /// [`Error::Cycle`] if the edge would make a task its own ancestor.
    pub fn add_subtask(&mut self, id: &str, subtask_id: &str) -> Result<bool> {
        self.get_required(id)?;
        self.get_required(subtask_id)?;
        if self.registry[id].subtasks.contains(subtask_id) {
            return Ok(false);
        }
        if self.is_ancestor_or_self(subtask_id, id) {
            return Err(Error::Cycle { task_id: subtask_id.to_string(), related_id: id.to_string() });
        }

        self.link(id, subtask_id, now())?;
        self.rebuild_root_index();
        Ok(true)
    }

    /// Make `parent_id` a parent of `id`. See [`add_subtask`](Self::add_subtask).
    ///
    /// # Errors
    ///
    /// Same as [`add_subtask`](Self::add_subtask).
    pub fn add_parent(&mut self, id: &str, parent_id: &str) -> Result<bool> {
        self.add_subtask(parent_id, id)
    }

    /// Remove the edge between `id` and its subtask `subtask_id`.
    ///
    /// Returns `false` if there was no such edge. The former parent is
    /// completed if it still has subtasks and all of them are complete.
    ///
    /// # Errors
    ///
    /// Returns an error if either task does not exist.
    pub fn remove_subtask(&mut self, id: &str, subtask_id: &str) -> Result<bool> {
        self.get_required(subtask_id)?;
        let now = now();
        let parent = self.task_mut(id)?;
        if !parent.subtasks.remove(subtask_id) {
            return Ok(false);
        }
        parent.modified_at = now;

        let subtask = self.task_mut(subtask_id)?;
        subtask.parents.remove(id);
        subtask.modified_at = now;

        self.reconcile_parent(id, now)?;
        self.rebuild_root_index();
        Ok(true)
    }

    /// Remove the edge between `id` and its parent `parent_id`.
    ///
    /// # Errors
    ///
    /// Returns an error if either task does not exist.
    pub fn remove_parent(&mut self, id: &str, parent_id: &str) -> Result<bool> {
        self.remove_subtask(parent_id, id)
    }

    /// Delete a task together with its whole subtree.
    ///
    /// The subtree is detached from every surviving parent first. Each such
    /// parent that still has subtasks, all of them complete, is then marked
    /// complete. Returns the identifiers of the deleted tasks, sorted.
    ///
    /// # Errors
    ///
    /// Returns an error if the task does not exist.
    pub fn delete_task(&mut self, id: &str) -> Result<Vec<String>> {
        self.get_required(id)?;

        let doomed = self.subtree(id);
        let survivors: BTreeSet<String> = doomed
            .iter()
            .filter_map(|d| self.registry.get(d))
            .flat_map(|t| t.parents.iter())
            .filter(|p| !doomed.contains(*p))
            .cloned()
            .collect();

        for d in &doomed {
            self.registry.remove(d);
        }

        let now = now();
        for p in &survivors {
            let parent = self.task_mut(p)?;
            parent.subtasks.retain(|s| !doomed.contains(s));
            parent.modified_at = now;
        }
        for p in &survivors {
            self.reconcile_parent(p, now)?;
        }
        self.rebuild_root_index();

        let mut deleted: Vec<String> = doomed.into_iter().collect();
        deleted.sort();
        tracing::info!(task_id = %id, deleted = deleted.len(), "deleted task subtree");
        Ok(deleted)
    }

    /// Flat, cycle-free records for every task, sorted by identifier.
    #[must_use]
    pub fn to_records(&self) -> Vec<TaskRecord> {
        let mut records: Vec<TaskRecord> = self.registry.values().map(Task::to_record).collect();
        records.sort_by(|a, b| a.id.cmp(&b.id));
        records
    }

    /// Rebuild a store from flat records.
    ///
    /// All tasks are created first with no edges; edges are then resolved
    /// by identifier. An edge listed on only one side is repaired, and a
    /// complete task with an incomplete subtask is reopened along with its
    /// ancestors.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DanglingReference`] if a record refers to an unknown
    /// task and [`Error::Cycle`] if the edges are not acyclic.
    pub fn from_records(records: &[TaskRecord]) -> Result<Self> {
        let mut store = Self::new();
        for record in records {
            if store.registry.insert(record.id.clone(), record.to_detached_task()).is_some() {
                tracing::warn!(task_id = %record.id, "duplicate task record, keeping the last");
            }
        }

        // (parent, subtask) -> number of sides that list the edge
        let mut edges: BTreeMap<(&str, &str), u8> = BTreeMap::new();
        for record in records {
            for parent_id in &record.parent_ids {
                *edges.entry((parent_id.as_str(), record.id.as_str())).or_default() += 1;
            }
            for subtask_id in &record.subtask_ids {
                *edges.entry((record.id.as_str(), subtask_id.as_str())).or_default() += 1;
            }
        }

        for (&(parent_id, subtask_id), &sides) in &edges {
            for (missing, holder) in [(parent_id, subtask_id), (subtask_id, parent_id)] {
                if !store.registry.contains_key(missing) {
                    return Err(Error::DanglingReference {
                        id: missing.to_string(),
                        referenced_by: holder.to_string(),
                    });
                }
            }
            if parent_id == subtask_id {
                return Err(Error::Cycle {
                    task_id: subtask_id.to_string(),
                    related_id: parent_id.to_string(),
                });
            }
            if sides < 2 {
                tracing::warn!(parent_id, subtask_id, "repairing one-sided edge");
            }
            if let Some(parent) = store.registry.get_mut(parent_id) {
                parent.subtasks.insert(subtask_id.to_string());
            }
            if let Some(subtask) = store.registry.get_mut(subtask_id) {
                subtask.parents.insert(parent_id.to_string());
            }
        }

        if let Some((task_id, related_id)) = store.find_cycle_edge() {
            return Err(Error::Cycle { task_id, related_id });
        }

        let mut ids: Vec<String> = store.registry.keys().cloned().collect();
        ids.sort_unstable();
        for id in &ids {
            if store.registry[id].complete && !store.all_subtasks_complete(id)? {
                tracing::warn!(task_id = %id, "reopening complete task with an incomplete subtask");
                store.reopen_from(id, now())?;
            }
        }

        store.rebuild_root_index();
        Ok(store)
    }

    /// Write every task to `path`, atomically replacing its contents.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn store(&self, path: &Path) -> Result<()> {
        write_atomic(path, &self.encode(path)?)?;
        tracing::debug!(path = %path.display(), tasks = self.len(), "stored tasks");
        Ok(())
    }

    /// Load a store previously written by [`store`](Self::store).
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, is not valid JSON, or
    /// describes an inconsistent hierarchy.
    pub fn restore(path: &Path) -> Result<Self> {
        let contents = std::fs::read(path).map_err(|e| Error::io(path, e))?;
        Self::decode(path, &contents)
    }

    /// The file contents [`store`](Self::store) writes. `path` only labels errors.
    pub(crate) fn encode(&self, path: &Path) -> Result<Vec<u8>> {
        serde_json::to_vec_pretty(&self.to_records()).map_err(|e| Error::io(path, e.into()))
    }

    /// Parse file contents read from `path`.
    pub(crate) fn decode(path: &Path, contents: &[u8]) -> Result<Self> {
        let records: Vec<TaskRecord> = serde_json::from_slice(contents)
            .map_err(|source| Error::Decode { path: path.to_path_buf(), source })?;
        let store = Self::from_records(&records)?;
        tracing::debug!(path = %path.display(), tasks = store.len(), "restored tasks");
        Ok(store)
    }

    /// Describe every broken structural invariant. Empty when consistent.
    #[must_use]
    pub fn invariant_violations(&self) -> Vec<String> {
        let mut violations = Vec::new();

        for task in self.registry.values() {
            if task.parents.contains(&task.id) || task.subtasks.contains(&task.id) {
                violations.push(format!("{} is linked to itself", task.id));
            }
            for p in &task.parents {
                match self.registry.get(p) {
                    Some(parent) if parent.subtasks.contains(&task.id) => {}
                    Some(_) => violations.push(format!("{p} does not list subtask {}", task.id)),
                    None => violations.push(format!("{} has missing parent {p}", task.id)),
                }
            }
            for s in &task.subtasks {
                match self.registry.get(s) {
                    Some(subtask) if task.complete && !subtask.complete => {
                        violations.push(format!("{} is complete but {s} is not", task.id));
                    }
                    Some(subtask) if subtask.parents.contains(&task.id) => {}
                    Some(_) => violations.push(format!("{s} does not list parent {}", task.id)),
                    None => violations.push(format!("{} has missing subtask {s}", task.id)),
                }
            }
        }

        if let Some((task_id, related_id)) = self.find_cycle_edge() {
            violations.push(format!("cycle through {related_id} -> {task_id}"));
        }

        let mut derived: Vec<&str> =
            self.registry.values().filter(|t| t.is_root()).map(Task::id).collect();
        derived.sort_unstable();
        let mut indexed: Vec<&str> = self.root_tasks.iter().map(String::as_str).collect();
        indexed.sort_unstable();
        if derived != indexed {
            violations.push("root index does not match tasks without parents".to_string());
        }

        violations
    }

    fn task_mut(&mut self, id: &str) -> Result<&mut Task> {
        self.registry.get_mut(id).ok_or_else(|| Error::not_found(id))
    }

    fn rebuild_root_index(&mut self) {
        let mut roots: Vec<&Task> = self.registry.values().filter(|t| t.is_root()).collect();
        roots.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        self.root_tasks = roots.into_iter().map(|t| t.id.clone()).collect();
    }

    /// Insert the edge on both sides and reopen a complete parent that
    /// gains an incomplete subtask.
    fn link(&mut self, parent_id: &str, subtask_id: &str, now: DateTime<Utc>) -> Result<()> {
        let subtask = self.task_mut(subtask_id)?;
        subtask.parents.insert(parent_id.to_string());
        subtask.modified_at = now;
        let subtask_complete = subtask.complete;

        let parent = self.task_mut(parent_id)?;
        parent.subtasks.insert(subtask_id.to_string());
        parent.modified_at = now;

        if parent.complete && !subtask_complete {
            self.reopen_from(parent_id, now)?;
        }
        Ok(())
    }

    /// Complete `id` and its subtree, then every ancestor whose subtasks
    /// have all become complete.
    fn complete_from(&mut self, id: &str, now: DateTime<Utc>) -> Result<()> {
        // Down: the subtree below each newly completed task.
        let mut completed = Vec::new();
        let mut pending = vec![id.to_string()];
        while let Some(current) = pending.pop() {
            let task = self.task_mut(&current)?;
            if task.complete {
                continue;
            }
            task.complete = true;
            task.modified_at = now;
            pending.extend(task.subtasks.iter().cloned());
            completed.push(current);
        }

        // Up: parents of anything completed so far.
        let mut candidates: Vec<String> = Vec::new();
        for done in &completed {
            candidates.extend(self.get_required(done)?.parents.iter().cloned());
        }
        while let Some(parent_id) = candidates.pop() {
            if self.get_required(&parent_id)?.complete || !self.all_subtasks_complete(&parent_id)? {
                continue;
            }
            let parent = self.task_mut(&parent_id)?;
            parent.complete = true;
            parent.modified_at = now;
            candidates.extend(parent.parents.iter().cloned());
        }
        Ok(())
    }

    /// Reopen `id` and every complete ancestor.
    fn reopen_from(&mut self, id: &str, now: DateTime<Utc>) -> Result<()> {
        let mut pending = vec![id.to_string()];
        while let Some(current) = pending.pop() {
            let task = self.task_mut(&current)?;
            if !task.complete {
                continue;
            }
            task.complete = false;
            task.modified_at = now;
            pending.extend(task.parents.iter().cloned());
        }
        Ok(())
    }

    fn all_subtasks_complete(&self, id: &str) -> Result<bool> {
        let task = self.get_required(id)?;
        for s in &task.subtasks {
            let subtask = self.registry.get(s).ok_or_else(|| Error::DanglingReference {
                id: s.clone(),
                referenced_by: id.to_string(),
            })?;
            if !subtask.complete {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Complete a surviving parent whose remaining subtasks are all done.
    fn reconcile_parent(&mut self, id: &str, now: DateTime<Utc>) -> Result<()> {
        let task = self.get_required(id)?;
        if task.complete || task.subtasks.is_empty() {
            return Ok(());
        }
        if self.all_subtasks_complete(id)? {
            self.complete_from(id, now)?;
        }
        Ok(())
    }

    /// Whether `ancestor` is `id` itself or reachable from it through parents.
    fn is_ancestor_or_self(&self, ancestor: &str, id: &str) -> bool {
        let mut seen = HashSet::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if current == ancestor {
                return true;
            }
            if !seen.insert(current) {
                continue;
            }
            if let Some(task) = self.registry.get(current) {
                stack.extend(task.parents.iter().map(String::as_str));
            }
        }
        false
    }

    /// `id` and every task reachable from it through subtasks.
    fn subtree(&self, id: &str) -> HashSet<String> {
        let mut seen = HashSet::new();
        let mut stack = vec![id.to_string()];
        while let Some(current) = stack.pop() {
            if let Some(task) = self.registry.get(&current) {
                stack.extend(task.subtasks.iter().filter(|s| !seen.contains(*s)).cloned());
            }
            seen.insert(current);
        }
        seen
    }

    /// Some `(subtask, parent)` edge that closes a cycle, if any exists.
    fn find_cycle_edge(&self) -> Option<(String, String)> {
        #[derive(Clone, Copy, PartialEq, Eq)]
        enum Mark {
            Visiting,
            Done,
        }

        let mut marks: HashMap<&str, Mark> = HashMap::new();
        let mut ids: Vec<&str> = self.registry.keys().map(String::as_str).collect();
        ids.sort_unstable();

        for start in ids {
            if marks.contains_key(start) {
                continue;
            }
            // Each frame is a task and its not-yet-visited subtasks.
            let mut stack: Vec<(&str, Vec<&str>)> = vec![(start, self.children_of(start))];
            marks.insert(start, Mark::Visiting);
            while let Some((node, pending)) = stack.last_mut() {
                let node = *node;
                if let Some(child) = pending.pop() {
                    match marks.get(child) {
                        Some(Mark::Visiting) => return Some((child.to_string(), node.to_string())),
                        Some(Mark::Done) => {}
                        None => {
                            marks.insert(child, Mark::Visiting);
                            stack.push((child, self.children_of(child)));
                        }
                    }
                } else {
                    marks.insert(node, Mark::Done);
                    stack.pop();
                }
            }
        }
        None
    }

    fn children_of(&self, id: &str) -> Vec<&str> {
        self.registry.get(id).map_or_else(Vec::new, |t| t.subtasks.iter().map(String::as_str).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use tempfile::TempDir;

    const NO_PARENTS: &[&str] = &[];

    fn complete(store: &TaskStore, id: &str) -> bool {
        store.get(id).unwrap().is_complete()
    }

    fn assert_consistent(store: &TaskStore) {
        let violations = store.invariant_violations();
        assert!(violations.is_empty(), "invariants broken: {violations:?}");
    }

    /// Root `R` with subtasks `C1` and `C2`.
    fn two_children() -> (TaskStore, String, String, String) {
        let mut store = TaskStore::new();
        let r = store.create_task("R", NO_PARENTS).unwrap().id;
        let c1 = store.create_task("C1", &[&r]).unwrap().id;
        let c2 = store.create_task("C2", &[&r]).unwrap().id;
        (store, r, c1, c2)
    }

    #[test]
    fn test_create_root_and_subtask() {
        let (store, r, c1, c2) = two_children();

        assert_eq!(store.len(), 3);
        let root = store.get(&r).unwrap();
        assert!(root.is_root());
        assert_eq!(root.subtasks().len(), 2);
        assert!(store.get(&c1).unwrap().parents().contains(&r));
        assert!(!store.get(&c2).unwrap().is_root());
        assert_eq!(store.root_tasks().len(), 1);
        assert_consistent(&store);
    }

    #[test]
    fn test_create_with_unknown_parent_fails_without_changes() {
        let (mut store, r, _, _) = two_children();
        let before = store.clone();

        let err = store.create_task("orphan", &[r.as_str(), "missing-1"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnableToCreate);
        assert_eq!(store, before);
    }

    #[test]
    fn test_completing_last_child_completes_parent() {
        let (mut store, r, c1, c2) = two_children();

        store.mark_complete(&c1).unwrap();
        assert!(!complete(&store, &r));

        store.mark_complete(&c2).unwrap();
        assert!(complete(&store, &r));
        assert!(complete(&store, &c1));
    }

    #[test]
    fn test_completing_parent_completes_subtree() {
        let (mut store, r, c1, c2) = two_children();
        let grandchild = store.create_task("G", &[&c1]).unwrap().id;

        store.mark_complete(&r).unwrap();
        for id in [&r, &c1, &c2, &grandchild] {
            assert!(complete(&store, id), "{id} should be complete");
        }
    }

    #[test]
    fn test_mark_complete_is_idempotent() {
        let (mut store, _, c1, _) = two_children();
        store.mark_complete(&c1).unwrap();
        let once = store.clone();
        store.mark_complete(&c1).unwrap();
        assert_eq!(store, once);
    }

    #[test]
    fn test_reopen_marks_ancestors_but_not_subtasks() {
        let (mut store, r, c1, c2) = two_children();
        let grandchild = store.create_task("G", &[&c1]).unwrap().id;
        store.mark_complete(&r).unwrap();

        store.mark_incomplete(&c1).unwrap();
        assert!(!complete(&store, &c1));
        assert!(!complete(&store, &r));
        assert!(complete(&store, &c2));
        assert!(complete(&store, &grandchild));

        let once = store.clone();
        store.mark_incomplete(&c1).unwrap();
        assert_eq!(store, once);
    }

    #[test]
    fn test_multi_parent_completion_reaches_both_parents() {
        let mut store = TaskStore::new();
        let p1 = store.create_task("P1", NO_PARENTS).unwrap().id;
        let p2 = store.create_task("P2", NO_PARENTS).unwrap().id;
        let done1 = store.create_task("done under P1", &[&p1]).unwrap().id;
        let done2 = store.create_task("done under P2", &[&p2]).unwrap().id;
        store.mark_complete(&done1).unwrap();
        store.mark_complete(&done2).unwrap();
        assert!(complete(&store, &p1));

        let shared = store.create_task("A", &[&p1, &p2]).unwrap().id;
        assert!(!complete(&store, &p1), "new incomplete child reopens parent");
        assert!(!complete(&store, &p2));

        store.mark_complete(&shared).unwrap();
        assert!(complete(&store, &p1));
        assert!(complete(&store, &p2));
        assert_consistent(&store);
    }

    #[test]
    fn test_set_complete_dispatches() {
        let (mut store, r, c1, _) = two_children();
        store.set_complete(&r, true).unwrap();
        assert!(complete(&store, &c1));
        store.set_complete(&c1, false).unwrap();
        assert!(!complete(&store, &r));
        assert_eq!(store.set_complete("nope", true).unwrap_err().kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_add_subtask_is_idempotent_and_reopens_parent() {
        let (mut store, r, _, _) = two_children();
        store.mark_complete(&r).unwrap();
        let loose = store.create_task("loose", NO_PARENTS).unwrap().id;

        assert!(store.add_subtask(&r, &loose).unwrap());
        assert!(!complete(&store, &r));
        assert!(!store.add_subtask(&r, &loose).unwrap());
        assert!(!store.get(&loose).unwrap().is_root());
        assert_eq!(store.root_tasks().len(), 1);
        assert_consistent(&store);
    }

    #[test]
    fn test_add_parent_mirrors_add_subtask() {
        let (mut store, r, _, _) = two_children();
        let loose = store.create_task("loose", NO_PARENTS).unwrap().id;
        assert!(store.add_parent(&loose, &r).unwrap());
        assert!(store.get(&r).unwrap().subtasks().contains(&loose));
        assert_consistent(&store);
    }

    #[test]
    fn test_add_edge_rejects_cycles() {
        let (mut store, r, c1, _) = two_children();
        let grandchild = store.create_task("G", &[&c1]).unwrap().id;

        let err = store.add_subtask(&grandchild, &r).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Cycle);
        let err = store.add_parent(&c1, &c1).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Cycle);
        assert_consistent(&store);
    }

    #[test]
    fn test_add_edge_unknown_task() {
        let (mut store, r, _, _) = two_children();
        assert_eq!(store.add_subtask(&r, "ghost").unwrap_err().kind(), ErrorKind::NotFound);
        assert_eq!(store.add_parent("ghost", &r).unwrap_err().kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_remove_last_incomplete_edge_completes_parent() {
        let (mut store, r, c1, c2) = two_children();
        store.mark_complete(&c1).unwrap();

        assert!(store.remove_subtask(&r, &c2).unwrap());
        assert!(store.get(&c2).unwrap().is_root());
        assert!(complete(&store, &r));
        assert!(!store.remove_parent(&c2, &r).unwrap());
        assert_consistent(&store);
    }

    #[test]
    fn test_delete_removes_subtree_and_dangling_edges() {
        let (mut store, r, c1, c2) = two_children();
        let grandchild = store.create_task("G", &[&c1]).unwrap().id;

        let deleted = store.delete_task(&c1).unwrap();
        let mut expected = vec![c1.clone(), grandchild.clone()];
        expected.sort();
        assert_eq!(deleted, expected);
        assert!(store.get(&c1).is_none());
        assert!(store.get(&grandchild).is_none());
        assert_eq!(store.get(&r).unwrap().subtasks().iter().collect::<Vec<_>>(), vec![&c2]);
        assert_consistent(&store);
    }

    #[test]
    fn test_delete_shared_subtask_unlinks_outside_parent() {
        let mut store = TaskStore::new();
        let a = store.create_task("A", NO_PARENTS).unwrap().id;
        let b = store.create_task("B", NO_PARENTS).unwrap().id;
        let shared = store.create_task("shared", &[&a, &b]).unwrap().id;
        let other = store.create_task("other", &[&b]).unwrap().id;

        store.delete_task(&a).unwrap();
        assert!(store.get(&shared).is_none());
        let b_task = store.get(&b).unwrap();
        assert!(b_task.subtasks().contains(&other));
        assert!(!b_task.subtasks().contains(&shared));
        assert_consistent(&store);
    }

    #[test]
    fn test_delete_reconciles_surviving_parents() {
        let mut store = TaskStore::new();
        let p1 = store.create_task("P1", NO_PARENTS).unwrap().id;
        let p2 = store.create_task("P2", NO_PARENTS).unwrap().id;
        let done = store.create_task("done", &[&p1]).unwrap().id;
        let open = store.create_task("open", &[&p2]).unwrap().id;
        let doomed = store.create_task("doomed", &[&p1, &p2]).unwrap().id;
        store.mark_complete(&done).unwrap();

        store.delete_task(&doomed).unwrap();
        assert!(complete(&store, &p1), "remaining subtasks of P1 are all done");
        assert!(!complete(&store, &p2), "P2 still has an open subtask");
        assert!(!complete(&store, &open));
    }

    #[test]
    fn test_delete_only_child_leaves_parent_flag_alone() {
        let mut store = TaskStore::new();
        let p = store.create_task("P", NO_PARENTS).unwrap().id;
        let only = store.create_task("only", &[&p]).unwrap().id;

        store.delete_task(&only).unwrap();
        assert!(!complete(&store, &p));
        assert!(store.get(&p).unwrap().subtasks().is_empty());
    }

    #[test]
    fn test_delete_unknown_task() {
        let mut store = TaskStore::new();
        assert_eq!(store.delete_task("ghost").unwrap_err().kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_field_updates_touch_modified_time() {
        let (mut store, r, _, _) = two_children();
        let due = DateTime::from_timestamp(1_800_000_000, 0).unwrap();

        store.rename(&r, "Renamed").unwrap();
        store.set_due(&r, Some(due)).unwrap();
        store.set_categories(&r, vec!["home".to_string(), "errands".to_string()]).unwrap();

        let task = store.get(&r).unwrap();
        assert_eq!(task.name(), "Renamed");
        assert_eq!(task.due_at(), Some(due));
        assert_eq!(task.categories(), ["home", "errands"]);
        assert!(task.modified_at() >= task.created_at());
        assert_eq!(store.rename("ghost", "x").unwrap_err().kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_put_keeps_store_owned_edges() {
        let (mut store, r, c1, _) = two_children();
        let mut edited = store.get(&r).unwrap().clone();
        edited.name = "edited".to_string();
        edited.subtasks.clear();
        store.put(edited);
        assert_eq!(store.get(&r).unwrap().name(), "edited");
        assert!(store.get(&r).unwrap().subtasks().contains(&c1));

        let mut stray = store.get(&c1).unwrap().clone();
        stray.id = "stray-1".to_string();
        store.put(stray);
        assert!(store.get("stray-1").unwrap().is_root());
        assert_eq!(store.root_tasks().len(), 2);
        assert_consistent(&store);
    }

    #[test]
    fn test_records_round_trip() {
        let (mut store, _, c1, c2) = two_children();
        store.create_task("G", &[&c1, &c2]).unwrap();
        store.mark_complete(&c1).unwrap();

        let restored = TaskStore::from_records(&store.to_records()).unwrap();
        assert_eq!(restored, store);
        assert_consistent(&restored);
    }

    #[test]
    fn test_from_records_repairs_one_sided_edges() {
        let mut records = two_children().0.to_records();
        for record in &mut records {
            record.subtask_ids.clear();
        }
        let restored = TaskStore::from_records(&records).unwrap();
        assert_consistent(&restored);
        assert_eq!(restored.root_tasks().len(), 1);
        assert_eq!(restored.root_tasks()[0].subtasks().len(), 2);
    }

    #[test]
    fn test_from_records_rejects_dangling_reference() {
        let mut records = two_children().0.to_records();
        records[0].parent_ids.push("vanished".to_string());

        let err = TaskStore::from_records(&records).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(err.to_string().contains("vanished"));
    }

    #[test]
    fn test_from_records_rejects_cycles() {
        let (store, r, c1, _) = two_children();
        let mut records = store.to_records();
        for record in &mut records {
            if record.id == r {
                record.parent_ids.push(c1.clone());
            }
        }
        let err = TaskStore::from_records(&records).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Cycle);
    }

    #[test]
    fn test_from_records_reopens_complete_parent_of_open_subtask() {
        let (store, r, c1, c2) = two_children();
        let mut records = store.to_records();
        for record in &mut records {
            record.complete = record.id == r || record.id == c2;
        }

        let restored = TaskStore::from_records(&records).unwrap();
        assert_consistent(&restored);
        assert!(!complete(&restored, &r));
        assert!(!complete(&restored, &c1));
        assert!(complete(&restored, &c2), "subtasks keep their own flag");
    }

    /// A single chain `t000000 -> t000001 -> ...` of `len` tasks.
    fn chain(len: usize) -> TaskStore {
        let at = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let records: Vec<TaskRecord> = (0..len)
            .map(|i| TaskRecord {
                id: format!("t{i:06}"),
                name: format!("step {i}"),
                complete: false,
                created_date: at,
                modified_date: at,
                due_date: None,
                categories: vec![],
                parent_ids: if i == 0 { vec![] } else { vec![format!("t{:06}", i - 1)] },
                subtask_ids: if i + 1 == len { vec![] } else { vec![format!("t{:06}", i + 1)] },
            })
            .collect();
        TaskStore::from_records(&records).unwrap()
    }

    #[test]
    fn test_propagation_handles_deep_chains() {
        let len = 50_000;
        let last = format!("t{:06}", len - 1);

        let mut store = chain(len);
        store.mark_complete("t000000").unwrap();
        assert!(store.tasks().all(Task::is_complete));

        store.mark_incomplete(&last).unwrap();
        assert!(store.tasks().all(|t| !t.is_complete()));

        store.mark_complete(&last).unwrap();
        assert!(store.tasks().all(Task::is_complete), "completing the leaf closes the chain");
        assert_eq!(store.delete_task("t000000").unwrap().len(), len);
    }

    #[test]
    fn test_store_and_restore_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("tasks.json");
        let (store, ..) = two_children();

        store.store(&path).unwrap();
        let restored = TaskStore::restore(&path).unwrap();
        assert_eq!(restored, store);

        let leftovers: Vec<_> = std::fs::read_dir(path.parent().unwrap()).unwrap().collect();
        assert_eq!(leftovers.len(), 1, "temporary file should be renamed away");
    }

    #[test]
    fn test_restore_errors() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("missing.json");
        assert_eq!(TaskStore::restore(&missing).unwrap_err().kind(), ErrorKind::Io);

        let garbage = dir.path().join("garbage.json");
        std::fs::write(&garbage, "{not json").unwrap();
        assert_eq!(TaskStore::restore(&garbage).unwrap_err().kind(), ErrorKind::Decode);
    }

    #[test]
    fn test_store_to_unwritable_destination() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, "").unwrap();

        let err = TaskStore::new().store(&blocker.join("tasks.json")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
    }
}
