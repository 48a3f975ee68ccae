//! Property tests for hierarchy maintenance and completion propagation.

use proptest::prelude::*;
use proptest::sample::Index;
use std::collections::{BTreeMap, BTreeSet};
use tasktree::tasks::TaskStore;
use tasktree::ErrorKind;
use tempfile::TempDir;

#[derive(Debug, Clone)]
enum Op {
    Create { parents: Vec<Index> },
    Complete(Index),
    Reopen(Index),
    Link(Index, Index),
    Unlink(Index, Index),
    Delete(Index),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => prop::collection::vec(any::<Index>(), 0..3).prop_map(|parents| Op::Create { parents }),
        2 => any::<Index>().prop_map(Op::Complete),
        2 => any::<Index>().prop_map(Op::Reopen),
        2 => (any::<Index>(), any::<Index>()).prop_map(|(a, b)| Op::Link(a, b)),
        1 => (any::<Index>(), any::<Index>()).prop_map(|(a, b)| Op::Unlink(a, b)),
        1 => any::<Index>().prop_map(Op::Delete),
    ]
}

fn sorted_ids(store: &TaskStore) -> Vec<String> {
    let mut ids: Vec<String> = store.tasks().map(|t| t.id().to_string()).collect();
    ids.sort();
    ids
}

fn completion(store: &TaskStore) -> BTreeMap<String, bool> {
    store.tasks().map(|t| (t.id().to_string(), t.is_complete())).collect()
}

fn descendants(store: &TaskStore, id: &str) -> BTreeSet<String> {
    let mut seen = BTreeSet::new();
    let mut stack = vec![id.to_string()];
    while let Some(current) = stack.pop() {
        if seen.insert(current.clone()) {
            stack.extend(store.get(&current).unwrap().subtasks().iter().cloned());
        }
    }
    seen
}

fn ancestors(store: &TaskStore, id: &str) -> BTreeSet<String> {
    let mut seen = BTreeSet::new();
    let mut stack = vec![id.to_string()];
    while let Some(current) = stack.pop() {
        if seen.insert(current.clone()) {
            stack.extend(store.get(&current).unwrap().parents().iter().cloned());
        }
    }
    seen
}

fn apply(store: &mut TaskStore, op: &Op, counter: usize) -> Result<(), TestCaseError> {
    let ids = sorted_ids(store);
    let pick = |index: &Index| ids[index.index(ids.len())].clone();

    match op {
        Op::Create { parents } => {
            let parents: Vec<String> =
                if ids.is_empty() { vec![] } else { parents.iter().map(pick).collect() };
            let task = store.create_task(&format!("task {counter}"), &parents).unwrap();
            prop_assert!(!task.is_complete());
            prop_assert_eq!(task.parents().len(), parents.iter().collect::<BTreeSet<_>>().len());
        }
        _ if ids.is_empty() => {}
        Op::Complete(index) => {
            let id = pick(index);
            store.mark_complete(&id).unwrap();
            for d in descendants(store, &id) {
                prop_assert!(store.get(&d).unwrap().is_complete(), "{} not complete", d);
            }
            let before = completion(store);
            store.mark_complete(&id).unwrap();
            prop_assert_eq!(completion(store), before);
        }
        Op::Reopen(index) => {
            let id = pick(index);
            let before = completion(store);
            store.mark_incomplete(&id).unwrap();
            let up = ancestors(store, &id);
            for a in &up {
                prop_assert!(!store.get(a).unwrap().is_complete(), "{} still complete", a);
            }
            for (other, was_complete) in before {
                if !up.contains(&other) {
                    prop_assert_eq!(store.get(&other).unwrap().is_complete(), was_complete);
                }
            }
        }
        Op::Link(a, b) => {
            let (parent, child) = (pick(a), pick(b));
            match store.add_subtask(&parent, &child) {
                Ok(_) => {
                    prop_assert!(store.get(&parent).unwrap().subtasks().contains(&child));
                    prop_assert!(!store.add_subtask(&parent, &child).unwrap());
                }
                Err(e) => {
                    prop_assert_eq!(e.kind(), ErrorKind::Cycle);
                    prop_assert!(ancestors(store, &parent).contains(&child));
                }
            }
        }
        Op::Unlink(a, b) => {
            let (parent, child) = (pick(a), pick(b));
            let existed = store.get(&parent).unwrap().subtasks().contains(&child);
            prop_assert_eq!(store.remove_subtask(&parent, &child).unwrap(), existed);
            prop_assert!(!store.get(&child).unwrap().parents().contains(&parent));
        }
        Op::Delete(index) => {
            let id = pick(index);
            let doomed = descendants(store, &id);
            let deleted = store.delete_task(&id).unwrap();
            prop_assert_eq!(deleted.into_iter().collect::<BTreeSet<_>>(), doomed.clone());
            for d in &doomed {
                prop_assert!(store.get(d).is_none());
            }
        }
    }
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig { cases: 128, .. ProptestConfig::default() })]

    #[test]
    fn operations_preserve_invariants(ops in prop::collection::vec(op_strategy(), 1..40)) {
        let mut store = TaskStore::new();
        for (counter, op) in ops.iter().enumerate() {
            apply(&mut store, op, counter)?;
            let violations = store.invariant_violations();
            prop_assert!(violations.is_empty(), "after {:?}: {:?}", op, violations);

            let roots: BTreeSet<&str> = store.root_tasks().iter().map(|t| t.id()).collect();
            let parentless: BTreeSet<&str> =
                store.tasks().filter(|t| t.parents().is_empty()).map(|t| t.id()).collect();
            prop_assert_eq!(roots, parentless);
        }
    }

    #[test]
    fn records_round_trip(ops in prop::collection::vec(op_strategy(), 1..30)) {
        let mut store = TaskStore::new();
        for (counter, op) in ops.iter().enumerate() {
            apply(&mut store, op, counter)?;
        }

        let rebuilt = TaskStore::from_records(&store.to_records()).unwrap();
        prop_assert_eq!(&rebuilt, &store);

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tasks.json");
        store.store(&path).unwrap();
        prop_assert_eq!(TaskStore::restore(&path).unwrap(), store);
    }
}
