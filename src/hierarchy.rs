//! Parent/child hierarchy walks and reparenting rules
//!
//! Every walk here is iterative with an explicit visited set and is
//! bounded by the number of tasks in the store, so even malformed data
//! (a parent loop written by hand) cannot hang a traversal. Soft-deleted
//! tasks stay in the graph; their parent links keep counting until the
//! links themselves are changed.

use std::collections::{HashMap, HashSet};

use crate::error::{Error, Result};
use crate::state::State;

/// Ancestor chain of `task_id`, immediate parent first, root last.
///
/// Stops early if a parent reference points at a missing task or the
/// chain loops back on itself.
pub fn ancestors(state: &State, task_id: &str) -> Vec<String> {
    let mut chain: Vec<String> = Vec::new();
    let mut visited: HashSet<String> = HashSet::new();
    visited.insert(task_id.to_string());

    let mut current = state
        .task(task_id)
        .and_then(|task| task.parent_id.clone());

    while let Some(parent_id) = current {
        if !visited.insert(parent_id.clone()) {
            break;
        }
        if chain.len() >= state.tasks.len() {
            break;
        }
        chain.push(parent_id.clone());
        current = state
            .task(&parent_id)
            .and_then(|task| task.parent_id.clone());
    }

    chain
}

/// All transitive descendants of `task_id`, depth-first.
pub fn descendants(state: &State, task_id: &str) -> Vec<String> {
    let mut children_of: HashMap<&str, Vec<&str>> = HashMap::new();
    for task in &state.tasks {
        if let Some(parent_id) = &task.parent_id {
            children_of
                .entry(parent_id.as_str())
                .or_default()
                .push(task.id.as_str());
        }
    }

    let mut found: Vec<String> = Vec::new();
    let mut visited: HashSet<&str> = HashSet::new();
    visited.insert(task_id);
    let mut stack: Vec<&str> = vec![task_id];

    while let Some(current) = stack.pop() {
        if let Some(children) = children_of.get(current) {
            for child in children {
                if visited.insert(child) {
                    found.push((*child).to_string());
                    stack.push(child);
                }
            }
        }
    }

    found
}

/// Depth of a task counting itself, so a parentless task sits at 1.
pub fn depth(state: &State, task_id: &str) -> usize {
    ancestors(state, task_id).len() + 1
}

/// Check that `new_parent_id` is a legal parent for `task_id`.
///
/// Rejects the task itself, any of its descendants, and any parent
/// whose own ancestor chain already contains the task. Both directions
/// are checked independently so a half-corrupted graph still cannot be
/// made worse. Also enforces the configured depth cap.
pub fn validate_new_parent(
    state: &State,
    task_id: &str,
    new_parent_id: &str,
    max_depth: usize,
) -> Result<()> {
    if new_parent_id == task_id {
        return Err(Error::CircularHierarchy(format!(
            "{task_id} cannot be its own parent"
        )));
    }

    if descendants(state, task_id)
        .iter()
        .any(|descendant| descendant == new_parent_id)
    {
        return Err(Error::CircularHierarchy(format!(
            "{new_parent_id} is a descendant of {task_id}"
        )));
    }

    if ancestors(state, new_parent_id)
        .iter()
        .any(|ancestor| ancestor == task_id)
    {
        return Err(Error::CircularHierarchy(format!(
            "{task_id} is an ancestor of {new_parent_id}"
        )));
    }

    let new_depth = depth(state, new_parent_id) + 1;
    if new_depth > max_depth {
        return Err(Error::DepthExceeded(format!(
            "{task_id} would sit {new_depth} levels deep under {new_parent_id} (max {max_depth})"
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::{Task, TaskPriority, TaskStatus};
    use chrono::Utc;
    use std::collections::BTreeMap;

    fn task_with_parent(id: &str, parent: Option<&str>) -> Task {
        let now = Utc::now();
        Task {
            id: id.to_string(),
            title: id.to_string(),
            description: None,
            task_type: None,
            status: TaskStatus::Pending,
            priority: TaskPriority::Medium,
            parent_id: parent.map(|p| p.to_string()),
            owner: None,
            estimated_hours: None,
            actual_hours: None,
            due_at: None,
            started_at: None,
            completed_at: None,
            blocked_reason: None,
            tags: Vec::new(),
            metadata: BTreeMap::new(),
            completion: 0,
            created_at: now,
            updated_at: now,
            created_by: "tester".to_string(),
            updated_by: "tester".to_string(),
            deleted_at: None,
        }
    }

    fn chain_state() -> State {
        // root -> mid -> leaf, plus a sibling under root
        let mut state = State::new();
        state.tasks.push(task_with_parent("root", None));
        state.tasks.push(task_with_parent("mid", Some("root")));
        state.tasks.push(task_with_parent("leaf", Some("mid")));
        state.tasks.push(task_with_parent("side", Some("root")));
        state
    }

    #[test]
    fn ancestors_walk_parent_first() {
        let state = chain_state();
        assert_eq!(
            ancestors(&state, "leaf"),
            vec!["mid".to_string(), "root".to_string()]
        );
        assert!(ancestors(&state, "root").is_empty());
    }

    #[test]
    fn descendants_cover_the_subtree() {
        let state = chain_state();
        let mut found = descendants(&state, "root");
        found.sort();
        assert_eq!(
            found,
            vec!["leaf".to_string(), "mid".to_string(), "side".to_string()]
        );
        assert!(descendants(&state, "leaf").is_empty());
    }

    #[test]
    fn ancestors_terminate_on_parent_loop() {
        // malformed by hand: a <-> b
        let mut state = State::new();
        state.tasks.push(task_with_parent("a", Some("b")));
        state.tasks.push(task_with_parent("b", Some("a")));

        // the walk stops before re-emitting the start: a task is never
        // its own ancestor, even through corrupt parent links
        let chain = ancestors(&state, "a");
        assert_eq!(chain, vec!["b".to_string()]);
        let chain = ancestors(&state, "b");
        assert_eq!(chain, vec!["a".to_string()]);
    }

    #[test]
    fn reparent_to_self_rejected() {
        let state = chain_state();
        let err = validate_new_parent(&state, "mid", "mid", 32).unwrap_err();
        assert!(matches!(err, Error::CircularHierarchy(_)));
    }

    #[test]
    fn reparent_under_descendant_rejected() {
        let state = chain_state();
        let err = validate_new_parent(&state, "root", "leaf", 32).unwrap_err();
        assert!(matches!(err, Error::CircularHierarchy(_)));

        let err = validate_new_parent(&state, "mid", "leaf", 32).unwrap_err();
        assert!(matches!(err, Error::CircularHierarchy(_)));
    }

    #[test]
    fn reparent_to_unrelated_task_allowed() {
        let state = chain_state();
        assert!(validate_new_parent(&state, "leaf", "side", 32).is_ok());
        assert!(validate_new_parent(&state, "side", "mid", 32).is_ok());
    }

    #[test]
    fn depth_cap_enforced() {
        let state = chain_state();
        // placing under leaf would be depth 4
        let err = validate_new_parent(&state, "side", "leaf", 3).unwrap_err();
        assert!(matches!(err, Error::DepthExceeded(_)));
        assert!(validate_new_parent(&state, "side", "leaf", 4).is_ok());
    }
}
