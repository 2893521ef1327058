//! Dependency edges between tasks
//!
//! An edge `(task, depends_on)` always reads "task depends on
//! depends_on", whatever its type label. Only `blocks` and `blocked_by`
//! edges gate status transitions and participate in the cycle
//! invariant; `related` edges are annotations.
//!
//! All traversals are breadth-first with an explicit visited set, so
//! they terminate on any graph the store can hold.

use std::collections::{HashSet, VecDeque};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::state::State;
use crate::task::TaskStatus;

/// Dependency edge types
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DependencyType {
    Blocks,
    BlockedBy,
    Related,
}

impl DependencyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DependencyType::Blocks => "blocks",
            DependencyType::BlockedBy => "blocked_by",
            DependencyType::Related => "related",
        }
    }

    /// Gating edges are the only ones the status state machine consults.
    pub fn is_gating(&self) -> bool {
        matches!(self, DependencyType::Blocks | DependencyType::BlockedBy)
    }
}

impl std::fmt::Display for DependencyType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DependencyType {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "blocks" => Ok(DependencyType::Blocks),
            "blocked_by" | "blocked-by" => Ok(DependencyType::BlockedBy),
            "related" => Ok(DependencyType::Related),
            _ => Err(Error::InvalidArgument(format!(
                "invalid dependency type '{}': must be blocks, blocked_by, or related",
                s
            ))),
        }
    }
}

impl Default for DependencyType {
    fn default() -> Self {
        DependencyType::Blocks
    }
}

/// A directed dependency edge
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dependency {
    pub task_id: String,
    pub depends_on_id: String,
    #[serde(rename = "type")]
    pub dep_type: DependencyType,
    pub created_at: DateTime<Utc>,
    pub created_by: String,
}

impl Dependency {
    pub fn new(
        task_id: impl Into<String>,
        depends_on_id: impl Into<String>,
        dep_type: DependencyType,
        actor: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            task_id: task_id.into(),
            depends_on_id: depends_on_id.into(),
            dep_type,
            created_at: now,
            created_by: actor.into(),
        }
    }
}

/// Would inserting `task -> depends_on` close a cycle among gating edges?
///
/// Walks outward from `depends_on` along existing gating edges; if the
/// walk reaches `task`, the new edge would complete a loop.
pub fn would_create_cycle(edges: &[Dependency], task_id: &str, depends_on_id: &str) -> bool {
    let mut visited: HashSet<&str> = HashSet::new();
    let mut queue: VecDeque<&str> = VecDeque::new();
    queue.push_back(depends_on_id);

    while let Some(current) = queue.pop_front() {
        if current == task_id {
            return true;
        }
        if !visited.insert(current) {
            continue;
        }
        for edge in edges {
            if edge.dep_type.is_gating() && edge.task_id == current {
                queue.push_back(edge.depends_on_id.as_str());
            }
        }
    }

    false
}

/// Validate a prospective edge against the current graph.
///
/// Rejects self-dependencies for every edge type, exact duplicates, and
/// gating edges that would close a cycle.
pub fn validate_new_edge(
    state: &State,
    task_id: &str,
    depends_on_id: &str,
    dep_type: DependencyType,
) -> Result<()> {
    if task_id == depends_on_id {
        return Err(Error::SelfDependency(task_id.to_string()));
    }

    let duplicate = state.dependencies.iter().any(|edge| {
        edge.task_id == task_id
            && edge.depends_on_id == depends_on_id
            && edge.dep_type == dep_type
    });
    if duplicate {
        return Err(Error::InvalidArgument(format!(
            "dependency already exists: {} -> {} ({})",
            task_id, depends_on_id, dep_type
        )));
    }

    if dep_type.is_gating() && would_create_cycle(&state.dependencies, task_id, depends_on_id) {
        return Err(Error::CyclicDependency {
            task: task_id.to_string(),
            depends_on: depends_on_id.to_string(),
        });
    }

    Ok(())
}

/// Full transitive set of tasks `task_id` depends on, over all edge
/// types, deduplicated, in breadth-first discovery order.
pub fn dependency_chain(edges: &[Dependency], task_id: &str) -> Vec<String> {
    let mut chain: Vec<String> = Vec::new();
    let mut visited: HashSet<&str> = HashSet::new();
    visited.insert(task_id);
    let mut queue: VecDeque<&str> = VecDeque::new();
    queue.push_back(task_id);

    while let Some(current) = queue.pop_front() {
        for edge in edges {
            if edge.task_id == current {
                let next = edge.depends_on_id.as_str();
                if visited.insert(next) {
                    chain.push(next.to_string());
                    queue.push_back(next);
                }
            }
        }
    }

    chain
}

/// Direct gating prerequisites of `task_id` that are not yet
/// completed or cancelled. Counterparts the store no longer knows
/// (or knows only as soft-deleted) still count as incomplete; edges
/// have to be removed explicitly to stop gating.
pub fn incomplete_dependencies(state: &State, task_id: &str) -> Vec<String> {
    let mut blocking: Vec<String> = Vec::new();
    for edge in &state.dependencies {
        if edge.task_id != task_id || !edge.dep_type.is_gating() {
            continue;
        }
        let done = state
            .task(&edge.depends_on_id)
            .map(|counterpart| {
                matches!(
                    counterpart.status,
                    TaskStatus::Completed | TaskStatus::Cancelled
                )
            })
            .unwrap_or(false);
        if !done && !blocking.contains(&edge.depends_on_id) {
            blocking.push(edge.depends_on_id.clone());
        }
    }
    blocking
}

/// Re-evaluated at every call; never cached.
pub fn has_incomplete_dependencies(state: &State, task_id: &str) -> bool {
    !incomplete_dependencies(state, task_id).is_empty()
}
