//! Task assignments
//!
//! A task can carry any number of assignments, each naming an opaque
//! user id, a role label, and optionally an expiry. At most one
//! assignment per task is primary at any instant; the bulk-assign
//! operation enforces that by demoting every claim after the first.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::hierarchy;
use crate::state::State;

pub const DEFAULT_ROLE: &str = "assignee";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Assignment {
    pub id: String,
    pub task_id: String,
    pub user: String,
    pub assigned_by: String,
    pub role: String,
    pub is_primary: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    pub assigned_at: DateTime<Utc>,
}

impl Assignment {
    /// Active means no expiry, or an expiry still in the future.
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            Some(expires) => expires > now,
            None => true,
        }
    }
}

/// One entry of a bulk assign call
#[derive(Debug, Clone)]
pub struct AssignmentEntry {
    pub user: String,
    pub role: Option<String>,
    pub primary: bool,
    pub expires_at: Option<DateTime<Utc>>,
}

impl AssignmentEntry {
    pub fn new(user: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            role: None,
            primary: false,
            expires_at: None,
        }
    }
}

/// Demote every primary claim after the first, in array order.
///
/// Returns how many entries were downgraded. The tie-break is
/// deterministic and audited by the caller; the warning here makes it
/// visible in logs as well.
pub fn enforce_single_primary(task_id: &str, entries: &mut [AssignmentEntry]) -> usize {
    let mut seen_primary = false;
    let mut downgraded = 0;
    for entry in entries.iter_mut() {
        if entry.primary {
            if seen_primary {
                entry.primary = false;
                downgraded += 1;
            } else {
                seen_primary = true;
            }
        }
    }
    if downgraded > 0 {
        tracing::warn!(
            task_id = %task_id,
            downgraded,
            "multiple entries claimed primary; keeping the first"
        );
    }
    downgraded
}

/// Build assignment records from normalized entries.
pub fn build_assignments(
    task_id: &str,
    entries: Vec<AssignmentEntry>,
    actor: &str,
    now: DateTime<Utc>,
) -> Vec<Assignment> {
    entries
        .into_iter()
        .map(|entry| Assignment {
            id: Uuid::new_v4().to_string(),
            task_id: task_id.to_string(),
            user: entry.user,
            assigned_by: actor.to_string(),
            role: entry.role.unwrap_or_else(|| DEFAULT_ROLE.to_string()),
            is_primary: entry.primary,
            expires_at: entry.expires_at,
            assigned_at: now,
        })
        .collect()
}

/// Assignments of one task, in insertion order.
pub fn assignments_for<'a>(state: &'a State, task_id: &str) -> Vec<&'a Assignment> {
    state
        .assignments
        .iter()
        .filter(|assignment| assignment.task_id == task_id)
        .collect()
}

fn own_assignee<'a>(
    state: &'a State,
    task_id: &str,
    now: DateTime<Utc>,
) -> Option<&'a Assignment> {
    let active: Vec<&Assignment> = assignments_for(state, task_id)
        .into_iter()
        .filter(|assignment| assignment.is_active(now))
        .collect();
    active
        .iter()
        .find(|assignment| assignment.is_primary)
        .copied()
        .or_else(|| active.first().copied())
}

/// Nearest assignee walking ancestor-or-self up the parent chain.
///
/// A task's own active primary wins, then its first active assignment;
/// with none, the parent chain is consulted in order. Expired
/// assignments never resolve.
pub fn effective_assignee<'a>(
    state: &'a State,
    task_id: &str,
    now: DateTime<Utc>,
) -> Option<&'a Assignment> {
    if let Some(assignment) = own_assignee(state, task_id, now) {
        return Some(assignment);
    }
    for ancestor_id in hierarchy::ancestors(state, task_id) {
        if let Some(assignment) = own_assignee(state, &ancestor_id, now) {
            return Some(assignment);
        }
    }
    None
}
