//! Status transition rules
//!
//! The checks here run against the same state snapshot the enclosing
//! mutation will write, so a dependency completed by a concurrent
//! process is either fully visible or not at all. Dependency gating is
//! evaluated fresh on every call; nothing is cached.

use chrono::{DateTime, Utc};

use crate::dependency;
use crate::error::{Error, Result};
use crate::state::State;
use crate::task::{Task, TaskStatus};

/// Check whether `task` may move to `new_status` right now.
///
/// Terminal tasks are frozen. Moving to `in_progress` requires every
/// gating prerequisite to be completed or cancelled; moving to
/// `blocked` requires a blocked-reason on the task. Everything else is
/// allowed; rules beyond dependency gating belong to callers.
pub fn check_transition(state: &State, task: &Task, new_status: TaskStatus) -> Result<()> {
    if task.status.is_terminal() {
        return Err(Error::TerminalTask {
            task: task.id.clone(),
            status: task.status.as_str().to_string(),
        });
    }

    if task.status == new_status {
        return Err(Error::InvalidArgument(format!(
            "{} is already {}",
            task.id, new_status
        )));
    }

    match new_status {
        TaskStatus::InProgress => {
            let blocking = dependency::incomplete_dependencies(state, &task.id);
            if !blocking.is_empty() {
                return Err(Error::UnmetDependency {
                    task: task.id.clone(),
                    blocking,
                });
            }
        }
        TaskStatus::Blocked => {
            let has_reason = task
                .blocked_reason
                .as_deref()
                .map(|reason| !reason.trim().is_empty())
                .unwrap_or(false);
            if !has_reason {
                return Err(Error::MissingBlockReason(task.id.clone()));
            }
        }
        _ => {}
    }

    Ok(())
}

/// Apply a transition that already passed [`check_transition`].
///
/// First entry to `in_progress` stamps `started_at`; completion stamps
/// `completed_at` and forces the percentage to 100; leaving for any
/// non-blocked status drops the blocked-reason.
pub fn apply_transition(task: &mut Task, new_status: TaskStatus, now: DateTime<Utc>) {
    task.status = new_status;

    match new_status {
        TaskStatus::InProgress => {
            if task.started_at.is_none() {
                task.started_at = Some(now);
            }
        }
        TaskStatus::Completed => {
            task.completed_at = Some(now);
            task.completion = 100;
        }
        _ => {}
    }

    if new_status != TaskStatus::Blocked {
        task.blocked_reason = None;
    }
}
