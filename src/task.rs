//! Task model and identifier scheme
//!
//! Tasks are the nodes of the work graph. Statuses and priorities are
//! closed enums; everything classification-like beyond that (task type,
//! tags, metadata, owner) is free-form and opaque to the core.
//!
//! Task ids are `<prefix>-<suffix>` where the suffix is the tail of a
//! fresh ULID, grown one character at a time when the configured length
//! runs out of unused combinations.

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::error::{Error, Result};

const ID_DELIMS: [&str; 2] = ["-", "/"];
const ULID_TIME_LEN: usize = 10;
const ULID_RANDOM_LEN: usize = 16;
const ULID_CHARSET: &str = "0123456789abcdefghjkmnpqrstvwxyz";
const ULID_CHARSET_LEN: u128 = 32;

/// Status shown for a task whose due date has passed.
///
/// Derived at display time, never stored and never a transition target.
pub const OVERDUE_DISPLAY_STATUS: &str = "overdue";

/// Stored task statuses
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Blocked,
    Review,
    Completed,
    Cancelled,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Blocked => "blocked",
            TaskStatus::Review => "review",
            TaskStatus::Completed => "completed",
            TaskStatus::Cancelled => "cancelled",
        }
    }

    /// Terminal statuses admit no further status mutation.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Cancelled)
    }

    pub fn all() -> [TaskStatus; 6] {
        [
            TaskStatus::Pending,
            TaskStatus::InProgress,
            TaskStatus::Blocked,
            TaskStatus::Review,
            TaskStatus::Completed,
            TaskStatus::Cancelled,
        ]
    }

    fn rank(&self) -> usize {
        match self {
            TaskStatus::Pending => 0,
            TaskStatus::InProgress => 1,
            TaskStatus::Blocked => 2,
            TaskStatus::Review => 3,
            TaskStatus::Completed => 4,
            TaskStatus::Cancelled => 5,
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(TaskStatus::Pending),
            "in_progress" | "in-progress" => Ok(TaskStatus::InProgress),
            "blocked" => Ok(TaskStatus::Blocked),
            "review" => Ok(TaskStatus::Review),
            "completed" => Ok(TaskStatus::Completed),
            "cancelled" => Ok(TaskStatus::Cancelled),
            OVERDUE_DISPLAY_STATUS => Err(Error::InvalidArgument(
                "overdue is derived from the due date and cannot be set".to_string(),
            )),
            _ => Err(Error::InvalidArgument(format!(
                "invalid status '{}': must be pending, in_progress, blocked, review, completed, or cancelled",
                s
            ))),
        }
    }
}

/// Task priorities
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TaskPriority {
    Low,
    Medium,
    High,
    Urgent,
}

impl TaskPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskPriority::Low => "low",
            TaskPriority::Medium => "medium",
            TaskPriority::High => "high",
            TaskPriority::Urgent => "urgent",
        }
    }

    fn rank(&self) -> usize {
        match self {
            TaskPriority::Urgent => 0,
            TaskPriority::High => 1,
            TaskPriority::Medium => 2,
            TaskPriority::Low => 3,
        }
    }
}

impl Default for TaskPriority {
    fn default() -> Self {
        TaskPriority::Medium
    }
}

impl std::fmt::Display for TaskPriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TaskPriority {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "low" => Ok(TaskPriority::Low),
            "medium" => Ok(TaskPriority::Medium),
            "high" => Ok(TaskPriority::High),
            "urgent" => Ok(TaskPriority::Urgent),
            _ => Err(Error::InvalidArgument(format!(
                "invalid priority '{}': must be low, medium, high, or urgent",
                s
            ))),
        }
    }
}

/// Opaque reference to an external owning entity.
///
/// The core stores and returns the pair but never dereferences it;
/// interpreting `kind` is up to whatever module attached the task.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OwnerRef {
    pub kind: String,
    pub id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_type: Option<String>,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<OwnerRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_hours: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actual_hours: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blocked_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
    #[serde(default)]
    pub completion: u8,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub created_by: String,
    pub updated_by: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Task {
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// A task is overdue when its due date has passed and it is not in
    /// a terminal status. Overdue is display-only; `status` keeps its
    /// stored value.
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        match self.due_at {
            Some(due) => due < now && !self.status.is_terminal(),
            None => false,
        }
    }

    pub fn display_status(&self, now: DateTime<Utc>) -> &'static str {
        if self.is_overdue(now) {
            OVERDUE_DISPLAY_STATUS
        } else {
            self.status.as_str()
        }
    }
}

/// Fields for creating a task
#[derive(Debug, Clone, Default)]
pub struct NewTask {
    pub title: String,
    pub description: Option<String>,
    pub task_type: Option<String>,
    pub priority: Option<TaskPriority>,
    pub parent_id: Option<String>,
    pub owner: Option<OwnerRef>,
    pub estimated_hours: Option<f64>,
    pub due_at: Option<DateTime<Utc>>,
    pub tags: Vec<String>,
    pub metadata: BTreeMap<String, String>,
}

/// A single audited field change produced by applying a patch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldChange {
    pub field: &'static str,
    pub old: Option<String>,
    pub new: Option<String>,
}

/// Partial task update. Absent fields are left untouched.
///
/// Status is deliberately not here: status only moves through the
/// transition operation so its gating rules cannot be bypassed.
#[derive(Debug, Clone, Default)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub task_type: Option<String>,
    pub priority: Option<TaskPriority>,
    pub estimated_hours: Option<f64>,
    pub actual_hours: Option<f64>,
    pub due_at: Option<DateTime<Utc>>,
    pub clear_due_at: bool,
    pub blocked_reason: Option<String>,
    pub tags: Option<Vec<String>>,
    pub metadata: Option<BTreeMap<String, String>>,
    pub completion: Option<u8>,
    pub owner: Option<OwnerRef>,
    pub clear_owner: bool,
}

impl TaskPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.task_type.is_none()
            && self.priority.is_none()
            && self.estimated_hours.is_none()
            && self.actual_hours.is_none()
            && self.due_at.is_none()
            && !self.clear_due_at
            && self.blocked_reason.is_none()
            && self.tags.is_none()
            && self.metadata.is_none()
            && self.completion.is_none()
            && self.owner.is_none()
            && !self.clear_owner
    }

    /// Apply the patch to a task, returning one change per field that
    /// actually changed. Completion is clamped to 100.
    pub fn apply(self, task: &mut Task) -> Vec<FieldChange> {
        let mut changes = Vec::new();

        if let Some(title) = self.title {
            if title != task.title {
                changes.push(FieldChange {
                    field: "title",
                    old: Some(task.title.clone()),
                    new: Some(title.clone()),
                });
                task.title = title;
            }
        }
        if let Some(description) = self.description {
            let new = if description.is_empty() {
                None
            } else {
                Some(description)
            };
            if new != task.description {
                changes.push(FieldChange {
                    field: "description",
                    old: task.description.clone(),
                    new: new.clone(),
                });
                task.description = new;
            }
        }
        if let Some(task_type) = self.task_type {
            let new = if task_type.is_empty() {
                None
            } else {
                Some(task_type)
            };
            if new != task.task_type {
                changes.push(FieldChange {
                    field: "task_type",
                    old: task.task_type.clone(),
                    new: new.clone(),
                });
                task.task_type = new;
            }
        }
        if let Some(priority) = self.priority {
            if priority != task.priority {
                changes.push(FieldChange {
                    field: "priority",
                    old: Some(task.priority.as_str().to_string()),
                    new: Some(priority.as_str().to_string()),
                });
                task.priority = priority;
            }
        }
        if let Some(estimated) = self.estimated_hours {
            if Some(estimated) != task.estimated_hours {
                changes.push(FieldChange {
                    field: "estimated_hours",
                    old: task.estimated_hours.map(render_hours),
                    new: Some(render_hours(estimated)),
                });
                task.estimated_hours = Some(estimated);
            }
        }
        if let Some(actual) = self.actual_hours {
            if Some(actual) != task.actual_hours {
                changes.push(FieldChange {
                    field: "actual_hours",
                    old: task.actual_hours.map(render_hours),
                    new: Some(render_hours(actual)),
                });
                task.actual_hours = Some(actual);
            }
        }
        if self.clear_due_at {
            if task.due_at.is_some() {
                changes.push(FieldChange {
                    field: "due_at",
                    old: task.due_at.map(|ts| ts.to_rfc3339()),
                    new: None,
                });
                task.due_at = None;
            }
        } else if let Some(due) = self.due_at {
            if Some(due) != task.due_at {
                changes.push(FieldChange {
                    field: "due_at",
                    old: task.due_at.map(|ts| ts.to_rfc3339()),
                    new: Some(due.to_rfc3339()),
                });
                task.due_at = Some(due);
            }
        }
        if let Some(reason) = self.blocked_reason {
            let new = if reason.trim().is_empty() {
                None
            } else {
                Some(reason.trim().to_string())
            };
            if new != task.blocked_reason {
                changes.push(FieldChange {
                    field: "blocked_reason",
                    old: task.blocked_reason.clone(),
                    new: new.clone(),
                });
                task.blocked_reason = new;
            }
        }
        if let Some(tags) = self.tags {
            if tags != task.tags {
                changes.push(FieldChange {
                    field: "tags",
                    old: Some(render_tags(&task.tags)),
                    new: Some(render_tags(&tags)),
                });
                task.tags = tags;
            }
        }
        if let Some(metadata) = self.metadata {
            if metadata != task.metadata {
                changes.push(FieldChange {
                    field: "metadata",
                    old: Some(render_metadata(&task.metadata)),
                    new: Some(render_metadata(&metadata)),
                });
                task.metadata = metadata;
            }
        }
        if let Some(completion) = self.completion {
            let completion = completion.min(100);
            if completion != task.completion {
                changes.push(FieldChange {
                    field: "completion",
                    old: Some(task.completion.to_string()),
                    new: Some(completion.to_string()),
                });
                task.completion = completion;
            }
        }
        if self.clear_owner {
            if task.owner.is_some() {
                changes.push(FieldChange {
                    field: "owner",
                    old: task.owner.as_ref().map(render_owner),
                    new: None,
                });
                task.owner = None;
            }
        } else if let Some(owner) = self.owner {
            if Some(&owner) != task.owner.as_ref() {
                changes.push(FieldChange {
                    field: "owner",
                    old: task.owner.as_ref().map(render_owner),
                    new: Some(render_owner(&owner)),
                });
                task.owner = Some(owner);
            }
        }

        changes
    }
}

fn render_hours(hours: f64) -> String {
    format!("{hours}")
}

fn render_tags(tags: &[String]) -> String {
    tags.join(", ")
}

fn render_metadata(metadata: &BTreeMap<String, String>) -> String {
    metadata
        .iter()
        .map(|(key, value)| format!("{key}={value}"))
        .collect::<Vec<_>>()
        .join(", ")
}

fn render_owner(owner: &OwnerRef) -> String {
    format!("{}:{}", owner.kind, owner.id)
}

/// Sort tasks for listing: open work first, then priority, then most
/// recently touched.
pub fn sort_tasks(tasks: &mut [Task]) {
    tasks.sort_by(|left, right| {
        left.status
            .rank()
            .cmp(&right.status.rank())
            .then_with(|| left.priority.rank().cmp(&right.priority.rank()))
            .then_with(|| right.updated_at.cmp(&left.updated_at))
            .then_with(|| left.id.cmp(&right.id))
    });
}

// ============================================================================
// Identifier scheme
// ============================================================================

pub(crate) fn normalize_id(value: &str) -> String {
    value.trim().to_ascii_lowercase()
}

pub(crate) fn suffix_from_id(id_norm: &str) -> &str {
    let mut earliest = None;
    for delim in ID_DELIMS {
        if let Some(idx) = id_norm.find(delim) {
            earliest = match earliest {
                Some(current) => Some(std::cmp::min(current, idx)),
                None => Some(idx),
            };
        }
    }
    if let Some(idx) = earliest {
        let start = idx + 1;
        if start < id_norm.len() {
            &id_norm[start..]
        } else {
            ""
        }
    } else {
        id_norm
    }
}

fn is_ulid_suffix(value: &str) -> bool {
    !value.is_empty() && value.chars().all(|ch| ULID_CHARSET.contains(ch))
}

fn ulid_space_for_len(len: usize) -> u128 {
    let mut space = 1u128;
    for _ in 0..len {
        space *= ULID_CHARSET_LEN;
    }
    space
}

fn unique_suffix_from_base(
    base: &str,
    len: usize,
    existing_suffixes: &HashSet<String>,
) -> Option<String> {
    let base = base.to_lowercase();
    let random_end = ULID_TIME_LEN + ULID_RANDOM_LEN;
    if base.len() < random_end || len == 0 || len > ULID_RANDOM_LEN {
        return None;
    }
    let random_part = &base[ULID_TIME_LEN..random_end];
    let candidate = &random_part[..len];
    if existing_suffixes.contains(candidate) {
        return None;
    }
    Some(candidate.to_string())
}

fn select_suffix_len(min_len: usize, ulid_suffix_counts: &HashMap<usize, usize>) -> usize {
    let mut len = min_len;
    loop {
        let used = ulid_suffix_counts.get(&len).copied().unwrap_or(0) as u128;
        let space = ulid_space_for_len(len);
        if used >= space && len < ULID_RANDOM_LEN {
            len += 1;
            continue;
        }
        return len;
    }
}

/// Generate a fresh `<prefix>-<suffix>` id not colliding with any
/// existing id's suffix.
pub fn generate_id<'a>(
    prefix: &str,
    min_len: usize,
    existing_ids: impl Iterator<Item = &'a str>,
) -> String {
    let prefix = prefix.trim();
    let mut existing_suffixes = HashSet::new();
    let mut ulid_suffix_counts: HashMap<usize, usize> = HashMap::new();
    for id in existing_ids {
        let id_norm = normalize_id(id);
        let suffix = suffix_from_id(&id_norm);
        if suffix.is_empty() {
            continue;
        }
        existing_suffixes.insert(suffix.to_string());
        if is_ulid_suffix(suffix) {
            *ulid_suffix_counts.entry(suffix.len()).or_insert(0) += 1;
        }
    }

    let target_len = select_suffix_len(min_len, &ulid_suffix_counts);

    loop {
        let base = Ulid::new().to_string();
        if let Some(suffix) = unique_suffix_from_base(&base, target_len, &existing_suffixes) {
            return format!("{}-{}", prefix, suffix);
        }
    }
}

/// Outcome of matching user input against known ids
#[derive(Debug, Clone)]
pub(crate) enum Resolution {
    Match(String),
    NotFound,
    Ambiguous(Vec<String>),
}

/// Match `input` against ids: an exact id or exact suffix wins; otherwise
/// a unique suffix prefix is accepted and anything else is ambiguous.
pub(crate) fn resolve_among<'a>(
    input: &str,
    ids: impl Iterator<Item = &'a str>,
) -> Resolution {
    let trimmed_norm = normalize_id(input);
    let candidate_norm = suffix_from_id(&trimmed_norm).to_string();
    if candidate_norm.is_empty() {
        return Resolution::NotFound;
    }

    let mut exact: Vec<String> = Vec::new();
    let mut matches: Vec<String> = Vec::new();

    for id in ids {
        let id_norm = normalize_id(id);
        let suffix_norm = suffix_from_id(&id_norm);
        if id_norm == trimmed_norm || suffix_norm == trimmed_norm {
            exact.push(id.to_string());
            continue;
        }
        if suffix_norm.starts_with(&candidate_norm) {
            matches.push(id.to_string());
        }
    }

    if exact.len() == 1 {
        return Resolution::Match(exact.remove(0));
    }
    if exact.len() > 1 {
        return Resolution::Ambiguous(exact);
    }

    matches.sort();
    matches.dedup();
    match matches.len() {
        0 => Resolution::NotFound,
        1 => Resolution::Match(matches.remove(0)),
        _ => Resolution::Ambiguous(matches),
    }
}
