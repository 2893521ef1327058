//! Append-only change history
//!
//! Every mutating operation writes its history records inside the same
//! state commit, so a persisted mutation and its audit trail can never
//! disagree. Records are never edited after the fact.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::state::State;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum HistoryAction {
    Created,
    Updated,
    Deleted,
    StatusChanged,
}

impl HistoryAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            HistoryAction::Created => "created",
            HistoryAction::Updated => "updated",
            HistoryAction::Deleted => "deleted",
            HistoryAction::StatusChanged => "status_changed",
        }
    }
}

impl std::fmt::Display for HistoryAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub id: String,
    pub task_id: String,
    pub actor: String,
    pub action: HistoryAction,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old_value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_value: Option<String>,
    pub description: String,
    pub timestamp: DateTime<Utc>,
}

impl HistoryRecord {
    pub fn new(
        task_id: impl Into<String>,
        actor: impl Into<String>,
        action: HistoryAction,
        description: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Ulid::new().to_string(),
            task_id: task_id.into(),
            actor: actor.into(),
            action,
            field: None,
            old_value: None,
            new_value: None,
            description: description.into(),
            timestamp: now,
        }
    }

    pub fn with_field(
        mut self,
        field: impl Into<String>,
        old_value: Option<String>,
        new_value: Option<String>,
    ) -> Self {
        self.field = Some(field.into());
        self.old_value = old_value;
        self.new_value = new_value;
        self
    }
}

/// History of one task, newest first.
pub fn records_for<'a>(state: &'a State, task_id: &str) -> Vec<&'a HistoryRecord> {
    let mut records: Vec<&HistoryRecord> = state
        .history
        .iter()
        .filter(|record| record.task_id == task_id)
        .collect();
    // id breaks timestamp ties so records from one commit keep a stable order
    records.sort_by(|left, right| {
        right
            .timestamp
            .cmp(&left.timestamp)
            .then_with(|| right.id.cmp(&left.id))
    });
    records
}
