//! Persistent state document
//!
//! Everything trak knows lives in one JSON document: tasks, dependency
//! edges, assignments, templates and the append-only history. The
//! storage layer reads and writes the whole document under a file lock;
//! `State::validate` runs before every persist so a bad mutation can
//! never reach disk.

use std::collections::{HashMap, HashSet, VecDeque};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::assignment::Assignment;
use crate::dependency::Dependency;
use crate::error::{Error, Result};
use crate::history::HistoryRecord;
use crate::task::{self, Resolution, Task};
use crate::template::Template;

/// Schema identifier written into every state file
pub const STATE_SCHEMA: &str = "trak.state.v1";

fn default_schema() -> String {
    STATE_SCHEMA.to_string()
}

/// The whole persisted document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct State {
    #[serde(default = "default_schema")]
    pub schema_version: String,
    pub generated_at: DateTime<Utc>,
    #[serde(default)]
    pub tasks: Vec<Task>,
    #[serde(default)]
    pub dependencies: Vec<Dependency>,
    #[serde(default)]
    pub assignments: Vec<Assignment>,
    #[serde(default)]
    pub templates: Vec<Template>,
    #[serde(default)]
    pub history: Vec<HistoryRecord>,
}

impl Default for State {
    fn default() -> Self {
        Self::new()
    }
}

impl State {
    pub fn new() -> Self {
        Self {
            schema_version: default_schema(),
            generated_at: Utc::now(),
            tasks: Vec::new(),
            dependencies: Vec::new(),
            assignments: Vec::new(),
            templates: Vec::new(),
            history: Vec::new(),
        }
    }

    // =========================================================================
    // Lookups
    // =========================================================================

    /// Find a task by exact id, soft-deleted included
    pub fn task(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|task| task.id == id)
    }

    /// Find a task by exact id (mutable), soft-deleted included
    pub fn task_mut(&mut self, id: &str) -> Option<&mut Task> {
        self.tasks.iter_mut().find(|task| task.id == id)
    }

    /// Task by exact id or `TaskNotFound`
    pub fn get_task(&self, id: &str) -> Result<&Task> {
        self.task(id)
            .ok_or_else(|| Error::TaskNotFound(id.to_string()))
    }

    /// Live task by exact id; soft-deleted counts as not found
    pub fn get_live_task(&self, id: &str) -> Result<&Task> {
        match self.task(id) {
            Some(task) if !task.is_deleted() => Ok(task),
            _ => Err(Error::TaskNotFound(id.to_string())),
        }
    }

    /// Live task by exact id (mutable); soft-deleted counts as not found
    pub fn get_live_task_mut(&mut self, id: &str) -> Result<&mut Task> {
        match self.tasks.iter_mut().find(|task| task.id == id) {
            Some(task) if !task.is_deleted() => Ok(task),
            _ => Err(Error::TaskNotFound(id.to_string())),
        }
    }

    pub fn template(&self, id: &str) -> Option<&Template> {
        self.templates.iter().find(|template| template.id == id)
    }

    pub fn template_mut(&mut self, id: &str) -> Option<&mut Template> {
        self.templates.iter_mut().find(|template| template.id == id)
    }

    pub fn get_template(&self, id: &str) -> Result<&Template> {
        self.template(id)
            .ok_or_else(|| Error::TemplateNotFound(id.to_string()))
    }

    /// Iterate tasks that are not soft-deleted
    pub fn live_tasks(&self) -> impl Iterator<Item = &Task> {
        self.tasks.iter().filter(|task| !task.is_deleted())
    }

    pub fn task_ids(&self) -> impl Iterator<Item = &str> {
        self.tasks.iter().map(|task| task.id.as_str())
    }

    pub fn template_ids(&self) -> impl Iterator<Item = &str> {
        self.templates.iter().map(|template| template.id.as_str())
    }

    // =========================================================================
    // Id resolution
    // =========================================================================

    /// Resolve user input to a live task id.
    ///
    /// Accepts the full id, the bare suffix, or a unique suffix prefix.
    pub fn resolve_task_id(&self, input: &str) -> Result<String> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(Error::InvalidArgument("task id cannot be empty".to_string()));
        }
        match task::resolve_among(trimmed, self.live_tasks().map(|t| t.id.as_str())) {
            Resolution::Match(id) => Ok(id),
            Resolution::NotFound => Err(Error::TaskNotFound(trimmed.to_string())),
            Resolution::Ambiguous(candidates) => Err(ambiguous("task", trimmed, &candidates)),
        }
    }

    /// Resolve user input to any task id, soft-deleted included.
    ///
    /// Live tasks shadow deleted ones: the deleted set is only
    /// consulted when nothing live matches.
    pub fn resolve_task_id_any(&self, input: &str) -> Result<String> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(Error::InvalidArgument("task id cannot be empty".to_string()));
        }
        match task::resolve_among(trimmed, self.live_tasks().map(|t| t.id.as_str())) {
            Resolution::Match(id) => return Ok(id),
            Resolution::Ambiguous(candidates) => {
                return Err(ambiguous("task", trimmed, &candidates))
            }
            Resolution::NotFound => {}
        }
        match task::resolve_among(trimmed, self.task_ids()) {
            Resolution::Match(id) => Ok(id),
            Resolution::NotFound => Err(Error::TaskNotFound(trimmed.to_string())),
            Resolution::Ambiguous(candidates) => Err(ambiguous("task", trimmed, &candidates)),
        }
    }

    /// Resolve user input to a template id.
    pub fn resolve_template_id(&self, input: &str) -> Result<String> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(Error::InvalidArgument(
                "template id cannot be empty".to_string(),
            ));
        }
        match task::resolve_among(trimmed, self.template_ids()) {
            Resolution::Match(id) => Ok(id),
            Resolution::NotFound => Err(Error::TemplateNotFound(trimmed.to_string())),
            Resolution::Ambiguous(candidates) => Err(ambiguous("template", trimmed, &candidates)),
        }
    }

    // =========================================================================
    // Validation
    // =========================================================================

    /// Cross-record invariants checked before every persist.
    ///
    /// Failures here mean a mutation produced a document trak itself
    /// would refuse to trust, so nothing is written.
    pub fn validate(&self) -> Result<()> {
        self.validate_tasks()?;
        self.validate_dependencies()?;
        self.validate_assignments()?;
        self.validate_templates()?;
        self.validate_history()?;
        Ok(())
    }

    fn validate_tasks(&self) -> Result<()> {
        let mut ids: HashSet<&str> = HashSet::new();
        for task in &self.tasks {
            if !ids.insert(task.id.as_str()) {
                return Err(Error::StateInvalid(format!(
                    "duplicate task id '{}'",
                    task.id
                )));
            }
        }

        for task in &self.tasks {
            if let Some(parent_id) = task.parent_id.as_deref() {
                if !ids.contains(parent_id) {
                    return Err(Error::StateInvalid(format!(
                        "task '{}' references missing parent '{}'",
                        task.id, parent_id
                    )));
                }
            }
            if task.status == crate::task::TaskStatus::Blocked
                && task
                    .blocked_reason
                    .as_deref()
                    .map(str::trim)
                    .unwrap_or("")
                    .is_empty()
            {
                return Err(Error::StateInvalid(format!(
                    "blocked task '{}' has no blocked_reason",
                    task.id
                )));
            }
        }

        // parent chains must terminate without revisiting a task
        for task in &self.tasks {
            let mut visited: HashSet<&str> = HashSet::new();
            visited.insert(task.id.as_str());
            let mut current = task.parent_id.as_deref();
            while let Some(parent_id) = current {
                if !visited.insert(parent_id) {
                    return Err(Error::StateInvalid(format!(
                        "parent cycle involving task '{parent_id}'"
                    )));
                }
                current = self.task(parent_id).and_then(|p| p.parent_id.as_deref());
            }
        }

        Ok(())
    }

    fn validate_dependencies(&self) -> Result<()> {
        let mut seen: HashSet<(&str, &str, &str)> = HashSet::new();
        for dep in &self.dependencies {
            if dep.task_id == dep.depends_on_id {
                return Err(Error::StateInvalid(format!(
                    "task '{}' depends on itself",
                    dep.task_id
                )));
            }
            if self.task(&dep.task_id).is_none() {
                return Err(Error::StateInvalid(format!(
                    "dependency references missing task '{}'",
                    dep.task_id
                )));
            }
            if self.task(&dep.depends_on_id).is_none() {
                return Err(Error::StateInvalid(format!(
                    "dependency references missing task '{}'",
                    dep.depends_on_id
                )));
            }
            if !seen.insert((
                dep.task_id.as_str(),
                dep.depends_on_id.as_str(),
                dep.dep_type.as_str(),
            )) {
                return Err(Error::StateInvalid(format!(
                    "duplicate dependency {} -> {} ({})",
                    dep.task_id,
                    dep.depends_on_id,
                    dep.dep_type.as_str()
                )));
            }
        }

        // Kahn's algorithm over gating edges only
        let mut indegree: HashMap<&str, usize> = HashMap::new();
        let mut adjacency: HashMap<&str, Vec<&str>> = HashMap::new();
        for dep in self.dependencies.iter().filter(|d| d.dep_type.is_gating()) {
            adjacency
                .entry(dep.depends_on_id.as_str())
                .or_default()
                .push(dep.task_id.as_str());
            *indegree.entry(dep.task_id.as_str()).or_insert(0) += 1;
            indegree.entry(dep.depends_on_id.as_str()).or_insert(0);
        }
        let mut queue: VecDeque<&str> = indegree
            .iter()
            .filter(|(_, degree)| **degree == 0)
            .map(|(id, _)| *id)
            .collect();
        let mut processed = 0usize;
        while let Some(node) = queue.pop_front() {
            processed += 1;
            for next in adjacency.get(node).into_iter().flatten() {
                if let Some(degree) = indegree.get_mut(next) {
                    *degree -= 1;
                    if *degree == 0 {
                        queue.push_back(next);
                    }
                }
            }
        }
        if processed != indegree.len() {
            return Err(Error::StateInvalid(
                "cycle among blocking dependencies".to_string(),
            ));
        }

        Ok(())
    }

    fn validate_assignments(&self) -> Result<()> {
        let mut ids: HashSet<&str> = HashSet::new();
        let mut primary_for: HashSet<&str> = HashSet::new();
        for assignment in &self.assignments {
            if !ids.insert(assignment.id.as_str()) {
                return Err(Error::StateInvalid(format!(
                    "duplicate assignment id '{}'",
                    assignment.id
                )));
            }
            if self.task(&assignment.task_id).is_none() {
                return Err(Error::StateInvalid(format!(
                    "assignment references missing task '{}'",
                    assignment.task_id
                )));
            }
            if assignment.is_primary && !primary_for.insert(assignment.task_id.as_str()) {
                return Err(Error::StateInvalid(format!(
                    "task '{}' has more than one primary assignment",
                    assignment.task_id
                )));
            }
        }
        Ok(())
    }

    fn validate_templates(&self) -> Result<()> {
        let mut ids: HashSet<&str> = HashSet::new();
        for template in &self.templates {
            if !ids.insert(template.id.as_str()) {
                return Err(Error::StateInvalid(format!(
                    "duplicate template id '{}'",
                    template.id
                )));
            }
        }
        for template in &self.templates {
            if let Some(previous) = template.previous_version_id.as_deref() {
                if !ids.contains(previous) {
                    return Err(Error::StateInvalid(format!(
                        "template '{}' references missing previous version '{}'",
                        template.id, previous
                    )));
                }
            }
        }
        Ok(())
    }

    fn validate_history(&self) -> Result<()> {
        for record in &self.history {
            if self.task(&record.task_id).is_none() {
                return Err(Error::StateInvalid(format!(
                    "history record '{}' references missing task '{}'",
                    record.id, record.task_id
                )));
            }
        }
        Ok(())
    }
}

fn ambiguous(kind: &str, input: &str, candidates: &[String]) -> Error {
    Error::InvalidArgument(format!(
        "ambiguous {kind} id '{input}': matches {}",
        candidates.join(", ")
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dependency::DependencyType;
    use crate::task::{TaskPriority, TaskStatus};
    use std::collections::BTreeMap;

    fn task(id: &str) -> Task {
        let now = Utc::now();
        Task {
            id: id.to_string(),
            title: id.to_string(),
            description: None,
            task_type: None,
            status: TaskStatus::Pending,
            priority: TaskPriority::Medium,
            parent_id: None,
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

    fn edge(task_id: &str, depends_on: &str, dep_type: DependencyType) -> Dependency {
        Dependency::new(task_id, depends_on, dep_type, "tester", Utc::now())
    }

    #[test]
    fn resolve_accepts_full_id_and_suffix() {
        let mut state = State::new();
        state.tasks.push(task("task-01hx4qs8"));
        state.tasks.push(task("task-01hx4r77"));

        assert_eq!(state.resolve_task_id("task-01hx4qs8").unwrap(), "task-01hx4qs8");
        assert_eq!(state.resolve_task_id("01hx4r77").unwrap(), "task-01hx4r77");
        assert!(matches!(
            state.resolve_task_id("01hx4"),
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(
            state.resolve_task_id("01hx4q"),
            Ok(id) if id == "task-01hx4qs8"
        ));
        assert!(matches!(
            state.resolve_task_id("nothere"),
            Err(Error::TaskNotFound(_))
        ));
        assert!(matches!(
            state.resolve_task_id("  "),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn resolve_skips_deleted_unless_asked() {
        let mut state = State::new();
        let mut gone = task("task-01hx4qs8");
        gone.deleted_at = Some(Utc::now());
        state.tasks.push(gone);

        assert!(matches!(
            state.resolve_task_id("01hx4qs8"),
            Err(Error::TaskNotFound(_))
        ));
        assert_eq!(
            state.resolve_task_id_any("01hx4qs8").unwrap(),
            "task-01hx4qs8"
        );
        assert!(matches!(
            state.get_live_task("task-01hx4qs8"),
            Err(Error::TaskNotFound(_))
        ));
        assert!(state.get_task("task-01hx4qs8").is_ok());
    }

    #[test]
    fn validate_accepts_a_sane_document() {
        let mut state = State::new();
        let mut child = task("task-child1");
        child.parent_id = Some("task-parent".to_string());
        state.tasks.push(task("task-parent"));
        state.tasks.push(child);
        state
            .dependencies
            .push(edge("task-child1", "task-parent", DependencyType::Blocks));
        assert!(state.validate().is_ok());
    }

    #[test]
    fn validate_rejects_duplicate_task_ids() {
        let mut state = State::new();
        state.tasks.push(task("task-a"));
        state.tasks.push(task("task-a"));
        assert!(matches!(state.validate(), Err(Error::StateInvalid(_))));
    }

    #[test]
    fn validate_rejects_missing_parent_and_parent_cycles() {
        let mut state = State::new();
        let mut orphan = task("task-a");
        orphan.parent_id = Some("task-ghost".to_string());
        state.tasks.push(orphan);
        assert!(matches!(state.validate(), Err(Error::StateInvalid(_))));

        let mut state = State::new();
        let mut a = task("task-a");
        let mut b = task("task-b");
        a.parent_id = Some("task-b".to_string());
        b.parent_id = Some("task-a".to_string());
        state.tasks.push(a);
        state.tasks.push(b);
        assert!(matches!(state.validate(), Err(Error::StateInvalid(_))));
    }

    #[test]
    fn validate_rejects_bad_dependencies() {
        let mut state = State::new();
        state.tasks.push(task("task-a"));
        state
            .dependencies
            .push(edge("task-a", "task-ghost", DependencyType::Blocks));
        assert!(matches!(state.validate(), Err(Error::StateInvalid(_))));

        let mut state = State::new();
        state.tasks.push(task("task-a"));
        state.tasks.push(task("task-b"));
        state
            .dependencies
            .push(edge("task-a", "task-b", DependencyType::Blocks));
        state
            .dependencies
            .push(edge("task-a", "task-b", DependencyType::Blocks));
        assert!(matches!(state.validate(), Err(Error::StateInvalid(_))));

        let mut state = State::new();
        state.tasks.push(task("task-a"));
        state.tasks.push(task("task-b"));
        state
            .dependencies
            .push(edge("task-a", "task-b", DependencyType::Blocks));
        state
            .dependencies
            .push(edge("task-b", "task-a", DependencyType::Blocks));
        assert!(matches!(state.validate(), Err(Error::StateInvalid(_))));

        // a related back-edge does not make the gating graph cyclic
        let mut state = State::new();
        state.tasks.push(task("task-a"));
        state.tasks.push(task("task-b"));
        state
            .dependencies
            .push(edge("task-a", "task-b", DependencyType::Blocks));
        state
            .dependencies
            .push(edge("task-b", "task-a", DependencyType::Related));
        assert!(state.validate().is_ok());
    }

    #[test]
    fn validate_rejects_two_primaries_for_one_task() {
        let mut state = State::new();
        state.tasks.push(task("task-a"));
        let now = Utc::now();
        for (id, user) in [("as-1", "kai"), ("as-2", "ravi")] {
            state.assignments.push(Assignment {
                id: id.to_string(),
                task_id: "task-a".to_string(),
                user: user.to_string(),
                assigned_by: "tester".to_string(),
                role: "assignee".to_string(),
                is_primary: true,
                expires_at: None,
                assigned_at: now,
            });
        }
        assert!(matches!(state.validate(), Err(Error::StateInvalid(_))));
    }

    #[test]
    fn validate_rejects_blocked_without_reason() {
        let mut state = State::new();
        let mut stuck = task("task-a");
        stuck.status = TaskStatus::Blocked;
        stuck.blocked_reason = Some("  ".to_string());
        state.tasks.push(stuck);
        assert!(matches!(state.validate(), Err(Error::StateInvalid(_))));
    }
}
