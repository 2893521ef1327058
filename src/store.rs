//! The work graph facade
//!
//! `WorkGraph` is the operation surface callers use: task CRUD,
//! hierarchy, dependencies, status transitions, assignments, templates
//! and history, all over one state document. Every mutating operation
//! takes an explicit actor, runs inside a single
//! [`Storage::update_state`] transaction, and appends its history
//! records in that same transaction, so a mutation and its audit trail
//! commit or vanish together.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::Utc;
use serde::Serialize;

use crate::assignment::{self, Assignment, AssignmentEntry};
use crate::config::Config;
use crate::dependency::{self, Dependency, DependencyType};
use crate::error::{Error, Result};
use crate::hierarchy;
use crate::history::{self, HistoryAction, HistoryRecord};
use crate::state::State;
use crate::status;
use crate::storage::Storage;
use crate::task::{self, NewTask, Task, TaskPatch, TaskPriority, TaskStatus};
use crate::template::{self, InstantiateOptions, InstantiateResult, Template, TemplateDraft};

const TEMPLATE_ID_PREFIX: &str = "tpl";

/// Filters for `list_tasks`. All present filters must match.
#[derive(Debug, Clone, Default)]
pub struct TaskFilter {
    pub status: Option<TaskStatus>,
    pub assignee: Option<String>,
    pub task_type: Option<String>,
    pub tag: Option<String>,
    pub include_deleted: bool,
}

/// A task with its relations resolved, as returned by `get_task`
#[derive(Debug, Clone, Serialize)]
pub struct TaskView {
    #[serde(flatten)]
    pub task: Task,
    pub display_status: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub ancestors: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<Dependency>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub dependents: Vec<Dependency>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub assignments: Vec<Assignment>,
}

/// Facade over one workspace's state document
#[derive(Debug, Clone)]
pub struct WorkGraph {
    storage: Storage,
    config: Config,
}

impl WorkGraph {
    /// Initialize `root` as a trak workspace and open it.
    ///
    /// The boolean is `true` when a fresh state file was created.
    pub fn init(root: &Path) -> Result<(Self, bool)> {
        let config = Config::load_from_root(root)?;
        let storage = Storage::new(root.to_path_buf(), config.store.lock_timeout_ms);
        let created = storage.init()?;
        Ok((Self { storage, config }, created))
    }

    /// Open an already initialized workspace at `root`.
    pub fn open(root: &Path) -> Result<Self> {
        let config = Config::load_from_root(root)?;
        let storage = Storage::new(root.to_path_buf(), config.store.lock_timeout_ms);
        if !storage.is_initialized() {
            return Err(Error::WorkspaceNotInitialized(root.to_path_buf()));
        }
        Ok(Self { storage, config })
    }

    pub fn root(&self) -> &Path {
        self.storage.root()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    fn default_priority(&self) -> TaskPriority {
        self.config.tasks.default_priority.parse().unwrap_or_default()
    }

    // =========================================================================
    // Tasks
    // =========================================================================

    pub fn create_task(&self, new: NewTask, actor: &str) -> Result<Task> {
        let now = Utc::now();
        let title = new.title.trim().to_string();
        if title.is_empty() {
            return Err(Error::InvalidArgument("task title cannot be empty".to_string()));
        }
        let priority = new.priority.unwrap_or_else(|| self.default_priority());
        let prefix = self.config.tasks.id_prefix.clone();
        let min_len = self.config.tasks.id_min_len;
        let max_depth = self.config.hierarchy.max_depth;

        self.storage.update_state(move |state| {
            let parent_id = match new.parent_id.as_deref() {
                Some(input) => Some(state.resolve_task_id(input)?),
                None => None,
            };
            let id = task::generate_id(&prefix, min_len, state.task_ids());
            if let Some(parent) = parent_id.as_deref() {
                hierarchy::validate_new_parent(state, &id, parent, max_depth)?;
            }

            let created = Task {
                id: id.clone(),
                title: title.clone(),
                description: new.description,
                task_type: new.task_type,
                status: TaskStatus::Pending,
                priority,
                parent_id,
                owner: new.owner,
                estimated_hours: new.estimated_hours,
                actual_hours: None,
                due_at: new.due_at,
                started_at: None,
                completed_at: None,
                blocked_reason: None,
                tags: new.tags,
                metadata: new.metadata,
                completion: 0,
                created_at: now,
                updated_at: now,
                created_by: actor.to_string(),
                updated_by: actor.to_string(),
                deleted_at: None,
            };
            state.tasks.push(created.clone());
            state.history.push(HistoryRecord::new(
                &id,
                actor,
                HistoryAction::Created,
                format!("created '{title}'"),
                now,
            ));
            Ok(created)
        })
    }

    /// Task with relations, soft-deleted tasks included for inspection.
    pub fn get_task(&self, id: &str) -> Result<TaskView> {
        let state = self.storage.read_state()?;
        let now = Utc::now();
        let task_id = state.resolve_task_id_any(id)?;
        let task = state.get_task(&task_id)?.clone();

        let ancestors = hierarchy::ancestors(&state, &task_id);
        let children: Vec<String> = state
            .live_tasks()
            .filter(|candidate| candidate.parent_id.as_deref() == Some(task_id.as_str()))
            .map(|candidate| candidate.id.clone())
            .collect();
        let dependencies: Vec<Dependency> = state
            .dependencies
            .iter()
            .filter(|edge| edge.task_id == task_id)
            .cloned()
            .collect();
        let dependents: Vec<Dependency> = state
            .dependencies
            .iter()
            .filter(|edge| edge.depends_on_id == task_id)
            .cloned()
            .collect();
        let assignments: Vec<Assignment> = assignment::assignments_for(&state, &task_id)
            .into_iter()
            .cloned()
            .collect();

        Ok(TaskView {
            display_status: task.display_status(now).to_string(),
            task,
            ancestors,
            children,
            dependencies,
            dependents,
            assignments,
        })
    }

    pub fn update_task(&self, id: &str, patch: TaskPatch, actor: &str) -> Result<Task> {
        if patch.is_empty() {
            return Err(Error::InvalidArgument("nothing to update".to_string()));
        }
        let now = Utc::now();

        self.storage.update_state(move |state| {
            let task_id = state.resolve_task_id(id)?;
            let task = state.get_live_task_mut(&task_id)?;
            let changes = patch.apply(task);
            if changes.is_empty() {
                return Err(Error::InvalidArgument(
                    "update matches the current values".to_string(),
                ));
            }
            task.updated_at = now;
            task.updated_by = actor.to_string();
            let snapshot = task.clone();

            for change in changes {
                state.history.push(
                    HistoryRecord::new(
                        &task_id,
                        actor,
                        HistoryAction::Updated,
                        format!("changed {}", change.field),
                        now,
                    )
                    .with_field(change.field, change.old, change.new),
                );
            }
            Ok(snapshot)
        })
    }

    /// Soft-delete: the task keeps its history and its edges keep
    /// gating until removed explicitly.
    pub fn delete_task(&self, id: &str, actor: &str) -> Result<Task> {
        let now = Utc::now();
        self.storage.update_state(move |state| {
            let task_id = state.resolve_task_id(id)?;
            let task = state.get_live_task_mut(&task_id)?;
            task.deleted_at = Some(now);
            task.updated_at = now;
            task.updated_by = actor.to_string();
            let snapshot = task.clone();
            state.history.push(HistoryRecord::new(
                &task_id,
                actor,
                HistoryAction::Deleted,
                "task deleted",
                now,
            ));
            Ok(snapshot)
        })
    }

    pub fn list_tasks(&self, filter: &TaskFilter) -> Result<Vec<Task>> {
        let state = self.storage.read_state()?;
        let now = Utc::now();
        let mut tasks: Vec<Task> = state
            .tasks
            .iter()
            .filter(|task| {
                if task.is_deleted() && !filter.include_deleted {
                    return false;
                }
                if let Some(status) = filter.status {
                    if task.status != status {
                        return false;
                    }
                }
                if let Some(task_type) = filter.task_type.as_deref() {
                    if task.task_type.as_deref() != Some(task_type) {
                        return false;
                    }
                }
                if let Some(tag) = filter.tag.as_deref() {
                    if !task.tags.iter().any(|candidate| candidate == tag) {
                        return false;
                    }
                }
                if let Some(user) = filter.assignee.as_deref() {
                    let assigned = state.assignments.iter().any(|assignment| {
                        assignment.task_id == task.id
                            && assignment.user == user
                            && assignment.is_active(now)
                    });
                    if !assigned {
                        return false;
                    }
                }
                true
            })
            .cloned()
            .collect();
        task::sort_tasks(&mut tasks);
        Ok(tasks)
    }

    // =========================================================================
    // Hierarchy
    // =========================================================================

    /// Set or clear the parent. A no-op (same parent again) is rejected
    /// so the audit trail only carries real changes.
    pub fn set_parent(&self, id: &str, parent: Option<&str>, actor: &str) -> Result<Task> {
        let now = Utc::now();
        let max_depth = self.config.hierarchy.max_depth;

        self.storage.update_state(move |state| {
            let task_id = state.resolve_task_id(id)?;
            let new_parent = match parent {
                Some(input) => Some(state.resolve_task_id(input)?),
                None => None,
            };

            let current = state.get_live_task(&task_id)?.parent_id.clone();
            if current.as_deref() == new_parent.as_deref() {
                return Err(Error::InvalidArgument(match new_parent.as_deref() {
                    Some(parent_id) => format!("parent of {task_id} is already {parent_id}"),
                    None => format!("{task_id} has no parent to clear"),
                }));
            }
            if let Some(parent_id) = new_parent.as_deref() {
                hierarchy::validate_new_parent(state, &task_id, parent_id, max_depth)?;
            }

            let task = state.get_live_task_mut(&task_id)?;
            let old = task.parent_id.take();
            task.parent_id = new_parent.clone();
            task.updated_at = now;
            task.updated_by = actor.to_string();
            let snapshot = task.clone();

            let description = match new_parent.as_deref() {
                Some(parent_id) => format!("parent set to {parent_id}"),
                None => "parent cleared".to_string(),
            };
            state.history.push(
                HistoryRecord::new(&task_id, actor, HistoryAction::Updated, description, now)
                    .with_field("parent_task_id", old, new_parent),
            );
            Ok(snapshot)
        })
    }

    /// Ancestor chain, immediate parent first.
    pub fn ancestors(&self, id: &str) -> Result<Vec<Task>> {
        let state = self.storage.read_state()?;
        let task_id = state.resolve_task_id_any(id)?;
        Ok(hierarchy::ancestors(&state, &task_id)
            .iter()
            .filter_map(|ancestor_id| state.task(ancestor_id))
            .cloned()
            .collect())
    }

    /// Full recursive descendant set.
    pub fn descendants(&self, id: &str) -> Result<Vec<Task>> {
        let state = self.storage.read_state()?;
        let task_id = state.resolve_task_id_any(id)?;
        Ok(hierarchy::descendants(&state, &task_id)
            .iter()
            .filter_map(|descendant_id| state.task(descendant_id))
            .cloned()
            .collect())
    }

    // =========================================================================
    // Dependencies
    // =========================================================================

    pub fn add_dependency(
        &self,
        id: &str,
        depends_on: &str,
        dep_type: DependencyType,
        actor: &str,
    ) -> Result<Dependency> {
        let now = Utc::now();
        self.storage.update_state(move |state| {
            let task_id = state.resolve_task_id(id)?;
            let depends_on_id = state.resolve_task_id(depends_on)?;
            dependency::validate_new_edge(state, &task_id, &depends_on_id, dep_type)?;

            let edge = Dependency::new(&task_id, &depends_on_id, dep_type, actor, now);
            state.dependencies.push(edge.clone());
            touch(state, &task_id, actor, now);
            state.history.push(
                HistoryRecord::new(
                    &task_id,
                    actor,
                    HistoryAction::Updated,
                    format!("added {} dependency on {depends_on_id}", edge.dep_type),
                    now,
                )
                .with_field("dependencies", None, Some(depends_on_id.clone())),
            );
            Ok(edge)
        })
    }

    /// Remove one edge. `dep_type` disambiguates when the pair is
    /// linked under more than one type. Deleted endpoints are allowed
    /// so stale gating edges can always be cleaned up.
    pub fn remove_dependency(
        &self,
        id: &str,
        depends_on: &str,
        dep_type: Option<DependencyType>,
        actor: &str,
    ) -> Result<Dependency> {
        let now = Utc::now();
        self.storage.update_state(move |state| {
            let task_id = state.resolve_task_id_any(id)?;
            let depends_on_id = state.resolve_task_id_any(depends_on)?;

            let matching: Vec<usize> = state
                .dependencies
                .iter()
                .enumerate()
                .filter(|(_, edge)| {
                    edge.task_id == task_id
                        && edge.depends_on_id == depends_on_id
                        && dep_type.map_or(true, |wanted| edge.dep_type == wanted)
                })
                .map(|(index, _)| index)
                .collect();

            match matching.len() {
                0 => Err(Error::InvalidArgument(format!(
                    "no dependency {task_id} -> {depends_on_id}"
                ))),
                1 => {
                    let edge = state.dependencies.remove(matching[0]);
                    touch(state, &task_id, actor, now);
                    state.history.push(
                        HistoryRecord::new(
                            &task_id,
                            actor,
                            HistoryAction::Updated,
                            format!("removed {} dependency on {depends_on_id}", edge.dep_type),
                            now,
                        )
                        .with_field("dependencies", Some(depends_on_id.clone()), None),
                    );
                    Ok(edge)
                }
                _ => Err(Error::InvalidArgument(format!(
                    "{task_id} and {depends_on_id} are linked under multiple types; pass the type"
                ))),
            }
        })
    }

    /// Deduplicated transitive prerequisite set over all edge types.
    pub fn dependency_chain(&self, id: &str) -> Result<Vec<Task>> {
        let state = self.storage.read_state()?;
        let task_id = state.resolve_task_id_any(id)?;
        Ok(dependency::dependency_chain(&state.dependencies, &task_id)
            .iter()
            .filter_map(|chain_id| state.task(chain_id))
            .cloned()
            .collect())
    }

    /// Direct gating prerequisites that are not completed/cancelled.
    pub fn incomplete_dependencies(&self, id: &str) -> Result<Vec<Task>> {
        let state = self.storage.read_state()?;
        let task_id = state.resolve_task_id_any(id)?;
        Ok(dependency::incomplete_dependencies(&state, &task_id)
            .iter()
            .filter_map(|blocking_id| state.task(blocking_id))
            .cloned()
            .collect())
    }

    pub fn has_incomplete_dependencies(&self, id: &str) -> Result<bool> {
        let state = self.storage.read_state()?;
        let task_id = state.resolve_task_id_any(id)?;
        Ok(dependency::has_incomplete_dependencies(&state, &task_id))
    }

    // =========================================================================
    // Status
    // =========================================================================

    /// Attempt a status transition. `reason` is only meaningful for
    /// transitions to blocked, where it sets the blocked reason first.
    pub fn transition(
        &self,
        id: &str,
        new_status: TaskStatus,
        reason: Option<&str>,
        actor: &str,
    ) -> Result<Task> {
        let now = Utc::now();
        self.storage.update_state(move |state| {
            let task_id = state.resolve_task_id(id)?;

            if let Some(reason) = reason {
                if new_status != TaskStatus::Blocked {
                    return Err(Error::InvalidArgument(
                        "a reason only applies when transitioning to blocked".to_string(),
                    ));
                }
                let trimmed = reason.trim();
                if trimmed.is_empty() {
                    return Err(Error::InvalidArgument("reason cannot be empty".to_string()));
                }
                let task = state.get_live_task_mut(&task_id)?;
                task.blocked_reason = Some(trimmed.to_string());
            }

            let task = state.get_live_task(&task_id)?;
            let old_status = task.status;
            status::check_transition(state, task, new_status)?;

            let task = state.get_live_task_mut(&task_id)?;
            status::apply_transition(task, new_status, now);
            task.updated_at = now;
            task.updated_by = actor.to_string();
            let snapshot = task.clone();

            state.history.push(
                HistoryRecord::new(
                    &task_id,
                    actor,
                    HistoryAction::StatusChanged,
                    format!("status {old_status} -> {new_status}"),
                    now,
                )
                .with_field(
                    "status",
                    Some(old_status.as_str().to_string()),
                    Some(new_status.as_str().to_string()),
                ),
            );
            Ok(snapshot)
        })
    }

    // =========================================================================
    // Assignments
    // =========================================================================

    /// Bulk assign. With `replace_existing` the current set is dropped
    /// first; otherwise the entries are appended, and a new primary
    /// demotes the stored one. The first entry claiming primary wins
    /// within one call.
    pub fn assign_users(
        &self,
        id: &str,
        mut entries: Vec<AssignmentEntry>,
        replace_existing: bool,
        actor: &str,
    ) -> Result<Vec<Assignment>> {
        if entries.is_empty() {
            return Err(Error::InvalidArgument("no users to assign".to_string()));
        }
        if entries.iter().any(|entry| entry.user.trim().is_empty()) {
            return Err(Error::InvalidArgument("user cannot be empty".to_string()));
        }
        let now = Utc::now();

        self.storage.update_state(move |state| {
            let task_id = state.resolve_task_id(id)?;
            state.get_live_task(&task_id)?;

            let downgraded = assignment::enforce_single_primary(&task_id, &mut entries);
            if replace_existing {
                state
                    .assignments
                    .retain(|assignment| assignment.task_id != task_id);
            } else if entries.iter().any(|entry| entry.primary) {
                for existing in state
                    .assignments
                    .iter_mut()
                    .filter(|assignment| assignment.task_id == task_id)
                {
                    existing.is_primary = false;
                }
            }

            let built = assignment::build_assignments(&task_id, entries, actor, now);
            state.assignments.extend(built.iter().cloned());
            touch(state, &task_id, actor, now);

            let users: Vec<&str> = built.iter().map(|a| a.user.as_str()).collect();
            let mut description = format!("assigned {}", users.join(", "));
            if downgraded > 0 {
                description.push_str(&format!(
                    " ({downgraded} extra primary claim(s) downgraded)"
                ));
            }
            state.history.push(
                HistoryRecord::new(&task_id, actor, HistoryAction::Updated, description, now)
                    .with_field("assignees", None, Some(users.join(", "))),
            );
            Ok(built)
        })
    }

    /// Remove one assignment by id (any unique prefix). Never promotes
    /// another assignee to primary.
    pub fn remove_assignment(
        &self,
        id: &str,
        assignment_id: &str,
        actor: &str,
    ) -> Result<Assignment> {
        let now = Utc::now();
        self.storage.update_state(move |state| {
            let task_id = state.resolve_task_id_any(id)?;
            let wanted = assignment_id.trim();
            if wanted.is_empty() {
                return Err(Error::InvalidArgument(
                    "assignment id cannot be empty".to_string(),
                ));
            }

            let matching: Vec<usize> = state
                .assignments
                .iter()
                .enumerate()
                .filter(|(_, assignment)| {
                    assignment.task_id == task_id && assignment.id.starts_with(wanted)
                })
                .map(|(index, _)| index)
                .collect();

            match matching.len() {
                0 => Err(Error::AssignmentNotFound(wanted.to_string())),
                1 => {
                    let removed = state.assignments.remove(matching[0]);
                    touch(state, &task_id, actor, now);
                    state.history.push(
                        HistoryRecord::new(
                            &task_id,
                            actor,
                            HistoryAction::Updated,
                            format!("removed assignment for {}", removed.user),
                            now,
                        )
                        .with_field("assignees", Some(removed.user.clone()), None),
                    );
                    Ok(removed)
                }
                _ => Err(Error::InvalidArgument(format!(
                    "ambiguous assignment id '{wanted}'"
                ))),
            }
        })
    }

    /// Assignments in insertion order.
    pub fn assignments(&self, id: &str) -> Result<Vec<Assignment>> {
        let state = self.storage.read_state()?;
        let task_id = state.resolve_task_id_any(id)?;
        Ok(assignment::assignments_for(&state, &task_id)
            .into_iter()
            .cloned()
            .collect())
    }

    /// Own primary/first active assignee, else the nearest ancestor's.
    pub fn effective_assignee(&self, id: &str) -> Result<Option<Assignment>> {
        let state = self.storage.read_state()?;
        let now = Utc::now();
        let task_id = state.resolve_task_id_any(id)?;
        Ok(assignment::effective_assignee(&state, &task_id, now).cloned())
    }

    // =========================================================================
    // Templates
    // =========================================================================

    pub fn create_template(&self, draft: TemplateDraft, actor: &str) -> Result<Template> {
        draft.validate()?;
        let now = Utc::now();
        let min_len = self.config.tasks.id_min_len;

        self.storage.update_state(move |state| {
            let id = task::generate_id(TEMPLATE_ID_PREFIX, min_len, state.template_ids());
            let created = Template::from_draft(id, draft, 1, None, actor, now);
            state.templates.push(created.clone());
            Ok(created)
        })
    }

    /// Store a successor version: the current version is deactivated
    /// and the new one points back at it. Only the active version can
    /// be versioned, which keeps the chain linear.
    pub fn new_template_version(
        &self,
        id: &str,
        draft: TemplateDraft,
        actor: &str,
    ) -> Result<Template> {
        draft.validate()?;
        let now = Utc::now();
        let min_len = self.config.tasks.id_min_len;

        self.storage.update_state(move |state| {
            let template_id = state.resolve_template_id(id)?;
            let current = state.get_template(&template_id)?.clone();
            if !current.active {
                return Err(Error::InvalidArgument(format!(
                    "template {template_id} is not the active version; create new versions from the active one"
                )));
            }

            let successor_id = task::generate_id(TEMPLATE_ID_PREFIX, min_len, state.template_ids());
            let successor = Template::from_draft(
                successor_id,
                draft,
                current.version + 1,
                Some(template_id.clone()),
                actor,
                now,
            );
            if let Some(previous) = state.template_mut(&template_id) {
                previous.active = false;
            }
            state.templates.push(successor.clone());
            Ok(successor)
        })
    }

    pub fn get_template(&self, id: &str) -> Result<Template> {
        let state = self.storage.read_state()?;
        let template_id = state.resolve_template_id(id)?;
        Ok(state.get_template(&template_id)?.clone())
    }

    pub fn list_templates(&self) -> Result<Vec<Template>> {
        let state = self.storage.read_state()?;
        Ok(state.templates.clone())
    }

    /// All versions in the chain containing `id`, newest first.
    pub fn template_versions(&self, id: &str) -> Result<Vec<Template>> {
        let state = self.storage.read_state()?;
        let template_id = state.resolve_template_id(id)?;
        Ok(template::version_chain(&state, &template_id)
            .into_iter()
            .cloned()
            .collect())
    }

    /// Expand a template into real tasks and edges, all-or-nothing.
    pub fn instantiate_template(
        &self,
        id: &str,
        variables: BTreeMap<String, String>,
        opts: InstantiateOptions,
        actor: &str,
    ) -> Result<InstantiateResult> {
        let now = Utc::now();
        let prefix = self.config.tasks.id_prefix.clone();
        let min_len = self.config.tasks.id_min_len;
        let max_depth = self.config.hierarchy.max_depth;
        let fallback_priority = self.default_priority();

        self.storage.update_state(move |state| {
            let template_id = state.resolve_template_id(id)?;
            let template = state.get_template(&template_id)?.clone();
            if !template.active {
                return Err(Error::InactiveTemplate(template_id));
            }
            let missing = template.missing_required(&variables);
            if !missing.is_empty() {
                return Err(Error::MissingVariable {
                    template: template_id,
                    names: missing,
                });
            }
            let attach_parent = match opts.parent_task_id.as_deref() {
                Some(input) => Some(state.resolve_task_id(input)?),
                None => None,
            };

            // create one task per blueprint, in declaration order
            let mut id_map: BTreeMap<String, String> = BTreeMap::new();
            let mut created_ids: Vec<String> = Vec::new();
            for blueprint in &template.blueprints {
                let rendered = template::render_blueprint(blueprint, &variables);
                if id_map.contains_key(&rendered.local_id) {
                    return Err(Error::InvalidArgument(format!(
                        "template {template_id} declares blueprint '{}' twice",
                        rendered.local_id
                    )));
                }
                let task_id = task::generate_id(&prefix, min_len, state.task_ids());
                let title = match opts.title_prefix.as_deref() {
                    Some(text) => format!("{text}{}", rendered.title),
                    None => rendered.title,
                };
                state.tasks.push(Task {
                    id: task_id.clone(),
                    title,
                    description: rendered.description,
                    task_type: rendered.task_type,
                    status: TaskStatus::Pending,
                    priority: rendered.priority.unwrap_or(fallback_priority),
                    parent_id: None,
                    owner: None,
                    estimated_hours: rendered.estimated_hours,
                    actual_hours: None,
                    due_at: None,
                    started_at: None,
                    completed_at: None,
                    blocked_reason: None,
                    tags: rendered.tags,
                    metadata: rendered.metadata,
                    completion: 0,
                    created_at: now,
                    updated_at: now,
                    created_by: actor.to_string(),
                    updated_by: actor.to_string(),
                    deleted_at: None,
                });
                id_map.insert(rendered.local_id, task_id.clone());
                created_ids.push(task_id);
            }

            // wire hierarchy: in-template parents through the map, the
            // remaining roots under the requested parent
            for (index, blueprint) in template.blueprints.iter().enumerate() {
                let task_id = created_ids[index].clone();
                let parent_id = match blueprint.parent.as_deref().map(str::trim) {
                    Some(local) if !local.is_empty() => {
                        Some(id_map.get(local).cloned().ok_or_else(|| {
                            Error::UnresolvedBlueprintReference(format!(
                                "blueprint '{local}' is not declared in template {template_id}"
                            ))
                        })?)
                    }
                    _ => attach_parent.clone(),
                };
                if let Some(parent) = parent_id {
                    hierarchy::validate_new_parent(state, &task_id, &parent, max_depth)?;
                    if let Some(task) = state.task_mut(&task_id) {
                        task.parent_id = Some(parent);
                    }
                }
            }
            // depths settle only once every parent is wired
            for task_id in &created_ids {
                let depth = hierarchy::depth(state, task_id);
                if depth > max_depth {
                    return Err(Error::DepthExceeded(format!(
                        "{task_id} would sit {depth} levels deep (max {max_depth})"
                    )));
                }
            }

            // dependency declarations resolve through the map only, so
            // created edges can never land on pre-existing tasks
            let mut created_edges: Vec<Dependency> = Vec::new();
            for link in &template.links {
                let from = id_map.get(link.from.trim()).cloned().ok_or_else(|| {
                    Error::UnresolvedBlueprintReference(format!(
                        "blueprint '{}' is not declared in template {template_id}",
                        link.from.trim()
                    ))
                })?;
                let to = id_map.get(link.to.trim()).cloned().ok_or_else(|| {
                    Error::UnresolvedBlueprintReference(format!(
                        "blueprint '{}' is not declared in template {template_id}",
                        link.to.trim()
                    ))
                })?;
                dependency::validate_new_edge(state, &from, &to, link.dep_type)?;
                let edge = Dependency::new(&from, &to, link.dep_type, actor, now);
                state.dependencies.push(edge.clone());
                created_edges.push(edge);
            }

            for task_id in &created_ids {
                state.history.push(HistoryRecord::new(
                    task_id,
                    actor,
                    HistoryAction::Created,
                    format!("created from template {template_id}"),
                    now,
                ));
            }
            for edge in &created_edges {
                state.history.push(
                    HistoryRecord::new(
                        &edge.task_id,
                        actor,
                        HistoryAction::Updated,
                        format!("added {} dependency on {}", edge.dep_type, edge.depends_on_id),
                        now,
                    )
                    .with_field("dependencies", None, Some(edge.depends_on_id.clone())),
                );
            }

            let tasks: Vec<Task> = created_ids
                .iter()
                .filter_map(|task_id| state.task(task_id))
                .cloned()
                .collect();
            Ok(InstantiateResult {
                template_id,
                tasks,
                dependencies: created_edges,
                id_map,
            })
        })
    }

    // =========================================================================
    // History
    // =========================================================================

    /// History of one task, newest first; works for deleted tasks too.
    pub fn history_for(&self, id: &str, limit: Option<usize>) -> Result<Vec<HistoryRecord>> {
        let state = self.storage.read_state()?;
        let task_id = state.resolve_task_id_any(id)?;
        let mut records: Vec<HistoryRecord> = history::records_for(&state, &task_id)
            .into_iter()
            .cloned()
            .collect();
        if let Some(limit) = limit {
            records.truncate(limit);
        }
        Ok(records)
    }
}

fn touch(state: &mut State, task_id: &str, actor: &str, now: chrono::DateTime<Utc>) {
    if let Some(task) = state.task_mut(task_id) {
        task.updated_at = now;
        task.updated_by = actor.to_string();
    }
}
