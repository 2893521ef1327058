//! trak task command implementations.

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::Utc;

use crate::error::{Error, Result};
use crate::events::EventKind;
use crate::output::{emit_success, HumanOutput, OutputOptions};
use crate::store::TaskFilter;
use crate::task::{NewTask, OwnerRef, Task, TaskPatch, TaskPriority, TaskStatus};

pub struct NewOptions {
    pub title: String,
    pub description: Option<String>,
    pub task_type: Option<String>,
    pub priority: Option<String>,
    pub parent: Option<String>,
    pub owner: Option<String>,
    pub estimate: Option<f64>,
    pub due: Option<String>,
    pub tags: Vec<String>,
    pub meta: Vec<String>,
    pub actor: Option<String>,
    pub events: Option<String>,
    pub root: Option<PathBuf>,
    pub json: bool,
    pub quiet: bool,
}

pub struct ShowOptions {
    pub id: String,
    pub root: Option<PathBuf>,
    pub json: bool,
    pub quiet: bool,
}

pub struct UpdateOptions {
    pub id: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub task_type: Option<String>,
    pub priority: Option<String>,
    pub estimate: Option<f64>,
    pub actual: Option<f64>,
    pub due: Option<String>,
    pub clear_due: bool,
    pub blocked_reason: Option<String>,
    pub tags: Vec<String>,
    pub meta: Vec<String>,
    pub completion: Option<u8>,
    pub owner: Option<String>,
    pub clear_owner: bool,
    pub actor: Option<String>,
    pub events: Option<String>,
    pub root: Option<PathBuf>,
    pub json: bool,
    pub quiet: bool,
}

pub struct RmOptions {
    pub id: String,
    pub actor: Option<String>,
    pub events: Option<String>,
    pub root: Option<PathBuf>,
    pub json: bool,
    pub quiet: bool,
}

pub struct ListOptions {
    pub status: Option<String>,
    pub assignee: Option<String>,
    pub task_type: Option<String>,
    pub tag: Option<String>,
    pub all: bool,
    pub root: Option<PathBuf>,
    pub json: bool,
    pub quiet: bool,
}

pub struct ParentSetOptions {
    pub child: String,
    pub parent: String,
    pub actor: Option<String>,
    pub events: Option<String>,
    pub root: Option<PathBuf>,
    pub json: bool,
    pub quiet: bool,
}

pub struct ParentClearOptions {
    pub child: String,
    pub actor: Option<String>,
    pub events: Option<String>,
    pub root: Option<PathBuf>,
    pub json: bool,
    pub quiet: bool,
}

pub struct AncestorsOptions {
    pub id: String,
    pub root: Option<PathBuf>,
    pub json: bool,
    pub quiet: bool,
}

pub struct DescendantsOptions {
    pub id: String,
    pub root: Option<PathBuf>,
    pub json: bool,
    pub quiet: bool,
}

#[derive(serde::Serialize)]
struct TaskListOutput {
    total: usize,
    tasks: Vec<Task>,
}

#[derive(serde::Serialize)]
struct TaskAncestorsOutput {
    task: String,
    total: usize,
    ancestors: Vec<Task>,
}

#[derive(serde::Serialize)]
struct TaskDescendantsOutput {
    task: String,
    total: usize,
    descendants: Vec<Task>,
}

pub fn run_new(options: NewOptions) -> Result<()> {
    let ctx = super::load_ctx(options.root, options.actor)?;
    let (mut event_sink, events_to_stdout) = super::open_event_sink(options.events.as_deref())?;

    let due_at = super::parse_timestamp("due", options.due.as_deref())?;
    let owner = match options.owner.as_deref() {
        Some(raw) => Some(parse_owner(raw)?),
        None => None,
    };
    let priority = match options.priority.as_deref() {
        Some(value) => Some(value.parse::<TaskPriority>()?),
        None => None,
    };
    let metadata = collect_metadata(&options.meta)?;

    let task = ctx.graph.create_task(
        NewTask {
            title: options.title,
            description: options.description,
            task_type: options.task_type,
            priority,
            parent_id: options.parent,
            owner,
            estimated_hours: options.estimate,
            due_at,
            tags: options.tags,
            metadata,
        },
        &ctx.actor,
    )?;

    let event_warning = super::emit_event(&mut event_sink, EventKind::TaskCreated, &ctx.actor, &task);

    let mut human = HumanOutput::new("Task created");
    if let Some(warning) = event_warning {
        human.push_warning(warning);
    }
    human.push_summary("ID", task.id.clone());
    human.push_summary("Title", task.title.clone());
    human.push_summary("Status", task.status.as_str());
    human.push_summary("Priority", task.priority.as_str());
    if let Some(parent) = task.parent_id.as_ref() {
        human.push_summary("Parent", parent.clone());
    }
    if let Some(due) = task.due_at {
        human.push_summary("Due", due.to_rfc3339());
    }

    emit_success(
        OutputOptions {
            json: options.json && !events_to_stdout,
            quiet: options.quiet || events_to_stdout,
        },
        "task new",
        &task,
        Some(&human),
    )
}

pub fn run_show(options: ShowOptions) -> Result<()> {
    let graph = super::open_graph(options.root)?;
    let view = graph.get_task(&options.id)?;

    let mut human = HumanOutput::new(format!("{} {}", view.task.id, view.task.title));
    human.push_summary("Status", view.display_status.clone());
    human.push_summary("Priority", view.task.priority.as_str());
    if let Some(description) = view.task.description.as_ref() {
        human.push_summary("Description", description.clone());
    }
    if let Some(task_type) = view.task.task_type.as_ref() {
        human.push_summary("Type", task_type.clone());
    }
    if let Some(parent) = view.task.parent_id.as_ref() {
        human.push_summary("Parent", parent.clone());
    }
    if let Some(owner) = view.task.owner.as_ref() {
        human.push_summary("Owner", format!("{}:{}", owner.kind, owner.id));
    }
    if let Some(due) = view.task.due_at {
        human.push_summary("Due", due.to_rfc3339());
    }
    if let Some(reason) = view.task.blocked_reason.as_ref() {
        human.push_summary("Blocked reason", reason.clone());
    }
    if !view.task.tags.is_empty() {
        human.push_summary("Tags", view.task.tags.join(", "));
    }
    human.push_summary("Completion", format!("{}%", view.task.completion));
    human.push_summary("Updated", view.task.updated_at.to_rfc3339());
    if view.task.is_deleted() {
        human.push_summary("Deleted", "yes");
    }
    for child in &view.children {
        human.push_detail(format!("child {child}"));
    }
    for dependency in &view.dependencies {
        human.push_detail(format!(
            "depends on {} ({})",
            dependency.depends_on_id, dependency.dep_type
        ));
    }
    for dependent in &view.dependents {
        human.push_detail(format!(
            "required by {} ({})",
            dependent.task_id, dependent.dep_type
        ));
    }
    for assignment in &view.assignments {
        human.push_detail(format!(
            "assigned {} ({}){}",
            assignment.user,
            assignment.role,
            if assignment.is_primary { ", primary" } else { "" }
        ));
    }

    emit_success(
        OutputOptions {
            json: options.json,
            quiet: options.quiet,
        },
        "task show",
        &view,
        Some(&human),
    )
}

pub fn run_update(options: UpdateOptions) -> Result<()> {
    let ctx = super::load_ctx(options.root, options.actor)?;
    let (mut event_sink, events_to_stdout) = super::open_event_sink(options.events.as_deref())?;

    let due_at = super::parse_timestamp("due", options.due.as_deref())?;
    if options.clear_due && due_at.is_some() {
        return Err(Error::InvalidArgument(
            "cannot combine --due with --clear-due".to_string(),
        ));
    }
    let owner = match options.owner.as_deref() {
        Some(raw) => Some(parse_owner(raw)?),
        None => None,
    };
    if options.clear_owner && owner.is_some() {
        return Err(Error::InvalidArgument(
            "cannot combine --owner with --clear-owner".to_string(),
        ));
    }
    let priority = match options.priority.as_deref() {
        Some(value) => Some(value.parse::<TaskPriority>()?),
        None => None,
    };
    let tags = if options.tags.is_empty() {
        None
    } else {
        Some(options.tags)
    };
    let metadata = if options.meta.is_empty() {
        None
    } else {
        Some(collect_metadata(&options.meta)?)
    };

    let patch = TaskPatch {
        title: options.title,
        description: options.description,
        task_type: options.task_type,
        priority,
        estimated_hours: options.estimate,
        actual_hours: options.actual,
        due_at,
        clear_due_at: options.clear_due,
        blocked_reason: options.blocked_reason,
        tags,
        metadata,
        completion: options.completion,
        owner,
        clear_owner: options.clear_owner,
    };

    let task = ctx.graph.update_task(&options.id, patch, &ctx.actor)?;

    let event_warning = super::emit_event(&mut event_sink, EventKind::TaskUpdated, &ctx.actor, &task);

    let mut human = HumanOutput::new("Task updated");
    if let Some(warning) = event_warning {
        human.push_warning(warning);
    }
    human.push_summary("ID", task.id.clone());
    human.push_summary("Title", task.title.clone());
    human.push_summary("Updated", task.updated_at.to_rfc3339());

    emit_success(
        OutputOptions {
            json: options.json && !events_to_stdout,
            quiet: options.quiet || events_to_stdout,
        },
        "task update",
        &task,
        Some(&human),
    )
}

pub fn run_rm(options: RmOptions) -> Result<()> {
    let ctx = super::load_ctx(options.root, options.actor)?;
    let (mut event_sink, events_to_stdout) = super::open_event_sink(options.events.as_deref())?;

    let task = ctx.graph.delete_task(&options.id, &ctx.actor)?;

    let event_warning = super::emit_event(&mut event_sink, EventKind::TaskDeleted, &ctx.actor, &task);

    let mut human = HumanOutput::new("Task deleted");
    if let Some(warning) = event_warning {
        human.push_warning(warning);
    }
    human.push_summary("ID", task.id.clone());
    human.push_summary("Title", task.title.clone());
    human.push_detail("soft delete; the task stays in the state document and its history survives");

    emit_success(
        OutputOptions {
            json: options.json && !events_to_stdout,
            quiet: options.quiet || events_to_stdout,
        },
        "task rm",
        &task,
        Some(&human),
    )
}

pub fn run_list(options: ListOptions) -> Result<()> {
    let graph = super::open_graph(options.root)?;
    let status = match options.status.as_deref() {
        Some(value) => Some(value.parse::<TaskStatus>()?),
        None => None,
    };
    let filter = TaskFilter {
        status,
        assignee: options.assignee,
        task_type: options.task_type,
        tag: options.tag,
        include_deleted: options.all,
    };

    let tasks = graph.list_tasks(&filter)?;
    let now = Utc::now();

    let output = TaskListOutput {
        total: tasks.len(),
        tasks: tasks.clone(),
    };

    let mut human = HumanOutput::new("Tasks");
    human.push_summary("Total", tasks.len().to_string());
    for task in &tasks {
        let mut line = format!(
            "[{}][{}] {} {}",
            task.display_status(now),
            task.priority.as_str(),
            task.id,
            task.title
        );
        if let Some(parent) = task.parent_id.as_ref() {
            line.push_str(&format!(" (parent: {parent})"));
        }
        if !task.tags.is_empty() {
            line.push_str(&format!(" [{}]", task.tags.join(", ")));
        }
        if task.is_deleted() {
            line.push_str(" (deleted)");
        }
        human.push_detail(line);
    }

    emit_success(
        OutputOptions {
            json: options.json,
            quiet: options.quiet,
        },
        "task list",
        &output,
        Some(&human),
    )
}

pub fn run_parent_set(options: ParentSetOptions) -> Result<()> {
    let ctx = super::load_ctx(options.root, options.actor)?;
    let (mut event_sink, events_to_stdout) = super::open_event_sink(options.events.as_deref())?;

    let task = ctx
        .graph
        .set_parent(&options.child, Some(&options.parent), &ctx.actor)?;

    let event_warning =
        super::emit_event(&mut event_sink, EventKind::TaskParentSet, &ctx.actor, &task);

    let mut human = HumanOutput::new("Parent set");
    if let Some(warning) = event_warning {
        human.push_warning(warning);
    }
    human.push_summary("Child", task.id.clone());
    if let Some(parent) = task.parent_id.as_ref() {
        human.push_summary("Parent", parent.clone());
    }

    emit_success(
        OutputOptions {
            json: options.json && !events_to_stdout,
            quiet: options.quiet || events_to_stdout,
        },
        "task parent set",
        &task,
        Some(&human),
    )
}

pub fn run_parent_clear(options: ParentClearOptions) -> Result<()> {
    let ctx = super::load_ctx(options.root, options.actor)?;
    let (mut event_sink, events_to_stdout) = super::open_event_sink(options.events.as_deref())?;

    let task = ctx.graph.set_parent(&options.child, None, &ctx.actor)?;

    let event_warning = super::emit_event(
        &mut event_sink,
        EventKind::TaskParentCleared,
        &ctx.actor,
        &task,
    );

    let mut human = HumanOutput::new("Parent cleared");
    if let Some(warning) = event_warning {
        human.push_warning(warning);
    }
    human.push_summary("Child", task.id.clone());

    emit_success(
        OutputOptions {
            json: options.json && !events_to_stdout,
            quiet: options.quiet || events_to_stdout,
        },
        "task parent clear",
        &task,
        Some(&human),
    )
}

pub fn run_ancestors(options: AncestorsOptions) -> Result<()> {
    let graph = super::open_graph(options.root)?;
    let view = graph.get_task(&options.id)?;
    let ancestors = graph.ancestors(&view.task.id)?;

    let output = TaskAncestorsOutput {
        task: view.task.id.clone(),
        total: ancestors.len(),
        ancestors: ancestors.clone(),
    };

    let mut human = HumanOutput::new(format!("Ancestors of {}", view.task.id));
    human.push_summary("Total", ancestors.len().to_string());
    for ancestor in &ancestors {
        human.push_detail(format!(
            "[{}] {} {}",
            ancestor.status.as_str(),
            ancestor.id,
            ancestor.title
        ));
    }

    emit_success(
        OutputOptions {
            json: options.json,
            quiet: options.quiet,
        },
        "task ancestors",
        &output,
        Some(&human),
    )
}

pub fn run_descendants(options: DescendantsOptions) -> Result<()> {
    let graph = super::open_graph(options.root)?;
    let view = graph.get_task(&options.id)?;
    let descendants = graph.descendants(&view.task.id)?;

    let output = TaskDescendantsOutput {
        task: view.task.id.clone(),
        total: descendants.len(),
        descendants: descendants.clone(),
    };

    let mut human = HumanOutput::new(format!("Descendants of {}", view.task.id));
    human.push_summary("Total", descendants.len().to_string());
    for descendant in &descendants {
        human.push_detail(format!(
            "[{}] {} {}",
            descendant.status.as_str(),
            descendant.id,
            descendant.title
        ));
    }

    emit_success(
        OutputOptions {
            json: options.json,
            quiet: options.quiet,
        },
        "task descendants",
        &output,
        Some(&human),
    )
}

fn parse_owner(raw: &str) -> Result<OwnerRef> {
    match raw.split_once(':') {
        Some((kind, id)) if !kind.trim().is_empty() && !id.trim().is_empty() => Ok(OwnerRef {
            kind: kind.trim().to_string(),
            id: id.trim().to_string(),
        }),
        _ => Err(Error::InvalidArgument(format!(
            "invalid owner '{raw}': expected <kind>:<id>"
        ))),
    }
}

fn collect_metadata(pairs: &[String]) -> Result<BTreeMap<String, String>> {
    let mut metadata = BTreeMap::new();
    for pair in pairs {
        let (key, value) = super::parse_key_value("meta", pair)?;
        metadata.insert(key, value);
    }
    Ok(metadata)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_owner_splits_kind_and_id() {
        let owner = parse_owner("epic:launch-q3").expect("owner should parse");
        assert_eq!(owner.kind, "epic");
        assert_eq!(owner.id, "launch-q3");
    }

    #[test]
    fn parse_owner_rejects_missing_parts() {
        assert!(parse_owner("epic").is_err());
        assert!(parse_owner(":launch-q3").is_err());
        assert!(parse_owner("epic:").is_err());
    }

    #[test]
    fn collect_metadata_keeps_last_value_per_key() {
        let pairs = vec!["region=eu".to_string(), "region=us".to_string()];
        let metadata = collect_metadata(&pairs).expect("metadata should parse");
        assert_eq!(metadata.get("region").map(String::as_str), Some("us"));
    }

    #[test]
    fn collect_metadata_rejects_missing_separator() {
        let pairs = vec!["region".to_string()];
        assert!(collect_metadata(&pairs).is_err());
    }
}
