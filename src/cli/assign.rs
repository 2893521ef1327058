//! trak assign command implementations.

use std::path::PathBuf;

use chrono::{DateTime, Utc};

use crate::assignment::{Assignment, AssignmentEntry};
use crate::error::{Error, Result};
use crate::events::EventKind;
use crate::output::{emit_success, HumanOutput, OutputOptions};

pub struct SetOptions {
    pub task: String,
    pub users: Vec<String>,
    pub role: Option<String>,
    pub primary: Option<String>,
    pub expires: Option<String>,
    pub replace: bool,
    pub actor: Option<String>,
    pub events: Option<String>,
    pub root: Option<PathBuf>,
    pub json: bool,
    pub quiet: bool,
}

pub struct RmOptions {
    pub task: String,
    pub assignment: String,
    pub actor: Option<String>,
    pub events: Option<String>,
    pub root: Option<PathBuf>,
    pub json: bool,
    pub quiet: bool,
}

pub struct ListOptions {
    pub task: String,
    pub root: Option<PathBuf>,
    pub json: bool,
    pub quiet: bool,
}

pub struct EffectiveOptions {
    pub task: String,
    pub root: Option<PathBuf>,
    pub json: bool,
    pub quiet: bool,
}

#[derive(serde::Serialize)]
struct AssignListOutput {
    task: String,
    total: usize,
    assignments: Vec<Assignment>,
}

#[derive(serde::Serialize)]
struct EffectiveOutput {
    task: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    assignment: Option<Assignment>,
}

pub fn run_set(options: SetOptions) -> Result<()> {
    let ctx = super::load_ctx(options.root, options.actor)?;
    let (mut event_sink, events_to_stdout) = super::open_event_sink(options.events.as_deref())?;

    let expires_at = super::parse_timestamp("expires", options.expires.as_deref())?;
    let entries = build_entries(
        &options.users,
        options.role.as_deref(),
        options.primary.as_deref(),
        expires_at,
    )?;

    let assignments = ctx
        .graph
        .assign_users(&options.task, entries, options.replace, &ctx.actor)?;

    let event_warning = super::emit_event(
        &mut event_sink,
        EventKind::UsersAssigned,
        &ctx.actor,
        &assignments,
    );

    let mut human = HumanOutput::new("Users assigned");
    if let Some(warning) = event_warning {
        human.push_warning(warning);
    }
    if let Some(first) = assignments.first() {
        human.push_summary("Task", first.task_id.clone());
    }
    human.push_summary("Mode", if options.replace { "replace" } else { "append" });
    for assignment in &assignments {
        human.push_detail(format!(
            "{} ({}){}",
            assignment.user,
            assignment.role,
            if assignment.is_primary { ", primary" } else { "" }
        ));
    }

    emit_success(
        OutputOptions {
            json: options.json && !events_to_stdout,
            quiet: options.quiet || events_to_stdout,
        },
        "assign set",
        &assignments,
        Some(&human),
    )
}

pub fn run_rm(options: RmOptions) -> Result<()> {
    let ctx = super::load_ctx(options.root, options.actor)?;
    let (mut event_sink, events_to_stdout) = super::open_event_sink(options.events.as_deref())?;

    let assignment = ctx
        .graph
        .remove_assignment(&options.task, &options.assignment, &ctx.actor)?;

    let event_warning = super::emit_event(
        &mut event_sink,
        EventKind::AssignmentRemoved,
        &ctx.actor,
        &assignment,
    );

    let mut human = HumanOutput::new("Assignment removed");
    if let Some(warning) = event_warning {
        human.push_warning(warning);
    }
    human.push_summary("Task", assignment.task_id.clone());
    human.push_summary("User", assignment.user.clone());

    emit_success(
        OutputOptions {
            json: options.json && !events_to_stdout,
            quiet: options.quiet || events_to_stdout,
        },
        "assign rm",
        &assignment,
        Some(&human),
    )
}

pub fn run_list(options: ListOptions) -> Result<()> {
    let graph = super::open_graph(options.root)?;
    let view = graph.get_task(&options.task)?;
    let now = Utc::now();

    let output = AssignListOutput {
        task: view.task.id.clone(),
        total: view.assignments.len(),
        assignments: view.assignments.clone(),
    };

    let mut human = HumanOutput::new(format!("Assignments on {}", view.task.id));
    human.push_summary("Total", view.assignments.len().to_string());
    for assignment in &view.assignments {
        let mut line = format!(
            "{} {} ({}){}",
            assignment.id,
            assignment.user,
            assignment.role,
            if assignment.is_primary { ", primary" } else { "" }
        );
        match assignment.expires_at {
            Some(expires) if expires <= now => line.push_str(" (expired)"),
            Some(expires) => line.push_str(&format!(" (expires {})", expires.to_rfc3339())),
            None => {}
        }
        human.push_detail(line);
    }

    emit_success(
        OutputOptions {
            json: options.json,
            quiet: options.quiet,
        },
        "assign list",
        &output,
        Some(&human),
    )
}

pub fn run_effective(options: EffectiveOptions) -> Result<()> {
    let graph = super::open_graph(options.root)?;
    let view = graph.get_task(&options.task)?;
    let assignment = graph.effective_assignee(&view.task.id)?;

    let output = EffectiveOutput {
        task: view.task.id.clone(),
        assignment: assignment.clone(),
    };

    let mut human = match assignment.as_ref() {
        Some(assignment) => {
            let mut human = HumanOutput::new("Effective assignee");
            human.push_summary("Task", view.task.id.clone());
            human.push_summary("User", assignment.user.clone());
            human.push_summary("Role", assignment.role.clone());
            if assignment.task_id != view.task.id {
                human.push_summary("Inherited from", assignment.task_id.clone());
            }
            human
        }
        None => {
            let mut human = HumanOutput::new("No effective assignee");
            human.push_summary("Task", view.task.id.clone());
            human.push_next_step(format!(
                "trak assign set {} <user> --primary <user>",
                view.task.id
            ));
            human
        }
    };
    if view.task.is_deleted() {
        human.push_warning("task is deleted");
    }

    emit_success(
        OutputOptions {
            json: options.json,
            quiet: options.quiet,
        },
        "assign effective",
        &output,
        Some(&human),
    )
}

fn build_entries(
    users: &[String],
    role: Option<&str>,
    primary: Option<&str>,
    expires_at: Option<DateTime<Utc>>,
) -> Result<Vec<AssignmentEntry>> {
    if let Some(primary) = primary {
        if !users.iter().any(|user| user == primary) {
            return Err(Error::InvalidArgument(format!(
                "--primary user '{primary}' is not among the listed users"
            )));
        }
    }

    Ok(users
        .iter()
        .map(|user| AssignmentEntry {
            user: user.clone(),
            role: role.map(str::to_string),
            primary: primary == Some(user.as_str()),
            expires_at,
        })
        .collect())
}
