//! trak status command implementation.

use std::path::PathBuf;

use crate::error::Result;
use crate::events::EventKind;
use crate::output::{emit_success, HumanOutput, OutputOptions};
use crate::task::TaskStatus;

pub struct StatusOptions {
    pub task: String,
    pub status: String,
    pub reason: Option<String>,
    pub actor: Option<String>,
    pub events: Option<String>,
    pub root: Option<PathBuf>,
    pub json: bool,
    pub quiet: bool,
}

pub fn run(options: StatusOptions) -> Result<()> {
    let ctx = super::load_ctx(options.root, options.actor)?;
    let (mut event_sink, events_to_stdout) = super::open_event_sink(options.events.as_deref())?;

    let new_status = options.status.parse::<TaskStatus>()?;
    let task = ctx.graph.transition(
        &options.task,
        new_status,
        options.reason.as_deref(),
        &ctx.actor,
    )?;

    let event_warning = super::emit_event(
        &mut event_sink,
        EventKind::TaskStatusChanged,
        &ctx.actor,
        &task,
    );

    let mut human = HumanOutput::new("Status updated");
    if let Some(warning) = event_warning {
        human.push_warning(warning);
    }
    human.push_summary("ID", task.id.clone());
    human.push_summary("Status", task.status.as_str());
    if let Some(reason) = task.blocked_reason.as_ref() {
        human.push_summary("Reason", reason.clone());
    }
    if let Some(started) = task.started_at {
        human.push_summary("Started", started.to_rfc3339());
    }
    if let Some(completed) = task.completed_at {
        human.push_summary("Completed", completed.to_rfc3339());
    }

    emit_success(
        OutputOptions {
            json: options.json && !events_to_stdout,
            quiet: options.quiet || events_to_stdout,
        },
        "status",
        &task,
        Some(&human),
    )
}
