//! trak dep command implementations.

use std::path::PathBuf;

use crate::dependency::DependencyType;
use crate::error::Result;
use crate::events::EventKind;
use crate::output::{emit_success, HumanOutput, OutputOptions};
use crate::task::Task;

pub struct AddOptions {
    pub task: String,
    pub depends_on: String,
    pub dep_type: String,
    pub actor: Option<String>,
    pub events: Option<String>,
    pub root: Option<PathBuf>,
    pub json: bool,
    pub quiet: bool,
}

pub struct RmOptions {
    pub task: String,
    pub depends_on: String,
    pub dep_type: Option<String>,
    pub actor: Option<String>,
    pub events: Option<String>,
    pub root: Option<PathBuf>,
    pub json: bool,
    pub quiet: bool,
}

pub struct ChainOptions {
    pub task: String,
    pub root: Option<PathBuf>,
    pub json: bool,
    pub quiet: bool,
}

pub struct IncompleteOptions {
    pub task: String,
    pub root: Option<PathBuf>,
    pub json: bool,
    pub quiet: bool,
}

#[derive(serde::Serialize)]
struct DepChainOutput {
    task: String,
    total: usize,
    chain: Vec<Task>,
}

#[derive(serde::Serialize)]
struct DepIncompleteOutput {
    task: String,
    total: usize,
    incomplete: Vec<Task>,
}

pub fn run_add(options: AddOptions) -> Result<()> {
    let ctx = super::load_ctx(options.root, options.actor)?;
    let (mut event_sink, events_to_stdout) = super::open_event_sink(options.events.as_deref())?;

    let dep_type = options.dep_type.parse::<DependencyType>()?;
    let dependency = ctx
        .graph
        .add_dependency(&options.task, &options.depends_on, dep_type, &ctx.actor)?;

    let event_warning = super::emit_event(
        &mut event_sink,
        EventKind::DependencyAdded,
        &ctx.actor,
        &dependency,
    );

    let mut human = HumanOutput::new("Dependency added");
    if let Some(warning) = event_warning {
        human.push_warning(warning);
    }
    human.push_summary("Task", dependency.task_id.clone());
    human.push_summary("Depends on", dependency.depends_on_id.clone());
    human.push_summary("Type", dependency.dep_type.as_str());
    human.push_summary(
        "Gating",
        if dependency.dep_type.is_gating() {
            "yes"
        } else {
            "no"
        },
    );

    emit_success(
        OutputOptions {
            json: options.json && !events_to_stdout,
            quiet: options.quiet || events_to_stdout,
        },
        "dep add",
        &dependency,
        Some(&human),
    )
}

pub fn run_rm(options: RmOptions) -> Result<()> {
    let ctx = super::load_ctx(options.root, options.actor)?;
    let (mut event_sink, events_to_stdout) = super::open_event_sink(options.events.as_deref())?;

    let dep_type = match options.dep_type.as_deref() {
        Some(value) => Some(value.parse::<DependencyType>()?),
        None => None,
    };
    let dependency = ctx.graph.remove_dependency(
        &options.task,
        &options.depends_on,
        dep_type,
        &ctx.actor,
    )?;

    let event_warning = super::emit_event(
        &mut event_sink,
        EventKind::DependencyRemoved,
        &ctx.actor,
        &dependency,
    );

    let mut human = HumanOutput::new("Dependency removed");
    if let Some(warning) = event_warning {
        human.push_warning(warning);
    }
    human.push_summary("Task", dependency.task_id.clone());
    human.push_summary("Depended on", dependency.depends_on_id.clone());
    human.push_summary("Type", dependency.dep_type.as_str());

    emit_success(
        OutputOptions {
            json: options.json && !events_to_stdout,
            quiet: options.quiet || events_to_stdout,
        },
        "dep rm",
        &dependency,
        Some(&human),
    )
}

pub fn run_chain(options: ChainOptions) -> Result<()> {
    let graph = super::open_graph(options.root)?;
    let view = graph.get_task(&options.task)?;
    let chain = graph.dependency_chain(&view.task.id)?;

    let output = DepChainOutput {
        task: view.task.id.clone(),
        total: chain.len(),
        chain: chain.clone(),
    };

    let mut human = HumanOutput::new(format!("Gating chain of {}", view.task.id));
    human.push_summary("Total", chain.len().to_string());
    for task in &chain {
        human.push_detail(format!("[{}] {} {}", task.status.as_str(), task.id, task.title));
    }

    emit_success(
        OutputOptions {
            json: options.json,
            quiet: options.quiet,
        },
        "dep chain",
        &output,
        Some(&human),
    )
}

pub fn run_incomplete(options: IncompleteOptions) -> Result<()> {
    let graph = super::open_graph(options.root)?;
    let view = graph.get_task(&options.task)?;
    let incomplete = graph.incomplete_dependencies(&view.task.id)?;

    let output = DepIncompleteOutput {
        task: view.task.id.clone(),
        total: incomplete.len(),
        incomplete: incomplete.clone(),
    };

    let header = if incomplete.is_empty() {
        format!("{} has no incomplete dependencies", view.task.id)
    } else {
        format!("Incomplete dependencies of {}", view.task.id)
    };

    let mut human = HumanOutput::new(header);
    human.push_summary("Total", incomplete.len().to_string());
    for task in &incomplete {
        human.push_detail(format!("[{}] {} {}", task.status.as_str(), task.id, task.title));
    }
    if incomplete.is_empty() {
        human.push_next_step(format!("trak status {} in_progress", view.task.id));
    }

    emit_success(
        OutputOptions {
            json: options.json,
            quiet: options.quiet,
        },
        "dep incomplete",
        &output,
        Some(&human),
    )
}
