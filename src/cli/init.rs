//! trak init command implementation.
//!
//! Creates the `.trak/` directory and an empty state document.

use std::path::PathBuf;

use crate::error::Result;
use crate::events::EventKind;
use crate::output::{emit_success, HumanOutput, OutputOptions};
use crate::store::WorkGraph;

pub struct InitOptions {
    pub actor: Option<String>,
    pub events: Option<String>,
    pub root: Option<PathBuf>,
    pub json: bool,
    pub quiet: bool,
}

#[derive(serde::Serialize)]
struct InitReport {
    root: PathBuf,
    created: bool,
}

pub fn run(options: InitOptions) -> Result<()> {
    let root = match options.root {
        Some(path) => path,
        None => std::env::current_dir()?,
    };

    let (graph, created) = WorkGraph::init(&root)?;
    let actor = crate::actor::resolve_actor(Some(graph.root()), options.actor.as_deref())?;
    let (mut event_sink, events_to_stdout) = super::open_event_sink(options.events.as_deref())?;

    let report = InitReport {
        root: graph.root().to_path_buf(),
        created,
    };

    let event_warning = if created {
        super::emit_event(
            &mut event_sink,
            EventKind::WorkspaceInitialized,
            &actor,
            &report,
        )
    } else {
        None
    };

    let header = if created {
        "trak init: initialized workspace"
    } else {
        "trak init: workspace already initialized"
    };

    let mut human = HumanOutput::new(header);
    if let Some(warning) = event_warning {
        human.push_warning(warning);
    }
    human.push_summary("root", report.root.display().to_string());
    human.push_summary(
        "state",
        if created {
            ".trak/state.json created"
        } else {
            ".trak/state.json already present"
        },
    );
    human.push_next_step("trak actor set <name>");
    human.push_next_step("trak task new \"<title>\"");

    emit_success(
        OutputOptions {
            json: options.json && !events_to_stdout,
            quiet: options.quiet || events_to_stdout,
        },
        "init",
        &report,
        Some(&human),
    )
}
