//! trak actor command implementations.
//!
//! Provides actor identity helpers (set/show).

use std::path::PathBuf;

use crate::actor;
use crate::error::Result;
use crate::output::{emit_success, HumanOutput, OutputOptions};
use crate::storage::TRAK_DIR;

/// Options for `trak actor set`
pub struct SetOptions {
    pub name: String,
    pub root: Option<PathBuf>,
    pub json: bool,
    pub quiet: bool,
}

/// Options for `trak actor show`
pub struct ShowOptions {
    pub actor: Option<String>,
    pub root: Option<PathBuf>,
    pub json: bool,
    pub quiet: bool,
}

#[derive(serde::Serialize)]
struct ActorSetReport {
    actor: String,
    path: PathBuf,
}

#[derive(serde::Serialize)]
struct ActorShowReport {
    actor: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    persisted: Option<String>,
}

pub fn run_set(options: SetOptions) -> Result<()> {
    let graph = super::open_graph(options.root)?;

    actor::persist_actor(graph.root(), &options.name)?;

    let actor_name = actor::resolve_actor(Some(graph.root()), Some(&options.name))?;
    let actor_path = graph.root().join(TRAK_DIR).join("actor");

    let report = ActorSetReport {
        actor: actor_name.clone(),
        path: actor_path.clone(),
    };

    let mut human = HumanOutput::new(format!("trak actor set: {actor_name}"));
    human.push_summary("actor", actor_name);
    human.push_summary("path", actor_path.display().to_string());

    emit_success(
        OutputOptions {
            json: options.json,
            quiet: options.quiet,
        },
        "actor set",
        &report,
        Some(&human),
    )
}

pub fn run_show(options: ShowOptions) -> Result<()> {
    let graph = super::open_graph(options.root)?;

    let persisted = actor::load_persisted_actor(graph.root())?;
    let actor_name = actor::resolve_actor(Some(graph.root()), options.actor.as_deref())?;

    let report = ActorShowReport {
        actor: actor_name.clone(),
        persisted: persisted.clone(),
    };

    let header = if actor_name == "unknown" {
        "trak actor: not set".to_string()
    } else {
        format!("trak actor: {actor_name}")
    };

    let mut human = HumanOutput::new(header);
    human.push_summary("actor", actor_name.clone());
    if let Some(persisted) = persisted {
        human.push_summary("persisted", persisted);
    }

    if actor_name == "unknown" {
        human.push_warning("actor not set; using default".to_string());
        human.push_next_step("trak actor set <name>");
    }

    emit_success(
        OutputOptions {
            json: options.json,
            quiet: options.quiet,
        },
        "actor show",
        &report,
        Some(&human),
    )
}
