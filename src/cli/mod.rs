//! Command-line interface for trak
//!
//! This module defines the CLI structure using clap derive macros.
//! Each subcommand is defined in its own submodule.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use serde::Serialize;

use crate::error::Result;
use crate::events::{Event, EventDestination, EventKind, EventSink};
use crate::storage::Storage;
use crate::store::WorkGraph;

mod actor;
mod assign;
mod dep;
mod history;
mod init;
mod status;
mod task;
mod template;

/// trak - Work tracking for teams of many small actors
///
/// A CLI over a single per-workspace state document: tasks with
/// hierarchy, dependencies, status gating, assignments, templates, and
/// a full audit history.
#[derive(Parser, Debug)]
#[command(name = "trak")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the workspace root (defaults to discovery from the current directory)
    #[arg(long, global = true, env = "TRAK_ROOT")]
    pub root: Option<PathBuf>,

    /// Actor identity recorded on mutations
    #[arg(long, global = true, env = "TRAK_ACTOR")]
    pub actor: Option<String>,

    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Emit JSONL mutation events to a file, or "-" for stdout
    #[arg(long, global = true, value_name = "DEST")]
    pub events: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize a trak workspace in a directory
    Init,

    /// Task management (create, inspect, edit, hierarchy)
    #[command(subcommand)]
    Task(TaskCommands),

    /// Dependency edges between tasks
    #[command(subcommand)]
    Dep(DepCommands),

    /// Move a task to a new status
    Status {
        /// Task id (or unique prefix)
        task: String,

        /// Target status: pending, in_progress, blocked, review, completed, cancelled
        status: String,

        /// Reason for the block (only valid with a blocked target)
        #[arg(long)]
        reason: Option<String>,
    },

    /// User assignments on tasks
    #[command(subcommand)]
    Assign(AssignCommands),

    /// Task templates (versioned blueprints)
    #[command(subcommand)]
    Template(TemplateCommands),

    /// Show the audit history of a task, newest first
    History {
        /// Task id (or unique prefix)
        task: String,

        /// Maximum records to show
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Set or show actor identity
    #[command(subcommand)]
    Actor(ActorCommands),
}

/// Task subcommands
#[derive(Subcommand, Debug)]
pub enum TaskCommands {
    /// Create a task
    New {
        /// Task title
        title: String,

        /// Longer description
        #[arg(long)]
        description: Option<String>,

        /// Free-form task type (bug, feature, chore, ...)
        #[arg(long = "type")]
        task_type: Option<String>,

        /// Priority: low, medium, high, urgent
        #[arg(long)]
        priority: Option<String>,

        /// Parent task id
        #[arg(long)]
        parent: Option<String>,

        /// Owning entity as <kind>:<id>
        #[arg(long)]
        owner: Option<String>,

        /// Estimated hours
        #[arg(long)]
        estimate: Option<f64>,

        /// Due timestamp (RFC 3339)
        #[arg(long)]
        due: Option<String>,

        /// Tag (repeatable)
        #[arg(long = "tag")]
        tags: Vec<String>,

        /// Metadata entry as key=value (repeatable)
        #[arg(long = "meta", value_name = "KEY=VALUE")]
        meta: Vec<String>,
    },

    /// Show a task with its relations
    Show {
        /// Task id (or unique prefix)
        id: String,
    },

    /// Update task fields
    Update {
        /// Task id (or unique prefix)
        id: String,

        /// New title
        #[arg(long)]
        title: Option<String>,

        /// New description (empty string clears it)
        #[arg(long)]
        description: Option<String>,

        /// New task type (empty string clears it)
        #[arg(long = "type")]
        task_type: Option<String>,

        /// New priority: low, medium, high, urgent
        #[arg(long)]
        priority: Option<String>,

        /// New estimated hours
        #[arg(long)]
        estimate: Option<f64>,

        /// Actual hours spent
        #[arg(long)]
        actual: Option<f64>,

        /// New due timestamp (RFC 3339)
        #[arg(long)]
        due: Option<String>,

        /// Clear the due timestamp
        #[arg(long)]
        clear_due: bool,

        /// Reason recorded while the task is blocked
        #[arg(long)]
        blocked_reason: Option<String>,

        /// Replace the tag set (repeatable)
        #[arg(long = "tag")]
        tags: Vec<String>,

        /// Replace the metadata set with key=value entries (repeatable)
        #[arg(long = "meta", value_name = "KEY=VALUE")]
        meta: Vec<String>,

        /// Completion percentage (0-100)
        #[arg(long)]
        completion: Option<u8>,

        /// New owning entity as <kind>:<id>
        #[arg(long)]
        owner: Option<String>,

        /// Clear the owning entity
        #[arg(long)]
        clear_owner: bool,
    },

    /// Soft-delete a task
    Rm {
        /// Task id (or unique prefix)
        id: String,
    },

    /// List tasks
    List {
        /// Filter by status
        #[arg(long)]
        status: Option<String>,

        /// Filter by active assignee
        #[arg(long)]
        assignee: Option<String>,

        /// Filter by task type
        #[arg(long = "type")]
        task_type: Option<String>,

        /// Filter by tag
        #[arg(long)]
        tag: Option<String>,

        /// Include soft-deleted tasks
        #[arg(long)]
        all: bool,
    },

    /// Parent link management
    #[command(subcommand)]
    Parent(ParentCommands),

    /// List a task's ancestors, nearest first
    Ancestors {
        /// Task id (or unique prefix)
        id: String,
    },

    /// List a task's descendants
    Descendants {
        /// Task id (or unique prefix)
        id: String,
    },
}

/// Parent subcommands
#[derive(Subcommand, Debug)]
pub enum ParentCommands {
    /// Set or move a task's parent
    Set {
        /// Child task id
        child: String,

        /// New parent task id
        parent: String,
    },

    /// Detach a task from its parent
    Clear {
        /// Child task id
        child: String,
    },
}

/// Dependency subcommands
#[derive(Subcommand, Debug)]
pub enum DepCommands {
    /// Add a dependency edge
    Add {
        /// Dependent task id
        task: String,

        /// Task it depends on
        depends_on: String,

        /// Edge type: blocks, blocked_by, related
        #[arg(long = "type", default_value = "blocks")]
        dep_type: String,
    },

    /// Remove a dependency edge
    Rm {
        /// Dependent task id
        task: String,

        /// Task it depends on
        depends_on: String,

        /// Edge type (required when the pair is linked under several types)
        #[arg(long = "type")]
        dep_type: Option<String>,
    },

    /// Show the transitive gating chain of a task
    Chain {
        /// Task id (or unique prefix)
        task: String,
    },

    /// Show incomplete gating dependencies holding a task back
    Incomplete {
        /// Task id (or unique prefix)
        task: String,
    },
}

/// Assignment subcommands
#[derive(Subcommand, Debug)]
pub enum AssignCommands {
    /// Assign users to a task
    Set {
        /// Task id (or unique prefix)
        task: String,

        /// Users to assign
        #[arg(required = true)]
        users: Vec<String>,

        /// Role recorded on every new assignment
        #[arg(long)]
        role: Option<String>,

        /// Which of the listed users is primary
        #[arg(long, value_name = "USER")]
        primary: Option<String>,

        /// Expiry timestamp applied to every new assignment (RFC 3339)
        #[arg(long)]
        expires: Option<String>,

        /// Replace existing assignments instead of appending
        #[arg(long)]
        replace: bool,
    },

    /// Remove one assignment by id
    Rm {
        /// Task id (or unique prefix)
        task: String,

        /// Assignment id (or unique prefix)
        assignment: String,
    },

    /// List assignments on a task
    List {
        /// Task id (or unique prefix)
        task: String,
    },

    /// Show the effective assignee (own or inherited)
    Effective {
        /// Task id (or unique prefix)
        task: String,
    },
}

/// Template subcommands
#[derive(Subcommand, Debug)]
pub enum TemplateCommands {
    /// Store a new template from a JSON draft file
    Create {
        /// Path to the draft file
        #[arg(long)]
        file: PathBuf,
    },

    /// Store a new version of an active template
    NewVersion {
        /// Template id (or unique prefix) of the active version
        id: String,

        /// Path to the draft file
        #[arg(long)]
        file: PathBuf,
    },

    /// Expand a template into tasks and dependency edges
    Instantiate {
        /// Template id (or unique prefix)
        id: String,

        /// Variable binding as name=value (repeatable)
        #[arg(long = "var", value_name = "NAME=VALUE")]
        vars: Vec<String>,

        /// Attach created root tasks under this existing task
        #[arg(long)]
        parent: Option<String>,

        /// Prefix prepended to every created task title
        #[arg(long)]
        prefix: Option<String>,
    },

    /// Show one template version
    Show {
        /// Template id (or unique prefix)
        id: String,
    },

    /// List stored templates
    List,

    /// List all versions in a template's chain, newest first
    Versions {
        /// Template id (or unique prefix)
        id: String,
    },
}

/// Actor subcommands
#[derive(Subcommand, Debug)]
pub enum ActorCommands {
    /// Persist the actor name for this workspace
    Set {
        /// Actor name
        name: String,
    },

    /// Show the resolved actor
    Show,
}

/// A workspace handle plus the resolved actor, shared by mutating commands.
pub(crate) struct Ctx {
    pub graph: WorkGraph,
    pub actor: String,
}

/// Open the workspace at `root`, or discover it upward from the
/// current directory when no root was given.
pub(crate) fn open_graph(root: Option<PathBuf>) -> Result<WorkGraph> {
    match root {
        Some(path) => WorkGraph::open(&path),
        None => {
            let cwd = std::env::current_dir()?;
            let storage = Storage::discover(&cwd)?;
            let root = storage.root().to_path_buf();
            WorkGraph::open(&root)
        }
    }
}

pub(crate) fn load_ctx(root: Option<PathBuf>, actor: Option<String>) -> Result<Ctx> {
    let graph = open_graph(root)?;
    let actor = crate::actor::resolve_actor(Some(graph.root()), actor.as_deref())?;
    Ok(Ctx { graph, actor })
}

pub(crate) fn open_event_sink(events: Option<&str>) -> Result<(Option<EventSink>, bool)> {
    let destination = EventDestination::parse(events);
    let sink = destination.as_ref().map(|dest| dest.open()).transpose()?;
    let events_to_stdout = matches!(destination, Some(EventDestination::Stdout));
    Ok((sink, events_to_stdout))
}

/// Emit one mutation event. Event failures never fail the command;
/// the returned warning is surfaced in the normal output instead.
pub(crate) fn emit_event<T: Serialize>(
    sink: &mut Option<EventSink>,
    kind: EventKind,
    actor: &str,
    data: T,
) -> Option<String> {
    let sink = sink.as_mut()?;

    let envelope = match Event::new(kind, Some(actor.to_string())).with_data(data) {
        Ok(envelope) => envelope,
        Err(err) => return Some(format!("event output failed: {err}")),
    };

    if let Err(err) = sink.emit(&envelope) {
        return Some(format!("event output failed: {err}"));
    }

    None
}

pub(crate) fn parse_timestamp(
    label: &str,
    value: Option<&str>,
) -> Result<Option<chrono::DateTime<chrono::Utc>>> {
    let Some(value) = value else {
        return Ok(None);
    };
    let parsed = chrono::DateTime::parse_from_rfc3339(value).map_err(|err| {
        crate::error::Error::InvalidArgument(format!(
            "invalid {label} timestamp '{value}': {err}"
        ))
    })?;
    Ok(Some(parsed.with_timezone(&chrono::Utc)))
}

pub(crate) fn parse_key_value(flag: &str, raw: &str) -> Result<(String, String)> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(crate::error::Error::InvalidArgument(format!(
            "invalid --{flag} '{raw}': expected key=value"
        ))),
    }
}

impl Cli {
    /// Execute the CLI command
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Init => init::run(init::InitOptions {
                actor: self.actor,
                events: self.events,
                root: self.root,
                json: self.json,
                quiet: self.quiet,
            }),
            Commands::Task(cmd) => match cmd {
                TaskCommands::New {
                    title,
                    description,
                    task_type,
                    priority,
                    parent,
                    owner,
                    estimate,
                    due,
                    tags,
                    meta,
                } => task::run_new(task::NewOptions {
                    title,
                    description,
                    task_type,
                    priority,
                    parent,
                    owner,
                    estimate,
                    due,
                    tags,
                    meta,
                    actor: self.actor,
                    events: self.events,
                    root: self.root,
                    json: self.json,
                    quiet: self.quiet,
                }),
                TaskCommands::Show { id } => task::run_show(task::ShowOptions {
                    id,
                    root: self.root,
                    json: self.json,
                    quiet: self.quiet,
                }),
                TaskCommands::Update {
                    id,
                    title,
                    description,
                    task_type,
                    priority,
                    estimate,
                    actual,
                    due,
                    clear_due,
                    blocked_reason,
                    tags,
                    meta,
                    completion,
                    owner,
                    clear_owner,
                } => task::run_update(task::UpdateOptions {
                    id,
                    title,
                    description,
                    task_type,
                    priority,
                    estimate,
                    actual,
                    due,
                    clear_due,
                    blocked_reason,
                    tags,
                    meta,
                    completion,
                    owner,
                    clear_owner,
                    actor: self.actor,
                    events: self.events,
                    root: self.root,
                    json: self.json,
                    quiet: self.quiet,
                }),
                TaskCommands::Rm { id } => task::run_rm(task::RmOptions {
                    id,
                    actor: self.actor,
                    events: self.events,
                    root: self.root,
                    json: self.json,
                    quiet: self.quiet,
                }),
                TaskCommands::List {
                    status,
                    assignee,
                    task_type,
                    tag,
                    all,
                } => task::run_list(task::ListOptions {
                    status,
                    assignee,
                    task_type,
                    tag,
                    all,
                    root: self.root,
                    json: self.json,
                    quiet: self.quiet,
                }),
                TaskCommands::Parent(cmd) => match cmd {
                    ParentCommands::Set { child, parent } => {
                        task::run_parent_set(task::ParentSetOptions {
                            child,
                            parent,
                            actor: self.actor,
                            events: self.events,
                            root: self.root,
                            json: self.json,
                            quiet: self.quiet,
                        })
                    }
                    ParentCommands::Clear { child } => {
                        task::run_parent_clear(task::ParentClearOptions {
                            child,
                            actor: self.actor,
                            events: self.events,
                            root: self.root,
                            json: self.json,
                            quiet: self.quiet,
                        })
                    }
                },
                TaskCommands::Ancestors { id } => task::run_ancestors(task::AncestorsOptions {
                    id,
                    root: self.root,
                    json: self.json,
                    quiet: self.quiet,
                }),
                TaskCommands::Descendants { id } => {
                    task::run_descendants(task::DescendantsOptions {
                        id,
                        root: self.root,
                        json: self.json,
                        quiet: self.quiet,
                    })
                }
            },
            Commands::Dep(cmd) => match cmd {
                DepCommands::Add {
                    task,
                    depends_on,
                    dep_type,
                } => dep::run_add(dep::AddOptions {
                    task,
                    depends_on,
                    dep_type,
                    actor: self.actor,
                    events: self.events,
                    root: self.root,
                    json: self.json,
                    quiet: self.quiet,
                }),
                DepCommands::Rm {
                    task,
                    depends_on,
                    dep_type,
                } => dep::run_rm(dep::RmOptions {
                    task,
                    depends_on,
                    dep_type,
                    actor: self.actor,
                    events: self.events,
                    root: self.root,
                    json: self.json,
                    quiet: self.quiet,
                }),
                DepCommands::Chain { task } => dep::run_chain(dep::ChainOptions {
                    task,
                    root: self.root,
                    json: self.json,
                    quiet: self.quiet,
                }),
                DepCommands::Incomplete { task } => {
                    dep::run_incomplete(dep::IncompleteOptions {
                        task,
                        root: self.root,
                        json: self.json,
                        quiet: self.quiet,
                    })
                }
            },
            Commands::Status {
                task,
                status,
                reason,
            } => status::run(status::StatusOptions {
                task,
                status,
                reason,
                actor: self.actor,
                events: self.events,
                root: self.root,
                json: self.json,
                quiet: self.quiet,
            }),
            Commands::Assign(cmd) => match cmd {
                AssignCommands::Set {
                    task,
                    users,
                    role,
                    primary,
                    expires,
                    replace,
                } => assign::run_set(assign::SetOptions {
                    task,
                    users,
                    role,
                    primary,
                    expires,
                    replace,
                    actor: self.actor,
                    events: self.events,
                    root: self.root,
                    json: self.json,
                    quiet: self.quiet,
                }),
                AssignCommands::Rm { task, assignment } => {
                    assign::run_rm(assign::RmOptions {
                        task,
                        assignment,
                        actor: self.actor,
                        events: self.events,
                        root: self.root,
                        json: self.json,
                        quiet: self.quiet,
                    })
                }
                AssignCommands::List { task } => assign::run_list(assign::ListOptions {
                    task,
                    root: self.root,
                    json: self.json,
                    quiet: self.quiet,
                }),
                AssignCommands::Effective { task } => {
                    assign::run_effective(assign::EffectiveOptions {
                        task,
                        root: self.root,
                        json: self.json,
                        quiet: self.quiet,
                    })
                }
            },
            Commands::Template(cmd) => match cmd {
                TemplateCommands::Create { file } => {
                    template::run_create(template::CreateOptions {
                        file,
                        actor: self.actor,
                        events: self.events,
                        root: self.root,
                        json: self.json,
                        quiet: self.quiet,
                    })
                }
                TemplateCommands::NewVersion { id, file } => {
                    template::run_new_version(template::NewVersionOptions {
                        id,
                        file,
                        actor: self.actor,
                        events: self.events,
                        root: self.root,
                        json: self.json,
                        quiet: self.quiet,
                    })
                }
                TemplateCommands::Instantiate {
                    id,
                    vars,
                    parent,
                    prefix,
                } => template::run_instantiate(template::InstantiateOptions {
                    id,
                    vars,
                    parent,
                    prefix,
                    actor: self.actor,
                    events: self.events,
                    root: self.root,
                    json: self.json,
                    quiet: self.quiet,
                }),
                TemplateCommands::Show { id } => template::run_show(template::ShowOptions {
                    id,
                    root: self.root,
                    json: self.json,
                    quiet: self.quiet,
                }),
                TemplateCommands::List => template::run_list(template::ListOptions {
                    root: self.root,
                    json: self.json,
                    quiet: self.quiet,
                }),
                TemplateCommands::Versions { id } => {
                    template::run_versions(template::VersionsOptions {
                        id,
                        root: self.root,
                        json: self.json,
                        quiet: self.quiet,
                    })
                }
            },
            Commands::History { task, limit } => history::run(history::HistoryOptions {
                task,
                limit,
                root: self.root,
                json: self.json,
                quiet: self.quiet,
            }),
            Commands::Actor(cmd) => match cmd {
                ActorCommands::Set { name } => actor::run_set(actor::SetOptions {
                    name,
                    root: self.root,
                    json: self.json,
                    quiet: self.quiet,
                }),
                ActorCommands::Show => actor::run_show(actor::ShowOptions {
                    actor: self.actor,
                    root: self.root,
                    json: self.json,
                    quiet: self.quiet,
                }),
            },
        }
    }
}
