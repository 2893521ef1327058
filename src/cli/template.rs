//! trak template command implementations.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::events::EventKind;
use crate::output::{emit_success, HumanOutput, OutputOptions};
use crate::template::{Template, TemplateDraft};

pub struct CreateOptions {
    pub file: PathBuf,
    pub actor: Option<String>,
    pub events: Option<String>,
    pub root: Option<PathBuf>,
    pub json: bool,
    pub quiet: bool,
}

pub struct NewVersionOptions {
    pub id: String,
    pub file: PathBuf,
    pub actor: Option<String>,
    pub events: Option<String>,
    pub root: Option<PathBuf>,
    pub json: bool,
    pub quiet: bool,
}

pub struct InstantiateOptions {
    pub id: String,
    pub vars: Vec<String>,
    pub parent: Option<String>,
    pub prefix: Option<String>,
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

pub struct ListOptions {
    pub root: Option<PathBuf>,
    pub json: bool,
    pub quiet: bool,
}

pub struct VersionsOptions {
    pub id: String,
    pub root: Option<PathBuf>,
    pub json: bool,
    pub quiet: bool,
}

#[derive(serde::Serialize)]
struct TemplateListOutput {
    total: usize,
    templates: Vec<Template>,
}

#[derive(serde::Serialize)]
struct TemplateVersionsOutput {
    total: usize,
    versions: Vec<Template>,
}

pub fn run_create(options: CreateOptions) -> Result<()> {
    let ctx = super::load_ctx(options.root, options.actor)?;
    let (mut event_sink, events_to_stdout) = super::open_event_sink(options.events.as_deref())?;

    let draft = read_draft(&options.file)?;
    let template = ctx.graph.create_template(draft, &ctx.actor)?;

    let event_warning = super::emit_event(
        &mut event_sink,
        EventKind::TemplateCreated,
        &ctx.actor,
        &template,
    );

    let mut human = HumanOutput::new("Template created");
    if let Some(warning) = event_warning {
        human.push_warning(warning);
    }
    human.push_summary("ID", template.id.clone());
    human.push_summary("Name", template.name.clone());
    human.push_summary("Version", template.version.to_string());
    human.push_summary("Blueprints", template.blueprints.len().to_string());
    if !template.variables.is_empty() {
        human.push_summary("Variables", template.variables.len().to_string());
    }
    human.push_next_step(format!(
        "trak template instantiate {} --var <name>=<value>",
        template.id
    ));

    emit_success(
        OutputOptions {
            json: options.json && !events_to_stdout,
            quiet: options.quiet || events_to_stdout,
        },
        "template create",
        &template,
        Some(&human),
    )
}

pub fn run_new_version(options: NewVersionOptions) -> Result<()> {
    let ctx = super::load_ctx(options.root, options.actor)?;
    let (mut event_sink, events_to_stdout) = super::open_event_sink(options.events.as_deref())?;

    let draft = read_draft(&options.file)?;
    let template = ctx
        .graph
        .new_template_version(&options.id, draft, &ctx.actor)?;

    let event_warning = super::emit_event(
        &mut event_sink,
        EventKind::TemplateVersioned,
        &ctx.actor,
        &template,
    );

    let mut human = HumanOutput::new("Template version created");
    if let Some(warning) = event_warning {
        human.push_warning(warning);
    }
    human.push_summary("ID", template.id.clone());
    human.push_summary("Name", template.name.clone());
    human.push_summary("Version", template.version.to_string());
    if let Some(previous) = template.previous_version_id.as_ref() {
        human.push_summary("Previous", previous.clone());
    }

    emit_success(
        OutputOptions {
            json: options.json && !events_to_stdout,
            quiet: options.quiet || events_to_stdout,
        },
        "template new-version",
        &template,
        Some(&human),
    )
}

pub fn run_instantiate(options: InstantiateOptions) -> Result<()> {
    let ctx = super::load_ctx(options.root, options.actor)?;
    let (mut event_sink, events_to_stdout) = super::open_event_sink(options.events.as_deref())?;

    let variables = parse_vars(&options.vars)?;
    let result = ctx.graph.instantiate_template(
        &options.id,
        variables,
        crate::template::InstantiateOptions {
            parent_task_id: options.parent,
            title_prefix: options.prefix,
        },
        &ctx.actor,
    )?;

    let event_warning = super::emit_event(
        &mut event_sink,
        EventKind::TemplateInstantiated,
        &ctx.actor,
        &result,
    );

    let mut human = HumanOutput::new("Template instantiated");
    if let Some(warning) = event_warning {
        human.push_warning(warning);
    }
    human.push_summary("Template", result.template_id.clone());
    human.push_summary("Tasks", result.tasks.len().to_string());
    human.push_summary("Dependencies", result.dependencies.len().to_string());
    for task in &result.tasks {
        human.push_detail(format!("{} {}", task.id, task.title));
    }

    emit_success(
        OutputOptions {
            json: options.json && !events_to_stdout,
            quiet: options.quiet || events_to_stdout,
        },
        "template instantiate",
        &result,
        Some(&human),
    )
}

pub fn run_show(options: ShowOptions) -> Result<()> {
    let graph = super::open_graph(options.root)?;
    let template = graph.get_template(&options.id)?;

    let mut human = HumanOutput::new(format!("{} {}", template.id, template.name));
    human.push_summary("Version", template.version.to_string());
    human.push_summary("Active", if template.active { "yes" } else { "no" });
    if let Some(description) = template.description.as_ref() {
        human.push_summary("Description", description.clone());
    }
    if let Some(previous) = template.previous_version_id.as_ref() {
        human.push_summary("Previous", previous.clone());
    }
    for blueprint in &template.blueprints {
        let mut line = format!("blueprint {} \"{}\"", blueprint.id, blueprint.title);
        if let Some(parent) = blueprint.parent.as_ref() {
            line.push_str(&format!(" (parent: {parent})"));
        }
        human.push_detail(line);
    }
    for link in &template.links {
        human.push_detail(format!(
            "link {} -> {} ({})",
            link.from, link.to, link.dep_type
        ));
    }
    for variable in &template.variables {
        human.push_detail(format!(
            "variable {}{}",
            variable.name,
            if variable.required { " (required)" } else { "" }
        ));
    }

    emit_success(
        OutputOptions {
            json: options.json,
            quiet: options.quiet,
        },
        "template show",
        &template,
        Some(&human),
    )
}

pub fn run_list(options: ListOptions) -> Result<()> {
    let graph = super::open_graph(options.root)?;
    let templates = graph.list_templates()?;

    let output = TemplateListOutput {
        total: templates.len(),
        templates: templates.clone(),
    };

    let mut human = HumanOutput::new("Templates");
    human.push_summary("Total", templates.len().to_string());
    for template in &templates {
        human.push_detail(format!(
            "{} {} v{}{}",
            template.id,
            template.name,
            template.version,
            if template.active { "" } else { " (inactive)" }
        ));
    }

    emit_success(
        OutputOptions {
            json: options.json,
            quiet: options.quiet,
        },
        "template list",
        &output,
        Some(&human),
    )
}

pub fn run_versions(options: VersionsOptions) -> Result<()> {
    let graph = super::open_graph(options.root)?;
    let versions = graph.template_versions(&options.id)?;

    let output = TemplateVersionsOutput {
        total: versions.len(),
        versions: versions.clone(),
    };

    let mut human = HumanOutput::new("Template versions");
    human.push_summary("Total", versions.len().to_string());
    for template in &versions {
        human.push_detail(format!(
            "v{} {} {}{}",
            template.version,
            template.id,
            template.name,
            if template.active { " (active)" } else { "" }
        ));
    }

    emit_success(
        OutputOptions {
            json: options.json,
            quiet: options.quiet,
        },
        "template versions",
        &output,
        Some(&human),
    )
}

fn read_draft(path: &Path) -> Result<TemplateDraft> {
    let raw = std::fs::read_to_string(path)?;
    let draft: TemplateDraft = serde_json::from_str(&raw)?;
    Ok(draft)
}

fn parse_vars(pairs: &[String]) -> Result<BTreeMap<String, String>> {
    let mut variables = BTreeMap::new();
    for pair in pairs {
        let (key, value) = super::parse_key_value("var", pair)?;
        variables.insert(key, value);
    }
    Ok(variables)
}
