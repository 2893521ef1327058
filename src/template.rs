//! Versioned task templates
//!
//! A template is an ordered list of task blueprints plus blueprint-to-
//! blueprint dependency declarations and variable specs. Instantiation
//! substitutes `{{name}}` placeholders into the blueprints' string
//! fields and remaps the template-local ids onto freshly generated task
//! ids; the orchestration lives in the store, the pure pieces live
//! here.
//!
//! Versions form a chain: creating a new version deactivates the old
//! one and points back at it. Old versions stay readable and their
//! instances are never touched.

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::dependency::DependencyType;
use crate::error::{Error, Result};
use crate::state::State;
use crate::task::TaskPriority;

fn default_variable_type() -> String {
    "string".to_string()
}

/// Declared template variable
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VariableSpec {
    pub name: String,
    #[serde(rename = "type", default = "default_variable_type")]
    pub var_type: String,
    #[serde(default)]
    pub required: bool,
}

/// One task blueprint inside a template.
///
/// String fields may carry `{{variable}}` placeholders. `parent` names
/// another blueprint in the same template, building the instantiated
/// hierarchy; it is resolved through the id map at instantiation time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Blueprint {
    pub id: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<TaskPriority>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_hours: Option<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
}

/// Dependency declaration between two blueprints.
///
/// `from` is the dependent, `to` the prerequisite: instantiating
/// produces an edge "from-task depends on to-task".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlueprintLink {
    pub from: String,
    pub to: String,
    #[serde(rename = "type", default)]
    pub dep_type: DependencyType,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Template {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub version: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_version_id: Option<String>,
    pub active: bool,
    #[serde(default)]
    pub blueprints: Vec<Blueprint>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub links: Vec<BlueprintLink>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub variables: Vec<VariableSpec>,
    pub created_at: DateTime<Utc>,
    pub created_by: String,
}

/// Template body as supplied by callers (and template JSON files).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateDraft {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub blueprints: Vec<Blueprint>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub links: Vec<BlueprintLink>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub variables: Vec<VariableSpec>,
}

impl TemplateDraft {
    /// Structural validation of a draft before it is stored.
    ///
    /// Link and parent endpoints are deliberately not checked here;
    /// instantiation resolves them through the id map and reports
    /// unresolved references at that point, which also covers templates
    /// edited by hand in the state file.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::InvalidArgument(
                "template name cannot be empty".to_string(),
            ));
        }

        let mut seen_ids: HashSet<&str> = HashSet::new();
        for blueprint in &self.blueprints {
            let id = blueprint.id.trim();
            if id.is_empty() {
                return Err(Error::InvalidArgument(
                    "blueprint id cannot be empty".to_string(),
                ));
            }
            if !seen_ids.insert(id) {
                return Err(Error::InvalidArgument(format!(
                    "duplicate blueprint id '{id}'"
                )));
            }
            if blueprint.title.trim().is_empty() {
                return Err(Error::InvalidArgument(format!(
                    "blueprint '{id}' has an empty title"
                )));
            }
        }

        let mut seen_vars: HashSet<&str> = HashSet::new();
        for variable in &self.variables {
            let name = variable.name.trim();
            if name.is_empty() {
                return Err(Error::InvalidArgument(
                    "variable name cannot be empty".to_string(),
                ));
            }
            if !seen_vars.insert(name) {
                return Err(Error::InvalidArgument(format!(
                    "duplicate variable '{name}'"
                )));
            }
        }

        Ok(())
    }
}

impl Template {
    pub fn from_draft(
        id: impl Into<String>,
        draft: TemplateDraft,
        version: u32,
        previous_version_id: Option<String>,
        actor: &str,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            name: draft.name,
            description: draft.description,
            version,
            previous_version_id,
            active: true,
            blueprints: draft.blueprints,
            links: draft.links,
            variables: draft.variables,
            created_at: now,
            created_by: actor.to_string(),
        }
    }

    /// Names of required variables absent from `variables`.
    pub fn missing_required(&self, variables: &BTreeMap<String, String>) -> Vec<String> {
        self.variables
            .iter()
            .filter(|spec| spec.required && !variables.contains_key(spec.name.trim()))
            .map(|spec| spec.name.trim().to_string())
            .collect()
    }
}

/// Replace `{{name}}` placeholders with variable values.
///
/// Placeholders without a supplied value are left verbatim so partial
/// templates still instantiate.
pub fn substitute(input: &str, variables: &BTreeMap<String, String>) -> String {
    let mut output = input.to_string();
    for (name, value) in variables {
        output = output.replace(&format!("{{{{{name}}}}}"), value);
    }
    output
}

/// Blueprint with all placeholders substituted, ready to become a task.
#[derive(Debug, Clone)]
pub struct RenderedBlueprint {
    pub local_id: String,
    pub title: String,
    pub description: Option<String>,
    pub task_type: Option<String>,
    pub priority: Option<TaskPriority>,
    pub estimated_hours: Option<f64>,
    pub tags: Vec<String>,
    pub metadata: BTreeMap<String, String>,
    pub parent: Option<String>,
}

/// Substitute variables into every string field of a blueprint.
///
/// Metadata keys are structural and stay untouched; values are
/// substituted like any other string field.
pub fn render_blueprint(
    blueprint: &Blueprint,
    variables: &BTreeMap<String, String>,
) -> RenderedBlueprint {
    RenderedBlueprint {
        local_id: blueprint.id.trim().to_string(),
        title: substitute(&blueprint.title, variables),
        description: blueprint
            .description
            .as_deref()
            .map(|text| substitute(text, variables)),
        task_type: blueprint
            .task_type
            .as_deref()
            .map(|text| substitute(text, variables)),
        priority: blueprint.priority,
        estimated_hours: blueprint.estimated_hours,
        tags: blueprint
            .tags
            .iter()
            .map(|tag| substitute(tag, variables))
            .collect(),
        metadata: blueprint
            .metadata
            .iter()
            .map(|(key, value)| (key.clone(), substitute(value, variables)))
            .collect(),
        parent: blueprint.parent.as_ref().map(|p| p.trim().to_string()),
    }
}

/// Options controlling instantiation
#[derive(Debug, Clone, Default)]
pub struct InstantiateOptions {
    /// Attach created root tasks (blueprints without an in-template
    /// parent) under this existing task.
    pub parent_task_id: Option<String>,
    /// Prefix prepended to every created task title.
    pub title_prefix: Option<String>,
}

/// Everything one instantiation produced
#[derive(Debug, Clone, Serialize)]
pub struct InstantiateResult {
    pub template_id: String,
    pub tasks: Vec<crate::task::Task>,
    pub dependencies: Vec<crate::dependency::Dependency>,
    pub id_map: BTreeMap<String, String>,
}

/// All versions in the chain containing `template_id`, newest first.
///
/// Follows successor links forward and previous-version pointers
/// backward, each with a visited guard so a hand-corrupted chain cannot
/// loop.
pub fn version_chain<'a>(state: &'a State, template_id: &str) -> Vec<&'a Template> {
    let Some(start) = state.template(template_id) else {
        return Vec::new();
    };

    // climb to the newest version
    let mut newest = start;
    let mut visited: HashSet<&str> = HashSet::new();
    visited.insert(newest.id.as_str());
    while let Some(successor) = state
        .templates
        .iter()
        .find(|candidate| candidate.previous_version_id.as_deref() == Some(newest.id.as_str()))
    {
        if !visited.insert(successor.id.as_str()) {
            break;
        }
        newest = successor;
    }

    // walk back down the chain
    let mut chain: Vec<&Template> = Vec::new();
    let mut seen: HashSet<&str> = HashSet::new();
    let mut current = Some(newest);
    while let Some(template) = current {
        if !seen.insert(template.id.as_str()) {
            break;
        }
        chain.push(template);
        current = template
            .previous_version_id
            .as_deref()
            .and_then(|previous| state.template(previous));
    }

    chain
}
