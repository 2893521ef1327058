//! Error types for trak
//!
//! Exit codes:
//! - 0: Success
//! - 2: User error (bad args, unknown id, missing workspace)
//! - 3: Blocked by an invariant (cycles, gating dependencies, template validation)
//! - 4: Operation failed (IO, serialization, lock contention)

use std::path::PathBuf;
use thiserror::Error;

/// Exit codes for the trak CLI
pub mod exit_codes {
    pub const SUCCESS: i32 = 0;
    pub const USER_ERROR: i32 = 2;
    pub const INVARIANT_BLOCKED: i32 = 3;
    pub const OPERATION_FAILED: i32 = 4;
}

/// Main error type for trak operations
#[derive(Error, Debug)]
pub enum Error {
    // User errors (exit code 2)
    #[error("Workspace not initialized at {0}")]
    WorkspaceNotInitialized(PathBuf),

    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("Template not found: {0}")]
    TemplateNotFound(String),

    #[error("Assignment not found: {0}")]
    AssignmentNotFound(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    // Invariant blocks (exit code 3)
    #[error("Circular hierarchy: {0}")]
    CircularHierarchy(String),

    #[error("Hierarchy depth limit exceeded: {0}")]
    DepthExceeded(String),

    #[error("Task cannot depend on itself: {0}")]
    SelfDependency(String),

    #[error("Cyclic dependency: {depends_on} already depends on {task}")]
    CyclicDependency { task: String, depends_on: String },

    #[error("Unmet dependencies for {task}: waiting on {}", .blocking.join(", "))]
    UnmetDependency { task: String, blocking: Vec<String> },

    #[error("Cannot mark {0} blocked without a reason")]
    MissingBlockReason(String),

    #[error("Task {task} is {status} and its status can no longer change")]
    TerminalTask { task: String, status: String },

    #[error("Template {0} is not the active version")]
    InactiveTemplate(String),

    #[error("Missing required variables for {template}: {}", .names.join(", "))]
    MissingVariable { template: String, names: Vec<String> },

    #[error("Unresolved blueprint reference: {0}")]
    UnresolvedBlueprintReference(String),

    // Operation failures (exit code 4)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Concurrent operation in progress: could not lock {0}")]
    ConcurrencyConflict(PathBuf),

    #[error("State validation failed: {0}")]
    StateInvalid(String),
}

impl Error {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            // User errors
            Error::WorkspaceNotInitialized(_)
            | Error::TaskNotFound(_)
            | Error::TemplateNotFound(_)
            | Error::AssignmentNotFound(_)
            | Error::InvalidConfig(_)
            | Error::InvalidArgument(_) => exit_codes::USER_ERROR,

            // Invariant blocks
            Error::CircularHierarchy(_)
            | Error::DepthExceeded(_)
            | Error::SelfDependency(_)
            | Error::CyclicDependency { .. }
            | Error::UnmetDependency { .. }
            | Error::MissingBlockReason(_)
            | Error::TerminalTask { .. }
            | Error::InactiveTemplate(_)
            | Error::MissingVariable { .. }
            | Error::UnresolvedBlueprintReference(_) => exit_codes::INVARIANT_BLOCKED,

            // Operation failures
            Error::Io(_)
            | Error::Json(_)
            | Error::TomlParse(_)
            | Error::TomlSerialize(_)
            | Error::ConcurrencyConflict(_)
            | Error::StateInvalid(_) => exit_codes::OPERATION_FAILED,
        }
    }

    /// Structured payload for errors that carry more than a message.
    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            Error::CyclicDependency { task, depends_on } => Some(serde_json::json!({
                "task": task,
                "depends_on": depends_on,
            })),
            Error::UnmetDependency { task, blocking } => Some(serde_json::json!({
                "task": task,
                "blocking": blocking,
            })),
            Error::TerminalTask { task, status } => Some(serde_json::json!({
                "task": task,
                "status": status,
            })),
            Error::MissingVariable { template, names } => Some(serde_json::json!({
                "template": template,
                "missing": names,
            })),
            _ => None,
        }
    }
}

/// Result type alias for trak operations
pub type Result<T> = std::result::Result<T, Error>;

/// Wrapper for displaying errors in JSON format
#[derive(serde::Serialize)]
pub struct JsonError {
    pub error: String,
    pub code: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl From<&Error> for JsonError {
    fn from(err: &Error) -> Self {
        JsonError {
            error: err.to_string(),
            code: err.exit_code(),
            details: err.details(),
        }
    }
}
