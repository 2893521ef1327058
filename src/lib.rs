//! trak - work tracking library
//!
//! This library provides the core functionality for the trak CLI tool:
//! a dependency-aware work graph stored in a single state document per
//! workspace.
//!
//! # Core Concepts
//!
//! - **Tasks**: Soft-deleted records with hierarchy, tags, and metadata
//! - **Dependencies**: Typed edges; `blocks`/`blocked_by` gate starting work
//! - **Status Gating**: A state machine with terminal states and gated starts
//! - **Assignments**: Multi-user with one primary; inherited from ancestors
//! - **Templates**: Versioned blueprints expanded into task structures
//! - **History**: An audit record for every mutation, in the same commit
//!
//! # Module Organization
//!
//! - `cli`: Command-line interface using clap
//! - `config`: Configuration loading from `.trak.toml`
//! - `error`: Error types and result aliases
//! - `store`: The `WorkGraph` facade over one workspace's state
//! - `state`: The state document and id resolution
//! - `task`: Task records, patches, and id generation
//! - `hierarchy`: Parent/child walks and cycle checks
//! - `dependency`: Dependency edges and the gating resolver
//! - `status`: The status state machine
//! - `assignment`: Assignment records and the effective-assignee walk
//! - `template`: Template storage, versioning, and instantiation
//! - `history`: Audit records
//! - `actor`: Actor identity management
//! - `storage`: State document I/O and the update transaction
//! - `lock`: File locking and atomic operations for concurrency safety
//! - `output`: Structured CLI output envelopes
//! - `events`: JSONL mutation event stream

pub mod actor;
pub mod assignment;
pub mod cli;
pub mod config;
pub mod dependency;
pub mod error;
pub mod events;
pub mod hierarchy;
pub mod history;
pub mod lock;
pub mod output;
pub mod state;
pub mod status;
pub mod storage;
pub mod store;
pub mod task;
pub mod template;

pub use error::{Error, Result};
