//! Storage layer for trak
//!
//! All persistent state lives under `.trak/` at the workspace root:
//!
//! ```text
//! .trak/
//!   state.json        # the whole document (tasks, edges, templates, ...)
//!   state.json.lock   # cross-process lock guarding state.json
//!   actor             # persisted actor identity for this workspace
//! ```
//!
//! Mutations go through [`Storage::update_state`]: lock, read, apply
//! the closure in memory, validate, then write atomically. A closure
//! error or a validation failure leaves the file untouched, so a
//! half-applied operation can never persist.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::lock::{self, FileLock};
use crate::state::{State, STATE_SCHEMA};

/// Name of the state directory at the workspace root
pub const TRAK_DIR: &str = ".trak";

/// Name of the state document inside [`TRAK_DIR`]
pub const STATE_FILE: &str = "state.json";

/// Storage manager rooted at one workspace
#[derive(Debug, Clone)]
pub struct Storage {
    root: PathBuf,
    lock_timeout_ms: u64,
}

impl Storage {
    pub fn new(root: PathBuf, lock_timeout_ms: u64) -> Self {
        Self {
            root,
            lock_timeout_ms,
        }
    }

    /// Storage for `root` using the lock timeout from its config
    pub fn for_root(root: &Path) -> Result<Self> {
        let config = Config::load_from_root(root)?;
        Ok(Self::new(root.to_path_buf(), config.store.lock_timeout_ms))
    }

    /// Walk up from `start` to the nearest directory containing `.trak/`
    pub fn discover(start: &Path) -> Result<Self> {
        let mut current = Some(start);
        while let Some(dir) = current {
            if dir.join(TRAK_DIR).is_dir() {
                return Self::for_root(dir);
            }
            current = dir.parent();
        }
        Err(Error::WorkspaceNotInitialized(start.to_path_buf()))
    }

    // =========================================================================
    // Path accessors
    // =========================================================================

    /// Path to the workspace root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path to the `.trak/` state directory
    pub fn trak_dir(&self) -> PathBuf {
        self.root.join(TRAK_DIR)
    }

    /// Path to the state document
    pub fn state_file(&self) -> PathBuf {
        self.trak_dir().join(STATE_FILE)
    }

    fn state_lock_file(&self) -> PathBuf {
        let state = self.state_file();
        PathBuf::from(format!("{}.lock", state.display()))
    }

    // =========================================================================
    // Initialization
    // =========================================================================

    /// Check if this workspace has been initialized
    pub fn is_initialized(&self) -> bool {
        self.state_file().exists()
    }

    /// Initialize the `.trak/` directory and an empty state document.
    ///
    /// Returns `true` when a fresh state file was written, `false` when
    /// the workspace was already initialized.
    pub fn init(&self) -> Result<bool> {
        fs::create_dir_all(self.trak_dir())?;
        if self.is_initialized() {
            return Ok(false);
        }
        let state = State::new();
        self.persist(&state)?;
        Ok(true)
    }

    // =========================================================================
    // State document I/O
    // =========================================================================

    /// Read the state document.
    ///
    /// Reads are lockless: writes land via temp file + rename, so a
    /// reader sees either the old document or the new one, never a
    /// partial write.
    pub fn read_state(&self) -> Result<State> {
        let path = self.state_file();
        if !path.exists() {
            return Err(Error::WorkspaceNotInitialized(self.root.clone()));
        }
        let content = fs::read_to_string(&path)?;
        let state: State = serde_json::from_str(&content)?;
        if state.schema_version != STATE_SCHEMA {
            return Err(Error::StateInvalid(format!(
                "unsupported state schema '{}' in {}",
                state.schema_version,
                path.display()
            )));
        }
        Ok(state)
    }

    /// Apply a mutation to the state document under the file lock.
    ///
    /// The closure works on an in-memory copy. Only when it succeeds
    /// and the mutated document passes validation is anything written,
    /// so the closure's partial changes are discarded on any error.
    pub fn update_state<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut State) -> Result<T>,
    {
        if !self.is_initialized() {
            return Err(Error::WorkspaceNotInitialized(self.root.clone()));
        }

        let _lock = FileLock::acquire(self.state_lock_file(), self.lock_timeout_ms)?;

        let mut state = self.read_state()?;
        let result = f(&mut state)?;
        state.validate()?;
        self.persist(&state)?;

        Ok(result)
    }

    fn persist(&self, state: &State) -> Result<()> {
        let mut document = state.clone();
        document.generated_at = Utc::now();
        let json = serde_json::to_string_pretty(&document)?;
        lock::write_atomic(self.state_file(), json.as_bytes())?;
        Ok(())
    }
}
