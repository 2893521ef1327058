//! Configuration loading and management
//!
//! Handles parsing of `.trak.toml` configuration files.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Actor configuration
    #[serde(default)]
    pub actor: ActorConfig,

    /// Task configuration
    #[serde(default)]
    pub tasks: TasksConfig,

    /// Hierarchy configuration
    #[serde(default)]
    pub hierarchy: HierarchyConfig,

    /// Store configuration
    #[serde(default)]
    pub store: StoreConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            actor: ActorConfig::default(),
            tasks: TasksConfig::default(),
            hierarchy: HierarchyConfig::default(),
            store: StoreConfig::default(),
        }
    }
}

/// Actor-related configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActorConfig {
    /// Default actor name when none specified
    #[serde(default = "default_actor")]
    pub default: String,
}

fn default_actor() -> String {
    "unknown".to_string()
}

impl Default for ActorConfig {
    fn default() -> Self {
        Self {
            default: default_actor(),
        }
    }
}

/// Task configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TasksConfig {
    /// Workspace-wide task ID prefix
    #[serde(default = "default_task_id_prefix")]
    pub id_prefix: String,

    /// Minimum task ID suffix length
    #[serde(default = "default_task_id_min_len")]
    pub id_min_len: usize,

    /// Priority assigned when a task is created without one
    #[serde(default = "default_task_priority")]
    pub default_priority: String,
}

fn default_task_id_prefix() -> String {
    "task".to_string()
}

fn default_task_id_min_len() -> usize {
    6
}

fn default_task_priority() -> String {
    "medium".to_string()
}

impl Default for TasksConfig {
    fn default() -> Self {
        Self {
            id_prefix: default_task_id_prefix(),
            id_min_len: default_task_id_min_len(),
            default_priority: default_task_priority(),
        }
    }
}

/// Hierarchy configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HierarchyConfig {
    /// Maximum parent-chain depth
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
}

fn default_max_depth() -> usize {
    32
}

impl Default for HierarchyConfig {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
        }
    }
}

/// Store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Milliseconds to wait for the state file lock
    #[serde(default = "default_lock_timeout_ms")]
    pub lock_timeout_ms: u64,
}

fn default_lock_timeout_ms() -> u64 {
    5000
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            lock_timeout_ms: default_lock_timeout_ms(),
        }
    }
}

impl Config {
    /// Load configuration from a `.trak.toml` file
    pub fn load(path: &Path) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from the workspace root. A missing file means
    /// defaults; a file that fails to parse or validate is an error.
    pub fn load_from_root(root: &Path) -> crate::error::Result<Self> {
        let config_path = root.join(".trak.toml");
        if config_path.exists() {
            Self::load(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> crate::error::Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    fn validate(&self) -> crate::error::Result<()> {
        self.tasks.validate()?;
        self.hierarchy.validate()?;
        self.store.validate()?;
        Ok(())
    }
}

impl TasksConfig {
    fn validate(&self) -> crate::error::Result<()> {
        let prefix = self.id_prefix.trim();
        if prefix.is_empty() {
            return Err(crate::error::Error::InvalidConfig(
                "tasks.id_prefix cannot be empty".to_string(),
            ));
        }
        if !prefix.chars().all(|ch| ch.is_ascii_alphanumeric()) {
            return Err(crate::error::Error::InvalidConfig(
                "tasks.id_prefix must be alphanumeric".to_string(),
            ));
        }
        if self.id_min_len < 3 {
            return Err(crate::error::Error::InvalidConfig(
                "tasks.id_min_len must be >= 3".to_string(),
            ));
        }
        if self.id_min_len > 16 {
            return Err(crate::error::Error::InvalidConfig(
                "tasks.id_min_len must be <= 16".to_string(),
            ));
        }
        validate_priority(&self.default_priority, "tasks.default_priority")?;
        Ok(())
    }
}

impl HierarchyConfig {
    fn validate(&self) -> crate::error::Result<()> {
        if self.max_depth == 0 {
            return Err(crate::error::Error::InvalidConfig(
                "hierarchy.max_depth must be >= 1".to_string(),
            ));
        }
        if self.max_depth > 512 {
            return Err(crate::error::Error::InvalidConfig(
                "hierarchy.max_depth must be <= 512".to_string(),
            ));
        }
        Ok(())
    }
}

impl StoreConfig {
    fn validate(&self) -> crate::error::Result<()> {
        if self.lock_timeout_ms == 0 {
            return Err(crate::error::Error::InvalidConfig(
                "store.lock_timeout_ms must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

fn validate_priority(priority: &str, field: &str) -> crate::error::Result<()> {
    match priority {
        "low" | "medium" | "high" | "urgent" => Ok(()),
        _ => Err(crate::error::Error::InvalidConfig(format!(
            "{field}: invalid priority '{priority}' (expected low|medium|high|urgent)"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn defaults_are_expected() {
        let cfg = Config::default();
        assert_eq!(cfg.actor.default, "unknown");
        assert_eq!(cfg.tasks.id_prefix, "task");
        assert_eq!(cfg.tasks.id_min_len, 6);
        assert_eq!(cfg.tasks.default_priority, "medium");
        assert_eq!(cfg.hierarchy.max_depth, 32);
        assert_eq!(cfg.store.lock_timeout_ms, 5000);
    }

    #[test]
    fn load_parses_overrides() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(".trak.toml");
        let content = r#"
[actor]
default = "alice"

[tasks]
id_prefix = "job"
id_min_len = 4
default_priority = "high"

[hierarchy]
max_depth = 8

[store]
lock_timeout_ms = 250
"#;
        fs::write(&path, content.trim()).expect("write config");

        let cfg = Config::load(&path).expect("load config");
        assert_eq!(cfg.actor.default, "alice");
        assert_eq!(cfg.tasks.id_prefix, "job");
        assert_eq!(cfg.tasks.id_min_len, 4);
        assert_eq!(cfg.tasks.default_priority, "high");
        assert_eq!(cfg.hierarchy.max_depth, 8);
        assert_eq!(cfg.store.lock_timeout_ms, 250);
    }

    #[test]
    fn invalid_priority_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(".trak.toml");
        let content = r#"
[tasks]
default_priority = "someday"
"#;
        fs::write(&path, content.trim()).expect("write config");

        let err = Config::load(&path).expect_err("invalid config");
        match err {
            crate::error::Error::InvalidConfig(_) => {}
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn invalid_id_prefix_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(".trak.toml");
        let content = r#"
[tasks]
id_prefix = "has space"
"#;
        fs::write(&path, content.trim()).expect("write config");

        let err = Config::load(&path).expect_err("invalid config");
        match err {
            crate::error::Error::InvalidConfig(_) => {}
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn zero_max_depth_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(".trak.toml");
        fs::write(&path, "[hierarchy]\nmax_depth = 0").expect("write config");

        let err = Config::load(&path).expect_err("invalid config");
        match err {
            crate::error::Error::InvalidConfig(_) => {}
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn load_from_root_defaults_when_missing() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cfg = Config::load_from_root(dir.path()).expect("defaults");
        assert_eq!(cfg.tasks.id_prefix, "task");
    }

    #[test]
    fn load_from_root_reads_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(".trak.toml");
        fs::write(&path, "[tasks]\nid_prefix = \"wk\"").expect("write config");

        let cfg = Config::load_from_root(dir.path()).expect("load config");
        assert_eq!(cfg.tasks.id_prefix, "wk");
    }

    #[test]
    fn load_from_root_propagates_bad_config() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(".trak.toml");
        fs::write(&path, "[tasks]\nid_min_len = 99").expect("write config");

        let err = Config::load_from_root(dir.path()).expect_err("invalid config");
        match err {
            crate::error::Error::InvalidConfig(_) => {}
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn save_writes_toml() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("out.toml");
        let cfg = Config::default();
        cfg.save(&path).expect("save config");

        let written = fs::read_to_string(&path).expect("read config");
        assert!(written.contains("id_prefix = \"task\""));
    }
}
