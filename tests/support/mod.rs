#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use tempfile::TempDir;

/// A temporary trak workspace driven through the real binary.
pub struct TestWorkspace {
    dir: TempDir,
}

impl TestWorkspace {
    /// Fresh workspace with `trak init` already run.
    pub fn init() -> Self {
        let ws = Self::empty();
        ws.trak(&["init"]).assert().success();
        ws
    }

    /// Fresh directory without a state file.
    pub fn empty() -> Self {
        let dir = tempfile::tempdir().expect("failed to create tempdir");
        Self { dir }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// A `trak` invocation rooted at this workspace. The actor defaults
    /// to "tester" via the environment; tests can override it with
    /// `--actor`.
    pub fn trak(&self, args: &[&str]) -> Command {
        let mut cmd = Command::cargo_bin("trak").expect("trak binary should build");
        cmd.current_dir(self.dir.path());
        cmd.env("TRAK_ROOT", self.dir.path());
        cmd.env("TRAK_ACTOR", "tester");
        cmd.env_remove("RUST_LOG");
        cmd.args(args);
        cmd
    }

    /// Run a command with `--json` and return the parsed envelope.
    pub fn json(&self, args: &[&str]) -> serde_json::Value {
        let assert = self.trak(args).arg("--json").assert().success();
        serde_json::from_slice(&assert.get_output().stdout)
            .expect("command should emit a JSON envelope")
    }

    /// Like `json`, but unwraps the envelope's `data` payload.
    pub fn data(&self, args: &[&str]) -> serde_json::Value {
        let envelope = self.json(args);
        assert_eq!(envelope["schema_version"], "trak.v1");
        assert_eq!(envelope["status"], "success");
        envelope["data"].clone()
    }

    /// Run a command expected to fail; returns the parsed error envelope.
    pub fn json_err(&self, args: &[&str], code: i32) -> serde_json::Value {
        let assert = self.trak(args).arg("--json").assert().failure().code(code);
        serde_json::from_slice(&assert.get_output().stdout)
            .expect("failed command should emit a JSON error envelope")
    }

    pub fn create_task(&self, title: &str) -> String {
        self.data(&["task", "new", title])["id"]
            .as_str()
            .expect("created task should have an id")
            .to_string()
    }

    pub fn create_child(&self, title: &str, parent: &str) -> String {
        self.data(&["task", "new", title, "--parent", parent])["id"]
            .as_str()
            .expect("created task should have an id")
            .to_string()
    }

    pub fn write_file(&self, rel_path: &str, contents: &str) -> PathBuf {
        let path = self.dir.path().join(rel_path);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create parent dirs");
        }
        fs::write(&path, contents).expect("write file");
        path
    }

    pub fn write_config(&self, contents: &str) -> PathBuf {
        self.write_file(".trak.toml", contents)
    }

    pub fn state_path(&self) -> PathBuf {
        self.dir.path().join(".trak").join("state.json")
    }

    pub fn read_state(&self) -> serde_json::Value {
        let raw = fs::read_to_string(self.state_path()).expect("state file should exist");
        serde_json::from_str(&raw).expect("state file should be JSON")
    }
}

/// A draft file matching the two-blueprint install template used across
/// the template suites: t2 depends on t1, one required variable `site`.
pub const INSTALL_DRAFT: &str = r#"{
  "name": "Site install",
  "description": "Prep then install one site",
  "blueprints": [
    {"id": "t1", "title": "Prep {{site}}", "tags": ["{{site}}"]},
    {"id": "t2", "title": "Install {{site}}", "description": "Install rig at {{site}}"}
  ],
  "links": [
    {"from": "t2", "to": "t1", "type": "blocks"}
  ],
  "variables": [
    {"name": "site", "type": "string", "required": true}
  ]
}"#;
