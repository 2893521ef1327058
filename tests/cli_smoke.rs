mod support;

use predicates::str::contains;
use support::TestWorkspace;

#[test]
fn version_prints_name_and_version() {
    let ws = TestWorkspace::empty();
    ws.trak(&["--version"])
        .assert()
        .success()
        .stdout(contains("trak"));
}

#[test]
fn help_lists_subcommands() {
    let ws = TestWorkspace::empty();
    ws.trak(&["--help"])
        .assert()
        .success()
        .stdout(contains("task"))
        .stdout(contains("dep"))
        .stdout(contains("status"))
        .stdout(contains("assign"))
        .stdout(contains("template"))
        .stdout(contains("history"));
}

#[test]
fn init_creates_the_state_document() {
    let ws = TestWorkspace::empty();
    let report = ws.data(&["init"]);
    assert_eq!(report["created"], true);
    assert!(ws.state_path().exists());

    let state = ws.read_state();
    assert_eq!(state["schema_version"], "trak.state.v1");
    assert_eq!(state["tasks"].as_array().map(Vec::len), Some(0));
}

#[test]
fn init_is_idempotent() {
    let ws = TestWorkspace::init();
    let report = ws.data(&["init"]);
    assert_eq!(report["created"], false);
}

#[test]
fn commands_fail_cleanly_without_init() {
    let ws = TestWorkspace::empty();
    ws.trak(&["task", "list"])
        .assert()
        .failure()
        .code(2)
        .stderr(contains("not initialized"))
        .stderr(contains("trak init"));
}

#[test]
fn unknown_task_reports_user_error() {
    let ws = TestWorkspace::init();
    let envelope = ws.json_err(&["task", "show", "no-such-task"], 2);
    assert_eq!(envelope["status"], "error");
    assert_eq!(envelope["command"], "task show");
    assert_eq!(envelope["error"]["kind"], "user_error");
    assert_eq!(envelope["error"]["code"], 2);
}

#[test]
fn invalid_config_is_surfaced() {
    let ws = TestWorkspace::init();
    ws.write_config("[tasks]\ndefault_priority = \"someday\"\n");
    ws.trak(&["task", "list"])
        .assert()
        .failure()
        .code(2)
        .stderr(contains("default_priority"));
}

#[test]
fn config_overrides_apply() {
    let ws = TestWorkspace::empty();
    ws.write_config("[tasks]\nid_prefix = \"job\"\n");
    ws.trak(&["init"]).assert().success();

    let id = ws.create_task("Configured");
    assert!(id.starts_with("job-"), "id was {id}");
}
