mod support;

use predicates::str::contains;
use support::TestWorkspace;

#[test]
fn new_task_gets_defaults() {
    let ws = TestWorkspace::init();
    let task = ws.data(&["task", "new", "Survey the site"]);

    let id = task["id"].as_str().unwrap();
    assert!(id.starts_with("task-"), "id was {id}");
    assert_eq!(task["status"], "pending");
    assert_eq!(task["priority"], "medium");
    assert_eq!(task["completion"], 0);
    assert_eq!(task["created_by"], "tester");
    assert!(task.get("deleted_at").is_none());
}

#[test]
fn new_task_accepts_full_field_set() {
    let ws = TestWorkspace::init();
    let task = ws.data(&[
        "task",
        "new",
        "Install rig",
        "--description",
        "Install the rig on the north slab",
        "--type",
        "install",
        "--priority",
        "urgent",
        "--owner",
        "project:launch-q3",
        "--estimate",
        "6.5",
        "--due",
        "2031-03-01T09:00:00Z",
        "--tag",
        "field",
        "--tag",
        "rig",
        "--meta",
        "region=eu",
    ]);

    assert_eq!(task["task_type"], "install");
    assert_eq!(task["priority"], "urgent");
    assert_eq!(task["owner"]["kind"], "project");
    assert_eq!(task["owner"]["id"], "launch-q3");
    assert_eq!(task["estimated_hours"], 6.5);
    assert_eq!(task["tags"], serde_json::json!(["field", "rig"]));
    assert_eq!(task["metadata"]["region"], "eu");
    assert!(task["due_at"].as_str().unwrap().starts_with("2031-03-01"));
}

#[test]
fn empty_title_rejected() {
    let ws = TestWorkspace::init();
    ws.trak(&["task", "new", "   "])
        .assert()
        .failure()
        .code(2)
        .stderr(contains("title"));
}

#[test]
fn show_resolves_unique_suffix_prefix() {
    let ws = TestWorkspace::init();
    let id = ws.create_task("Lonely");
    let suffix = id.strip_prefix("task-").unwrap();

    let view = ws.data(&["task", "show", suffix]);
    assert_eq!(view["id"], id);
    assert_eq!(view["title"], "Lonely");
    assert_eq!(view["display_status"], "pending");
}

#[test]
fn update_applies_patch_and_rejects_noops() {
    let ws = TestWorkspace::init();
    let id = ws.create_task("Draft");

    let task = ws.data(&[
        "task",
        "update",
        &id,
        "--title",
        "Final",
        "--completion",
        "40",
        "--actual",
        "2.0",
    ]);
    assert_eq!(task["title"], "Final");
    assert_eq!(task["completion"], 40);
    assert_eq!(task["actual_hours"], 2.0);

    // no flags at all
    ws.trak(&["task", "update", &id])
        .assert()
        .failure()
        .code(2)
        .stderr(contains("nothing to update"));

    // a patch that changes nothing
    ws.trak(&["task", "update", &id, "--title", "Final"])
        .assert()
        .failure()
        .code(2);
}

#[test]
fn update_cannot_touch_status() {
    let ws = TestWorkspace::init();
    let id = ws.create_task("Guarded");
    // status is not an update flag; clap rejects it outright
    ws.trak(&["task", "update", &id, "--status", "completed"])
        .assert()
        .failure();
}

#[test]
fn rm_is_a_soft_delete() {
    let ws = TestWorkspace::init();
    let id = ws.create_task("Disposable");
    ws.trak(&["task", "rm", &id]).assert().success();

    let listing = ws.data(&["task", "list"]);
    assert_eq!(listing["total"], 0);

    let everything = ws.data(&["task", "list", "--all"]);
    assert_eq!(everything["total"], 1);
    assert!(everything["tasks"][0]["deleted_at"].is_string());

    // inspection still works, repeat deletion does not
    let view = ws.data(&["task", "show", &id]);
    assert_eq!(view["id"], id);
    ws.trak(&["task", "rm", &id]).assert().failure().code(2);
}

#[test]
fn list_filters_compose() {
    let ws = TestWorkspace::init();
    ws.trak(&["task", "new", "Bug one", "--type", "bug", "--tag", "urgent-fix"])
        .assert()
        .success();
    ws.trak(&["task", "new", "Feature one", "--type", "feature"])
        .assert()
        .success();

    let bugs = ws.data(&["task", "list", "--type", "bug"]);
    assert_eq!(bugs["total"], 1);
    assert_eq!(bugs["tasks"][0]["title"], "Bug one");

    let tagged = ws.data(&["task", "list", "--tag", "urgent-fix"]);
    assert_eq!(tagged["total"], 1);

    let none = ws.data(&["task", "list", "--type", "bug", "--tag", "nope"]);
    assert_eq!(none["total"], 0);

    let pending = ws.data(&["task", "list", "--status", "pending"]);
    assert_eq!(pending["total"], 2);
}

#[test]
fn list_filters_by_assignee() {
    let ws = TestWorkspace::init();
    let id = ws.create_task("Assigned work");
    ws.create_task("Unassigned work");
    ws.trak(&["assign", "set", &id, "kai"]).assert().success();

    let mine = ws.data(&["task", "list", "--assignee", "kai"]);
    assert_eq!(mine["total"], 1);
    assert_eq!(mine["tasks"][0]["id"], id);
}
