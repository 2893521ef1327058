mod support;

use predicates::str::contains;
use support::TestWorkspace;

#[test]
fn start_is_gated_until_prerequisites_finish() {
    let ws = TestWorkspace::init();
    let prep = ws.create_task("Prep");
    let install = ws.create_task("Install");
    ws.trak(&["dep", "add", &install, &prep]).assert().success();

    let envelope = ws.json_err(&["status", &install, "in_progress"], 3);
    assert_eq!(envelope["error"]["kind"], "invariant_blocked");
    assert_eq!(envelope["error"]["details"]["blocking"][0], prep);

    // finishing the prerequisite unlocks the dependent
    ws.trak(&["status", &prep, "in_progress"]).assert().success();
    ws.trak(&["status", &prep, "completed"]).assert().success();
    let started = ws.data(&["status", &install, "in_progress"]);
    assert_eq!(started["status"], "in_progress");
    assert!(started["started_at"].is_string());
}

#[test]
fn cancelled_prerequisites_also_unlock() {
    let ws = TestWorkspace::init();
    let prep = ws.create_task("Prep");
    let install = ws.create_task("Install");
    ws.trak(&["dep", "add", &install, &prep, "--type", "blocked_by"])
        .assert()
        .success();

    ws.trak(&["status", &prep, "cancelled"]).assert().success();
    ws.trak(&["status", &install, "in_progress"])
        .assert()
        .success();
}

#[test]
fn blocked_requires_a_reason() {
    let ws = TestWorkspace::init();
    let id = ws.create_task("Stuck");

    ws.trak(&["status", &id, "blocked"])
        .assert()
        .failure()
        .code(3)
        .stderr(contains("without a reason"));

    let blocked = ws.data(&["status", &id, "blocked", "--reason", "vendor delay"]);
    assert_eq!(blocked["status"], "blocked");
    assert_eq!(blocked["blocked_reason"], "vendor delay");

    // leaving blocked clears the reason
    let resumed = ws.data(&["status", &id, "pending"]);
    assert!(resumed.get("blocked_reason").is_none());
}

#[test]
fn reason_outside_blocked_rejected() {
    let ws = TestWorkspace::init();
    let id = ws.create_task("Plain");
    ws.trak(&["status", &id, "review", "--reason", "why not"])
        .assert()
        .failure()
        .code(2);
}

#[test]
fn completion_stamps_and_freezes() {
    let ws = TestWorkspace::init();
    let id = ws.create_task("One-shot");

    let done = ws.data(&["status", &id, "completed"]);
    assert_eq!(done["completion"], 100);
    assert!(done["completed_at"].is_string());

    ws.trak(&["status", &id, "pending"])
        .assert()
        .failure()
        .code(3)
        .stderr(contains("no longer change"));

    let cancelled = ws.create_task("Dropped");
    ws.trak(&["status", &cancelled, "cancelled"]).assert().success();
    ws.trak(&["status", &cancelled, "in_progress"])
        .assert()
        .failure()
        .code(3);
}

#[test]
fn transition_to_current_status_rejected() {
    let ws = TestWorkspace::init();
    let id = ws.create_task("Idle");
    ws.trak(&["status", &id, "pending"])
        .assert()
        .failure()
        .code(2)
        .stderr(contains("already"));
}

#[test]
fn overdue_is_display_only_and_never_a_target() {
    let ws = TestWorkspace::init();
    let late = ws.data(&[
        "task",
        "new",
        "Late already",
        "--due",
        "2020-01-01T00:00:00Z",
    ]);
    let id = late["id"].as_str().unwrap();

    let view = ws.data(&["task", "show", id]);
    assert_eq!(view["display_status"], "overdue");
    // the stored status is untouched
    assert_eq!(view["status"], "pending");

    ws.trak(&["status", id, "overdue"]).assert().failure().code(2);

    // terminal tasks stop displaying overdue
    ws.trak(&["status", id, "completed"]).assert().success();
    let view = ws.data(&["task", "show", id]);
    assert_eq!(view["display_status"], "completed");
}

#[test]
fn gating_is_reevaluated_per_attempt() {
    let ws = TestWorkspace::init();
    let a = ws.create_task("A");
    let b = ws.create_task("B");
    let c = ws.create_task("C");
    ws.trak(&["dep", "add", &a, &b]).assert().success();
    ws.trak(&["dep", "add", &a, &c]).assert().success();

    ws.trak(&["status", &a, "in_progress"]).assert().failure().code(3);
    ws.trak(&["status", &b, "completed"]).assert().success();
    // still one unmet prerequisite
    let envelope = ws.json_err(&["status", &a, "in_progress"], 3);
    let blocking = envelope["error"]["details"]["blocking"].as_array().unwrap();
    assert_eq!(blocking.len(), 1);
    assert_eq!(blocking[0], c);

    ws.trak(&["status", &c, "completed"]).assert().success();
    ws.trak(&["status", &a, "in_progress"]).assert().success();
}
