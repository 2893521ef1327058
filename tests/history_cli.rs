mod support;

use support::TestWorkspace;

#[test]
fn every_mutation_is_audited_newest_first() {
    let ws = TestWorkspace::init();
    let id = ws.create_task("Tracked");
    ws.trak(&["task", "update", &id, "--priority", "high"])
        .assert()
        .success();
    ws.trak(&["status", &id, "in_progress"]).assert().success();

    let history = ws.data(&["history", &id]);
    assert_eq!(history["total"], 3);
    let records = history["records"].as_array().unwrap();
    assert_eq!(records[0]["action"], "status_changed");
    assert_eq!(records[1]["action"], "updated");
    assert_eq!(records[2]["action"], "created");
    for record in records {
        assert_eq!(record["task_id"], id);
        assert_eq!(record["actor"], "tester");
        assert!(record["timestamp"].is_string());
        assert!(record["id"].is_string());
    }
}

#[test]
fn status_records_carry_old_and_new_values() {
    let ws = TestWorkspace::init();
    let id = ws.create_task("Moves");
    ws.trak(&["status", &id, "in_progress"]).assert().success();
    ws.trak(&["status", &id, "review"]).assert().success();

    let history = ws.data(&["history", &id]);
    let newest = &history["records"][0];
    assert_eq!(newest["field"], "status");
    assert_eq!(newest["old_value"], "in_progress");
    assert_eq!(newest["new_value"], "review");
}

#[test]
fn update_records_name_the_changed_field() {
    let ws = TestWorkspace::init();
    let id = ws.create_task("Edited");
    ws.trak(&["task", "update", &id, "--title", "Edited twice"])
        .assert()
        .success();

    let history = ws.data(&["history", &id]);
    let newest = &history["records"][0];
    assert_eq!(newest["action"], "updated");
    assert_eq!(newest["field"], "title");
    assert_eq!(newest["old_value"], "Edited");
    assert_eq!(newest["new_value"], "Edited twice");
}

#[test]
fn limit_truncates_from_the_newest_end() {
    let ws = TestWorkspace::init();
    let id = ws.create_task("Busy");
    for priority in ["high", "low", "urgent"] {
        ws.trak(&["task", "update", &id, "--priority", priority])
            .assert()
            .success();
    }

    let full = ws.data(&["history", &id]);
    assert_eq!(full["total"], 4);

    let trimmed = ws.data(&["history", &id, "--limit", "2"]);
    assert_eq!(trimmed["records"].as_array().map(Vec::len), Some(2));
    assert_eq!(trimmed["records"][0]["new_value"], "urgent");
    assert_eq!(trimmed["records"][1]["new_value"], "low");
}

#[test]
fn history_survives_soft_delete() {
    let ws = TestWorkspace::init();
    let id = ws.create_task("Doomed");
    ws.trak(&["task", "rm", &id]).assert().success();

    let history = ws.data(&["history", &id]);
    assert_eq!(history["total"], 2);
    assert_eq!(history["records"][0]["action"], "deleted");
    assert_eq!(history["records"][1]["action"], "created");
}

#[test]
fn records_stay_scoped_to_their_task() {
    let ws = TestWorkspace::init();
    let a = ws.create_task("A");
    let b = ws.create_task("B");
    ws.trak(&["status", &b, "in_progress"]).assert().success();

    let history = ws.data(&["history", &a]);
    assert_eq!(history["total"], 1);
    assert_eq!(history["records"][0]["task_id"], a);
}

#[test]
fn actor_flag_overrides_the_configured_identity() {
    let ws = TestWorkspace::init();
    let id = ws.create_task("Owned");
    ws.trak(&["--actor", "priya", "status", &id, "in_progress"])
        .assert()
        .success();

    let history = ws.data(&["history", &id]);
    assert_eq!(history["records"][0]["actor"], "priya");
    assert_eq!(history["records"][1]["actor"], "tester");
}
