mod support;

use predicates::str::contains;
use support::TestWorkspace;

#[test]
fn set_appends_with_role_and_primary() {
    let ws = TestWorkspace::init();
    let id = ws.create_task("Shared work");

    let created = ws.data(&[
        "assign", "set", &id, "kai", "ravi", "--role", "engineer", "--primary", "kai",
    ]);
    let created = created.as_array().unwrap();
    assert_eq!(created.len(), 2);
    assert_eq!(created[0]["user"], "kai");
    assert_eq!(created[0]["is_primary"], true);
    assert_eq!(created[0]["role"], "engineer");
    assert_eq!(created[0]["assigned_by"], "tester");
    assert_eq!(created[1]["is_primary"], false);

    let listing = ws.data(&["assign", "list", &id]);
    assert_eq!(listing["total"], 2);
}

#[test]
fn replace_yields_exactly_the_new_set() {
    let ws = TestWorkspace::init();
    let id = ws.create_task("Rotated work");
    ws.trak(&["assign", "set", &id, "kai", "ravi", "--primary", "kai"])
        .assert()
        .success();

    ws.trak(&["assign", "set", &id, "zoe", "--replace"])
        .assert()
        .success();

    let listing = ws.data(&["assign", "list", &id]);
    assert_eq!(listing["total"], 1);
    assert_eq!(listing["assignments"][0]["user"], "zoe");
    assert_eq!(listing["assignments"][0]["is_primary"], false);
}

#[test]
fn appending_a_new_primary_demotes_the_stored_one() {
    let ws = TestWorkspace::init();
    let id = ws.create_task("Handover");
    ws.trak(&["assign", "set", &id, "kai", "--primary", "kai"])
        .assert()
        .success();
    ws.trak(&["assign", "set", &id, "noor", "--primary", "noor"])
        .assert()
        .success();

    let listing = ws.data(&["assign", "list", &id]);
    assert_eq!(listing["total"], 2);
    let primaries: Vec<&str> = listing["assignments"]
        .as_array()
        .unwrap()
        .iter()
        .filter(|a| a["is_primary"] == true)
        .map(|a| a["user"].as_str().unwrap())
        .collect();
    assert_eq!(primaries, vec!["noor"]);
}

#[test]
fn removal_never_promotes_a_new_primary() {
    let ws = TestWorkspace::init();
    let id = ws.create_task("Orphaned primary");
    let created = ws.data(&["assign", "set", &id, "kai", "ravi", "--primary", "kai"]);
    let primary_id = created[0]["id"].as_str().unwrap().to_string();

    ws.trak(&["assign", "rm", &id, &primary_id]).assert().success();

    let listing = ws.data(&["assign", "list", &id]);
    assert_eq!(listing["total"], 1);
    assert_eq!(listing["assignments"][0]["is_primary"], false);

    ws.trak(&["assign", "rm", &id, "no-such-assignment"])
        .assert()
        .failure()
        .code(2)
        .stderr(contains("not found"));
}

#[test]
fn effective_assignee_walks_the_parent_chain() {
    let ws = TestWorkspace::init();
    let root = ws.create_task("Root");
    let mid = ws.create_child("Mid", &root);
    let leaf = ws.create_child("Leaf", &mid);

    let unresolved = ws.data(&["assign", "effective", &leaf]);
    assert!(unresolved.get("assignment").is_none() || unresolved["assignment"].is_null());

    ws.trak(&["assign", "set", &root, "kai", "--primary", "kai"])
        .assert()
        .success();
    let inherited = ws.data(&["assign", "effective", &leaf]);
    assert_eq!(inherited["assignment"]["user"], "kai");
    assert_eq!(inherited["assignment"]["task_id"], root);

    // a closer assignee shadows the root's
    ws.trak(&["assign", "set", &mid, "ravi"]).assert().success();
    let closer = ws.data(&["assign", "effective", &leaf]);
    assert_eq!(closer["assignment"]["user"], "ravi");
}

#[test]
fn expired_assignments_do_not_resolve() {
    let ws = TestWorkspace::init();
    let id = ws.create_task("Stale");
    ws.trak(&[
        "assign",
        "set",
        &id,
        "kai",
        "--primary",
        "kai",
        "--expires",
        "2020-01-01T00:00:00Z",
    ])
    .assert()
    .success();

    // the record exists but is inactive
    let listing = ws.data(&["assign", "list", &id]);
    assert_eq!(listing["total"], 1);
    let effective = ws.data(&["assign", "effective", &id]);
    assert!(effective.get("assignment").is_none() || effective["assignment"].is_null());
}

#[test]
fn assignments_are_audited() {
    let ws = TestWorkspace::init();
    let id = ws.create_task("Tracked");
    ws.trak(&["assign", "set", &id, "kai", "ravi"]).assert().success();

    let history = ws.data(&["history", &id]);
    let newest = &history["records"][0];
    assert_eq!(newest["field"], "assignees");
    assert_eq!(newest["new_value"], "kai, ravi");
}
