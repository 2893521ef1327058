//! Concurrent writers against one workspace. Every handle opens its own
//! `WorkGraph`, so all coordination happens through the state lock.

use std::collections::HashSet;
use std::sync::Arc;
use std::thread;

use tempfile::TempDir;

use trak::assignment::AssignmentEntry;
use trak::state::State;
use trak::store::{TaskFilter, WorkGraph};
use trak::task::NewTask;

const WRITERS: usize = 4;
const TASKS_PER_WRITER: usize = 8;

fn init_workspace() -> (TempDir, WorkGraph) {
    let temp = TempDir::new().unwrap();
    // generous lock budget so slow CI machines do not time writers out
    std::fs::write(
        temp.path().join(".trak.toml"),
        "[store]\nlock_timeout_ms = 30000\n",
    )
    .unwrap();
    let (graph, created) = WorkGraph::init(temp.path()).unwrap();
    assert!(created);
    (temp, graph)
}

fn stored_state(root: &TempDir) -> State {
    let raw = std::fs::read_to_string(root.path().join(".trak").join("state.json")).unwrap();
    serde_json::from_str(&raw).unwrap()
}

#[test]
fn parallel_creates_lose_nothing() {
    let (temp, graph) = init_workspace();
    let root = Arc::new(temp.path().to_path_buf());

    let handles: Vec<_> = (0..WRITERS)
        .map(|writer| {
            let root = Arc::clone(&root);
            thread::spawn(move || {
                let graph = WorkGraph::open(&root).unwrap();
                let actor = format!("writer-{writer}");
                (0..TASKS_PER_WRITER)
                    .map(|index| {
                        graph
                            .create_task(
                                NewTask {
                                    title: format!("{actor} task {index}"),
                                    ..Default::default()
                                },
                                &actor,
                            )
                            .unwrap()
                            .id
                    })
                    .collect::<Vec<String>>()
            })
        })
        .collect();

    let mut all_ids: Vec<String> = Vec::new();
    for handle in handles {
        all_ids.extend(handle.join().unwrap());
    }

    assert_eq!(all_ids.len(), WRITERS * TASKS_PER_WRITER);
    let unique: HashSet<&String> = all_ids.iter().collect();
    assert_eq!(unique.len(), all_ids.len(), "duplicate ids were handed out");

    let listed = graph.list_tasks(&TaskFilter::default()).unwrap();
    assert_eq!(listed.len(), WRITERS * TASKS_PER_WRITER);
    stored_state(&temp).validate().unwrap();
}

#[test]
fn concurrent_appends_to_one_task_keep_every_assignee() {
    let (temp, graph) = init_workspace();
    let shared = graph
        .create_task(
            NewTask {
                title: "shared".to_string(),
                ..Default::default()
            },
            "tester",
        )
        .unwrap()
        .id;
    let root = Arc::new(temp.path().to_path_buf());

    let handles: Vec<_> = (0..WRITERS)
        .map(|writer| {
            let root = Arc::clone(&root);
            let shared = shared.clone();
            thread::spawn(move || {
                let graph = WorkGraph::open(&root).unwrap();
                let user = format!("user-{writer}");
                graph
                    .assign_users(&shared, vec![AssignmentEntry::new(&user)], false, &user)
                    .unwrap();
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let assignments = graph.assignments(&shared).unwrap();
    assert_eq!(assignments.len(), WRITERS);
    let users: HashSet<&str> = assignments.iter().map(|a| a.user.as_str()).collect();
    assert_eq!(users.len(), WRITERS);
    // nobody asked for primary, so appends never elect one
    assert!(assignments.iter().all(|a| !a.is_primary));

    // every append is audited
    let records = graph.history_for(&shared, None).unwrap();
    assert_eq!(records.len(), 1 + WRITERS);
    stored_state(&temp).validate().unwrap();
}

#[test]
fn interleaved_history_stays_consistent_per_task() {
    let (temp, _graph) = init_workspace();
    let root = Arc::new(temp.path().to_path_buf());

    let handles: Vec<_> = (0..WRITERS)
        .map(|writer| {
            let root = Arc::clone(&root);
            thread::spawn(move || {
                let graph = WorkGraph::open(&root).unwrap();
                let actor = format!("writer-{writer}");
                let id = graph
                    .create_task(
                        NewTask {
                            title: format!("{actor} churn"),
                            ..Default::default()
                        },
                        &actor,
                    )
                    .unwrap()
                    .id;
                graph
                    .transition(&id, trak::task::TaskStatus::InProgress, None, &actor)
                    .unwrap();
                graph
                    .transition(&id, trak::task::TaskStatus::Completed, None, &actor)
                    .unwrap();
                id
            })
        })
        .collect();

    let graph = WorkGraph::open(&root).unwrap();
    for handle in handles {
        let id = handle.join().unwrap();
        let task = graph.get_task(&id).unwrap();
        assert_eq!(task.task.completion, 100);
        let records = graph.history_for(&id, None).unwrap();
        assert_eq!(records.len(), 3);
        assert!(records.iter().all(|record| record.task_id == id));
    }
    stored_state(&temp).validate().unwrap();
}
