//! Library-level structural properties of the work graph, exercised
//! through `WorkGraph` directly.

use std::collections::HashSet;

use tempfile::TempDir;

use trak::dependency::DependencyType;
use trak::state::State;
use trak::store::WorkGraph;
use trak::task::{NewTask, TaskStatus};
use trak::Error;

fn graph() -> (TempDir, WorkGraph) {
    let temp = TempDir::new().unwrap();
    let (graph, created) = WorkGraph::init(temp.path()).unwrap();
    assert!(created);
    (temp, graph)
}

fn spawn(graph: &WorkGraph, title: &str) -> String {
    graph
        .create_task(
            NewTask {
                title: title.to_string(),
                ..Default::default()
            },
            "tester",
        )
        .unwrap()
        .id
}

fn stored_state(root: &TempDir) -> State {
    let raw = std::fs::read_to_string(root.path().join(".trak").join("state.json")).unwrap();
    serde_json::from_str(&raw).unwrap()
}

/// Minimal deterministic generator, enough to shuffle edge choices.
struct Lcg(u64);

impl Lcg {
    fn next(&mut self, bound: usize) -> usize {
        self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        ((self.0 >> 33) as usize) % bound
    }
}

#[test]
fn every_ancestor_is_barred_from_reparenting_under_its_subtree() {
    let (_temp, graph) = graph();
    let mut chain: Vec<String> = Vec::new();
    let mut parent: Option<String> = None;
    for index in 0..5 {
        let task = graph
            .create_task(
                NewTask {
                    title: format!("level {index}"),
                    parent_id: parent.clone(),
                    ..Default::default()
                },
                "tester",
            )
            .unwrap();
        parent = Some(task.id.clone());
        chain.push(task.id);
    }

    for upper in 0..chain.len() {
        for lower in upper..chain.len() {
            let result = graph.set_parent(&chain[upper], Some(&chain[lower]), "tester");
            assert!(
                matches!(result, Err(Error::CircularHierarchy(_))),
                "reparenting level {upper} under level {lower} should be circular"
            );
        }
    }

    // an unrelated task can adopt any chain member
    let outsider = spawn(&graph, "outsider");
    graph
        .set_parent(&outsider, Some(chain.last().unwrap()), "tester")
        .unwrap();
}

#[test]
fn random_edge_churn_never_leaves_a_cycle_behind() {
    let (temp, graph) = graph();
    let tasks: Vec<String> = (0..10).map(|i| spawn(&graph, &format!("node {i}"))).collect();

    let mut rng = Lcg(0x5eed);
    let mut live_edges: Vec<(String, String)> = Vec::new();
    for _ in 0..120 {
        let from = tasks[rng.next(tasks.len())].clone();
        let to = tasks[rng.next(tasks.len())].clone();

        if !live_edges.is_empty() && rng.next(4) == 0 {
            let (a, b) = live_edges.swap_remove(rng.next(live_edges.len()));
            graph
                .remove_dependency(&a, &b, Some(DependencyType::Blocks), "tester")
                .unwrap();
            continue;
        }

        match graph.add_dependency(&from, &to, DependencyType::Blocks, "tester") {
            Ok(edge) => live_edges.push((edge.task_id, edge.depends_on_id)),
            Err(Error::SelfDependency(_))
            | Err(Error::CyclicDependency { .. })
            | Err(Error::InvalidArgument(_)) => {}
            Err(other) => panic!("unexpected rejection: {other}"),
        }

        // every rejection and acceptance leaves the chain walkable
        for task in &tasks {
            let chain = graph.dependency_chain(task).unwrap();
            let unique: HashSet<&str> = chain.iter().map(|t| t.id.as_str()).collect();
            assert_eq!(unique.len(), chain.len());
            assert!(!unique.contains(task.as_str()));
        }
    }

    // the persisted document passes its own structural validation
    stored_state(&temp).validate().unwrap();
}

#[test]
fn chain_membership_follows_edge_lifecycle() {
    let (_temp, graph) = graph();
    let a = spawn(&graph, "a");
    let b = spawn(&graph, "b");
    let c = spawn(&graph, "c");

    graph
        .add_dependency(&a, &b, DependencyType::Blocks, "tester")
        .unwrap();
    graph
        .add_dependency(&b, &c, DependencyType::BlockedBy, "tester")
        .unwrap();

    let chain: Vec<String> = graph
        .dependency_chain(&a)
        .unwrap()
        .into_iter()
        .map(|t| t.id)
        .collect();
    assert_eq!(chain, vec![b.clone(), c.clone()]);

    graph
        .remove_dependency(&b, &c, None, "tester")
        .unwrap();
    let chain: Vec<String> = graph
        .dependency_chain(&a)
        .unwrap()
        .into_iter()
        .map(|t| t.id)
        .collect();
    assert_eq!(chain, vec![b]);
}

#[test]
fn a_clear_gate_always_admits_a_start() {
    let (_temp, graph) = graph();
    let tasks: Vec<String> = (0..6).map(|i| spawn(&graph, &format!("t{i}"))).collect();
    for window in tasks.windows(2) {
        graph
            .add_dependency(&window[0], &window[1], DependencyType::Blocks, "tester")
            .unwrap();
    }

    // completing from the tail end unlocks each dependent in turn
    for task in tasks.iter().rev() {
        assert!(!graph.has_incomplete_dependencies(task).unwrap());
        graph
            .transition(task, TaskStatus::InProgress, None, "tester")
            .unwrap();
        graph
            .transition(task, TaskStatus::Completed, None, "tester")
            .unwrap();
    }
}
