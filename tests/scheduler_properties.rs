//! Property tests for the graph builder and wave scheduler over
//! arbitrary generated DAGs.

use std::collections::HashMap;

use proptest::prelude::*;

use foreman::domain::models::{Task, TaskId};
use foreman::services::{graph, scheduler};

/// Generate an arbitrary acyclic task set: ids 1..=n where each task may
/// depend on any subset of lower ids, so cycles are impossible by
/// construction.
fn arb_tasks() -> impl Strategy<Value = Vec<Task>> {
    (1usize..24).prop_flat_map(|n| {
        prop::collection::vec(prop::bool::weighted(0.3), n * (n - 1) / 2).prop_map(
            move |edges| {
                let mut tasks = Vec::with_capacity(n);
                let mut edge = 0;
                for i in 0..n {
                    let id = u32::try_from(i + 1).unwrap();
                    let mut task = Task::new(id, format!("task-{id}"), "do the work");
                    for j in 0..i {
                        if edges[edge] {
                            task = task.with_dependency(u32::try_from(j + 1).unwrap());
                        }
                        edge += 1;
                    }
                    tasks.push(task);
                }
                tasks
            },
        )
    })
}

fn wave_index(waves: &[Vec<TaskId>]) -> HashMap<TaskId, usize> {
    let mut index = HashMap::new();
    for (i, wave) in waves.iter().enumerate() {
        for &id in wave {
            index.insert(id, i);
        }
    }
    index
}

proptest! {
    #[test]
    fn every_task_lands_in_exactly_one_wave(tasks in arb_tasks()) {
        let dep_graph = graph::build(&tasks).unwrap();
        let waves = scheduler::schedule(&dep_graph);

        let scheduled: usize = waves.iter().map(Vec::len).sum();
        prop_assert_eq!(scheduled, tasks.len());

        let index = wave_index(&waves);
        for task in &tasks {
            prop_assert!(index.contains_key(&task.id));
        }
    }

    #[test]
    fn dependencies_always_land_in_earlier_waves(tasks in arb_tasks()) {
        let dep_graph = graph::build(&tasks).unwrap();
        let waves = scheduler::schedule(&dep_graph);
        let index = wave_index(&waves);

        for task in &tasks {
            for dep in &task.depends_on {
                prop_assert!(
                    index[dep] < index[&task.id],
                    "task {} in wave {} but its dependency {} is in wave {}",
                    task.id, index[&task.id], dep, index[dep]
                );
            }
        }
    }

    #[test]
    fn first_wave_is_exactly_the_dependency_free_tasks(tasks in arb_tasks()) {
        let dep_graph = graph::build(&tasks).unwrap();
        let waves = scheduler::schedule(&dep_graph);

        let mut roots: Vec<TaskId> = tasks
            .iter()
            .filter(|t| t.depends_on.is_empty())
            .map(|t| t.id)
            .collect();
        roots.sort_unstable();
        prop_assert_eq!(&waves[0], &roots);
    }

    #[test]
    fn waves_are_never_empty_and_scheduling_is_deterministic(tasks in arb_tasks()) {
        let dep_graph = graph::build(&tasks).unwrap();
        let waves = scheduler::schedule(&dep_graph);

        for wave in &waves {
            prop_assert!(!wave.is_empty());
        }
        prop_assert_eq!(scheduler::schedule(&dep_graph), waves);
    }

    /// Closing a chain back on itself must always be rejected, and the
    /// reported path must walk real edges.
    #[test]
    fn back_edge_on_a_chain_is_reported_as_a_cycle(n in 2u32..16) {
        let mut tasks: Vec<Task> = (1..=n)
            .map(|id| {
                let task = Task::new(id, format!("task-{id}"), "p");
                if id > 1 { task.with_dependency(id - 1) } else { task }
            })
            .collect();
        tasks[0].depends_on.push(n);

        let err = graph::build(&tasks).unwrap_err();
        let message = err.to_string();
        prop_assert!(message.contains("cycle"), "unexpected error: {message}");
    }
}
