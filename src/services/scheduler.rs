//! Wave scheduler.
//!
//! Converts a validated dependency graph into an ordered sequence of
//! waves via Kahn's algorithm. Tasks within a wave are mutually
//! independent; execution order inside a wave is the coordinator's
//! concern, not the scheduler's.

use std::collections::HashMap;

use crate::domain::models::TaskId;

use super::graph::DependencyGraph;

/// A batch of tasks executable with mutual independence.
pub type Wave = Vec<TaskId>;

/// Partition the graph into waves. Wave *k+1* only contains tasks whose
/// dependencies lie in waves <= *k*. An empty graph yields an empty
/// wave list. The partition is deterministic: membership is a function
/// of the graph alone, and each wave is emitted in ascending id order.
pub fn schedule(graph: &DependencyGraph) -> Vec<Wave> {
    let mut in_degree: HashMap<TaskId, usize> = graph.in_degree.clone();
    let mut waves = Vec::new();

    let mut current: Vec<TaskId> = in_degree
        .iter()
        .filter(|&(_, &degree)| degree == 0)
        .map(|(&id, _)| id)
        .collect();
    current.sort_unstable();

    while !current.is_empty() {
        let mut next = Vec::new();
        for &id in &current {
            in_degree.remove(&id);
            if let Some(dependents) = graph.dependents.get(&id) {
                for &dependent in dependents {
                    if let Some(degree) = in_degree.get_mut(&dependent) {
                        *degree -= 1;
                        if *degree == 0 {
                            next.push(dependent);
                        }
                    }
                }
            }
        }
        next.sort_unstable();
        waves.push(std::mem::replace(&mut current, next));
    }

    waves
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::Task;
    use crate::services::graph;

    fn task(id: TaskId, deps: &[TaskId]) -> Task {
        let mut t = Task::new(id, format!("task-{id}"), "do the work");
        t.depends_on = deps.to_vec();
        t
    }

    fn waves_for(tasks: &[Task]) -> Vec<Wave> {
        schedule(&graph::build(tasks).unwrap())
    }

    #[test]
    fn test_empty_set_yields_empty_wave_list() {
        assert!(waves_for(&[]).is_empty());
    }

    #[test]
    fn test_diamond_partitions_into_three_waves() {
        let tasks = vec![task(1, &[]), task(2, &[1]), task(3, &[1]), task(4, &[2, 3])];
        assert_eq!(waves_for(&tasks), vec![vec![1], vec![2, 3], vec![4]]);
    }

    #[test]
    fn test_independent_tasks_share_the_first_wave() {
        let tasks = vec![task(5, &[]), task(2, &[]), task(9, &[])];
        assert_eq!(waves_for(&tasks), vec![vec![2, 5, 9]]);
    }

    #[test]
    fn test_chain_yields_one_wave_per_task() {
        let tasks = vec![task(1, &[]), task(2, &[1]), task(3, &[2])];
        assert_eq!(waves_for(&tasks), vec![vec![1], vec![2], vec![3]]);
    }

    #[test]
    fn test_scheduling_is_idempotent() {
        let tasks = vec![
            task(1, &[]),
            task(2, &[1]),
            task(3, &[1]),
            task(4, &[2, 3]),
            task(5, &[]),
        ];
        let g = graph::build(&tasks).unwrap();
        assert_eq!(schedule(&g), schedule(&g));
    }

    #[test]
    fn test_every_dependency_lands_in_an_earlier_wave() {
        let tasks = vec![
            task(1, &[]),
            task(2, &[1]),
            task(3, &[1, 2]),
            task(4, &[1]),
            task(5, &[3, 4]),
        ];
        let waves = waves_for(&tasks);

        let wave_of = |id: TaskId| waves.iter().position(|w| w.contains(&id)).unwrap();
        for t in &tasks {
            for &dep in &t.depends_on {
                assert!(wave_of(dep) < wave_of(t.id));
            }
        }
    }
}
