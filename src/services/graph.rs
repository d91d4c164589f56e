//! Dependency graph builder.
//!
//! Validates a task set (id uniqueness, dependency existence,
//! acyclicity) and produces the execution-ordering structure the wave
//! scheduler consumes. Pure and side-effect-free; rebuilt whenever the
//! task set changes, never mutated mid-execution.

use std::collections::{BTreeMap, HashMap, HashSet};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{Task, TaskId};

/// Derived execution-ordering structure. `dependents` maps a task to
/// the tasks that depend on it; `in_degree` counts unresolved
/// dependencies per task.
#[derive(Debug, Clone)]
pub struct DependencyGraph {
    pub dependents: HashMap<TaskId, Vec<TaskId>>,
    pub in_degree: HashMap<TaskId, usize>,
}

impl DependencyGraph {
    pub fn task_count(&self) -> usize {
        self.in_degree.len()
    }

    pub fn is_empty(&self) -> bool {
        self.in_degree.is_empty()
    }
}

/// Build and validate the dependency graph for a task set.
///
/// Rejects duplicate ids, dependencies on non-existent ids,
/// self-dependencies, and cycles. A cycle error reports the id sequence
/// forming it, e.g. `1 -> 2 -> 1`.
pub fn build(tasks: &[Task]) -> DomainResult<DependencyGraph> {
    let mut ids = HashSet::with_capacity(tasks.len());
    for task in tasks {
        if !ids.insert(task.id) {
            return Err(DomainError::DuplicateTaskId(task.id));
        }
    }

    // BTreeMap keeps traversal order deterministic across calls.
    let mut depends_on: BTreeMap<TaskId, &[TaskId]> = BTreeMap::new();
    for task in tasks {
        for &dep in &task.depends_on {
            if dep == task.id {
                return Err(DomainError::SelfDependency(task.id));
            }
            if !ids.contains(&dep) {
                return Err(DomainError::UnknownDependency {
                    task: task.id,
                    dependency: dep,
                });
            }
        }
        depends_on.insert(task.id, &task.depends_on);
    }

    if let Some(cycle) = find_cycle(&depends_on) {
        return Err(DomainError::DependencyCycle(cycle));
    }

    let mut dependents: HashMap<TaskId, Vec<TaskId>> = HashMap::with_capacity(tasks.len());
    let mut in_degree: HashMap<TaskId, usize> = HashMap::with_capacity(tasks.len());
    for task in tasks {
        dependents.entry(task.id).or_default();
        in_degree.entry(task.id).or_insert(0);
        for &dep in &task.depends_on {
            dependents.entry(dep).or_default().push(task.id);
            *in_degree.entry(task.id).or_insert(0) += 1;
        }
    }

    Ok(DependencyGraph {
        dependents,
        in_degree,
    })
}

/// Node coloring for the cycle search.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Color {
    /// Unvisited
    White,
    /// On the current DFS path
    Gray,
    /// Finished
    Black,
}

/// Depth-first cycle search over `depends_on` edges with three-color
/// marking. Returns the cycle as an id sequence that starts and ends on
/// the same task.
fn find_cycle(depends_on: &BTreeMap<TaskId, &[TaskId]>) -> Option<Vec<TaskId>> {
    let mut colors: HashMap<TaskId, Color> =
        depends_on.keys().map(|&id| (id, Color::White)).collect();
    let mut path = Vec::new();

    for &id in depends_on.keys() {
        if colors[&id] == Color::White {
            if let Some(cycle) = visit(id, depends_on, &mut colors, &mut path) {
                return Some(cycle);
            }
        }
    }
    None
}

fn visit(
    node: TaskId,
    depends_on: &BTreeMap<TaskId, &[TaskId]>,
    colors: &mut HashMap<TaskId, Color>,
    path: &mut Vec<TaskId>,
) -> Option<Vec<TaskId>> {
    colors.insert(node, Color::Gray);
    path.push(node);

    if let Some(neighbors) = depends_on.get(&node) {
        for &next in *neighbors {
            match colors[&next] {
                Color::White => {
                    if let Some(cycle) = visit(next, depends_on, colors, path) {
                        return Some(cycle);
                    }
                }
                Color::Gray => {
                    // A gray node on the current path closes a cycle.
                    let start = path.iter().position(|&id| id == next).unwrap_or(0);
                    let mut cycle: Vec<TaskId> = path[start..].to_vec();
                    cycle.push(next);
                    return Some(cycle);
                }
                Color::Black => {}
            }
        }
    }

    colors.insert(node, Color::Black);
    path.pop();
    None
}
